use super::validator_assignment;
use clap::{Arg, ArgAction, Command};

pub const CMD_ADMIN: &str = "admin";

pub const ARG_SKIP: &str = "skip";
pub const ARG_LIMIT: &str = "limit";
pub const ARG_USER: &str = "user";
pub const ARG_ACTION: &str = "action";
pub const ARG_ID: &str = "id";
pub const ARG_IDS: &str = "ids";
pub const ARG_STATUS: &str = "status";
pub const ARG_NOTES: &str = "notes";
pub const ARG_SET: &str = "set";
pub const ARG_NAME: &str = "name";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_ADMIN: &str = "admin";

fn paged(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SKIP)
                .long(ARG_SKIP)
                .help("Entries to skip")
                .default_value("0")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LIMIT)
                .long(ARG_LIMIT)
                .help("Maximum entries to return")
                .default_value("100")
                .value_parser(clap::value_parser!(u32).range(1..=1000)),
        )
}

fn user_filter() -> Arg {
    Arg::new(ARG_USER).long(ARG_USER).help("Only entries of this user id")
}

fn id(help: &'static str) -> Arg {
    Arg::new(ARG_ID).help(help).required(true)
}

fn assignments() -> Arg {
    Arg::new(ARG_SET)
        .long(ARG_SET)
        .help("Field assignment; values are parsed as JSON, falling back to text")
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
        .required(true)
        .value_parser(validator_assignment())
}

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command.subcommand(
        Command::new(CMD_ADMIN)
            .about("Administrator console")
            .subcommand_required(true)
            .arg_required_else_help(true)
            .subcommand(Command::new("stats").about("Platform statistics"))
            .subcommand(Command::new("health").about("System health"))
            .subcommand(paged(Command::new("users").about("List users")))
            .subcommand(Command::new("user").about("Show a user").arg(id("User id")))
            .subcommand(
                Command::new("create-user")
                    .about("Create a user; without a password the backend sends an invite")
                    .arg(Arg::new(ARG_NAME).long(ARG_NAME).required(true).help("Display name"))
                    .arg(Arg::new(ARG_EMAIL).long(ARG_EMAIL).required(true).help("Email address"))
                    .arg(
                        Arg::new(ARG_PASSWORD)
                            .long(ARG_PASSWORD)
                            .help("Initial password")
                            .env("SENTINEL_NEW_USER_PASSWORD")
                            .hide_env_values(true),
                    )
                    .arg(
                        Arg::new(ARG_ADMIN)
                            .long(ARG_ADMIN)
                            .help("Grant the admin role")
                            .action(ArgAction::SetTrue),
                    ),
            )
            .subcommand(
                Command::new("update-user")
                    .about("Change user fields")
                    .arg(id("User id"))
                    .arg(assignments()),
            )
            .subcommand(Command::new("delete-user").about("Delete a user").arg(id("User id")))
            .subcommand(
                Command::new("force-logout")
                    .about("Revoke every session of a user")
                    .arg(id("User id")),
            )
            .subcommand(
                Command::new("reset-mfa")
                    .about("Remove MFA from a user")
                    .arg(id("User id")),
            )
            .subcommand(paged(Command::new("uploads").about("List uploads")).arg(user_filter()))
            .subcommand(
                Command::new("delete-upload")
                    .about("Delete an upload")
                    .arg(id("Upload id")),
            )
            .subcommand(
                Command::new("reprocess")
                    .about("Run detection again on an upload")
                    .arg(id("Upload id")),
            )
            .subcommand(paged(Command::new("alerts").about("List alerts")).arg(user_filter()))
            .subcommand(
                Command::new("update-alert")
                    .about("Review or acknowledge an alert")
                    .arg(id("Alert id"))
                    .arg(
                        Arg::new(ARG_STATUS)
                            .long(ARG_STATUS)
                            .help("New alert status")
                            .value_parser(["new", "reviewed", "acknowledged"]),
                    )
                    .arg(Arg::new(ARG_NOTES).long(ARG_NOTES).help("Reviewer notes"))
                    .group(
                        clap::ArgGroup::new("alert-change")
                            .args([ARG_STATUS, ARG_NOTES])
                            .multiple(true)
                            .required(true),
                    ),
            )
            .subcommand(
                paged(Command::new("audit-logs").about("List audit log entries"))
                    .arg(user_filter())
                    .arg(
                        Arg::new(ARG_ACTION)
                            .long(ARG_ACTION)
                            .help("Only entries with this action"),
                    ),
            )
            .subcommand(Command::new("export-alerts").about("Print alerts as CSV"))
            .subcommand(
                Command::new("export-audit-logs")
                    .about("Print audit logs as CSV")
                    .arg(
                        Arg::new(ARG_IDS)
                            .long(ARG_IDS)
                            .help("Only these entry ids")
                            .value_delimiter(',')
                            .action(ArgAction::Append),
                    ),
            )
            .subcommand(Command::new("settings").about("Full system settings"))
            .subcommand(
                Command::new("update-settings")
                    .about("Change system settings, e.g. --set maintenance_mode=true")
                    .arg(assignments()),
            ),
    )
}
