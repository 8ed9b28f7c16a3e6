use super::validator_assignment;
use clap::{Arg, ArgAction, Command};

pub const CMD_LOGIN: &str = "login";
pub const CMD_LOGOUT: &str = "logout";
pub const CMD_STATUS: &str = "status";
pub const CMD_REGISTER: &str = "register";
pub const CMD_RESET_PASSWORD: &str = "reset-password";
pub const CMD_ACCOUNT: &str = "account";

pub const ARG_EMAIL: &str = "email";
pub const ARG_NAME: &str = "name";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_RECOVERY: &str = "recovery";
pub const ARG_REFRESH: &str = "refresh";
pub const ARG_SET: &str = "set";
pub const ARG_CODE: &str = "code";

#[must_use]
pub fn with_subcommands(command: Command) -> Command {
    command
        .subcommand(login())
        .subcommand(Command::new(CMD_LOGOUT).about("Sign out and forget the stored session"))
        .subcommand(
            Command::new(CMD_STATUS)
                .about("Show the stored session, role and maintenance state")
                .arg(
                    Arg::new(ARG_REFRESH)
                        .long(ARG_REFRESH)
                        .help("Reload the user profile from the backend")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(register())
        .subcommand(
            Command::new(CMD_RESET_PASSWORD)
                .about("Reset a forgotten password with an emailed code")
                .arg(email_arg()),
        )
        .subcommand(account())
}

fn email_arg() -> Arg {
    Arg::new(ARG_EMAIL)
        .short('e')
        .long(ARG_EMAIL)
        .help("Account email address")
        .env("SENTINEL_EMAIL")
        .required(true)
}

fn password_arg() -> Arg {
    Arg::new(ARG_PASSWORD)
        .long(ARG_PASSWORD)
        .help("Account password, prompted for when omitted")
        .env("SENTINEL_PASSWORD")
        .hide_env_values(true)
}

fn login() -> Command {
    Command::new(CMD_LOGIN)
        .about("Sign in: password, emailed code, then MFA when enabled")
        .arg(email_arg())
        .arg(password_arg())
        .arg(
            Arg::new(ARG_RECOVERY)
                .long(ARG_RECOVERY)
                .help("Complete MFA with an emailed recovery code instead of the authenticator")
                .action(ArgAction::SetTrue),
        )
}

fn register() -> Command {
    Command::new(CMD_REGISTER)
        .about("Create an account")
        .arg(
            Arg::new(ARG_NAME)
                .short('n')
                .long(ARG_NAME)
                .help("Display name")
                .required(true),
        )
        .arg(email_arg())
        .arg(password_arg())
}

fn account() -> Command {
    Command::new(CMD_ACCOUNT)
        .about("Manage the signed-in account")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("profile")
                .about("Update profile fields")
                .arg(
                    Arg::new(ARG_SET)
                        .long(ARG_SET)
                        .help("Field assignment, e.g. --set name=Alice")
                        .value_name("KEY=VALUE")
                        .action(ArgAction::Append)
                        .required(true)
                        .value_parser(validator_assignment()),
                ),
        )
        .subcommand(Command::new("change-password").about("Change the account password"))
        .subcommand(
            Command::new("mfa")
                .about("Manage authenticator-based MFA")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("enable").about("Start enrollment and print the secret"))
                .subcommand(
                    Command::new("confirm")
                        .about("Confirm enrollment with a first code")
                        .arg(Arg::new(ARG_CODE).help("Authenticator code").required(true)),
                )
                .subcommand(Command::new("disable").about("Disable MFA (asks for the password)")),
        )
}
