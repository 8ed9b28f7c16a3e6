use crate::{
    cli::{
        actions::{
            Action, account,
            admin::{self as admin_action, NewUser},
            detect, login, session,
        },
        commands::{admin as admin_args, auth, backend, media},
        globals::GlobalArgs,
    },
    config::{DEFAULT_TIMEOUT_SECONDS, default_state_dir},
    features::{
        admin::{AlertStatus, AlertUpdate, AuditFilter, Page},
        user::MediaKind,
    },
};
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use serde_json::{Map, Value};
use std::{path::PathBuf, time::Duration};

fn globals(matches: &ArgMatches) -> GlobalArgs {
    let api_base_url = matches
        .get_one::<String>(backend::ARG_API_BASE_URL)
        .cloned()
        .unwrap_or_else(|| crate::config::DEFAULT_API_BASE_URL.to_string());
    let state_dir = matches
        .get_one::<PathBuf>(backend::ARG_STATE_DIR)
        .cloned()
        .unwrap_or_else(default_state_dir);
    let timeout = matches
        .get_one::<u64>(backend::ARG_TIMEOUT)
        .copied()
        .unwrap_or(DEFAULT_TIMEOUT_SECONDS);

    GlobalArgs::new(api_base_url, state_dir).with_timeout(Duration::from_secs(timeout))
}

fn required(matches: &ArgMatches, id: &str) -> Result<String> {
    matches
        .get_one::<String>(id)
        .cloned()
        .with_context(|| format!("missing required argument: {id}"))
}

fn secret(matches: &ArgMatches, id: &str) -> Option<SecretString> {
    matches
        .get_one::<String>(id)
        .map(|value| SecretString::from(value.clone()))
}

fn assignments(matches: &ArgMatches, id: &str) -> Map<String, Value> {
    matches
        .get_many::<(String, Value)>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

fn page(matches: &ArgMatches) -> Page {
    let defaults = Page::default();
    Page {
        skip: matches
            .get_one::<u32>(admin_args::ARG_SKIP)
            .copied()
            .unwrap_or(defaults.skip),
        limit: matches
            .get_one::<u32>(admin_args::ARG_LIMIT)
            .copied()
            .unwrap_or(defaults.limit),
    }
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let globals = globals(matches);

    match matches.subcommand() {
        Some((auth::CMD_LOGIN, sub)) => Ok(Action::Login(
            globals,
            login::Args {
                email: required(sub, auth::ARG_EMAIL)?,
                password: secret(sub, auth::ARG_PASSWORD),
                recovery: sub.get_flag(auth::ARG_RECOVERY),
            },
        )),
        Some((auth::CMD_LOGOUT, _)) => Ok(Action::Logout(globals)),
        Some((auth::CMD_STATUS, sub)) => Ok(Action::Status(
            globals,
            session::StatusArgs {
                refresh: sub.get_flag(auth::ARG_REFRESH),
            },
        )),
        Some((auth::CMD_REGISTER, sub)) => Ok(Action::Register(
            globals,
            account::RegisterArgs {
                name: required(sub, auth::ARG_NAME)?,
                email: required(sub, auth::ARG_EMAIL)?,
                password: secret(sub, auth::ARG_PASSWORD),
            },
        )),
        Some((auth::CMD_RESET_PASSWORD, sub)) => Ok(Action::ResetPassword(
            globals,
            account::ResetArgs {
                email: required(sub, auth::ARG_EMAIL)?,
            },
        )),
        Some((auth::CMD_ACCOUNT, sub)) => Ok(Action::Account(globals, account_command(sub)?)),
        Some((media::CMD_SETTINGS, _)) => Ok(Action::Settings(globals)),
        Some((media::CMD_WATCH, sub)) => Ok(Action::Watch(
            globals,
            session::WatchArgs {
                interval: sub
                    .get_one::<u64>(media::ARG_INTERVAL)
                    .map(|seconds| Duration::from_secs(*seconds)),
            },
        )),
        Some((media::CMD_STATS, _)) => Ok(Action::Stats(globals)),
        Some((media::CMD_DETECT, sub)) => Ok(Action::Detect(globals, detect_args(sub)?)),
        Some((media::CMD_UPLOAD, sub)) => Ok(Action::Upload(globals, upload_command(sub)?)),
        Some((admin_args::CMD_ADMIN, sub)) => Ok(Action::Admin(globals, admin_command(sub)?)),
        Some((other, _)) => Err(anyhow!("unknown command: {other}")),
        None => Err(anyhow!("no command given, see --help")),
    }
}

fn account_command(matches: &ArgMatches) -> Result<account::Command> {
    match matches.subcommand() {
        Some(("profile", sub)) => Ok(account::Command::Profile(assignments(sub, auth::ARG_SET))),
        Some(("change-password", _)) => Ok(account::Command::ChangePassword),
        Some(("mfa", sub)) => match sub.subcommand() {
            Some(("enable", _)) => Ok(account::Command::EnableMfa),
            Some(("confirm", confirm)) => Ok(account::Command::ConfirmMfa(required(
                confirm,
                auth::ARG_CODE,
            )?)),
            Some(("disable", _)) => Ok(account::Command::DisableMfa),
            _ => Err(anyhow!("unknown mfa command")),
        },
        _ => Err(anyhow!("unknown account command")),
    }
}

fn detect_args(matches: &ArgMatches) -> Result<detect::Args> {
    let (name, sub) = matches
        .subcommand()
        .context("missing detect mode: image, video or live")?;
    let mode = match name {
        "image" => detect::Mode::Upload(MediaKind::Image),
        "video" => detect::Mode::Upload(MediaKind::Video),
        "live" => detect::Mode::Live(sub.get_one::<u64>(media::ARG_FRAMES).copied()),
        other => return Err(anyhow!("unknown detect mode: {other}")),
    };
    let path = sub
        .get_one::<PathBuf>(media::ARG_PATH)
        .cloned()
        .context("missing required argument: path")?;
    Ok(detect::Args { mode, path })
}

fn upload_command(matches: &ArgMatches) -> Result<detect::UploadCommand> {
    match matches.subcommand() {
        Some(("show", sub)) => Ok(detect::UploadCommand::Show(required(sub, media::ARG_UPLOAD_ID)?)),
        Some(("delete", sub)) => Ok(detect::UploadCommand::Delete(required(
            sub,
            media::ARG_UPLOAD_ID,
        )?)),
        _ => Err(anyhow!("unknown upload command")),
    }
}

fn alert_status(value: &str) -> Result<AlertStatus> {
    match value {
        "new" => Ok(AlertStatus::New),
        "reviewed" => Ok(AlertStatus::Reviewed),
        "acknowledged" => Ok(AlertStatus::Acknowledged),
        other => Err(anyhow!("unknown alert status: {other}")),
    }
}

fn admin_command(matches: &ArgMatches) -> Result<admin_action::Command> {
    use admin_action::Command;

    let (name, sub) = matches.subcommand().context("missing admin command")?;
    let id = || required(sub, admin_args::ARG_ID);
    let user_filter = || sub.get_one::<String>(admin_args::ARG_USER).cloned();

    Ok(match name {
        "stats" => Command::Stats,
        "health" => Command::Health,
        "users" => Command::Users(page(sub)),
        "user" => Command::User(id()?),
        "create-user" => Command::CreateUser(NewUser {
            name: required(sub, admin_args::ARG_NAME)?,
            email: required(sub, admin_args::ARG_EMAIL)?,
            password: secret(sub, admin_args::ARG_PASSWORD),
            admin: sub.get_flag(admin_args::ARG_ADMIN),
        }),
        "update-user" => Command::UpdateUser(id()?, assignments(sub, admin_args::ARG_SET)),
        "delete-user" => Command::DeleteUser(id()?),
        "force-logout" => Command::ForceLogout(id()?),
        "reset-mfa" => Command::ResetMfa(id()?),
        "uploads" => Command::Uploads(page(sub), user_filter()),
        "delete-upload" => Command::DeleteUpload(id()?),
        "reprocess" => Command::Reprocess(id()?),
        "alerts" => Command::Alerts(page(sub), user_filter()),
        "update-alert" => Command::UpdateAlert(
            id()?,
            AlertUpdate {
                status: sub
                    .get_one::<String>(admin_args::ARG_STATUS)
                    .map(String::as_str)
                    .map(alert_status)
                    .transpose()?,
                admin_notes: sub.get_one::<String>(admin_args::ARG_NOTES).cloned(),
            },
        ),
        "audit-logs" => Command::AuditLogs(
            page(sub),
            AuditFilter {
                user_id: user_filter(),
                action: sub.get_one::<String>(admin_args::ARG_ACTION).cloned(),
            },
        ),
        "export-alerts" => Command::ExportAlerts,
        "export-audit-logs" => Command::ExportAuditLogs(
            sub.get_many::<String>(admin_args::ARG_IDS)
                .map(|ids| ids.filter(|id| !id.trim().is_empty()).cloned().collect())
                .unwrap_or_default(),
        ),
        "settings" => Command::Settings,
        "update-settings" => Command::UpdateSettings(assignments(sub, admin_args::ARG_SET)),
        other => return Err(anyhow!("unknown admin command: {other}")),
    })
}
