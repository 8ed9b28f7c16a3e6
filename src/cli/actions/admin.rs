use super::output::{print_json, print_text};
use crate::{
    auth::Role,
    cli::globals::GlobalArgs,
    features::admin::{self, AlertUpdate, AuditFilter, Page},
};
use anyhow::{Result, bail};
use secrecy::SecretString;
use serde_json::{Map, Value};

#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: Option<SecretString>,
    pub admin: bool,
}

#[derive(Debug)]
pub enum Command {
    Stats,
    Health,
    Users(Page),
    User(String),
    CreateUser(NewUser),
    UpdateUser(String, Map<String, Value>),
    DeleteUser(String),
    ForceLogout(String),
    ResetMfa(String),
    Uploads(Page, Option<String>),
    DeleteUpload(String),
    Reprocess(String),
    Alerts(Page, Option<String>),
    UpdateAlert(String, AlertUpdate),
    AuditLogs(Page, AuditFilter),
    ExportAlerts,
    ExportAuditLogs(Vec<String>),
    Settings,
    UpdateSettings(Map<String, Value>),
}

/// Runs an admin command. The stored session must belong to an administrator;
/// the backend enforces this too.
/// # Errors
/// Returns an error for non-admin sessions and API failures.
pub async fn execute(globals: &GlobalArgs, command: Command) -> Result<()> {
    let context = globals.connect()?;
    let role = context.machine.state().role;
    if role != Role::Admin {
        bail!("admin commands need an administrator session (current role: {role})");
    }
    let client = &context.client;

    match command {
        Command::Stats => print_json(&admin::stats(client).await?),
        Command::Health => print_json(&admin::system_health(client).await?),
        Command::Users(page) => print_json(&admin::list_users(client, page).await?),
        Command::User(id) => print_json(&admin::get_user(client, &id).await?),
        Command::CreateUser(user) => print_json(
            &admin::create_user(
                client,
                &user.name,
                &user.email,
                user.password.as_ref(),
                user.admin,
            )
            .await?,
        ),
        Command::UpdateUser(id, changes) => {
            print_json(&admin::update_user(client, &id, &changes).await?)
        }
        Command::DeleteUser(id) => print_json(&admin::delete_user(client, &id).await?),
        Command::ForceLogout(id) => print_json(&admin::force_logout(client, &id).await?),
        Command::ResetMfa(id) => print_json(&admin::reset_mfa(client, &id).await?),
        Command::Uploads(page, user) => {
            print_json(&admin::list_uploads(client, page, user.as_deref()).await?)
        }
        Command::DeleteUpload(id) => print_json(&admin::delete_upload(client, &id).await?),
        Command::Reprocess(id) => print_json(&admin::reprocess_upload(client, &id).await?),
        Command::Alerts(page, user) => {
            print_json(&admin::list_alerts(client, page, user.as_deref()).await?)
        }
        Command::UpdateAlert(id, update) => {
            print_json(&admin::update_alert(client, &id, &update).await?)
        }
        Command::AuditLogs(page, filter) => {
            print_json(&admin::list_audit_logs(client, page, &filter).await?)
        }
        Command::ExportAlerts => print_text(&admin::export_alerts(client).await?),
        Command::ExportAuditLogs(ids) => print_text(&admin::export_audit_logs(client, &ids).await?),
        Command::Settings => print_json(&admin::settings(client).await?),
        Command::UpdateSettings(changes) => {
            print_json(&admin::update_settings(client, &changes).await?)
        }
    }
}
