use crate::cli::actions::{Action, account, admin, detect, login, session};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point: a new `Action::*` variant gets its arm here.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    match action {
        Action::Login(globals, args) => login::execute(&globals, args).await,
        Action::Logout(globals) => session::logout(&globals).await,
        Action::Status(globals, args) => session::status(&globals, args).await,
        Action::Register(globals, args) => account::register(&globals, args).await,
        Action::ResetPassword(globals, args) => account::reset_password(&globals, args).await,
        Action::Account(globals, command) => account::execute(&globals, command).await,
        Action::Settings(globals) => session::settings(&globals).await,
        Action::Watch(globals, args) => session::watch(&globals, args).await,
        Action::Stats(globals) => detect::stats(&globals).await,
        Action::Detect(globals, args) => detect::execute(&globals, args).await,
        Action::Upload(globals, command) => detect::upload(&globals, command).await,
        Action::Admin(globals, command) => admin::execute(&globals, command).await,
    }
}
