pub mod account;
pub mod admin;
pub mod detect;
pub mod login;
pub mod session;

mod output;
mod prompt;

// Internal "interpreter" for `Action`, kept apart so this file only lists them.
mod run;

use crate::cli::globals::GlobalArgs;

#[derive(Debug)]
pub enum Action {
    Login(GlobalArgs, login::Args),
    Logout(GlobalArgs),
    Status(GlobalArgs, session::StatusArgs),
    Register(GlobalArgs, account::RegisterArgs),
    ResetPassword(GlobalArgs, account::ResetArgs),
    Account(GlobalArgs, account::Command),
    Settings(GlobalArgs),
    Watch(GlobalArgs, session::WatchArgs),
    Stats(GlobalArgs),
    Detect(GlobalArgs, detect::Args),
    Upload(GlobalArgs, detect::UploadCommand),
    Admin(GlobalArgs, admin::Command),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
