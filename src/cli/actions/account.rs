use super::{login::is_valid_email, output::print_json, prompt::Prompt};
use crate::{auth::client, cli::globals::GlobalArgs, features::user};
use anyhow::{Result, bail};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use tracing::info;

#[derive(Debug)]
pub struct RegisterArgs {
    pub name: String,
    pub email: String,
    pub password: Option<SecretString>,
}

#[derive(Debug)]
pub struct ResetArgs {
    pub email: String,
}

#[derive(Debug)]
pub enum Command {
    Profile(Map<String, Value>),
    ChangePassword,
    EnableMfa,
    ConfirmMfa(String),
    DisableMfa,
}

/// # Errors
/// Returns an error if the input is invalid or the backend rejects it.
pub async fn register(globals: &GlobalArgs, args: RegisterArgs) -> Result<()> {
    let email = args.email.trim();
    if !is_valid_email(email) {
        bail!("invalid email address: {email}");
    }

    let context = globals.connect()?;
    let password = match args.password {
        Some(password) => password,
        None => Prompt::stdin().new_secret("Password").await?,
    };

    let created = client::register(&context.client, args.name.trim(), email, &password).await?;
    info!(email, "account created");
    print_json(&created)
}

/// Emailed-code password reset, fully interactive.
/// # Errors
/// Returns an error if a code is rejected or the new passwords differ.
pub async fn reset_password(globals: &GlobalArgs, args: ResetArgs) -> Result<()> {
    let email = args.email.trim();
    if !is_valid_email(email) {
        bail!("invalid email address: {email}");
    }

    let context = globals.connect()?;
    let mut prompt = Prompt::stdin();

    client::request_password_reset(&context.client, email).await?;
    prompt.say("A reset code was sent to your email.").await?;

    let otp = prompt.ask("Reset code").await?;
    let verified = client::verify_password_reset_otp(&context.client, email, &otp).await?;
    let reset_token = SecretString::from(verified.reset_token);

    let new_password = prompt.new_secret("New password").await?;
    let response = client::reset_password(&context.client, &reset_token, &new_password).await?;
    print_json(&response)
}

/// # Errors
/// Returns the API failure.
pub async fn execute(globals: &GlobalArgs, command: Command) -> Result<()> {
    let context = globals.connect()?;
    if context.machine.state().user.is_none() {
        bail!("not signed in, run `sentinel login` first");
    }

    match command {
        Command::Profile(changes) => {
            let stored = client::update_profile(&context.client, &changes).await?;
            // Prefer the user the backend returns; fall back to the request.
            let merged = match stored {
                Value::Object(fields) if !fields.is_empty() => fields,
                _ => changes,
            };
            let state = context.machine.update_user(&merged);
            print_json(&state.user)
        }
        Command::ChangePassword => {
            let mut prompt = Prompt::stdin();
            let current = prompt.secret("Current password").await?;
            let new_password = prompt.new_secret("New password").await?;
            if current.expose_secret() == new_password.expose_secret() {
                bail!("the new password must differ from the current one");
            }
            print_json(&user::change_password(&context.client, &current, &new_password).await?)
        }
        Command::EnableMfa => {
            let enrollment = client::enable_mfa(&context.client).await?;
            print_json(&enrollment)
        }
        Command::ConfirmMfa(code) => {
            let response = client::confirm_mfa(&context.client, code.trim()).await?;
            context.machine.update_user(&mfa_flag(true));
            print_json(&response)
        }
        Command::DisableMfa => {
            let password = Prompt::stdin().secret("Password").await?;
            let response = client::disable_mfa(&context.client, &password).await?;
            context.machine.update_user(&mfa_flag(false));
            print_json(&response)
        }
    }
}

fn mfa_flag(enabled: bool) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("mfa_enabled".to_string(), json!(enabled));
    fields
}
