use super::{output::print_json, prompt::Prompt};
use crate::{
    api::ApiError,
    auth::{AuthSnapshot, AuthStep, FlowError, LoginFlow, guards::dashboard_for, types::OtpKind},
    cli::globals::GlobalArgs,
};
use anyhow::{Result, bail};
use regex::Regex;
use secrecy::SecretString;
use serde_json::json;
use tokio::io::AsyncBufRead;
use tracing::{debug, info};

/// Wrong codes tolerated per step before giving up.
const MAX_CODE_ATTEMPTS: u8 = 3;
const RESEND: &str = "resend";

#[derive(Debug)]
pub struct Args {
    pub email: String,
    pub password: Option<SecretString>,
    pub recovery: bool,
}

#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").is_ok_and(|re| re.is_match(email))
}

/// Execute the login action.
/// # Errors
/// Returns an error if a step is rejected too often or the backend fails.
pub async fn execute(globals: &GlobalArgs, args: Args) -> Result<()> {
    let email = args.email.trim();
    if !is_valid_email(email) {
        bail!("invalid email address: {email}");
    }

    let context = globals.connect()?;
    if let Some(user) = context.machine.state().user {
        info!(email = %user.email, "replacing the stored session");
    }

    let mut prompt = Prompt::stdin();
    let password = match args.password {
        Some(password) => password,
        None => prompt.secret("Password").await?,
    };

    let flow = context.login_flow();
    let step = flow.start(email, &password).await?;
    debug!(%step, "password accepted");

    let state = complete(&flow, &mut prompt, args.recovery).await?;
    let user = state.user.as_ref();
    print_json(&json!({
        "email": user.map(|u| u.email.as_str()),
        "name": user.and_then(|u| u.name.as_deref()),
        "role": state.role.to_string(),
        "dashboard": dashboard_for(state.role),
    }))
}

/// Walks the remaining login steps until the machine is idle again.
async fn complete<R>(flow: &LoginFlow, prompt: &mut Prompt<R>, recovery: bool) -> Result<AuthSnapshot>
where
    R: AsyncBufRead + Unpin,
{
    let mut failures = 0_u8;
    let mut email_sent = false;
    let mut recovery_sent = false;

    loop {
        let state = flow.machine().state();
        let outcome = match state.step {
            AuthStep::Idle => {
                if state.user.is_none() {
                    bail!("login could not be completed");
                }
                return Ok(state);
            }
            AuthStep::EmailOtp => {
                if !email_sent {
                    flow.send_email_otp().await?;
                    email_sent = true;
                    prompt.say("A login code was sent to your email.").await?;
                }
                let code = prompt.ask("Email code (or 'resend')").await?;
                if code.eq_ignore_ascii_case(RESEND) {
                    resend(flow, prompt, OtpKind::Login).await?;
                    continue;
                }
                flow.verify_email_otp(&code).await.map(drop)
            }
            AuthStep::Mfa if recovery => {
                if !recovery_sent {
                    flow.initiate_recovery().await?;
                    recovery_sent = true;
                    prompt.say("A recovery code was sent to your email.").await?;
                }
                let code = prompt.ask("Recovery code (or 'resend')").await?;
                if code.eq_ignore_ascii_case(RESEND) {
                    resend(flow, prompt, OtpKind::MfaRecovery).await?;
                    continue;
                }
                flow.verify_recovery(&code).await.map(drop)
            }
            AuthStep::Mfa => {
                let code = prompt.ask("Authenticator code").await?;
                flow.verify_mfa(&code).await.map(drop)
            }
        };

        match outcome {
            Ok(()) => failures = 0,
            Err(FlowError::Api(ApiError::Business { message, .. }))
                if failures + 1 < MAX_CODE_ATTEMPTS =>
            {
                failures += 1;
                prompt.say(&format!("{message}. Try again.")).await?;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn resend<R>(flow: &LoginFlow, prompt: &Prompt<R>, kind: OtpKind) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    match flow.resend_otp(kind).await {
        Ok(()) => prompt.say("A new code is on its way.").await,
        Err(err @ FlowError::Cooldown { .. }) => prompt.say(&err.to_string()).await,
        Err(err) => Err(err.into()),
    }
}
