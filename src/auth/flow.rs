//! Login flow orchestration: performs the backend calls behind each login page
//! and feeds their outcome into the [`AuthMachine`].
//!
//! A failed call never moves the machine. The user stays on the same step and
//! may retry, except for maintenance errors, which redirect to the maintenance
//! page.

use super::{
    client,
    guards::dashboard_for,
    resend::ResendCooldown,
    state::{AuthMachine, AuthSnapshot},
    types::{AuthStep, OtpKind, PendingLogin},
};
use crate::{
    api::{ApiClient, ApiError},
    routes::{self, Navigator},
};
use secrecy::SecretString;
use std::{
    fmt,
    sync::{Arc, Mutex, PoisonError},
};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("no login in progress")]
    NoPendingLogin,

    #[error("login is at the {actual} step, expected {expected}")]
    WrongStep { expected: AuthStep, actual: AuthStep },

    #[error("login response did not include a user")]
    MissingUser,

    #[error("login is missing its MFA challenge token")]
    MissingMfaToken,

    #[error("please wait {remaining} seconds before requesting another code")]
    Cooldown { remaining: u64 },
}

pub struct LoginFlow {
    client: ApiClient,
    machine: Arc<AuthMachine>,
    navigator: Arc<dyn Navigator>,
    resend: Mutex<ResendCooldown>,
}

impl fmt::Debug for LoginFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginFlow")
            .field("client", &self.client)
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl LoginFlow {
    #[must_use]
    pub fn new(client: ApiClient, machine: Arc<AuthMachine>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            client,
            machine,
            navigator,
            resend: Mutex::new(ResendCooldown::default()),
        }
    }

    #[must_use]
    pub fn machine(&self) -> &Arc<AuthMachine> {
        &self.machine
    }

    /// Password step. Returns the step the user must complete next.
    ///
    /// # Errors
    /// Returns the API failure or [`FlowError::MissingUser`] when the backend
    /// accepted the password without describing the user.
    pub async fn start(&self, email: &str, password: &SecretString) -> Result<AuthStep, FlowError> {
        let response = client::login(&self.client, email, password)
            .await
            .map_err(|err| self.fail(err))?;

        let user = response.user.clone().ok_or(FlowError::MissingUser)?;
        let state = self.machine.begin_login_flow(
            user,
            response.access_token(),
            response.needs_mfa(),
            response.mfa_token.clone(),
        );

        self.reset_cooldown();
        self.navigator.navigate(step_page(state.step));
        Ok(state.step)
    }

    /// Emails the login code to the pending user.
    ///
    /// # Errors
    /// Fails outside the email-otp step or when the backend rejects the call.
    pub async fn send_email_otp(&self) -> Result<(), FlowError> {
        let pending = self.pending_at(AuthStep::EmailOtp)?;
        client::send_email_otp(&self.client, &pending.user.email)
            .await
            .map_err(|err| self.fail(err))?;
        self.mark_sent();
        debug!("login code sent");
        Ok(())
    }

    /// Checks the emailed code and advances the machine.
    ///
    /// # Errors
    /// Fails outside the email-otp step or when the code is rejected.
    pub async fn verify_email_otp(&self, code: &str) -> Result<AuthSnapshot, FlowError> {
        let pending = self.pending_at(AuthStep::EmailOtp)?;
        client::verify_email_otp(&self.client, &pending.user.email, code.trim())
            .await
            .map_err(|err| self.fail(err))?;

        let state = self.machine.complete_email_otp();
        self.after_step(&state);
        Ok(state)
    }

    /// Checks a TOTP code and completes the login with the issued token.
    ///
    /// # Errors
    /// Fails outside the mfa step or when the code is rejected.
    pub async fn verify_mfa(&self, code: &str) -> Result<AuthSnapshot, FlowError> {
        let pending = self.pending_at(AuthStep::Mfa)?;
        let mfa_token = pending.mfa_token.ok_or(FlowError::MissingMfaToken)?;

        let response = client::verify_mfa(&self.client, code.trim(), &mfa_token)
            .await
            .map_err(|err| self.fail(err))?;

        let state = self
            .machine
            .complete_mfa(response.user.clone(), response.access_token());
        self.after_step(&state);
        Ok(state)
    }

    /// Emails a recovery code in place of the TOTP code.
    ///
    /// # Errors
    /// Fails outside the mfa step or when the challenge token has expired, in
    /// which case the user is sent back to the login page.
    pub async fn initiate_recovery(&self) -> Result<(), FlowError> {
        let pending = self.pending_at(AuthStep::Mfa)?;
        let mfa_token = pending.mfa_token.ok_or(FlowError::MissingMfaToken)?;

        match client::initiate_mfa_recovery(&self.client, &mfa_token).await {
            Ok(_) => {
                self.mark_sent();
                info!("MFA recovery code sent");
                Ok(())
            }
            Err(err) => {
                if err.to_string().contains("expired") {
                    warn!("MFA challenge expired, restarting login");
                    self.navigator.navigate(routes::LOGIN);
                }
                Err(self.fail(err))
            }
        }
    }

    /// Completes MFA with the emailed recovery code.
    ///
    /// # Errors
    /// Fails outside the mfa step or when the code is rejected.
    pub async fn verify_recovery(&self, otp: &str) -> Result<AuthSnapshot, FlowError> {
        let pending = self.pending_at(AuthStep::Mfa)?;
        let mfa_token = pending.mfa_token.ok_or(FlowError::MissingMfaToken)?;

        let response = client::verify_mfa_recovery(&self.client, &mfa_token, otp.trim())
            .await
            .map_err(|err| self.fail(err))?;

        let state = self
            .machine
            .complete_mfa(response.user.clone(), response.access_token());
        self.after_step(&state);
        Ok(state)
    }

    /// Requests a new code for the pending user, at most once per cooldown.
    ///
    /// # Errors
    /// Returns [`FlowError::Cooldown`] while the previous code is still fresh.
    pub async fn resend_otp(&self, kind: OtpKind) -> Result<(), FlowError> {
        let state = self.machine.state();
        let pending = state.pending.ok_or(FlowError::NoPendingLogin)?;

        let remaining = self
            .resend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remaining();
        if !remaining.is_zero() {
            return Err(FlowError::Cooldown {
                remaining: remaining.as_secs().max(1),
            });
        }

        client::resend_otp(&self.client, &pending.user.email, kind)
            .await
            .map_err(|err| self.fail(err))?;
        self.mark_sent();
        Ok(())
    }

    fn pending_at(&self, expected: AuthStep) -> Result<PendingLogin, FlowError> {
        let state = self.machine.state();
        let pending = state.pending.ok_or(FlowError::NoPendingLogin)?;
        if state.step != expected {
            return Err(FlowError::WrongStep {
                expected,
                actual: state.step,
            });
        }
        Ok(pending)
    }

    fn after_step(&self, state: &AuthSnapshot) {
        match state.step {
            AuthStep::Mfa => self.navigator.navigate(routes::MFA),
            AuthStep::EmailOtp => self.navigator.navigate(routes::EMAIL_OTP),
            AuthStep::Idle => {
                self.reset_cooldown();
                if state.user.is_some() {
                    self.navigator.navigate(dashboard_for(state.role));
                } else {
                    self.navigator.navigate(routes::LOGIN);
                }
            }
        }
    }

    fn fail(&self, err: ApiError) -> FlowError {
        if err.is_maintenance() {
            warn!("backend is in maintenance mode");
            self.navigator.navigate(routes::MAINTENANCE);
        }
        FlowError::Api(err)
    }

    fn mark_sent(&self) {
        self.resend
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .mark_sent();
    }

    fn reset_cooldown(&self) {
        *self.resend.lock().unwrap_or_else(PoisonError::into_inner) = ResendCooldown::default();
    }
}

const fn step_page(step: AuthStep) -> &'static str {
    match step {
        AuthStep::Mfa => routes::MFA,
        AuthStep::EmailOtp => routes::EMAIL_OTP,
        AuthStep::Idle => routes::LOGIN,
    }
}
