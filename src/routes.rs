//! Navigation targets and the [`Navigator`] seam used for redirects.

use tracing::info;

pub const HOME: &str = "/";
pub const ABOUT: &str = "/about";
pub const FEATURES: &str = "/features";
pub const CONTACT: &str = "/contact";
pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";
pub const FORGOT_PASSWORD: &str = "/forgot-password";
pub const EMAIL_OTP: &str = "/email-otp";
pub const MFA: &str = "/mfa";
pub const MAINTENANCE: &str = "/maintenance";
pub const ADMIN_DASHBOARD: &str = "/admin/dashboard";
pub const USER_DASHBOARD: &str = "/user/dashboard";

/// Landing pages reachable by anyone, even during maintenance.
pub const PUBLIC_PAGES: &[&str] = &[HOME, ABOUT, FEATURES, CONTACT];

/// Pages of the login, registration and recovery flows.
pub const AUTH_PAGES: &[&str] = &[LOGIN, REGISTER, FORGOT_PASSWORD, EMAIL_OTP, MFA];

/// Receives redirect requests from the API client, the login flow and guards.
pub trait Navigator: Send + Sync {
    fn navigate(&self, path: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn navigate(&self, path: &str) {
        self(path);
    }
}

/// Navigator for headless use: redirects are only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, path: &str) {
        info!(path, "navigation requested");
    }
}
