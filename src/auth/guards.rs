//! Route guards as pure functions of an [`AuthSnapshot`].
//!
//! These are UX guards only; the backend enforces access on every call.

use super::{
    state::AuthSnapshot,
    types::{AuthStep, Role},
};
use crate::routes;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state is still loading; render nothing yet.
    Wait,
    Allow,
    Redirect(&'static str),
}

/// Guard for pages that need a signed-in user, optionally with given roles.
#[must_use]
pub fn protected_route(state: &AuthSnapshot, allowed_roles: Option<&[Role]>) -> GuardDecision {
    if state.loading {
        return GuardDecision::Wait;
    }
    if state.maintenance && state.role != Role::Admin {
        return GuardDecision::Redirect(routes::MAINTENANCE);
    }
    if state.user.is_none() {
        return GuardDecision::Redirect(routes::LOGIN);
    }
    if let Some(roles) = allowed_roles
        && !roles.contains(&state.role)
    {
        return GuardDecision::Redirect(routes::HOME);
    }
    GuardDecision::Allow
}

/// Guard for login and registration pages: signed-in users go to their
/// dashboard.
#[must_use]
pub fn redirect_if_authenticated(state: &AuthSnapshot) -> GuardDecision {
    if state.loading {
        return GuardDecision::Wait;
    }
    if state.user.is_some() {
        return GuardDecision::Redirect(dashboard_for(state.role));
    }
    GuardDecision::Allow
}

/// App-wide guard: during maintenance non-admins only see landing pages, auth
/// pages and the maintenance page.
#[must_use]
pub fn maintenance_guard(state: &AuthSnapshot, path: &str) -> GuardDecision {
    if state.loading {
        return GuardDecision::Wait;
    }
    if !state.maintenance || state.role == Role::Admin || open_during_maintenance(path) {
        return GuardDecision::Allow;
    }
    GuardDecision::Redirect(routes::MAINTENANCE)
}

/// Guard for the email-code and MFA pages: they only make sense while a login
/// is pending at that step.
#[must_use]
pub fn login_step_guard(state: &AuthSnapshot, step: AuthStep) -> GuardDecision {
    if state.pending.is_some() && state.step == step {
        GuardDecision::Allow
    } else {
        GuardDecision::Redirect(routes::LOGIN)
    }
}

#[must_use]
pub const fn dashboard_for(role: Role) -> &'static str {
    match role {
        Role::Admin => routes::ADMIN_DASHBOARD,
        Role::User => routes::USER_DASHBOARD,
        Role::Guest => routes::HOME,
    }
}

fn open_during_maintenance(path: &str) -> bool {
    let path = match path.trim_end_matches('/') {
        "" => routes::HOME,
        trimmed => trimmed,
    };
    path == routes::MAINTENANCE
        || routes::PUBLIC_PAGES.contains(&path)
        || routes::AUTH_PAGES.contains(&path)
}
