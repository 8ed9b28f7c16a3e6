//! # Sentinel (Ob AI Sentinel console client)
//!
//! `sentinel` owns the client-side authentication and session state of the
//! Ob AI Sentinel detection platform and drives it against the platform's REST
//! backend.
//!
//! ## Session
//!
//! The session (`{ user, token }`) lives in a durable key-value store under the
//! key `auth` and is mirrored in memory. Both are always written together; a
//! failed durable write leaves the mirror untouched.
//!
//! ## Login flow
//!
//! Login is a multi-step state machine: password, then an emailed one-time
//! code, then (for MFA-enabled accounts) a TOTP code or an emailed recovery
//! code. Intermediate credentials are staged in memory only and never reach
//! durable storage until the flow completes.
//!
//! ## Guards and maintenance
//!
//! Route guards are pure functions of the auth state. A background poller reads
//! `/system/settings` every 10 seconds and flips the maintenance flag; while it
//! is set, only administrators get past the guards.
//!
//! ## API client
//!
//! All backend calls go through [`api::ApiClient`], which attaches the bearer
//! token, normalizes failures into [`api::ApiError`] and applies the global 401
//! policy: unknown 401 responses clear the session and redirect to `/login`.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod features;
pub mod maintenance;
pub mod routes;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
