//! REST client for the Sentinel backend: bearer injection, error
//! normalization and the global 401 policy.

mod client;
mod errors;

pub use self::client::{ApiClient, SessionGate};
pub use self::errors::{
    ApiError, MAX_ERROR_CHARS, REQUEST_FAILED, UPLOAD_FAILED, classify_failure, detail_message,
    is_business_unauthorized, sanitize_message,
};
