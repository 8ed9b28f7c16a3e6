//! Typed wrappers for the user and admin surfaces of the backend, plus the
//! live detection loop.

pub mod admin;
pub mod live;
pub mod user;
