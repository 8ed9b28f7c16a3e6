//! Authentication: domain types, the login state machine, route guards and
//! the login flow that drives them against the backend.

pub mod client;
pub mod flow;
pub mod guards;
pub mod resend;
pub mod state;
pub mod types;

pub use self::flow::{FlowError, LoginFlow};
pub use self::guards::GuardDecision;
pub use self::state::{AuthMachine, AuthSnapshot};
pub use self::types::{AuthStep, PendingLogin, Role, User};
