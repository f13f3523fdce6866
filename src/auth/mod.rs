//! Authorization module
//!
//! Primary (unrestricted) and session (scoped, time-limited) credentials,
//! with deny-by-default permission resolution and immediate revocation.

pub mod registry;
pub mod scope;

pub use registry::{Action, AuthKind, Authorization, AuthorizationRegistry, PendingSession};
pub use scope::Scope;
