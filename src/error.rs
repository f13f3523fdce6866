use thiserror::Error;

/// Why a session authorization refused an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The (target, selector) pair is not in the session's whitelist.
    OutOfScope,
    /// The session deadline has passed (or the session was revoked).
    Expired,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::OutOfScope => write!(f, "out of scope"),
            DenyReason::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WalletError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(DenyReason),
    #[error("Account address not resolved yet")]
    NotInitialized,
    #[error("Initialization already in flight for this account")]
    AlreadyInitializing,
    #[error("Missing or invalid owner user id: {0}")]
    MissingOwner(String),
    #[error("Primary authorization already registered for this account")]
    AlreadyRegistered,
    #[error("Invalid scope: {0}")]
    InvalidScope(String),
    #[error("Account deployment failed: {0}")]
    DeploymentFailed(String),
    #[error("Execution failed: {0}")]
    Execution(String),
    #[error("HTTP request failed: {0}")]
    Http(String),
}
