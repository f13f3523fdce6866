//! Per-account authorization registry
//!
//! Holds the account's single primary credential and any number of session
//! credentials. Callers get cheap `Authorization` handles; every permission
//! check goes back through the registry so revocation and deadline changes
//! are observed immediately, including by operations built earlier.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use super::scope::Scope;
use crate::account::{Address, Selector};
use crate::error::{DenyReason, WalletError};

/// A contract call a credential wants to make.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub target: Address,
    pub selector: Selector,
}

impl Action {
    pub fn new(target: &str, selector: &str) -> Self {
        Self {
            target: target.to_string(),
            selector: selector.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthKind {
    Primary,
    Session,
}

/// Handle to a credential held by the registry. Deliberately carries no
/// scope or deadline of its own: those live in the registry record so a
/// revoke is seen by every handle already in flight.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    id: Uuid,
    user_id: String,
    kind: AuthKind,
}

impl Authorization {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_primary(&self) -> bool {
        self.kind == AuthKind::Primary
    }
}

/// A session prepared but not yet active: it only starts resolving once the
/// operation that registers it on chain confirms.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PendingSession {
    auth: Authorization,
    scope: Scope,
    expires_at: DateTime<Utc>,
    signer_pubkey: String,
}

impl PendingSession {
    pub fn authorization(&self) -> &Authorization {
        &self.auth
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

#[derive(Clone, Debug)]
enum AuthRecord {
    Primary {
        user_id: String,
    },
    Session {
        scope: Scope,
        expires_at: DateTime<Utc>,
        #[allow(dead_code)]
        signer_pubkey: String,
    },
}

#[derive(Default)]
struct RegistryState {
    primary: Option<Uuid>,
    records: HashMap<Uuid, AuthRecord>,
}

/// One instance per account. There is intentionally no process-wide
/// authorization table.
pub struct AuthorizationRegistry {
    inner: Mutex<RegistryState>,
}

impl AuthorizationRegistry {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryState::default()),
        }
    }

    /// Register the unrestricted owner credential. One per account lifetime.
    pub fn register_primary(&self, user_id: &str) -> Result<Authorization, WalletError> {
        if user_id.trim().is_empty() {
            return Err(WalletError::MissingOwner("empty user id".to_string()));
        }
        let mut state = self.inner.lock().unwrap();
        if state.primary.is_some() {
            return Err(WalletError::AlreadyRegistered);
        }
        let auth = Authorization {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            kind: AuthKind::Primary,
        };
        state.primary = Some(auth.id);
        state.records.insert(
            auth.id,
            AuthRecord::Primary {
                user_id: user_id.to_string(),
            },
        );
        info!(user = user_id, "primary authorization registered");
        Ok(auth)
    }

    /// Validate scope and ttl and mint fresh session key material, without
    /// activating anything. `activate` (or `create_session`) completes it.
    pub fn prepare_session(
        &self,
        primary: &Authorization,
        scope: Scope,
        ttl: Duration,
    ) -> Result<PendingSession, WalletError> {
        self.require_primary(primary)?;
        if scope.is_empty() {
            return Err(WalletError::InvalidScope(
                "target whitelist is empty".to_string(),
            ));
        }
        if ttl <= Duration::zero() {
            return Err(WalletError::Validation("ttl must be positive".to_string()));
        }

        let mut seed = [0u8; 32];
        thread_rng().fill(&mut seed);
        let signer_pubkey = hex::encode(Sha256::digest(seed));
        let user_id = format!("0x{}", &signer_pubkey[..40]);

        Ok(PendingSession {
            auth: Authorization {
                id: Uuid::new_v4(),
                user_id,
                kind: AuthKind::Session,
            },
            scope,
            expires_at: Utc::now() + ttl,
            signer_pubkey,
        })
    }

    /// Make a prepared session resolvable. Called directly for local-only
    /// sessions, or by the execution engine once the registering operation
    /// confirms on chain.
    pub fn activate(&self, pending: PendingSession) -> Authorization {
        let mut state = self.inner.lock().unwrap();
        state.records.insert(
            pending.auth.id,
            AuthRecord::Session {
                scope: pending.scope,
                expires_at: pending.expires_at,
                signer_pubkey: pending.signer_pubkey,
            },
        );
        info!(
            session = %pending.auth.id,
            user = pending.auth.user_id.as_str(),
            expires_at = %pending.expires_at,
            "session authorization active"
        );
        pending.auth
    }

    /// Prepare and immediately activate a session credential.
    pub fn create_session(
        &self,
        primary: &Authorization,
        scope: Scope,
        ttl: Duration,
    ) -> Result<Authorization, WalletError> {
        let pending = self.prepare_session(primary, scope, ttl)?;
        Ok(self.activate(pending))
    }

    /// Permission check: primary always passes; a session passes iff the
    /// action is inside its whitelist and the deadline has not passed.
    pub fn resolve(&self, auth: &Authorization, action: &Action) -> Result<(), WalletError> {
        self.resolve_at(auth, action, Utc::now())
    }

    pub(crate) fn resolve_at(
        &self,
        auth: &Authorization,
        action: &Action,
        now: DateTime<Utc>,
    ) -> Result<(), WalletError> {
        let state = self.inner.lock().unwrap();
        match state.records.get(&auth.id()) {
            Some(AuthRecord::Primary { .. }) => Ok(()),
            Some(AuthRecord::Session {
                scope, expires_at, ..
            }) => {
                if now >= *expires_at {
                    debug!(session = %auth.id(), "resolve denied: expired");
                    return Err(WalletError::PermissionDenied(DenyReason::Expired));
                }
                if !scope.permits(&action.target, &action.selector) {
                    debug!(
                        session = %auth.id(),
                        target = action.target.as_str(),
                        selector = action.selector.as_str(),
                        "resolve denied: out of scope"
                    );
                    return Err(WalletError::PermissionDenied(DenyReason::OutOfScope));
                }
                Ok(())
            }
            // Unknown here means never activated (or foreign registry)
            None => Err(WalletError::PermissionDenied(DenyReason::OutOfScope)),
        }
    }

    /// Expire a session immediately. Every later resolve is denied, also for
    /// operations that were built while the session was still valid.
    pub fn revoke(&self, session: &Authorization) -> Result<(), WalletError> {
        if session.is_primary() {
            return Err(WalletError::Validation(
                "primary authorization cannot be revoked".to_string(),
            ));
        }
        let mut state = self.inner.lock().unwrap();
        match state.records.get_mut(&session.id()) {
            Some(AuthRecord::Session { expires_at, .. }) => {
                *expires_at = Utc::now();
                info!(session = %session.id(), "session authorization revoked");
                Ok(())
            }
            _ => Err(WalletError::Validation(format!(
                "unknown authorization {}",
                session.id()
            ))),
        }
    }

    fn require_primary(&self, auth: &Authorization) -> Result<(), WalletError> {
        let state = self.inner.lock().unwrap();
        match state.records.get(&auth.id()) {
            Some(AuthRecord::Primary { .. }) => Ok(()),
            _ => Err(WalletError::Validation(
                "session creation requires the primary authorization".to_string(),
            )),
        }
    }
}

impl Default for AuthorizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_primary() -> (AuthorizationRegistry, Authorization) {
        let registry = AuthorizationRegistry::new();
        let primary = registry.register_primary("0xabc").unwrap();
        (registry, primary)
    }

    #[test]
    fn test_primary_is_unique_per_account() {
        let (registry, _) = registry_with_primary();
        assert_eq!(
            registry.register_primary("0xabc"),
            Err(WalletError::AlreadyRegistered)
        );
    }

    #[test]
    fn test_primary_always_permitted() {
        let (registry, primary) = registry_with_primary();
        assert!(registry
            .resolve(&primary, &Action::new("0xanything", "anything"))
            .is_ok());
    }

    #[test]
    fn test_empty_scope_rejected() {
        let (registry, primary) = registry_with_primary();
        let err = registry
            .create_session(&primary, Scope::new(), Duration::seconds(3600))
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidScope(_)));
    }

    #[test]
    fn test_non_positive_ttl_rejected() {
        let (registry, primary) = registry_with_primary();
        let scope = Scope::new().allow_action("0xusdc", "transfer");
        assert!(matches!(
            registry.create_session(&primary, scope, Duration::zero()),
            Err(WalletError::Validation(_))
        ));
    }

    #[test]
    fn test_session_requires_primary_handle() {
        let (registry, primary) = registry_with_primary();
        let scope = Scope::new().allow_action("0xusdc", "transfer");
        let session = registry
            .create_session(&primary, scope.clone(), Duration::seconds(10))
            .unwrap();
        assert!(matches!(
            registry.create_session(&session, scope, Duration::seconds(10)),
            Err(WalletError::Validation(_))
        ));
    }

    #[test]
    fn test_session_scope_and_deadline() {
        let (registry, primary) = registry_with_primary();
        let scope = Scope::new().allow_action("0xusdc", "transfer");
        let session = registry
            .create_session(&primary, scope, Duration::seconds(3600))
            .unwrap();

        let transfer = Action::new("0xusdc", "transfer");
        let now = Utc::now();

        // In scope and before the deadline
        assert!(registry.resolve_at(&session, &transfer, now).is_ok());
        assert!(registry
            .resolve_at(&session, &transfer, now + Duration::seconds(3599))
            .is_ok());

        // Identical call one second past the deadline
        assert_eq!(
            registry.resolve_at(&session, &transfer, now + Duration::seconds(3601)),
            Err(WalletError::PermissionDenied(DenyReason::Expired))
        );

        // Selector and target outside the whitelist
        assert_eq!(
            registry.resolve_at(&session, &Action::new("0xusdc", "approve"), now),
            Err(WalletError::PermissionDenied(DenyReason::OutOfScope))
        );
        assert_eq!(
            registry.resolve_at(&session, &Action::new("0xdai", "transfer"), now),
            Err(WalletError::PermissionDenied(DenyReason::OutOfScope))
        );
    }

    #[tokio::test]
    async fn test_deadline_enforced_with_real_clock() {
        let (registry, primary) = registry_with_primary();
        let scope = Scope::new().allow_action("0xusdc", "transfer");
        let session = registry
            .create_session(&primary, scope, Duration::seconds(1))
            .unwrap();
        let action = Action::new("0xusdc", "transfer");

        assert!(registry.resolve(&session, &action).is_ok());
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert_eq!(
            registry.resolve(&session, &action),
            Err(WalletError::PermissionDenied(DenyReason::Expired))
        );
    }

    #[test]
    fn test_revoke_is_immediate() {
        let (registry, primary) = registry_with_primary();
        let scope = Scope::new().allow_action("0xusdc", "transfer");
        let session = registry
            .create_session(&primary, scope, Duration::seconds(3600))
            .unwrap();
        let action = Action::new("0xusdc", "transfer");

        assert!(registry.resolve(&session, &action).is_ok());
        registry.revoke(&session).unwrap();
        assert_eq!(
            registry.resolve(&session, &action),
            Err(WalletError::PermissionDenied(DenyReason::Expired))
        );
    }

    #[test]
    fn test_primary_cannot_be_revoked() {
        let (registry, primary) = registry_with_primary();
        assert!(matches!(
            registry.revoke(&primary),
            Err(WalletError::Validation(_))
        ));
    }

    #[test]
    fn test_pending_session_denied_until_activated() {
        let (registry, primary) = registry_with_primary();
        let scope = Scope::new().allow_action("0xusdc", "transfer");
        let pending = registry
            .prepare_session(&primary, scope, Duration::seconds(3600))
            .unwrap();
        let handle = pending.authorization().clone();
        let action = Action::new("0xusdc", "transfer");

        assert_eq!(
            registry.resolve(&handle, &action),
            Err(WalletError::PermissionDenied(DenyReason::OutOfScope))
        );

        registry.activate(pending);
        assert!(registry.resolve(&handle, &action).is_ok());
    }

    #[test]
    fn test_session_user_id_is_fresh() {
        let (registry, primary) = registry_with_primary();
        let scope = Scope::new().allow_action("0xusdc", "transfer");
        let a = registry
            .prepare_session(&primary, scope.clone(), Duration::seconds(10))
            .unwrap();
        let b = registry
            .prepare_session(&primary, scope, Duration::seconds(10))
            .unwrap();
        assert_ne!(a.authorization().user_id(), b.authorization().user_id());
        assert!(a.authorization().user_id().starts_with("0x"));
    }
}
