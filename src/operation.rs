//! Operation construction
//!
//! An `Operation` is an immutable, permission-checked intent to change
//! on-chain state. The builder runs every action kind through the
//! account's authorization registry before construction; the execution
//! engine re-checks at submit time.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::{Account, AccountKey, Address, Asset};
use crate::auth::{Action, Authorization, AuthorizationRegistry, PendingSession, Scope};
use crate::error::WalletError;
use std::sync::Arc;

pub const SELECTOR_SWAP: &str = "swap";
pub const SELECTOR_TRANSFER: &str = "transfer";
pub const SELECTOR_ADD_SESSION: &str = "addSessionKey";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Swap,
    Transfer,
    CreateSession,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Swap => write!(f, "swap"),
            OperationKind::Transfer => write!(f, "transfer"),
            OperationKind::CreateSession => write!(f, "create_session"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum OperationParams {
    Swap {
        token_in: Asset,
        token_out: Asset,
        amount_in: Decimal,
    },
    Transfer {
        token: Address,
        amount: Decimal,
        to: Address,
    },
    CreateSession {
        pending: PendingSession,
    },
}

/// Immutable after construction: private fields, accessors only.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Operation {
    id: Uuid,
    kind: OperationKind,
    authorization: Authorization,
    account_key: AccountKey,
    sender: Address,
    action: Action,
    params: OperationParams,
    created_at: DateTime<Utc>,
}

impl Operation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn authorization(&self) -> &Authorization {
        &self.authorization
    }

    pub fn account_key(&self) -> &AccountKey {
        &self.account_key
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn params(&self) -> &OperationParams {
        &self.params
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Builds operations against one account's registry. The swap router
/// address is configuration (ABI data itself stays external).
pub struct OperationBuilder {
    registry: Arc<AuthorizationRegistry>,
    swap_router: Address,
}

impl OperationBuilder {
    pub fn new(registry: Arc<AuthorizationRegistry>, swap_router: &str) -> Self {
        Self {
            registry,
            swap_router: swap_router.to_string(),
        }
    }

    pub fn build_swap(
        &self,
        auth: &Authorization,
        account: &Account,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> Result<Operation, WalletError> {
        if amount_in <= Decimal::ZERO {
            return Err(WalletError::Validation(
                "swap amount must be positive".to_string(),
            ));
        }
        let sender = deployed_address(account)?;
        // Swaps pass through resolve like every other action kind
        let action = Action::new(&self.swap_router, SELECTOR_SWAP);
        self.registry.resolve(auth, &action)?;

        Ok(self.assemble(
            OperationKind::Swap,
            auth,
            account,
            sender,
            action,
            OperationParams::Swap {
                token_in: token_in.to_string(),
                token_out: token_out.to_string(),
                amount_in,
            },
        ))
    }

    pub fn build_transfer(
        &self,
        auth: &Authorization,
        account: &Account,
        token: &str,
        amount: Decimal,
        to: &str,
    ) -> Result<Operation, WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::Validation(
                "transfer amount must be positive".to_string(),
            ));
        }
        if to.trim().is_empty() {
            return Err(WalletError::Validation(
                "transfer recipient is empty".to_string(),
            ));
        }
        let sender = deployed_address(account)?;
        let action = Action::new(token, SELECTOR_TRANSFER);
        self.registry.resolve(auth, &action)?;

        Ok(self.assemble(
            OperationKind::Transfer,
            auth,
            account,
            sender,
            action,
            OperationParams::Transfer {
                token: token.to_string(),
                amount,
                to: to.to_string(),
            },
        ))
    }

    /// Wraps a not-yet-active session. The session becomes resolvable only
    /// once this operation executes successfully; construction alone
    /// registers nothing.
    pub fn build_create_session(
        &self,
        primary: &Authorization,
        account: &Account,
        scope: Scope,
        ttl: Duration,
    ) -> Result<Operation, WalletError> {
        let sender = deployed_address(account)?;
        let pending = self.registry.prepare_session(primary, scope, ttl)?;
        // The registering call targets the account contract itself
        let action = Action::new(&sender, SELECTOR_ADD_SESSION);
        self.registry.resolve(primary, &action)?;

        Ok(self.assemble(
            OperationKind::CreateSession,
            primary,
            account,
            sender,
            action,
            OperationParams::CreateSession { pending },
        ))
    }

    fn assemble(
        &self,
        kind: OperationKind,
        auth: &Authorization,
        account: &Account,
        sender: Address,
        action: Action,
        params: OperationParams,
    ) -> Operation {
        Operation {
            id: Uuid::new_v4(),
            kind,
            authorization: auth.clone(),
            account_key: account.key(),
            sender,
            action,
            params,
            created_at: Utc::now(),
        }
    }
}

fn deployed_address(account: &Account) -> Result<Address, WalletError> {
    account
        .address
        .clone()
        .ok_or(WalletError::NotInitialized)
}
