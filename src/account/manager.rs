//! Account lifecycle: initialization and address resolution
//!
//! `initialize` registers the account and hands deployment to the external
//! deployer collaborator; the address becomes readable once the deployer
//! confirms. Deployment failures are recorded and surfaced on the next
//! read, never dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Notify;
use tracing::{info, warn};

use super::types::{Account, AccountKey, Address};
use crate::auth::AuthorizationRegistry;
use crate::error::WalletError;

/// External collaborator that deploys the smart-contract account on chain
/// and reports its address.
#[async_trait]
pub trait AccountDeployer: Send + Sync {
    async fn deploy(&self, key: &AccountKey) -> Result<Address, WalletError>;
}

#[derive(Debug, Clone)]
enum DeployState {
    Pending,
    Ready(Address),
    Failed(String),
}

pub struct AccountManager {
    deployer: Arc<dyn AccountDeployer>,
    accounts: Arc<Mutex<HashMap<AccountKey, DeployState>>>,
    // One authorization registry per account, for the account's lifetime
    registries: Mutex<HashMap<AccountKey, Arc<AuthorizationRegistry>>>,
    resolved: Arc<Notify>,
}

impl AccountManager {
    pub fn new(deployer: Arc<dyn AccountDeployer>) -> Self {
        Self {
            deployer,
            accounts: Arc::new(Mutex::new(HashMap::new())),
            registries: Mutex::new(HashMap::new()),
            resolved: Arc::new(Notify::new()),
        }
    }

    /// Start deployment for (owner, index). Returns the account immediately;
    /// its address resolves asynchronously.
    pub fn initialize(&self, owner_user_id: &str, index: u64) -> Result<Account, WalletError> {
        if owner_user_id.trim().is_empty() {
            return Err(WalletError::MissingOwner("empty user id".to_string()));
        }

        let key = AccountKey::new(owner_user_id, index);
        {
            let mut accounts = self.accounts.lock().unwrap();
            match accounts.get(&key) {
                Some(DeployState::Pending) => return Err(WalletError::AlreadyInitializing),
                Some(DeployState::Ready(_)) => {
                    return Err(WalletError::Validation(format!(
                        "account {} already initialized",
                        key
                    )))
                }
                // A failed deployment may be retried with a fresh initialize
                Some(DeployState::Failed(_)) | None => {
                    accounts.insert(key.clone(), DeployState::Pending);
                }
            }
        }

        // The registry is created with the account and survives deployment
        // retries; it is the account's only authorization store.
        self.registries
            .lock()
            .unwrap()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AuthorizationRegistry::new()));

        let account = Account::new(owner_user_id, index);
        info!(account = %key, "initializing smart-contract account");

        let deployer = self.deployer.clone();
        let accounts = self.accounts.clone();
        let resolved = self.resolved.clone();
        let task_key = key.clone();
        tokio::spawn(async move {
            let outcome = deployer.deploy(&task_key).await;
            let mut accounts = accounts.lock().unwrap();
            match outcome {
                Ok(address) => {
                    info!(account = %task_key, %address, "account deployed");
                    accounts.insert(task_key, DeployState::Ready(address));
                }
                Err(e) => {
                    warn!(account = %task_key, error = %e, "account deployment failed");
                    accounts.insert(task_key, DeployState::Failed(e.to_string()));
                }
            }
            drop(accounts);
            resolved.notify_waiters();
        });

        Ok(account)
    }

    /// Read the resolved address. Idempotent once deployment confirmed.
    pub fn get_address(&self, key: &AccountKey) -> Result<Address, WalletError> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(key) {
            None => Err(WalletError::Validation(format!("unknown account {}", key))),
            Some(DeployState::Pending) => Err(WalletError::NotInitialized),
            Some(DeployState::Failed(reason)) => {
                Err(WalletError::DeploymentFailed(reason.clone()))
            }
            Some(DeployState::Ready(address)) => Ok(address.clone()),
        }
    }

    /// Wait until address resolution finishes, successfully or not.
    pub async fn wait_for_address(&self, key: &AccountKey) -> Result<Address, WalletError> {
        loop {
            let notified = self.resolved.notified();
            tokio::pin!(notified);
            // Register for the wakeup before reading the state, otherwise a
            // deployment finishing in between is never observed
            notified.as_mut().enable();
            match self.get_address(key) {
                Err(WalletError::NotInitialized) => notified.await,
                other => return other,
            }
        }
    }

    /// The authorization registry owned by this account. Exists from the
    /// first `initialize` call onward.
    pub fn registry(&self, key: &AccountKey) -> Result<Arc<AuthorizationRegistry>, WalletError> {
        self.registries
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| WalletError::Validation(format!("unknown account {}", key)))
    }
}

/// Deterministic in-process deployer: derives the counterfactual address
/// from sha256(owner || index). Used by the demo binary and tests.
pub struct LocalDeployer {
    confirm_delay_ms: u64,
}

impl LocalDeployer {
    pub fn new(confirm_delay_ms: u64) -> Self {
        Self { confirm_delay_ms }
    }

    pub fn derive_address(key: &AccountKey) -> Address {
        let mut hasher = Sha256::new();
        hasher.update(key.owner_user_id.as_bytes());
        hasher.update(key.index.to_be_bytes());
        let digest = hasher.finalize();
        // 20-byte address, Ethereum-style
        format!("0x{}", hex::encode(&digest[..20]))
    }
}

#[async_trait]
impl AccountDeployer for LocalDeployer {
    async fn deploy(&self, key: &AccountKey) -> Result<Address, WalletError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.confirm_delay_ms)).await;
        Ok(Self::derive_address(key))
    }
}
