//! Balance reconciliation after receipts
//!
//! One query per asset fans out to the balance provider; a failing asset
//! keeps its prior cached amount and carries an error flag, without
//! blocking the other assets. The overall call always yields a snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::account::{Address, Asset};
use crate::engine::Receipt;
use crate::error::WalletError;

/// External collaborator answering per-asset balance queries.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn get_balance(&self, asset: &str, address: &str) -> Result<Decimal, WalletError>;
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AssetBalance {
    pub amount: Decimal,
    /// True when the last query failed and `amount` is the prior cached value
    pub stale: bool,
    pub error: Option<String>,
}

#[derive(Serialize, Clone, Debug)]
pub struct BalanceSnapshot {
    pub address: Address,
    pub balances: HashMap<Asset, AssetBalance>,
    pub updated_at: DateTime<Utc>,
}

pub struct BalanceReconciler {
    provider: Arc<dyn BalanceProvider>,
    cache: Mutex<HashMap<Address, BalanceSnapshot>>,
}

impl BalanceReconciler {
    pub fn new(provider: Arc<dyn BalanceProvider>) -> Self {
        Self {
            provider,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Refresh the cached balances for `address` after `receipt`. Partial
    /// failures are non-fatal: the snapshot flags them per asset.
    pub async fn on_receipt(
        &self,
        receipt: &Receipt,
        address: &str,
        assets: &[Asset],
    ) -> BalanceSnapshot {
        debug!(
            operation = %receipt.operation_id,
            tx_id = receipt.tx_id.as_deref().unwrap_or("-"),
            address,
            "reconciling balances"
        );

        let mut tasks = Vec::with_capacity(assets.len());
        for asset in assets {
            let provider = self.provider.clone();
            let asset = asset.clone();
            let address = address.to_string();
            tasks.push((
                asset.clone(),
                tokio::spawn(async move { provider.get_balance(&asset, &address).await }),
            ));
        }

        let mut balances = self
            .cache
            .lock()
            .unwrap()
            .get(address)
            .map(|snapshot| snapshot.balances.clone())
            .unwrap_or_default();

        for (asset, task) in tasks {
            let outcome = match task.await {
                Ok(result) => result,
                Err(e) => Err(WalletError::Execution(format!("balance task failed: {}", e))),
            };
            match outcome {
                Ok(amount) => {
                    balances.insert(
                        asset,
                        AssetBalance {
                            amount,
                            stale: false,
                            error: None,
                        },
                    );
                }
                Err(e) => {
                    let prior = balances
                        .get(&asset)
                        .map(|b| b.amount)
                        .unwrap_or(Decimal::ZERO);
                    warn!(asset = asset.as_str(), error = %e, "balance query failed, keeping cached value");
                    balances.insert(
                        asset,
                        AssetBalance {
                            amount: prior,
                            stale: true,
                            error: Some(e.to_string()),
                        },
                    );
                }
            }
        }

        let snapshot = BalanceSnapshot {
            address: address.to_string(),
            balances,
            updated_at: Utc::now(),
        };
        self.cache
            .lock()
            .unwrap()
            .insert(address.to_string(), snapshot.clone());
        snapshot
    }

    pub fn snapshot_for(&self, address: &str) -> Option<BalanceSnapshot> {
        self.cache.lock().unwrap().get(address).cloned()
    }
}

/// Fixed-table provider for the demo binary.
pub struct StaticBalanceProvider {
    balances: Mutex<HashMap<Asset, Decimal>>,
}

impl StaticBalanceProvider {
    pub fn new() -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, asset: &str, amount: Decimal) {
        self.balances
            .lock()
            .unwrap()
            .insert(asset.to_string(), amount);
    }
}

impl Default for StaticBalanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BalanceProvider for StaticBalanceProvider {
    async fn get_balance(&self, asset: &str, _address: &str) -> Result<Decimal, WalletError> {
        self.balances
            .lock()
            .unwrap()
            .get(asset)
            .copied()
            .ok_or_else(|| WalletError::Execution(format!("no balance feed for {}", asset)))
    }
}
