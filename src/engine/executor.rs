//! Chain executor collaborator interface
//!
//! The engine talks to the chain only through this trait: submit a payload,
//! then poll the transaction outcome. Gas sponsorship data is passed through
//! opaquely; the engine never interprets it.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::Address;
use crate::auth::Action;
use crate::error::WalletError;
use crate::operation::{Operation, OperationKind};

/// Wire form of an operation handed to the chain executor.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OperationPayload {
    pub operation_id: Uuid,
    pub kind: OperationKind,
    pub sender: Address,
    pub user_id: String,
    pub action: Action,
    pub params: serde_json::Value,
    /// Opaque sponsorship parameter, forwarded untouched
    pub gas_sponsor: Option<String>,
}

impl OperationPayload {
    pub fn from_operation(
        op: &Operation,
        gas_sponsor: Option<String>,
    ) -> Result<Self, WalletError> {
        let params = serde_json::to_value(op.params())
            .map_err(|e| WalletError::Execution(format!("payload encoding failed: {}", e)))?;
        Ok(Self {
            operation_id: op.id(),
            kind: op.kind(),
            sender: op.sender().to_string(),
            user_id: op.authorization().user_id().to_string(),
            action: op.action().clone(),
            params,
            gas_sponsor,
        })
    }
}

/// Terminal outcome reported by the chain for a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Reverted(String),
}

#[async_trait]
pub trait ChainExecutor: Send + Sync {
    /// Submit the payload, returning the transaction id.
    async fn submit(&self, payload: &OperationPayload) -> Result<String, WalletError>;

    /// Wait for the transaction to land and report its status.
    async fn wait_for_receipt(&self, tx_id: &str) -> Result<TxStatus, WalletError>;
}

/// In-process executor for the demo binary and tests: every submission
/// confirms after a short delay.
pub struct DevExecutor {
    tx_counter: AtomicU64,
    confirm_delay_ms: u64,
}

impl DevExecutor {
    pub fn new(confirm_delay_ms: u64) -> Self {
        Self {
            tx_counter: AtomicU64::new(1),
            confirm_delay_ms,
        }
    }
}

#[async_trait]
impl ChainExecutor for DevExecutor {
    async fn submit(&self, payload: &OperationPayload) -> Result<String, WalletError> {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("0xtx{:08x}-{}", n, payload.kind))
    }

    async fn wait_for_receipt(&self, _tx_id: &str) -> Result<TxStatus, WalletError> {
        tokio::time::sleep(std::time::Duration::from_millis(self.confirm_delay_ms)).await;
        Ok(TxStatus::Success)
    }
}
