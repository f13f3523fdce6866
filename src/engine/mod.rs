//! Execution engine
//!
//! Takes built operations, re-checks their authorization at submit time,
//! serializes submissions per account, and turns executor outcomes into
//! receipts. A failed receipt is terminal for its operation; retrying means
//! building a fresh operation.

pub mod executor;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::account::AccountKey;
use crate::auth::AuthorizationRegistry;
use crate::error::WalletError;
use crate::ledger::ReceiptLedger;
use crate::operation::{Operation, OperationKind, OperationParams};
pub use executor::{ChainExecutor, DevExecutor, OperationPayload, TxStatus};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiptStatus {
    Pending,
    Confirmed,
    Failed,
}

/// Recorded outcome of executing one operation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Receipt {
    pub operation_id: Uuid,
    pub operation_kind: OperationKind,
    pub tx_id: Option<String>,
    pub status: ReceiptStatus,
    pub failure_reason: Option<String>,
}

impl Receipt {
    fn confirmed(op: &Operation, tx_id: String) -> Self {
        Self {
            operation_id: op.id(),
            operation_kind: op.kind(),
            tx_id: Some(tx_id),
            status: ReceiptStatus::Confirmed,
            failure_reason: None,
        }
    }

    fn failed(op: &Operation, tx_id: Option<String>, reason: &str) -> Self {
        Self {
            operation_id: op.id(),
            operation_kind: op.kind(),
            tx_id,
            status: ReceiptStatus::Failed,
            failure_reason: Some(reason.to_string()),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == ReceiptStatus::Confirmed
    }
}

pub struct ExecutionEngine {
    executor: Arc<dyn ChainExecutor>,
    ledger: Arc<ReceiptLedger>,
    submit_timeout: Duration,
    gas_sponsor: Option<String>,
    // One submission lock per account; accounts never share one
    locks: Mutex<HashMap<AccountKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl ExecutionEngine {
    pub fn new(
        executor: Arc<dyn ChainExecutor>,
        ledger: Arc<ReceiptLedger>,
        submit_timeout: Duration,
        gas_sponsor: Option<String>,
    ) -> Self {
        Self {
            executor,
            ledger,
            submit_timeout,
            gas_sponsor,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Execute with the engine's default submit timeout.
    pub async fn execute(
        &self,
        registry: &AuthorizationRegistry,
        op: &Operation,
    ) -> Result<Receipt, WalletError> {
        self.execute_with_timeout(registry, op, self.submit_timeout)
            .await
    }

    /// Execute with a caller-specified submit timeout (distinct from any
    /// session deadline). A timed-out submission yields a failed receipt
    /// and leaves authorization state untouched.
    pub async fn execute_with_timeout(
        &self,
        registry: &AuthorizationRegistry,
        op: &Operation,
        timeout: Duration,
    ) -> Result<Receipt, WalletError> {
        let lock = self.account_lock(op.account_key());
        let _guard = lock.lock().await;

        // Re-validate at submit time: a session may have expired or been
        // revoked since the operation was built. Stale permission never
        // reaches the executor.
        registry.resolve(op.authorization(), op.action())?;

        let payload = OperationPayload::from_operation(op, self.gas_sponsor.clone())?;
        let executor = self.executor.clone();
        let outcome = tokio::time::timeout(timeout, async move {
            let tx_id = executor.submit(&payload).await?;
            let status = executor.wait_for_receipt(&tx_id).await?;
            Ok::<(String, TxStatus), WalletError>((tx_id, status))
        })
        .await;

        let receipt = match outcome {
            Err(_) => {
                warn!(operation = %op.id(), "submission timed out");
                Receipt::failed(op, None, "timeout")
            }
            Ok(Err(e)) => {
                warn!(operation = %op.id(), error = %e, "submission failed");
                Receipt::failed(op, None, &e.to_string())
            }
            Ok(Ok((tx_id, TxStatus::Reverted(reason)))) => {
                warn!(operation = %op.id(), tx_id = tx_id.as_str(), reason = reason.as_str(), "transaction reverted");
                Receipt::failed(op, Some(tx_id), &reason)
            }
            Ok(Ok((tx_id, TxStatus::Success))) => {
                info!(operation = %op.id(), tx_id = tx_id.as_str(), kind = %op.kind(), "operation confirmed");
                Receipt::confirmed(op, tx_id)
            }
        };

        // Session registration is transactional with execution: only a
        // confirmed receipt activates the wrapped session.
        if receipt.is_confirmed() {
            if let OperationParams::CreateSession { pending } = op.params() {
                registry.activate(pending.clone());
            }
        }

        self.ledger.record(op, &receipt);
        Ok(receipt)
    }

    fn account_lock(&self, key: &AccountKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::auth::{Action, Scope};
    use crate::error::DenyReason;
    use crate::operation::OperationBuilder;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use rust_decimal::Decimal;

    const USDC: &str = "0x07865c6e87b9f70255377e024ace6630c1eaa37f";
    const ROUTER: &str = "0x7a250d5630b4cf539739df2c5dacb4c659f2488d";

    struct Fixture {
        registry: Arc<AuthorizationRegistry>,
        builder: OperationBuilder,
        account: Account,
        primary: crate::auth::Authorization,
        ledger: Arc<ReceiptLedger>,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(AuthorizationRegistry::new());
        let primary = registry.register_primary("0xabc").unwrap();
        let builder = OperationBuilder::new(registry.clone(), ROUTER);
        let mut account = Account::new("0xabc", 214);
        account.address = Some("0x00000000000000000000000000000000000000aa".to_string());
        Fixture {
            registry,
            builder,
            account,
            primary,
            ledger: Arc::new(ReceiptLedger::new()),
        }
    }

    fn engine_with(fx: &Fixture, executor: Arc<dyn ChainExecutor>) -> ExecutionEngine {
        ExecutionEngine::new(executor, fx.ledger.clone(), Duration::from_secs(5), None)
    }

    /// Records submit/confirm interleaving per transaction.
    struct TracingExecutor {
        events: Mutex<Vec<String>>,
        counter: std::sync::atomic::AtomicU64,
    }

    impl TracingExecutor {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                counter: std::sync::atomic::AtomicU64::new(1),
            }
        }
    }

    #[async_trait]
    impl ChainExecutor for TracingExecutor {
        async fn submit(&self, _payload: &OperationPayload) -> Result<String, WalletError> {
            let n = self
                .counter
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let tx_id = format!("tx{}", n);
            self.events.lock().unwrap().push(format!("submit:{}", tx_id));
            Ok(tx_id)
        }

        async fn wait_for_receipt(&self, tx_id: &str) -> Result<TxStatus, WalletError> {
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.events
                .lock()
                .unwrap()
                .push(format!("confirm:{}", tx_id));
            Ok(TxStatus::Success)
        }
    }

    struct RevertingExecutor;

    #[async_trait]
    impl ChainExecutor for RevertingExecutor {
        async fn submit(&self, _payload: &OperationPayload) -> Result<String, WalletError> {
            Ok("tx-revert".to_string())
        }

        async fn wait_for_receipt(&self, _tx_id: &str) -> Result<TxStatus, WalletError> {
            Ok(TxStatus::Reverted("insufficient funds".to_string()))
        }
    }

    struct StallingExecutor;

    #[async_trait]
    impl ChainExecutor for StallingExecutor {
        async fn submit(&self, _payload: &OperationPayload) -> Result<String, WalletError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("tx-late".to_string())
        }

        async fn wait_for_receipt(&self, _tx_id: &str) -> Result<TxStatus, WalletError> {
            Ok(TxStatus::Success)
        }
    }

    #[tokio::test]
    async fn test_confirmed_receipt_recorded_in_ledger() {
        let fx = fixture();
        let engine = engine_with(&fx, Arc::new(DevExecutor::new(1)));
        let op = fx
            .builder
            .build_swap(&fx.primary, &fx.account, "eth", "usdc", Decimal::ONE)
            .unwrap();

        let receipt = engine.execute(&fx.registry, &op).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Confirmed);
        assert!(receipt.tx_id.is_some());

        let entries = fx.ledger.receipts_for(&fx.account.key());
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation_id, op.id());
    }

    #[tokio::test]
    async fn test_revert_becomes_failed_receipt_not_error() {
        let fx = fixture();
        let engine = engine_with(&fx, Arc::new(RevertingExecutor));
        let op = fx
            .builder
            .build_swap(&fx.primary, &fx.account, "eth", "usdc", Decimal::ONE)
            .unwrap();

        let receipt = engine.execute(&fx.registry, &op).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert_eq!(receipt.failure_reason.as_deref(), Some("insufficient funds"));
        assert_eq!(receipt.tx_id.as_deref(), Some("tx-revert"));
    }

    #[tokio::test]
    async fn test_revoked_session_denied_at_submit_time() {
        let fx = fixture();
        let engine = engine_with(&fx, Arc::new(DevExecutor::new(1)));
        let scope = Scope::new().allow_action(USDC, "transfer");
        let session = fx
            .registry
            .create_session(&fx.primary, scope, ChronoDuration::seconds(3600))
            .unwrap();
        let op = fx
            .builder
            .build_transfer(&session, &fx.account, USDC, Decimal::TEN, "0xabc")
            .unwrap();

        // Built while permitted, revoked before submit
        fx.registry.revoke(&session).unwrap();
        assert_eq!(
            engine.execute(&fx.registry, &op).await.unwrap_err(),
            WalletError::PermissionDenied(DenyReason::Expired)
        );
        // Nothing was submitted, nothing recorded
        assert!(fx.ledger.receipts_for(&fx.account.key()).is_empty());
    }

    #[tokio::test]
    async fn test_timeout_yields_failed_receipt_without_touching_auth() {
        let fx = fixture();
        let engine = engine_with(&fx, Arc::new(StallingExecutor));
        let scope = Scope::new().allow_action(USDC, "transfer");
        let session = fx
            .registry
            .create_session(&fx.primary, scope, ChronoDuration::seconds(3600))
            .unwrap();
        let op = fx
            .builder
            .build_transfer(&session, &fx.account, USDC, Decimal::TEN, "0xabc")
            .unwrap();

        let receipt = engine
            .execute_with_timeout(&fx.registry, &op, Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert_eq!(receipt.failure_reason.as_deref(), Some("timeout"));

        // The session is still valid for a fresh operation
        assert!(fx
            .registry
            .resolve(&session, &Action::new(USDC, "transfer"))
            .is_ok());
    }

    #[tokio::test]
    async fn test_same_account_submissions_never_interleave() {
        let fx = fixture();
        let tracing_exec = Arc::new(TracingExecutor::new());
        let engine = Arc::new(ExecutionEngine::new(
            tracing_exec.clone(),
            fx.ledger.clone(),
            Duration::from_secs(5),
            None,
        ));

        let op1 = fx
            .builder
            .build_transfer(&fx.primary, &fx.account, USDC, Decimal::ONE, "0xabc")
            .unwrap();
        let op2 = fx
            .builder
            .build_transfer(&fx.primary, &fx.account, USDC, Decimal::TWO, "0xabc")
            .unwrap();

        let registry = fx.registry.clone();
        let (e1, e2) = (engine.clone(), engine.clone());
        let (r1, r2) = (registry.clone(), registry);
        let t1 = tokio::spawn(async move { e1.execute(&r1, &op1).await });
        let t2 = tokio::spawn(async move { e2.execute(&r2, &op2).await });
        t1.await.unwrap().unwrap();
        t2.await.unwrap().unwrap();

        // With one in-flight submission per account, every submit must be
        // followed directly by its own confirmation.
        let events = tracing_exec.events.lock().unwrap().clone();
        assert_eq!(events.len(), 4);
        for pair in events.chunks(2) {
            let tx = pair[0].strip_prefix("submit:").expect("submit first");
            assert_eq!(pair[1], format!("confirm:{}", tx));
        }
    }

    #[tokio::test]
    async fn test_distinct_accounts_use_distinct_locks() {
        let fx = fixture();
        let engine = engine_with(&fx, Arc::new(DevExecutor::new(1)));
        let lock_a = engine.account_lock(&AccountKey::new("0xabc", 1));
        let lock_b = engine.account_lock(&AccountKey::new("0xabc", 2));
        let lock_a2 = engine.account_lock(&AccountKey::new("0xabc", 1));
        assert!(Arc::ptr_eq(&lock_a, &lock_a2));
        assert!(!Arc::ptr_eq(&lock_a, &lock_b));
    }

    #[tokio::test]
    async fn test_create_session_activates_only_on_confirm() {
        let fx = fixture();
        let scope = Scope::new().allow_action(USDC, "transfer");

        // Failed execution leaves the session inactive
        let engine = engine_with(&fx, Arc::new(RevertingExecutor));
        let op = fx
            .builder
            .build_create_session(&fx.primary, &fx.account, scope.clone(), ChronoDuration::seconds(3600))
            .unwrap();
        let handle = match op.params() {
            OperationParams::CreateSession { pending } => pending.authorization().clone(),
            other => panic!("unexpected params: {:?}", other),
        };
        let receipt = engine.execute(&fx.registry, &op).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Failed);
        assert_eq!(
            fx.registry.resolve(&handle, &Action::new(USDC, "transfer")),
            Err(WalletError::PermissionDenied(DenyReason::OutOfScope))
        );

        // Confirmed execution activates it
        let engine = engine_with(&fx, Arc::new(DevExecutor::new(1)));
        let op = fx
            .builder
            .build_create_session(&fx.primary, &fx.account, scope, ChronoDuration::seconds(3600))
            .unwrap();
        let handle = match op.params() {
            OperationParams::CreateSession { pending } => pending.authorization().clone(),
            other => panic!("unexpected params: {:?}", other),
        };
        let receipt = engine.execute(&fx.registry, &op).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Confirmed);
        assert!(fx
            .registry
            .resolve(&handle, &Action::new(USDC, "transfer"))
            .is_ok());
    }
}
