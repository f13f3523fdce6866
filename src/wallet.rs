//! Smart wallet facade
//!
//! Wires one account's components together: its authorization registry,
//! operation builder, the shared execution engine, balance reconciliation
//! and the faucet client. Each wallet owns exactly one registry; there is
//! no process-wide authorization state.

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use tracing::info;

use crate::account::{Account, AccountManager, Address, Asset};
use crate::auth::{Authorization, AuthorizationRegistry, Scope};
use crate::balance::{BalanceReconciler, BalanceSnapshot};
use crate::client::{FaucetClient, FaucetService};
use crate::config::WalletConfig;
use crate::engine::{ChainExecutor, ExecutionEngine, Receipt, TxStatus};
use crate::error::WalletError;
use crate::operation::{Operation, OperationBuilder};

pub struct SmartWallet {
    account: Account,
    address: Address,
    registry: Arc<AuthorizationRegistry>,
    builder: OperationBuilder,
    engine: Arc<ExecutionEngine>,
    executor: Arc<dyn ChainExecutor>,
    reconciler: Arc<BalanceReconciler>,
    faucet: Arc<dyn FaucetService>,
    primary: Authorization,
    tracked_assets: Vec<Asset>,
    network: String,
}

impl SmartWallet {
    /// Initialize the account and wait for its address, then register the
    /// primary credential. Deployment failures surface here.
    pub async fn initialize(
        manager: &AccountManager,
        owner_user_id: &str,
        index: u64,
        engine: Arc<ExecutionEngine>,
        executor: Arc<dyn ChainExecutor>,
        reconciler: Arc<BalanceReconciler>,
        config: &WalletConfig,
    ) -> Result<Self, WalletError> {
        let mut account = manager.initialize(owner_user_id, index)?;
        let address = manager.wait_for_address(&account.key()).await?;
        account.address = Some(address.clone());

        // The manager owns the account's registry; the wallet only borrows it
        let registry = manager.registry(&account.key())?;
        let primary = registry.register_primary(owner_user_id)?;
        let builder = OperationBuilder::new(registry.clone(), &config.swap_router);
        let faucet: Arc<dyn FaucetService> =
            Arc::new(FaucetClient::new(&config.faucet_url, &config.api_key));

        info!(owner = owner_user_id, index, %address, "smart wallet ready");
        Ok(Self {
            account,
            address,
            registry,
            builder,
            engine,
            executor,
            reconciler,
            faucet,
            primary,
            tracked_assets: config.tracked_assets.clone(),
            network: config.network.clone(),
        })
    }

    /// Swap the HTTP faucet for another implementation.
    pub fn with_faucet(mut self, faucet: Arc<dyn FaucetService>) -> Self {
        self.faucet = faucet;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn primary_auth(&self) -> &Authorization {
        &self.primary
    }

    pub fn swap(
        &self,
        auth: &Authorization,
        token_in: &str,
        token_out: &str,
        amount_in: Decimal,
    ) -> Result<Operation, WalletError> {
        self.builder
            .build_swap(auth, &self.account, token_in, token_out, amount_in)
    }

    pub fn transfer(
        &self,
        auth: &Authorization,
        token: &str,
        amount: Decimal,
        to: &str,
    ) -> Result<Operation, WalletError> {
        self.builder
            .build_transfer(auth, &self.account, token, amount, to)
    }

    /// Build the operation that registers a new session key. The returned
    /// handle stays inert until the operation executes successfully.
    pub fn create_session_key(
        &self,
        scope: Scope,
        ttl: ChronoDuration,
    ) -> Result<(Operation, Authorization), WalletError> {
        let op = self
            .builder
            .build_create_session(&self.primary, &self.account, scope, ttl)?;
        let handle = match op.params() {
            crate::operation::OperationParams::CreateSession { pending } => {
                pending.authorization().clone()
            }
            _ => unreachable!("build_create_session yields CreateSession params"),
        };
        Ok((op, handle))
    }

    pub fn revoke_session(&self, session: &Authorization) -> Result<(), WalletError> {
        self.registry.revoke(session)
    }

    /// Execute an operation and reconcile balances against the resulting
    /// receipt. Reconciliation always observes the receipt that triggered
    /// it; nothing is ordered against unrelated later operations.
    pub async fn execute(&self, op: &Operation) -> Result<Receipt, WalletError> {
        let receipt = self.engine.execute(&self.registry, op).await?;
        self.reconciler
            .on_receipt(&receipt, &self.address, &self.tracked_assets)
            .await;
        Ok(receipt)
    }

    pub fn balances(&self) -> Option<BalanceSnapshot> {
        self.reconciler.snapshot_for(&self.address)
    }

    /// Request test funds and await the faucet transaction through the
    /// chain executor. Returns the transaction hash.
    pub async fn prefund(&self, asset: &str) -> Result<String, WalletError> {
        let tx_hash = self
            .faucet
            .request_funds(asset, &self.network, &self.address)
            .await?;
        match self.executor.wait_for_receipt(&tx_hash).await? {
            TxStatus::Success => Ok(tx_hash),
            TxStatus::Reverted(reason) => Err(WalletError::Execution(format!(
                "faucet transaction reverted: {}",
                reason
            ))),
        }
    }
}
