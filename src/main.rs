mod account;
mod auth;
mod balance;
mod client;
mod config;
mod engine;
mod error;
mod ledger;
mod operation;
mod wallet;

use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use clap::Parser;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use account::{AccountManager, LocalDeployer};
use auth::Scope;
use balance::{BalanceReconciler, StaticBalanceProvider};
use client::normalize_user_id;
use config::WalletConfig;
use engine::{ChainExecutor, DevExecutor, ExecutionEngine};
use ledger::ReceiptLedger;
use wallet::SmartWallet;

/// Demo: create a smart wallet, derive a scoped session key and use it,
/// entirely against in-process collaborators.
#[derive(Parser)]
#[command(name = "sessionwallet")]
struct Cli {
    /// Path to the TOML config
    #[arg(long, default_value = "wallet.toml")]
    config: String,

    /// Raw connector account id of the owner
    #[arg(long, default_value = "0xAb5801a7D398351b8bE11C439e05C5B3259aeC9B")]
    owner: String,

    /// Account index (one account per owner/index pair)
    #[arg(long, default_value_t = 214)]
    index: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = WalletConfig::load_or_default(&cli.config);

    // The connector hands us a raw EOA id; normalize it once at the boundary
    let owner = normalize_user_id(&cli.owner)?;

    let manager = AccountManager::new(Arc::new(LocalDeployer::new(50)));
    let executor: Arc<dyn ChainExecutor> = Arc::new(DevExecutor::new(50));
    let ledger = Arc::new(ReceiptLedger::new());
    let engine = Arc::new(ExecutionEngine::new(
        executor.clone(),
        ledger.clone(),
        config.submit_timeout(),
        config.gas_sponsor.clone(),
    ));

    let provider = Arc::new(StaticBalanceProvider::new());
    provider.set("ETH", Decimal::from_str("0.05")?);
    provider.set("USDC", Decimal::from_str("25.0")?);
    let reconciler = Arc::new(BalanceReconciler::new(provider));

    let wallet = SmartWallet::initialize(
        &manager,
        &owner,
        cli.index,
        engine,
        executor,
        reconciler,
        &config,
    )
    .await?;
    println!("Wallet address: {}", wallet.address());

    // Swap with the primary credential
    let swap = wallet.swap(wallet.primary_auth(), "eth", "usdc", Decimal::from_str("0.001")?)?;
    let receipt = wallet.execute(&swap).await?;
    println!(
        "Swap confirmed: {}",
        receipt.tx_id.as_deref().unwrap_or("-")
    );

    // Session key limited to USDC transfers for one hour
    let usdc = "0x07865c6e87b9f70255377e024ace6630c1eaa37f";
    let scope = Scope::new().allow_action(usdc, "transfer");
    let (op, session) = wallet.create_session_key(scope, ChronoDuration::hours(1))?;
    let receipt = wallet.execute(&op).await?;
    println!(
        "Session key registered: {} (user {})",
        receipt.tx_id.as_deref().unwrap_or("-"),
        session.user_id()
    );

    // Transfer USDC with the session key
    let transfer = wallet.transfer(&session, usdc, Decimal::TEN, wallet.address())?;
    let receipt = wallet.execute(&transfer).await?;
    println!(
        "Transfer confirmed: {}",
        receipt.tx_id.as_deref().unwrap_or("-")
    );

    if let Some(snapshot) = wallet.balances() {
        println!("Wallet balance:");
        for (asset, balance) in &snapshot.balances {
            let flag = if balance.stale { " (stale)" } else { "" };
            println!("  {} {}{}", balance.amount, asset, flag);
        }
    }

    println!("{} receipts recorded", ledger.len());
    Ok(())
}
