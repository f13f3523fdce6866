//! Account module
//!
//! This module implements account identity and on-chain address resolution:
//! - One account per (owner user id, index) pair
//! - Address assigned exactly once, asynchronously, by the deployer
//! - Deployment failures surfaced on read, never silently dropped

pub mod manager;
pub mod types;

pub use manager::{AccountDeployer, AccountManager, LocalDeployer};
pub use types::{Account, AccountKey, Address, Asset, Selector};
