pub mod account; // account identity + address resolution (must be before auth)
pub mod auth;
pub mod operation;
pub mod engine;
pub mod ledger;
pub mod balance;
pub mod wallet;
pub mod client; // faucet + connector boundaries
pub mod error;
pub mod config;
