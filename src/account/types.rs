//! Account type definitions for the smart-contract wallet

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// On-chain address, 0x-prefixed hex
pub type Address = String;

/// Asset identifier (ETH, USDC, etc.)
pub type Asset = String;

/// Contract function selector, by name
pub type Selector = String;

/// Unique key for one smart-contract account: one account per
/// (owner user id, index) pair.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AccountKey {
    pub owner_user_id: String,
    pub index: u64,
}

impl AccountKey {
    pub fn new(owner_user_id: &str, index: u64) -> Self {
        Self {
            owner_user_id: owner_user_id.to_string(),
            index,
        }
    }
}

impl std::fmt::Display for AccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.owner_user_id, self.index)
    }
}

/// A smart-contract-controlled account. The address stays `None` until the
/// deployment collaborator confirms it; it is assigned exactly once.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub owner_user_id: String,
    pub index: u64,
    pub address: Option<Address>,
}

impl Account {
    pub fn new(owner_user_id: &str, index: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_user_id: owner_user_id.to_string(),
            index,
            address: None,
        }
    }

    pub fn key(&self) -> AccountKey {
        AccountKey::new(&self.owner_user_id, self.index)
    }
}
