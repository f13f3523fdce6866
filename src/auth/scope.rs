//! Session scope: whitelist of (contract, function) pairs
//!
//! Deny-by-default: a target or selector that was never whitelisted is
//! denied, and an empty whitelist denies everything.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::account::{Address, Selector};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    targets: HashSet<Address>,
    actions: HashMap<Address, HashSet<Selector>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whitelist a contract address without allowing any of its functions.
    /// Selectors still have to be added with `allow_action`.
    pub fn allow_target(mut self, target: &str) -> Self {
        self.targets.insert(target.to_string());
        self
    }

    /// Whitelist one function on one contract. Implies `allow_target`.
    pub fn allow_action(mut self, target: &str, selector: &str) -> Self {
        self.targets.insert(target.to_string());
        self.actions
            .entry(target.to_string())
            .or_default()
            .insert(selector.to_string());
        self
    }

    /// An empty target whitelist permits nothing.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// True iff both the target and the selector are whitelisted.
    pub fn permits(&self, target: &str, selector: &str) -> bool {
        if !self.targets.contains(target) {
            return false;
        }
        self.actions
            .get(target)
            .map(|selectors| selectors.contains(selector))
            .unwrap_or(false)
    }
}
