//! Balance types for the Stakeclaim collateral model.
//!
//! Every (owner, token) account has an `available` balance (withdrawable,
//! usable as new stake) and a `locked` balance (collateral backing active
//! claims and open disputes).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Token amounts. Always non-negative once inside the ledger.
pub type Amount = Decimal;

/// A single balance entry for an (owner, token) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccountBalance {
    /// Free funds.
    pub available: Amount,
    /// Funds held as stake.
    pub locked: Amount,
}

impl AccountBalance {
    /// Create a zero balance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            available: Decimal::ZERO,
            locked: Decimal::ZERO,
        }
    }

    /// Total balance (available + locked).
    #[must_use]
    pub fn total(&self) -> Amount {
        self.available + self.locked
    }

    /// Whether this entry has no balance at all.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.available.is_zero() && self.locked.is_zero()
    }
}

impl Default for AccountBalance {
    fn default() -> Self {
        Self::new()
    }
}
