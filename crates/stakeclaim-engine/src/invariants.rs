//! Collateral and supply invariant checks.
//!
//! Two per-token invariants bind the ledger to the registries:
//! ```text
//! ∀ token: Σ locked            == Σ active claim stakes + Σ open dispute stakes
//! ∀ token: Σ (available+locked) == Σ deposits - Σ withdrawals
//! ```
//!
//! Both hold after every processed event. A violation means funds were
//! double-released or lost.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stakeclaim_types::{Amount, Result, StakeclaimError, TokenId};

use crate::claims::ClaimRegistry;
use crate::disputes::DisputeRegistry;
use crate::ledger::{Ledger, add_amounts};

/// Tracks per-token deposit and withdrawal totals since genesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyConservation {
    deposits: BTreeMap<TokenId, Amount>,
    withdrawals: BTreeMap<TokenId, Amount>,
}

impl SupplyConservation {
    /// Create a new supply conservation tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a credited deposit.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if the token's deposit total would overflow.
    /// The tracker is unchanged on error.
    pub fn record_deposit(&mut self, token: &TokenId, amount: Amount) -> Result<()> {
        let total = add_amounts(self.total_deposits(token), amount, "deposit total")?;
        self.deposits.insert(token.clone(), total);
        Ok(())
    }

    /// Record a withdrawal.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if the token's withdrawal total would overflow.
    pub fn record_withdrawal(&mut self, token: &TokenId, amount: Amount) -> Result<()> {
        let total = add_amounts(self.total_withdrawals(token), amount, "withdrawal total")?;
        self.withdrawals.insert(token.clone(), total);
        Ok(())
    }

    /// Expected total supply for a token: deposits - withdrawals.
    #[must_use]
    pub fn expected_supply(&self, token: &TokenId) -> Amount {
        self.total_deposits(token) - self.total_withdrawals(token)
    }

    /// Verify that the actual supply matches deposits - withdrawals.
    ///
    /// # Errors
    /// Returns [`StakeclaimError::InvariantViolation`] if actual ≠ expected.
    pub fn verify(&self, token: &TokenId, actual_supply: Amount) -> Result<()> {
        let expected = self.expected_supply(token);
        if actual_supply != expected {
            return Err(StakeclaimError::InvariantViolation {
                reason: format!(
                    "token {token}: actual supply {actual_supply} != expected {expected} \
                     (deposits={}, withdrawals={})",
                    self.total_deposits(token),
                    self.total_withdrawals(token),
                ),
            });
        }
        Ok(())
    }

    /// All tokens that have seen a deposit or withdrawal.
    #[must_use]
    pub fn tracked_tokens(&self) -> BTreeSet<TokenId> {
        self.deposits
            .keys()
            .chain(self.withdrawals.keys())
            .cloned()
            .collect()
    }

    /// Total deposits for a token.
    #[must_use]
    pub fn total_deposits(&self, token: &TokenId) -> Amount {
        self.deposits.get(token).copied().unwrap_or(Decimal::ZERO)
    }

    /// Total withdrawals for a token.
    #[must_use]
    pub fn total_withdrawals(&self, token: &TokenId) -> Amount {
        self.withdrawals.get(token).copied().unwrap_or(Decimal::ZERO)
    }
}

/// Check both invariants for every token known to the ledger, the supply
/// tracker, or the registries, plus non-negativity of every account.
///
/// # Errors
/// Returns [`StakeclaimError::InvariantViolation`] describing the first
/// failure.
pub fn audit(ledger: &Ledger, claims: &ClaimRegistry, disputes: &DisputeRegistry) -> Result<()> {
    for (owner, token, balance) in ledger.accounts() {
        if balance.available < Decimal::ZERO || balance.locked < Decimal::ZERO {
            return Err(StakeclaimError::InvariantViolation {
                reason: format!(
                    "negative balance for {owner} in {token}: available={}, locked={}",
                    balance.available, balance.locked
                ),
            });
        }
    }

    let mut tokens: BTreeSet<TokenId> = ledger.tokens().into_iter().collect();
    tokens.extend(ledger.supply().tracked_tokens());
    tokens.extend(claims.iter().map(|c| c.token.clone()));

    for token in &tokens {
        let locked = ledger.total_locked(token);
        let claim_stakes = claims.active_stake(token);
        let dispute_stakes = disputes.open_stake(claims, token);
        if locked != claim_stakes + dispute_stakes {
            return Err(StakeclaimError::InvariantViolation {
                reason: format!(
                    "token {token}: locked {locked} != claim stakes {claim_stakes} \
                     + dispute stakes {dispute_stakes}"
                ),
            });
        }
        ledger.supply().verify(token, ledger.total_supply(token))?;
    }
    Ok(())
}
