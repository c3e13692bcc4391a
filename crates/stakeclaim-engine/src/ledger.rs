//! Per-(owner, token) balance bookkeeping with available/locked accounting.
//!
//! Every mutation checks its precondition before touching any balance, so a
//! failed call leaves the ledger unchanged. Mutators are crate-private: only
//! the registries, driven by the settlement coordinator, move funds.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stakeclaim_types::{
    AccountBalance, Amount, ClaimId, Epoch, OwnerId, Result, StakeclaimError, TokenId,
    WithdrawalKind, WithdrawalRecord,
};

use crate::invariants::SupplyConservation;

/// The account table plus the outbound withdrawal queue.
///
/// Accounts are created lazily on first credit and never removed, so zero
/// balances stay visible for auditing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    accounts: BTreeMap<OwnerId, BTreeMap<TokenId, AccountBalance>>,
    supply: SupplyConservation,
    /// Withdrawal records not yet handed to the boundary.
    outbox: Vec<WithdrawalRecord>,
    next_withdrawal_seq: u64,
}

fn require_positive(amount: Amount, what: &str) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(StakeclaimError::InvalidAmount {
            reason: format!("{what} must be > 0, got {amount}"),
        });
    }
    Ok(())
}

/// `a + b`, or `InvalidAmount` when the sum leaves the `Decimal` range.
pub(crate) fn add_amounts(a: Amount, b: Amount, what: &str) -> Result<Amount> {
    a.checked_add(b).ok_or_else(|| StakeclaimError::InvalidAmount {
        reason: format!("{what} overflows: {a} + {b}"),
    })
}

impl Ledger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, owner: &OwnerId, token: &TokenId) -> &mut AccountBalance {
        self.accounts
            .entry(owner.clone())
            .or_default()
            .entry(token.clone())
            .or_default()
    }

    fn existing_mut(&mut self, owner: &OwnerId, token: &TokenId) -> Option<&mut AccountBalance> {
        self.accounts.get_mut(owner)?.get_mut(token)
    }

    fn push_record(
        &mut self,
        owner: &OwnerId,
        token: &TokenId,
        amount: Amount,
        kind: WithdrawalKind,
        epoch: Epoch,
        claim_id: Option<ClaimId>,
    ) -> WithdrawalRecord {
        self.next_withdrawal_seq += 1;
        let record = WithdrawalRecord {
            sequence: self.next_withdrawal_seq,
            owner: owner.clone(),
            token: token.clone(),
            amount,
            kind,
            epoch,
            claim_id,
        };
        self.outbox.push(record.clone());
        record
    }

    /// Deposit funds (increases available balance).
    ///
    /// # Errors
    /// Returns `InvalidAmount` for a negative amount, or when the balance or
    /// the token's deposit total would overflow.
    pub(crate) fn credit(&mut self, owner: &OwnerId, token: &TokenId, amount: Amount) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(StakeclaimError::InvalidAmount {
                reason: format!("credit must be >= 0, got {amount}"),
            });
        }
        let available = add_amounts(self.balance(owner, token).available, amount, "balance")?;
        self.supply.record_deposit(token, amount)?;
        self.entry_mut(owner, token).available = available;
        tracing::debug!(%owner, %token, %amount, "credit");
        Ok(())
    }

    /// Lock funds (available → locked). Used when staking.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if available < amount.
    pub(crate) fn lock(&mut self, owner: &OwnerId, token: &TokenId, amount: Amount) -> Result<()> {
        require_positive(amount, "lock amount")?;
        let available = self.balance(owner, token).available;
        if available < amount {
            return Err(StakeclaimError::InsufficientFunds {
                owner: owner.clone(),
                token: token.clone(),
                needed: amount,
                available,
            });
        }

        let locked = add_amounts(self.balance(owner, token).locked, amount, "locked balance")?;
        let entry = self.entry_mut(owner, token);
        entry.available -= amount;
        entry.locked = locked;
        tracing::debug!(%owner, %token, %amount, "lock");
        Ok(())
    }

    /// Release `amount` of `from`'s locked funds into `to`'s available
    /// balance. `from == to` returns a stake to its owner.
    ///
    /// # Errors
    /// Returns `InsufficientLocked` if `from.locked < amount`, or
    /// `InvalidAmount` if `to`'s balance would overflow.
    pub(crate) fn unlock_and_transfer(
        &mut self,
        from: &OwnerId,
        to: &OwnerId,
        token: &TokenId,
        amount: Amount,
    ) -> Result<()> {
        require_positive(amount, "transfer amount")?;
        let locked = self.balance(from, token).locked;
        if locked < amount {
            return Err(StakeclaimError::InsufficientLocked {
                owner: from.clone(),
                token: token.clone(),
                needed: amount,
                locked,
            });
        }

        let credited = add_amounts(self.balance(to, token).available, amount, "balance")?;

        if let Some(source) = self.existing_mut(from, token) {
            source.locked -= amount;
        }
        self.entry_mut(to, token).available = credited;
        tracing::debug!(%from, %to, %token, %amount, "unlock_and_transfer");
        Ok(())
    }

    /// Remove funds from the ledger and queue the outbound transfer record.
    /// The only operation that lowers total ledger value.
    ///
    /// # Errors
    /// Returns `InsufficientFunds` if available < amount.
    pub(crate) fn withdraw(
        &mut self,
        owner: &OwnerId,
        token: &TokenId,
        amount: Amount,
        epoch: Epoch,
        claim_id: Option<ClaimId>,
    ) -> Result<WithdrawalRecord> {
        require_positive(amount, "withdrawal amount")?;
        let available = self.balance(owner, token).available;
        if available < amount {
            return Err(StakeclaimError::InsufficientFunds {
                owner: owner.clone(),
                token: token.clone(),
                needed: amount,
                available,
            });
        }

        self.supply.record_withdrawal(token, amount)?;
        self.entry_mut(owner, token).available -= amount;
        tracing::debug!(%owner, %token, %amount, "withdraw");
        Ok(self.push_record(owner, token, amount, WithdrawalKind::Withdraw, epoch, claim_id))
    }

    /// Queue the return of a deposit that was never credited.
    pub(crate) fn refund(
        &mut self,
        owner: &OwnerId,
        token: &TokenId,
        amount: Amount,
        epoch: Epoch,
    ) -> WithdrawalRecord {
        self.push_record(owner, token, amount, WithdrawalKind::DepositRefund, epoch, None)
    }

    /// Hand all queued withdrawal records to the caller.
    pub(crate) fn drain_withdrawals(&mut self) -> Vec<WithdrawalRecord> {
        std::mem::take(&mut self.outbox)
    }

    /// Withdrawal records queued and not yet drained.
    #[must_use]
    pub fn pending_withdrawals(&self) -> &[WithdrawalRecord] {
        &self.outbox
    }

    /// Get the balance for an (owner, token) pair. Unknown accounts read as zero.
    #[must_use]
    pub fn balance(&self, owner: &OwnerId, token: &TokenId) -> AccountBalance {
        self.accounts
            .get(owner)
            .and_then(|tokens| tokens.get(token))
            .cloned()
            .unwrap_or_default()
    }

    /// Whether an account row exists for the pair.
    #[must_use]
    pub fn has_account(&self, owner: &OwnerId, token: &TokenId) -> bool {
        self.accounts
            .get(owner)
            .is_some_and(|tokens| tokens.contains_key(token))
    }

    /// All account rows in (owner, token) order.
    pub fn accounts(&self) -> impl Iterator<Item = (&OwnerId, &TokenId, &AccountBalance)> {
        self.accounts.iter().flat_map(|(owner, tokens)| {
            tokens
                .iter()
                .map(move |(token, balance)| (owner, token, balance))
        })
    }

    /// Tokens with at least one account row.
    #[must_use]
    pub fn tokens(&self) -> Vec<TokenId> {
        let mut tokens: Vec<TokenId> = self
            .accounts
            .values()
            .flat_map(|t| t.keys().cloned())
            .collect();
        tokens.sort();
        tokens.dedup();
        tokens
    }

    /// Sum of locked balances for a token.
    #[must_use]
    pub fn total_locked(&self, token: &TokenId) -> Amount {
        self.accounts()
            .filter(|(_, t, _)| *t == token)
            .map(|(_, _, b)| b.locked)
            .sum()
    }

    /// Sum of available + locked balances for a token.
    #[must_use]
    pub fn total_supply(&self, token: &TokenId) -> Amount {
        self.accounts()
            .filter(|(_, t, _)| *t == token)
            .map(|(_, _, b)| b.total())
            .sum()
    }

    /// Deposit/withdrawal totals since genesis.
    #[must_use]
    pub fn supply(&self) -> &SupplyConservation {
        &self.supply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn owner(name: &str) -> OwnerId {
        OwnerId::new(name)
    }

    fn usdc() -> TokenId {
        TokenId::new("usdc")
    }

    #[test]
    fn credit_increases_available() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner("alice"), &usdc(), dec(1000)).unwrap();
        let bal = ledger.balance(&owner("alice"), &usdc());
        assert_eq!(bal.available, dec(1000));
        assert_eq!(bal.locked, Decimal::ZERO);
        assert_eq!(ledger.supply().total_deposits(&usdc()), dec(1000));
    }

    #[test]
    fn credit_negative_fails() {
        let mut ledger = Ledger::new();
        let err = ledger.credit(&owner("alice"), &usdc(), dec(-1)).unwrap_err();
        assert!(matches!(err, StakeclaimError::InvalidAmount { .. }));
        assert!(!ledger.has_account(&owner("alice"), &usdc()));
    }

    #[test]
    fn credit_overflow_fails_unchanged() {
        let mut ledger = Ledger::new();
        let alice = owner("alice");
        ledger.credit(&alice, &usdc(), Decimal::MAX).unwrap();
        let err = ledger.credit(&alice, &usdc(), dec(1)).unwrap_err();
        assert!(matches!(err, StakeclaimError::InvalidAmount { ref reason } if reason.contains("overflows")));
        assert_eq!(ledger.balance(&alice, &usdc()).available, Decimal::MAX);
        assert_eq!(ledger.supply().total_deposits(&usdc()), Decimal::MAX);

        // The per-token deposit total is bounded too, across owners.
        let err = ledger.credit(&owner("bob"), &usdc(), dec(1)).unwrap_err();
        assert!(matches!(err, StakeclaimError::InvalidAmount { .. }));
        assert!(!ledger.has_account(&owner("bob"), &usdc()));
    }

    #[test]
    fn lock_moves_to_locked() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner("alice"), &usdc(), dec(1000)).unwrap();
        ledger.lock(&owner("alice"), &usdc(), dec(100)).unwrap();
        let bal = ledger.balance(&owner("alice"), &usdc());
        assert_eq!(bal.available, dec(900));
        assert_eq!(bal.locked, dec(100));
    }

    #[test]
    fn lock_insufficient_fails_unchanged() {
        let mut ledger = Ledger::new();
        ledger.credit(&owner("alice"), &usdc(), dec(50)).unwrap();
        let err = ledger.lock(&owner("alice"), &usdc(), dec(100)).unwrap_err();
        assert!(matches!(
            err,
            StakeclaimError::InsufficientFunds { needed, available, .. }
                if needed == dec(100) && available == dec(50)
        ));
        assert_eq!(ledger.balance(&owner("alice"), &usdc()).available, dec(50));
    }

    #[test]
    fn lock_unknown_account_fails_without_creating_row() {
        let mut ledger = Ledger::new();
        let err = ledger.lock(&owner("ghost"), &usdc(), dec(1)).unwrap_err();
        assert!(matches!(err, StakeclaimError::InsufficientFunds { .. }));
        assert!(!ledger.has_account(&owner("ghost"), &usdc()));
    }

    #[test]
    fn unlock_and_transfer_to_self_restores_available() {
        let mut ledger = Ledger::new();
        let alice = owner("alice");
        ledger.credit(&alice, &usdc(), dec(1000)).unwrap();
        ledger.lock(&alice, &usdc(), dec(100)).unwrap();
        ledger
            .unlock_and_transfer(&alice, &alice, &usdc(), dec(100))
            .unwrap();
        let bal = ledger.balance(&alice, &usdc());
        assert_eq!(bal.available, dec(1000));
        assert_eq!(bal.locked, Decimal::ZERO);
    }

    #[test]
    fn unlock_and_transfer_to_other_creates_account() {
        let mut ledger = Ledger::new();
        let (alice, bob) = (owner("alice"), owner("bob"));
        ledger.credit(&alice, &usdc(), dec(1000)).unwrap();
        ledger.lock(&alice, &usdc(), dec(100)).unwrap();
        ledger
            .unlock_and_transfer(&alice, &bob, &usdc(), dec(100))
            .unwrap();
        assert_eq!(ledger.balance(&alice, &usdc()).total(), dec(900));
        assert_eq!(ledger.balance(&bob, &usdc()).available, dec(100));
        assert_eq!(ledger.total_supply(&usdc()), dec(1000));
    }

    #[test]
    fn unlock_more_than_locked_fails() {
        let mut ledger = Ledger::new();
        let alice = owner("alice");
        ledger.credit(&alice, &usdc(), dec(1000)).unwrap();
        ledger.lock(&alice, &usdc(), dec(10)).unwrap();
        let err = ledger
            .unlock_and_transfer(&alice, &owner("bob"), &usdc(), dec(11))
            .unwrap_err();
        assert!(matches!(err, StakeclaimError::InsufficientLocked { .. }));
        assert_eq!(ledger.balance(&alice, &usdc()).locked, dec(10));
        assert!(!ledger.has_account(&owner("bob"), &usdc()));
    }

    #[test]
    fn withdraw_emits_record_and_reduces_supply() {
        let mut ledger = Ledger::new();
        let alice = owner("alice");
        ledger.credit(&alice, &usdc(), dec(1000)).unwrap();
        let record = ledger
            .withdraw(&alice, &usdc(), dec(400), Epoch(7), None)
            .unwrap();
        assert_eq!(record.sequence, 1);
        assert_eq!(record.amount, dec(400));
        assert_eq!(record.kind, WithdrawalKind::Withdraw);
        assert_eq!(ledger.balance(&alice, &usdc()).available, dec(600));
        assert_eq!(ledger.total_supply(&usdc()), dec(600));
        assert_eq!(ledger.supply().expected_supply(&usdc()), dec(600));
        assert_eq!(ledger.pending_withdrawals().len(), 1);
    }

    #[test]
    fn withdraw_cannot_touch_locked_funds() {
        let mut ledger = Ledger::new();
        let alice = owner("alice");
        ledger.credit(&alice, &usdc(), dec(100)).unwrap();
        ledger.lock(&alice, &usdc(), dec(60)).unwrap();
        let err = ledger
            .withdraw(&alice, &usdc(), dec(50), Epoch(0), None)
            .unwrap_err();
        assert!(matches!(err, StakeclaimError::InsufficientFunds { .. }));
        assert!(ledger.pending_withdrawals().is_empty());
    }

    #[test]
    fn refund_does_not_touch_balances() {
        let mut ledger = Ledger::new();
        let record = ledger.refund(&owner("alice"), &usdc(), dec(5), Epoch(1));
        assert_eq!(record.kind, WithdrawalKind::DepositRefund);
        assert!(!ledger.has_account(&owner("alice"), &usdc()));
        assert_eq!(ledger.drain_withdrawals(), vec![record]);
        assert!(ledger.pending_withdrawals().is_empty());
    }

    #[test]
    fn totals_are_per_token() {
        let mut ledger = Ledger::new();
        let dai = TokenId::new("dai");
        ledger.credit(&owner("alice"), &usdc(), dec(100)).unwrap();
        ledger.credit(&owner("bob"), &usdc(), dec(50)).unwrap();
        ledger.credit(&owner("bob"), &dai, dec(7)).unwrap();
        ledger.lock(&owner("bob"), &usdc(), dec(20)).unwrap();
        assert_eq!(ledger.total_supply(&usdc()), dec(150));
        assert_eq!(ledger.total_locked(&usdc()), dec(20));
        assert_eq!(ledger.total_supply(&dai), dec(7));
        assert_eq!(ledger.tokens(), vec![dai, usdc()]);
    }
}
