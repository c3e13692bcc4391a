//! Settlement coordinator: the single writer of engine state.
//!
//! Each [`EventEnvelope`] is one logical transaction. The coordinator applies
//! the event to a staged copy of the state, optionally audits the staged
//! copy, and only then commits it. A failing event leaves the committed state
//! (including the current epoch) exactly as it was.
//!
//! ```text
//! envelope ──▶ epoch check ──▶ stage ──▶ dispatch ──▶ audit? ──▶ commit
//!                  │                        │            │
//!                  └────────── Err ◀────────┴────────────┘  (staged copy dropped)
//! ```
//!
//! Staging clones the whole state, so each event costs time linear in the
//! number of accounts, claims, disputes, and undrained withdrawal records.
//! Hosts should call [`SettlementCoordinator::drain_withdrawals`] regularly
//! so the outbox does not grow with the log.

use rust_decimal::Decimal;
use stakeclaim_types::{
    AccountBalance, Amount, Claim, ClaimId, ClaimState, Dispute, DisputeId, DisputeOutcome,
    EngineConfig, EngineEvent, Epoch, ErrorKind, EventEnvelope, EventOutcome, OwnerId, Result,
    StakeclaimError, TokenId, WithdrawalRecord,
};

use crate::claims::ClaimRegistry;
use crate::disputes::DisputeRegistry;
use crate::invariants;
use crate::ledger::Ledger;
use crate::snapshot::EngineSnapshot;
use crate::stats::ParticipantStats;

/// Orchestrates the ledger and both registries, one event at a time.
#[derive(Debug, Clone)]
pub struct SettlementCoordinator {
    config: EngineConfig,
    state: EngineSnapshot,
}

impl SettlementCoordinator {
    /// Create a coordinator with empty state.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` is invalid.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: EngineSnapshot::default(),
        })
    }

    /// Resume from a previously persisted snapshot.
    ///
    /// # Errors
    /// Returns `Configuration` if `config` is invalid, or
    /// `InvariantViolation` if the snapshot does not balance.
    pub fn restore(config: EngineConfig, snapshot: EngineSnapshot) -> Result<Self> {
        config.validate()?;
        invariants::audit(&snapshot.ledger, &snapshot.claims, &snapshot.disputes)?;
        tracing::info!(
            epoch = %snapshot.current_epoch,
            events_applied = snapshot.events_applied,
            claims = snapshot.claims.len(),
            disputes = snapshot.disputes.len(),
            "Restored engine state"
        );
        Ok(Self {
            config,
            state: snapshot,
        })
    }

    /// Apply one event. On error nothing changes.
    ///
    /// # Errors
    /// Any [`StakeclaimError`] raised by the ledger or the registries,
    /// `EpochRegression` for an out-of-order envelope, or
    /// `InvariantViolation` when auditing is enabled and fails.
    pub fn process(&mut self, envelope: &EventEnvelope) -> Result<EventOutcome> {
        let result = self.try_process(envelope);
        match &result {
            Ok(_) => tracing::info!(
                event = envelope.event.label(),
                epoch = %envelope.epoch,
                events_applied = self.state.events_applied,
                "Event applied"
            ),
            Err(err) if err.kind() == ErrorKind::InvariantViolation => tracing::error!(
                event = envelope.event.label(),
                epoch = %envelope.epoch,
                code = err.code(),
                %err,
                "Event violates engine invariants"
            ),
            Err(err) => tracing::warn!(
                event = envelope.event.label(),
                epoch = %envelope.epoch,
                code = err.code(),
                kind = ?err.kind(),
                %err,
                "Event rejected"
            ),
        }
        result
    }

    fn try_process(&mut self, envelope: &EventEnvelope) -> Result<EventOutcome> {
        if envelope.epoch < self.state.current_epoch {
            return Err(StakeclaimError::EpochRegression {
                current: self.state.current_epoch,
                event: envelope.epoch,
            });
        }

        // O(state) per event; see the module docs.
        let mut staged = self.state.clone();
        staged.current_epoch = envelope.epoch;
        let outcome = apply(&self.config, &mut staged, envelope.epoch, &envelope.event)?;
        if self.config.audit_invariants {
            invariants::audit(&staged.ledger, &staged.claims, &staged.disputes)?;
        }
        staged.events_applied += 1;
        self.state = staged;
        Ok(outcome)
    }

    // -----------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Epoch of the last accepted event.
    #[must_use]
    pub fn current_epoch(&self) -> Epoch {
        self.state.current_epoch
    }

    #[must_use]
    pub fn events_applied(&self) -> u64 {
        self.state.events_applied
    }

    #[must_use]
    pub fn balance(&self, owner: &OwnerId, token: &TokenId) -> AccountBalance {
        self.state.ledger.balance(owner, token)
    }

    #[must_use]
    pub fn claim(&self, id: ClaimId) -> Option<&Claim> {
        self.state.claims.get(id)
    }

    #[must_use]
    pub fn dispute(&self, id: DisputeId) -> Option<&Dispute> {
        self.state.disputes.get(id)
    }

    #[must_use]
    pub fn stats(&self, owner: &OwnerId) -> Option<&ParticipantStats> {
        self.state.stats.get(owner)
    }

    #[must_use]
    pub fn ledger(&self) -> &Ledger {
        &self.state.ledger
    }

    #[must_use]
    pub fn claims(&self) -> &ClaimRegistry {
        &self.state.claims
    }

    #[must_use]
    pub fn disputes(&self) -> &DisputeRegistry {
        &self.state.disputes
    }

    #[must_use]
    pub fn snapshot(&self) -> &EngineSnapshot {
        &self.state
    }

    #[must_use]
    pub fn into_snapshot(self) -> EngineSnapshot {
        self.state
    }

    /// See [`EngineSnapshot::state_digest`].
    ///
    /// # Errors
    /// Returns `Serialization` if encoding fails.
    pub fn state_digest(&self) -> Result<[u8; 32]> {
        self.state.state_digest()
    }

    /// Run the collateral and supply audit over the committed state.
    ///
    /// # Errors
    /// Returns `InvariantViolation` describing the first failure.
    pub fn audit(&self) -> Result<()> {
        invariants::audit(&self.state.ledger, &self.state.claims, &self.state.disputes)
    }

    /// Withdrawal records queued since the last drain.
    #[must_use]
    pub fn pending_withdrawals(&self) -> &[WithdrawalRecord] {
        self.state.ledger.pending_withdrawals()
    }

    /// Hand queued withdrawal records to the boundary for voucher encoding.
    pub fn drain_withdrawals(&mut self) -> Vec<WithdrawalRecord> {
        self.state.ledger.drain_withdrawals()
    }
}

/// Dispatch one event against the staged state. Handlers are disjoint by
/// event kind.
fn apply(
    config: &EngineConfig,
    state: &mut EngineSnapshot,
    now: Epoch,
    event: &EngineEvent,
) -> Result<EventOutcome> {
    match event {
        EngineEvent::Deposit {
            owner,
            token,
            amount,
        } => deposit(config, state, owner, token, *amount, now),

        EngineEvent::CreateClaim {
            claimant,
            token,
            amount,
            stake,
            reference,
        } => {
            let claim = state.claims.create(
                &mut state.ledger,
                config,
                claimant,
                token,
                *amount,
                *stake,
                reference.clone(),
                now,
            )?;
            state.stats.claim_created(&claim.claimant, claim.id);
            Ok(EventOutcome::ClaimCreated { claim })
        }

        EngineEvent::ValidateClaim { caller, claim_id } => {
            let claim = state.claims.validate(caller, *claim_id, now)?;
            Ok(EventOutcome::ClaimValidated { claim })
        }

        EngineEvent::OpenDispute {
            claim_id,
            disputer,
            stake,
        } => {
            let (dispute, claim) = state.disputes.open(
                &mut state.claims,
                &mut state.ledger,
                config,
                *claim_id,
                disputer,
                *stake,
                now,
            )?;
            state.stats.dispute_opened(&dispute.disputer, dispute.id);
            Ok(EventOutcome::DisputeOpened { dispute, claim })
        }

        EngineEvent::ResolveDispute {
            dispute_id,
            outcome,
        } => {
            let (dispute, claim) = state.disputes.resolve(
                &mut state.claims,
                &mut state.ledger,
                config,
                *dispute_id,
                *outcome,
                now,
            )?;
            record_resolution(state, &dispute, &claim, *outcome);
            Ok(EventOutcome::DisputeResolved { dispute, claim })
        }

        EngineEvent::ExpireDispute { dispute_id } => {
            let (dispute, claim) = state.disputes.expire(
                &mut state.claims,
                &mut state.ledger,
                config,
                *dispute_id,
                now,
            )?;
            record_resolution(state, &dispute, &claim, DisputeOutcome::RejectClaim);
            Ok(EventOutcome::DisputeResolved { dispute, claim })
        }

        EngineEvent::FinalizeClaim { claim_id } => {
            let claim = state.claims.finalize(&mut state.ledger, *claim_id, now)?;
            state.stats.claim_closed(&claim.claimant, claim.id, true);
            Ok(EventOutcome::ClaimFinalized { claim })
        }

        EngineEvent::Withdraw {
            owner,
            token,
            amount,
            claim_id,
        } => withdraw(config, state, owner, token, *amount, *claim_id, now),
    }
}

fn record_resolution(
    state: &mut EngineSnapshot,
    dispute: &Dispute,
    claim: &Claim,
    outcome: DisputeOutcome,
) {
    let disputer_won = outcome == DisputeOutcome::RejectClaim;
    state
        .stats
        .dispute_closed(&dispute.disputer, dispute.id, disputer_won);
    if claim.state == ClaimState::Rejected {
        state.stats.claim_closed(&claim.claimant, claim.id, false);
    }
}

fn deposit(
    config: &EngineConfig,
    state: &mut EngineSnapshot,
    owner: &OwnerId,
    token: &TokenId,
    amount: Amount,
    now: Epoch,
) -> Result<EventOutcome> {
    if amount <= Decimal::ZERO {
        return Err(StakeclaimError::InvalidAmount {
            reason: format!("deposit must be > 0, got {amount}"),
        });
    }
    if !config.accepts_token(token) {
        let record = state.ledger.refund(owner, token, amount, now);
        tracing::warn!(%owner, %token, %amount, "Deposit of unsupported token refunded");
        return Ok(EventOutcome::DepositRefunded { record });
    }

    state.ledger.credit(owner, token, amount)?;
    Ok(EventOutcome::Deposited {
        owner: owner.clone(),
        token: token.clone(),
        account: state.ledger.balance(owner, token),
    })
}

/// Plain withdrawals debit `available`. A claim-bound withdrawal must come
/// from the claimant of a `Finalized` claim, in its token and for exactly
/// its amount, and moves the claim to `Withdrawn`.
fn withdraw(
    config: &EngineConfig,
    state: &mut EngineSnapshot,
    owner: &OwnerId,
    token: &TokenId,
    amount: Amount,
    claim_id: Option<ClaimId>,
    now: Epoch,
) -> Result<EventOutcome> {
    if !config.accepts_token(token) {
        return Err(StakeclaimError::UnsupportedToken(token.clone()));
    }
    if let Some(id) = claim_id {
        let claim = state.claims.require(id)?;
        if &claim.claimant != owner {
            return Err(StakeclaimError::Unauthorized {
                caller: owner.clone(),
                claim_id: id,
                action: "withdraw",
            });
        }
        if claim.state != ClaimState::Finalized {
            return Err(StakeclaimError::InvalidClaimState {
                claim_id: id,
                state: claim.state,
                action: "withdraw",
            });
        }
        if &claim.token != token || claim.amount != amount {
            return Err(StakeclaimError::InvalidAmount {
                reason: format!(
                    "withdrawal of {amount} {token} does not match {id} ({} {})",
                    claim.amount, claim.token
                ),
            });
        }
    }

    let record = state.ledger.withdraw(owner, token, amount, now, claim_id)?;
    let claim = match claim_id {
        Some(id) => Some(state.claims.mark_withdrawn(id, now)?),
        None => None,
    };
    Ok(EventOutcome::Withdrawn {
        record,
        account: state.ledger.balance(owner, token),
        claim,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn usdc() -> TokenId {
        TokenId::new("usdc")
    }

    fn at(epoch: u64, event: EngineEvent) -> EventEnvelope {
        EventEnvelope::new(Epoch(epoch), event)
    }

    fn deposit_event(owner: &str, amount: i64) -> EngineEvent {
        EngineEvent::Deposit {
            owner: OwnerId::new(owner),
            token: usdc(),
            amount: dec(amount),
        }
    }

    fn engine() -> SettlementCoordinator {
        SettlementCoordinator::new(EngineConfig::testing()).unwrap()
    }

    #[test]
    fn new_rejects_invalid_config() {
        let mut config = EngineConfig::testing();
        config.claim_epoch_length = 0;
        let err = SettlementCoordinator::new(config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn deposit_credits_and_advances_epoch() {
        let mut engine = engine();
        let outcome = engine.process(&at(3, deposit_event("alice", 100))).unwrap();
        assert!(matches!(outcome, EventOutcome::Deposited { account, .. } if account.available == dec(100)));
        assert_eq!(engine.current_epoch(), Epoch(3));
        assert_eq!(engine.events_applied(), 1);
    }

    #[test]
    fn zero_deposit_rejected() {
        let mut engine = engine();
        let err = engine.process(&at(0, deposit_event("alice", 0))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(engine.events_applied(), 0);
    }

    #[test]
    fn rejected_event_changes_nothing() {
        let mut engine = engine();
        engine.process(&at(1, deposit_event("alice", 100))).unwrap();
        let before = engine.state_digest().unwrap();

        let err = engine
            .process(&at(
                5,
                EngineEvent::CreateClaim {
                    claimant: OwnerId::new("alice"),
                    token: usdc(),
                    amount: dec(10),
                    stake: dec(500),
                    reference: None,
                },
            ))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(engine.state_digest().unwrap(), before);
        assert_eq!(engine.current_epoch(), Epoch(1));
        assert!(engine.claims().is_empty());
    }

    #[test]
    fn epoch_regression_rejected() {
        let mut engine = engine();
        engine.process(&at(5, deposit_event("alice", 100))).unwrap();
        let err = engine.process(&at(4, deposit_event("alice", 1))).unwrap_err();
        assert!(matches!(err, StakeclaimError::EpochRegression { current, event } if current == Epoch(5) && event == Epoch(4)));
        assert_eq!(err.kind(), ErrorKind::OutOfOrder);
        // Same epoch is fine.
        engine.process(&at(5, deposit_event("alice", 1))).unwrap();
    }

    #[test]
    fn unsupported_deposit_is_refunded() {
        let mut config = EngineConfig::testing();
        config.allowed_tokens = BTreeSet::from([usdc()]);
        let mut engine = SettlementCoordinator::new(config).unwrap();
        let outcome = engine
            .process(&at(
                0,
                EngineEvent::Deposit {
                    owner: OwnerId::new("alice"),
                    token: TokenId::new("junk"),
                    amount: dec(7),
                },
            ))
            .unwrap();
        let record = outcome.withdrawal().unwrap();
        assert_eq!(record.amount, dec(7));
        assert!(!engine.ledger().has_account(&OwnerId::new("alice"), &TokenId::new("junk")));
        assert_eq!(engine.drain_withdrawals().len(), 1);
        assert!(engine.pending_withdrawals().is_empty());
        engine.audit().unwrap();
    }

    #[test]
    fn drained_outbox_is_not_carried_forward() {
        let mut engine = engine();
        let withdraw = |amount| EngineEvent::Withdraw {
            owner: OwnerId::new("alice"),
            token: usdc(),
            amount: dec(amount),
            claim_id: None,
        };
        engine.process(&at(0, deposit_event("alice", 100))).unwrap();
        engine.process(&at(1, withdraw(10))).unwrap();
        assert_eq!(engine.drain_withdrawals().len(), 1);
        assert!(engine.snapshot().ledger.pending_withdrawals().is_empty());

        engine.process(&at(2, withdraw(20))).unwrap();
        let pending = engine.pending_withdrawals();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].sequence, 2);
        engine.audit().unwrap();
    }

    #[test]
    fn claim_bound_withdraw_requires_claimant() {
        let mut engine = engine();
        let alice = OwnerId::new("alice");
        engine.process(&at(0, deposit_event("alice", 1000))).unwrap();
        engine.process(&at(0, deposit_event("bob", 1000))).unwrap();
        engine
            .process(&at(
                0,
                EngineEvent::CreateClaim {
                    claimant: alice.clone(),
                    token: usdc(),
                    amount: dec(500),
                    stake: dec(100),
                    reference: None,
                },
            ))
            .unwrap();
        engine
            .process(&at(0, EngineEvent::ValidateClaim { caller: alice.clone(), claim_id: ClaimId(1) }))
            .unwrap();
        engine
            .process(&at(10, EngineEvent::FinalizeClaim { claim_id: ClaimId(1) }))
            .unwrap();

        let bob_withdraw = EngineEvent::Withdraw {
            owner: OwnerId::new("bob"),
            token: usdc(),
            amount: dec(500),
            claim_id: Some(ClaimId(1)),
        };
        let err = engine.process(&at(11, bob_withdraw)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let wrong_amount = EngineEvent::Withdraw {
            owner: alice.clone(),
            token: usdc(),
            amount: dec(499),
            claim_id: Some(ClaimId(1)),
        };
        let err = engine.process(&at(11, wrong_amount)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);

        let outcome = engine
            .process(&at(
                11,
                EngineEvent::Withdraw {
                    owner: alice.clone(),
                    token: usdc(),
                    amount: dec(500),
                    claim_id: Some(ClaimId(1)),
                },
            ))
            .unwrap();
        match outcome {
            EventOutcome::Withdrawn { record, account, claim } => {
                assert_eq!(record.claim_id, Some(ClaimId(1)));
                assert_eq!(account.available, dec(500));
                assert_eq!(claim.unwrap().state, ClaimState::Withdrawn);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        engine.audit().unwrap();
    }

    #[test]
    fn stats_follow_lifecycle() {
        let mut engine = engine();
        let alice = OwnerId::new("alice");
        let dave = OwnerId::new("dave");
        engine.process(&at(0, deposit_event("alice", 1000))).unwrap();
        engine.process(&at(0, deposit_event("dave", 200))).unwrap();
        engine
            .process(&at(
                0,
                EngineEvent::CreateClaim {
                    claimant: alice.clone(),
                    token: usdc(),
                    amount: dec(500),
                    stake: dec(100),
                    reference: None,
                },
            ))
            .unwrap();
        engine
            .process(&at(1, EngineEvent::ValidateClaim { caller: alice.clone(), claim_id: ClaimId(1) }))
            .unwrap();
        engine
            .process(&at(
                2,
                EngineEvent::OpenDispute {
                    claim_id: ClaimId(1),
                    disputer: dave.clone(),
                    stake: dec(50),
                },
            ))
            .unwrap();
        assert_eq!(engine.stats(&dave).unwrap().open_disputes.len(), 1);

        engine
            .process(&at(
                3,
                EngineEvent::ResolveDispute {
                    dispute_id: DisputeId(1),
                    outcome: DisputeOutcome::RejectClaim,
                },
            ))
            .unwrap();

        let claimant = engine.stats(&alice).unwrap();
        assert_eq!(claimant.total_claims, 1);
        assert_eq!(claimant.correct_claims, 0);
        assert!(claimant.open_claims.is_empty());
        let disputer = engine.stats(&dave).unwrap();
        assert_eq!(disputer.total_disputes, 1);
        assert_eq!(disputer.won_disputes, 1);
        assert!(disputer.open_disputes.is_empty());
    }

    #[test]
    fn restore_resumes_from_snapshot() {
        let mut engine = engine();
        engine.process(&at(2, deposit_event("alice", 100))).unwrap();
        let digest = engine.state_digest().unwrap();
        let snapshot = engine.snapshot().clone();

        let mut resumed = SettlementCoordinator::restore(EngineConfig::testing(), snapshot).unwrap();
        assert_eq!(resumed.state_digest().unwrap(), digest);
        assert_eq!(resumed.current_epoch(), Epoch(2));
        resumed.process(&at(3, deposit_event("alice", 1))).unwrap();
        assert_eq!(resumed.balance(&OwnerId::new("alice"), &usdc()).available, dec(101));
    }
}
