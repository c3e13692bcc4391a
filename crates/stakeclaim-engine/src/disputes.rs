//! Dispute registry: dispute records tied to claims, and resolution.
//!
//! Opening a dispute locks the disputer's stake and moves the claim to
//! `Disputed`. Resolution settles both stakes according to the outcome:
//!
//! | Outcome       | Disputer stake        | Claimant stake                 | Claim       |
//! |---------------|-----------------------|--------------------------------|-------------|
//! | `UpholdClaim` | forfeited to claimant | stays locked                   | `Validated` |
//! | `RejectClaim` | returned to disputer  | forfeited (disputer/treasury)  | `Rejected`  |
//!
//! Resolution never finalizes a claim; that remains a separate request.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stakeclaim_types::{
    Amount, Claim, ClaimId, ClaimState, Dispute, DisputeId, DisputeOutcome, DisputeState,
    EngineConfig, Epoch, OwnerId, Result, StakeclaimError, TokenId,
};

use crate::claims::ClaimRegistry;
use crate::ledger::Ledger;

/// All disputes indexed by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeRegistry {
    disputes: BTreeMap<DisputeId, Dispute>,
    next_id: DisputeId,
}

impl Default for DisputeRegistry {
    fn default() -> Self {
        Self {
            disputes: BTreeMap::new(),
            next_id: DisputeId::FIRST,
        }
    }
}

impl DisputeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: DisputeId) -> Option<&Dispute> {
        self.disputes.get(&id)
    }

    /// Look up a dispute or fail with `DisputeNotFound`.
    pub fn require(&self, id: DisputeId) -> Result<&Dispute> {
        self.disputes
            .get(&id)
            .ok_or(StakeclaimError::DisputeNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Dispute> {
        self.disputes.values()
    }

    /// Every dispute ever opened against `claim_id`, oldest first.
    pub fn for_claim(&self, claim_id: ClaimId) -> impl Iterator<Item = &Dispute> {
        self.disputes
            .values()
            .filter(move |d| d.claim_id == claim_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.disputes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disputes.is_empty()
    }

    /// Sum of stakes locked by open disputes on claims in `token`.
    #[must_use]
    pub fn open_stake(&self, claims: &ClaimRegistry, token: &TokenId) -> Amount {
        self.disputes
            .values()
            .filter(|d| d.holds_stake())
            .filter(|d| claims.get(d.claim_id).is_some_and(|c| &c.token == token))
            .map(|d| d.stake)
            .sum()
    }

    /// Open a dispute against a `Validated` claim before its deadline.
    ///
    /// # Errors
    /// - `ClaimNotFound` if the claim is unknown
    /// - `AlreadyDisputed` if a dispute is attached
    /// - `InvalidClaimState` if the claim is not `Validated`
    /// - `WindowClosed` if `now >= deadline_epoch`
    /// - `SelfDispute` if the disputer is the claimant
    /// - `InvalidAmount` if the stake is below `minimum_dispute_stake`
    /// - `UnsupportedToken` if the claim's token is no longer allowed
    /// - `InsufficientFunds` from the ledger lock
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn open(
        &mut self,
        claims: &mut ClaimRegistry,
        ledger: &mut Ledger,
        config: &EngineConfig,
        claim_id: ClaimId,
        disputer: &OwnerId,
        stake: Amount,
        now: Epoch,
    ) -> Result<(Dispute, Claim)> {
        let claim = claims.require(claim_id)?;
        if let (ClaimState::Disputed, Some(dispute_id)) = (claim.state, claim.dispute_id) {
            return Err(StakeclaimError::AlreadyDisputed {
                claim_id,
                dispute_id,
            });
        }
        if claim.state != ClaimState::Validated {
            return Err(StakeclaimError::InvalidClaimState {
                claim_id,
                state: claim.state,
                action: "dispute",
            });
        }
        if !claim.window_open(now) {
            return Err(StakeclaimError::WindowClosed {
                claim_id,
                deadline: claim.deadline_epoch,
                now,
            });
        }
        if &claim.claimant == disputer {
            return Err(StakeclaimError::SelfDispute {
                owner: disputer.clone(),
                claim_id,
            });
        }
        if stake <= Decimal::ZERO || stake < config.minimum_dispute_stake {
            return Err(StakeclaimError::InvalidAmount {
                reason: format!(
                    "dispute stake {stake} is below the minimum {}",
                    config.minimum_dispute_stake
                ),
            });
        }
        if !config.accepts_token(&claim.token) {
            return Err(StakeclaimError::UnsupportedToken(claim.token.clone()));
        }

        ledger.lock(disputer, &claim.token, stake)?;

        let id = self.next_id;
        let claim = claims.attach_dispute(claim_id, id, now)?;
        self.next_id = id.next();
        let dispute = Dispute {
            id,
            claim_id,
            disputer: disputer.clone(),
            stake,
            state: DisputeState::Open,
            opened_at_epoch: now,
            resolve_by_epoch: now.after(config.dispute_epoch_length),
            resolved_at_epoch: None,
        };
        self.disputes.insert(id, dispute.clone());
        Ok((dispute, claim))
    }

    /// Apply the adjudicated `outcome` to an open dispute.
    ///
    /// # Errors
    /// - `DisputeNotFound` if unknown
    /// - `InvalidDisputeState` if not `Open`
    /// - ledger errors if the locked stakes are missing
    pub(crate) fn resolve(
        &mut self,
        claims: &mut ClaimRegistry,
        ledger: &mut Ledger,
        config: &EngineConfig,
        dispute_id: DisputeId,
        outcome: DisputeOutcome,
        now: Epoch,
    ) -> Result<(Dispute, Claim)> {
        let dispute = self.require(dispute_id)?.clone();
        if dispute.state.is_terminal() {
            return Err(StakeclaimError::InvalidDisputeState {
                dispute_id,
                state: dispute.state,
                action: "resolve",
            });
        }
        let claim = claims.require(dispute.claim_id)?.clone();

        let claim = match outcome {
            DisputeOutcome::UpholdClaim => {
                ledger.unlock_and_transfer(
                    &dispute.disputer,
                    &claim.claimant,
                    &claim.token,
                    dispute.stake,
                )?;
                claims.clear_dispute(claim.id, dispute_id, now)?
            }
            DisputeOutcome::RejectClaim => {
                ledger.unlock_and_transfer(
                    &dispute.disputer,
                    &dispute.disputer,
                    &claim.token,
                    dispute.stake,
                )?;
                claims.reject(ledger, config, claim.id, &dispute, now)?
            }
        };

        let record = self
            .disputes
            .get_mut(&dispute_id)
            .ok_or(StakeclaimError::DisputeNotFound(dispute_id))?;
        record.state = outcome.into();
        record.resolved_at_epoch = Some(now);
        Ok((record.clone(), claim))
    }

    /// Resolve an open dispute that outlived its resolve-by epoch as
    /// `RejectClaim`: an unanswered challenge stands.
    ///
    /// # Errors
    /// - `DisputeNotFound` if unknown
    /// - `InvalidDisputeState` if not `Open`
    /// - `TooEarly` if `now < resolve_by_epoch`
    pub(crate) fn expire(
        &mut self,
        claims: &mut ClaimRegistry,
        ledger: &mut Ledger,
        config: &EngineConfig,
        dispute_id: DisputeId,
        now: Epoch,
    ) -> Result<(Dispute, Claim)> {
        let dispute = self.require(dispute_id)?;
        if dispute.state.is_terminal() {
            return Err(StakeclaimError::InvalidDisputeState {
                dispute_id,
                state: dispute.state,
                action: "expire",
            });
        }
        if now < dispute.resolve_by_epoch {
            return Err(StakeclaimError::TooEarly {
                ready_at: dispute.resolve_by_epoch,
                now,
            });
        }
        self.resolve(
            claims,
            ledger,
            config,
            dispute_id,
            DisputeOutcome::RejectClaim,
            now,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn usdc() -> TokenId {
        TokenId::new("usdc")
    }

    struct Fixture {
        claims: ClaimRegistry,
        disputes: DisputeRegistry,
        ledger: Ledger,
        config: EngineConfig,
        alice: OwnerId,
        dave: OwnerId,
        claim_id: ClaimId,
    }

    /// Alice (1000) holds a validated claim with stake 100, deadline epoch 10.
    /// Dave holds 200.
    fn fixture() -> Fixture {
        let config = EngineConfig::testing();
        let mut ledger = Ledger::new();
        let mut claims = ClaimRegistry::new();
        let alice = OwnerId::new("alice");
        let dave = OwnerId::new("dave");
        ledger.credit(&alice, &usdc(), dec(1000)).unwrap();
        ledger.credit(&dave, &usdc(), dec(200)).unwrap();
        let claim = claims
            .create(&mut ledger, &config, &alice, &usdc(), dec(500), dec(100), None, Epoch(0))
            .unwrap();
        claims.validate(&alice, claim.id, Epoch(0)).unwrap();
        Fixture {
            claims,
            disputes: DisputeRegistry::new(),
            ledger,
            config,
            alice,
            dave,
            claim_id: claim.id,
        }
    }

    impl Fixture {
        fn open(&mut self, stake: i64, now: u64) -> Result<(Dispute, Claim)> {
            self.disputes.open(
                &mut self.claims,
                &mut self.ledger,
                &self.config,
                self.claim_id,
                &self.dave,
                dec(stake),
                Epoch(now),
            )
        }

        fn resolve(&mut self, id: DisputeId, outcome: DisputeOutcome, now: u64) -> Result<(Dispute, Claim)> {
            self.disputes.resolve(
                &mut self.claims,
                &mut self.ledger,
                &self.config,
                id,
                outcome,
                Epoch(now),
            )
        }
    }

    #[test]
    fn open_locks_stake_and_attaches() {
        let mut fx = fixture();
        let (dispute, claim) = fx.open(50, 9).unwrap();
        assert_eq!(dispute.id, DisputeId(1));
        assert_eq!(dispute.state, DisputeState::Open);
        assert_eq!(dispute.resolve_by_epoch, Epoch(14));
        assert_eq!(claim.state, ClaimState::Disputed);
        assert_eq!(claim.dispute_id, Some(dispute.id));
        let bal = fx.ledger.balance(&fx.dave, &usdc());
        assert_eq!(bal.available, dec(150));
        assert_eq!(bal.locked, dec(50));
        assert_eq!(fx.disputes.open_stake(&fx.claims, &usdc()), dec(50));
    }

    #[test]
    fn open_at_deadline_window_closed() {
        let mut fx = fixture();
        let err = fx.open(50, 10).unwrap_err();
        assert!(matches!(err, StakeclaimError::WindowClosed { deadline, .. } if deadline == Epoch(10)));
        assert!(fx.disputes.is_empty());
        assert_eq!(fx.ledger.balance(&fx.dave, &usdc()).locked, Decimal::ZERO);
    }

    #[test]
    fn second_dispute_already_disputed() {
        let mut fx = fixture();
        fx.open(50, 1).unwrap();
        let err = fx.open(50, 2).unwrap_err();
        assert!(matches!(err, StakeclaimError::AlreadyDisputed { dispute_id, .. } if dispute_id == DisputeId(1)));
        assert_eq!(fx.ledger.balance(&fx.dave, &usdc()).locked, dec(50));
    }

    #[test]
    fn open_on_created_claim_is_invalid_state() {
        let mut fx = fixture();
        let other = fx
            .claims
            .create(&mut fx.ledger, &fx.config, &fx.alice, &usdc(), dec(5), dec(10), None, Epoch(0))
            .unwrap();
        fx.claim_id = other.id;
        let err = fx.open(50, 1).unwrap_err();
        assert!(matches!(err, StakeclaimError::InvalidClaimState { .. }));
    }

    #[test]
    fn open_rejects_self_dispute_and_small_stake() {
        let mut fx = fixture();
        let err = fx
            .disputes
            .open(&mut fx.claims, &mut fx.ledger, &fx.config, fx.claim_id, &fx.alice, dec(50), Epoch(1))
            .unwrap_err();
        assert!(matches!(err, StakeclaimError::SelfDispute { .. }));
        let err = fx.open(5, 1).unwrap_err();
        assert!(matches!(err, StakeclaimError::InvalidAmount { .. }));
    }

    #[test]
    fn open_without_funds_leaves_claim_validated() {
        let mut fx = fixture();
        let err = fx.open(500, 1).unwrap_err();
        assert!(matches!(err, StakeclaimError::InsufficientFunds { .. }));
        let claim = fx.claims.get(fx.claim_id).unwrap();
        assert_eq!(claim.state, ClaimState::Validated);
        assert_eq!(claim.dispute_id, None);
        assert!(fx.disputes.is_empty());
    }

    #[test]
    fn uphold_pays_claimant_and_revalidates() {
        let mut fx = fixture();
        let (dispute, _) = fx.open(50, 1).unwrap();
        let (dispute, claim) = fx.resolve(dispute.id, DisputeOutcome::UpholdClaim, 2).unwrap();
        assert_eq!(dispute.state, DisputeState::UpholdClaim);
        assert_eq!(dispute.resolved_at_epoch, Some(Epoch(2)));
        assert_eq!(claim.state, ClaimState::Validated);
        assert_eq!(claim.dispute_id, None);

        let alice = fx.ledger.balance(&fx.alice, &usdc());
        assert_eq!(alice.available, dec(950));
        assert_eq!(alice.locked, dec(100));
        let dave = fx.ledger.balance(&fx.dave, &usdc());
        assert_eq!(dave.available, dec(150));
        assert_eq!(dave.locked, Decimal::ZERO);
    }

    #[test]
    fn reject_returns_disputer_stake_and_forfeits_claimant() {
        let mut fx = fixture();
        let (dispute, _) = fx.open(50, 1).unwrap();
        let (dispute, claim) = fx.resolve(dispute.id, DisputeOutcome::RejectClaim, 2).unwrap();
        assert_eq!(dispute.state, DisputeState::RejectClaim);
        assert_eq!(claim.state, ClaimState::Rejected);

        let dave = fx.ledger.balance(&fx.dave, &usdc());
        assert_eq!(dave.available, dec(300));
        assert_eq!(dave.locked, Decimal::ZERO);
        let alice = fx.ledger.balance(&fx.alice, &usdc());
        assert_eq!(alice.available, dec(900));
        assert_eq!(alice.locked, Decimal::ZERO);
    }

    #[test]
    fn reject_with_partial_share_pays_treasury() {
        let mut fx = fixture();
        let treasury = OwnerId::new("treasury");
        fx.config.forfeiture.disputer_share_bps = 6_000;
        fx.config.forfeiture.treasury = Some(treasury.clone());
        let (dispute, _) = fx.open(50, 1).unwrap();
        fx.resolve(dispute.id, DisputeOutcome::RejectClaim, 2).unwrap();
        assert_eq!(fx.ledger.balance(&fx.dave, &usdc()).available, dec(260));
        assert_eq!(fx.ledger.balance(&treasury, &usdc()).available, dec(40));
    }

    #[test]
    fn resolve_twice_is_invalid_state() {
        let mut fx = fixture();
        let (dispute, _) = fx.open(50, 1).unwrap();
        fx.resolve(dispute.id, DisputeOutcome::UpholdClaim, 2).unwrap();
        let err = fx.resolve(dispute.id, DisputeOutcome::RejectClaim, 3).unwrap_err();
        assert!(matches!(err, StakeclaimError::InvalidDisputeState { .. }));
        let err = fx.resolve(DisputeId(42), DisputeOutcome::RejectClaim, 3).unwrap_err();
        assert!(matches!(err, StakeclaimError::DisputeNotFound(DisputeId(42))));
    }

    #[test]
    fn upheld_claim_can_be_disputed_again_within_window() {
        let mut fx = fixture();
        let (first, _) = fx.open(50, 1).unwrap();
        fx.resolve(first.id, DisputeOutcome::UpholdClaim, 2).unwrap();
        let (second, claim) = fx.open(20, 3).unwrap();
        assert_eq!(second.id, DisputeId(2));
        assert_eq!(claim.dispute_id, Some(DisputeId(2)));
        assert_eq!(fx.disputes.for_claim(fx.claim_id).count(), 2);
    }

    #[test]
    fn expire_respects_resolve_by() {
        let mut fx = fixture();
        let (dispute, _) = fx.open(50, 1).unwrap();
        let err = fx
            .disputes
            .expire(&mut fx.claims, &mut fx.ledger, &fx.config, dispute.id, Epoch(5))
            .unwrap_err();
        assert!(matches!(err, StakeclaimError::TooEarly { ready_at, .. } if ready_at == Epoch(6)));
        let (dispute, claim) = fx
            .disputes
            .expire(&mut fx.claims, &mut fx.ledger, &fx.config, dispute.id, Epoch(6))
            .unwrap();
        assert_eq!(dispute.state, DisputeState::RejectClaim);
        assert_eq!(claim.state, ClaimState::Rejected);
    }
}
