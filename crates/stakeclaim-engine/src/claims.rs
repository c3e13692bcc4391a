//! Claim registry: claim records and their lifecycle transitions.
//!
//! The registry atomically locks the claimant's stake and records the claim.
//! Every transition checks the full precondition first and only then moves
//! funds and updates the record, so a failed call leaves both the registry
//! and the ledger unchanged.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stakeclaim_types::{
    Amount, Claim, ClaimId, ClaimState, Dispute, DisputeId, EngineConfig, Epoch, OwnerId, Result,
    StakeclaimError, TokenId,
};

use crate::ledger::Ledger;

/// All claims indexed by id, plus the live-reference index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRegistry {
    claims: BTreeMap<ClaimId, Claim>,
    /// Reference → claim holding it. Released when that claim is rejected.
    references: BTreeMap<String, ClaimId>,
    next_id: ClaimId,
}

impl Default for ClaimRegistry {
    fn default() -> Self {
        Self {
            claims: BTreeMap::new(),
            references: BTreeMap::new(),
            next_id: ClaimId::FIRST,
        }
    }
}

impl ClaimRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, id: ClaimId) -> Option<&Claim> {
        self.claims.get(&id)
    }

    /// Look up a claim or fail with `ClaimNotFound`.
    pub fn require(&self, id: ClaimId) -> Result<&Claim> {
        self.claims
            .get(&id)
            .ok_or(StakeclaimError::ClaimNotFound(id))
    }

    /// Claims in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    /// The id the next created claim will receive.
    #[must_use]
    pub fn next_id(&self) -> ClaimId {
        self.next_id
    }

    /// Live claim holding `reference`, if any.
    #[must_use]
    pub fn by_reference(&self, reference: &str) -> Option<&Claim> {
        self.references
            .get(reference)
            .and_then(|id| self.claims.get(id))
    }

    /// Sum of stakes still locked by claims in `token`.
    #[must_use]
    pub fn active_stake(&self, token: &TokenId) -> Amount {
        self.claims
            .values()
            .filter(|c| &c.token == token && c.state.holds_stake())
            .map(|c| c.stake)
            .sum()
    }

    fn require_mut(&mut self, id: ClaimId) -> Result<&mut Claim> {
        self.claims
            .get_mut(&id)
            .ok_or(StakeclaimError::ClaimNotFound(id))
    }

    /// Lock the claimant's stake and record a new claim in `Created`.
    ///
    /// If the lock fails, no record is created.
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0` or `stake < minimum_stake`
    /// - `UnsupportedToken` if the token is not allowed
    /// - `DuplicateClaim` if a live claim already holds `reference`
    /// - `InsufficientFunds` from the ledger lock
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create(
        &mut self,
        ledger: &mut Ledger,
        config: &EngineConfig,
        claimant: &OwnerId,
        token: &TokenId,
        amount: Amount,
        stake: Amount,
        reference: Option<String>,
        now: Epoch,
    ) -> Result<Claim> {
        if amount <= Decimal::ZERO {
            return Err(StakeclaimError::InvalidAmount {
                reason: format!("claim amount must be > 0, got {amount}"),
            });
        }
        if stake < config.minimum_stake {
            return Err(StakeclaimError::InvalidAmount {
                reason: format!(
                    "stake {stake} is below the minimum {}",
                    config.minimum_stake
                ),
            });
        }
        if !config.accepts_token(token) {
            return Err(StakeclaimError::UnsupportedToken(token.clone()));
        }
        if let Some(reference) = &reference {
            if let Some(existing) = self.references.get(reference) {
                return Err(StakeclaimError::DuplicateClaim {
                    reference: reference.clone(),
                    existing: *existing,
                });
            }
        }

        // Lock first: if this fails, nothing has changed.
        ledger.lock(claimant, token, stake)?;

        let id = self.next_id;
        self.next_id = id.next();
        let claim = Claim {
            id,
            claimant: claimant.clone(),
            token: token.clone(),
            amount,
            stake,
            state: ClaimState::Created,
            created_at_epoch: now,
            deadline_epoch: now.after(config.claim_epoch_length),
            dispute_id: None,
            reference: reference.clone(),
            updated_at_epoch: now,
        };
        if let Some(reference) = reference {
            self.references.insert(reference, id);
        }
        self.claims.insert(id, claim.clone());
        Ok(claim)
    }

    /// `Created → Validated`. Metadata only; no funds move.
    ///
    /// # Errors
    /// - `ClaimNotFound` if unknown
    /// - `Unauthorized` if `caller` is not the claimant
    /// - `InvalidClaimState` if not `Created`
    pub(crate) fn validate(&mut self, caller: &OwnerId, id: ClaimId, now: Epoch) -> Result<Claim> {
        let claim = self.require_mut(id)?;
        if &claim.claimant != caller {
            return Err(StakeclaimError::Unauthorized {
                caller: caller.clone(),
                claim_id: id,
                action: "validate",
            });
        }
        if claim.state != ClaimState::Created {
            return Err(StakeclaimError::InvalidClaimState {
                claim_id: id,
                state: claim.state,
                action: "validate",
            });
        }
        claim.state = ClaimState::Validated;
        claim.updated_at_epoch = now;
        Ok(claim.clone())
    }

    /// `Validated → Finalized`, returning the stake to the claimant.
    ///
    /// # Errors
    /// - `ClaimNotFound` if unknown
    /// - `HasOpenDispute` if `Disputed`
    /// - `InvalidClaimState` if otherwise not `Validated`
    /// - `TooEarly` if `now < deadline_epoch`
    pub(crate) fn finalize(&mut self, ledger: &mut Ledger, id: ClaimId, now: Epoch) -> Result<Claim> {
        let claim = self.require(id)?;
        if let (ClaimState::Disputed, Some(dispute_id)) = (claim.state, claim.dispute_id) {
            return Err(StakeclaimError::HasOpenDispute {
                claim_id: id,
                dispute_id,
            });
        }
        if claim.state != ClaimState::Validated {
            return Err(StakeclaimError::InvalidClaimState {
                claim_id: id,
                state: claim.state,
                action: "finalize",
            });
        }
        if !claim.deadline_reached(now) {
            return Err(StakeclaimError::TooEarly {
                ready_at: claim.deadline_epoch,
                now,
            });
        }

        ledger.unlock_and_transfer(&claim.claimant, &claim.claimant, &claim.token, claim.stake)?;

        let claim = self.require_mut(id)?;
        claim.state = ClaimState::Finalized;
        claim.updated_at_epoch = now;
        Ok(claim.clone())
    }

    /// `Disputed → Rejected` as the consequence of `dispute` prevailing.
    /// The claimant's stake is forfeited: the configured share to the
    /// disputer, the remainder to the treasury.
    ///
    /// # Errors
    /// - `ClaimNotFound` if unknown
    /// - `InvalidClaimState` if the claim is not disputed by `dispute`
    /// - `InvalidAmount` if the stake cannot be split
    pub(crate) fn reject(
        &mut self,
        ledger: &mut Ledger,
        config: &EngineConfig,
        id: ClaimId,
        dispute: &Dispute,
        now: Epoch,
    ) -> Result<Claim> {
        let claim = self.require(id)?;
        if claim.state != ClaimState::Disputed || claim.dispute_id != Some(dispute.id) {
            return Err(StakeclaimError::InvalidClaimState {
                claim_id: id,
                state: claim.state,
                action: "reject",
            });
        }

        let (to_disputer, to_treasury) = config.forfeiture.split(claim.stake)?;
        let treasury = match (&config.forfeiture.treasury, to_treasury > Decimal::ZERO) {
            (Some(treasury), true) => Some(treasury.clone()),
            (None, true) => {
                return Err(StakeclaimError::Configuration(
                    "forfeiture remainder with no treasury".into(),
                ));
            }
            (_, false) => None,
        };

        if to_disputer > Decimal::ZERO {
            ledger.unlock_and_transfer(&claim.claimant, &dispute.disputer, &claim.token, to_disputer)?;
        }
        if let Some(treasury) = treasury {
            ledger.unlock_and_transfer(&claim.claimant, &treasury, &claim.token, to_treasury)?;
        }

        let claim = self.require_mut(id)?;
        claim.state = ClaimState::Rejected;
        claim.dispute_id = None;
        claim.updated_at_epoch = now;
        let claim = claim.clone();
        if let Some(reference) = &claim.reference {
            self.references.remove(reference);
        }
        Ok(claim)
    }

    /// `Validated → Disputed`, attaching `dispute_id`.
    pub(crate) fn attach_dispute(
        &mut self,
        id: ClaimId,
        dispute_id: DisputeId,
        now: Epoch,
    ) -> Result<Claim> {
        let claim = self.require_mut(id)?;
        if claim.state != ClaimState::Validated {
            return Err(StakeclaimError::InvalidClaimState {
                claim_id: id,
                state: claim.state,
                action: "dispute",
            });
        }
        claim.state = ClaimState::Disputed;
        claim.dispute_id = Some(dispute_id);
        claim.updated_at_epoch = now;
        Ok(claim.clone())
    }

    /// `Disputed → Validated` after the claim was upheld.
    pub(crate) fn clear_dispute(
        &mut self,
        id: ClaimId,
        dispute_id: DisputeId,
        now: Epoch,
    ) -> Result<Claim> {
        let claim = self.require_mut(id)?;
        if claim.state != ClaimState::Disputed || claim.dispute_id != Some(dispute_id) {
            return Err(StakeclaimError::InvalidClaimState {
                claim_id: id,
                state: claim.state,
                action: "uphold",
            });
        }
        claim.state = ClaimState::Validated;
        claim.dispute_id = None;
        claim.updated_at_epoch = now;
        Ok(claim.clone())
    }

    /// `Finalized → Withdrawn`.
    pub(crate) fn mark_withdrawn(&mut self, id: ClaimId, now: Epoch) -> Result<Claim> {
        let claim = self.require_mut(id)?;
        if !claim.state.can_transition_to(ClaimState::Withdrawn) {
            return Err(StakeclaimError::InvalidClaimState {
                claim_id: id,
                state: claim.state,
                action: "withdraw",
            });
        }
        claim.state = ClaimState::Withdrawn;
        claim.updated_at_epoch = now;
        Ok(claim.clone())
    }
}
