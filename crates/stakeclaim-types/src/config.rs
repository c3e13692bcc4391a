//! Engine configuration.
//!
//! The configuration is an explicit value handed to the coordinator at
//! construction. It is never read from the environment by the engine.

use std::collections::BTreeSet;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{Amount, OwnerId, Result, StakeclaimError, TokenId, constants};

/// How a forfeited claimant stake is divided on `RejectClaim`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForfeitureSplit {
    /// Share paid to the disputer, in basis points of the forfeited stake.
    pub disputer_share_bps: u32,
    /// Receives the remainder. Required when the share is below 100%.
    pub treasury: Option<OwnerId>,
}

impl ForfeitureSplit {
    /// Split `stake` into `(disputer_share, treasury_share)`.
    ///
    /// The two shares always sum to `stake`. Stakes too large for
    /// `stake * bps` are divided first.
    ///
    /// # Errors
    /// Returns `InvalidAmount` if the share cannot be represented.
    pub fn split(&self, stake: Amount) -> Result<(Amount, Amount)> {
        if self.disputer_share_bps >= constants::BPS_DENOMINATOR {
            return Ok((stake, Decimal::ZERO));
        }
        let bps = Decimal::from(self.disputer_share_bps);
        let denominator = Decimal::from(constants::BPS_DENOMINATOR);
        let unrepresentable = || StakeclaimError::InvalidAmount {
            reason: format!(
                "cannot split stake {stake} at {} bps",
                self.disputer_share_bps
            ),
        };

        let mut share = stake
            .checked_mul(bps)
            .and_then(|product| product.checked_div(denominator))
            .or_else(|| {
                stake
                    .checked_div(denominator)
                    .and_then(|unit| unit.checked_mul(bps))
            })
            .ok_or_else(unrepresentable)?;
        let mut remainder = stake.checked_sub(share).ok_or_else(unrepresentable)?;
        // Near the precision limit the subtraction rounds; truncate the share
        // to the stake's scale so the two parts add back up exactly.
        if share.checked_add(remainder) != Some(stake) {
            share = share.round_dp_with_strategy(stake.scale(), RoundingStrategy::ToZero);
            remainder = stake.checked_sub(share).ok_or_else(unrepresentable)?;
        }
        if share < Decimal::ZERO || remainder < Decimal::ZERO {
            return Err(unrepresentable());
        }
        Ok((share, remainder))
    }
}

impl Default for ForfeitureSplit {
    fn default() -> Self {
        Self {
            disputer_share_bps: constants::DEFAULT_DISPUTER_SHARE_BPS,
            treasury: None,
        }
    }
}

/// Configuration for a Stakeclaim engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest stake accepted for a new claim.
    pub minimum_stake: Amount,
    /// Smallest stake accepted for a new dispute.
    pub minimum_dispute_stake: Amount,
    /// Epochs between claim creation and its deadline.
    pub claim_epoch_length: u64,
    /// Epochs an open dispute may remain unresolved before it can be expired.
    pub dispute_epoch_length: u64,
    /// Accepted tokens. Empty accepts every token.
    pub allowed_tokens: BTreeSet<TokenId>,
    pub forfeiture: ForfeitureSplit,
    /// Audit collateral and supply invariants before committing each event.
    pub audit_invariants: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minimum_stake: Decimal::from(constants::DEFAULT_MINIMUM_STAKE),
            minimum_dispute_stake: Decimal::from(constants::DEFAULT_MINIMUM_DISPUTE_STAKE),
            claim_epoch_length: constants::DEFAULT_CLAIM_EPOCH_LENGTH,
            dispute_epoch_length: constants::DEFAULT_DISPUTE_EPOCH_LENGTH,
            allowed_tokens: BTreeSet::new(),
            forfeiture: ForfeitureSplit::default(),
            audit_invariants: false,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document. Missing fields take
    /// their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StakeclaimError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if self.claim_epoch_length == 0 {
            return Err(StakeclaimError::Configuration(
                "claim_epoch_length must be > 0".into(),
            ));
        }
        if self.dispute_epoch_length == 0 {
            return Err(StakeclaimError::Configuration(
                "dispute_epoch_length must be > 0".into(),
            ));
        }
        if self.minimum_stake <= Decimal::ZERO || self.minimum_dispute_stake <= Decimal::ZERO {
            return Err(StakeclaimError::Configuration(
                "minimum stakes must be > 0".into(),
            ));
        }
        let bps = self.forfeiture.disputer_share_bps;
        if bps > constants::BPS_DENOMINATOR {
            return Err(StakeclaimError::Configuration(format!(
                "disputer_share_bps {bps} exceeds {}",
                constants::BPS_DENOMINATOR
            )));
        }
        if bps < constants::BPS_DENOMINATOR && self.forfeiture.treasury.is_none() {
            return Err(StakeclaimError::Configuration(
                "a treasury is required when disputer_share_bps is below 10000".into(),
            ));
        }
        Ok(())
    }

    /// Whether `token` passes the allow-list.
    #[must_use]
    pub fn accepts_token(&self, token: &TokenId) -> bool {
        self.allowed_tokens.is_empty() || self.allowed_tokens.contains(token)
    }
}

/// Small, round configuration for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl EngineConfig {
    /// Claim window of 10 epochs, dispute window of 5, minimum stakes of 10,
    /// invariant auditing on.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            minimum_stake: Decimal::new(10, 0),
            minimum_dispute_stake: Decimal::new(10, 0),
            claim_epoch_length: 10,
            dispute_epoch_length: 5,
            allowed_tokens: BTreeSet::new(),
            forfeiture: ForfeitureSplit::default(),
            audit_invariants: true,
        }
    }
}
