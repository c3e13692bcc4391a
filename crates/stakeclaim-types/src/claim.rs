//! # Claim: a staked assertion subject to a dispute window
//!
//! ## State Machine
//!
//! ```text
//!   ┌─────────┐ validate ┌───────────┐  finalize   ┌───────────┐ withdraw ┌───────────┐
//!   │ CREATED ├─────────▶│ VALIDATED ├────────────▶│ FINALIZED ├─────────▶│ WITHDRAWN │
//!   └─────────┘          └──┬─────▲──┘             └───────────┘          └───────────┘
//!                  dispute  │     │ uphold
//!                           ▼     │
//!                        ┌────────┴─┐  reject   ┌──────────┐
//!                        │ DISPUTED ├──────────▶│ REJECTED │
//!                        └──────────┘           └──────────┘
//! ```
//!
//! The claimant's stake stays locked from creation until the claim leaves
//! the active states (`Created`, `Validated`, `Disputed`).

use serde::{Deserialize, Serialize};

use crate::{Amount, ClaimId, DisputeId, Epoch, OwnerId, TokenId};

/// The lifecycle state of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimState {
    /// Stake locked, awaiting validation by the claimant.
    Created,
    /// Eligible for disputes until the deadline and for finalization after it.
    Validated,
    /// A dispute is attached and awaiting resolution.
    Disputed,
    /// Window closed undisputed (or dispute upheld). Stake returned.
    Finalized,
    /// A dispute succeeded. Stake forfeited.
    Rejected,
    /// The claimant withdrew the finalized amount.
    Withdrawn,
}

impl ClaimState {
    /// Can a claim move from this state to `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Created, Self::Validated)
                | (Self::Validated, Self::Disputed | Self::Finalized)
                | (Self::Disputed, Self::Validated | Self::Rejected)
                | (Self::Finalized, Self::Withdrawn)
        )
    }

    /// Whether the claimant's stake is still locked in this state.
    #[must_use]
    pub fn holds_stake(&self) -> bool {
        matches!(self, Self::Created | Self::Validated | Self::Disputed)
    }
}

impl std::fmt::Display for ClaimState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "CREATED"),
            Self::Validated => write!(f, "VALIDATED"),
            Self::Disputed => write!(f, "DISPUTED"),
            Self::Finalized => write!(f, "FINALIZED"),
            Self::Rejected => write!(f, "REJECTED"),
            Self::Withdrawn => write!(f, "WITHDRAWN"),
        }
    }
}

/// A claim record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub claimant: OwnerId,
    pub token: TokenId,
    /// Amount the claimant asserts should be released to them.
    pub amount: Amount,
    /// Collateral locked from the claimant's account.
    pub stake: Amount,
    pub state: ClaimState,
    pub created_at_epoch: Epoch,
    /// `created_at_epoch + claim_epoch_length`. Disputes must open before
    /// it; finalization is allowed from it onward.
    pub deadline_epoch: Epoch,
    /// Set exactly while the claim is `Disputed`.
    pub dispute_id: Option<DisputeId>,
    /// Opaque content reference (e.g. a CID); unique among live claims.
    pub reference: Option<String>,
    /// Epoch of the last state transition.
    pub updated_at_epoch: Epoch,
}

impl Claim {
    /// Whether disputes may still be opened at `now`.
    #[must_use]
    pub fn window_open(&self, now: Epoch) -> bool {
        now < self.deadline_epoch
    }

    /// Whether the epoch condition for finalization holds at `now`.
    #[must_use]
    pub fn deadline_reached(&self, now: Epoch) -> bool {
        now >= self.deadline_epoch
    }
}
