//! Dispute records and resolution outcomes.
//!
//! A dispute is a staked challenge against a `Validated` claim. It is
//! created `Open` and moves exactly once to the terminal state named by
//! its outcome.

use serde::{Deserialize, Serialize};

use crate::{Amount, ClaimId, DisputeId, Epoch, OwnerId};

/// The adjudicated result of a dispute, supplied by the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeOutcome {
    /// The claim stands: the disputer's stake goes to the claimant.
    UpholdClaim,
    /// The claim falls: the claimant's stake goes to the disputer.
    RejectClaim,
}

impl std::fmt::Display for DisputeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UpholdClaim => write!(f, "UPHOLD_CLAIM"),
            Self::RejectClaim => write!(f, "REJECT_CLAIM"),
        }
    }
}

/// The lifecycle state of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeState {
    Open,
    UpholdClaim,
    RejectClaim,
}

impl DisputeState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl From<DisputeOutcome> for DisputeState {
    fn from(outcome: DisputeOutcome) -> Self {
        match outcome {
            DisputeOutcome::UpholdClaim => Self::UpholdClaim,
            DisputeOutcome::RejectClaim => Self::RejectClaim,
        }
    }
}

impl std::fmt::Display for DisputeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::UpholdClaim => write!(f, "UPHOLD_CLAIM"),
            Self::RejectClaim => write!(f, "REJECT_CLAIM"),
        }
    }
}

/// A dispute record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub claim_id: ClaimId,
    pub disputer: OwnerId,
    /// Collateral locked from the disputer's account.
    pub stake: Amount,
    pub state: DisputeState,
    /// Always strictly before the claim's deadline.
    pub opened_at_epoch: Epoch,
    /// From this epoch on, an unresolved dispute may be expired.
    pub resolve_by_epoch: Epoch,
    pub resolved_at_epoch: Option<Epoch>,
}

impl Dispute {
    /// Whether the disputer's stake is still locked.
    #[must_use]
    pub fn holds_stake(&self) -> bool {
        self.state == DisputeState::Open
    }
}
