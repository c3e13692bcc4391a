//! Per-participant claim and dispute statistics.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use stakeclaim_types::{ClaimId, DisputeId, OwnerId};

/// Track record of one participant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantStats {
    /// Claims ever created.
    pub total_claims: u64,
    /// Claims that reached `Finalized`.
    pub correct_claims: u64,
    /// Disputes ever opened.
    pub total_disputes: u64,
    /// Disputes resolved as `RejectClaim`.
    pub won_disputes: u64,
    /// Claims not yet finalized or rejected.
    pub open_claims: BTreeSet<ClaimId>,
    /// Disputes still `Open`.
    pub open_disputes: BTreeSet<DisputeId>,
}

/// Statistics for every participant that has created a claim or opened a
/// dispute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsBook {
    participants: BTreeMap<OwnerId, ParticipantStats>,
}

impl StatsBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, owner: &OwnerId) -> Option<&ParticipantStats> {
        self.participants.get(owner)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OwnerId, &ParticipantStats)> {
        self.participants.iter()
    }

    fn entry(&mut self, owner: &OwnerId) -> &mut ParticipantStats {
        self.participants.entry(owner.clone()).or_default()
    }

    pub(crate) fn claim_created(&mut self, claimant: &OwnerId, claim_id: ClaimId) {
        let stats = self.entry(claimant);
        stats.total_claims += 1;
        stats.open_claims.insert(claim_id);
    }

    /// A claim left the open set; `correct` when it was finalized.
    pub(crate) fn claim_closed(&mut self, claimant: &OwnerId, claim_id: ClaimId, correct: bool) {
        let stats = self.entry(claimant);
        stats.open_claims.remove(&claim_id);
        if correct {
            stats.correct_claims += 1;
        }
    }

    pub(crate) fn dispute_opened(&mut self, disputer: &OwnerId, dispute_id: DisputeId) {
        let stats = self.entry(disputer);
        stats.total_disputes += 1;
        stats.open_disputes.insert(dispute_id);
    }

    pub(crate) fn dispute_closed(&mut self, disputer: &OwnerId, dispute_id: DisputeId, won: bool) {
        let stats = self.entry(disputer);
        stats.open_disputes.remove(&dispute_id);
        if won {
            stats.won_disputes += 1;
        }
    }
}
