//! Engine state snapshots and the state digest.
//!
//! A snapshot is the complete engine state after some prefix of the event
//! log. All tables are ordered maps, so two replicas that applied the same
//! log serialize to identical bytes and produce the same digest.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stakeclaim_types::constants::STATE_DIGEST_DOMAIN;
use stakeclaim_types::{Epoch, Result};

use crate::claims::ClaimRegistry;
use crate::disputes::DisputeRegistry;
use crate::ledger::Ledger;
use crate::stats::StatsBook;

/// Ledger, claim, dispute and statistics tables persisted together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Epoch of the last applied event.
    pub current_epoch: Epoch,
    /// Number of events accepted so far. Rejected events are not counted.
    pub events_applied: u64,
    pub ledger: Ledger,
    pub claims: ClaimRegistry,
    pub disputes: DisputeRegistry,
    pub stats: StatsBook,
}

impl EngineSnapshot {
    /// Canonical JSON bytes of this snapshot.
    ///
    /// # Errors
    /// Returns `Serialization` if encoding fails.
    pub fn to_canonical_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Domain-separated SHA-256 over the canonical bytes.
    ///
    /// # Errors
    /// Returns `Serialization` if encoding fails.
    pub fn state_digest(&self) -> Result<[u8; 32]> {
        let bytes = self.to_canonical_bytes()?;
        let mut hasher = Sha256::new();
        hasher.update(STATE_DIGEST_DOMAIN);
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(&bytes);

        let result = hasher.finalize();
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&result);
        Ok(digest)
    }

    /// [`state_digest`](Self::state_digest) as lowercase hex.
    ///
    /// # Errors
    /// Returns `Serialization` if encoding fails.
    pub fn digest_hex(&self) -> Result<String> {
        Ok(hex::encode(self.state_digest()?))
    }
}
