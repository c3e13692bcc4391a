//! Error types for the Stakeclaim engine.
//!
//! All errors use the `SC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Ledger errors
//! - 2xx: Claim errors
//! - 3xx: Dispute errors
//! - 4xx: Event / epoch errors
//! - 8xx: Safety errors
//! - 9xx: General / internal errors
//!
//! Every variant also maps onto a coarse [`ErrorKind`] so the boundary layer
//! can translate failures without matching on individual variants.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Amount, ClaimId, ClaimState, DisputeId, DisputeState, Epoch, OwnerId, TokenId};

/// Coarse failure taxonomy surfaced to the boundary layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InsufficientFunds,
    InsufficientLocked,
    InvalidAmount,
    NotFound,
    InvalidState,
    TooEarly,
    WindowClosed,
    AlreadyDisputed,
    HasOpenDispute,
    Unauthorized,
    UnsupportedToken,
    Duplicate,
    OutOfOrder,
    InvariantViolation,
    Configuration,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Central error enum for all Stakeclaim operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakeclaimError {
    // =================================================================
    // Ledger Errors (1xx)
    // =================================================================
    /// Not enough available balance to lock or withdraw.
    #[error("SC_ERR_100: Insufficient available funds for {owner} in {token}: need {needed}, have {available}")]
    InsufficientFunds {
        owner: OwnerId,
        token: TokenId,
        needed: Amount,
        available: Amount,
    },

    /// Not enough locked balance to release.
    #[error("SC_ERR_101: Insufficient locked funds for {owner} in {token}: need {needed}, have {locked}")]
    InsufficientLocked {
        owner: OwnerId,
        token: TokenId,
        needed: Amount,
        locked: Amount,
    },

    /// The amount or stake is not acceptable for this operation.
    #[error("SC_ERR_102: Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    /// The token is not on the configured allow-list.
    #[error("SC_ERR_103: Unsupported token: {0}")]
    UnsupportedToken(TokenId),

    // =================================================================
    // Claim Errors (2xx)
    // =================================================================
    #[error("SC_ERR_200: Claim not found: {0}")]
    ClaimNotFound(ClaimId),

    /// The claim is not in a state that permits `action`.
    #[error("SC_ERR_201: Cannot {action} {claim_id} in state {state}")]
    InvalidClaimState {
        claim_id: ClaimId,
        state: ClaimState,
        action: &'static str,
    },

    /// The epoch condition for this operation does not hold yet.
    #[error("SC_ERR_202: Too early: allowed from {ready_at}, now {now}")]
    TooEarly { ready_at: Epoch, now: Epoch },

    /// Finalization was requested while a dispute is attached.
    #[error("SC_ERR_203: {claim_id} has open dispute {dispute_id}")]
    HasOpenDispute {
        claim_id: ClaimId,
        dispute_id: DisputeId,
    },

    /// A live claim with the same reference already exists.
    #[error("SC_ERR_204: Claim with reference {reference} already exists: {existing}")]
    DuplicateClaim {
        reference: String,
        existing: ClaimId,
    },

    /// The caller is not allowed to act on this claim.
    #[error("SC_ERR_205: {caller} is not authorized to {action} {claim_id}")]
    Unauthorized {
        caller: OwnerId,
        claim_id: ClaimId,
        action: &'static str,
    },

    // =================================================================
    // Dispute Errors (3xx)
    // =================================================================
    #[error("SC_ERR_300: Dispute not found: {0}")]
    DisputeNotFound(DisputeId),

    #[error("SC_ERR_301: Cannot {action} {dispute_id} in state {state}")]
    InvalidDisputeState {
        dispute_id: DisputeId,
        state: DisputeState,
        action: &'static str,
    },

    /// The claim's dispute window has closed.
    #[error("SC_ERR_302: Dispute window for {claim_id} closed at {deadline}, now {now}")]
    WindowClosed {
        claim_id: ClaimId,
        deadline: Epoch,
        now: Epoch,
    },

    #[error("SC_ERR_303: {claim_id} is already disputed by {dispute_id}")]
    AlreadyDisputed {
        claim_id: ClaimId,
        dispute_id: DisputeId,
    },

    #[error("SC_ERR_304: Claimant {owner} cannot dispute own {claim_id}")]
    SelfDispute { owner: OwnerId, claim_id: ClaimId },

    // =================================================================
    // Event Errors (4xx)
    // =================================================================
    /// The event's epoch is behind the engine's current epoch.
    #[error("SC_ERR_400: Epoch regression: current {current}, event {event}")]
    EpochRegression { current: Epoch, event: Epoch },

    // =================================================================
    // Safety Errors (8xx)
    // =================================================================
    /// Collateral or supply accounting does not balance. Critical.
    #[error("SC_ERR_800: Invariant violation: {reason}")]
    InvariantViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    #[error("SC_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid values, missing treasury, etc.).
    #[error("SC_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl StakeclaimError {
    /// The taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::InsufficientLocked { .. } => ErrorKind::InsufficientLocked,
            Self::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            Self::UnsupportedToken(_) => ErrorKind::UnsupportedToken,
            Self::ClaimNotFound(_) | Self::DisputeNotFound(_) => ErrorKind::NotFound,
            Self::InvalidClaimState { .. } | Self::InvalidDisputeState { .. } => {
                ErrorKind::InvalidState
            }
            Self::TooEarly { .. } => ErrorKind::TooEarly,
            Self::HasOpenDispute { .. } => ErrorKind::HasOpenDispute,
            Self::DuplicateClaim { .. } => ErrorKind::Duplicate,
            Self::Unauthorized { .. } | Self::SelfDispute { .. } => ErrorKind::Unauthorized,
            Self::WindowClosed { .. } => ErrorKind::WindowClosed,
            Self::AlreadyDisputed { .. } => ErrorKind::AlreadyDisputed,
            Self::EpochRegression { .. } => ErrorKind::OutOfOrder,
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Serialization(_) => ErrorKind::Internal,
        }
    }

    /// The `SC_ERR_xxx` code of this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientFunds { .. } => "SC_ERR_100",
            Self::InsufficientLocked { .. } => "SC_ERR_101",
            Self::InvalidAmount { .. } => "SC_ERR_102",
            Self::UnsupportedToken(_) => "SC_ERR_103",
            Self::ClaimNotFound(_) => "SC_ERR_200",
            Self::InvalidClaimState { .. } => "SC_ERR_201",
            Self::TooEarly { .. } => "SC_ERR_202",
            Self::HasOpenDispute { .. } => "SC_ERR_203",
            Self::DuplicateClaim { .. } => "SC_ERR_204",
            Self::Unauthorized { .. } => "SC_ERR_205",
            Self::DisputeNotFound(_) => "SC_ERR_300",
            Self::InvalidDisputeState { .. } => "SC_ERR_301",
            Self::WindowClosed { .. } => "SC_ERR_302",
            Self::AlreadyDisputed { .. } => "SC_ERR_303",
            Self::SelfDispute { .. } => "SC_ERR_304",
            Self::EpochRegression { .. } => "SC_ERR_400",
            Self::InvariantViolation { .. } => "SC_ERR_800",
            Self::Serialization(_) => "SC_ERR_901",
            Self::Configuration(_) => "SC_ERR_902",
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, StakeclaimError>;

impl From<serde_json::Error> for StakeclaimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
