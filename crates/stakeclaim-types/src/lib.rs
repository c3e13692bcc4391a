//! # stakeclaim-types
//!
//! Shared types, errors, and configuration for the **Stakeclaim** optimistic
//! claims engine.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`OwnerId`], [`TokenId`], [`ClaimId`], [`DisputeId`], [`Epoch`]
//! - **Balance model**: [`AccountBalance`], [`Amount`]
//! - **Claim model**: [`Claim`], [`ClaimState`]
//! - **Dispute model**: [`Dispute`], [`DisputeState`], [`DisputeOutcome`]
//! - **Events**: [`EventEnvelope`], [`EngineEvent`], [`EventOutcome`], [`WithdrawalRecord`]
//! - **Configuration**: [`EngineConfig`], [`ForfeitureSplit`]
//! - **Errors**: [`StakeclaimError`] with `SC_ERR_` prefix codes, [`ErrorKind`]
//! - **Constants**: defaults and domain separators

pub mod account;
pub mod claim;
pub mod config;
pub mod constants;
pub mod dispute;
pub mod error;
pub mod event;
pub mod ids;

pub use account::*;
pub use claim::*;
pub use config::*;
pub use dispute::*;
pub use error::*;
pub use event::*;
pub use ids::*;

// Constants are accessed via `stakeclaim_types::constants::FOO`
// (not re-exported to avoid name collisions).
