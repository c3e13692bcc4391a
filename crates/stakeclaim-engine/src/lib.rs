//! # stakeclaim-engine
//!
//! Optimistic claims engine for **Stakeclaim**: a party posts a claim backed
//! by stake, others may challenge it within the claim window, and the claim
//! is finalized only once the window closes undisputed or a dispute resolves
//! in its favor.
//!
//! - [`Ledger`]: per-owner, per-token balances with available/locked accounting
//! - [`ClaimRegistry`]: claim records and lifecycle transitions
//! - [`DisputeRegistry`]: dispute records and resolution
//! - [`SettlementCoordinator`]: applies one event at a time, all-or-nothing
//! - [`invariants`]: collateral and supply conservation audit
//! - [`EngineSnapshot`]: canonical state, digest, restore
//! - [`replay()`]: deterministic replay of an event log
//!
//! ## Claim lifecycle
//!
//! ```text
//!            validate            finalize (now >= deadline)       withdraw
//! CREATED ───────────▶ VALIDATED ─────────────────────────▶ FINALIZED ───────▶ WITHDRAWN
//!                        │    ▲
//!          open dispute  │    │ UpholdClaim
//!         (now < deadline)▼    │
//!                       DISPUTED ──── RejectClaim / expiry ────▶ REJECTED
//! ```
//!
//! Only the coordinator mutates state. Ledger and registry mutators are
//! crate-private; everything public on them is a query.

pub mod claims;
pub mod coordinator;
pub mod disputes;
pub mod invariants;
pub mod ledger;
pub mod replay;
pub mod snapshot;
pub mod stats;

pub use claims::ClaimRegistry;
pub use coordinator::SettlementCoordinator;
pub use disputes::DisputeRegistry;
pub use invariants::{SupplyConservation, audit};
pub use ledger::Ledger;
pub use replay::replay;
pub use snapshot::EngineSnapshot;
pub use stats::{ParticipantStats, StatsBook};
