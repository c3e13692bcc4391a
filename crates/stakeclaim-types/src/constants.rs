//! System-wide constants and configuration defaults for Stakeclaim.

/// Default claim window: epochs between claim creation and the earliest
/// finalization.
pub const DEFAULT_CLAIM_EPOCH_LENGTH: u64 = 30;

/// Default dispute window: epochs an open dispute may stay unresolved
/// before anyone can expire it.
pub const DEFAULT_DISPUTE_EPOCH_LENGTH: u64 = 60;

/// Default minimum claimant stake, in whole token units.
pub const DEFAULT_MINIMUM_STAKE: i64 = 1;

/// Default minimum disputer stake, in whole token units.
pub const DEFAULT_MINIMUM_DISPUTE_STAKE: i64 = 1;

/// Basis-point denominator for forfeiture splits.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Default share of a forfeited claimant stake paid to the disputer.
pub const DEFAULT_DISPUTER_SHARE_BPS: u32 = BPS_DENOMINATOR;

/// Domain separator for the state digest.
pub const STATE_DIGEST_DOMAIN: &[u8] = b"stakeclaim:state:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Stakeclaim";
