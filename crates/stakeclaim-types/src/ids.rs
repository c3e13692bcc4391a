//! Identifiers used throughout Stakeclaim.
//!
//! Owner and token identifiers are addresses and are compared
//! case-insensitively, so they are normalized to lowercase on construction.
//! Claim and dispute identifiers are sequential and allocated by their
//! registries; every replica replaying the same event log allocates the
//! same ids.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OwnerId
// ---------------------------------------------------------------------------

/// Address of an account owner (claimant, disputer, depositor, treasury).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct OwnerId(String);

impl OwnerId {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OwnerId {
    fn from(address: String) -> Self {
        Self::new(address)
    }
}

impl From<&str> for OwnerId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// Address of a token contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct TokenId(String);

impl TokenId {
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into().to_lowercase())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TokenId {
    fn from(address: String) -> Self {
        Self::new(address)
    }
}

impl From<&str> for TokenId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// ClaimId / DisputeId
// ---------------------------------------------------------------------------

/// Sequential claim identifier. The first claim is `claim:1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ClaimId(pub u64);

impl ClaimId {
    pub const FIRST: Self = Self(1);

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "claim:{}", self.0)
    }
}

/// Sequential dispute identifier. The first dispute is `dispute:1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DisputeId(pub u64);

impl DisputeId {
    pub const FIRST: Self = Self(1);

    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for DisputeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dispute:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Epoch
// ---------------------------------------------------------------------------

/// Logical time. Supplied by the boundary with every event and never
/// decreases across the event log.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize,
)]
pub struct Epoch(pub u64);

impl Epoch {
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// `self + length`, saturating at `u64::MAX` so a window never wraps
    /// around to the past.
    #[must_use]
    pub fn after(self, length: u64) -> Self {
        Self(self.0.saturating_add(length))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
