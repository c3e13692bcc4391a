//! Engine input events and their outcomes.
//!
//! The boundary layer decodes deposits and parses user requests into
//! [`EngineEvent`]s, stamps each with the current epoch, and feeds the
//! resulting [`EventEnvelope`]s to the coordinator one at a time. Each
//! accepted event yields an [`EventOutcome`] carrying the updated entities.

use serde::{Deserialize, Serialize};

use crate::{
    AccountBalance, Amount, Claim, ClaimId, Dispute, DisputeId, DisputeOutcome, Epoch, OwnerId,
    TokenId,
};

/// A request or notification for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Decoded token deposit.
    Deposit {
        owner: OwnerId,
        token: TokenId,
        amount: Amount,
    },
    CreateClaim {
        claimant: OwnerId,
        token: TokenId,
        amount: Amount,
        stake: Amount,
        #[serde(default)]
        reference: Option<String>,
    },
    ValidateClaim {
        caller: OwnerId,
        claim_id: ClaimId,
    },
    OpenDispute {
        claim_id: ClaimId,
        disputer: OwnerId,
        stake: Amount,
    },
    ResolveDispute {
        dispute_id: DisputeId,
        outcome: DisputeOutcome,
    },
    /// Resolve an open dispute past its resolve-by epoch in the disputer's favor.
    ExpireDispute { dispute_id: DisputeId },
    FinalizeClaim { claim_id: ClaimId },
    /// Withdraw from `available`. With `claim_id`, withdraws the finalized
    /// amount of that claim and marks it `Withdrawn`.
    Withdraw {
        owner: OwnerId,
        token: TokenId,
        amount: Amount,
        #[serde(default)]
        claim_id: Option<ClaimId>,
    },
}

impl EngineEvent {
    /// Short label used in logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Deposit { .. } => "deposit",
            Self::CreateClaim { .. } => "create_claim",
            Self::ValidateClaim { .. } => "validate_claim",
            Self::OpenDispute { .. } => "open_dispute",
            Self::ResolveDispute { .. } => "resolve_dispute",
            Self::ExpireDispute { .. } => "expire_dispute",
            Self::FinalizeClaim { .. } => "finalize_claim",
            Self::Withdraw { .. } => "withdraw",
        }
    }
}

/// An event stamped with the epoch at which the boundary delivered it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub epoch: Epoch,
    #[serde(flatten)]
    pub event: EngineEvent,
}

impl EventEnvelope {
    #[must_use]
    pub fn new(epoch: Epoch, event: EngineEvent) -> Self {
        Self { epoch, event }
    }
}

/// Why funds are leaving the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithdrawalKind {
    /// Owner-requested withdrawal from `available`.
    Withdraw,
    /// A deposit of a token outside the allow-list, returned unprocessed.
    DepositRefund,
}

impl std::fmt::Display for WithdrawalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Withdraw => write!(f, "WITHDRAW"),
            Self::DepositRefund => write!(f, "DEPOSIT_REFUND"),
        }
    }
}

/// An outbound transfer the boundary must encode into a voucher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRecord {
    /// Position in the engine's withdrawal sequence, starting at 1.
    pub sequence: u64,
    pub owner: OwnerId,
    pub token: TokenId,
    pub amount: Amount,
    pub kind: WithdrawalKind,
    pub epoch: Epoch,
    pub claim_id: Option<ClaimId>,
}

/// The result of an accepted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Deposited {
        owner: OwnerId,
        token: TokenId,
        account: AccountBalance,
    },
    DepositRefunded { record: WithdrawalRecord },
    ClaimCreated { claim: Claim },
    ClaimValidated { claim: Claim },
    DisputeOpened { dispute: Dispute, claim: Claim },
    DisputeResolved { dispute: Dispute, claim: Claim },
    ClaimFinalized { claim: Claim },
    Withdrawn {
        record: WithdrawalRecord,
        account: AccountBalance,
        claim: Option<Claim>,
    },
}

impl EventOutcome {
    /// The withdrawal record produced by this event, if any.
    #[must_use]
    pub fn withdrawal(&self) -> Option<&WithdrawalRecord> {
        match self {
            Self::DepositRefunded { record } | Self::Withdrawn { record, .. } => Some(record),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn envelope_json_is_flat_and_tagged() {
        let env = EventEnvelope::new(
            Epoch(3),
            EngineEvent::Deposit {
                owner: OwnerId::new("alice"),
                token: TokenId::new("usdc"),
                amount: Decimal::new(1000, 0),
            },
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["kind"], "deposit");
        assert_eq!(json["epoch"], 3);
        assert_eq!(json["amount"], "1000");
    }

    #[test]
    fn optional_fields_default() {
        let env: EventEnvelope = serde_json::from_str(
            r#"{"epoch": 1, "kind": "withdraw", "owner": "Bob", "token": "usdc", "amount": "5"}"#,
        )
        .unwrap();
        assert_eq!(env.event.label(), "withdraw");
        match env.event {
            EngineEvent::Withdraw { owner, claim_id, .. } => {
                assert_eq!(owner, OwnerId::new("bob"));
                assert_eq!(claim_id, None);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn resolve_dispute_parses_outcome() {
        let env: EventEnvelope = serde_json::from_str(
            r#"{"epoch": 9, "kind": "resolve_dispute", "dispute_id": 2, "outcome": "UpholdClaim"}"#,
        )
        .unwrap();
        assert_eq!(
            env.event,
            EngineEvent::ResolveDispute {
                dispute_id: DisputeId(2),
                outcome: DisputeOutcome::UpholdClaim,
            }
        );
    }

    #[test]
    fn outcome_exposes_withdrawal() {
        let record = WithdrawalRecord {
            sequence: 1,
            owner: OwnerId::new("alice"),
            token: TokenId::new("usdc"),
            amount: Decimal::ONE,
            kind: WithdrawalKind::DepositRefund,
            epoch: Epoch(0),
            claim_id: None,
        };
        let outcome = EventOutcome::DepositRefunded {
            record: record.clone(),
        };
        assert_eq!(outcome.withdrawal(), Some(&record));
    }
}
