//! Deterministic replay of an event log.

use stakeclaim_types::{EngineConfig, EventEnvelope, EventOutcome, Result};

use crate::coordinator::SettlementCoordinator;

/// Build a fresh coordinator and apply `envelopes` in order.
///
/// Rejected events are reported in the returned results and do not stop the
/// replay. The same log always yields the same final state.
///
/// # Errors
/// Returns `Configuration` if `config` is invalid. Per-event failures are
/// never returned here.
pub fn replay<'a, I>(
    config: EngineConfig,
    envelopes: I,
) -> Result<(SettlementCoordinator, Vec<Result<EventOutcome>>)>
where
    I: IntoIterator<Item = &'a EventEnvelope>,
{
    let mut coordinator = SettlementCoordinator::new(config)?;
    let results = envelopes
        .into_iter()
        .map(|envelope| coordinator.process(envelope))
        .collect();
    Ok((coordinator, results))
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use stakeclaim_types::{EngineEvent, Epoch, OwnerId, TokenId};

    use super::*;

    fn log() -> Vec<EventEnvelope> {
        vec![
            EventEnvelope::new(
                Epoch(0),
                EngineEvent::Deposit {
                    owner: OwnerId::new("alice"),
                    token: TokenId::new("usdc"),
                    amount: Decimal::new(100, 0),
                },
            ),
            EventEnvelope::new(
                Epoch(1),
                EngineEvent::Withdraw {
                    owner: OwnerId::new("alice"),
                    token: TokenId::new("usdc"),
                    amount: Decimal::new(500, 0),
                    claim_id: None,
                },
            ),
        ]
    }

    #[test]
    fn replay_reports_each_event() {
        let (engine, results) = replay(EngineConfig::testing(), &log()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(engine.events_applied(), 1);
    }

    #[test]
    fn replay_is_deterministic() {
        let events = log();
        let (a, _) = replay(EngineConfig::testing(), &events).unwrap();
        let (b, _) = replay(EngineConfig::testing(), &events).unwrap();
        assert_eq!(a.state_digest().unwrap(), b.state_digest().unwrap());
    }
}
