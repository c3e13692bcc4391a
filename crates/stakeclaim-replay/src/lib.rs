//! # stakeclaim-replay
//!
//! Feeds a JSON-lines event log through a fresh [`SettlementCoordinator`]
//! and reports, one JSON line per event, whether it was applied or rejected.
//! The final line carries the state digest, so two runs over the same log
//! can be compared by their last line.
//!
//! Input format: one [`EventEnvelope`] per line. Blank lines and lines
//! starting with `#` are skipped.
//!
//! ```text
//! {"epoch":0,"kind":"deposit","owner":"0xabc","token":"0xusdc","amount":"1000"}
//! {"epoch":0,"kind":"create_claim","claimant":"0xabc","token":"0xusdc","amount":"500","stake":"100"}
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use stakeclaim_engine::SettlementCoordinator;
use stakeclaim_types::{EngineConfig, Epoch, ErrorKind, EventEnvelope, EventOutcome};

/// Arguments for a replay run.
#[derive(Args, Debug, Clone)]
pub struct ReplayArgs {
    /// Path to the JSON-lines event log.
    #[arg(long)]
    pub events: PathBuf,

    /// Engine configuration (JSON). Defaults apply when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write the final engine snapshot (JSON) to this path.
    #[arg(long)]
    pub snapshot_out: Option<PathBuf>,
}

/// Per-event report line.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EventReport {
    Ok {
        line: usize,
        epoch: Epoch,
        event: &'static str,
        #[serde(flatten)]
        outcome: EventOutcome,
    },
    Err {
        line: usize,
        epoch: Epoch,
        event: &'static str,
        code: &'static str,
        kind: ErrorKind,
        message: String,
    },
}

/// Final report line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub events: usize,
    pub applied: usize,
    pub rejected: usize,
    pub final_epoch: Epoch,
    pub digest: String,
}

/// Load the engine configuration, or the defaults when no path is given.
///
/// # Errors
/// Fails if the file cannot be read or does not hold a valid configuration.
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    EngineConfig::from_json_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

/// Parse a JSON-lines log into `(line number, envelope)` pairs.
///
/// # Errors
/// Fails on the first line that is not a valid envelope.
pub fn parse_events(input: &str) -> Result<Vec<(usize, EventEnvelope)>> {
    input
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line_no, line)| {
            serde_json::from_str::<EventEnvelope>(line)
                .map(|envelope| (line_no, envelope))
                .with_context(|| format!("line {line_no}: invalid event"))
        })
        .collect()
}

/// Apply every envelope and write one report line per event, then the
/// summary line.
///
/// Rejected events are reported and do not stop the run.
///
/// # Errors
/// Fails on an invalid configuration or if writing to `out` fails.
pub fn replay_log<W: Write>(
    config: EngineConfig,
    events: &[(usize, EventEnvelope)],
    out: &mut W,
) -> Result<(SettlementCoordinator, Summary)> {
    let mut engine = SettlementCoordinator::new(config)?;
    let mut rejected = 0;

    for (line, envelope) in events {
        let event = envelope.event.label();
        let report = match engine.process(envelope) {
            Ok(outcome) => EventReport::Ok {
                line: *line,
                epoch: envelope.epoch,
                event,
                outcome,
            },
            Err(err) => {
                rejected += 1;
                EventReport::Err {
                    line: *line,
                    epoch: envelope.epoch,
                    event,
                    code: err.code(),
                    kind: err.kind(),
                    message: err.to_string(),
                }
            }
        };
        serde_json::to_writer(&mut *out, &report)?;
        writeln!(out)?;
    }

    let summary = Summary {
        events: events.len(),
        applied: events.len() - rejected,
        rejected,
        final_epoch: engine.current_epoch(),
        digest: engine.snapshot().digest_hex()?,
    };
    serde_json::to_writer(&mut *out, &summary)?;
    writeln!(out)?;
    Ok((engine, summary))
}

/// Full run: read the inputs, replay, and optionally persist the snapshot.
///
/// # Errors
/// Fails on I/O, parse, or configuration errors. Rejected events are not
/// errors.
pub fn run_replay<W: Write>(args: &ReplayArgs, out: &mut W) -> Result<Summary> {
    let config = load_config(args.config.as_deref())?;
    let raw = std::fs::read_to_string(&args.events)
        .with_context(|| format!("reading events {}", args.events.display()))?;
    let events = parse_events(&raw)?;
    tracing::info!(events = events.len(), path = %args.events.display(), "Replaying event log");

    let (engine, summary) = replay_log(config, &events, out)?;

    if let Some(path) = &args.snapshot_out {
        let json = serde_json::to_vec_pretty(engine.snapshot())?;
        std::fs::write(path, json)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        tracing::info!(path = %path.display(), "Snapshot written");
    }

    tracing::info!(
        applied = summary.applied,
        rejected = summary.rejected,
        digest = %summary.digest,
        "Replay complete"
    );
    Ok(summary)
}
