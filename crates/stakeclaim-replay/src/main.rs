//! # stakeclaim-replay entry point
//!
//! Reports go to stdout as JSON lines; logs go to stderr.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stakeclaim_replay::{ReplayArgs, run_replay};
use stakeclaim_types::constants;

/// Replay a Stakeclaim event log and print per-event results and the final
/// state digest.
#[derive(Parser, Debug)]
#[command(name = "stakeclaim-replay", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    replay: ReplayArgs,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    tracing::debug!(
        engine = constants::ENGINE_NAME,
        version = constants::VERSION,
        "stakeclaim-replay starting"
    );

    let mut stdout = std::io::stdout().lock();
    match run_replay(&cli.replay, &mut stdout) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
