// src/main.rs
//! Binary entrypoint: run / dry-run / daemon / status.
//!
//! Exit codes are part of the operator contract:
//!   0 success (including a normal skip)
//!   1 generic failure
//!   2 configuration error
//!   3 platform/provider API failure
//!   4 no eligible candidate this cycle

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use social_autopilot::config::Settings;
use social_autopilot::cycle::{self, CycleOutcome};
use social_autopilot::error::CycleError;
use social_autopilot::generation::Drafter;
use social_autopilot::ingest::types::TimelineSource;
use social_autopilot::publish::HttpPublisher;
use social_autopilot::state::StateStore;
use social_autopilot::{metrics, scheduler};

#[derive(Parser)]
#[command(name = "social-autopilot", version, about = "Autonomous content scoring and posting engine")]
struct Cli {
    /// Path to the TOML config (default: config/autopilot.toml, or
    /// $AUTOPILOT_CONFIG_PATH).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace). RUST_LOG wins
    /// when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one full cycle and exit.
    Run,
    /// Run the pipeline through drafting, print the result, publish nothing.
    DryRun,
    /// Run paced cycles until Ctrl-C.
    Daemon,
    /// Print a summary of the durable state and exit.
    Status,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "social_autopilot=info,warn",
        1 => "social_autopilot=debug,info",
        _ => "social_autopilot=trace,debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

fn exit_for(outcome: &CycleOutcome) -> ExitCode {
    match outcome {
        CycleOutcome::Published(_) | CycleOutcome::DryRun { .. } | CycleOutcome::Skipped(_) => {
            ExitCode::SUCCESS
        }
        CycleOutcome::NoEligibleCandidate => ExitCode::from(4),
        CycleOutcome::Failed(CycleError::Generation(_) | CycleError::Publish(_)) => {
            ExitCode::from(3)
        }
        CycleOutcome::Failed(_) => ExitCode::from(1),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    metrics::ensure_metrics_described();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::from(2);
        }
    };

    let store = match StateStore::load(settings.state_file()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "cannot open state ledger");
            return ExitCode::from(1);
        }
    };

    // No built-in timeline client yet; a platform-specific implementor
    // plugs in here without touching the pipeline.
    let timelines: Vec<Box<dyn TimelineSource>> = Vec::new();

    match cli.command {
        Command::Status => status(&settings, &store),
        Command::Run => {
            let mut store = store;
            let sources = cycle::build_sources(&settings);
            let drafter = Drafter::from_config(
                &settings.generation,
                &settings.publish,
                settings.voice_profile(),
            );
            let publisher = HttpPublisher::new(&settings.publish);
            let outcome = cycle::run_cycle(
                &settings, &mut store, &sources, &timelines, &drafter, &publisher,
                Utc::now(),
            )
            .await;
            report(&outcome);
            exit_for(&outcome)
        }
        Command::DryRun => {
            let sources = cycle::build_sources(&settings);
            let drafter = Drafter::from_config(
                &settings.generation,
                &settings.publish,
                settings.voice_profile(),
            );
            let outcome = cycle::run_dry(&settings, &store, &sources, &timelines, &drafter).await;
            report(&outcome);
            exit_for(&outcome)
        }
        Command::Daemon => {
            let mut store = store;
            let sources = cycle::build_sources(&settings);
            let drafter = Drafter::from_config(
                &settings.generation,
                &settings.publish,
                settings.voice_profile(),
            );
            let publisher = HttpPublisher::new(&settings.publish);
            match scheduler::run_daemon(
                &settings, &mut store, &sources, &timelines, &drafter, &publisher,
            )
            .await
            {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(error = %e, "daemon stopped on error");
                    ExitCode::from(1)
                }
            }
        }
    }
}

fn report(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::Published(record) => {
            info!(published_id = %record.published_id, archetype = %record.archetype, "published");
            println!("published {} ({})", record.published_id, record.archetype);
        }
        CycleOutcome::DryRun {
            candidate_id,
            archetype,
            text,
        } => {
            println!("would publish for candidate {candidate_id} as {archetype}:");
            println!("{text}");
        }
        CycleOutcome::Skipped(reason) => println!("skipped: {reason}"),
        CycleOutcome::NoEligibleCandidate => println!("no eligible candidate this cycle"),
        CycleOutcome::Failed(e) => {
            error!(error = %e, "cycle failed");
            eprintln!("cycle failed: {e}");
        }
    }
}

fn status(settings: &Settings, store: &StateStore) -> ExitCode {
    let state = store.state();
    let tz = match settings.timezone_offset() {
        Ok(tz) => tz,
        Err(e) => {
            error!(error = %e, "configuration error");
            return ExitCode::from(2);
        }
    };
    let today = Utc::now().with_timezone(&tz).date_naive();

    println!("state file:       {}", settings.state_file().display());
    println!("published total:  {}", state.records.len());
    println!(
        "published today:  {} / {}",
        store.count_actions_on(today),
        settings.cadence.max_per_day
    );
    match state.last_action_at {
        Some(at) => println!("last action:      {}", at.to_rfc3339()),
        None => println!("last action:      never"),
    }
    let history: Vec<&str> = store
        .rotation_history()
        .iter()
        .map(|a| a.name())
        .collect();
    println!(
        "recent archetypes: {}",
        if history.is_empty() {
            "none".to_string()
        } else {
            history.join(", ")
        }
    );
    ExitCode::SUCCESS
}
