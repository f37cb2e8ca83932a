//! Replay a recorded event stream through a coaching session

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};
use turncoach_core::{
    CoachSession, Evaluator, ProviderFactory, SessionRecorder, SessionReport, SessionStamp,
    TranscriptEvent,
};

use super::load_prompts;
use crate::config::TurncoachConfig;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON-lines file with one transcript event per line
    pub events: PathBuf,

    /// Customer scenario (see `turncoach scenarios`)
    #[arg(long, default_value = "card")]
    pub scenario: String,

    /// Session stamp to record under (HH_MM_SS_DD_MM_YYYY); defaults to now
    #[arg(long)]
    pub stamp: Option<SessionStamp>,

    /// Write the JSON conversation summary as well
    #[arg(long)]
    pub summary: bool,
}

pub async fn run(args: ReplayArgs, config: &TurncoachConfig) -> Result<()> {
    let events = read_events(&args.events)?;
    let prompts = Arc::new(load_prompts(config)?);
    if !prompts.scenarios().contains(&args.scenario.as_str()) {
        warn!(scenario = %args.scenario, "scenario has no persona prompt");
    }

    let evaluator = Arc::new(Evaluator::new(
        config.coach.evaluator.clone(),
        prompts,
        Arc::new(ProviderFactory::new(config.coach.oracle.clone())),
    ));
    evaluator
        .start()
        .await
        .context("Failed to start the evaluator")?;

    let recorder = SessionRecorder::create(
        config.coach.recorder.base_dir(),
        args.scenario.as_str(),
        args.stamp,
    )?;
    let mut session_config = config.coach.session.clone();
    session_config.write_summary |= args.summary;
    let mut session = CoachSession::start(recorder, evaluator, session_config)?;

    info!(events = events.len(), stamp = %session.stamp(), "replaying events");
    for event in events {
        if let Err(e) = session.ingest(event).await {
            warn!(error = %e, "failed to record event");
        }
    }

    let report = session.finalize().await;
    print_report(&report);
    Ok(())
}

/// Parse a JSON-lines event file; blank lines are skipped
fn read_events(path: &Path) -> Result<Vec<TranscriptEvent>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_events(&contents).with_context(|| format!("Invalid event file {}", path.display()))
}

fn parse_events(contents: &str) -> Result<Vec<TranscriptEvent>> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("line {}", i + 1))
        })
        .collect()
}

fn print_report(report: &SessionReport) {
    println!("Session {}", report.stamp);
    println!(
        "  Turns evaluated: {} ({} degraded)",
        report.turns_evaluated, report.degraded_turns
    );
    let show = |label: &str, path: &Option<PathBuf>| match path {
        Some(path) => println!("  {label:<12} {}", path.display()),
        None => println!("  {label:<12} (not written)"),
    };
    show("Transcript:", &report.transcript_path);
    show("Assessment:", &report.assessment_path);
    show("Summary:", &report.summary_path);
    if report.timed_out {
        println!("  Teardown timed out; some artifacts may be missing");
    }
}
