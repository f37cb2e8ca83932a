//! Inspect recorded sessions

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use turncoach_core::{CoachTurnRecord, SessionCatalog, SessionStamp};

use crate::config::TurncoachConfig;

/// Sessions arguments
#[derive(Args, Debug)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommands,
}

/// Sessions subcommands
#[derive(Subcommand, Debug)]
pub enum SessionsCommands {
    /// List recorded sessions, newest first
    List,
    /// Show one artifact of a recorded session
    Show {
        /// Session stamp (HH_MM_SS_DD_MM_YYYY)
        stamp: SessionStamp,

        #[arg(long, value_enum, default_value_t = Artifact::PerTurn)]
        artifact: Artifact,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Artifact {
    PerTurn,
    Transcript,
    Interims,
    Assessment,
}

/// Run sessions command
pub fn run(args: SessionsArgs, config: &TurncoachConfig) -> Result<()> {
    let catalog = SessionCatalog::new(config.coach.recorder.base_dir());
    match args.command {
        SessionsCommands::List => list_sessions(&catalog),
        SessionsCommands::Show { stamp, artifact } => show_session(&catalog, &stamp, artifact),
    }
}

fn list_sessions(catalog: &SessionCatalog) -> Result<()> {
    let sessions = catalog.list()?;
    if sessions.is_empty() {
        println!("No recorded sessions in {}", catalog.base_dir().display());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Stamp").fg(Color::Cyan),
        Cell::new("Recorded").fg(Color::Cyan),
        Cell::new("Turns").fg(Color::Cyan),
        Cell::new("Transcript").fg(Color::Cyan),
        Cell::new("Assessment").fg(Color::Cyan),
    ]);

    for session in sessions {
        table.add_row(vec![
            Cell::new(session.stamp),
            Cell::new(session.stamp.display_time()),
            Cell::new(session.turns),
            Cell::new(yes_no(session.has_transcript)),
            Cell::new(yes_no(session.has_assessment)),
        ]);
    }

    println!("{table}");
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn show_session(catalog: &SessionCatalog, stamp: &SessionStamp, artifact: Artifact) -> Result<()> {
    match artifact {
        Artifact::PerTurn => {
            let turns = catalog.load_turns(stamp)?;
            for record in &turns {
                println!("{}", format_turn(record));
            }
        }
        Artifact::Transcript => {
            for entry in catalog.load_transcript(stamp)? {
                println!("[{}] {}: {}", entry.ts, entry.role, entry.content);
            }
        }
        Artifact::Interims => {
            for entry in catalog.load_transcript_with_interims(stamp)? {
                let marker = if entry.is_interim { " (interim)" } else { "" };
                println!(
                    "[{}] {}{}: {}",
                    entry.entry.ts, entry.entry.role, marker, entry.entry.content
                );
            }
        }
        Artifact::Assessment => {
            let markdown = catalog
                .load_assessment(stamp)?
                .with_context(|| format!("No assessment recorded for session {stamp}"))?;
            println!("{markdown}");
        }
    }
    Ok(())
}

fn format_turn(record: &CoachTurnRecord) -> String {
    let mut lines = vec![
        format!("── Turn {} ({}) ──", record.turn, record.ts),
        format!("Customer:       {}", record.interaction.customer),
        format!("Representative: {}", record.interaction.representative),
    ];

    let coaching = &record.coaching;
    if coaching.get("parsed").is_some_and(|v| v.is_null()) {
        let raw = coaching
            .get("raw_text")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        lines.push(format!("No structured feedback: {raw}"));
        return lines.join("\n");
    }

    if let Some(score) = coaching.get("turn_quality_score") {
        lines.push(format!("Score:          {score}/10"));
    }
    for (key, label) in [
        ("immediate_strengths", "Strengths"),
        ("immediate_concerns", "Concerns"),
    ] {
        if let Some(items) = coaching.get(key).and_then(|v| v.as_array()) {
            for item in items.iter().filter_map(|i| i.as_str()) {
                lines.push(format!("{label:<15} {item}"));
            }
        }
    }
    for (key, label) in [
        ("next_turn_guidance", "Guidance:"),
        ("compliance_check", "Compliance:"),
        ("urgency_level", "Urgency:"),
    ] {
        if let Some(text) = coaching.get(key).and_then(|v| v.as_str()) {
            lines.push(format!("{label:<15} {text}"));
        }
    }
    lines.join("\n")
}
