use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "turncoach", about = "Turn-by-turn coaching for bank representative training calls")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Extra config file, applied over user and project config
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recorded event stream through a full coaching session
    Replay(commands::replay::ReplayArgs),
    /// Inspect recorded sessions
    Sessions(commands::sessions::SessionsArgs),
    /// List available customer scenarios
    Scenarios,
    /// Check a representative message against the persona guardrail
    Guardrail(commands::guardrail::GuardrailArgs),
    /// Manage configuration
    Config(commands::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load(cli.config.as_deref())?;

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.filter = "debug".to_string();
    }
    let _tracing = turncoach_observe::init_tracing(logging)?;

    match cli.command {
        Commands::Replay(args) => commands::replay::run(args, &config).await,
        Commands::Sessions(args) => commands::sessions::run(args, &config),
        Commands::Scenarios => commands::scenarios::run(&config),
        Commands::Guardrail(args) => commands::guardrail::run(args, &config),
        Commands::Config(args) => commands::config::run(args, &config, cli.config.as_deref()),
    }
}
