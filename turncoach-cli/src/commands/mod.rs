pub mod config;
pub mod guardrail;
pub mod replay;
pub mod scenarios;
pub mod sessions;

use anyhow::Result;
use tracing::info;
use turncoach_core::PromptsRepository;

use crate::config::TurncoachConfig;

/// Prompt catalog from the configured path, or the bundled one
pub(crate) fn load_prompts(config: &TurncoachConfig) -> Result<PromptsRepository> {
    let path = config.coach.prompts.path();
    if path.exists() {
        return Ok(PromptsRepository::load(&path)?);
    }
    info!(path = %path.display(), "no prompt catalog at path, using bundled prompts");
    Ok(PromptsRepository::builtin()?)
}
