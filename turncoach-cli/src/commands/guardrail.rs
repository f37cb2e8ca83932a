use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use turncoach_core::{ContextAugmenter, GuardrailService};
use turncoach_models::providers::Message;

use super::load_prompts;
use crate::config::TurncoachConfig;

#[derive(Args, Debug)]
pub struct GuardrailArgs {
    /// Scenario the customer persona is playing
    #[arg(long, default_value = "card")]
    pub scenario: String,

    /// Representative message to check
    pub message: String,
}

pub fn run(args: GuardrailArgs, config: &TurncoachConfig) -> Result<()> {
    let prompts = load_prompts(config)?;
    let service = Arc::new(GuardrailService::from_repository(&prompts));
    println!("Guardrail version: {}", service.version());

    let mut context = vec![Message::user(args.message.as_str())];
    if service.for_scenario(args.scenario.as_str()).augment(&mut context) {
        let reminder = context
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        println!("Off-topic: yes");
        println!("Reminder:  {}", reminder);
    } else {
        println!("Off-topic: no");
    }
    Ok(())
}
