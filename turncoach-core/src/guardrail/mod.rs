//! Persona guardrails
//!
//! Detects representative messages that try to pull the simulated customer
//! out of character and supplies a scenario-specific system reminder.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};
use turncoach_models::providers::{Message, Role};

use crate::aggregator::preview;
use crate::hooks::ContextAugmenter;
use crate::prompts::{PromptQuery, PromptsRepository};

const DEFAULT_REMINDER: &str =
    "Stay in character! You're in a crisis and need help with your banking issue NOW!";

/// Off-topic patterns loaded from the `guardrail` catalog entry
#[derive(Debug, Clone, Default)]
pub struct GuardrailService {
    off_topic_patterns: Vec<String>,
    banking_keywords: Vec<String>,
    reminders: HashMap<String, String>,
    version: String,
}

impl GuardrailService {
    /// Build from the first `guardrail` entry; an absent entry yields a service that flags nothing
    pub fn from_repository(repo: &PromptsRepository) -> Self {
        let Some(prompt) = repo
            .find(&PromptQuery::new().entity("guardrail"))
            .into_iter()
            .next()
        else {
            warn!("no guardrail patterns in prompt catalog");
            return Self {
                version: "unknown".to_string(),
                ..Default::default()
            };
        };

        let lowered = |key: &str| -> Vec<String> {
            prompt
                .content_list(key)
                .into_iter()
                .map(str::to_lowercase)
                .collect()
        };
        let service = Self {
            off_topic_patterns: lowered("off_topic_patterns"),
            banking_keywords: lowered("banking_context"),
            reminders: prompt.content_map("system_reminders"),
            version: prompt.prompt_version.clone(),
        };

        info!(
            version = %service.version,
            patterns = service.off_topic_patterns.len(),
            keywords = service.banking_keywords.len(),
            "loaded guardrail patterns"
        );
        service
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Reminder to inject when `message` is off-topic, otherwise `None`
    ///
    /// A message is off-topic when it contains an off-topic pattern and no
    /// banking keyword. Matching is case-insensitive substring matching.
    pub fn check_off_topic(&self, message: &str, scenario: &str) -> Option<String> {
        if message.is_empty() {
            return None;
        }
        let lowered = message.to_lowercase();
        let has_banking_context = self
            .banking_keywords
            .iter()
            .any(|k| lowered.contains(k.as_str()));
        let off_topic = !has_banking_context
            && self
                .off_topic_patterns
                .iter()
                .any(|p| lowered.contains(p.as_str()));

        off_topic.then(|| {
            self.reminders
                .get(scenario)
                .cloned()
                .unwrap_or_else(|| DEFAULT_REMINDER.to_string())
        })
    }

    /// Bind to a scenario as a [`ContextAugmenter`]
    pub fn for_scenario(self: &Arc<Self>, scenario: impl Into<String>) -> ScenarioGuardrail {
        ScenarioGuardrail {
            service: Arc::clone(self),
            scenario: scenario.into(),
        }
    }
}

/// Guardrail bound to one scenario
///
/// In the persona model's context the representative is the `user`.
#[derive(Debug, Clone)]
pub struct ScenarioGuardrail {
    service: Arc<GuardrailService>,
    scenario: String,
}

impl ContextAugmenter for ScenarioGuardrail {
    fn augment(&self, messages: &mut Vec<Message>) -> bool {
        let Some(last_user) = messages.iter().rev().find(|m| m.role == Role::User) else {
            return false;
        };
        let Some(reminder) = self.service.check_off_topic(&last_user.content, &self.scenario)
        else {
            return false;
        };

        info!(
            scenario = %self.scenario,
            message = %preview(&last_user.content, 60),
            "off-topic message, injecting reminder"
        );
        messages.push(Message::system(reminder));
        true
    }
}
