//! Versioned prompt catalog
//!
//! Prompts are loaded once from a JSON document and never change
//! afterwards, so one repository can be shared across sessions via `Arc`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::PromptsError;

/// Catalog bundled with the crate
const BUILTIN_PROMPTS: &str = include_str!("../../assets/prompts.json");

/// Maximum length of a scenario brief, in characters
const BRIEF_MAX_CHARS: usize = 200;

/// One catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: String,
    pub name: String,
    /// `coach_agent`, `simulation_customer`, `guardrail`, ...
    pub entity: String,
    pub prompt_version: String,
    pub date_updated: String,
    pub persona: Option<String>,
    pub scenario: Option<String>,
    pub content: Map<String, Value>,
}

impl Prompt {
    /// String field of the content, if present
    pub fn content_str(&self, key: &str) -> Option<&str> {
        self.content.get(key).and_then(Value::as_str)
    }

    /// String items of a list field; missing fields and non-string items are skipped
    pub fn content_list(&self, key: &str) -> Vec<&str> {
        self.content
            .get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// String values of an object field
    pub fn content_map(&self, key: &str) -> HashMap<String, String> {
        self.content
            .get(key)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct RawCatalog {
    #[serde(default)]
    prompts: Vec<RawPrompt>,
}

#[derive(Deserialize)]
struct RawPrompt {
    id: String,
    name: Option<String>,
    entity: Option<String>,
    prompt_version: Option<String>,
    date_updated: Option<String>,
    persona: Option<String>,
    scenario: Option<String>,
    #[serde(default)]
    content: Map<String, Value>,
}

impl From<RawPrompt> for Prompt {
    fn from(raw: RawPrompt) -> Self {
        Self {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            entity: raw.entity.unwrap_or_else(|| "unknown".to_string()),
            prompt_version: raw.prompt_version.unwrap_or_else(|| "1.0.0".to_string()),
            date_updated: raw.date_updated.unwrap_or_default(),
            persona: raw.persona,
            scenario: raw.scenario,
            content: raw.content,
        }
    }
}

/// Filter for [`PromptsRepository::find`]
#[derive(Debug, Clone, Default)]
pub struct PromptQuery {
    entity: Option<String>,
    scenario: Option<String>,
    name_contains: Option<String>,
}

impl PromptQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    /// Case-insensitive substring match on the prompt name
    pub fn name_contains(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into().to_lowercase());
        self
    }

    fn matches(&self, prompt: &Prompt) -> bool {
        self.entity.as_ref().is_none_or(|e| &prompt.entity == e)
            && self
                .scenario
                .as_ref()
                .is_none_or(|s| prompt.scenario.as_ref() == Some(s))
            && self
                .name_contains
                .as_ref()
                .is_none_or(|n| prompt.name.to_lowercase().contains(n.as_str()))
    }
}

/// Display data for a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioInfo {
    pub scenario: String,
    pub persona: String,
    pub name: String,
    /// First sentence of the persona prompt, capped at 200 characters
    pub brief: String,
}

/// Immutable prompt catalog
#[derive(Debug, Clone)]
pub struct PromptsRepository {
    source: Option<PathBuf>,
    prompts: Vec<Prompt>,
}

impl PromptsRepository {
    /// Load a catalog from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PromptsError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| PromptsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut repo = Self::from_json_str(&content)?;
        repo.source = Some(path.to_path_buf());
        info!(path = %path.display(), prompts = repo.len(), "loaded prompt catalog");
        Ok(repo)
    }

    /// Parse a catalog document
    ///
    /// A later entry with an already-seen id replaces the earlier one in place.
    pub fn from_json_str(json: &str) -> Result<Self, PromptsError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let mut prompts: Vec<Prompt> = Vec::with_capacity(raw.prompts.len());
        for prompt in raw.prompts.into_iter().map(Prompt::from) {
            match prompts.iter_mut().find(|p| p.id == prompt.id) {
                Some(existing) => *existing = prompt,
                None => prompts.push(prompt),
            }
        }
        Ok(Self {
            source: None,
            prompts,
        })
    }

    /// The catalog bundled with this crate
    pub fn builtin() -> Result<Self, PromptsError> {
        Self::from_json_str(BUILTIN_PROMPTS)
    }

    /// File the catalog was loaded from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.id == id)
    }

    /// Matching prompts in catalog order
    pub fn find(&self, query: &PromptQuery) -> Vec<&Prompt> {
        self.prompts.iter().filter(|p| query.matches(p)).collect()
    }

    fn first(&self, query: PromptQuery, what: impl FnOnce() -> String) -> Result<&Prompt, PromptsError> {
        self.find(&query)
            .into_iter()
            .next()
            .ok_or_else(|| PromptsError::NotFound(what()))
    }

    /// `system` text of the coach's main system prompt
    pub fn coach_main_system_prompt(&self) -> Result<&str, PromptsError> {
        let prompt = self.first(
            PromptQuery::new()
                .entity("coach_agent")
                .name_contains("Main System Prompt"),
            || "coach main system prompt".to_string(),
        )?;
        Ok(prompt.content_str("system").unwrap_or_default())
    }

    /// Persona prompt for a scenario
    pub fn persona_for_scenario(&self, scenario: &str) -> Result<&Prompt, PromptsError> {
        self.first(
            PromptQuery::new()
                .entity("simulation_customer")
                .scenario(scenario),
            || format!("persona prompt for scenario '{}'", scenario),
        )
    }

    /// `system` text of the persona prompt for a scenario
    pub fn persona_system_prompt_for_scenario(&self, scenario: &str) -> Result<&str, PromptsError> {
        Ok(self
            .persona_for_scenario(scenario)?
            .content_str("system")
            .unwrap_or_default())
    }

    /// Persona display name for a scenario, empty when the entry has none
    pub fn persona_name_for_scenario(&self, scenario: &str) -> Result<&str, PromptsError> {
        Ok(self
            .persona_for_scenario(scenario)?
            .persona
            .as_deref()
            .unwrap_or_default())
    }

    pub fn scenario_info(&self, scenario: &str) -> Result<ScenarioInfo, PromptsError> {
        let prompt = self.persona_for_scenario(scenario)?;
        let system = prompt.content_str("system").unwrap_or_default().trim();
        let first_sentence = system.split(". ").next().unwrap_or_default().trim();
        let brief = match first_sentence.char_indices().nth(BRIEF_MAX_CHARS) {
            Some((idx, _)) => format!("{}…", &first_sentence[..idx]),
            None => first_sentence.to_string(),
        };

        Ok(ScenarioInfo {
            scenario: scenario.to_string(),
            persona: prompt.persona.clone().unwrap_or_default(),
            name: prompt.name.clone(),
            brief,
        })
    }

    /// Scenarios with a persona prompt, in catalog order
    pub fn scenarios(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for prompt in self.find(&PromptQuery::new().entity("simulation_customer")) {
            if let Some(scenario) = prompt.scenario.as_deref()
                && !seen.contains(&scenario)
            {
                seen.push(scenario);
            }
        }
        seen
    }
}
