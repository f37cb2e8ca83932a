//! Per-session evaluation state and results

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use turncoach_models::providers::Usage;

use crate::error::OracleFailure;

/// Evaluation history for one session
///
/// Owned by exactly one session and mutated only by the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationState {
    pub scenario: String,
    pub persona_name: String,
    pub last_customer_message: Option<String>,
    pub last_evaluated_representative_response: Option<String>,
    /// Number of evaluations attempted so far
    pub turn_index: u32,
    pub evaluations: Vec<EvaluationResult>,
}

impl ConversationState {
    pub fn new(scenario: impl Into<String>, persona_name: impl Into<String>) -> Self {
        Self {
            scenario: scenario.into(),
            persona_name: persona_name.into(),
            ..Default::default()
        }
    }

    /// True when this exact pair was the last one evaluated
    pub fn is_duplicate(&self, customer: &str, representative: &str) -> bool {
        self.last_customer_message.as_deref() == Some(customer)
            && self.last_evaluated_representative_response.as_deref() == Some(representative)
    }

    /// Claim the next turn number for this pair
    pub(crate) fn advance(&mut self, customer: &str, representative: &str) -> u32 {
        self.turn_index += 1;
        self.last_customer_message = Some(customer.to_string());
        self.last_evaluated_representative_response = Some(representative.to_string());
        self.turn_index
    }

    /// Mean `turn_quality_score` over evaluations that have one
    pub fn average_score(&self) -> Option<f64> {
        let scores: Vec<f64> = self.evaluations.iter().filter_map(|e| e.score()).collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

/// Outcome of one per-turn evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub turn_number: u32,
    pub customer_message: String,
    pub representative_response: String,
    /// Oracle output, or a short failure description
    pub raw_text: String,
    /// JSON object recovered from `raw_text`
    pub parsed: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub usage: Option<Usage>,
    #[serde(skip)]
    pub(crate) failure: Option<OracleFailure>,
}

impl EvaluationResult {
    /// Why no parsed feedback is available, if so
    pub fn failure(&self) -> Option<&OracleFailure> {
        self.failure.as_ref()
    }

    pub fn is_degraded(&self) -> bool {
        self.parsed.is_none()
    }

    pub fn score(&self) -> Option<f64> {
        self.parsed.as_ref()?.get("turn_quality_score")?.as_f64()
    }

    /// Typed view of the parsed object; missing fields stay empty
    pub fn feedback(&self) -> Option<CoachingFeedback> {
        self.parsed
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Value stored in the per-turn log
    ///
    /// The parsed object when there is one, otherwise a placeholder that
    /// keeps the raw output for audit.
    pub fn coaching_record(&self) -> Value {
        match &self.parsed {
            Some(parsed) => parsed.clone(),
            None => json!({ "parsed": null, "raw_text": self.raw_text }),
        }
    }
}

/// Per-turn coaching fields the coach prompt asks for
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachingFeedback {
    pub turn_quality_score: Option<f64>,
    pub immediate_strengths: Vec<String>,
    pub immediate_concerns: Vec<String>,
    pub next_turn_guidance: Option<String>,
    /// `pass/warning/fail` followed by a short reason
    pub compliance_check: Option<String>,
    pub urgency_level: Option<String>,
}

/// Leading verdict of `compliance_check`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceVerdict {
    Pass,
    Warning,
    Fail,
}

impl CoachingFeedback {
    pub fn compliance(&self) -> Option<ComplianceVerdict> {
        let check = self.compliance_check.as_deref()?.trim_start().to_lowercase();
        if check.starts_with("pass") {
            Some(ComplianceVerdict::Pass)
        } else if check.starts_with("warn") {
            Some(ComplianceVerdict::Warning)
        } else if check.starts_with("fail") {
            Some(ComplianceVerdict::Fail)
        } else {
            None
        }
    }
}
