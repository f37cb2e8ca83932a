//! Coach evaluation
//!
//! The [`Evaluator`] owns the oracle connection and turns each aggregated
//! [`Turn`](crate::Turn) into an [`EvaluationResult`]. Every oracle call is
//! bounded by a timeout, and no oracle failure ever escapes as an error:
//! timeouts, safety blocks, transport errors and unparseable output all
//! surface as degraded results (`parsed == None`).
//!
//! Lifecycle: `Uninitialized -> Ready -> Stopped`. Only [`Evaluator::start`]
//! enters `Ready`.

mod extract;
mod factory;
mod prompt;
mod state;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};
use turncoach_models::providers::{
    GenerateRequest, GenerateResponse, Oracle, ResponseFormat, SafetyPolicy,
};

pub use extract::extract_json_object;
pub use factory::{OracleFactory, ProviderFactory, SharedOracleFactory};
pub use prompt::{build_assessment_prompt, build_summary_prompt, build_turn_prompt};
pub use state::{CoachingFeedback, ComplianceVerdict, ConversationState, EvaluationResult};

use crate::config::EvaluatorConfig;
use crate::error::{OracleFailure, SetupError};
use crate::prompts::PromptsRepository;
use crate::recorder::TranscriptEntry;

const TIMEOUT_SENTINEL: &str = "Timeout";
const SAFETY_SENTINEL: &str = "Response blocked by safety filters";
const NOT_STARTED: &str = "evaluator not started";
const ASSESSMENT_HEADER: &str = "# Session Assessment\n\n";

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorStatus {
    Uninitialized,
    Ready,
    Stopped,
}

impl fmt::Display for EvaluatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluatorStatus::Uninitialized => write!(f, "uninitialized"),
            EvaluatorStatus::Ready => write!(f, "ready"),
            EvaluatorStatus::Stopped => write!(f, "stopped"),
        }
    }
}

enum Phase {
    Uninitialized,
    Ready(Arc<dyn Oracle>),
    Stopped,
}

impl Phase {
    fn status(&self) -> EvaluatorStatus {
        match self {
            Phase::Uninitialized => EvaluatorStatus::Uninitialized,
            Phase::Ready(_) => EvaluatorStatus::Ready,
            Phase::Stopped => EvaluatorStatus::Stopped,
        }
    }
}

/// Per-turn and end-of-session coach
///
/// Holds no per-session data: callers pass their own [`ConversationState`].
/// A [`CoachSession`](crate::CoachSession) stops its evaluator when it
/// finalizes, so each session needs an evaluator of its own.
pub struct Evaluator {
    config: EvaluatorConfig,
    prompts: Arc<PromptsRepository>,
    factory: Arc<dyn OracleFactory>,
    phase: RwLock<Phase>,
}

impl Evaluator {
    pub fn new(
        config: EvaluatorConfig,
        prompts: Arc<PromptsRepository>,
        factory: Arc<dyn OracleFactory>,
    ) -> Self {
        Self {
            config,
            prompts,
            factory,
            phase: RwLock::new(Phase::Uninitialized),
        }
    }

    pub fn prompts(&self) -> &PromptsRepository {
        &self.prompts
    }

    pub async fn status(&self) -> EvaluatorStatus {
        self.phase.read().await.status()
    }

    /// Create the oracle client and enter `Ready`
    ///
    /// Rejects invalid timeouts. On failure the state is left unchanged.
    pub async fn start(&self) -> Result<(), SetupError> {
        self.config.validate()?;
        let mut phase = self.phase.write().await;
        let oracle = self.factory.create()?;
        info!(provider = oracle.name(), model = oracle.model(), "evaluator ready");
        *phase = Phase::Ready(oracle);
        Ok(())
    }

    /// Start unless already `Ready`
    pub async fn ensure_started(&self) -> Result<(), SetupError> {
        if matches!(*self.phase.read().await, Phase::Ready(_)) {
            return Ok(());
        }
        let mut phase = self.phase.write().await;
        if matches!(*phase, Phase::Ready(_)) {
            return Ok(());
        }
        self.config.validate()?;
        let oracle = self.factory.create()?;
        info!(provider = oracle.name(), model = oracle.model(), "evaluator ready");
        *phase = Phase::Ready(oracle);
        Ok(())
    }

    /// Release the oracle; safe to call in any state
    pub async fn stop(&self) {
        let mut phase = self.phase.write().await;
        if matches!(*phase, Phase::Ready(_)) {
            info!("evaluator stopped");
        }
        *phase = Phase::Stopped;
    }

    async fn oracle(&self) -> Option<Arc<dyn Oracle>> {
        match &*self.phase.read().await {
            Phase::Ready(oracle) => Some(Arc::clone(oracle)),
            _ => None,
        }
    }

    fn request(&self, prompt: String, temperature: f32, max_output_tokens: u32) -> GenerateRequest {
        let safety = if self.config.relax_safety {
            SafetyPolicy::Relaxed
        } else {
            SafetyPolicy::Default
        };
        GenerateRequest::new(prompt)
            .temperature(temperature)
            .max_output_tokens(max_output_tokens)
            .safety(safety)
    }

    /// One bounded oracle call, with every failure folded into [`OracleFailure`]
    async fn call(
        &self,
        request: GenerateRequest,
        limit: Duration,
    ) -> Result<GenerateResponse, OracleFailure> {
        let oracle = self
            .oracle()
            .await
            .ok_or_else(|| OracleFailure::Transport(NOT_STARTED.to_string()))?;

        let response = match tokio::time::timeout(limit, oracle.generate(request)).await {
            Err(_) => return Err(OracleFailure::Timeout),
            Ok(Err(e)) => return Err(OracleFailure::Transport(e.to_string())),
            Ok(Ok(response)) => response,
        };

        if let Some(block) = &response.safety_block {
            warn!(reason = %block.reason, "oracle response blocked by safety filters");
            return Err(OracleFailure::SafetyBlock);
        }
        if let Some(usage) = &response.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                total_tokens = usage.total_tokens,
                "oracle token usage"
            );
        }
        Ok(response)
    }

    /// Evaluate one customer/representative pair
    ///
    /// Returns `None` only when the pair repeats the last evaluated one.
    /// Otherwise a result is always produced and appended to
    /// `state.evaluations`, degraded when the oracle did not deliver.
    #[instrument(
        name = "evaluator::evaluate_turn",
        skip(self, state, customer, representative),
        fields(scenario = %state.scenario, persona = %state.persona_name)
    )]
    pub async fn evaluate_turn(
        &self,
        state: &mut ConversationState,
        customer: &str,
        representative: &str,
    ) -> Option<EvaluationResult> {
        if state.is_duplicate(customer, representative) {
            debug!("skipping duplicate turn");
            return None;
        }

        let turn_number = state.advance(customer, representative);
        info!(turn = turn_number, "evaluating turn");

        let prompt = build_turn_prompt(&self.prompts, state, turn_number, customer, representative);
        let request = self
            .request(
                prompt,
                self.config.turn_temperature,
                self.config.turn_max_output_tokens,
            )
            .response_format(ResponseFormat::Json);

        let (raw_text, parsed, usage, failure) =
            match self.call(request, self.config.turn_timeout()).await {
                Ok(response) => {
                    let parsed = extract_json_object(&response.text);
                    let failure = parsed.is_none().then_some(OracleFailure::MalformedOutput);
                    (response.text, parsed, response.usage, failure)
                }
                Err(failure) => {
                    let raw = match &failure {
                        OracleFailure::Timeout => TIMEOUT_SENTINEL.to_string(),
                        OracleFailure::SafetyBlock => SAFETY_SENTINEL.to_string(),
                        OracleFailure::Transport(msg) => msg.clone(),
                        OracleFailure::MalformedOutput => failure.to_string(),
                    };
                    (raw, None, None, Some(failure))
                }
            };

        match (&parsed, &failure) {
            (Some(value), _) => info!(
                turn = turn_number,
                score = ?value.get("turn_quality_score"),
                "turn evaluated"
            ),
            (None, Some(OracleFailure::MalformedOutput)) => {
                warn!(turn = turn_number, "no JSON object in coach response")
            }
            (None, Some(failure)) => error!(turn = turn_number, %failure, "turn evaluation failed"),
            (None, None) => {}
        }

        let result = EvaluationResult {
            turn_number,
            customer_message: customer.to_string(),
            representative_response: representative.to_string(),
            raw_text,
            parsed,
            usage,
            failure,
        };
        state.evaluations.push(result.clone());
        Some(result)
    }

    /// Markdown assessment of a whole session
    ///
    /// Never fails: each failure mode yields its own labelled fallback
    /// document.
    #[instrument(
        name = "evaluator::session_assessment",
        skip(self, state, transcript),
        fields(scenario = %state.scenario, entries = transcript.len())
    )]
    pub async fn generate_session_assessment(
        &self,
        state: &ConversationState,
        transcript: &[TranscriptEntry],
    ) -> String {
        if transcript.is_empty() {
            return format!("{ASSESSMENT_HEADER}No transcript available for assessment.");
        }

        let prompt = match build_assessment_prompt(&self.prompts, state, transcript) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!(error = %e, "session assessment prompt not found");
                return format!("{ASSESSMENT_HEADER}Assessment configuration not found.");
            }
        };
        let request = self.request(
            prompt,
            self.config.assessment_temperature,
            self.config.assessment_max_output_tokens,
        );

        match self.call(request, self.config.assessment_timeout()).await {
            Ok(response) if response.text.trim().is_empty() => {
                warn!("session assessment came back empty");
                format!("{ASSESSMENT_HEADER}Assessment generation failed - no response received.")
            }
            Ok(response) => {
                info!(chars = response.text.len(), "generated session assessment");
                response.text
            }
            Err(OracleFailure::Timeout) => {
                error!("session assessment timed out");
                format!("{ASSESSMENT_HEADER}Assessment generation timed out.")
            }
            Err(failure) => {
                error!(%failure, "session assessment failed");
                format!("{ASSESSMENT_HEADER}Assessment generation failed: {failure}")
            }
        }
    }

    /// Structured JSON summary over the evaluated turns
    ///
    /// `None` when nothing was evaluated or the oracle did not deliver a
    /// JSON object.
    #[instrument(
        name = "evaluator::summarize",
        skip(self, state),
        fields(scenario = %state.scenario, turns = state.evaluations.len())
    )]
    pub async fn summarize_conversation(&self, state: &ConversationState) -> Option<Value> {
        if state.evaluations.is_empty() {
            return None;
        }

        let request = self
            .request(
                build_summary_prompt(&self.prompts, state),
                self.config.summary_temperature,
                self.config.summary_max_output_tokens,
            )
            .response_format(ResponseFormat::Json);

        match self.call(request, self.config.summary_timeout()).await {
            Ok(response) => {
                let parsed = extract_json_object(&response.text);
                if parsed.is_none() {
                    warn!("no JSON object in summary response");
                } else {
                    info!("generated conversation summary");
                }
                parsed
            }
            Err(failure) => {
                error!(%failure, "conversation summary failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use turncoach_models::providers::{ScriptedOracle, Usage};

    use super::*;

    const GOOD_REPLY: &str = r#"{"turn_quality_score": 8, "immediate_strengths": ["acknowledged urgency"], "immediate_concerns": [], "next_turn_guidance": "verify identity", "compliance_check": "pass - no issues", "urgency_level": "high"}"#;

    fn evaluator_with(oracle: Arc<ScriptedOracle>) -> Evaluator {
        Evaluator::new(
            EvaluatorConfig::default(),
            Arc::new(PromptsRepository::builtin().unwrap()),
            Arc::new(SharedOracleFactory::new(oracle)),
        )
    }

    async fn ready(oracle: Arc<ScriptedOracle>) -> Evaluator {
        let evaluator = evaluator_with(oracle);
        evaluator.start().await.unwrap();
        evaluator
    }

    fn state() -> ConversationState {
        ConversationState::new("card", "Sarah Chen")
    }

    fn entry(role: &str, content: &str) -> TranscriptEntry {
        TranscriptEntry {
            ts_ms: 0,
            ts: "09:15:00 03-04-2025".into(),
            role: role.into(),
            content: content.into(),
        }
    }

    struct CountingFactory {
        oracle: Arc<ScriptedOracle>,
        created: AtomicUsize,
    }

    impl OracleFactory for CountingFactory {
        fn create(&self) -> Result<Arc<dyn Oracle>, SetupError> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(self.oracle.clone() as Arc<dyn Oracle>)
        }
    }

    struct FailingFactory;

    impl OracleFactory for FailingFactory {
        fn create(&self) -> Result<Arc<dyn Oracle>, SetupError> {
            Err(SetupError::MissingCredentials("google".into()))
        }
    }

    #[tokio::test]
    async fn parsed_evaluation_uses_turn_parameters() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_response(GenerateResponse::text(GOOD_REPLY).with_usage(Usage::new(900, 60)));
        let evaluator = ready(oracle.clone()).await;
        let mut state = state();

        let result = evaluator
            .evaluate_turn(&mut state, "My card is gone!", "I can freeze it right now.")
            .await
            .unwrap();

        assert_eq!(result.turn_number, 1);
        assert_eq!(result.score(), Some(8.0));
        assert!(result.failure().is_none());
        assert_eq!(result.usage.as_ref().map(|u| u.total_tokens), Some(960));
        assert_eq!(state.evaluations.len(), 1);

        let requests = oracle.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].temperature, Some(0.3));
        assert_eq!(requests[0].max_output_tokens, Some(500));
        assert_eq!(requests[0].response_format, ResponseFormat::Json);
        assert_eq!(requests[0].safety, SafetyPolicy::Relaxed);
        assert!(requests[0].prompt.contains("I can freeze it right now."));
    }

    #[tokio::test]
    async fn duplicate_pair_is_skipped_without_calling_oracle() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_text(GOOD_REPLY);
        let evaluator = ready(oracle.clone()).await;
        let mut state = state();

        assert!(evaluator.evaluate_turn(&mut state, "a", "b").await.is_some());
        assert!(evaluator.evaluate_turn(&mut state, "a", "b").await.is_none());

        assert_eq!(oracle.requests().len(), 1);
        assert_eq!(state.turn_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_sentinel() {
        let oracle = Arc::new(ScriptedOracle::new().with_delay(Duration::from_secs(30)));
        oracle.queue_text(GOOD_REPLY);
        let evaluator = ready(oracle).await;
        let mut state = state();

        let result = evaluator.evaluate_turn(&mut state, "a", "b").await.unwrap();

        assert_eq!(result.raw_text, "Timeout");
        assert!(result.parsed.is_none());
        assert_eq!(result.failure(), Some(&OracleFailure::Timeout));
    }

    #[tokio::test]
    async fn safety_block_yields_sentinel() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_blocked();
        let evaluator = ready(oracle).await;
        let mut state = state();

        let result = evaluator.evaluate_turn(&mut state, "a", "b").await.unwrap();

        assert_eq!(result.raw_text, "Response blocked by safety filters");
        assert!(result.parsed.is_none());
        assert_eq!(result.failure(), Some(&OracleFailure::SafetyBlock));
    }

    #[tokio::test]
    async fn transport_error_keeps_description() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_error("connection reset");
        let evaluator = ready(oracle).await;
        let mut state = state();

        let result = evaluator.evaluate_turn(&mut state, "a", "b").await.unwrap();

        assert!(result.raw_text.contains("connection reset"));
        assert!(result.is_degraded());
        assert!(matches!(result.failure(), Some(OracleFailure::Transport(_))));
    }

    #[tokio::test]
    async fn malformed_output_keeps_raw_text_verbatim() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_text("The representative did fine overall.");
        let evaluator = ready(oracle).await;
        let mut state = state();

        let result = evaluator.evaluate_turn(&mut state, "a", "b").await.unwrap();

        assert_eq!(result.raw_text, "The representative did fine overall.");
        assert!(result.parsed.is_none());
        assert_eq!(result.failure(), Some(&OracleFailure::MalformedOutput));
        assert_eq!(
            result.coaching_record(),
            json!({"parsed": null, "raw_text": "The representative did fine overall."})
        );
    }

    #[tokio::test]
    async fn chatty_output_is_still_parsed() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_text(format!("Sure! Here is the JSON: {GOOD_REPLY} Thanks."));
        let evaluator = ready(oracle).await;
        let mut state = state();

        let result = evaluator.evaluate_turn(&mut state, "a", "b").await.unwrap();
        assert_eq!(result.score(), Some(8.0));
    }

    #[tokio::test]
    async fn evaluation_before_start_is_degraded() {
        let oracle = Arc::new(ScriptedOracle::new());
        let evaluator = evaluator_with(oracle.clone());
        let mut state = state();

        let result = evaluator.evaluate_turn(&mut state, "a", "b").await.unwrap();

        assert_eq!(result.raw_text, "evaluator not started");
        assert!(result.is_degraded());
        assert!(oracle.requests().is_empty());
    }

    #[tokio::test]
    async fn ensure_started_is_idempotent() {
        let factory = Arc::new(CountingFactory {
            oracle: Arc::new(ScriptedOracle::new()),
            created: AtomicUsize::new(0),
        });
        let evaluator = Evaluator::new(
            EvaluatorConfig::default(),
            Arc::new(PromptsRepository::builtin().unwrap()),
            factory.clone(),
        );

        assert_eq!(evaluator.status().await, EvaluatorStatus::Uninitialized);
        evaluator.ensure_started().await.unwrap();
        evaluator.ensure_started().await.unwrap();

        assert_eq!(factory.created.load(Ordering::SeqCst), 1);
        assert_eq!(evaluator.status().await, EvaluatorStatus::Ready);
    }

    #[tokio::test]
    async fn failed_start_leaves_state_unchanged() {
        let evaluator = Evaluator::new(
            EvaluatorConfig::default(),
            Arc::new(PromptsRepository::builtin().unwrap()),
            Arc::new(FailingFactory),
        );

        let err = evaluator.start().await.unwrap_err();
        assert!(matches!(err, SetupError::MissingCredentials(_)));
        assert_eq!(evaluator.status().await, EvaluatorStatus::Uninitialized);
    }

    #[tokio::test]
    async fn invalid_timeout_fails_start() {
        let evaluator = Evaluator::new(
            EvaluatorConfig {
                turn_timeout_secs: f64::NAN,
                ..EvaluatorConfig::default()
            },
            Arc::new(PromptsRepository::builtin().unwrap()),
            Arc::new(SharedOracleFactory::new(Arc::new(ScriptedOracle::new()))),
        );

        assert!(matches!(evaluator.start().await, Err(SetupError::InvalidConfig(_))));
        assert!(matches!(
            evaluator.ensure_started().await,
            Err(SetupError::InvalidConfig(_))
        ));
        assert_eq!(evaluator.status().await, EvaluatorStatus::Uninitialized);
    }

    #[tokio::test]
    async fn stop_is_safe_in_any_state() {
        let evaluator = evaluator_with(Arc::new(ScriptedOracle::new()));

        evaluator.stop().await;
        evaluator.stop().await;
        assert_eq!(evaluator.status().await, EvaluatorStatus::Stopped);

        evaluator.start().await.unwrap();
        evaluator.stop().await;
        assert_eq!(evaluator.status().await, EvaluatorStatus::Stopped);
    }

    #[tokio::test]
    async fn assessment_without_transcript() {
        let evaluator = ready(Arc::new(ScriptedOracle::new())).await;
        let md = evaluator.generate_session_assessment(&state(), &[]).await;
        assert_eq!(md, "# Session Assessment\n\nNo transcript available for assessment.");
    }

    #[tokio::test]
    async fn assessment_without_template() {
        let evaluator = Evaluator::new(
            EvaluatorConfig::default(),
            Arc::new(PromptsRepository::from_json_str(r#"{"prompts": []}"#).unwrap()),
            Arc::new(SharedOracleFactory::new(Arc::new(ScriptedOracle::new()))),
        );
        evaluator.start().await.unwrap();

        let md = evaluator
            .generate_session_assessment(&state(), &[entry("customer", "hello")])
            .await;
        assert_eq!(md, "# Session Assessment\n\nAssessment configuration not found.");
    }

    #[tokio::test(start_paused = true)]
    async fn assessment_timeout_is_labelled() {
        let oracle = Arc::new(ScriptedOracle::new().with_delay(Duration::from_secs(60)));
        oracle.queue_text("# Report");
        let evaluator = ready(oracle).await;

        let md = evaluator
            .generate_session_assessment(&state(), &[entry("customer", "hello")])
            .await;
        assert_eq!(md, "# Session Assessment\n\nAssessment generation timed out.");
    }

    #[tokio::test]
    async fn assessment_failures_are_distinguishable() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_text("   ");
        oracle.queue_blocked();
        oracle.queue_error("boom");
        let evaluator = ready(oracle).await;
        let transcript = [entry("customer", "hello")];

        let empty = evaluator.generate_session_assessment(&state(), &transcript).await;
        let blocked = evaluator.generate_session_assessment(&state(), &transcript).await;
        let failed = evaluator.generate_session_assessment(&state(), &transcript).await;

        assert!(empty.ends_with("Assessment generation failed - no response received."));
        assert_eq!(
            blocked,
            "# Session Assessment\n\nAssessment generation failed: response blocked by safety filters"
        );
        assert!(failed.starts_with("# Session Assessment\n\nAssessment generation failed: "));
        assert!(failed.contains("boom"));
    }

    #[tokio::test]
    async fn assessment_returns_oracle_markdown() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_text("# Session Assessment\n\nOverall: 7/10");
        let evaluator = ready(oracle.clone()).await;

        let md = evaluator
            .generate_session_assessment(
                &state(),
                &[entry("customer", "hello"), entry("representative", "hi")],
            )
            .await;

        assert_eq!(md, "# Session Assessment\n\nOverall: 7/10");
        let request = &oracle.requests()[0];
        assert_eq!(request.temperature, Some(0.4));
        assert_eq!(request.max_output_tokens, Some(1500));
        assert_eq!(request.response_format, ResponseFormat::Text);
    }

    #[tokio::test]
    async fn summary_requires_evaluations() {
        let oracle = Arc::new(ScriptedOracle::new());
        let evaluator = ready(oracle.clone()).await;

        assert!(evaluator.summarize_conversation(&state()).await.is_none());
        assert!(oracle.requests().is_empty());
    }

    #[tokio::test]
    async fn summary_is_parsed() {
        let oracle = Arc::new(ScriptedOracle::new());
        oracle.queue_text(GOOD_REPLY);
        oracle.queue_text(r#"{"overall_performance_score": 7, "key_strengths": ["calm"]}"#);
        let evaluator = ready(oracle.clone()).await;
        let mut state = state();
        evaluator.evaluate_turn(&mut state, "Help!", "Sure.").await;

        let summary = evaluator.summarize_conversation(&state).await.unwrap();

        assert_eq!(summary["overall_performance_score"], 7);
        let prompt = &oracle.requests()[1].prompt;
        assert!(prompt.contains("Turn 1 - Customer: Help!"));
        assert!(prompt.contains("Turn 1 - Representative: Sure."));
    }
}
