//! turncoach-core: turn aggregation and evaluation for coached conversations
//!
//! A human bank representative talks to a simulated customer. This crate
//! turns the raw stream of transcript fragments into coaching output:
//!
//! - **Aggregation** - [`TurnAggregator`] pairs each customer statement with the
//!   representative's (possibly fragmented) reply
//! - **Evaluation** - [`Evaluator`] asks an oracle for per-turn JSON feedback and
//!   an end-of-session markdown assessment, never failing the caller
//! - **Recording** - [`SessionRecorder`] keeps append-only JSON/markdown artifacts
//!   on disk, and [`SessionCatalog`] reads them back
//! - **Orchestration** - [`CoachSession`] wires the three together with an
//!   off-path evaluation worker and a bounded teardown
//!
//! # Architecture
//!
//! ```text
//! transcript event
//!       │
//!       ▼
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────┐
//! │SessionRecorder│──▶│ FrameFilters │──▶│ TurnAggregator │
//! └──────────────┘   └──────────────┘   └───────┬────────┘
//!        ▲                                      │ Turn (mpsc)
//!        │                               ┌──────▼───────┐
//!        └───────── coach turns ─────────│  Evaluator   │──▶ dyn Oracle
//!                                        └──────────────┘
//! ```

pub mod aggregator;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod guardrail;
pub mod hooks;
pub mod prompts;
pub mod recorder;
pub mod session;
pub mod transcript;

pub use aggregator::{Turn, TurnAggregator};
pub use config::{
    CoachConfig, EvaluatorConfig, OracleConfig, PromptsConfig, RecorderConfig, SessionConfig,
};
pub use error::{EventAnomaly, OracleFailure, PromptsError, RecorderError, SessionError, SetupError};
pub use evaluator::{
    ConversationState, EvaluationResult, Evaluator, EvaluatorStatus, OracleFactory,
    ProviderFactory, SharedOracleFactory,
};
pub use guardrail::{GuardrailService, ScenarioGuardrail};
pub use hooks::{ContextAugmenter, FrameDecision, FrameFilter, InterimFilter};
pub use prompts::{Prompt, PromptQuery, PromptsRepository, ScenarioInfo};
pub use recorder::{
    CoachTurnRecord, SessionCatalog, SessionPaths, SessionRecorder, SessionStamp, SessionSummary,
    TranscriptEntry,
};
pub use session::{CoachSession, SessionReport};
pub use transcript::{Role, TranscriptEvent};
