//! Session orchestration
//!
//! A [`CoachSession`] owns everything one conversation needs: the
//! aggregator, the recorder, the frame filters and an evaluation worker.
//! Ingestion never waits on the oracle; completed turns are handed to the
//! worker over a channel and evaluated in order.

mod worker;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};
use turncoach_observe::{CoachSpanExt, TraceContext};
use uuid::Uuid;

use crate::aggregator::{Turn, TurnAggregator};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::evaluator::{ConversationState, Evaluator};
use crate::hooks::{FrameDecision, FrameFilter, InterimFilter};
use crate::recorder::{SessionPaths, SessionRecorder, SessionStamp};
use crate::transcript::TranscriptEvent;

use worker::Worker;

/// What a finished session left on disk
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub stamp: SessionStamp,
    pub conversation_id: Uuid,
    pub turns_evaluated: usize,
    pub degraded_turns: usize,
    pub transcript_path: Option<PathBuf>,
    pub assessment_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
    /// The teardown hit `session.finalize_timeout`
    pub timed_out: bool,
}

/// One coached conversation
pub struct CoachSession {
    conversation_id: Uuid,
    scenario: String,
    persona: String,
    config: SessionConfig,
    aggregator: TurnAggregator,
    recorder: Arc<Mutex<SessionRecorder>>,
    paths: SessionPaths,
    stamp: SessionStamp,
    filters: Vec<Arc<dyn FrameFilter>>,
    evaluator: Arc<Evaluator>,
    turns: mpsc::UnboundedSender<Turn>,
    worker: JoinHandle<ConversationState>,
    span: Span,
}

impl CoachSession {
    /// Start a session and its evaluation worker
    ///
    /// Must be called from within a tokio runtime. The evaluator is started
    /// lazily by the worker on the first completed turn. Fails if the
    /// session config does not validate.
    pub fn start(
        recorder: SessionRecorder,
        evaluator: Arc<Evaluator>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let conversation_id = Uuid::new_v4();
        let scenario = recorder.scenario().to_string();
        let persona = evaluator
            .prompts()
            .persona_name_for_scenario(&scenario)
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or("Customer")
            .to_string();
        let stamp = *recorder.stamp();
        let paths = recorder.paths().clone();

        let span = info_span!(
            "coach_session",
            "turncoach.session_stamp" = tracing::field::Empty,
            "turncoach.conversation_id" = tracing::field::Empty,
            "turncoach.scenario" = tracing::field::Empty,
            "turncoach.persona" = tracing::field::Empty,
        );
        span.record_coach_context(
            &TraceContext::for_session(stamp.to_string(), scenario.as_str())
                .with_conversation_id(conversation_id.to_string())
                .with_persona(persona.as_str()),
        );

        let recorder = Arc::new(Mutex::new(recorder));
        let (turns, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            evaluator: Arc::clone(&evaluator),
            recorder: Arc::clone(&recorder),
            state: ConversationState::new(scenario.as_str(), persona.as_str()),
            record_degraded: config.record_degraded_evaluations,
        };
        let worker = tokio::spawn(worker.run(rx).instrument(span.clone()));

        span.in_scope(|| info!("coaching session started"));

        Ok(Self {
            conversation_id,
            scenario,
            persona,
            config,
            aggregator: TurnAggregator::new(),
            recorder,
            paths,
            stamp,
            filters: vec![Arc::new(InterimFilter)],
            evaluator,
            turns,
            worker,
            span,
        })
    }

    /// Add a frame filter after the default interim filter
    pub fn with_filter(mut self, filter: Arc<dyn FrameFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn stamp(&self) -> &SessionStamp {
        &self.stamp
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    pub fn aggregator(&self) -> &TurnAggregator {
        &self.aggregator
    }

    /// Feed one transcript event
    ///
    /// The event is recorded first; if that fails the error is returned and
    /// the event is not aggregated. Returns the turn handed to the worker,
    /// if this event completed one.
    pub async fn ingest(&mut self, event: TranscriptEvent) -> Result<Option<Turn>, SessionError> {
        let span = self.span.clone();
        self.ingest_in_span(event).instrument(span).await
    }

    async fn ingest_in_span(&mut self, event: TranscriptEvent) -> Result<Option<Turn>, SessionError> {
        self.recorder
            .lock()
            .await
            .append_transcript(&event.role, &event.text, event.is_interim)?;

        if let Some(filter) = self
            .filters
            .iter()
            .find(|f| f.admit(&event) == FrameDecision::RecordOnly)
        {
            debug!(filter = filter.name(), role = %event.role, "event recorded only");
            return Ok(None);
        }

        let Some(turn) = self.aggregator.add_message(&event.role, &event.text) else {
            return Ok(None);
        };
        self.dispatch(turn.clone());
        Ok(Some(turn))
    }

    fn dispatch(&self, turn: Turn) {
        let index = turn.index;
        if self.turns.send(turn).is_err() {
            warn!(turn = index, "evaluation worker is gone, turn dropped");
        }
    }

    /// Tear the session down
    ///
    /// Flushes the pending turn, snapshots the transcript, waits for the
    /// worker, writes the assessment and (if configured) the summary,
    /// then stops the evaluator. Each step logs and continues on failure;
    /// the whole sequence is bounded by `session.finalize_timeout`.
    pub async fn finalize(mut self) -> SessionReport {
        let span = self.span.clone();
        async move {
            if let Some(turn) = self.aggregator.flush_pending() {
                info!(turn = turn.index, "flushed final turn");
                self.dispatch(turn);
            }

            let CoachSession {
                conversation_id,
                scenario,
                persona,
                config,
                recorder,
                stamp,
                evaluator,
                turns,
                worker,
                ..
            } = self;
            drop(turns);

            let mut report = SessionReport {
                stamp,
                conversation_id,
                turns_evaluated: 0,
                degraded_turns: 0,
                transcript_path: None,
                assessment_path: None,
                summary_path: None,
                timed_out: false,
            };

            let abort = worker.abort_handle();
            let limit = config.finalize_timeout();
            let teardown = Teardown {
                recorder,
                evaluator: Arc::clone(&evaluator),
                write_summary: config.write_summary,
                fallback_state: ConversationState::new(scenario, persona),
            };
            if tokio::time::timeout(limit, teardown.run(worker, &mut report))
                .await
                .is_err()
            {
                error!(limit = ?limit, "session teardown timed out");
                abort.abort();
                report.timed_out = true;
            }

            evaluator.stop().await;
            info!(
                turns = report.turns_evaluated,
                degraded = report.degraded_turns,
                timed_out = report.timed_out,
                "coaching session finished"
            );
            report
        }
        .instrument(span)
        .await
    }
}

struct Teardown {
    recorder: Arc<Mutex<SessionRecorder>>,
    evaluator: Arc<Evaluator>,
    write_summary: bool,
    fallback_state: ConversationState,
}

impl Teardown {
    async fn run(self, worker: JoinHandle<ConversationState>, report: &mut SessionReport) {
        let transcript = {
            let recorder = self.recorder.lock().await;
            match recorder.snapshot_transcript() {
                Ok(path) => report.transcript_path = Some(path),
                Err(e) => error!(error = %e, "failed to snapshot transcript"),
            }
            recorder.transcript_for_assessment().to_vec()
        };

        let state = match worker.await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "evaluation worker failed");
                self.fallback_state
            }
        };
        report.turns_evaluated = state.evaluations.len();
        report.degraded_turns = state.evaluations.iter().filter(|e| e.is_degraded()).count();

        if transcript.is_empty() {
            info!("empty transcript, skipping assessment");
        } else {
            let markdown = self
                .evaluator
                .generate_session_assessment(&state, &transcript)
                .await;
            match self.recorder.lock().await.write_session_eval(&markdown) {
                Ok(path) => report.assessment_path = Some(path),
                Err(e) => error!(error = %e, "failed to write session assessment"),
            }
        }

        if self.write_summary
            && let Some(summary) = self.evaluator.summarize_conversation(&state).await
        {
            match self.recorder.lock().await.write_summary(&summary) {
                Ok(path) => report.summary_path = Some(path),
                Err(e) => error!(error = %e, "failed to write conversation summary"),
            }
        }
    }
}
