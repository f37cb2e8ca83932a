//! Off-path evaluation worker

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, warn};

use crate::aggregator::Turn;
use crate::evaluator::{ConversationState, Evaluator};
use crate::recorder::SessionRecorder;

pub(super) struct Worker {
    pub evaluator: Arc<Evaluator>,
    pub recorder: Arc<Mutex<SessionRecorder>>,
    pub state: ConversationState,
    pub record_degraded: bool,
}

impl Worker {
    /// Evaluate turns in arrival order until every sender is gone
    pub(super) async fn run(mut self, mut turns: mpsc::UnboundedReceiver<Turn>) -> ConversationState {
        while let Some(turn) = turns.recv().await {
            self.handle(turn).await;
        }
        debug!(evaluated = self.state.evaluations.len(), "evaluation worker drained");
        self.state
    }

    async fn handle(&mut self, turn: Turn) {
        if let Err(e) = self.evaluator.ensure_started().await {
            warn!(error = %e, turn = turn.index, "evaluator unavailable");
        }

        let Some(result) = self
            .evaluator
            .evaluate_turn(
                &mut self.state,
                &turn.customer_prompt,
                &turn.representative_response,
            )
            .await
        else {
            return;
        };

        if result.is_degraded() && !self.record_degraded {
            debug!(turn = result.turn_number, "not recording degraded evaluation");
            return;
        }

        let mut recorder = self.recorder.lock().await;
        if let Err(e) = recorder.append_coach_turn(
            result.turn_number,
            &result.customer_message,
            &result.representative_response,
            result.coaching_record(),
        ) {
            error!(error = %e, turn = result.turn_number, "failed to record coach turn");
        }
    }
}
