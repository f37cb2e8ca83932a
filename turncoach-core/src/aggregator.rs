//! Turn aggregation
//!
//! Speech-to-text splits one spoken reply into several fragments
//! ("Okay." / "I understand." / "When did you first notice?"). The
//! aggregator collects the representative's fragments until the customer
//! speaks again, then emits one [`Turn`]: the customer statement paired with
//! the whole reply.
//!
//! States: no pending prompt; pending prompt without reply; pending prompt
//! with reply fragments. Only the last state can produce a turn.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::EventAnomaly;
use crate::transcript::Role;

/// A customer statement paired with the representative's complete reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// 1-based position among turns emitted by this aggregator
    pub index: u32,
    pub customer_prompt: String,
    /// Fragments joined with single spaces, whitespace runs collapsed
    pub representative_response: String,
    /// Trimmed fragments in arrival order
    pub representative_fragments: Vec<String>,
}

/// Pairs customer statements with aggregated representative replies
#[derive(Debug, Default)]
pub struct TurnAggregator {
    pending_customer_prompt: Option<String>,
    pending_representative_fragments: Vec<String>,
    completed: Vec<Turn>,
}

impl TurnAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one final transcript fragment
    ///
    /// Returns the completed previous turn when a customer statement arrives
    /// while a prompt with at least one reply fragment is pending.
    pub fn add_message(&mut self, role: &Role, content: &str) -> Option<Turn> {
        let content = content.trim();
        if content.is_empty() {
            debug!(anomaly = %EventAnomaly::EmptyContent, role = %role, "skipping message");
            return None;
        }

        match role {
            Role::Customer => {
                let completed = if self.has_reply() {
                    self.complete_pending()
                } else {
                    if let Some(previous) = &self.pending_customer_prompt {
                        info!(
                            anomaly = %EventAnomaly::SupersededPrompt,
                            previous = %preview(previous, 50),
                            "replacing unanswered customer prompt"
                        );
                    } else {
                        info!(prompt = %preview(content, 50), "customer starting turn");
                    }
                    None
                };
                self.pending_customer_prompt = Some(content.to_string());
                self.pending_representative_fragments.clear();
                completed
            }
            Role::Representative => {
                if self.pending_customer_prompt.is_none() {
                    warn!(
                        anomaly = %EventAnomaly::ReplyWithoutPrompt,
                        fragment = %preview(content, 50),
                        "ignoring representative fragment"
                    );
                    return None;
                }
                self.pending_representative_fragments.push(content.to_string());
                debug!(
                    fragment_no = self.pending_representative_fragments.len(),
                    fragment = %preview(content, 50),
                    "added representative fragment"
                );
                None
            }
            Role::Other(other) => {
                warn!(anomaly = %EventAnomaly::UnknownRole(other.clone()), "dropping message");
                None
            }
        }
    }

    /// Emit the pending turn at end of conversation, if it has a reply
    ///
    /// Produces exactly the turn a subsequent customer statement would have
    /// produced, then clears all pending state.
    pub fn flush_pending(&mut self) -> Option<Turn> {
        if !self.has_reply() {
            return None;
        }
        let turn = self.complete_pending();
        self.pending_customer_prompt = None;
        self.pending_representative_fragments.clear();
        turn
    }

    /// Aggregated pending reply without consuming it
    pub fn pending_representative_response(&self) -> Option<String> {
        if self.pending_representative_fragments.is_empty() {
            return None;
        }
        Some(join_fragments(&self.pending_representative_fragments))
    }

    pub fn pending_customer_prompt(&self) -> Option<&str> {
        self.pending_customer_prompt.as_deref()
    }

    pub fn last_completed_turn(&self) -> Option<&Turn> {
        self.completed.last()
    }

    pub fn completed_turns(&self) -> &[Turn] {
        &self.completed
    }

    pub fn turn_count(&self) -> usize {
        self.completed.len()
    }

    /// Clear all state and start fresh
    pub fn reset(&mut self) {
        self.pending_customer_prompt = None;
        self.pending_representative_fragments.clear();
        self.completed.clear();
        info!("aggregator state reset");
    }

    /// Multi-line description of completed and pending state, for debugging
    pub fn conversation_summary(&self) -> String {
        let mut lines = vec![format!("{} completed turns", self.completed.len())];
        for turn in &self.completed {
            lines.push(format!("  Turn {}:", turn.index));
            lines.push(format!("    Customer: {}", preview(&turn.customer_prompt, 80)));
            lines.push(format!(
                "    Representative: {}",
                preview(&turn.representative_response, 80)
            ));
        }
        if let Some(prompt) = &self.pending_customer_prompt {
            lines.push(format!("  Pending customer prompt: {}", preview(prompt, 80)));
        }
        if !self.pending_representative_fragments.is_empty() {
            lines.push(format!("  Pending fragments: {}", self.pending_representative_fragments.len()));
            for fragment in &self.pending_representative_fragments {
                lines.push(format!("    - {}", preview(fragment, 50)));
            }
        }
        lines.join("\n")
    }

    fn has_reply(&self) -> bool {
        self.pending_customer_prompt.is_some() && !self.pending_representative_fragments.is_empty()
    }

    fn complete_pending(&mut self) -> Option<Turn> {
        let customer_prompt = self.pending_customer_prompt.clone()?;
        let representative_fragments = std::mem::take(&mut self.pending_representative_fragments);
        let turn = Turn {
            index: self.completed.len() as u32 + 1,
            representative_response: join_fragments(&representative_fragments),
            customer_prompt,
            representative_fragments,
        };

        info!(
            turn = turn.index,
            fragments = turn.representative_fragments.len(),
            customer = %preview(&turn.customer_prompt, 100),
            representative = %preview(&turn.representative_response, 100),
            "turn ready for evaluation"
        );
        self.completed.push(turn.clone());
        Some(turn)
    }
}

fn join_fragments(fragments: &[String]) -> String {
    fragments
        .iter()
        .flat_map(|f| f.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate to `max` characters for log output
pub(crate) fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
