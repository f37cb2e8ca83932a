//! Capability hooks at the transport boundary
//!
//! Both hooks are plain traits composed at construction time. A
//! [`FrameFilter`] decides whether a recorded event continues to the
//! aggregator; a [`ContextAugmenter`] may append messages to a chat context
//! before the persona model sees it.

use turncoach_models::providers::Message;

use crate::transcript::TranscriptEvent;

/// What happens to an event after it has been recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecision {
    /// Continue to aggregation
    Forward,
    /// Keep it in the transcript only
    RecordOnly,
}

/// Decides whether a transcript event reaches the aggregator
pub trait FrameFilter: Send + Sync {
    fn name(&self) -> &str;

    fn admit(&self, event: &TranscriptEvent) -> FrameDecision;
}

/// Stops interim speech-to-text results from reaching aggregation
#[derive(Debug, Clone, Copy, Default)]
pub struct InterimFilter;

impl FrameFilter for InterimFilter {
    fn name(&self) -> &str {
        "interim"
    }

    fn admit(&self, event: &TranscriptEvent) -> FrameDecision {
        if event.is_interim {
            FrameDecision::RecordOnly
        } else {
            FrameDecision::Forward
        }
    }
}

/// Adjusts a chat context before it is sent to a model
pub trait ContextAugmenter: Send + Sync {
    /// Returns true when `messages` was changed
    fn augment(&self, messages: &mut Vec<Message>) -> bool;
}
