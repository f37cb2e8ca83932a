//! Trace context for coaching-session attributes.
//!
//! This module provides:
//! - `TraceContext` for carrying session context through spans
//! - `CoachSpanExt` trait for recording context on spans
//! - Standard attribute names for consistent telemetry

/// Standard attribute names for turncoach telemetry.
///
/// These follow the `turncoach.` namespace convention for custom attributes.
pub mod attributes {
    pub const SESSION_STAMP: &str = "turncoach.session_stamp";
    pub const CONVERSATION_ID: &str = "turncoach.conversation_id";
    pub const SCENARIO: &str = "turncoach.scenario";
    pub const PERSONA: &str = "turncoach.persona";
    pub const MODEL_ID: &str = "turncoach.model_id";
    pub const TURN: &str = "turncoach.turn";
    pub const TOKENS_INPUT: &str = "turncoach.tokens.input";
    pub const TOKENS_OUTPUT: &str = "turncoach.tokens.output";
}

/// Trace context carrying session attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub session_stamp: Option<String>,
    pub conversation_id: Option<String>,
    pub scenario: Option<String>,
    pub persona: Option<String>,
    pub model: Option<String>,
}

impl TraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context for a recorded session.
    pub fn for_session(stamp: impl Into<String>, scenario: impl Into<String>) -> Self {
        Self {
            session_stamp: Some(stamp.into()),
            scenario: Some(scenario.into()),
            ..Default::default()
        }
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Record this context on the current span.
    pub fn record_on_span(&self) {
        tracing::Span::current().record_coach_context(self);
    }
}

/// Extension trait for `tracing::Span` to record session context.
///
/// Only fields declared on the span (e.g. as `tracing::field::Empty`) are
/// recorded; others are silently ignored by `tracing`.
pub trait CoachSpanExt {
    fn record_coach_context(&self, ctx: &TraceContext);
}

impl CoachSpanExt for tracing::Span {
    fn record_coach_context(&self, ctx: &TraceContext) {
        if let Some(stamp) = &ctx.session_stamp {
            self.record(attributes::SESSION_STAMP, stamp.as_str());
        }
        if let Some(id) = &ctx.conversation_id {
            self.record(attributes::CONVERSATION_ID, id.as_str());
        }
        if let Some(scenario) = &ctx.scenario {
            self.record(attributes::SCENARIO, scenario.as_str());
        }
        if let Some(persona) = &ctx.persona {
            self.record(attributes::PERSONA, persona.as_str());
        }
        if let Some(model) = &ctx.model {
            self.record(attributes::MODEL_ID, model.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_names_follow_namespace() {
        for name in [
            attributes::SESSION_STAMP,
            attributes::CONVERSATION_ID,
            attributes::SCENARIO,
            attributes::PERSONA,
            attributes::MODEL_ID,
            attributes::TURN,
            attributes::TOKENS_INPUT,
            attributes::TOKENS_OUTPUT,
        ] {
            assert!(name.starts_with("turncoach."), "{name}");
        }
    }

    #[test]
    fn for_session_sets_stamp_and_scenario() {
        let ctx = TraceContext::for_session("14_03_22_01_02_2025", "card");
        assert_eq!(ctx.session_stamp.as_deref(), Some("14_03_22_01_02_2025"));
        assert_eq!(ctx.scenario.as_deref(), Some("card"));
        assert!(ctx.persona.is_none());
    }

    #[test]
    fn builder_pattern() {
        let ctx = TraceContext::new()
            .with_conversation_id("c-1")
            .with_persona("Sarah Chen")
            .with_model("gemini-1.5-flash");

        assert_eq!(ctx.conversation_id.as_deref(), Some("c-1"));
        assert_eq!(ctx.persona.as_deref(), Some("Sarah Chen"));
        assert_eq!(ctx.model.as_deref(), Some("gemini-1.5-flash"));
    }

    #[test]
    fn span_ext_records_declared_fields() {
        let span = tracing::info_span!(
            "coach_session",
            "turncoach.session_stamp" = tracing::field::Empty,
            "turncoach.scenario" = tracing::field::Empty,
        );

        let ctx = TraceContext::for_session("10_00_00_01_01_2025", "transfer").with_persona("Janet");
        span.record_coach_context(&ctx);
    }
}
