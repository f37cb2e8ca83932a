//! Logging and tracing infrastructure for turncoach.
//!
//! All configuration arrives through [`TracerConfig`] at startup; nothing
//! here reads environment toggles on its own.

pub mod context;
pub mod tracer;

pub use context::{CoachSpanExt, TraceContext};
pub use tracer::{LogFormat, TracerConfig, TracerError, TracingGuard, init_tracing};
