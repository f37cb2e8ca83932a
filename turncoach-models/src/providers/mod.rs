//! The oracle trait and its implementations.
//!
//! An [`Oracle`] is a text-completion service: it takes one free-text prompt
//! plus generation parameters and returns one completion. It may time out,
//! fail, or return content blocked by a safety filter; callers must handle
//! all three.
//!
//! # Example
//!
//! ```ignore
//! use turncoach_models::providers::{GenerateRequest, Oracle};
//!
//! async fn ask(oracle: &dyn Oracle) -> turncoach_models::Result<String> {
//!     let request = GenerateRequest::new("Summarize this call").temperature(0.3);
//!     let response = oracle.generate(request).await?;
//!     Ok(response.text)
//! }
//! ```

mod gemini;
mod ollama;
mod scripted;
mod types;

use async_trait::async_trait;

pub use gemini::GeminiOracle;
pub use ollama::OllamaOracle;
pub use scripted::{ScriptedOracle, ScriptedReply};
pub use types::*;

use crate::Result;

/// Trait for text-completion oracles (cloud and local).
///
/// Implementations are shared across tasks behind `Arc<dyn Oracle>`, so
/// they must be `Send + Sync` and take `&self`.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Returns the provider name (e.g., "gemini", "ollama").
    fn name(&self) -> &str;

    /// Returns the model this oracle sends requests to.
    fn model(&self) -> &str;

    /// Perform a single generation request.
    ///
    /// A safety block is not an error: it comes back as a response with
    /// [`GenerateResponse::safety_block`] set.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse>;
}
