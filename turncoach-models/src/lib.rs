//! Oracle access for turncoach.
//!
//! This crate provides:
//! - The [`Oracle`](providers::Oracle) trait: one prompt in, one completion out
//! - Credential management for API keys
//! - Gemini and Ollama oracle clients, plus a scripted oracle for tests
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  dyn Oracle                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐  │
//! │  │   Gemini    │  │   Ollama    │  │  Scripted   │  │
//! │  │   Oracle    │  │   Oracle    │  │   Oracle    │  │
//! │  └─────────────┘  └─────────────┘  └─────────────┘  │
//! └─────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────┐
//! │                  CredentialStore                    │
//! │         (System Keyring + Env Fallback)             │
//! └─────────────────────────────────────────────────────┘
//! ```

mod error;

pub mod auth;
pub mod providers;

pub use error::{Error, Result};
