//! Error types for turncoach-core

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Malformed or out-of-order transcript input
///
/// Anomalies are logged and the event dropped; they are never returned as
/// errors from ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventAnomaly {
    /// Content was empty or whitespace only
    EmptyContent,
    /// Representative spoke before any customer statement
    ReplyWithoutPrompt,
    /// A customer statement replaced one that never got a reply
    SupersededPrompt,
    /// Role was neither customer nor representative
    UnknownRole(String),
}

impl fmt::Display for EventAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventAnomaly::EmptyContent => write!(f, "empty content"),
            EventAnomaly::ReplyWithoutPrompt => {
                write!(f, "representative reply without a customer prompt")
            }
            EventAnomaly::SupersededPrompt => {
                write!(f, "customer prompt superseded before any reply")
            }
            EventAnomaly::UnknownRole(role) => write!(f, "unknown role '{}'", role),
        }
    }
}

/// Why an oracle call produced no usable evaluation
///
/// Absorbed inside the evaluator and surfaced only as a degraded result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleFailure {
    Timeout,
    SafetyBlock,
    MalformedOutput,
    Transport(String),
}

impl fmt::Display for OracleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleFailure::Timeout => write!(f, "oracle call timed out"),
            OracleFailure::SafetyBlock => write!(f, "response blocked by safety filters"),
            OracleFailure::MalformedOutput => write!(f, "no JSON object in oracle output"),
            OracleFailure::Transport(msg) => write!(f, "oracle call failed: {}", msg),
        }
    }
}

/// Errors raised while starting the evaluator
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Missing credentials for provider '{0}'")]
    MissingCredentials(String),

    #[error("Unsupported oracle provider '{0}'")]
    UnsupportedProvider(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors writing or reading session artifacts
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid session stamp '{0}'")]
    InvalidStamp(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session {stamp} already has artifacts at {path}")]
    AlreadyExists { stamp: String, path: PathBuf },
}

impl RecorderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RecorderError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors loading the prompt catalog
#[derive(Error, Debug)]
pub enum PromptsError {
    #[error("Failed to read prompts file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse prompts: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Prompt not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by a coaching session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomaly_display() {
        assert_eq!(
            EventAnomaly::UnknownRole("system".into()).to_string(),
            "unknown role 'system'"
        );
        assert_eq!(EventAnomaly::EmptyContent.to_string(), "empty content");
    }

    #[test]
    fn recorder_error_wraps_into_session_error() {
        let err: SessionError = RecorderError::InvalidStamp("nope".into()).into();
        assert!(matches!(err, SessionError::Recorder(RecorderError::InvalidStamp(_))));
        assert_eq!(
            err.to_string(),
            "Recorder error: Invalid session stamp 'nope'"
        );
    }

    #[test]
    fn io_error_names_the_path() {
        let err = RecorderError::io(
            "/tmp/x.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/x.json"));
    }
}
