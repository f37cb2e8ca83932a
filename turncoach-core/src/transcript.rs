//! Transcript events as delivered by the transport layer

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript fragment
///
/// The simulated customer speaks first; the representative is the human
/// being coached. Upstream pipelines often label them `assistant` and
/// `user` respectively, so both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Customer,
    Representative,
    /// Anything else; dropped by the aggregator
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Customer => "customer",
            Role::Representative => "representative",
            Role::Other(role) => role,
        }
    }
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        match role.trim().to_ascii_lowercase().as_str() {
            "customer" | "assistant" => Role::Customer,
            "representative" | "user" => Role::Representative,
            _ => Role::Other(role.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        Role::from(role.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One speech-to-text fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub role: Role,
    pub text: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Provisional partial result, superseded by a later final one
    #[serde(default)]
    pub is_interim: bool,
}

impl TranscriptEvent {
    pub fn new(role: impl Into<Role>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
            timestamp: Utc::now(),
            is_interim: false,
        }
    }

    /// Final customer statement
    pub fn customer(text: impl Into<String>) -> Self {
        Self::new(Role::Customer, text)
    }

    /// Final representative fragment
    pub fn representative(text: impl Into<String>) -> Self {
        Self::new(Role::Representative, text)
    }

    /// Mark as an interim result
    pub fn interim(mut self) -> Self {
        self.is_interim = true;
        self
    }
}
