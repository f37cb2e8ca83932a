//! Typed configuration for coaching sessions
//!
//! Every field has a default, so an empty TOML document is a valid config.
//! Timeouts must be positive, finite and representable as a [`Duration`];
//! `validate` rejects anything else.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SetupError;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    pub oracle: OracleConfig,
    pub evaluator: EvaluatorConfig,
    pub recorder: RecorderConfig,
    pub session: SessionConfig,
    pub prompts: PromptsConfig,
}

impl CoachConfig {
    pub fn validate(&self) -> Result<(), SetupError> {
        self.evaluator.validate()?;
        self.session.validate()
    }
}

/// Which oracle to talk to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// `gemini` or `ollama`
    pub provider: String,
    pub model: String,
    /// Override the provider's default endpoint
    pub base_url: Option<String>,
    /// Keyring service used for credential lookup
    pub keyring_service: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            base_url: None,
            keyring_service: "turncoach".to_string(),
        }
    }
}

/// Oracle call parameters for each evaluation kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub turn_timeout_secs: f64,
    pub turn_temperature: f32,
    pub turn_max_output_tokens: u32,
    pub assessment_timeout_secs: f64,
    pub assessment_temperature: f32,
    pub assessment_max_output_tokens: u32,
    pub summary_timeout_secs: f64,
    pub summary_temperature: f32,
    pub summary_max_output_tokens: u32,
    /// Ask the oracle to disable adjustable safety filters
    pub relax_safety: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            turn_timeout_secs: 10.0,
            turn_temperature: 0.3,
            turn_max_output_tokens: 500,
            assessment_timeout_secs: 20.0,
            assessment_temperature: 0.4,
            assessment_max_output_tokens: 1500,
            summary_timeout_secs: 15.0,
            summary_temperature: 0.3,
            summary_max_output_tokens: 800,
            relax_safety: true,
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> Result<(), SetupError> {
        check_timeout("evaluator.turn_timeout_secs", self.turn_timeout_secs)?;
        check_timeout("evaluator.assessment_timeout_secs", self.assessment_timeout_secs)?;
        check_timeout("evaluator.summary_timeout_secs", self.summary_timeout_secs)
    }

    pub fn turn_timeout(&self) -> Duration {
        secs(self.turn_timeout_secs)
    }

    pub fn assessment_timeout(&self) -> Duration {
        secs(self.assessment_timeout_secs)
    }

    pub fn summary_timeout(&self) -> Duration {
        secs(self.summary_timeout_secs)
    }
}

/// Where session artifacts are written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Defaults to `turncoach_paths::sessions_dir()`
    pub base_dir: Option<PathBuf>,
}

impl RecorderConfig {
    pub fn base_dir(&self) -> PathBuf {
        self.base_dir
            .clone()
            .unwrap_or_else(turncoach_paths::sessions_dir)
    }
}

/// Session orchestration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound on the whole teardown sequence
    pub finalize_timeout_secs: f64,
    /// Persist evaluations that have no parsed JSON
    pub record_degraded_evaluations: bool,
    /// Write the JSON conversation summary at teardown
    pub write_summary: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            finalize_timeout_secs: 45.0,
            record_degraded_evaluations: true,
            write_summary: false,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SetupError> {
        check_timeout("session.finalize_timeout_secs", self.finalize_timeout_secs)
    }

    pub fn finalize_timeout(&self) -> Duration {
        secs(self.finalize_timeout_secs)
    }
}

/// Prompt catalog location
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Defaults to `turncoach_paths::config_dir()/prompts.json`
    pub path: Option<PathBuf>,
}

impl PromptsConfig {
    pub fn path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| turncoach_paths::config_dir().join("prompts.json"))
    }
}

fn check_timeout(name: &str, value: f64) -> Result<(), SetupError> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if !duration.is_zero() => Ok(()),
        _ => Err(SetupError::InvalidConfig(format!(
            "{name} must be a positive number of seconds, got {value}"
        ))),
    }
}

/// Callers validate first; an unchecked invalid value maps to zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoachConfig::default();
        assert_eq!(config.oracle.provider, "gemini");
        assert_eq!(config.oracle.model, "gemini-1.5-flash");
        assert_eq!(config.evaluator.turn_timeout(), Duration::from_secs(10));
        assert_eq!(config.evaluator.assessment_timeout(), Duration::from_secs(20));
        assert_eq!(config.evaluator.summary_timeout(), Duration::from_secs(15));
        assert_eq!(config.evaluator.turn_max_output_tokens, 500);
        assert_eq!(config.evaluator.assessment_max_output_tokens, 1500);
        assert!(config.evaluator.relax_safety);
        assert!(config.session.record_degraded_evaluations);
        assert!(!config.session.write_summary);
    }

    #[test]
    fn test_empty_toml_is_default() {
        let config: CoachConfig = toml::from_str("").unwrap();
        assert_eq!(config, CoachConfig::default());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let toml_str = r#"
            [oracle]
            provider = "ollama"
            model = "llama3"

            [evaluator]
            turn_timeout_secs = 2.5

            [recorder]
            base_dir = "/tmp/coach"
        "#;

        let config: CoachConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.oracle.provider, "ollama");
        assert_eq!(config.oracle.keyring_service, "turncoach");
        assert_eq!(config.evaluator.turn_timeout(), Duration::from_millis(2500));
        assert_eq!(config.evaluator.turn_temperature, 0.3);
        assert_eq!(config.recorder.base_dir(), PathBuf::from("/tmp/coach"));
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(CoachConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_timeouts_are_rejected() {
        for bad in [f64::NAN, -1.0, 0.0, f64::INFINITY, 1e30] {
            let evaluator = EvaluatorConfig {
                turn_timeout_secs: bad,
                ..Default::default()
            };
            let err = evaluator.validate().unwrap_err();
            assert!(matches!(err, SetupError::InvalidConfig(_)), "{bad}");
            assert!(err.to_string().contains("turn_timeout_secs"), "{bad}");

            let session = SessionConfig {
                finalize_timeout_secs: bad,
                ..Default::default()
            };
            assert!(session.validate().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_validate_covers_every_timeout() {
        let config = CoachConfig {
            evaluator: EvaluatorConfig {
                summary_timeout_secs: -0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("summary_timeout_secs"));

        let config = CoachConfig {
            session: SessionConfig {
                finalize_timeout_secs: f64::NAN,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
