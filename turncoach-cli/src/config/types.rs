use serde::{Deserialize, Serialize};
use turncoach_core::CoachConfig;
use turncoach_observe::TracerConfig;

/// Everything the CLI reads from config files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurncoachConfig {
    #[serde(flatten)]
    pub coach: CoachConfig,

    #[serde(default)]
    pub logging: TracerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config: TurncoachConfig = toml::from_str("").unwrap();
        assert_eq!(config, TurncoachConfig::default());
        assert_eq!(config.coach.oracle.provider, "gemini");
        assert_eq!(config.coach.evaluator.turn_timeout_secs, 10.0);
    }

    #[test]
    fn sections_are_read_side_by_side() {
        let config: TurncoachConfig = toml::from_str(
            r#"
[oracle]
provider = "ollama"
model = "llama3.1"

[session]
write_summary = true

[logging]
format = "json"
"#,
        )
        .unwrap();

        assert_eq!(config.coach.oracle.provider, "ollama");
        assert_eq!(config.coach.oracle.model, "llama3.1");
        assert!(config.coach.session.write_summary);
        assert!(config.coach.session.record_degraded_evaluations);
        assert_eq!(config.logging.format, turncoach_observe::LogFormat::Json);
    }
}
