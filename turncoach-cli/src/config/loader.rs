use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use toml::Table;

use super::types::TurncoachConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user, then project, then `explicit`)
    ///
    /// Missing user and project files are skipped; a missing explicit file
    /// is an error.
    pub fn load(explicit: Option<&Path>) -> Result<TurncoachConfig> {
        if let Some(path) = explicit
            && !path.exists()
        {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let mut layers = vec![Self::user_config_path(), Self::project_config_path()];
        layers.extend(explicit.map(Path::to_path_buf));
        Self::load_layers(&layers)
    }

    /// Merge existing files in order, later ones winning per key
    pub fn load_layers(paths: &[PathBuf]) -> Result<TurncoachConfig> {
        let mut merged = Table::new();
        for path in paths.iter().filter(|p| p.exists()) {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let layer: Table = toml::from_str(&contents)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?;
            Self::merge_tables(&mut merged, layer);
        }

        let config: TurncoachConfig = toml::Value::Table(merged)
            .try_into()
            .context("Invalid configuration")?;
        config.coach.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// User config path (`~/.config/turncoach/config.toml` or similar)
    pub fn user_config_path() -> PathBuf {
        turncoach_paths::config_dir().join("config.toml")
    }

    /// Project config path
    /// Can be overridden with TURNCOACH_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TURNCOACH_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".turncoach/config.toml")
        }
    }

    /// Overlay keys replace base keys; nested tables merge recursively
    fn merge_tables(base: &mut Table, overlay: Table) {
        for (key, value) in overlay {
            match (base.get_mut(&key), value) {
                (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                    Self::merge_tables(base_table, overlay_table);
                }
                (_, value) => {
                    base.insert(key, value);
                }
            }
        }
    }
}
