//! XDG Base Directory paths for turncoach.
//!
//! Session artifacts and the prompt catalog live under XDG paths rather
//! than platform-native ones, so a recorded session can be found at the
//! same place on every machine.

use std::path::PathBuf;

const APP_DIR: &str = "turncoach";

/// Get the turncoach config directory.
///
/// Returns `$XDG_CONFIG_HOME/turncoach` if set, otherwise `~/.config/turncoach`.
/// The user `config.toml` and the default `prompts.json` are read from here.
///
/// # Examples
///
/// ```
/// use turncoach_paths::config_dir;
///
/// let prompts = config_dir().join("prompts.json");
/// ```
pub fn config_dir() -> PathBuf {
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".config").join(APP_DIR)
    } else {
        PathBuf::from(".config").join(APP_DIR)
    }
}

/// Get the turncoach data directory.
///
/// Returns `$XDG_DATA_HOME/turncoach` if set, otherwise `~/.local/share/turncoach`.
pub fn data_dir() -> PathBuf {
    if let Ok(xdg_data) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg_data).join(APP_DIR)
    } else if let Some(home) = dirs::home_dir() {
        home.join(".local/share").join(APP_DIR)
    } else {
        PathBuf::from(".local/share").join(APP_DIR)
    }
}

/// Default root for recorded sessions: `data_dir()/sessions`.
///
/// Transcripts, per-turn feedback and assessments are written below it.
pub fn sessions_dir() -> PathBuf {
    data_dir().join("sessions")
}
