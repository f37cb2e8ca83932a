//! Read-side access to recorded sessions

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use super::{CoachTurnRecord, InterimTranscriptEntry, SessionPaths, SessionStamp, TranscriptEntry, feedback_dir};
use crate::error::RecorderError;

/// Listing entry for one recorded session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub stamp: SessionStamp,
    /// Number of per-turn coaching records
    pub turns: usize,
    pub has_transcript: bool,
    pub has_assessment: bool,
}

/// Browses sessions written by [`SessionRecorder`](super::SessionRecorder)
#[derive(Debug, Clone)]
pub struct SessionCatalog {
    base_dir: PathBuf,
}

impl SessionCatalog {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn paths(&self, stamp: &SessionStamp) -> SessionPaths {
        SessionPaths::new(&self.base_dir, stamp)
    }

    /// Sessions with a per-turn log, newest first
    ///
    /// Files whose names do not carry a valid stamp are skipped.
    pub fn list(&self) -> Result<Vec<SessionSummary>, RecorderError> {
        let dir = feedback_dir(&self.base_dir);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut sessions = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| RecorderError::io(&dir, e))? {
            let entry = entry.map_err(|e| RecorderError::io(&dir, e))?;
            let name = entry.file_name();
            let Some(stamp) = name
                .to_str()
                .and_then(|n| n.strip_prefix("per_turn_"))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|s| s.parse::<SessionStamp>().ok())
            else {
                continue;
            };

            let paths = self.paths(&stamp);
            let turns = match read_json::<Vec<serde_json::Value>>(&paths.per_turn) {
                Ok(records) => records.len(),
                Err(e) => {
                    warn!(stamp = %stamp, error = %e, "unreadable per-turn log");
                    0
                }
            };
            sessions.push(SessionSummary {
                stamp,
                turns,
                has_transcript: paths.transcript.is_file(),
                has_assessment: paths.session_eval.is_file(),
            });
        }

        sessions.sort_by(|a, b| b.stamp.cmp(&a.stamp));
        Ok(sessions)
    }

    pub fn load_turns(&self, stamp: &SessionStamp) -> Result<Vec<CoachTurnRecord>, RecorderError> {
        read_existing(&self.paths(stamp).per_turn, stamp)
    }

    pub fn load_transcript(&self, stamp: &SessionStamp) -> Result<Vec<TranscriptEntry>, RecorderError> {
        read_existing(&self.paths(stamp).transcript, stamp)
    }

    pub fn load_transcript_with_interims(
        &self,
        stamp: &SessionStamp,
    ) -> Result<Vec<InterimTranscriptEntry>, RecorderError> {
        read_existing(&self.paths(stamp).transcript_with_interims, stamp)
    }

    /// Markdown assessment, `None` when the session has none
    pub fn load_assessment(&self, stamp: &SessionStamp) -> Result<Option<String>, RecorderError> {
        let path = self.paths(stamp).session_eval;
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| RecorderError::io(&path, e))
    }
}

fn read_existing<T: DeserializeOwned>(path: &Path, stamp: &SessionStamp) -> Result<T, RecorderError> {
    if !path.is_file() {
        return Err(RecorderError::NotFound(stamp.to_string()));
    }
    read_json(path)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, RecorderError> {
    let content = std::fs::read_to_string(path).map_err(|e| RecorderError::io(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::SessionRecorder;
    use crate::transcript::Role;
    use tempfile::tempdir;

    fn record(base: &Path, stamp: &str, turns: u32, with_eval: bool) {
        let mut recorder =
            SessionRecorder::create(base, "card", Some(stamp.parse().unwrap())).unwrap();
        recorder.append_transcript(&Role::Customer, "Help", false).unwrap();
        for turn in 1..=turns {
            recorder
                .append_coach_turn(turn, "Help", "Sure", serde_json::json!({"turn_quality_score": 6}))
                .unwrap();
        }
        if with_eval {
            recorder.write_session_eval("# Session Assessment").unwrap();
        }
    }

    #[test]
    fn list_is_newest_first_and_skips_foreign_files() {
        let dir = tempdir().unwrap();
        record(dir.path(), "10_00_00_01_03_2025", 2, true);
        record(dir.path(), "09_00_00_02_03_2025", 1, false);
        std::fs::write(dir.path().join("feedback/per_turn_garbage.json"), "[]").unwrap();
        std::fs::write(dir.path().join("feedback/notes.txt"), "x").unwrap();

        let sessions = SessionCatalog::new(dir.path()).list().unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].stamp.to_string(), "09_00_00_02_03_2025");
        assert_eq!(sessions[0].turns, 1);
        assert!(!sessions[0].has_assessment);
        assert_eq!(sessions[1].turns, 2);
        assert!(sessions[1].has_assessment);
        assert!(sessions[1].has_transcript);
    }

    #[test]
    fn list_on_missing_directory_is_empty() {
        let dir = tempdir().unwrap();
        let catalog = SessionCatalog::new(dir.path().join("nothing-here"));
        assert!(catalog.list().unwrap().is_empty());
    }

    #[test]
    fn load_artifacts_for_a_session() {
        let dir = tempdir().unwrap();
        record(dir.path(), "10_00_00_01_03_2025", 1, true);
        let catalog = SessionCatalog::new(dir.path());
        let stamp: SessionStamp = "10_00_00_01_03_2025".parse().unwrap();

        assert_eq!(catalog.load_turns(&stamp).unwrap()[0].turn, 1);
        assert_eq!(catalog.load_transcript(&stamp).unwrap()[0].content, "Help");
        assert!(!catalog.load_transcript_with_interims(&stamp).unwrap()[0].is_interim);
        assert_eq!(
            catalog.load_assessment(&stamp).unwrap().as_deref(),
            Some("# Session Assessment")
        );
    }

    #[test]
    fn unknown_session_is_not_found() {
        let dir = tempdir().unwrap();
        let catalog = SessionCatalog::new(dir.path());
        let stamp: SessionStamp = "10_00_00_01_03_2025".parse().unwrap();

        assert!(matches!(catalog.load_turns(&stamp), Err(RecorderError::NotFound(_))));
        assert!(catalog.load_assessment(&stamp).unwrap().is_none());
    }
}
