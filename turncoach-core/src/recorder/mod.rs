//! Session recording
//!
//! Every artifact is rewritten in full on each append, through a temporary
//! file in the same directory followed by a rename. A crash therefore
//! leaves either the previous or the new complete document on disk, never
//! a truncated one.
//!
//! Layout below the base directory, for session stamp `S`:
//!
//! ```text
//! transcripts/transcript_S.json                 final fragments only
//! transcripts/transcript_with_interims_S.json   every fragment, with is_interim
//! feedback/per_turn_S.json                      one record per evaluated turn
//! feedback/summary_S_<scenario>.json            optional JSON summary
//! session_evals/session_eval_S.md               end-of-session assessment
//! ```

mod catalog;
mod stamp;

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

pub use catalog::{SessionCatalog, SessionSummary};
pub use stamp::SessionStamp;

use crate::error::RecorderError;
use crate::transcript::Role;

const TS_FORMAT: &str = "%H:%M:%S %d-%m-%Y";

/// One transcript line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Milliseconds since the Unix epoch
    pub ts_ms: i64,
    /// Local time, `HH:MM:SS DD-MM-YYYY`
    pub ts: String,
    pub role: String,
    pub content: String,
}

impl TranscriptEntry {
    fn now(role: &Role, content: &str) -> Self {
        Self {
            ts_ms: Utc::now().timestamp_millis(),
            ts: Local::now().format(TS_FORMAT).to_string(),
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

/// Transcript line in the interim-inclusive log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterimTranscriptEntry {
    #[serde(flatten)]
    pub entry: TranscriptEntry,
    pub is_interim: bool,
}

/// The exchange a coaching record refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub customer: String,
    pub representative: String,
}

/// One per-turn coaching record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachTurnRecord {
    pub ts_ms: i64,
    pub ts: String,
    pub turn: u32,
    pub interaction: Interaction,
    pub coaching: Value,
}

/// Artifact locations for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub base_dir: PathBuf,
    pub transcript: PathBuf,
    pub transcript_with_interims: PathBuf,
    pub per_turn: PathBuf,
    pub session_eval: PathBuf,
}

impl SessionPaths {
    pub fn new(base_dir: impl Into<PathBuf>, stamp: &SessionStamp) -> Self {
        let base_dir = base_dir.into();
        Self {
            transcript: transcripts_dir(&base_dir).join(format!("transcript_{stamp}.json")),
            transcript_with_interims: transcripts_dir(&base_dir)
                .join(format!("transcript_with_interims_{stamp}.json")),
            per_turn: feedback_dir(&base_dir).join(format!("per_turn_{stamp}.json")),
            session_eval: session_evals_dir(&base_dir).join(format!("session_eval_{stamp}.md")),
            base_dir,
        }
    }

    pub fn summary(&self, stamp: &SessionStamp, scenario: &str) -> PathBuf {
        feedback_dir(&self.base_dir).join(format!("summary_{stamp}_{scenario}.json"))
    }
}

fn transcripts_dir(base: &Path) -> PathBuf {
    base.join("transcripts")
}

fn feedback_dir(base: &Path) -> PathBuf {
    base.join("feedback")
}

fn session_evals_dir(base: &Path) -> PathBuf {
    base.join("session_evals")
}

/// Append-only recorder for one session's artifacts
///
/// Single writer: callers serialize access (the session keeps it behind a
/// mutex shared with the evaluation worker).
#[derive(Debug)]
pub struct SessionRecorder {
    stamp: SessionStamp,
    scenario: String,
    paths: SessionPaths,
    transcript: Vec<TranscriptEntry>,
    interim_transcript: Vec<InterimTranscriptEntry>,
    coach_turns: Vec<CoachTurnRecord>,
}

impl SessionRecorder {
    /// Create the directory layout and an empty recorder
    ///
    /// Fails with [`RecorderError::AlreadyExists`] if any artifact for the
    /// stamp is already on disk; a stamp names exactly one session.
    pub fn create(
        base_dir: impl Into<PathBuf>,
        scenario: impl Into<String>,
        stamp: Option<SessionStamp>,
    ) -> Result<Self, RecorderError> {
        let stamp = stamp.unwrap_or_else(SessionStamp::now);
        let scenario = scenario.into();
        let paths = SessionPaths::new(base_dir, &stamp);
        let summary = paths.summary(&stamp, &scenario);
        if let Some(existing) = [
            &paths.transcript,
            &paths.transcript_with_interims,
            &paths.per_turn,
            &paths.session_eval,
            &summary,
        ]
        .into_iter()
        .find(|path| path.exists())
        {
            return Err(RecorderError::AlreadyExists {
                stamp: stamp.to_string(),
                path: existing.clone(),
            });
        }

        for dir in [
            transcripts_dir(&paths.base_dir),
            feedback_dir(&paths.base_dir),
            session_evals_dir(&paths.base_dir),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| RecorderError::io(&dir, e))?;
        }

        info!(stamp = %stamp, base_dir = %paths.base_dir.display(), "session recorder ready");
        Ok(Self {
            stamp,
            scenario,
            paths,
            transcript: Vec::new(),
            interim_transcript: Vec::new(),
            coach_turns: Vec::new(),
        })
    }

    pub fn stamp(&self) -> &SessionStamp {
        &self.stamp
    }

    pub fn scenario(&self) -> &str {
        &self.scenario
    }

    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    /// Record a transcript fragment
    ///
    /// Every fragment goes to the interim-inclusive log; final ones also go
    /// to the final-only log. Both affected files are rewritten before
    /// returning. On error the entry stays in memory and is written by the
    /// next successful flush.
    pub fn append_transcript(
        &mut self,
        role: &Role,
        content: &str,
        is_interim: bool,
    ) -> Result<(), RecorderError> {
        let entry = TranscriptEntry::now(role, content);

        if !is_interim {
            self.transcript.push(entry.clone());
        }
        self.interim_transcript.push(InterimTranscriptEntry { entry, is_interim });

        if !is_interim {
            write_json(&self.paths.transcript, &self.transcript)?;
        }
        write_json(&self.paths.transcript_with_interims, &self.interim_transcript)?;
        Ok(())
    }

    /// Record the coaching output for one evaluated turn
    pub fn append_coach_turn(
        &mut self,
        turn: u32,
        customer: &str,
        representative: &str,
        coaching: Value,
    ) -> Result<(), RecorderError> {
        self.coach_turns.push(CoachTurnRecord {
            ts_ms: Utc::now().timestamp_millis(),
            ts: Local::now().format(TS_FORMAT).to_string(),
            turn,
            interaction: Interaction {
                customer: customer.to_string(),
                representative: representative.to_string(),
            },
            coaching,
        });
        write_json(&self.paths.per_turn, &self.coach_turns)?;
        debug!(turn, path = %self.paths.per_turn.display(), "recorded coach turn");
        Ok(())
    }

    /// Rewrite the final-only transcript and return its path
    pub fn snapshot_transcript(&self) -> Result<PathBuf, RecorderError> {
        write_json(&self.paths.transcript, &self.transcript)?;
        Ok(self.paths.transcript.clone())
    }

    /// Write the end-of-session markdown assessment
    pub fn write_session_eval(&self, markdown: &str) -> Result<PathBuf, RecorderError> {
        write_atomic(&self.paths.session_eval, markdown.as_bytes())?;
        info!(path = %self.paths.session_eval.display(), "wrote session assessment");
        Ok(self.paths.session_eval.clone())
    }

    /// Write the JSON conversation summary
    pub fn write_summary(&self, summary: &Value) -> Result<PathBuf, RecorderError> {
        let path = self.paths.summary(&self.stamp, &self.scenario);
        write_json(&path, summary)?;
        Ok(path)
    }

    /// Final-only transcript, oldest first
    pub fn transcript_for_assessment(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn coach_turns(&self) -> &[CoachTurnRecord] {
        &self.coach_turns
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), RecorderError> {
    let content = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &content)
}

fn write_atomic(path: &Path, content: &[u8]) -> Result<(), RecorderError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| RecorderError::io(dir, e))?;
    tmp.write_all(content).map_err(|e| RecorderError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| RecorderError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| RecorderError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn stamp() -> SessionStamp {
        "09_15_00_03_03_2025".parse().unwrap()
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn create_builds_directory_layout() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();

        assert!(dir.path().join("transcripts").is_dir());
        assert!(dir.path().join("feedback").is_dir());
        assert!(dir.path().join("session_evals").is_dir());
        assert_eq!(
            recorder.paths().per_turn,
            dir.path().join("feedback/per_turn_09_15_00_03_03_2025.json")
        );
    }

    #[test]
    fn reused_stamp_is_rejected_and_earlier_session_kept() {
        let dir = tempdir().unwrap();
        let mut first = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();
        first.append_transcript(&Role::Customer, "I lost my card", false).unwrap();
        first.append_transcript(&Role::Representative, "Let me help", false).unwrap();
        first
            .append_coach_turn(1, "I lost my card", "Let me help", serde_json::json!({"turn_quality_score": 7}))
            .unwrap();

        let err = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap_err();
        match err {
            RecorderError::AlreadyExists { stamp: s, path } => {
                assert_eq!(s, "09_15_00_03_03_2025");
                assert_eq!(path, first.paths().transcript);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(read_json(&first.paths().transcript).as_array().unwrap().len(), 2);
        assert_eq!(read_json(&first.paths().per_turn).as_array().unwrap().len(), 1);
    }

    #[test]
    fn stamp_with_only_an_assessment_is_taken() {
        let dir = tempdir().unwrap();
        let first = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();
        first.write_session_eval("# Session Assessment").unwrap();

        assert!(matches!(
            SessionRecorder::create(dir.path(), "transfer", Some(stamp())),
            Err(RecorderError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn distinct_stamps_share_a_base_directory() {
        let dir = tempdir().unwrap();
        let mut first = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();
        first.append_transcript(&Role::Customer, "Hi", false).unwrap();

        let other: SessionStamp = "09_15_01_03_03_2025".parse().unwrap();
        assert!(SessionRecorder::create(dir.path(), "card", Some(other)).is_ok());
    }

    #[test]
    fn interim_fragments_only_reach_interim_log() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();

        recorder.append_transcript(&Role::Customer, "I lost my card", false).unwrap();
        recorder.append_transcript(&Role::Representative, "I'm so", true).unwrap();
        recorder.append_transcript(&Role::Representative, "I'm sorry to hear that", false).unwrap();

        let finals = read_json(&recorder.paths().transcript);
        let all = read_json(&recorder.paths().transcript_with_interims);

        assert_eq!(finals.as_array().unwrap().len(), 2);
        assert_eq!(all.as_array().unwrap().len(), 3);
        assert_eq!(all[1]["is_interim"], true);
        assert_eq!(all[1]["content"], "I'm so");
        assert_eq!(finals[1]["role"], "representative");
        assert!(finals[0].get("is_interim").is_none());
        assert_eq!(recorder.transcript_for_assessment().len(), 2);
    }

    #[test]
    fn interim_first_event_does_not_create_final_log() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();

        recorder.append_transcript(&Role::Customer, "Hel", true).unwrap();

        assert!(!recorder.paths().transcript.exists());
        assert!(recorder.paths().transcript_with_interims.exists());
    }

    #[test]
    fn entries_carry_both_timestamp_forms() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();
        recorder.append_transcript(&Role::Customer, "Hi", false).unwrap();

        let entry = &recorder.transcript_for_assessment()[0];
        assert!(entry.ts_ms > 1_600_000_000_000);
        // HH:MM:SS DD-MM-YYYY
        assert_eq!(entry.ts.len(), 19);
        assert_eq!(&entry.ts[2..3], ":");
        assert_eq!(&entry.ts[8..9], " ");
        assert_eq!(&entry.ts[11..12], "-");
    }

    #[test]
    fn coach_turns_accumulate_in_valid_json() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();

        recorder
            .append_coach_turn(1, "Help", "Sure", serde_json::json!({"turn_quality_score": 8}))
            .unwrap();
        recorder
            .append_coach_turn(2, "Now?", "Yes", serde_json::json!({"parsed": null, "raw_text": "Timeout"}))
            .unwrap();

        let records: Vec<CoachTurnRecord> =
            serde_json::from_value(read_json(&recorder.paths().per_turn)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].interaction.customer, "Help");
        assert_eq!(records[1].coaching["raw_text"], "Timeout");
        assert_eq!(recorder.coach_turns().len(), 2);
    }

    #[test]
    fn session_eval_and_summary_are_written() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::create(dir.path(), "transfer", Some(stamp())).unwrap();

        let eval = recorder.write_session_eval("# Session Assessment\n\nGood.").unwrap();
        let summary = recorder
            .write_summary(&serde_json::json!({"overall_performance_score": 7}))
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(eval).unwrap(),
            "# Session Assessment\n\nGood."
        );
        assert!(summary.ends_with("feedback/summary_09_15_00_03_03_2025_transfer.json"));
        assert_eq!(read_json(&summary)["overall_performance_score"], 7);
    }

    #[test]
    fn snapshot_writes_empty_array_for_silent_session() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();

        let path = recorder.snapshot_transcript().unwrap();
        assert_eq!(read_json(&path), serde_json::json!([]));
    }

    #[test]
    fn no_temporary_files_are_left_behind() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::create(dir.path(), "card", Some(stamp())).unwrap();
        for i in 0..5 {
            recorder
                .append_transcript(&Role::Customer, &format!("line {i}"), false)
                .unwrap();
        }

        let names: Vec<_> = std::fs::read_dir(dir.path().join("transcripts"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 2, "{names:?}");
    }
}
