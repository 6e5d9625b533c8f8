//! Job lifecycle model and status-message decoding.

use crate::api::{AnalysisResult, AnimationResult, ComparisonResult, ProgressInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Failure text used when the cause is not known (transport errors,
/// malformed payloads, FAILURE frames without an error field).
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Kinds of backend jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Pocket analysis of a structure.
    Analysis,
    /// AHoJ apo/holo search.
    Comparison,
    /// Trajectory computation toward a candidate.
    Animation,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Comparison => write!(f, "comparison"),
            Self::Animation => write!(f, "animation"),
        }
    }
}

/// Job status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    /// Queued.
    Pending,
    /// Running.
    Progress,
    /// Finished with a result.
    Success,
    /// Finished with an error.
    Failure,
    /// The backend does not know the job (or sent an empty frame).
    Unknown,
}

impl JobStatus {
    /// Success and Failure are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Parses a wire status string.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "PENDING" => Self::Pending,
            "PROGRESS" => Self::Progress,
            "SUCCESS" => Self::Success,
            "FAILURE" => Self::Failure,
            _ => Self::Unknown,
        }
    }

    /// The wire status string.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Progress => "PROGRESS",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Result payload of a successful job, tagged by job kind.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    /// Pocket analysis.
    Analysis(Box<AnalysisResult>),
    /// Comparison search.
    Comparison(ComparisonResult),
    /// Trajectory files.
    Animation(AnimationResult),
}

/// One status transition delivered by a job channel.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    /// New status.
    pub status: JobStatus,
    /// Progress text for non-terminal updates, error text for failures.
    pub message: Option<String>,
    /// Payload, present only on Success.
    pub result: Option<JobResult>,
}

impl StatusUpdate {
    /// A non-terminal progress update.
    pub fn progress(message: impl Into<String>) -> Self {
        Self { status: JobStatus::Progress, message: Some(message.into()), result: None }
    }

    /// A successful terminal update.
    pub fn success(result: JobResult) -> Self {
        Self { status: JobStatus::Success, message: None, result: Some(result) }
    }

    /// A failed terminal update.
    pub fn failure(message: impl Into<String>) -> Self {
        Self { status: JobStatus::Failure, message: Some(message.into()), result: None }
    }

    /// The non-terminal update for an empty or unrecognised frame.
    pub fn unknown() -> Self {
        Self { status: JobStatus::Unknown, message: None, result: None }
    }
}

/// A submitted backend job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Backend-issued identifier.
    pub job_id: String,
    /// What the job computes.
    pub kind: JobKind,
    /// Last known status.
    pub status: JobStatus,
    /// When the job was submitted.
    pub submitted_at: DateTime<Utc>,
    /// Structure hash the job is scoped to, when the transport needs it.
    pub file_hash: Option<String>,
}

impl Job {
    /// Creates a pending job.
    pub fn new(job_id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            job_id: job_id.into(),
            kind,
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            file_hash: None,
        }
    }

    /// Attaches the structure hash.
    #[must_use]
    pub fn with_file_hash(mut self, file_hash: impl Into<String>) -> Self {
        self.file_hash = Some(file_hash.into());
        self
    }

    /// Returns true once the job reached Success or Failure.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Applies a status update.
    ///
    /// # Returns
    /// `false` if the job is already terminal and was left unchanged.
    pub fn apply(&mut self, update: &StatusUpdate) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = update.status;
        true
    }
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    status: String,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Decodes one status frame for a job of the given kind.
///
/// Never fails: an empty frame is `Unknown`, a malformed frame or a SUCCESS
/// without a decodable result becomes a synthetic Failure.
pub fn decode_status_message(kind: JobKind, text: &str) -> StatusUpdate {
    if text.trim().is_empty() {
        return StatusUpdate::unknown();
    }

    let wire: WireStatus = match serde_json::from_str(text) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(kind = %kind, error = %e, "Malformed status frame");
            return StatusUpdate::failure(UNKNOWN_ERROR);
        }
    };

    match JobStatus::from_wire(&wire.status) {
        status @ (JobStatus::Pending | JobStatus::Progress) => {
            let message = wire
                .result
                .and_then(|value| serde_json::from_value::<ProgressInfo>(value).ok())
                .map(|info| info.status)
                .filter(|s| !s.is_empty());
            StatusUpdate { status, message, result: None }
        }
        JobStatus::Success => match wire.result.map(|value| decode_result(kind, value)) {
            Some(Ok(result)) => StatusUpdate::success(result),
            Some(Err(e)) => {
                warn!(kind = %kind, error = %e, "Undecodable SUCCESS payload");
                StatusUpdate::failure(UNKNOWN_ERROR)
            }
            None => {
                warn!(kind = %kind, "SUCCESS frame without result");
                StatusUpdate::failure(UNKNOWN_ERROR)
            }
        },
        JobStatus::Failure => {
            let message = wire
                .error
                .or_else(|| match wire.result {
                    Some(serde_json::Value::String(text)) => Some(text),
                    _ => None,
                })
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
            StatusUpdate::failure(message)
        }
        JobStatus::Unknown => StatusUpdate::unknown(),
    }
}

fn decode_result(kind: JobKind, value: serde_json::Value) -> serde_json::Result<JobResult> {
    Ok(match kind {
        JobKind::Analysis => JobResult::Analysis(Box::new(serde_json::from_value(value)?)),
        JobKind::Comparison => JobResult::Comparison(serde_json::from_value(value)?),
        JobKind::Animation => JobResult::Animation(serde_json::from_value(value)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_frame_is_unknown() {
        let update = decode_status_message(JobKind::Analysis, "");
        assert_eq!(update.status, JobStatus::Unknown);
        assert!(!update.status.is_terminal());
    }

    #[test]
    fn test_progress_carries_status_text() {
        let update = decode_status_message(
            JobKind::Analysis,
            r#"{"status":"PROGRESS","result":{"status":"Computing embeddings"}}"#,
        );
        assert_eq!(update.status, JobStatus::Progress);
        assert_eq!(update.message.as_deref(), Some("Computing embeddings"));
    }

    #[test]
    fn test_pending_without_result() {
        let update = decode_status_message(JobKind::Animation, r#"{"status":"PENDING"}"#);
        assert_eq!(update.status, JobStatus::Pending);
        assert!(update.message.is_none());
    }

    #[test]
    fn test_success_analysis() {
        let update = decode_status_message(
            JobKind::Analysis,
            r#"{"status":"SUCCESS","result":{"task_id":"t","file_hash":"h","input_structure":"2rfc.cif"}}"#,
        );
        assert_eq!(update.status, JobStatus::Success);
        match update.result {
            Some(JobResult::Analysis(result)) => assert_eq!(result.file_hash, "h"),
            other => panic!("Expected analysis result, got {:?}", other),
        }
    }

    #[test]
    fn test_success_animation_requires_fields() {
        let ok = decode_status_message(
            JobKind::Animation,
            r#"{"status":"SUCCESS","result":{"trimmed_pdb":"t.pdb","trajectory":"t.xtc"}}"#,
        );
        assert!(matches!(ok.result, Some(JobResult::Animation(_))));

        let missing =
            decode_status_message(JobKind::Animation, r#"{"status":"SUCCESS","result":{}}"#);
        assert_eq!(missing.status, JobStatus::Failure);
        assert_eq!(missing.message.as_deref(), Some(UNKNOWN_ERROR));
    }

    #[test]
    fn test_failure_message_sources() {
        let with_error = decode_status_message(
            JobKind::Animation,
            r#"{"status":"FAILURE","error":"chain mismatch"}"#,
        );
        assert_eq!(with_error.message.as_deref(), Some("chain mismatch"));

        let with_result =
            decode_status_message(JobKind::Analysis, r#"{"status":"FAILURE","result":"boom"}"#);
        assert_eq!(with_result.message.as_deref(), Some("boom"));

        let bare = decode_status_message(JobKind::Analysis, r#"{"status":"FAILURE"}"#);
        assert_eq!(bare.message.as_deref(), Some(UNKNOWN_ERROR));
    }

    #[test]
    fn test_malformed_frame_is_failure() {
        let update = decode_status_message(JobKind::Analysis, "{not json");
        assert_eq!(update.status, JobStatus::Failure);
        assert!(update.status.is_terminal());
    }

    #[test]
    fn test_unrecognised_status_is_unknown() {
        let update = decode_status_message(JobKind::Analysis, r#"{"status":"unknown"}"#);
        assert_eq!(update.status, JobStatus::Unknown);
    }

    #[test]
    fn test_job_apply_refuses_after_terminal() {
        let mut job = Job::new("t1", JobKind::Analysis);
        assert!(job.apply(&StatusUpdate::progress("working")));
        assert_eq!(job.status, JobStatus::Progress);

        assert!(job.apply(&StatusUpdate::failure("boom")));
        assert!(job.is_terminal());

        assert!(!job.apply(&StatusUpdate::progress("late")));
        assert_eq!(job.status, JobStatus::Failure);
    }
}
