//! Error types for session orchestration.

use cryptoshow_abstraction::EngineError;
use cryptoshow_core::{ChannelError, CoreError, SubmitError, UNKNOWN_ERROR};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Ordered stages of the structure loading pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    /// Download the primary structure file.
    FetchStructure,
    /// Parse it into a trajectory.
    ParseStructure,
    /// Build the frame-0 model.
    CreateModel,
    /// Download and parse the coordinate trajectory.
    FetchTrajectory,
    /// Bind coordinates to the model and rebuild it.
    BindTrajectory,
    /// Build the structure object.
    CreateStructure,
    /// Derive the polymer component.
    PolymerComponent,
    /// Create the toggleable polymer representations.
    Representations,
    /// Derive and draw the auxiliary components.
    AuxiliaryComponents,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FetchStructure => "fetch structure",
            Self::ParseStructure => "parse structure",
            Self::CreateModel => "create model",
            Self::FetchTrajectory => "fetch trajectory",
            Self::BindTrajectory => "bind trajectory",
            Self::CreateStructure => "create structure",
            Self::PolymerComponent => "polymer component",
            Self::Representations => "representations",
            Self::AuxiliaryComponents => "auxiliary components",
        };
        f.write_str(name)
    }
}

/// A failed structure load. Nothing from the load remains in the engine.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An engine call failed.
    #[error("Pipeline stage '{stage}' failed: {source}")]
    Stage {
        /// The failing stage.
        stage: PipelineStage,
        /// The engine error.
        #[source]
        source: EngineError,
    },

    /// The load was cancelled before the named stage.
    #[error("Pipeline cancelled before stage '{0}'")]
    Cancelled(PipelineStage),
}

impl PipelineError {
    /// The stage that failed or was not reached.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::Stage { stage, .. } | Self::Cancelled(stage) => *stage,
        }
    }

    /// Returns true if the load was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the session facade and the animation orchestrator.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Submission failed.
    #[error("Submission error: {0}")]
    Submit(#[from] SubmitError),

    /// The status channel failed.
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A backend call failed.
    #[error("Backend error: {0}")]
    Backend(#[from] CoreError),

    /// A structure failed to load.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// A direct engine call failed.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// The backend declared the job failed.
    #[error("Job {job_id} failed: {message}")]
    JobFailed {
        /// The failed job.
        job_id: String,
        /// Backend error text, verbatim.
        message: String,
    },

    /// A job succeeded with a payload of the wrong kind.
    #[error("Unexpected result payload for job {0}")]
    UnexpectedResult(String),

    /// The operation needs an open analysis result.
    #[error("No analysis result is open")]
    NoResult,

    /// The pocket id is not part of the open result.
    #[error("Pocket {0} not found")]
    UnknownPocket(u32),

    /// Uploaded structures cannot be compared.
    #[error("Comparison is not available for uploaded structures")]
    ComparisonUnavailable,

    /// The comparison query could not be built.
    #[error("Cannot build comparison query: {0}")]
    Query(String),

    /// The style does not apply to the category.
    #[error("Style {0} is not available for pockets")]
    InvalidStyle(cryptoshow_abstraction::Style),
}

impl SessionError {
    /// Text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::JobFailed { message, .. } => {
                format!("{}. If the problem persists, please report the issue.", message)
            }
            Self::Submit(SubmitError::Rejected(text)) => text.clone(),
            Self::Submit(SubmitError::UnexpectedStatus(status)) => {
                format!("The server refused the request (HTTP {}).", status)
            }
            Self::Submit(_) | Self::Channel(_) => UNKNOWN_ERROR.to_string(),
            Self::Pipeline(PipelineError::Cancelled(_)) => "Loading cancelled.".to_string(),
            Self::Pipeline(PipelineError::Stage { stage, source }) => {
                format!("Failed to load the structure ({}): {}", stage, source)
            }
            other => other.to_string(),
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
