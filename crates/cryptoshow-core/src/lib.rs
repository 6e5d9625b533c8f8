//! CryptoShow core library.
//!
//! This crate provides configuration, the backend API client and wire
//! types, the job model, and job status channels.

pub mod api;
pub mod backend;
pub mod channel;
pub mod config;
pub mod error;
pub mod job;

pub use api::{
    AnalysisResult, AnimationResult, ApiClient, CandidateKind, CandidateMetadata,
    CandidateSortField, ComparisonResult, JobRequest, Pocket, SortDirection, sort_candidates,
};
pub use backend::Backend;
pub use channel::{JobChannel, PollingSource, ScriptedSource, StatusSource, WebSocketSource};
pub use config::{ConfigError, SessionConfig};
pub use error::{ChannelError, ChannelResult, CoreError, Result, SubmitError, SubmitResult};
pub use job::{Job, JobKind, JobResult, JobStatus, StatusUpdate, UNKNOWN_ERROR, decode_status_message};
