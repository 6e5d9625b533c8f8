//! Backend API: wire types and the HTTP client.

mod client;
mod types;

pub use client::ApiClient;
pub use types::{
    AnalysisResult, AnimationResult, CandidateKind, CandidateMetadata, CandidateSortField,
    ComparisonQuery, ComparisonResult, JobRequest, NO_POCKET, Pocket, ProgressInfo, SortDirection,
    sort_candidates,
};
