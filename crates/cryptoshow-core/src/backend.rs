//! The backend seam used by session orchestration.

use crate::api::{ApiClient, JobRequest};
use crate::channel::JobChannel;
use crate::error::{ChannelResult, Result, SubmitResult};
use crate::job::Job;
use async_trait::async_trait;

/// Operations the session needs from the analysis backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Submits a job.
    async fn submit(&self, request: &JobRequest) -> SubmitResult<Job>;

    /// Opens the status channel for a submitted job.
    fn open_channel(&self, job: &Job) -> ChannelResult<JobChannel>;

    /// Makes the comparison proxy fetch a remote structure.
    async fn prime_proxy(&self, file_hash: &str, remote_locator: &str) -> Result<()>;

    /// Locator of a server-side file.
    fn file_url(&self, file_hash: &str, file_name: &str) -> String;
}

#[async_trait]
impl Backend for ApiClient {
    async fn submit(&self, request: &JobRequest) -> SubmitResult<Job> {
        Self::submit(self, request).await
    }

    fn open_channel(&self, job: &Job) -> ChannelResult<JobChannel> {
        Self::open_channel(self, job)
    }

    async fn prime_proxy(&self, file_hash: &str, remote_locator: &str) -> Result<()> {
        Self::prime_proxy(self, file_hash, remote_locator).await
    }

    fn file_url(&self, file_hash: &str, file_name: &str) -> String {
        Self::file_url(self, file_hash, file_name)
    }
}
