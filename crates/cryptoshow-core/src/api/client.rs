//! HTTP client for the analysis backend.

use super::types::{ComparisonResult, JobRequest};
use crate::channel::{JobChannel, PollingSource, WebSocketSource};
use crate::config::{SessionConfig, derive_ws_base};
use crate::error::{ChannelError, ChannelResult, CoreError, Result, SubmitError, SubmitResult};
use crate::job::{Job, JobKind, StatusUpdate, decode_status_message};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Body of a submission response.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the CryptoShow REST API and its AHoJ proxy.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// HTTP client.
    client: reqwest::Client,
    /// API base URL without trailing slash.
    base_url: String,
    /// WebSocket origin for status sockets.
    ws_base: Option<String>,
    /// Comparison poll interval.
    poll_interval: Duration,
    /// Close tokens of the channels opened through this client, by job id.
    open_channels: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl ApiClient {
    /// Creates a client for the given API base URL.
    ///
    /// The WebSocket origin is derived from the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let ws_base = derive_ws_base(&base_url).ok();
        Self {
            client: reqwest::Client::new(),
            base_url,
            ws_base,
            poll_interval: Duration::from_millis(5000),
            open_channels: Arc::default(),
        }
    }

    /// Creates a client from a validated session configuration.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.api_url.clone())
            .with_ws_base(config.ws_base()?)
            .with_poll_interval(config.poll_interval()))
    }

    /// Overrides the WebSocket origin.
    #[must_use]
    pub fn with_ws_base(mut self, ws_base: impl Into<String>) -> Self {
        self.ws_base = Some(ws_base.into().trim_end_matches('/').to_string());
        self
    }

    /// Overrides the comparison poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of a server-side file: `{base}/file/{file_hash}/{file_name}`.
    pub fn file_url(&self, file_hash: &str, file_name: &str) -> String {
        self.url(&format!("/file/{}/{}", file_hash, file_name))
    }

    /// Status socket URL for a job.
    pub fn status_socket_url(&self, job_id: &str) -> Option<String> {
        self.ws_base.as_ref().map(|base| format!("{}/ws/task-status/{}", base, job_id))
    }

    /// Submits a job.
    ///
    /// # Errors
    /// Network failures, unexpected statuses, malformed bodies, and
    /// [`SubmitError::Rejected`] when the backend returns an `error`.
    pub async fn submit(&self, request: &JobRequest) -> SubmitResult<Job> {
        let kind = request.kind();

        let response = match request {
            JobRequest::AnalyzePdb { pdb_id } => {
                self.client
                    .post(self.url("/calculate"))
                    .json(&serde_json::json!({ "pdb": pdb_id }))
                    .send()
                    .await?
            }
            JobRequest::AnalyzeUpload { file_name, contents } => {
                let part = Part::bytes(contents.clone()).file_name(file_name.clone());
                self.client
                    .post(self.url("/calculate-custom"))
                    .multipart(Form::new().part("file", part))
                    .send()
                    .await?
            }
            JobRequest::Compare { configuration, .. } => {
                self.client
                    .post(self.url("/proxy/ahoj/job"))
                    .header("Accept", "application/json")
                    .json(configuration)
                    .send()
                    .await?
            }
            JobRequest::Animate { file_hash, structure_file, target_chains } => {
                self.client
                    .get(self.url(&format!(
                        "/animate/{}/{}/{}",
                        file_hash,
                        structure_file,
                        target_chains.join(",")
                    )))
                    .send()
                    .await?
            }
        };

        let status = response.status();
        let carries_body = status.is_success()
            || (kind == JobKind::Analysis
                && matches!(
                    status,
                    StatusCode::BAD_REQUEST
                        | StatusCode::NOT_FOUND
                        | StatusCode::INTERNAL_SERVER_ERROR
                ));
        if !carries_body {
            return Err(SubmitError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: SubmitResponse =
            serde_json::from_str(&body).map_err(|e| SubmitError::Malformed(e.to_string()))?;

        if let Some(error) = parsed.error {
            warn!(kind = %kind, status = status.as_u16(), error = %error, "Job rejected");
            return Err(SubmitError::Rejected(error));
        }

        let job_id = parsed.task_id.or(parsed.job_id).ok_or_else(|| {
            SubmitError::Malformed("response carries neither task_id nor job_id".to_string())
        })?;

        let mut job = Job::new(job_id, kind);
        if let JobRequest::Compare { file_hash, .. } | JobRequest::Animate { file_hash, .. } =
            request
        {
            job = job.with_file_hash(file_hash.clone());
        }

        info!(job_id = %job.job_id, kind = %kind, "Job submitted");
        Ok(job)
    }

    /// Opens a status channel: polling for comparison jobs, WebSocket otherwise.
    ///
    /// # Errors
    /// `AlreadyOpen` while an earlier channel for the same job (opened through
    /// this client or one of its clones) is neither closed nor finished.
    pub fn open_channel(&self, job: &Job) -> ChannelResult<JobChannel> {
        let mut open = self.open_channels.lock().unwrap_or_else(PoisonError::into_inner);
        open.retain(|_, closed| !closed.is_cancelled());
        if open.contains_key(&job.job_id) {
            return Err(ChannelError::AlreadyOpen(job.job_id.clone()));
        }

        let channel = match job.kind {
            JobKind::Comparison => {
                let file_hash = job.file_hash.clone().ok_or_else(|| {
                    ChannelError::MissingContext(job.job_id.clone(), "no file hash".to_string())
                })?;
                let source =
                    PollingSource::new(self.clone(), file_hash, &job.job_id, self.poll_interval);
                JobChannel::open(job, Box::new(source))
            }
            JobKind::Analysis | JobKind::Animation => {
                let url = self.status_socket_url(&job.job_id).ok_or_else(|| {
                    ChannelError::MissingContext(
                        job.job_id.clone(),
                        format!("no WebSocket origin for {}", self.base_url),
                    )
                })?;
                JobChannel::open(job, Box::new(WebSocketSource::new(url, job.kind)))
            }
        };
        open.insert(job.job_id.clone(), channel.closed_token());
        Ok(channel)
    }

    /// One-shot status query: `GET /task-status/{job_id}`.
    pub async fn task_status(&self, kind: JobKind, job_id: &str) -> Result<StatusUpdate> {
        let url = self.url(&format!("/task-status/{}", job_id));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() && response.status() != StatusCode::NOT_FOUND {
            return Err(CoreError::UnexpectedStatus { url, status: response.status().as_u16() });
        }
        let body = response.text().await?;
        Ok(decode_status_message(kind, &body))
    }

    /// Makes the AHoJ proxy fetch a remote structure into the job directory.
    ///
    /// Only network failures are errors; a non-success status is logged.
    pub async fn prime_proxy(&self, file_hash: &str, remote_locator: &str) -> Result<()> {
        let url = self.url(&format!("/proxy/ahoj/{}/{}", file_hash, remote_locator));
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            debug!(url = %url, "Proxy primed");
        } else {
            warn!(url = %url, status = response.status().as_u16(), "Proxy prefetch failed");
        }
        Ok(())
    }

    /// Current state of an AHoJ job.
    pub async fn comparison_status(
        &self,
        file_hash: &str,
        job_id: &str,
    ) -> Result<ComparisonResult> {
        let url = self.url(&format!("/proxy/ahoj/{}/api/job/{}", file_hash, job_id));
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(CoreError::UnexpectedStatus { url, status: response.status().as_u16() });
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}
