//! HTTP polling transport for comparison jobs.

use super::StatusSource;
use crate::api::ApiClient;
use crate::error::ChannelResult;
use crate::job::{JobResult, StatusUpdate};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Progress text reported while the search is running.
const SEARCHING: &str = "Searching for related structures";

/// Polls `/proxy/ahoj/{file_hash}/api/job/{job_id}` until `done` is true.
///
/// A failed poll is logged and polling continues.
pub struct PollingSource {
    client: ApiClient,
    file_hash: String,
    job_id: String,
    interval: Duration,
}

impl PollingSource {
    /// Creates a polling source; the first poll happens after one interval.
    pub fn new(
        client: ApiClient,
        file_hash: impl Into<String>,
        job_id: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self { client, file_hash: file_hash.into(), job_id: job_id.into(), interval }
    }
}

#[async_trait]
impl StatusSource for PollingSource {
    async fn next_update(&mut self) -> ChannelResult<Option<StatusUpdate>> {
        loop {
            tokio::time::sleep(self.interval).await;

            match self.client.comparison_status(&self.file_hash, &self.job_id).await {
                Ok(response) if response.done => {
                    debug!(job_id = %self.job_id, "Comparison job done");
                    return Ok(Some(StatusUpdate::success(JobResult::Comparison(response))));
                }
                Ok(_) => return Ok(Some(StatusUpdate::progress(SEARCHING))),
                Err(e) => {
                    warn!(job_id = %self.job_id, error = %e, "Failed to fetch comparison job status");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use mockito::Server;

    #[tokio::test]
    async fn test_running_job_is_progress() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/proxy/ahoj/hash1/api/job/j1")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"done":false}"#)
            .create();

        let client = ApiClient::new(server.url());
        let mut source = PollingSource::new(client, "hash1", "j1", Duration::from_millis(5));

        let update = source.next_update().await.unwrap().unwrap();
        assert_eq!(update.status, JobStatus::Progress);
        mock.assert();
    }

    #[tokio::test]
    async fn test_done_job_is_success_with_candidates() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/proxy/ahoj/hash1/api/job/j1")
            .with_status(200)
            .with_body(
                r#"{"done":true,"queries":[{"found_apo":[{"pdb_id":"1ABC","structure_file":"1abc.cif","chains":["A"],"target_chains":["A"]}],"found_holo":[],"found_alphafold":[]}]}"#,
            )
            .create();

        let client = ApiClient::new(server.url());
        let mut source = PollingSource::new(client, "hash1", "j1", Duration::from_millis(5));

        let update = source.next_update().await.unwrap().unwrap();
        assert_eq!(update.status, JobStatus::Success);
        match update.result {
            Some(JobResult::Comparison(result)) => {
                assert_eq!(result.candidates()[0].pdb_id, "1ABC");
            }
            other => panic!("Expected comparison result, got {:?}", other),
        }
    }
}
