//! Command implementations for the CryptoShow CLI.

pub mod animate;
pub mod compare;
pub mod submit;
pub mod view;

use colored::Colorize;
use cryptoshow_core::{
    AnalysisResult, ApiClient, CandidateMetadata, CandidateSortField, JobKind, JobResult,
    JobStatus, SessionConfig, SortDirection, sort_candidates,
};
use cryptoshow_engines::HeadlessEngine;
use cryptoshow_orchestrator::{Session, SessionError, SessionEvent};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// A session over the configured backend and a headless engine.
pub struct Context {
    pub client: ApiClient,
    pub session: Session,
}

impl Context {
    pub fn connect(config: &SessionConfig) -> anyhow::Result<Self> {
        let client = ApiClient::from_config(config)?;
        let engine = Arc::new(HeadlessEngine::new().with_http(reqwest::Client::new()));
        let session = Session::new(engine, Arc::new(client.clone()), config);
        Ok(Self { client, session })
    }

    /// Fetches a finished analysis and opens it in the session.
    pub async fn open(&self, task_id: &str) -> anyhow::Result<Arc<AnalysisResult>> {
        let update = self.client.task_status(JobKind::Analysis, task_id).await?;
        let result = match (update.status, update.result) {
            (JobStatus::Success, Some(JobResult::Analysis(result))) => *result,
            (JobStatus::Failure, _) => anyhow::bail!(
                "Task {} failed: {}",
                task_id,
                update.message.unwrap_or_default()
            ),
            (status, _) => anyhow::bail!("Task {} is not finished ({})", task_id, status),
        };
        self.session.open_result(result).await.map_err(user_error)
    }
}

/// Converts a session error into its user-facing text.
pub fn user_error(error: SessionError) -> anyhow::Error {
    anyhow::anyhow!(error.user_message())
}

/// Prints job progress while a command runs.
pub fn spawn_progress(mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::JobSubmitted { job_id, kind }) => {
                    println!("{} {} job {}", "→".cyan(), kind, job_id.bold());
                }
                Ok(SessionEvent::JobStatus { status, message, .. }) => {
                    let text = message.unwrap_or_default();
                    println!("  {} {}", status.to_string().dimmed(), text.dimmed());
                }
                Ok(SessionEvent::StructureLoaded { name, primary }) => {
                    let role = if primary { "primary" } else { "candidate" };
                    println!("{} Loaded {} ({})", "✓".green(), name.bold(), role);
                }
                Ok(SessionEvent::AnimationPhaseChanged { phase }) => {
                    println!("  {}", format!("animation: {:?}", phase).dimmed());
                }
                Ok(SessionEvent::SceneChanged { .. } | SessionEvent::Error { .. }) => {}
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Prints the pockets of a result.
pub fn print_pockets(result: &AnalysisResult) {
    println!("{}", "Pockets:".bold());
    if result.pockets.is_empty() {
        println!("  {}", "No pockets predicted".yellow());
        return;
    }
    for pocket in &result.pockets {
        println!(
            "  {:>3}  score {}  {} residues",
            pocket.pocket_id.to_string().cyan(),
            format!("{:.3}", pocket.average_prediction).green(),
            pocket.residue_ids.len()
        );
    }
}

/// Candidates of a comparison in listing order.
pub fn ordered_candidates(
    comparison: &cryptoshow_core::ComparisonResult,
    sort: Option<CandidateSortField>,
    descending: bool,
) -> Vec<CandidateMetadata> {
    let mut candidates = comparison.candidates();
    if let Some(field) = sort {
        let direction = if descending { SortDirection::Descending } else { SortDirection::Ascending };
        sort_candidates(&mut candidates, field, direction);
    }
    candidates
}
