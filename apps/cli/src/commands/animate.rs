//! Animate command implementation.

use super::{Context, ordered_candidates, spawn_progress, user_error};
use colored::Colorize;
use cryptoshow_core::{CandidateSortField, SessionConfig};
use cryptoshow_orchestrator::AnimationOutcome;

/// Animates the transition toward one candidate of a finished comparison.
pub async fn execute(
    config: &SessionConfig,
    task_id: &str,
    comparison_job: &str,
    index: usize,
    sort: Option<CandidateSortField>,
    descending: bool,
) -> anyhow::Result<()> {
    let context = Context::connect(config)?;
    let result = context.open(task_id).await?;

    let comparison = context.client.comparison_status(&result.file_hash, comparison_job).await?;
    if !comparison.done {
        anyhow::bail!("Comparison {} is still running", comparison_job);
    }
    let candidates = ordered_candidates(&comparison, sort, descending);
    let Some(candidate) = candidates.get(index) else {
        anyhow::bail!("Candidate {} out of range ({} candidates)", index, candidates.len());
    };

    let progress = spawn_progress(context.session.subscribe());
    let animated = context.session.animate(candidate).await;
    progress.abort();

    match animated.map_err(user_error)? {
        AnimationOutcome::Inserted => {
            println!("{} Animating {} at {} fps", "✓".green(), candidate.pdb_id.bold(), config.animation_fps);
            for summary in context.session.scene().summaries().await {
                println!("  {} opacity {:.2}", summary.name, summary.opacity);
            }
        }
        AnimationOutcome::AlreadyLoaded => {
            println!("{} {} is already in the scene", "ℹ".blue(), candidate.pdb_id);
        }
        AnimationOutcome::Busy => println!("{}", "Another animation is in progress".yellow()),
        AnimationOutcome::Cancelled => println!("{}", "Animation cancelled".yellow()),
    }
    Ok(())
}
