//! Compare command implementation.

use super::{Context, ordered_candidates, spawn_progress, user_error};
use colored::Colorize;
use cryptoshow_core::{CandidateMetadata, CandidateSortField, SessionConfig};
use cryptoshow_orchestrator::SessionError;

/// Runs an apo/holo search for a pocket and lists the candidates.
pub async fn execute(
    config: &SessionConfig,
    task_id: &str,
    pocket: u32,
    query: Option<String>,
    sort: Option<CandidateSortField>,
    descending: bool,
    json: bool,
) -> anyhow::Result<()> {
    let context = Context::connect(config)?;
    context.open(task_id).await?;

    let progress = if json { None } else { Some(spawn_progress(context.session.subscribe())) };
    let compared = context.session.compare(pocket, query).await;
    if let Some(progress) = progress {
        progress.abort();
    }
    let comparison = match compared {
        Ok(comparison) => comparison,
        // The headless engine has no coordinates to derive a query from
        Err(SessionError::Query(message)) => {
            anyhow::bail!("{}; pass --query \"<structure> <chain> <residue> <number>\"", message)
        }
        Err(e) => return Err(user_error(e)),
    };

    let candidates = ordered_candidates(&comparison.result, sort, descending);
    if json {
        let output = serde_json::json!({ "job_id": comparison.job_id, "candidates": candidates });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    if candidates.is_empty() {
        println!("{}", "No related structures found".yellow());
        return Ok(());
    }
    println!(
        "{}",
        format!("{:>4}  {:<8} {:<6} {:>7} {:>7}  {:<10} {}", "#", "PDB", "KIND", "RMSD", "SASA", "CHAINS", "LIGANDS")
            .bold()
    );
    for (index, candidate) in candidates.iter().enumerate() {
        print_row(index, candidate);
    }
    println!();
    println!("Animate with: cshow animate {} --job {} --candidate <#>", task_id, comparison.job_id);
    Ok(())
}

fn print_row(index: usize, candidate: &CandidateMetadata) {
    let kind = candidate.kind.map(|k| k.as_str()).unwrap_or("-");
    let rmsd = candidate.rmsd.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
    let sasa = candidate.sasa.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
    println!(
        "{:>4}  {} {:<6} {:>7} {:>7}  {:<10} {}",
        index,
        format!("{:<8}", candidate.pdb_id).cyan(),
        kind,
        rmsd,
        sasa,
        candidate.chains.join(","),
        candidate.ligands.join(",")
    );
}
