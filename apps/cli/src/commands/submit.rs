//! Submit command implementation.

use super::{Context, print_pockets, spawn_progress, user_error};
use anyhow::Context as _;
use colored::Colorize;
use cryptoshow_core::{JobRequest, SessionConfig};
use std::path::PathBuf;

/// Submits a structure, follows the analysis and prints its pockets.
pub async fn execute(
    config: &SessionConfig,
    pdb_id: Option<String>,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let request = match (pdb_id, file) {
        (_, Some(path)) => {
            let contents = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "structure.pdb".to_string());
            JobRequest::AnalyzeUpload { file_name, contents }
        }
        (Some(pdb_id), None) => JobRequest::AnalyzePdb { pdb_id: pdb_id.trim().to_uppercase() },
        (None, None) => anyhow::bail!("Either a PDB ID or --file is required"),
    };

    let context = Context::connect(config)?;
    let progress = spawn_progress(context.session.subscribe());
    let analyzed = context.session.analyze(&request).await;
    progress.abort();
    let result = analyzed.map_err(user_error)?;

    println!();
    println!("{} {}", "Structure:".bold(), result.structure_name);
    println!("{} {}", "File hash:".bold(), result.file_hash);
    print_pockets(&result);
    Ok(())
}
