//! View command implementation.

use super::{Context, print_pockets, user_error};
use colored::Colorize;
use cryptoshow_abstraction::Style;
use cryptoshow_core::SessionConfig;
use cryptoshow_orchestrator::PocketSelection;

/// Opens a finished analysis, applies styles and prints the scene.
pub async fn execute(
    config: &SessionConfig,
    task_id: &str,
    polymer_style: Option<Style>,
    pocket_style: Option<Style>,
    pocket: Option<u32>,
) -> anyhow::Result<()> {
    let context = Context::connect(config)?;
    let result = context.open(task_id).await?;
    let session = &context.session;

    if let Some(style) = polymer_style {
        session.set_polymer_style(Some(style)).await.map_err(user_error)?;
    }
    if let Some(style) = pocket_style {
        session.set_pocket_style(Some(style)).await.map_err(user_error)?;
    }

    let selection = pocket.map_or(PocketSelection::All, PocketSelection::Id);
    if !result.pockets.is_empty() || pocket.is_some() {
        session.show_pockets(selection).await.map_err(user_error)?;
    }

    print_pockets(&result);

    println!();
    println!("{}", "Scene:".bold());
    for summary in session.scene().summaries().await {
        let role = if summary.primary { "primary".green() } else { "candidate".yellow() };
        println!(
            "  {} [{}] {} polymer, {} pocket representations, opacity {:.2}",
            summary.name.bold(),
            role,
            summary.polymer,
            summary.pockets,
            summary.opacity
        );
    }

    let ids: Vec<u32> = match pocket {
        Some(id) => vec![id],
        None => result.pockets.iter().map(|p| p.pocket_id).collect(),
    };
    if !ids.is_empty() {
        println!();
        println!("{}", "PyMOL selections:".bold());
        for id in ids {
            println!("  {}", session.pymol_selection(id).map_err(user_error)?);
        }
    }
    Ok(())
}
