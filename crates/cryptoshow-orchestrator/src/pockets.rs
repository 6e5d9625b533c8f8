//! Pocket attachment and hover labels.

use crate::representation::Representation;
use crate::structure::LoadedStructure;
use cryptoshow_abstraction::{
    AtomLocus, AtomSelection, ColorTheme, Engine, EngineError, EngineResult, LabelProvider,
    RepresentationSpec, ResidueKey, Style,
};
use cryptoshow_core::AnalysisResult;
use cryptoshow_core::api::{NO_POCKET, Pocket};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pocket colors, indexed by `pocket_id % len`.
pub const POCKET_PALETTE: [u32; 5] = [0xff0000, 0xff8000, 0xffff00, 0x80ff00, 0x00ff00];

/// Styles created per pocket, in creation order.
pub const POCKET_STYLES: [Style; 3] = [Style::MolecularSurface, Style::BallAndStick, Style::Cartoon];

/// Label provider name registered with the engine.
pub const POCKET_LABEL_PROVIDER: &str = "cryptoshow-pockets";

/// Which pockets to attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PocketSelection {
    /// A single pocket.
    Id(u32),
    /// Every pocket of the result.
    All,
}

impl PocketSelection {
    fn includes(self, pocket_id: u32) -> bool {
        match self {
            Self::Id(id) => id == pocket_id,
            Self::All => true,
        }
    }
}

/// Color for a pocket id.
pub fn pocket_color(pocket_id: u32) -> u32 {
    POCKET_PALETTE[pocket_id as usize % POCKET_PALETTE.len()]
}

/// Parses a pocket's residue ids, skipping malformed entries.
pub fn pocket_residues(pocket: &Pocket) -> Vec<ResidueKey> {
    pocket
        .residue_ids
        .iter()
        .filter_map(|id| match id.parse::<ResidueKey>() {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(pocket_id = pocket.pocket_id, residue = %id, error = %e, "Skipping residue");
                None
            }
        })
        .collect()
}

/// Replaces the pocket representations of `loaded`.
///
/// Previous pocket components (and everything under them) are deleted
/// first, so repeated calls never accumulate handles. New representations
/// are visible iff their style equals `visible_style`.
///
/// # Returns
/// The representations created by this call.
pub async fn attach_pockets(
    engine: &dyn Engine,
    loaded: &mut LoadedStructure,
    pockets: &[Pocket],
    which: PocketSelection,
    visible_style: Option<Style>,
) -> EngineResult<Vec<Representation>> {
    for component in loaded.pocket_components.drain(..) {
        match engine.delete(&component).await {
            Ok(()) | Err(EngineError::UnknownNode(_)) => {}
            Err(e) => return Err(e),
        }
    }
    loaded.pockets.clear();

    for pocket in pockets.iter().filter(|p| which.includes(p.pocket_id)) {
        let residues = pocket_residues(pocket);
        if residues.is_empty() {
            warn!(pocket_id = pocket.pocket_id, "Pocket has no valid residues");
            continue;
        }

        let label = format!("Pocket {}", pocket.pocket_id);
        let Some(component) = engine
            .create_selection_component(&loaded.structure, &AtomSelection::Residues(residues), &label)
            .await?
        else {
            warn!(pocket_id = pocket.pocket_id, "Pocket selection matched no atoms");
            continue;
        };
        loaded.pocket_components.push(component.clone());

        let color = ColorTheme::Uniform(pocket_color(pocket.pocket_id));
        for style in POCKET_STYLES {
            let handle =
                engine.add_representation(&component, &RepresentationSpec::new(style, color)).await?;
            let visible = visible_style == Some(style);
            engine.set_visibility(&handle, visible)?;

            let mut representation = Representation::pocket(pocket.pocket_id, style, handle);
            representation.visible = visible;
            loaded.pockets.push(representation);
        }
        debug!(pocket_id = pocket.pocket_id, structure = %loaded.name, "Pocket attached");
    }

    Ok(loaded.pockets.clone())
}

/// Hover labels naming the pocket and score of the residue under the cursor.
pub struct PocketLabelProvider {
    result: Arc<AnalysisResult>,
}

impl PocketLabelProvider {
    /// Creates a provider over an analysis result.
    pub fn new(result: Arc<AnalysisResult>) -> Self {
        Self { result }
    }
}

impl LabelProvider for PocketLabelProvider {
    fn label(&self, locus: &AtomLocus) -> Option<String> {
        let (cluster, score) = self.result.residue_annotation(&locus.residue.to_string())?;
        let pocket = if cluster == NO_POCKET { "none".to_string() } else { cluster.to_string() };
        Some(format!("Pocket: {}, Score: {:.3}", pocket, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_wraps() {
        assert_eq!(pocket_color(0), 0xff0000);
        assert_eq!(pocket_color(1), 0xff8000);
        assert_eq!(pocket_color(5), 0xff0000);
        assert_eq!(pocket_color(7), 0xffff00);
    }

    #[test]
    fn test_pocket_residues_skips_malformed() {
        let pocket = Pocket {
            pocket_id: 2,
            residue_ids: vec!["A_12".to_string(), "garbage".to_string(), "B_7".to_string()],
            ..Pocket::default()
        };
        assert_eq!(pocket_residues(&pocket), vec![ResidueKey::new("A", 12), ResidueKey::new("B", 7)]);
    }

    #[test]
    fn test_label_provider() {
        let result = AnalysisResult {
            residue_ids: vec!["A_1".to_string(), "A_2".to_string()],
            clusters: vec![NO_POCKET, 3],
            prediction: vec![0.1234, 0.87654],
            ..AnalysisResult::default()
        };
        let provider = PocketLabelProvider::new(Arc::new(result));

        let in_pocket = AtomLocus { residue: ResidueKey::new("A", 2), atom_name: None };
        assert_eq!(provider.label(&in_pocket).as_deref(), Some("Pocket: 3, Score: 0.877"));

        let outside = AtomLocus { residue: ResidueKey::new("A", 1), atom_name: None };
        assert_eq!(provider.label(&outside).as_deref(), Some("Pocket: none, Score: 0.123"));

        let absent = AtomLocus { residue: ResidueKey::new("C", 9), atom_name: None };
        assert!(provider.label(&absent).is_none());
    }

    #[test]
    fn test_selection_includes() {
        assert!(PocketSelection::All.includes(9));
        assert!(PocketSelection::Id(2).includes(2));
        assert!(!PocketSelection::Id(2).includes(3));
    }
}
