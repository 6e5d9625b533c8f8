//! Representation handles and the visibility/transparency controller.
//!
//! Switching a style only flips visibility flags; geometry is built once by
//! the pipeline (or pocket attachment) and reused.

use cryptoshow_abstraction::{AtomSelection, Engine, EngineError, EngineResult, NodeRef, Style};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// What part of a structure a representation draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepresentationCategory {
    /// Whole polymer.
    Polymer,
    /// One predicted pocket.
    Pocket,
}

/// A transparency layer decorating a representation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransparencyOverlay {
    /// Engine handle of the layer.
    pub handle: NodeRef,
    /// Layer opacity.
    pub opacity: f32,
}

/// A toggleable representation owned by a loaded structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Representation {
    /// Polymer or pocket.
    pub category: RepresentationCategory,
    /// Visual style.
    pub style: Style,
    /// Engine handle.
    pub handle: NodeRef,
    /// Current transparency layer, at most one.
    pub overlay: Option<TransparencyOverlay>,
    /// Pocket the representation belongs to.
    pub pocket_id: Option<u32>,
    /// Last visibility flag sent to the engine.
    pub visible: bool,
}

impl Representation {
    /// A visible polymer representation.
    pub fn polymer(style: Style, handle: NodeRef) -> Self {
        Self {
            category: RepresentationCategory::Polymer,
            style,
            handle,
            overlay: None,
            pocket_id: None,
            visible: true,
        }
    }

    /// A visible pocket representation.
    pub fn pocket(pocket_id: u32, style: Style, handle: NodeRef) -> Self {
        Self {
            category: RepresentationCategory::Pocket,
            style,
            handle,
            overlay: None,
            pocket_id: Some(pocket_id),
            visible: true,
        }
    }

    /// Opacity currently applied, 1.0 without a layer.
    pub fn opacity(&self) -> f32 {
        self.overlay.as_ref().map_or(1.0, |o| o.opacity)
    }
}

/// Style choices applied to every structure after each scene change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    /// Visible polymer style; `None` hides the polymer.
    pub polymer_style: Option<Style>,
    /// Visible pocket style; `None` hides pockets.
    pub pocket_style: Option<Style>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self { polymer_style: Some(Style::Cartoon), pocket_style: Some(Style::MolecularSurface) }
    }
}

/// Makes exactly the representations of `style` visible; `None` hides all.
///
/// Visibility flags only: no geometry is rebuilt.
pub fn set_visible_style(
    engine: &dyn Engine,
    representations: &mut [Representation],
    style: Option<Style>,
) -> EngineResult<()> {
    for representation in representations.iter_mut() {
        let visible = style == Some(representation.style);
        engine.set_visibility(&representation.handle, visible)?;
        representation.visible = visible;
    }
    Ok(())
}

/// Sets the opacity of every representation in the set.
///
/// Any previous layer is deleted first. Opacity 1.0 (or above) leaves no
/// layer at all. Base visibility is never touched.
///
/// # Arguments
/// * `engine` - The engine owning the handles
/// * `representations` - Representations to decorate
/// * `structure` - Structure the whole-structure selection is bound to
/// * `opacity` - Target opacity
pub async fn set_transparency(
    engine: &dyn Engine,
    representations: &mut [Representation],
    structure: &NodeRef,
    opacity: f32,
) -> EngineResult<()> {
    for representation in representations.iter_mut() {
        if let Some(previous) = representation.overlay.take() {
            match engine.delete(&previous.handle).await {
                Ok(()) | Err(EngineError::UnknownNode(_)) => {}
                Err(e) => {
                    warn!(handle = %previous.handle, error = %e, "Failed to delete transparency layer");
                    return Err(e);
                }
            }
        }

        if opacity >= 1.0 {
            continue;
        }

        let handle = engine
            .apply_transparency(&representation.handle, structure, &AtomSelection::All, opacity)
            .await?;
        debug!(representation = %representation.handle, opacity, "Transparency applied");
        representation.overlay = Some(TransparencyOverlay { handle, opacity });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_state_defaults() {
        let view = ViewState::default();
        assert_eq!(view.polymer_style, Some(Style::Cartoon));
        assert_eq!(view.pocket_style, Some(Style::MolecularSurface));
    }

    #[test]
    fn test_opacity_without_overlay() {
        let rep = Representation::polymer(Style::Cartoon, NodeRef::new("r1"));
        assert!((rep.opacity() - 1.0).abs() < f32::EPSILON);
        assert_eq!(rep.category, RepresentationCategory::Polymer);
        assert!(rep.pocket_id.is_none());
    }

    #[test]
    fn test_pocket_representation_tag() {
        let rep = Representation::pocket(4, Style::BallAndStick, NodeRef::new("r2"));
        assert_eq!(rep.pocket_id, Some(4));
        assert_eq!(rep.category, RepresentationCategory::Pocket);
    }
}
