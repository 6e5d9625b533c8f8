//! Structure resources and loaded structures.

use crate::representation::{Representation, RepresentationCategory};
use cryptoshow_abstraction::{Engine, EngineError, NodeRef, StructureFormat};
use cryptoshow_core::CandidateMetadata;
use tracing::{debug, warn};

/// Locators of a structure file and an optional coordinate trajectory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureResource {
    locator: String,
    trajectory: Option<String>,
}

impl StructureResource {
    /// A single-frame structure.
    pub fn new(locator: impl Into<String>) -> Self {
        Self { locator: locator.into(), trajectory: None }
    }

    /// A structure animated by a coordinate trajectory.
    pub fn with_trajectory(locator: impl Into<String>, trajectory: impl Into<String>) -> Self {
        Self { locator: locator.into(), trajectory: Some(trajectory.into()) }
    }

    /// The structure locator.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// The trajectory locator, if any.
    pub fn trajectory(&self) -> Option<&str> {
        self.trajectory.as_deref()
    }

    /// Format inferred from the locator extension.
    pub fn format(&self) -> StructureFormat {
        StructureFormat::from_locator(&self.locator)
    }

    /// Final path segment of the locator.
    pub fn name(&self) -> &str {
        self.locator.rsplit('/').next().unwrap_or(&self.locator)
    }
}

/// Whether a loaded structure is the analyzed one or a comparison candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum StructureRole {
    /// The structure the analysis ran on.
    Primary,
    /// A structure found by the comparison search.
    Candidate(CandidateMetadata),
}

/// A structure built in the engine together with its toggleable
/// representations.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedStructure {
    /// Primary or candidate.
    pub role: StructureRole,
    /// Name from the resource locator.
    pub name: String,
    /// Root data node of the structure file.
    pub data: NodeRef,
    /// Root data node of the trajectory file.
    pub trajectory_data: Option<NodeRef>,
    /// Structure node.
    pub structure: NodeRef,
    /// Polymer representations in creation order.
    pub polymer: Vec<Representation>,
    /// Pocket representations in creation order.
    pub pockets: Vec<Representation>,
    /// Selection components holding the pocket representations.
    pub pocket_components: Vec<NodeRef>,
}

impl LoadedStructure {
    /// Returns true for the primary structure.
    pub fn is_primary(&self) -> bool {
        matches!(self.role, StructureRole::Primary)
    }

    /// Candidate metadata, `None` for the primary.
    pub fn candidate(&self) -> Option<&CandidateMetadata> {
        match self.role {
            StructureRole::Candidate(ref metadata) => Some(metadata),
            StructureRole::Primary => None,
        }
    }

    /// Returns true if the structure was loaded with a trajectory.
    pub fn has_trajectory(&self) -> bool {
        self.trajectory_data.is_some()
    }

    /// Representations of a category.
    pub fn representations(&self, category: RepresentationCategory) -> &[Representation] {
        match category {
            RepresentationCategory::Polymer => &self.polymer,
            RepresentationCategory::Pocket => &self.pockets,
        }
    }

    /// Deletes every engine node of this structure.
    ///
    /// Nodes already gone are ignored; the first other error is returned
    /// after all roots were attempted.
    pub async fn release(self, engine: &dyn Engine) -> Result<(), EngineError> {
        debug!(name = %self.name, "Releasing structure");
        let mut first_error = None;
        for root in std::iter::once(&self.data).chain(self.trajectory_data.as_ref()) {
            match engine.delete(root).await {
                Ok(()) | Err(EngineError::UnknownNode(_)) => {}
                Err(e) => {
                    warn!(name = %self.name, node = %root, error = %e, "Failed to release node");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
