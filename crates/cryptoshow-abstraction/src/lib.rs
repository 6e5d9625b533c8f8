//! Rendering engine abstraction for CryptoShow.
//!
//! This module defines the capability surface the session core needs from a
//! 3D molecular rendering engine. The engine is opaque: it accepts
//! scene-building commands and hands back [`NodeRef`]s into its state tree.
//! Nothing in the session core holds engine state implicitly; every component
//! receives an `Arc<dyn Engine>` explicitly.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Represents an error reported by the rendering engine.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineError {
    /// A remote asset could not be downloaded.
    #[error("Download Error for {url}: {reason}")]
    Download {
        /// The locator that failed.
        url: String,
        /// Why the download failed.
        reason: String,
    },

    /// A payload could not be parsed into a trajectory or coordinate set.
    #[error("Parse Error: {0}")]
    Parse(String),

    /// A model, structure, component or representation could not be built.
    #[error("Build Error: {0}")]
    Build(String),

    /// The referenced node does not exist in the state tree.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeRef),

    /// Other unexpected errors.
    #[error("Other Engine Error: {0}")]
    Other(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Opaque reference to a node in the engine's state tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef(pub String);

impl NodeRef {
    /// Wraps an engine-issued reference string.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the raw reference string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Structure file formats the engine can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureFormat {
    /// PDBx/mmCIF.
    Mmcif,
    /// Legacy PDB.
    Pdb,
}

impl StructureFormat {
    /// Infers the format from a locator: `.cif` is mmCIF, anything else is PDB.
    #[must_use]
    pub fn from_locator(locator: &str) -> Self {
        if locator.to_ascii_lowercase().ends_with("cif") {
            Self::Mmcif
        } else {
            Self::Pdb
        }
    }

    /// Returns the engine-facing format name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mmcif => "mmcif",
            Self::Pdb => "pdb",
        }
    }
}

impl fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static components the engine can derive from a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// Protein and nucleic-acid chains, excluding solvent, ions and ligands.
    Polymer,
    /// Monoatomic ions.
    Ion,
    /// Small-molecule ligands.
    Ligand,
    /// Lipids.
    Lipid,
    /// Branched entities (carbohydrates).
    Branched,
    /// Non-standard residues.
    NonStandard,
    /// Coarse-grained groups.
    Coarse,
}

impl ComponentKind {
    /// Non-polymer groups that are always drawn as ball-and-stick.
    pub const AUXILIARY: [Self; 6] =
        [Self::Ion, Self::Ligand, Self::Lipid, Self::Branched, Self::NonStandard, Self::Coarse];

    /// Returns the engine-facing component name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Polymer => "polymer",
            Self::Ion => "ion",
            Self::Ligand => "ligand",
            Self::Lipid => "lipid",
            Self::Branched => "branched",
            Self::NonStandard => "non-standard",
            Self::Coarse => "coarse",
        }
    }
}

/// Visual style of a representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Style {
    /// Secondary-structure cartoon.
    Cartoon,
    /// Atoms as spheres, bonds as sticks.
    BallAndStick,
    /// Solvent-excluded molecular surface.
    MolecularSurface,
    /// C-alpha trace.
    Backbone,
}

impl Style {
    /// Returns the engine-facing representation type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cartoon => "cartoon",
            Self::BallAndStick => "ball-and-stick",
            Self::MolecularSurface => "molecular-surface",
            Self::Backbone => "backbone",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cartoon" => Ok(Self::Cartoon),
            "ball-and-stick" | "ball_and_stick" | "bas" => Ok(Self::BallAndStick),
            "molecular-surface" | "surface" => Ok(Self::MolecularSurface),
            "backbone" => Ok(Self::Backbone),
            other => Err(format!("unknown representation style: {}", other)),
        }
    }
}

/// How a representation is colored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "kebab-case")]
pub enum ColorTheme {
    /// Color by chain identifier.
    ChainId,
    /// Color by element symbol.
    ElementSymbol,
    /// A single RGB color (0xRRGGBB).
    Uniform(u32),
}

/// Parameters for [`Engine::add_representation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepresentationSpec {
    /// Representation type.
    pub style: Style,
    /// Color theme.
    pub color: ColorTheme,
}

impl RepresentationSpec {
    /// Creates a new representation spec.
    #[must_use]
    pub fn new(style: Style, color: ColorTheme) -> Self {
        Self { style, color }
    }
}

/// A (chain, residue number) pair identifying one residue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResidueKey {
    /// Author chain identifier.
    pub chain: String,
    /// Author residue number.
    pub number: i32,
}

impl ResidueKey {
    /// Creates a new residue key.
    #[must_use]
    pub fn new(chain: impl Into<String>, number: i32) -> Self {
        Self { chain: chain.into(), number }
    }
}

impl fmt::Display for ResidueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.chain, self.number)
    }
}

impl FromStr for ResidueKey {
    type Err = String;

    /// Parses the backend's `"{chain}_{number}"` residue id form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (chain, number) =
            s.rsplit_once('_').ok_or_else(|| format!("residue id without separator: {}", s))?;
        if chain.is_empty() {
            return Err(format!("residue id without chain: {}", s));
        }
        let number = number
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("invalid residue number in {}: {}", s, e))?;
        Ok(Self::new(chain, number))
    }
}

/// Atom selection used for components and transparency layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtomSelection {
    /// Every atom of the structure.
    All,
    /// Union of the listed residues.
    Residues(Vec<ResidueKey>),
}

impl AtomSelection {
    /// Returns true if the selection can match no atom.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Residues(residues) if residues.is_empty())
    }
}

/// Playback parameters for model-index animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationParams {
    /// Target frames per second.
    pub target_fps: u32,
    /// Restart from the first frame after the last one.
    pub looping: bool,
}

/// A picked location in the scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomLocus {
    /// The residue under the cursor.
    pub residue: ResidueKey,
    /// Atom name, if a single atom was picked.
    pub atom_name: Option<String>,
}

/// Supplies extra hover labels for picked loci.
pub trait LabelProvider: Send + Sync {
    /// Returns label text for the locus, or `None` to add nothing.
    fn label(&self, locus: &AtomLocus) -> Option<String>;
}

/// A 3D point in model space (Ångström).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Point3 {
    /// Creates a new point.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2))
            .sqrt()
    }
}

/// Residue details resolved by the engine from a loaded structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueInfo {
    /// The residue key in author numbering.
    pub key: ResidueKey,
    /// Three-letter residue name (e.g. "LEU").
    pub name: String,
    /// Position of the residue's representative atom.
    pub position: Point3,
}

/// Capability surface of a 3D molecular rendering engine.
///
/// All engines must be `Send + Sync` so a single instance can be shared by
/// the session's components.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Downloads an asset and returns the root data node.
    ///
    /// # Arguments
    /// * `url` - The asset locator
    /// * `binary` - Whether the payload is binary (trajectories) or text
    async fn download(&self, url: &str, binary: bool) -> EngineResult<NodeRef>;

    /// Parses downloaded structure data into a trajectory (frame source).
    async fn parse_trajectory(
        &self,
        data: &NodeRef,
        format: StructureFormat,
    ) -> EngineResult<NodeRef>;

    /// Parses downloaded binary data into a coordinate set.
    async fn parse_coordinates(&self, data: &NodeRef) -> EngineResult<NodeRef>;

    /// Binds a coordinate set to a model, producing a multi-frame trajectory.
    async fn bind_trajectory(
        &self,
        model: &NodeRef,
        coordinates: &NodeRef,
    ) -> EngineResult<NodeRef>;

    /// Creates a model from a trajectory at the given frame index.
    async fn create_model(&self, trajectory: &NodeRef, model_index: usize)
        -> EngineResult<NodeRef>;

    /// Creates the structure object from a model.
    async fn create_structure(&self, model: &NodeRef) -> EngineResult<NodeRef>;

    /// Creates a static component; returns `None` when the component is empty.
    async fn create_component(
        &self,
        structure: &NodeRef,
        kind: ComponentKind,
    ) -> EngineResult<Option<NodeRef>>;

    /// Creates a component from an explicit selection; `None` when empty.
    async fn create_selection_component(
        &self,
        structure: &NodeRef,
        selection: &AtomSelection,
        label: &str,
    ) -> EngineResult<Option<NodeRef>>;

    /// Adds a representation to a component.
    async fn add_representation(
        &self,
        component: &NodeRef,
        spec: &RepresentationSpec,
    ) -> EngineResult<NodeRef>;

    /// Sets the visibility of a node and its subtree.
    ///
    /// This only flips a flag; it must not rebuild geometry.
    fn set_visibility(&self, node: &NodeRef, visible: bool) -> EngineResult<()>;

    /// Applies a transparency layer to a representation.
    ///
    /// # Arguments
    /// * `representation` - The representation to decorate
    /// * `structure` - The structure the selection is evaluated against
    /// * `selection` - Atoms the layer applies to
    /// * `opacity` - Opacity in (0, 1]
    async fn apply_transparency(
        &self,
        representation: &NodeRef,
        structure: &NodeRef,
        selection: &AtomSelection,
        opacity: f32,
    ) -> EngineResult<NodeRef>;

    /// Deletes a node and its whole subtree.
    async fn delete(&self, node: &NodeRef) -> EngineResult<()>;

    /// Starts model-index playback over all loaded trajectories.
    async fn play_animation(&self, params: AnimationParams) -> EngineResult<()>;

    /// Resets the camera to frame the whole scene.
    fn reset_camera(&self);

    /// Registers a label provider under a name, replacing any previous one.
    fn register_label_provider(&self, name: &str, provider: Arc<dyn LabelProvider>);

    /// Resolves residue details in a loaded structure.
    fn residue_info(&self, structure: &NodeRef, residue: &ResidueKey) -> Option<ResidueInfo>;
}
