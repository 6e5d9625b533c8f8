//! Session orchestration for CryptoShow.
//!
//! This crate turns analysis results into engine scenes: the structure
//! loading pipeline, representation and transparency control, the scene
//! state manager, pocket attachment, comparison queries and the candidate
//! animation state machine, bound together by [`Session`].

pub mod animation;
pub mod comparison;
pub mod error;
pub mod events;
pub mod export;
pub mod pipeline;
pub mod pockets;
pub mod representation;
pub mod scene;
pub mod session;
pub mod structure;

pub use animation::{AnimationOrchestrator, AnimationOutcome, AnimationPhase};
pub use comparison::{Comparison, comparison_available, job_configuration, pocket_query};
pub use error::{PipelineError, PipelineResult, PipelineStage, Result, SessionError};
pub use events::{EventBus, SessionEvent, follow_job};
pub use export::pymol_selection;
pub use pipeline::StructureLoader;
pub use pockets::{
    POCKET_LABEL_PROVIDER, POCKET_PALETTE, POCKET_STYLES, PocketLabelProvider, PocketSelection,
    attach_pockets, pocket_color,
};
pub use representation::{
    Representation, RepresentationCategory, TransparencyOverlay, ViewState, set_transparency,
    set_visible_style,
};
pub use scene::{InsertMode, ReferenceOpacity, Scene, StructureSummary};
pub use session::Session;
pub use structure::{LoadedStructure, StructureResource, StructureRole};
