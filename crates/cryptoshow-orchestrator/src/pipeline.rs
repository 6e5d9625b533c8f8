//! Structure loading pipeline.
//!
//! Turns a [`StructureResource`] into a [`LoadedStructure`] through strictly
//! ordered engine stages. A load is all-or-nothing: on failure or
//! cancellation, every node created so far is deleted.

use crate::error::{PipelineError, PipelineResult, PipelineStage};
use crate::representation::Representation;
use crate::structure::{LoadedStructure, StructureResource, StructureRole};
use cryptoshow_abstraction::{
    ColorTheme, ComponentKind, Engine, EngineError, NodeRef, RepresentationSpec, Style,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Polymer styles created for every structure.
const POLYMER_STYLES: [Style; 3] = [Style::Cartoon, Style::BallAndStick, Style::Backbone];

/// Builds loaded structures in the engine.
#[derive(Clone)]
pub struct StructureLoader {
    engine: Arc<dyn Engine>,
}

impl StructureLoader {
    /// Creates a loader bound to an engine.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Loads a structure.
    ///
    /// # Arguments
    /// * `resource` - Structure (and optional trajectory) locators
    /// * `role` - Primary or candidate tag for the result
    /// * `cancel` - Checked before every stage
    ///
    /// # Errors
    /// The failing stage with its engine error, or `Cancelled` naming the
    /// stage that was not started. No engine node survives an error.
    pub async fn load(
        &self,
        resource: &StructureResource,
        role: StructureRole,
        cancel: &CancellationToken,
    ) -> PipelineResult<LoadedStructure> {
        info!(locator = %resource.locator(), trajectory = ?resource.trajectory(), "Loading structure");

        let mut roots = Vec::new();
        match self.build(resource, role, cancel, &mut roots).await {
            Ok(loaded) => {
                info!(
                    name = %loaded.name,
                    polymer = loaded.polymer.len(),
                    "Structure loaded"
                );
                Ok(loaded)
            }
            Err(e) => {
                if e.is_cancelled() {
                    info!(locator = %resource.locator(), stage = %e.stage(), "Structure load cancelled");
                } else {
                    error!(locator = %resource.locator(), stage = %e.stage(), error = %e, "Structure load failed");
                }
                self.discard(&roots).await;
                Err(e)
            }
        }
    }

    async fn discard(&self, roots: &[NodeRef]) {
        for root in roots.iter().rev() {
            match self.engine.delete(root).await {
                Ok(()) | Err(EngineError::UnknownNode(_)) => {}
                Err(e) => warn!(node = %root, error = %e, "Failed to discard partial structure"),
            }
        }
    }

    async fn build(
        &self,
        resource: &StructureResource,
        role: StructureRole,
        cancel: &CancellationToken,
        roots: &mut Vec<NodeRef>,
    ) -> PipelineResult<LoadedStructure> {
        let engine = self.engine.as_ref();

        enter(cancel, PipelineStage::FetchStructure)?;
        let data = engine
            .download(resource.locator(), false)
            .await
            .map_err(failed(PipelineStage::FetchStructure))?;
        roots.push(data.clone());

        enter(cancel, PipelineStage::ParseStructure)?;
        let trajectory = engine
            .parse_trajectory(&data, resource.format())
            .await
            .map_err(failed(PipelineStage::ParseStructure))?;

        enter(cancel, PipelineStage::CreateModel)?;
        let mut model =
            engine.create_model(&trajectory, 0).await.map_err(failed(PipelineStage::CreateModel))?;

        let trajectory_data = match resource.trajectory() {
            Some(locator) => {
                enter(cancel, PipelineStage::FetchTrajectory)?;
                let coordinates_data = engine
                    .download(locator, true)
                    .await
                    .map_err(failed(PipelineStage::FetchTrajectory))?;
                roots.push(coordinates_data.clone());
                let coordinates = engine
                    .parse_coordinates(&coordinates_data)
                    .await
                    .map_err(failed(PipelineStage::FetchTrajectory))?;

                enter(cancel, PipelineStage::BindTrajectory)?;
                let bound = engine
                    .bind_trajectory(&model, &coordinates)
                    .await
                    .map_err(failed(PipelineStage::BindTrajectory))?;
                model = engine
                    .create_model(&bound, 0)
                    .await
                    .map_err(failed(PipelineStage::BindTrajectory))?;
                Some(coordinates_data)
            }
            None => None,
        };

        enter(cancel, PipelineStage::CreateStructure)?;
        let structure =
            engine.create_structure(&model).await.map_err(failed(PipelineStage::CreateStructure))?;

        enter(cancel, PipelineStage::PolymerComponent)?;
        let polymer_component = engine
            .create_component(&structure, ComponentKind::Polymer)
            .await
            .map_err(failed(PipelineStage::PolymerComponent))?;

        enter(cancel, PipelineStage::Representations)?;
        let mut polymer = Vec::new();
        if let Some(component) = polymer_component {
            let surface = trajectory_data.is_none().then_some(Style::MolecularSurface);
            for style in POLYMER_STYLES.into_iter().chain(surface) {
                let handle = engine
                    .add_representation(&component, &RepresentationSpec::new(style, ColorTheme::ChainId))
                    .await
                    .map_err(failed(PipelineStage::Representations))?;
                polymer.push(Representation::polymer(style, handle));
            }
        } else {
            warn!(locator = %resource.locator(), "Structure has no polymer");
        }

        enter(cancel, PipelineStage::AuxiliaryComponents)?;
        for kind in ComponentKind::AUXILIARY {
            let component = engine
                .create_component(&structure, kind)
                .await
                .map_err(failed(PipelineStage::AuxiliaryComponents))?;
            if let Some(component) = component {
                engine
                    .add_representation(
                        &component,
                        &RepresentationSpec::new(Style::BallAndStick, ColorTheme::ElementSymbol),
                    )
                    .await
                    .map_err(failed(PipelineStage::AuxiliaryComponents))?;
            }
        }

        Ok(LoadedStructure {
            role,
            name: resource.name().to_string(),
            data,
            trajectory_data,
            structure,
            polymer,
            pockets: Vec::new(),
            pocket_components: Vec::new(),
        })
    }
}

fn enter(cancel: &CancellationToken, stage: PipelineStage) -> PipelineResult<()> {
    if cancel.is_cancelled() {
        return Err(PipelineError::Cancelled(stage));
    }
    debug!(stage = %stage, "Pipeline stage");
    Ok(())
}

fn failed(stage: PipelineStage) -> impl Fn(EngineError) -> PipelineError {
    move |source| PipelineError::Stage { stage, source }
}
