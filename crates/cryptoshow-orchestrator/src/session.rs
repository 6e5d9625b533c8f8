//! Session facade.
//!
//! A session binds one engine and one backend to a scene, the current view
//! styles, the open analysis result and the animation orchestrator. Every
//! failure is logged and broadcast as [`SessionEvent::Error`] before it is
//! returned.

use crate::animation::{AnimationOrchestrator, AnimationOutcome, AnimationPhase};
use crate::comparison::{Comparison, comparison_available, job_configuration, pocket_query};
use crate::error::{Result, SessionError};
use crate::events::{EventBus, SessionEvent, follow_job};
use crate::export;
use crate::pipeline::StructureLoader;
use crate::pockets::{POCKET_LABEL_PROVIDER, PocketLabelProvider, PocketSelection};
use crate::representation::{Representation, ViewState};
use crate::scene::{ReferenceOpacity, Scene};
use crate::structure::{StructureResource, StructureRole};
use cryptoshow_abstraction::{Engine, Style};
use cryptoshow_core::{
    AnalysisResult, Backend, CandidateMetadata, JobRequest, JobResult,
    SessionConfig,
};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// One interactive analysis session.
pub struct Session {
    engine: Arc<dyn Engine>,
    backend: Arc<dyn Backend>,
    scene: Arc<Scene>,
    loader: StructureLoader,
    animation: AnimationOrchestrator,
    view: Mutex<ViewState>,
    result: Mutex<Option<Arc<AnalysisResult>>>,
    events: EventBus,
}

impl Session {
    /// Creates a session with an empty scene.
    ///
    /// # Arguments
    /// * `engine` - Engine the structures are built in
    /// * `backend` - Analysis backend
    /// * `config` - Reference opacities and playback rate
    pub fn new(engine: Arc<dyn Engine>, backend: Arc<dyn Backend>, config: &SessionConfig) -> Self {
        let events = EventBus::new();
        let scene = Arc::new(Scene::new(
            Arc::clone(&engine),
            ReferenceOpacity {
                polymer: config.polymer_reference_opacity,
                pocket: config.pocket_reference_opacity,
            },
        ));
        let animation = AnimationOrchestrator::new(
            Arc::clone(&engine),
            Arc::clone(&backend),
            Arc::clone(&scene),
            config.animation_fps,
            events.clone(),
        );

        Self {
            loader: StructureLoader::new(Arc::clone(&engine)),
            engine,
            backend,
            scene,
            animation,
            view: Mutex::new(ViewState::default()),
            result: Mutex::new(None),
            events,
        }
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// The scene.
    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    /// Current view styles.
    pub fn view(&self) -> ViewState {
        *self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The open analysis result.
    pub fn result(&self) -> Option<Arc<AnalysisResult>> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Current animation phase.
    pub fn animation_phase(&self) -> AnimationPhase {
        self.animation.phase()
    }

    /// Submits an analysis job, waits for it and opens its result.
    ///
    /// # Errors
    /// Submission, channel or job failure, or a failed primary load.
    pub async fn analyze(&self, request: &JobRequest) -> Result<Arc<AnalysisResult>> {
        let outcome = self.run_analysis(request).await;
        self.report(outcome)
    }

    async fn run_analysis(&self, request: &JobRequest) -> Result<Arc<AnalysisResult>> {
        let job = self.backend.submit(request).await?;
        self.events.emit(SessionEvent::JobSubmitted { job_id: job.job_id.clone(), kind: job.kind });

        let mut channel = self.backend.open_channel(&job)?;
        let update = follow_job(&self.events, &mut channel, &CancellationToken::new())
            .await?
            .ok_or(SessionError::NoResult)?;
        match update.result {
            Some(JobResult::Analysis(result)) => self.load_result(*result).await,
            _ => Err(SessionError::UnexpectedResult(job.job_id)),
        }
    }

    /// Opens an analysis result: loads its structure as the new primary.
    ///
    /// The previous scene is evicted, the pocket label provider is
    /// registered and the current view styles are applied.
    ///
    /// # Errors
    /// A failed primary load; the previous scene is then kept.
    pub async fn open_result(&self, result: AnalysisResult) -> Result<Arc<AnalysisResult>> {
        let outcome = self.load_result(result).await;
        self.report(outcome)
    }

    async fn load_result(&self, result: AnalysisResult) -> Result<Arc<AnalysisResult>> {
        let resource =
            StructureResource::new(self.backend.file_url(&result.file_hash, &result.input_structure));
        let loaded =
            self.loader.load(&resource, StructureRole::Primary, &CancellationToken::new()).await?;
        let name = loaded.name.clone();

        self.animation.cancel();
        self.scene.set_primary(loaded).await;
        self.events.emit(SessionEvent::StructureLoaded { name, primary: true });

        let result = Arc::new(result);
        self.engine.register_label_provider(
            POCKET_LABEL_PROVIDER,
            Arc::new(PocketLabelProvider::new(Arc::clone(&result))),
        );
        *self.result.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&result));

        self.scene.apply_view(&self.view()).await?;
        self.engine.reset_camera();
        self.emit_scene_changed().await;
        info!(
            task_id = %result.task_id,
            structure = %result.structure_name,
            pockets = result.pockets.len(),
            "Analysis result opened"
        );
        Ok(result)
    }

    /// Shows one pocket or all pockets of the open result on the primary.
    ///
    /// Previously shown pockets are replaced.
    ///
    /// # Errors
    /// `NoResult` without an open result, `UnknownPocket` for an id the
    /// result does not have.
    pub async fn show_pockets(&self, which: PocketSelection) -> Result<Vec<Representation>> {
        let outcome = async {
            let result = self.require_result()?;
            if let PocketSelection::Id(id) = which {
                result.pocket(id).ok_or(SessionError::UnknownPocket(id))?;
            }
            let style = self.view().pocket_style;
            let attached = self.scene.attach_primary_pockets(&result.pockets, which, style).await?;
            Ok::<_, SessionError>(attached)
        }
        .await;
        self.report(outcome)
    }

    /// Sets the visible polymer style; `None` hides the polymer.
    pub async fn set_polymer_style(&self, style: Option<Style>) -> Result<()> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner).polymer_style = style;
        let outcome = self.scene.apply_polymer_style(style).await.map_err(SessionError::from);
        self.report(outcome)
    }

    /// Sets the visible pocket style; `None` hides pockets.
    ///
    /// # Errors
    /// `InvalidStyle` for backbone, which pockets are never drawn in.
    pub async fn set_pocket_style(&self, style: Option<Style>) -> Result<()> {
        if style == Some(Style::Backbone) {
            return self.report(Err(SessionError::InvalidStyle(Style::Backbone)));
        }
        self.view.lock().unwrap_or_else(PoisonError::into_inner).pocket_style = style;
        let outcome = self.scene.apply_pocket_style(style).await.map_err(SessionError::from);
        self.report(outcome)
    }

    /// Removes every candidate and restores the primary's opacity.
    ///
    /// # Returns
    /// Number of removed candidates.
    pub async fn remove_superposition(&self) -> Result<usize> {
        let outcome = self.scene.remove_all_candidates().await.map_err(SessionError::from);
        if outcome.is_ok() {
            self.emit_scene_changed().await;
        }
        self.report(outcome)
    }

    /// The comparison search query for a pocket of the open result.
    ///
    /// # Errors
    /// `ComparisonUnavailable` for uploads, `UnknownPocket`, or `Query` if
    /// no pocket residue resolves in the primary structure.
    pub async fn comparison_query(&self, pocket_id: u32) -> Result<String> {
        let outcome = self.build_query(pocket_id).await;
        self.report(outcome)
    }

    async fn build_query(&self, pocket_id: u32) -> Result<String> {
        let result = self.require_result()?;
        if !comparison_available(&result) {
            return Err(SessionError::ComparisonUnavailable);
        }
        let pocket = result.pocket(pocket_id).ok_or(SessionError::UnknownPocket(pocket_id))?;
        let primary = self.scene.primary().await.ok_or(SessionError::NoResult)?;
        pocket_query(self.engine.as_ref(), &primary.structure, pocket, &result.structure_name)
    }

    /// Runs a comparison search for a pocket and waits for its result.
    ///
    /// # Arguments
    /// * `pocket_id` - Pocket the query is built from
    /// * `query` - Explicit query text; built from the structure if `None`
    pub async fn compare(&self, pocket_id: u32, query: Option<String>) -> Result<Comparison> {
        let outcome = self.run_comparison(pocket_id, query).await;
        self.report(outcome)
    }

    async fn run_comparison(&self, pocket_id: u32, query: Option<String>) -> Result<Comparison> {
        let result = self.require_result()?;
        if !comparison_available(&result) {
            return Err(SessionError::ComparisonUnavailable);
        }
        let query = match query {
            Some(query) => query,
            None => self.build_query(pocket_id).await?,
        };

        let job = self
            .backend
            .submit(&JobRequest::Compare {
                file_hash: result.file_hash.clone(),
                configuration: job_configuration(&query),
            })
            .await?;
        self.events.emit(SessionEvent::JobSubmitted { job_id: job.job_id.clone(), kind: job.kind });
        info!(job_id = %job.job_id, query = %query, "Comparison started");

        let mut channel = self.backend.open_channel(&job)?;
        let update = follow_job(&self.events, &mut channel, &CancellationToken::new())
            .await?
            .ok_or(SessionError::NoResult)?;
        match update.result {
            Some(JobResult::Comparison(result)) => Ok(Comparison { job_id: job.job_id, result }),
            _ => Err(SessionError::UnexpectedResult(job.job_id)),
        }
    }

    /// Animates toward a comparison candidate.
    ///
    /// Busy sessions and candidates already shown are no-ops.
    pub async fn animate(&self, candidate: &CandidateMetadata) -> Result<AnimationOutcome> {
        let outcome = async {
            let result = self.require_result()?;
            self.animation.animate(candidate, &result.file_hash, &self.view()).await
        }
        .await;
        self.report(outcome)
    }

    /// Cancels the in-flight animation request.
    pub fn cancel_animation(&self) {
        self.animation.cancel();
    }

    /// Frames the whole scene.
    pub fn reset_camera(&self) {
        self.engine.reset_camera();
    }

    /// PyMOL selection command for a pocket of the open result.
    pub fn pymol_selection(&self, pocket_id: u32) -> Result<String> {
        let outcome = self.require_result().and_then(|result| {
            let pocket = result.pocket(pocket_id).ok_or(SessionError::UnknownPocket(pocket_id))?;
            Ok(export::pymol_selection(&result.structure_name, pocket))
        });
        self.report(outcome)
    }

    fn require_result(&self) -> Result<Arc<AnalysisResult>> {
        self.result().ok_or(SessionError::NoResult)
    }

    async fn emit_scene_changed(&self) {
        let structures = self.scene.structures().await;
        self.events.emit(SessionEvent::SceneChanged {
            structures: structures.len(),
            candidates: structures.iter().filter(|s| !s.is_primary()).count(),
        });
    }

    fn report<T>(&self, outcome: Result<T>) -> Result<T> {
        if let Err(ref e) = outcome {
            error!(error = %e, "Session operation failed");
            self.events.emit(SessionEvent::Error { message: e.user_message() });
        }
        outcome
    }
}
