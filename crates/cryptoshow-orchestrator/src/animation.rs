//! Candidate animation state machine.
//!
//! Requests a morphing trajectory toward a comparison candidate, loads it
//! and overlays it on the primary. One request is in flight at a time.

use crate::error::{PipelineError, Result, SessionError};
use crate::events::{EventBus, SessionEvent, follow_job};
use crate::pipeline::StructureLoader;
use crate::representation::ViewState;
use crate::scene::{InsertMode, Scene};
use crate::structure::{StructureResource, StructureRole};
use cryptoshow_abstraction::{AnimationParams, Engine, EngineResult};
use cryptoshow_core::{Backend, CandidateMetadata, JobRequest, JobResult};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Phase of the animation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnimationPhase {
    /// Nothing in flight.
    Idle,
    /// Priming the proxy and submitting the trajectory job.
    AnimationRequested,
    /// Waiting for the trajectory job to finish.
    AwaitingTrajectoryJob,
    /// Loading the trajectory structure.
    Loading,
    /// The candidate is in the scene and playing.
    Inserted,
}

impl AnimationPhase {
    /// Checks if the machine can move to the given phase.
    #[must_use]
    #[allow(clippy::match_same_arms)]
    pub fn can_transition_to(&self, to: Self) -> bool {
        match (self, to) {
            (Self::Idle | Self::Inserted, Self::AnimationRequested) => true,
            (Self::AnimationRequested, Self::AwaitingTrajectoryJob) => true,
            (Self::AwaitingTrajectoryJob, Self::Loading) => true,
            (Self::Loading, Self::Inserted) => true,
            // Any failure or cancellation returns to Idle
            (_, Self::Idle) => true,
            (a, b) if *a == b => true,
            _ => false,
        }
    }

    /// Returns true while a request is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::AnimationRequested | Self::AwaitingTrajectoryJob | Self::Loading)
    }
}

/// How an animation request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    /// The candidate was inserted and is playing.
    Inserted,
    /// Another request was in flight; nothing happened.
    Busy,
    /// The candidate is already in the scene; nothing happened.
    AlreadyLoaded,
    /// The request was cancelled; the scene is unchanged.
    Cancelled,
}

#[derive(Debug)]
struct AnimationState {
    phase: AnimationPhase,
    cancel: Option<CancellationToken>,
}

/// Drives candidate animation requests.
pub struct AnimationOrchestrator {
    engine: Arc<dyn Engine>,
    backend: Arc<dyn Backend>,
    scene: Arc<Scene>,
    loader: StructureLoader,
    state: Mutex<AnimationState>,
    fps: u32,
    events: EventBus,
}

impl AnimationOrchestrator {
    /// Creates an idle orchestrator.
    ///
    /// # Arguments
    /// * `engine` - Engine the trajectory is loaded into
    /// * `backend` - Backend running the trajectory job
    /// * `scene` - Scene the candidate is inserted into
    /// * `fps` - Playback rate
    /// * `events` - Bus for phase and job events
    pub fn new(
        engine: Arc<dyn Engine>,
        backend: Arc<dyn Backend>,
        scene: Arc<Scene>,
        fps: u32,
        events: EventBus,
    ) -> Self {
        Self {
            loader: StructureLoader::new(Arc::clone(&engine)),
            engine,
            backend,
            scene,
            state: Mutex::new(AnimationState { phase: AnimationPhase::Idle, cancel: None }),
            fps,
            events,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> AnimationPhase {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).phase
    }

    /// Returns true while a request is in flight.
    pub fn is_busy(&self) -> bool {
        self.phase().is_busy()
    }

    /// Cancels the in-flight request, if any.
    ///
    /// Its channel is closed and its load stops at the next stage boundary.
    /// The scene is not modified by a cancelled request.
    pub fn cancel(&self) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref token) = state.cancel {
            info!(phase = ?state.phase, "Cancelling animation request");
            token.cancel();
        }
    }

    /// Animates toward a candidate.
    ///
    /// # Arguments
    /// * `candidate` - Candidate from the comparison result
    /// * `file_hash` - Hash of the analyzed structure
    /// * `view` - Styles applied after insertion
    ///
    /// # Errors
    /// Any submission, job, channel, load or engine failure. The phase is
    /// back at Idle and the scene is untouched; a candidate inserted before
    /// styling or playback failed is removed again.
    pub async fn animate(
        &self,
        candidate: &CandidateMetadata,
        file_hash: &str,
        view: &ViewState,
    ) -> Result<AnimationOutcome> {
        if self.scene.contains_candidate(candidate).await {
            debug!(pdb_id = %candidate.pdb_id, "Candidate already in the scene");
            return Ok(AnimationOutcome::AlreadyLoaded);
        }
        let Some(cancel) = self.reserve() else {
            debug!(pdb_id = %candidate.pdb_id, "Animation already in flight");
            return Ok(AnimationOutcome::Busy);
        };

        let outcome = self.run(candidate, file_hash, view, &cancel).await;
        match outcome {
            Ok(AnimationOutcome::Inserted) => self.transition(AnimationPhase::Inserted),
            Ok(_) => self.transition(AnimationPhase::Idle),
            Err(ref e) => {
                warn!(pdb_id = %candidate.pdb_id, error = %e, "Animation request failed");
                self.transition(AnimationPhase::Idle);
            }
        }
        self.state.lock().unwrap_or_else(PoisonError::into_inner).cancel = None;
        outcome
    }

    fn reserve(&self) -> Option<CancellationToken> {
        let token = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.phase.is_busy() {
                return None;
            }
            state.phase = AnimationPhase::AnimationRequested;
            let token = CancellationToken::new();
            state.cancel = Some(token.clone());
            token
        };
        self.events.emit(SessionEvent::AnimationPhaseChanged { phase: AnimationPhase::AnimationRequested });
        Some(token)
    }

    fn transition(&self, to: AnimationPhase) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if !state.phase.can_transition_to(to) {
                warn!(from = ?state.phase, to = ?to, "Invalid animation transition");
                return;
            }
            debug!(from = ?state.phase, to = ?to, "Animation transition");
            state.phase = to;
        }
        self.events.emit(SessionEvent::AnimationPhaseChanged { phase: to });
    }

    async fn run(
        &self,
        candidate: &CandidateMetadata,
        file_hash: &str,
        view: &ViewState,
        cancel: &CancellationToken,
    ) -> Result<AnimationOutcome> {
        info!(pdb_id = %candidate.pdb_id, chains = ?candidate.target_chains, "Requesting animation");

        self.backend.prime_proxy(file_hash, &candidate.structure_file_url).await?;
        if cancel.is_cancelled() {
            return Ok(AnimationOutcome::Cancelled);
        }

        let job = self
            .backend
            .submit(&JobRequest::Animate {
                file_hash: file_hash.to_string(),
                structure_file: candidate.structure_file.clone(),
                target_chains: candidate.target_chains.clone(),
            })
            .await?;
        self.events.emit(SessionEvent::JobSubmitted { job_id: job.job_id.clone(), kind: job.kind });
        self.transition(AnimationPhase::AwaitingTrajectoryJob);

        let mut channel = self.backend.open_channel(&job)?;
        let Some(update) = follow_job(&self.events, &mut channel, cancel).await? else {
            return Ok(AnimationOutcome::Cancelled);
        };
        let Some(JobResult::Animation(files)) = update.result else {
            return Err(SessionError::UnexpectedResult(job.job_id));
        };

        self.transition(AnimationPhase::Loading);
        let resource = StructureResource::with_trajectory(
            self.backend.file_url(file_hash, &files.trimmed_pdb),
            self.backend.file_url(file_hash, &files.trajectory),
        );
        let loaded = match self
            .loader
            .load(&resource, StructureRole::Candidate(candidate.clone()), cancel)
            .await
        {
            Ok(loaded) => loaded,
            Err(PipelineError::Cancelled(_)) => return Ok(AnimationOutcome::Cancelled),
            Err(e) => return Err(e.into()),
        };
        let name = loaded.name.clone();

        if !self.scene.insert_candidate_unless_cancelled(loaded, InsertMode::Overlay, cancel).await? {
            return Ok(AnimationOutcome::Cancelled);
        }
        self.events.emit(SessionEvent::StructureLoaded { name, primary: false });

        if let Err(e) = self.start_playback(view).await {
            // Back to the pre-request scene so Idle matches what is shown
            match self.scene.remove_all_candidates().await {
                Ok(evicted) => debug!(evicted, "Rolled back candidate after playback failure"),
                Err(rollback) => warn!(error = %rollback, "Rolling back the candidate failed"),
            }
            return Err(e.into());
        }

        let structures = self.scene.structures().await;
        self.events.emit(SessionEvent::SceneChanged {
            structures: structures.len(),
            candidates: structures.iter().filter(|s| !s.is_primary()).count(),
        });
        info!(pdb_id = %candidate.pdb_id, fps = self.fps, "Candidate animation playing");
        Ok(AnimationOutcome::Inserted)
    }

    async fn start_playback(&self, view: &ViewState) -> EngineResult<()> {
        self.scene.apply_view(view).await?;
        self.engine.play_animation(AnimationParams { target_fps: self.fps, looping: true }).await?;
        self.engine.reset_camera();
        Ok(())
    }
}
