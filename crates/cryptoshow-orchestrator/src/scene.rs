//! Scene state: the ordered collection of loaded structures.
//!
//! Every mutation holds the scene lock for its whole read-modify-write, so
//! interleaved tasks always start from the latest collection.

use crate::pockets::{PocketSelection, attach_pockets};
use crate::representation::{Representation, ViewState, set_transparency, set_visible_style};
use crate::structure::LoadedStructure;
use cryptoshow_abstraction::{Engine, EngineResult, Style};
use cryptoshow_core::CandidateMetadata;
use cryptoshow_core::api::Pocket;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a new candidate enters the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Dim the primary, evict other candidates, add the new one opaque.
    Overlay,
    /// Evict other candidates, add the new one.
    Replace,
}

/// Primary opacities while a candidate is overlaid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferenceOpacity {
    /// Polymer representations.
    pub polymer: f32,
    /// Pocket representations.
    pub pocket: f32,
}

impl Default for ReferenceOpacity {
    fn default() -> Self {
        Self { polymer: 0.25, pocket: 0.4 }
    }
}

/// Summary of one structure, for reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSummary {
    /// Structure name.
    pub name: String,
    /// True for the primary.
    pub primary: bool,
    /// Number of polymer representations.
    pub polymer: usize,
    /// Number of pocket representations.
    pub pockets: usize,
    /// Lowest opacity across the structure's representations.
    pub opacity: f32,
}

/// Owns the loaded structures and their engine handles.
pub struct Scene {
    engine: Arc<dyn Engine>,
    structures: Mutex<Vec<LoadedStructure>>,
    opacity: ReferenceOpacity,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new(engine: Arc<dyn Engine>, opacity: ReferenceOpacity) -> Self {
        Self { engine, structures: Mutex::new(Vec::new()), opacity }
    }

    /// Locks the collection for a custom read-modify-write.
    pub async fn lock(&self) -> MutexGuard<'_, Vec<LoadedStructure>> {
        self.structures.lock().await
    }

    /// Replaces the whole scene with a new primary.
    pub async fn set_primary(&self, loaded: LoadedStructure) {
        let mut structures = self.structures.lock().await;
        let evicted = self.evict(&mut structures, |_| true).await;
        info!(name = %loaded.name, evicted, "Primary structure set");
        structures.push(loaded);
    }

    /// Inserts a candidate.
    ///
    /// In both modes every other candidate is evicted first, so at most one
    /// candidate is ever present. In overlay mode the primary is dimmed to
    /// the reference opacities.
    ///
    /// # Errors
    /// If dimming fails the primary is returned to full opacity, the
    /// candidate's nodes are released and the scene is left as it was.
    pub async fn insert_candidate(&self, loaded: LoadedStructure, mode: InsertMode) -> EngineResult<()> {
        let mut structures = self.structures.lock().await;
        self.insert_locked(&mut structures, loaded, mode).await
    }

    /// Inserts a candidate unless `cancel` fired, checked with the lock held.
    ///
    /// # Returns
    /// `false` if cancelled; the candidate's nodes are then released.
    pub async fn insert_candidate_unless_cancelled(
        &self,
        loaded: LoadedStructure,
        mode: InsertMode,
        cancel: &CancellationToken,
    ) -> EngineResult<bool> {
        let mut structures = self.structures.lock().await;
        if cancel.is_cancelled() {
            debug!(name = %loaded.name, "Dropping late candidate");
            drop(structures);
            loaded.release(self.engine.as_ref()).await?;
            return Ok(false);
        }
        self.insert_locked(&mut structures, loaded, mode).await?;
        Ok(true)
    }

    async fn insert_locked(
        &self,
        structures: &mut Vec<LoadedStructure>,
        loaded: LoadedStructure,
        mode: InsertMode,
    ) -> EngineResult<()> {
        if mode == InsertMode::Overlay {
            let mut dimmed = Ok(());
            for primary in structures.iter_mut().filter(|s| s.is_primary()) {
                dimmed = self.dim(primary).await;
                if dimmed.is_err() {
                    break;
                }
            }
            if let Err(e) = dimmed {
                warn!(name = %loaded.name, error = %e, "Dimming the primary failed, dropping candidate");
                self.restore_primary(structures).await;
                if let Err(release) = loaded.release(self.engine.as_ref()).await {
                    warn!(error = %release, "Dropped candidate left nodes behind");
                }
                return Err(e);
            }
        }

        let evicted = self.evict(structures, |s| !s.is_primary()).await;
        info!(name = %loaded.name, mode = ?mode, evicted, "Candidate inserted");
        structures.push(loaded);
        Ok(())
    }

    async fn dim(&self, primary: &mut LoadedStructure) -> EngineResult<()> {
        let engine = self.engine.as_ref();
        set_transparency(engine, &mut primary.polymer, &primary.structure, self.opacity.polymer).await?;
        set_transparency(engine, &mut primary.pockets, &primary.structure, self.opacity.pocket).await
    }

    /// Best-effort return of the primary to full opacity.
    async fn restore_primary(&self, structures: &mut [LoadedStructure]) {
        let engine = self.engine.as_ref();
        for primary in structures.iter_mut().filter(|s| s.is_primary()) {
            for representations in [&mut primary.polymer, &mut primary.pockets] {
                if let Err(e) = set_transparency(engine, representations, &primary.structure, 1.0).await {
                    warn!(name = %primary.name, error = %e, "Failed to restore primary opacity");
                }
            }
        }
    }

    /// Restores full opacity on the primary and evicts every candidate.
    ///
    /// # Returns
    /// Number of evicted candidates.
    pub async fn remove_all_candidates(&self) -> EngineResult<usize> {
        let mut structures = self.structures.lock().await;
        for primary in structures.iter_mut().filter(|s| s.is_primary()) {
            let engine = self.engine.as_ref();
            set_transparency(engine, &mut primary.polymer, &primary.structure, 1.0).await?;
            set_transparency(engine, &mut primary.pockets, &primary.structure, 1.0).await?;
        }
        Ok(self.evict(&mut structures, |s| !s.is_primary()).await)
    }

    /// Releases and forgets every structure matching `predicate`.
    async fn evict<F>(&self, structures: &mut Vec<LoadedStructure>, predicate: F) -> usize
    where
        F: Fn(&LoadedStructure) -> bool,
    {
        let (evicted, kept): (Vec<_>, Vec<_>) = structures.drain(..).partition(|s| predicate(s));
        *structures = kept;

        let count = evicted.len();
        for structure in evicted {
            let name = structure.name.clone();
            if let Err(e) = structure.release(self.engine.as_ref()).await {
                warn!(name = %name, error = %e, "Evicted structure left nodes behind");
            }
        }
        count
    }

    /// Returns true if an equivalent candidate is in the scene.
    pub async fn contains_candidate(&self, metadata: &CandidateMetadata) -> bool {
        self.structures
            .lock()
            .await
            .iter()
            .filter_map(LoadedStructure::candidate)
            .any(|c| c.is_equivalent(metadata))
    }

    /// Applies the view's styles to every structure.
    pub async fn apply_view(&self, view: &ViewState) -> EngineResult<()> {
        let mut structures = self.structures.lock().await;
        let engine = self.engine.as_ref();
        for structure in structures.iter_mut() {
            set_visible_style(engine, &mut structure.polymer, view.polymer_style)?;
            set_visible_style(engine, &mut structure.pockets, view.pocket_style)?;
        }
        Ok(())
    }

    /// Sets the visible polymer style on every structure.
    pub async fn apply_polymer_style(&self, style: Option<Style>) -> EngineResult<()> {
        let mut structures = self.structures.lock().await;
        for structure in structures.iter_mut() {
            set_visible_style(self.engine.as_ref(), &mut structure.polymer, style)?;
        }
        Ok(())
    }

    /// Sets the visible pocket style on every structure.
    pub async fn apply_pocket_style(&self, style: Option<Style>) -> EngineResult<()> {
        let mut structures = self.structures.lock().await;
        for structure in structures.iter_mut() {
            set_visible_style(self.engine.as_ref(), &mut structure.pockets, style)?;
        }
        Ok(())
    }

    /// Attaches pockets to the primary, dimming them if a candidate is shown.
    ///
    /// # Returns
    /// The new pocket representations; empty without a primary.
    pub async fn attach_primary_pockets(
        &self,
        pockets: &[Pocket],
        which: PocketSelection,
        visible_style: Option<Style>,
    ) -> EngineResult<Vec<Representation>> {
        let mut structures = self.structures.lock().await;
        let overlaid = structures.iter().any(|s| !s.is_primary());
        let Some(primary) = structures.iter_mut().find(|s| s.is_primary()) else {
            return Ok(Vec::new());
        };

        let engine = self.engine.as_ref();
        let attached = attach_pockets(engine, primary, pockets, which, visible_style).await?;
        if overlaid {
            set_transparency(engine, &mut primary.pockets, &primary.structure, self.opacity.pocket)
                .await?;
            return Ok(primary.pockets.clone());
        }
        Ok(attached)
    }

    /// Clones the current collection.
    pub async fn structures(&self) -> Vec<LoadedStructure> {
        self.structures.lock().await.clone()
    }

    /// The primary structure, if any.
    pub async fn primary(&self) -> Option<LoadedStructure> {
        self.structures.lock().await.iter().find(|s| s.is_primary()).cloned()
    }

    /// Number of candidates.
    pub async fn candidate_count(&self) -> usize {
        self.structures.lock().await.iter().filter(|s| !s.is_primary()).count()
    }

    /// Summaries in scene order.
    pub async fn summaries(&self) -> Vec<StructureSummary> {
        self.structures
            .lock()
            .await
            .iter()
            .map(|s| StructureSummary {
                name: s.name.clone(),
                primary: s.is_primary(),
                polymer: s.polymer.len(),
                pockets: s.pockets.len(),
                opacity: s
                    .polymer
                    .iter()
                    .chain(&s.pockets)
                    .map(Representation::opacity)
                    .fold(1.0, f32::min),
            })
            .collect()
    }
}
