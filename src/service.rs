//! Load → reconcile → apply orchestration over an [`EditionStore`].
//!
//! The algorithms in this crate are pure functions of line snapshots. The
//! service wires them to a store: it loads the stored line, reconciles the
//! ingested line against it, and hands the resulting plan back to the store,
//! which applies it atomically or rejects it as stale.

use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::anchors::{AnchorError, LineAnchors};
use crate::cache::{CacheStats, CachedLinearization, LinearizationCache};
use crate::config::KernelConfig;
use crate::linearizer::{LinearizeError, Linearizer};
use crate::reconciler::{AlignmentHint, ReconcileError, Reconciler};
use crate::roi::{GeometryError, RoiTransform};
use crate::store::EditionStore;
use crate::types::{
    AppliedEditPlan, ArtefactGeometry, EditPlan, EditionId, Line, LineId, PlacedShape,
    SignInterpretationData, TextFragmentId,
};

/// Error type for service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Store error.
    #[error("Store error: {0}")]
    Store(String),
    /// The line changed after the plan was computed; plan again.
    #[error("Stale edit plan for {line}: {reason}")]
    StalePlan {
        /// Target line.
        line: LineId,
        /// Store message.
        reason: String,
    },
    /// Reconciliation failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    /// Linearization failed.
    #[error(transparent)]
    Linearize(#[from] LinearizeError),
    /// Anchor lookup or line validation failed.
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    /// ROI placement failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

impl ServiceError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::Store(e.to_string())
    }

    /// Whether retrying with a fresh plan can succeed.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StalePlan { .. })
    }

    /// Whether a user can resolve the error (by choosing an alignment hint).
    pub fn needs_review(&self) -> bool {
        matches!(self, Self::Reconcile(ReconcileError::AlignmentAmbiguous { .. }))
    }
}

/// A reconciled and applied line.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    /// The plan that was applied.
    pub plan: EditPlan,
    /// What applying it changed.
    pub applied: AppliedEditPlan,
}

/// Sign-stream operations over a store.
pub struct SignStreamService<S: EditionStore> {
    store: Arc<S>,
    config: KernelConfig,
    cache: LinearizationCache,
}

impl<S: EditionStore + 'static> SignStreamService<S> {
    /// Create a service.
    pub fn new(store: Arc<S>, config: KernelConfig) -> Self {
        let cache = LinearizationCache::new(&config.cache);
        Self { store, config, cache }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Load a stored line.
    pub async fn load_line(
        &self,
        edition: EditionId,
        fragment: TextFragmentId,
        name: &str,
    ) -> Result<Line, ServiceError> {
        self.store
            .load_line(edition, fragment, name)
            .await
            .map_err(ServiceError::from_store)
    }

    /// Every reading of a stored line, served from the cache when unchanged.
    pub async fn linearize_line(
        &self,
        edition: EditionId,
        fragment: TextFragmentId,
        name: &str,
    ) -> Result<CachedLinearization, ServiceError> {
        let line = self.load_line(edition, fragment, name).await?;
        let linearizer = Linearizer::new(&self.config.vocabulary);
        Ok(self.cache.linearize(edition, &line, &linearizer)?)
    }

    /// Check that a stored line runs from its start anchor to an end anchor.
    pub async fn validate_line(
        &self,
        edition: EditionId,
        fragment: TextFragmentId,
        name: &str,
    ) -> Result<(), ServiceError> {
        let line = self.load_line(edition, fragment, name).await?;
        Ok(LineAnchors::new(&self.config.vocabulary).validate(&line)?)
    }

    /// Compute the edit plan merging `source` into a stored line without applying it.
    pub async fn plan_line(
        &self,
        edition: EditionId,
        fragment: TextFragmentId,
        name: &str,
        source: &Line,
        hint: Option<AlignmentHint>,
    ) -> Result<EditPlan, ServiceError> {
        let target = self.load_line(edition, fragment, name).await?;
        let reconciler = Reconciler::new(&self.config.vocabulary, self.config.author)
            .with_config(self.config.alignment);
        let hint = hint.unwrap_or(self.config.alignment.hint);
        Ok(reconciler.reconcile_with_hint(&target, source, hint)?)
    }

    /// Reconcile `source` into a stored line and apply the plan.
    pub async fn reconcile_line(
        &self,
        edition: EditionId,
        fragment: TextFragmentId,
        name: &str,
        source: &Line,
        hint: Option<AlignmentHint>,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let start = Instant::now();
        let plan = self.plan_line(edition, fragment, name, source, hint).await?;
        let applied = self.apply_plan(edition, &plan).await?;

        info!(
            target: "sign_stream::metrics",
            metric_type = "reconcile",
            edition = %edition,
            line = %plan.line_id,
            operations = plan.operations.len(),
            created = applied.created.len(),
            deleted = applied.deleted.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "reconcile_metric"
        );
        Ok(ReconcileOutcome { plan, applied })
    }

    /// Apply a previously computed plan.
    ///
    /// Fails with [`ServiceError::StalePlan`] if the line was edited since
    /// the plan was computed.
    pub async fn apply_plan(
        &self,
        edition: EditionId,
        plan: &EditPlan,
    ) -> Result<AppliedEditPlan, ServiceError> {
        self.store
            .apply_edit_plan(edition, plan)
            .await
            .map_err(|e| {
                if S::is_stale_plan(&e) {
                    ServiceError::StalePlan { line: plan.line_id, reason: e.to_string() }
                } else {
                    ServiceError::from_store(e)
                }
            })
    }

    /// Place every ROI of an interpretation on its artefact.
    pub fn place_rois(
        &self,
        data: &SignInterpretationData,
        artefact: &ArtefactGeometry,
    ) -> Result<Vec<PlacedShape>, ServiceError> {
        Ok(data
            .rois
            .iter()
            .filter(|roi| roi.artefact_id == artefact.artefact_id)
            .map(|roi| RoiTransform::place(roi, artefact))
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Linearization cache statistics.
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.stats()
    }
}
