//! Edition storage backends.
//!
//! The store owns the graphs and serializes mutation per edition: every
//! mutating method runs under that edition's exclusive section, and an edit
//! plan is applied as one unit.

pub mod memory;

use async_trait::async_trait;

use crate::anchors::SurroundingAnchors;
use crate::types::{
    AppliedEditPlan, AuthorId, DeletionOutcome, EditPlan, EditionId, Line, LineId, SignId,
    SignInterpretationData, SignInterpretationId, TextFragment, TextFragmentId,
};

/// Trait for edition storage backends.
///
/// Reads return owned snapshots. Implementations must return signs,
/// interpretations and edges in insertion order.
#[async_trait]
pub trait EditionStore: Send + Sync {
    /// Error type for store operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether `error` rejected an edit plan computed against an older line.
    ///
    /// Callers recover from such errors by planning again.
    fn is_stale_plan(_error: &Self::Error) -> bool {
        false
    }

    /// Load a line by fragment and name.
    async fn load_line(
        &self,
        edition: EditionId,
        fragment: TextFragmentId,
        name: &str,
    ) -> Result<Line, Self::Error>;

    /// Load a line by id.
    async fn load_line_by_id(&self, edition: EditionId, line: LineId) -> Result<Line, Self::Error>;

    /// Load every fragment of an edition, in creation order.
    async fn load_fragments(&self, edition: EditionId) -> Result<Vec<TextFragment>, Self::Error>;

    /// Apply an edit plan atomically.
    ///
    /// Fails without changes if the target line no longer matches the
    /// fingerprint the plan was computed against.
    async fn apply_edit_plan(
        &self,
        edition: EditionId,
        plan: &EditPlan,
    ) -> Result<AppliedEditPlan, Self::Error>;

    /// Create a sign holding `readings`, spliced between `anchors`.
    async fn create_sign_with_interpretations(
        &self,
        edition: EditionId,
        line: LineId,
        readings: Vec<SignInterpretationData>,
        anchors: &SurroundingAnchors,
        author: AuthorId,
    ) -> Result<(SignId, Vec<SignInterpretationId>), Self::Error>;

    /// Add readings to an existing sign, parallel to the existing path.
    async fn add_sign_interpretations(
        &self,
        edition: EditionId,
        sign: SignId,
        readings: Vec<SignInterpretationData>,
        anchors: &SurroundingAnchors,
        author: AuthorId,
    ) -> Result<Vec<SignInterpretationId>, Self::Error>;

    /// Replace an interpretation's data.
    async fn update_sign_interpretation(
        &self,
        edition: EditionId,
        id: SignInterpretationId,
        data: SignInterpretationData,
    ) -> Result<(), Self::Error>;

    /// Delete an interpretation, reconnecting its predecessors.
    async fn remove_sign_interpretation(
        &self,
        edition: EditionId,
        id: SignInterpretationId,
    ) -> Result<DeletionOutcome, Self::Error>;
}

pub use memory::{InMemoryEditionStore, StoreError};
