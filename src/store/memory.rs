//! In-memory edition store.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::EditionStore;
use crate::anchors::SurroundingAnchors;
use crate::graph::{GraphError, SignInterpretationGraph};
use crate::types::{
    AppliedEditPlan, AuthorId, DeletionOutcome, EditPlan, EditionId, Line, LineFingerprint, LineId,
    SignId, SignInterpretationData, SignInterpretationId, TextFragment, TextFragmentId,
};
use crate::vocabulary::AttributeVocabulary;

/// Error type for the in-memory store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// Edition not found.
    #[error("Edition not found: {0}")]
    EditionNotFound(EditionId),
    /// Edition already exists.
    #[error("Edition already exists: {0}")]
    EditionExists(EditionId),
    /// The target line changed after the plan was computed.
    #[error("Edit plan for {line} is stale: expected fingerprint {expected}, found {actual}")]
    StalePlan {
        /// Target line.
        line: LineId,
        /// Fingerprint the plan was computed against.
        expected: LineFingerprint,
        /// Current fingerprint.
        actual: LineFingerprint,
    },
    /// Graph operation failed.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

type SharedGraph = Arc<Mutex<SignInterpretationGraph>>;

/// In-memory store holding one graph per edition.
///
/// Each edition sits behind its own mutex, so mutations of one edition are
/// serialized while other editions proceed independently.
#[derive(Debug)]
pub struct InMemoryEditionStore {
    vocabulary: Arc<AttributeVocabulary>,
    editions: RwLock<BTreeMap<EditionId, SharedGraph>>,
}

impl InMemoryEditionStore {
    /// Create an empty store.
    pub fn new(vocabulary: Arc<AttributeVocabulary>) -> Self {
        Self {
            vocabulary,
            editions: RwLock::new(BTreeMap::new()),
        }
    }

    /// The vocabulary new editions are created with.
    pub fn vocabulary(&self) -> &Arc<AttributeVocabulary> {
        &self.vocabulary
    }

    /// Create an empty edition.
    pub fn create_edition(&self, edition: EditionId) -> Result<(), StoreError> {
        self.insert_graph(SignInterpretationGraph::new(edition, Arc::clone(&self.vocabulary)))
    }

    /// Store a prepared graph under its edition id.
    pub fn insert_graph(&self, graph: SignInterpretationGraph) -> Result<(), StoreError> {
        let edition = graph.edition_id();
        let mut editions = self.editions.write();
        if editions.contains_key(&edition) {
            return Err(StoreError::EditionExists(edition));
        }
        editions.insert(edition, Arc::new(Mutex::new(graph)));
        tracing::debug!(edition = %edition, "edition created");
        Ok(())
    }

    /// Edition ids in order.
    pub fn editions(&self) -> Vec<EditionId> {
        self.editions.read().keys().copied().collect()
    }

    /// Run `f` with shared access to an edition's graph.
    pub fn read<T>(
        &self,
        edition: EditionId,
        f: impl FnOnce(&SignInterpretationGraph) -> T,
    ) -> Result<T, StoreError> {
        let graph = self.graph(edition)?;
        let guard = graph.lock();
        Ok(f(&guard))
    }

    /// Run `f` inside the edition's exclusive section.
    pub fn write<T>(
        &self,
        edition: EditionId,
        f: impl FnOnce(&mut SignInterpretationGraph) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let graph = self.graph(edition)?;
        let mut guard = graph.lock();
        f(&mut guard)
    }

    fn graph(&self, edition: EditionId) -> Result<SharedGraph, StoreError> {
        self.editions
            .read()
            .get(&edition)
            .cloned()
            .ok_or(StoreError::EditionNotFound(edition))
    }
}

#[async_trait]
impl EditionStore for InMemoryEditionStore {
    type Error = StoreError;

    fn is_stale_plan(error: &StoreError) -> bool {
        matches!(error, StoreError::StalePlan { .. })
    }

    async fn load_line(
        &self,
        edition: EditionId,
        fragment: TextFragmentId,
        name: &str,
    ) -> Result<Line, Self::Error> {
        self.read(edition, |g| g.line_by_name(fragment, name))?
            .map_err(StoreError::from)
    }

    async fn load_line_by_id(&self, edition: EditionId, line: LineId) -> Result<Line, Self::Error> {
        self.read(edition, |g| g.line(line))?.map_err(StoreError::from)
    }

    async fn load_fragments(&self, edition: EditionId) -> Result<Vec<TextFragment>, Self::Error> {
        self.read(edition, |g| {
            g.fragment_ids()
                .iter()
                .map(|f| g.fragment(*f))
                .collect::<Result<Vec<_>, _>>()
        })?
        .map_err(StoreError::from)
    }

    async fn apply_edit_plan(
        &self,
        edition: EditionId,
        plan: &EditPlan,
    ) -> Result<AppliedEditPlan, Self::Error> {
        self.write(edition, |graph| {
            let actual = graph.line(plan.line_id)?.fingerprint();
            if actual != plan.target_fingerprint {
                tracing::warn!(
                    edition = %edition,
                    plan = %plan.id,
                    line = %plan.line_id,
                    "rejecting stale edit plan"
                );
                return Err(StoreError::StalePlan {
                    line: plan.line_id,
                    expected: plan.target_fingerprint.clone(),
                    actual,
                });
            }
            Ok(graph.apply_edit_plan(plan)?)
        })
    }

    async fn create_sign_with_interpretations(
        &self,
        edition: EditionId,
        line: LineId,
        readings: Vec<SignInterpretationData>,
        anchors: &SurroundingAnchors,
        author: AuthorId,
    ) -> Result<(SignId, Vec<SignInterpretationId>), Self::Error> {
        self.write(edition, |g| {
            Ok(g.create_sign_with_interpretations(line, readings, anchors, author)?)
        })
    }

    async fn add_sign_interpretations(
        &self,
        edition: EditionId,
        sign: SignId,
        readings: Vec<SignInterpretationData>,
        anchors: &SurroundingAnchors,
        author: AuthorId,
    ) -> Result<Vec<SignInterpretationId>, Self::Error> {
        self.write(edition, |g| {
            Ok(g.add_sign_interpretations(sign, readings, anchors, author)?)
        })
    }

    async fn update_sign_interpretation(
        &self,
        edition: EditionId,
        id: SignInterpretationId,
        data: SignInterpretationData,
    ) -> Result<(), Self::Error> {
        self.write(edition, |g| Ok(g.update_interpretation(id, data)?))
    }

    async fn remove_sign_interpretation(
        &self,
        edition: EditionId,
        id: SignInterpretationId,
    ) -> Result<DeletionOutcome, Self::Error> {
        self.write(edition, |g| Ok(g.delete_interpretation(id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::{AnchorKind, LineAnchors};
    use crate::types::EditOperation;

    const EDITION: EditionId = EditionId::new(1);
    const AUTHOR: AuthorId = AuthorId::new(1);

    fn store_with_line() -> (InMemoryEditionStore, TextFragmentId, LineId) {
        let store = InMemoryEditionStore::new(Arc::new(AttributeVocabulary::default()));
        store.create_edition(EDITION).unwrap();
        let (fragment, line) = store
            .write(EDITION, |g| {
                let fragment = g.create_text_fragment("frg. 1", AUTHOR);
                let line = g.append_line(fragment, "1", AUTHOR)?;
                Ok((fragment, line))
            })
            .unwrap();
        (store, fragment, line)
    }

    #[tokio::test]
    async fn test_load_line_by_name() {
        let (store, fragment, line) = store_with_line();
        let loaded = store.load_line(EDITION, fragment, "1").await.unwrap();
        assert_eq!(loaded.id, line);

        assert!(matches!(
            store.load_line(EditionId::new(9), fragment, "1").await,
            Err(StoreError::EditionNotFound(_))
        ));
        assert!(matches!(
            store.load_line(EDITION, fragment, "404").await,
            Err(StoreError::Graph(GraphError::LineNameNotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_edition() {
        let (store, _, _) = store_with_line();
        assert_eq!(store.create_edition(EDITION), Err(StoreError::EditionExists(EDITION)));
    }

    #[tokio::test]
    async fn test_stale_plan_rejected() {
        let (store, _, line_id) = store_with_line();
        let line = store.load_line_by_id(EDITION, line_id).await.unwrap();
        let vocab = AttributeVocabulary::default();
        let anchors = LineAnchors::new(&vocab);
        let start = anchors.find_anchor(&line, AnchorKind::Start).unwrap();
        let end = anchors.find_anchor(&line, AnchorKind::End).unwrap();

        let mut plan = EditPlan::new(line_id, line.fingerprint(), AUTHOR);
        plan.push(EditOperation::Keep { target: start });

        // Someone else edits the line first.
        store
            .create_sign_with_interpretations(
                EDITION,
                line_id,
                vec![SignInterpretationData::character("a")],
                &SurroundingAnchors { before: vec![start], after: vec![end] },
                AUTHOR,
            )
            .await
            .unwrap();

        let err = store.apply_edit_plan(EDITION, &plan).await.unwrap_err();
        assert!(matches!(err, StoreError::StalePlan { .. }));
        assert!(<InMemoryEditionStore as EditionStore>::is_stale_plan(&err));
        assert!(!<InMemoryEditionStore as EditionStore>::is_stale_plan(
            &StoreError::EditionNotFound(EDITION)
        ));
    }
}
