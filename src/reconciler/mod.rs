//! Reconciliation of an ingested line against a stored line.
//!
//! The reconciler linearizes both lines, aligns their preferred comparison
//! strings and turns the alignment into an [`EditPlan`]. It never mutates
//! either line; callers apply the plan through
//! [`crate::graph::SignInterpretationGraph::apply_edit_plan`].
//!
//! ## Walking the alignment
//!
//! A cursor holds the interpretations that new material attaches after. It
//! starts at the target's start anchor and is threaded through the walk:
//!
//! | Aligned pair | Operations | Cursor afterwards |
//! |---|---|---|
//! | target + source | keep/update matches, insert extra source readings into the target sign, delete unmatched target readings | matched and inserted readings |
//! | source only | insert a new sign between the cursor and the next aligned target | the inserted readings |
//! | target only | delete every reading of the target sign | unchanged |

pub mod alignment;

pub use alignment::{align, AlignedPair, Alignment, AlignmentConfig, AlignmentHint, PairKind};

use std::collections::HashSet;

use crate::anchors::{AnchorError, AnchorKind, LineAnchors};
use crate::linearizer::{LinearizeError, Linearizer};
use crate::types::{
    AuthorId, EditOperation, EditPlan, InterpretationRef, Line, LineId, LineIndex, SignId,
    SignInterpretation, SignInterpretationData, SignInterpretationId, SignPlacement,
};
use crate::vocabulary::AttributeVocabulary;

/// Error type for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    /// Linearization failed.
    #[error(transparent)]
    Linearize(#[from] LinearizeError),
    /// The target line's anchors are missing or the line is malformed.
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    /// More than one alignment reaches the optimal edit cost.
    #[error("Alignment of line {line} is ambiguous: {optimal_alignments} alignments with cost {cost}")]
    AlignmentAmbiguous {
        /// Target line.
        line: LineId,
        /// Optimal edit cost.
        cost: usize,
        /// Number of optimal alignments.
        optimal_alignments: u64,
    },
}

/// One non-anchor position of a preferred sequence.
#[derive(Debug, Clone)]
struct Position {
    id: SignInterpretationId,
    token: String,
}

/// Produces edit plans that merge a source line into a target line.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'v> {
    vocabulary: &'v AttributeVocabulary,
    author: AuthorId,
    config: AlignmentConfig,
}

impl<'v> Reconciler<'v> {
    /// Create a reconciler that attributes new edges to `author`.
    pub fn new(vocabulary: &'v AttributeVocabulary, author: AuthorId) -> Self {
        Self {
            vocabulary,
            author,
            config: AlignmentConfig::default(),
        }
    }

    /// Use a specific alignment configuration.
    pub fn with_config(mut self, config: AlignmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Reconcile using the configured alignment hint.
    pub fn reconcile(&self, target: &Line, source: &Line) -> Result<EditPlan, ReconcileError> {
        self.reconcile_with_hint(target, source, self.config.hint)
    }

    /// Reconcile with an explicit alignment hint.
    pub fn reconcile_with_hint(
        &self,
        target: &Line,
        source: &Line,
        hint: AlignmentHint,
    ) -> Result<EditPlan, ReconcileError> {
        let anchors = LineAnchors::new(self.vocabulary);
        anchors.validate(target)?;
        let start = anchors.find_anchor(target, AnchorKind::Start)?;
        let ends = anchors.find_anchors(target, AnchorKind::End);

        let target_positions = self.positions(target)?;
        let source_positions = self.positions(source)?;
        let target_tokens: Vec<&str> = target_positions.iter().map(|p| p.token.as_str()).collect();
        let source_tokens: Vec<&str> = source_positions.iter().map(|p| p.token.as_str()).collect();

        let alignment = align(&target_tokens, &source_tokens, hint);
        if hint == AlignmentHint::Strict && !alignment.is_unique() {
            tracing::warn!(
                line = %target.id,
                cost = alignment.cost,
                optimal_alignments = alignment.optimal_alignments,
                "ambiguous alignment"
            );
            return Err(ReconcileError::AlignmentAmbiguous {
                line: target.id,
                cost: alignment.cost,
                optimal_alignments: alignment.optimal_alignments,
            });
        }

        let mut walk = Walk {
            reconciler: self,
            target: target.index(),
            source: source.index(),
            plan: EditPlan::new(target.id, target.fingerprint(), self.author),
            target_signs: HashSet::new(),
            source_signs: HashSet::new(),
        };
        let mut cursor = vec![InterpretationRef::stored(start)];

        for (at, pair) in alignment.pairs.iter().enumerate() {
            cursor = match (pair.target, pair.source) {
                (Some(t), Some(s)) => {
                    walk.both(target_positions[t].id, source_positions[s].id, cursor)
                }
                (None, Some(s)) => {
                    let after = alignment.pairs[at + 1..]
                        .iter()
                        .find_map(|p| p.target)
                        .map(|t| walk.readings(target_positions[t].id))
                        .unwrap_or_else(|| ends.clone());
                    walk.source_only(source_positions[s].id, after, cursor)
                }
                (Some(t), None) => {
                    walk.target_only(target_positions[t].id);
                    cursor
                }
                (None, None) => cursor,
            };
        }

        let plan = walk.plan;
        tracing::debug!(
            line = %target.id,
            plan = %plan.id,
            cost = alignment.cost,
            keeps = plan.num_keeps(),
            updates = plan.num_updates(),
            inserts = plan.num_inserts(),
            deletes = plan.num_deletes(),
            "reconciled line"
        );
        Ok(plan)
    }

    /// Non-anchor positions of the line's preferred sequence.
    fn positions(&self, line: &Line) -> Result<Vec<Position>, LinearizeError> {
        let linearizer = Linearizer::new(self.vocabulary);
        let index = line.index();
        let Some(sequence) = linearizer.preferred(line)? else {
            return Ok(Vec::new());
        };
        Ok(sequence
            .iter()
            .filter(|(id, _)| {
                index
                    .get(*id)
                    .map(|i| !self.vocabulary.is_anchor(&i.data))
                    .unwrap_or(false)
            })
            .map(|(id, token)| Position { id, token: token.to_string() })
            .collect())
    }

    fn token(&self, interpretation: &SignInterpretation) -> String {
        Linearizer::new(self.vocabulary).token(&interpretation.data)
    }

    fn is_anchor(&self, interpretation: &SignInterpretation) -> bool {
        self.vocabulary.is_anchor(&interpretation.data)
    }
}

/// State of one walk over an alignment.
struct Walk<'r, 'v, 'l> {
    reconciler: &'r Reconciler<'v>,
    target: LineIndex<'l>,
    source: LineIndex<'l>,
    plan: EditPlan,
    target_signs: HashSet<SignId>,
    source_signs: HashSet<SignId>,
}

impl Walk<'_, '_, '_> {
    /// Aligned target and source positions.
    fn both(
        &mut self,
        target_id: SignInterpretationId,
        source_id: SignInterpretationId,
        cursor: Vec<InterpretationRef>,
    ) -> Vec<InterpretationRef> {
        let (Some(target_sign), Some(source_sign)) =
            (self.target.sign_of(target_id), self.source.sign_of(source_id))
        else {
            return cursor;
        };
        if !self.target_signs.insert(target_sign.id) || !self.source_signs.insert(source_sign.id) {
            return vec![InterpretationRef::stored(target_id)];
        }
        let reconciler = self.reconciler;

        let mut unmatched_targets: Vec<&SignInterpretation> = target_sign
            .interpretations
            .iter()
            .filter(|i| !reconciler.is_anchor(i))
            .collect();
        let mut unmatched_sources: Vec<&SignInterpretation> = Vec::new();
        let mut next_cursor = Vec::new();

        for source in source_sign.interpretations.iter().filter(|i| !reconciler.is_anchor(i)) {
            let token = reconciler.token(source);
            let matched = unmatched_targets
                .iter()
                .position(|t| reconciler.token(t) == token);
            let Some(k) = matched else {
                unmatched_sources.push(source);
                continue;
            };
            let target = unmatched_targets.remove(k);
            let merged = merge(&target.data, &source.data);
            if merged == target.data {
                self.plan.push(EditOperation::Keep { target: target.id });
            } else {
                self.plan.push(EditOperation::Update { target: target.id, data: merged });
            }
            next_cursor.push(InterpretationRef::stored(target.id));
        }

        if !unmatched_sources.is_empty() {
            let after = self
                .target
                .successors(target_id)
                .into_iter()
                .map(InterpretationRef::stored)
                .collect();
            let op = self.plan.push(EditOperation::Insert {
                placement: SignPlacement::ExistingSign { sign_id: target_sign.id },
                interpretations: unmatched_sources.iter().map(|s| detached(&s.data)).collect(),
                anchors_before: cursor,
                anchors_after: after,
                break_anchor_links: false,
                source_ids: unmatched_sources.iter().map(|s| s.id).collect(),
            });
            next_cursor.extend((0..unmatched_sources.len()).map(|index| InterpretationRef::Planned { op, index }));
        }

        for target in unmatched_targets {
            self.delete(target.id);
        }
        next_cursor
    }

    /// Source position with no target counterpart: a new sign.
    fn source_only(
        &mut self,
        source_id: SignInterpretationId,
        after: Vec<SignInterpretationId>,
        cursor: Vec<InterpretationRef>,
    ) -> Vec<InterpretationRef> {
        let Some(source_sign) = self.source.sign_of(source_id) else {
            return cursor;
        };
        if !self.source_signs.insert(source_sign.id) {
            return cursor;
        }
        let reconciler = self.reconciler;
        let readings: Vec<&SignInterpretation> = source_sign
            .interpretations
            .iter()
            .filter(|i| !reconciler.is_anchor(i))
            .collect();

        let op = self.plan.push(EditOperation::Insert {
            placement: SignPlacement::NewSign,
            interpretations: readings.iter().map(|s| detached(&s.data)).collect(),
            anchors_before: cursor,
            anchors_after: after.into_iter().map(InterpretationRef::stored).collect(),
            break_anchor_links: true,
            source_ids: readings.iter().map(|s| s.id).collect(),
        });
        (0..readings.len())
            .map(|index| InterpretationRef::Planned { op, index })
            .collect()
    }

    /// Target position with no source counterpart: remove its sign.
    fn target_only(&mut self, target_id: SignInterpretationId) {
        let Some(target_sign) = self.target.sign_of(target_id) else {
            return;
        };
        if !self.target_signs.insert(target_sign.id) {
            return;
        }
        let reconciler = self.reconciler;
        let doomed: Vec<SignInterpretationId> = target_sign
            .interpretations
            .iter()
            .filter(|i| !reconciler.is_anchor(i))
            .map(|i| i.id)
            .collect();
        for id in doomed {
            self.delete(id);
        }
    }

    /// Every non-anchor reading of the target sign holding `id`.
    ///
    /// A new sign is spliced in front of all of them, so that no variant
    /// keeps a direct edge from the cursor around it.
    fn readings(&self, id: SignInterpretationId) -> Vec<SignInterpretationId> {
        let reconciler = self.reconciler;
        match self.target.sign_of(id) {
            Some(sign) => sign
                .interpretations
                .iter()
                .filter(|i| !reconciler.is_anchor(i))
                .map(|i| i.id)
                .collect(),
            None => vec![id],
        }
    }

    fn delete(&mut self, target: SignInterpretationId) {
        self.plan.push(EditOperation::Delete {
            target,
            predecessors: self.target.predecessors(target),
            successors: self.target.successors(target),
        });
    }
}

/// Target data with the source's annotations copied over.
///
/// Attributes are replaced; commentary and ROIs are replaced only when the
/// source carries them. Edges and the variant flag stay with the target.
fn merge(target: &SignInterpretationData, source: &SignInterpretationData) -> SignInterpretationData {
    let mut merged = target.clone();
    merged.attributes = source.attributes.clone();
    if !source.commentary.is_empty() {
        merged.commentary = source.commentary.clone();
    }
    if !source.rois.is_empty() {
        merged.rois = source.rois.clone();
    }
    merged
}

/// Source data without its source-line edges.
fn detached(data: &SignInterpretationData) -> SignInterpretationData {
    let mut data = data.clone();
    data.next_interpretations.clear();
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::LineBuilder;
    use crate::types::{ArtefactId, AttributeValueId, Commentary, InterpretationRoi, Polygon};

    const EDITOR: AuthorId = AuthorId::new(1);
    const IMPORTER: AuthorId = AuthorId::new(2);

    fn target<'v>(vocab: &'v AttributeVocabulary) -> LineBuilder<'v> {
        LineBuilder::new(vocab, EDITOR)
    }

    fn source<'v>(vocab: &'v AttributeVocabulary) -> LineBuilder<'v> {
        LineBuilder::new(vocab, IMPORTER).unanchored().starting_at(1000)
    }

    #[test]
    fn test_identical_lines_keep_everything() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).sign("a").variants(&["b", "β"]).sign("c").build();
        let ingested = source(&vocab).sign("a").variants(&["b", "β"]).sign("c").build();

        let plan = Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested).unwrap();
        assert_eq!(plan.num_keeps(), 4);
        assert!(plan.is_noop());
        assert_eq!(plan.target_fingerprint, stored.fingerprint());
    }

    #[test]
    fn test_attribute_change_is_update() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).text("ab").build();
        let damaged = SignInterpretationData::character("b")
            .with_attribute(vocab.id(crate::vocabulary::AttributeRole::DamageProbable));
        let ingested = source(&vocab).sign("a").sign_data(damaged.clone()).build();

        let plan = Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested).unwrap();
        assert_eq!((plan.num_keeps(), plan.num_updates()), (1, 1));
        let EditOperation::Update { target, data } = &plan.operations[1] else {
            panic!("expected update, got {:?}", plan.operations[1]);
        };
        assert_eq!(*target, stored.signs[2].interpretations[0].id);
        assert_eq!(data.attributes, damaged.attributes);
        // Edges stay with the target.
        assert_eq!(data.next_interpretations, stored.signs[2].interpretations[0].data.next_interpretations);
    }

    #[test]
    fn test_merge_keeps_target_notes_when_source_has_none() {
        let noted = SignInterpretationData::character("a")
            .with_commentary(Commentary::note("ink blot"))
            .with_roi(InterpretationRoi::new(ArtefactId::new(1), Polygon::rectangle(0.0, 0.0, 1.0, 1.0)));
        let plain = SignInterpretationData::character("a").with_attribute(AttributeValueId::new(50));

        let merged = merge(&noted, &plain);
        assert_eq!(merged.commentary, noted.commentary);
        assert_eq!(merged.rois, noted.rois);
        assert!(merged.has_attribute(AttributeValueId::new(50)));
    }

    #[test]
    fn test_new_variant_attaches_to_existing_sign() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).text("abc").build();
        let ingested = source(&vocab).sign("a").variants(&["b", "β"]).sign("c").build();

        let plan = Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested).unwrap();
        assert_eq!((plan.num_inserts(), plan.num_deletes()), (1, 0));
        let a = stored.signs[1].interpretations[0].id;
        let c = stored.signs[3].interpretations[0].id;
        assert_eq!(
            plan.operations[2],
            EditOperation::Insert {
                placement: SignPlacement::ExistingSign { sign_id: stored.signs[2].id },
                interpretations: vec![SignInterpretationData::character("β").variant()],
                anchors_before: vec![a.into()],
                anchors_after: vec![c.into()],
                break_anchor_links: false,
                source_ids: vec![ingested.signs[1].interpretations[1].id],
            }
        );
    }

    #[test]
    fn test_unmatched_variant_is_deleted() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).sign("a").variants(&["b", "β"]).sign("c").build();
        let ingested = source(&vocab).text("abc").build();

        let plan = Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested).unwrap();
        assert_eq!(plan.deleted_ids(), vec![stored.signs[2].interpretations[1].id]);
        assert_eq!(plan.num_inserts(), 0);
    }

    #[test]
    fn test_first_equal_target_wins() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).sign("a").variants(&["b", "b"]).build();
        let ingested = source(&vocab).text("ab").build();

        let plan = Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested).unwrap();
        assert_eq!(plan.deleted_ids(), vec![stored.signs[2].interpretations[1].id]);
        assert!(plan
            .operations
            .contains(&EditOperation::Keep { target: stored.signs[2].interpretations[0].id }));
    }

    #[test]
    fn test_substitution_inserts_then_deletes() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).text("abc").build();
        let ingested = source(&vocab).text("abd").build();

        let plan = Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested).unwrap();
        let kinds: Vec<&str> = plan.operations.iter().map(EditOperation::kind).collect();
        assert_eq!(kinds, vec!["keep", "keep", "insert", "delete"]);
        assert_eq!(plan.deleted_ids(), vec![stored.signs[3].interpretations[0].id]);
    }

    #[test]
    fn test_ambiguous_alignment_requires_hint() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).text("aa").build();
        let ingested = source(&vocab).text("a").build();
        let reconciler = Reconciler::new(&vocab, IMPORTER);

        assert_eq!(
            reconciler.reconcile(&stored, &ingested),
            Err(ReconcileError::AlignmentAmbiguous { line: stored.id, cost: 1, optimal_alignments: 2 })
        );

        let plan = reconciler
            .reconcile_with_hint(&stored, &ingested, AlignmentHint::PreferEarlierMatch)
            .unwrap();
        assert_eq!(plan.deleted_ids(), vec![stored.signs[2].interpretations[0].id]);
    }

    #[test]
    fn test_new_sign_precedes_every_variant_of_next_sign() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).sign("a").variants(&["a", "c"]).build();
        let ingested = source(&vocab).sign("a").sign("b").variants(&["a", "c"]).build();

        let plan = Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested).unwrap();
        let next = &stored.signs[2];
        let EditOperation::Insert { placement, anchors_after, break_anchor_links, .. } = &plan.operations[1] else {
            panic!("expected insert, got {:?}", plan.operations[1]);
        };
        assert_eq!(*placement, SignPlacement::NewSign);
        assert!(*break_anchor_links);
        assert_eq!(
            anchors_after,
            &vec![next.interpretations[0].id.into(), next.interpretations[1].id.into()]
        );
    }

    #[test]
    fn test_target_without_anchors_is_rejected() {
        let vocab = AttributeVocabulary::default();
        let stored = LineBuilder::new(&vocab, EDITOR).unanchored().text("ab").build();
        let ingested = source(&vocab).text("ab").build();

        assert!(matches!(
            Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested),
            Err(ReconcileError::Anchor(AnchorError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_empty_source_deletes_everything_but_anchors() {
        let vocab = AttributeVocabulary::default();
        let stored = target(&vocab).text("ab").build();
        let ingested = source(&vocab).build();

        let plan = Reconciler::new(&vocab, IMPORTER).reconcile(&stored, &ingested).unwrap();
        assert_eq!(
            plan.deleted_ids(),
            vec![stored.signs[1].interpretations[0].id, stored.signs[2].interpretations[0].id]
        );
    }
}
