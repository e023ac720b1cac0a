//! Atomic application of edit plans.

use std::collections::BTreeMap;

use super::{GraphError, SignInterpretationGraph};
use crate::types::{
    AppliedEditPlan, EditOperation, EditPlan, InterpretationRef, SignInterpretationId, SignPlacement,
};

/// Interpretations created so far, keyed by the index of the creating operation.
type Planned = BTreeMap<usize, Vec<SignInterpretationId>>;

impl SignInterpretationGraph {
    /// Apply every operation of `plan` or none of them.
    ///
    /// Operations run in plan order against a staged copy of the graph; the
    /// copy replaces the graph only if all of them succeed. Update operations
    /// keep the target's current next-edges.
    pub fn apply_edit_plan(&mut self, plan: &EditPlan) -> Result<AppliedEditPlan, GraphError> {
        if !self.lines.contains_key(&plan.line_id) {
            return Err(GraphError::LineNotFound(plan.line_id));
        }
        let result = self.transaction(|graph| graph.apply_operations(plan));
        match &result {
            Ok(applied) => tracing::info!(
                edition = %self.edition_id,
                plan = %plan.id,
                line = %plan.line_id,
                created = applied.created.len(),
                updated = applied.updated.len(),
                deleted = applied.deleted.len(),
                "applied edit plan"
            ),
            Err(e) => tracing::warn!(
                edition = %self.edition_id,
                plan = %plan.id,
                error = %e,
                "edit plan rejected"
            ),
        }
        result
    }

    fn apply_operations(&mut self, plan: &EditPlan) -> Result<AppliedEditPlan, GraphError> {
        let mut applied = AppliedEditPlan::new(plan.id, plan.line_id);
        let mut planned = Planned::new();

        for (index, op) in plan.operations.iter().enumerate() {
            tracing::trace!(plan = %plan.id, index, op = op.kind(), "applying operation");
            match op {
                EditOperation::Keep { target } => {
                    self.get_interpretation(*target)?;
                }
                EditOperation::Update { target, data } => {
                    let edges = self.get_interpretation(*target)?.data.next_interpretations.clone();
                    let mut data = data.clone();
                    data.next_interpretations = edges;
                    self.update_interpretation(*target, data)?;
                    applied.updated.push(*target);
                }
                EditOperation::Insert {
                    placement,
                    interpretations,
                    anchors_before,
                    anchors_after,
                    break_anchor_links,
                    ..
                } => {
                    let before = resolve(&planned, anchors_before)?;
                    let after = resolve(&planned, anchors_after)?;
                    let sign_id = match placement {
                        SignPlacement::NewSign => {
                            let sign_id = self.create_spliced_sign(plan.line_id, &before, &after)?;
                            applied.created_signs.push(sign_id);
                            sign_id
                        }
                        SignPlacement::ExistingSign { sign_id } => *sign_id,
                    };
                    let created = self.splice(
                        sign_id,
                        interpretations.clone(),
                        &before,
                        &after,
                        *break_anchor_links,
                        plan.author,
                    )?;
                    applied.created.extend(created.iter().copied());
                    planned.insert(index, created);
                }
                EditOperation::Delete { target, .. } => {
                    let outcome = self.delete_interpretation(*target)?;
                    applied.deleted.push(outcome.deleted);
                    applied.deleted_signs.extend(outcome.removed_sign);
                    applied.rewired.extend(outcome.rewired);
                }
            }
        }
        Ok(applied)
    }
}

fn resolve(planned: &Planned, refs: &[InterpretationRef]) -> Result<Vec<SignInterpretationId>, GraphError> {
    refs.iter()
        .map(|r| match *r {
            InterpretationRef::Stored { id } => Ok(id),
            InterpretationRef::Planned { op, index } => planned
                .get(&op)
                .and_then(|ids| ids.get(index))
                .copied()
                .ok_or(GraphError::UnresolvedReference { op, index }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::anchors::{AnchorKind, LineAnchors};
    use crate::types::{AuthorId, EditionId, LineId, SignInterpretationData};
    use crate::vocabulary::AttributeVocabulary;

    const AUTHOR: AuthorId = AuthorId::new(7);

    fn empty_line() -> (SignInterpretationGraph, LineId) {
        let mut graph = SignInterpretationGraph::new(EditionId::new(1), Arc::new(AttributeVocabulary::default()));
        let fragment = graph.create_text_fragment("frg. 1", AUTHOR);
        let line = graph.append_line(fragment, "1", AUTHOR).unwrap();
        (graph, line)
    }

    fn insert_new_sign(
        character: &str,
        before: InterpretationRef,
        after: InterpretationRef,
    ) -> EditOperation {
        EditOperation::Insert {
            placement: SignPlacement::NewSign,
            interpretations: vec![SignInterpretationData::character(character)],
            anchors_before: vec![before],
            anchors_after: vec![after],
            break_anchor_links: true,
            source_ids: Vec::new(),
        }
    }

    fn chars(graph: &SignInterpretationGraph, line_id: LineId) -> String {
        graph
            .line(line_id)
            .unwrap()
            .interpretations()
            .map(|i| i.character().to_string())
            .collect()
    }

    #[test]
    fn test_apply_chained_inserts() {
        let (mut graph, line_id) = empty_line();
        let line = graph.line(line_id).unwrap();
        let anchors = LineAnchors::new(graph.vocabulary());
        let start = anchors.find_anchor(&line, AnchorKind::Start).unwrap();
        let end = anchors.find_anchor(&line, AnchorKind::End).unwrap();

        let mut plan = EditPlan::new(line_id, line.fingerprint(), AUTHOR);
        let first = plan.push(insert_new_sign("a", start.into(), end.into()));
        plan.push(insert_new_sign("b", InterpretationRef::Planned { op: first, index: 0 }, end.into()));

        let applied = graph.apply_edit_plan(&plan).unwrap();
        assert_eq!(applied.created.len(), 2);
        assert_eq!(applied.created_signs.len(), 2);
        assert_eq!(chars(&graph, line_id), "ab");

        let (a, b) = (applied.created[0], applied.created[1]);
        assert_eq!(graph.successors(start).unwrap(), vec![a]);
        assert_eq!(graph.successors(a).unwrap(), vec![b]);
        assert_eq!(graph.successors(b).unwrap(), vec![end]);
        assert!(graph.is_acyclic());
    }

    #[test]
    fn test_update_keeps_edges() {
        let (mut graph, line_id) = empty_line();
        let line = graph.line(line_id).unwrap();
        let anchors = LineAnchors::new(graph.vocabulary());
        let start = anchors.find_anchor(&line, AnchorKind::Start).unwrap();
        let end = anchors.find_anchor(&line, AnchorKind::End).unwrap();

        let mut setup = EditPlan::new(line_id, line.fingerprint(), AUTHOR);
        setup.push(insert_new_sign("a", start.into(), end.into()));
        let a = graph.apply_edit_plan(&setup).unwrap().created[0];

        let mut plan = EditPlan::new(line_id, graph.line(line_id).unwrap().fingerprint(), AUTHOR);
        plan.push(EditOperation::Update {
            target: a,
            data: SignInterpretationData::character("α"),
        });
        let applied = graph.apply_edit_plan(&plan).unwrap();

        assert_eq!(applied.updated, vec![a]);
        assert_eq!(graph.get_interpretation(a).unwrap().character(), "α");
        assert_eq!(graph.successors(a).unwrap(), vec![end]);
    }

    #[test]
    fn test_failed_plan_leaves_graph_unchanged() {
        let (mut graph, line_id) = empty_line();
        let line = graph.line(line_id).unwrap();
        let anchors = LineAnchors::new(graph.vocabulary());
        let start = anchors.find_anchor(&line, AnchorKind::Start).unwrap();
        let end = anchors.find_anchor(&line, AnchorKind::End).unwrap();
        let before = graph.line(line_id).unwrap();

        let mut plan = EditPlan::new(line_id, line.fingerprint(), AUTHOR);
        plan.push(insert_new_sign("a", start.into(), end.into()));
        plan.push(EditOperation::Delete {
            target: start,
            predecessors: Vec::new(),
            successors: Vec::new(),
        });

        assert_eq!(graph.apply_edit_plan(&plan), Err(GraphError::AnchorProtected(start)));
        assert_eq!(graph.line(line_id).unwrap(), before);
    }

    #[test]
    fn test_unresolved_planned_reference() {
        let (mut graph, line_id) = empty_line();
        let line = graph.line(line_id).unwrap();
        let end = LineAnchors::new(graph.vocabulary()).find_anchor(&line, AnchorKind::End).unwrap();

        let mut plan = EditPlan::new(line_id, line.fingerprint(), AUTHOR);
        plan.push(insert_new_sign("a", InterpretationRef::Planned { op: 3, index: 0 }, end.into()));

        assert_eq!(
            graph.apply_edit_plan(&plan),
            Err(GraphError::UnresolvedReference { op: 3, index: 0 })
        );
    }
}
