//! Property tests for graph invariants under random edits.

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use sign_stream_kernel::{
    AlignmentHint, AnchorKind, AttributeVocabulary, AuthorId, EditPlan, EditionId, Line,
    LineAnchors, LineBuilder, LineId, Linearizer, Reconciler, SignInterpretationData,
    SignInterpretationGraph, SignInterpretationId, SurroundingAnchors,
};

const EDITOR: AuthorId = AuthorId::new(1);

/// A line with `n` single-reading signs, plus the ids in line order.
fn make_line(n: usize) -> (SignInterpretationGraph, LineId, Vec<SignInterpretationId>) {
    let mut graph = SignInterpretationGraph::new(EditionId::new(1), Arc::new(AttributeVocabulary::default()));
    let fragment = graph.create_text_fragment("frg. 1", EDITOR);
    let line_id = graph.append_line(fragment, "1", EDITOR).unwrap();
    let line = graph.line(line_id).unwrap();
    let anchors = LineAnchors::new(graph.vocabulary());
    let start = anchors.find_anchor(&line, AnchorKind::Start).unwrap();
    let end = anchors.find_anchor(&line, AnchorKind::End).unwrap();

    let mut ids = vec![start];
    for i in 0..n {
        let around = SurroundingAnchors { before: vec![ids[i]], after: vec![end] };
        let (_, created) = graph
            .create_sign_with_interpretations(
                line_id,
                vec![SignInterpretationData::character(format!("s{i}"))],
                &around,
                EDITOR,
            )
            .unwrap();
        ids.push(created[0]);
    }
    ids.push(end);
    (graph, line_id, ids)
}

/// Signs of one to three distinct readings; the first of each is the main one.
fn variant_signs() -> impl Strategy<Value = Vec<Vec<String>>> {
    proptest::collection::vec(
        proptest::collection::btree_set(prop::sample::select(vec!["a", "b", "c", "d"]), 1..4)
            .prop_map(|readings| readings.into_iter().map(String::from).collect::<Vec<_>>()),
        1..5,
    )
}

fn variant_line(signs: &[Vec<String>], first_id: u32) -> Line {
    signs
        .iter()
        .fold(
            LineBuilder::new(&AttributeVocabulary::default(), EDITOR)
                .unanchored()
                .starting_at(first_id),
            |b, readings| {
                let readings: Vec<&str> = readings.iter().map(String::as_str).collect();
                b.variants(&readings)
            },
        )
        .build()
}

fn comparisons(vocab: &AttributeVocabulary, line: &Line) -> BTreeSet<String> {
    Linearizer::new(vocab)
        .linearize(line)
        .unwrap()
        .into_iter()
        .map(|s| s.comparison)
        .collect()
}

/// Reconcile, falling back to a hint when the alignment is ambiguous.
fn plan_for(reconciler: &Reconciler<'_>, target: &Line, source: &Line) -> EditPlan {
    reconciler
        .reconcile(target, source)
        .or_else(|_| reconciler.reconcile_with_hint(target, source, AlignmentHint::PreferEarlierMatch))
        .unwrap()
}

fn letters() -> impl Strategy<Value = String> {
    proptest::collection::vec(prop::sample::select(vec!['a', 'b', 'c', 'd']), 0..8)
        .prop_map(|chars| chars.into_iter().collect())
}

proptest! {
    #[test]
    fn prop_random_edges_stay_acyclic(
        n in 1..12usize,
        edges in proptest::collection::vec((0..14usize, 0..14usize, 1..4u32), 0..40)
    ) {
        let (mut graph, _, ids) = make_line(n);
        for (from, to, author) in edges {
            let (from, to) = (ids[from % ids.len()], ids[to % ids.len()]);
            let before = graph.num_edges();
            if graph.add_next_edge(from, to, AuthorId::new(author)).is_err() {
                // rejected edges leave the graph untouched
                prop_assert_eq!(graph.num_edges(), before);
            }
            prop_assert!(graph.is_acyclic());
        }
    }

    #[test]
    fn prop_deletion_preserves_reachability(
        n in 2..10usize,
        extra in proptest::collection::vec((0..12usize, 0..12usize), 0..15),
        victim in 1..10usize
    ) {
        let (mut graph, _, ids) = make_line(n);
        for (from, to) in extra {
            let (from, to) = (ids[from % ids.len()], ids[to % ids.len()]);
            let _ = graph.add_next_edge(from, to, AuthorId::new(2));
        }
        // never an anchor: ids[0] and the last entry are the line anchors
        let x = ids[1 + victim % n];
        let predecessors = graph.predecessors(x).unwrap();
        let successors = graph.successors(x).unwrap();

        graph.delete_interpretation(x).unwrap();

        prop_assert!(!graph.contains(x));
        prop_assert!(graph.is_acyclic());
        for p in &predecessors {
            prop_assert!(!graph.successors(*p).unwrap().contains(&x));
            for s in &successors {
                prop_assert!(graph.reachable(*p, *s), "{} lost its path to {}", p, s);
            }
        }
    }

    #[test]
    fn prop_reconcile_then_apply_reads_source(target in letters(), source in letters()) {
        let vocab = AttributeVocabulary::default();
        let (mut graph, line_id, _) = make_line(0);
        let seed = LineBuilder::new(&vocab, EDITOR).unanchored().starting_at(1_000).text(&target).build();
        let empty = graph.line(line_id).unwrap();
        let plan = Reconciler::new(&vocab, EDITOR)
            .reconcile(&empty, &seed)
            .unwrap();
        graph.apply_edit_plan(&plan).unwrap();

        let stored = graph.line(line_id).unwrap();
        let ingested = LineBuilder::new(&vocab, EDITOR).unanchored().starting_at(2_000).text(&source).build();
        let reconciler = Reconciler::new(&vocab, AuthorId::new(2));
        // ambiguous alignments are resolved by a hint, never guessed
        let plan = match reconciler.reconcile(&stored, &ingested) {
            Ok(plan) => plan,
            Err(_) => reconciler
                .reconcile_with_hint(&stored, &ingested, AlignmentHint::PreferEarlierMatch)
                .unwrap(),
        };
        graph.apply_edit_plan(&plan).unwrap();

        let line = graph.line(line_id).unwrap();
        let text = Linearizer::new(&vocab).comparison_string(&line).unwrap();
        prop_assert_eq!(text, source);
        prop_assert!(graph.is_acyclic());
        prop_assert!(LineAnchors::new(&vocab).validate(&line).is_ok());

        let distinct: BTreeSet<_> = line.signs.iter().map(|s| s.id).collect();
        prop_assert_eq!(distinct.len(), line.signs.len());
    }

    #[test]
    fn prop_variant_readings_survive_reconcile(target in variant_signs(), source in variant_signs()) {
        let vocab = AttributeVocabulary::default();
        let (mut graph, line_id, _) = make_line(0);
        let empty = graph.line(line_id).unwrap();
        let seed = plan_for(&Reconciler::new(&vocab, EDITOR), &empty, &variant_line(&target, 1_000));
        graph.apply_edit_plan(&seed).unwrap();

        let ingested = variant_line(&source, 2_000);
        let expected = comparisons(&vocab, &ingested);
        let reconciler = Reconciler::new(&vocab, AuthorId::new(2));

        let stored = graph.line(line_id).unwrap();
        graph.apply_edit_plan(&plan_for(&reconciler, &stored, &ingested)).unwrap();
        let merged = graph.line(line_id).unwrap();
        prop_assert_eq!(comparisons(&vocab, &merged), expected.clone());
        prop_assert!(graph.is_acyclic());
        prop_assert!(LineAnchors::new(&vocab).validate(&merged).is_ok());

        // a second pass changes nothing once the preferred readings agree
        let again = plan_for(&reconciler, &merged, &ingested);
        let linearizer = Linearizer::new(&vocab);
        if linearizer.comparison_string(&merged).unwrap() == linearizer.comparison_string(&ingested).unwrap() {
            prop_assert!(again.is_noop(), "{:?}", again.operations);
        }
        graph.apply_edit_plan(&again).unwrap();
        prop_assert_eq!(comparisons(&vocab, &graph.line(line_id).unwrap()), expected);
    }
}
