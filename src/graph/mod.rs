//! Sign-interpretation graph of one edition.
//!
//! The graph is an arena of interpretations indexed by id. Next-edges are
//! adjacency lists of ids stored on each interpretation, with a reverse
//! predecessor index kept alongside. Signs, lines and fragments are id lists
//! over the arena.
//!
//! ## Invariants (hold after every successful mutation)
//!
//! 1. Next-edges form a DAG.
//! 2. Interpretation ids are unique and never reused.
//! 3. A `(next, author)` pair appears at most once per interpretation.
//! 4. Deleting an interpretation reconnects its predecessors to its successors.
//!
//! Failing operations leave the graph unmodified.

mod apply;
mod error;

pub use error::GraphError;

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::Arc;

use crate::anchors::{LineAnchors, SurroundingAnchors};
use crate::types::{
    AuthorId, DeletionOutcome, EditionId, Line, LineId, NextInterpretation, RewiredEdge, Sign,
    SignId, SignInterpretation, SignInterpretationData, SignInterpretationId, TextFragment,
    TextFragmentId,
};
use crate::vocabulary::{AttributeRole, AttributeVocabulary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignOwner {
    Line(LineId),
    Fragment(TextFragmentId),
}

#[derive(Debug, Clone)]
struct SignRecord {
    owner: SignOwner,
    interpretations: Vec<SignInterpretationId>,
}

#[derive(Debug, Clone)]
struct LineRecord {
    fragment_id: TextFragmentId,
    name: String,
    signs: Vec<SignId>,
}

#[derive(Debug, Clone)]
struct FragmentRecord {
    name: String,
    boundary_signs: [SignId; 2],
    lines: Vec<LineId>,
}

/// Monotonic id counters. Ids are never handed out twice.
#[derive(Debug, Clone, Default)]
struct IdAllocator {
    interpretation: u32,
    sign: u32,
    line: u32,
    fragment: u32,
}

impl IdAllocator {
    fn interpretation(&mut self) -> SignInterpretationId {
        self.interpretation += 1;
        SignInterpretationId::new(self.interpretation)
    }

    fn sign(&mut self) -> SignId {
        self.sign += 1;
        SignId::new(self.sign)
    }

    fn line(&mut self) -> LineId {
        self.line += 1;
        LineId::new(self.line)
    }

    fn fragment(&mut self) -> TextFragmentId {
        self.fragment += 1;
        TextFragmentId::new(self.fragment)
    }
}

/// The sign-interpretation graph of one edition.
///
/// Mutations must be serialized per edition; see
/// [`crate::store::InMemoryEditionStore`] for the locking discipline.
#[derive(Debug, Clone)]
pub struct SignInterpretationGraph {
    edition_id: EditionId,
    vocabulary: Arc<AttributeVocabulary>,
    ids: IdAllocator,
    interpretations: BTreeMap<SignInterpretationId, SignInterpretation>,
    /// Reverse index: target -> interpretations with an edge into it.
    predecessors: BTreeMap<SignInterpretationId, BTreeSet<SignInterpretationId>>,
    signs: BTreeMap<SignId, SignRecord>,
    lines: BTreeMap<LineId, LineRecord>,
    fragments: BTreeMap<TextFragmentId, FragmentRecord>,
    fragment_order: Vec<TextFragmentId>,
}

impl SignInterpretationGraph {
    /// Create an empty graph for an edition.
    pub fn new(edition_id: EditionId, vocabulary: Arc<AttributeVocabulary>) -> Self {
        Self {
            edition_id,
            vocabulary,
            ids: IdAllocator::default(),
            interpretations: BTreeMap::new(),
            predecessors: BTreeMap::new(),
            signs: BTreeMap::new(),
            lines: BTreeMap::new(),
            fragments: BTreeMap::new(),
            fragment_order: Vec::new(),
        }
    }

    /// The edition this graph belongs to.
    pub fn edition_id(&self) -> EditionId {
        self.edition_id
    }

    /// The attribute vocabulary.
    pub fn vocabulary(&self) -> &AttributeVocabulary {
        &self.vocabulary
    }

    /// Number of interpretations.
    pub fn num_interpretations(&self) -> usize {
        self.interpretations.len()
    }

    /// Number of `(from, next, author)` edges.
    pub fn num_edges(&self) -> usize {
        self.interpretations
            .values()
            .map(|i| i.data.next_interpretations.len())
            .sum()
    }

    /// Whether the interpretation exists.
    pub fn contains(&self, id: SignInterpretationId) -> bool {
        self.interpretations.contains_key(&id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Fetch an interpretation.
    pub fn get_interpretation(&self, id: SignInterpretationId) -> Result<&SignInterpretation, GraphError> {
        self.interpretations
            .get(&id)
            .ok_or(GraphError::InterpretationNotFound(id))
    }

    /// Interpretations with an edge into `id`, ordered by id.
    pub fn predecessors(&self, id: SignInterpretationId) -> Result<Vec<SignInterpretationId>, GraphError> {
        self.get_interpretation(id)?;
        Ok(self
            .predecessors
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Successors of `id` in edge insertion order.
    pub fn successors(&self, id: SignInterpretationId) -> Result<Vec<SignInterpretationId>, GraphError> {
        Ok(self.get_interpretation(id)?.data.next_ids())
    }

    /// Whether `to` can be reached from `from` by following next-edges.
    pub fn reachable(&self, from: SignInterpretationId, to: SignInterpretationId) -> bool {
        if from == to {
            return true;
        }
        let mut visited: HashSet<SignInterpretationId> = HashSet::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if let Some(node) = self.interpretations.get(&id) {
                for edge in &node.data.next_interpretations {
                    if edge.next == to {
                        return true;
                    }
                    if !visited.contains(&edge.next) {
                        stack.push(edge.next);
                    }
                }
            }
        }
        false
    }

    /// Whether the next-edges form a DAG (Kahn's algorithm).
    pub fn is_acyclic(&self) -> bool {
        let mut in_degree: BTreeMap<SignInterpretationId, usize> =
            self.interpretations.keys().map(|id| (*id, 0)).collect();
        for node in self.interpretations.values() {
            for next in node.data.next_ids() {
                if let Some(d) = in_degree.get_mut(&next) {
                    *d += 1;
                }
            }
        }
        let mut queue: VecDeque<SignInterpretationId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut seen = 0;
        while let Some(id) = queue.pop_front() {
            seen += 1;
            if let Some(node) = self.interpretations.get(&id) {
                for next in node.data.next_ids() {
                    if let Some(d) = in_degree.get_mut(&next) {
                        *d -= 1;
                        if *d == 0 {
                            queue.push_back(next);
                        }
                    }
                }
            }
        }
        seen == self.interpretations.len()
    }

    /// Fragment ids in creation order.
    pub fn fragment_ids(&self) -> &[TextFragmentId] {
        &self.fragment_order
    }

    /// Line ids of a fragment, in order.
    pub fn line_ids(&self, fragment_id: TextFragmentId) -> Result<Vec<LineId>, GraphError> {
        self.fragments
            .get(&fragment_id)
            .map(|f| f.lines.clone())
            .ok_or(GraphError::FragmentNotFound(fragment_id))
    }

    /// The line a sign belongs to, if any.
    pub fn line_of_sign(&self, sign_id: SignId) -> Option<LineId> {
        match self.signs.get(&sign_id)?.owner {
            SignOwner::Line(line_id) => Some(line_id),
            SignOwner::Fragment(_) => None,
        }
    }

    /// Snapshot of a line.
    pub fn line(&self, line_id: LineId) -> Result<Line, GraphError> {
        let record = self
            .lines
            .get(&line_id)
            .ok_or(GraphError::LineNotFound(line_id))?;
        Ok(Line {
            id: line_id,
            fragment_id: Some(record.fragment_id),
            name: record.name.clone(),
            signs: record.signs.iter().map(|s| self.sign_snapshot(*s)).collect(),
        })
    }

    /// Snapshot of a line looked up by name.
    pub fn line_by_name(&self, fragment_id: TextFragmentId, name: &str) -> Result<Line, GraphError> {
        let fragment = self
            .fragments
            .get(&fragment_id)
            .ok_or(GraphError::FragmentNotFound(fragment_id))?;
        let line_id = fragment
            .lines
            .iter()
            .copied()
            .find(|l| self.lines.get(l).map(|r| r.name == name).unwrap_or(false))
            .ok_or_else(|| GraphError::LineNameNotFound {
                fragment: fragment_id,
                name: name.to_string(),
            })?;
        self.line(line_id)
    }

    /// Snapshot of a text fragment with all its lines.
    pub fn fragment(&self, fragment_id: TextFragmentId) -> Result<TextFragment, GraphError> {
        let record = self
            .fragments
            .get(&fragment_id)
            .ok_or(GraphError::FragmentNotFound(fragment_id))?;
        let lines = record
            .lines
            .iter()
            .map(|l| self.line(*l))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TextFragment {
            id: fragment_id,
            name: record.name.clone(),
            boundary_signs: record
                .boundary_signs
                .iter()
                .map(|s| self.sign_snapshot(*s))
                .collect(),
            lines,
        })
    }

    fn sign_snapshot(&self, sign_id: SignId) -> Sign {
        let interpretations = self
            .signs
            .get(&sign_id)
            .map(|r| {
                r.interpretations
                    .iter()
                    .filter_map(|id| self.interpretations.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Sign::new(sign_id, interpretations)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────────────────

    /// Create an empty text fragment with its start and end anchors.
    pub fn create_text_fragment(&mut self, name: impl Into<String>, author: AuthorId) -> TextFragmentId {
        let fragment_id = self.ids.fragment();
        let start_sign = self.new_sign(SignOwner::Fragment(fragment_id));
        let end_sign = self.new_sign(SignOwner::Fragment(fragment_id));

        let start_data = self.anchor_data(AttributeRole::FragmentStart);
        let end_data = self.anchor_data(AttributeRole::FragmentEnd);
        let start = self.insert_unchecked(start_sign, start_data);
        let end = self.insert_unchecked(end_sign, end_data);
        self.link(start, end, author);

        self.fragments.insert(
            fragment_id,
            FragmentRecord {
                name: name.into(),
                boundary_signs: [start_sign, end_sign],
                lines: Vec::new(),
            },
        );
        self.fragment_order.push(fragment_id);
        tracing::debug!(edition = %self.edition_id, fragment = %fragment_id, "created text fragment");
        fragment_id
    }

    /// Create a line at `position` in a fragment, with its start and end
    /// anchors spliced into the fragment's chain.
    pub fn insert_line(
        &mut self,
        fragment_id: TextFragmentId,
        position: usize,
        name: impl Into<String>,
        author: AuthorId,
    ) -> Result<LineId, GraphError> {
        let fragment = self.fragment(fragment_id)?;
        let around = LineAnchors::new(&self.vocabulary).anchors_between_lines(&fragment, position)?;

        let line_id = self.ids.line();
        self.lines.insert(
            line_id,
            LineRecord {
                fragment_id,
                name: name.into(),
                signs: Vec::new(),
            },
        );
        let start_sign = self.new_sign(SignOwner::Line(line_id));
        let end_sign = self.new_sign(SignOwner::Line(line_id));
        if let Some(record) = self.lines.get_mut(&line_id) {
            record.signs = vec![start_sign, end_sign];
        }

        let start_data = self.anchor_data(AttributeRole::LineStart);
        let end_data = self.anchor_data(AttributeRole::LineEnd);
        let start = self.insert_unchecked(start_sign, start_data);
        let end = self.insert_unchecked(end_sign, end_data);
        self.link(start, end, author);
        for after in &around.after {
            self.link(end, *after, author);
        }
        for before in &around.before {
            for after in &around.after {
                self.unlink_all(*before, *after);
            }
            self.link(*before, start, author);
        }

        if let Some(record) = self.fragments.get_mut(&fragment_id) {
            record.lines.insert(position, line_id);
        }
        tracing::debug!(
            edition = %self.edition_id,
            fragment = %fragment_id,
            line = %line_id,
            position,
            "inserted line"
        );
        Ok(line_id)
    }

    /// Append a line to a fragment.
    pub fn append_line(
        &mut self,
        fragment_id: TextFragmentId,
        name: impl Into<String>,
        author: AuthorId,
    ) -> Result<LineId, GraphError> {
        let position = self.line_ids(fragment_id)?.len();
        self.insert_line(fragment_id, position, name, author)
    }

    /// Create an empty sign in a line at `position` (clamped to the line length).
    pub fn create_sign(&mut self, line_id: LineId, position: usize) -> Result<SignId, GraphError> {
        if !self.lines.contains_key(&line_id) {
            return Err(GraphError::LineNotFound(line_id));
        }
        let sign_id = self.new_sign(SignOwner::Line(line_id));
        if let Some(record) = self.lines.get_mut(&line_id) {
            let index = position.min(record.signs.len());
            record.signs.insert(index, sign_id);
        }
        Ok(sign_id)
    }

    fn new_sign(&mut self, owner: SignOwner) -> SignId {
        let sign_id = self.ids.sign();
        self.signs.insert(
            sign_id,
            SignRecord {
                owner,
                interpretations: Vec::new(),
            },
        );
        sign_id
    }

    fn anchor_data(&self, role: AttributeRole) -> SignInterpretationData {
        SignInterpretationData::character("").with_attribute(self.vocabulary.id(role))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Interpretation CRUD
    // ─────────────────────────────────────────────────────────────────────

    /// Create an interpretation under a sign and return its new id.
    ///
    /// Duplicate `(next, author)` pairs in `data` are collapsed.
    pub fn create_interpretation(
        &mut self,
        sign_id: SignId,
        data: SignInterpretationData,
    ) -> Result<SignInterpretationId, GraphError> {
        if !self.signs.contains_key(&sign_id) {
            return Err(GraphError::SignNotFound(sign_id));
        }
        let data = self.validated(data)?;
        // A fresh node has no predecessors, so its edges cannot close a cycle.
        let id = self.insert_unchecked(sign_id, data);
        tracing::debug!(edition = %self.edition_id, sign = %sign_id, interpretation = %id, "created interpretation");
        Ok(id)
    }

    /// Replace an interpretation's complete data.
    pub fn update_interpretation(
        &mut self,
        id: SignInterpretationId,
        data: SignInterpretationData,
    ) -> Result<(), GraphError> {
        let current = self.get_interpretation(id)?;
        let data = self.validated(data)?;
        for edge in &data.next_interpretations {
            if edge.next == id
                || (!current.data.points_to(edge.next) && self.reachable(edge.next, id))
            {
                return Err(GraphError::Cycle { from: id, to: edge.next });
            }
        }

        self.unindex_edges(id);
        if let Some(node) = self.interpretations.get_mut(&id) {
            node.data = data;
        }
        self.index_edges(id);
        tracing::debug!(edition = %self.edition_id, interpretation = %id, "updated interpretation");
        Ok(())
    }

    /// Delete an interpretation, reconnecting its predecessors.
    ///
    /// Each predecessor loses its edges into `id` and gains an edge (same
    /// author) to every successor of `id` it can no longer reach otherwise.
    /// A sign left without interpretations is removed from its line.
    pub fn delete_interpretation(&mut self, id: SignInterpretationId) -> Result<DeletionOutcome, GraphError> {
        let node = self.get_interpretation(id)?;
        if self.vocabulary.is_anchor(&node.data) && self.signs.contains_key(&node.sign_id) {
            return Err(GraphError::AnchorProtected(id));
        }
        let sign_id = node.sign_id;
        let successors: Vec<SignInterpretationId> =
            node.data.next_ids().into_iter().filter(|n| *n != id).collect();
        let predecessors: Vec<SignInterpretationId> = self
            .predecessors
            .get(&id)
            .map(|set| set.iter().copied().filter(|p| *p != id).collect())
            .unwrap_or_default();

        let mut rewired = Vec::with_capacity(predecessors.len());
        for pred in predecessors {
            let removed = self.unlink_all(pred, id);
            let needed: Vec<SignInterpretationId> = successors
                .iter()
                .copied()
                .filter(|next| !self.reachable(pred, *next))
                .collect();
            for edge in removed {
                for next in &needed {
                    self.link(pred, *next, edge.author);
                }
                rewired.push(RewiredEdge {
                    from: pred,
                    removed: id,
                    added: needed.clone(),
                    author: edge.author,
                });
            }
        }

        self.unindex_edges(id);
        self.predecessors.remove(&id);
        self.interpretations.remove(&id);

        let mut removed_sign = None;
        if let Some(record) = self.signs.get_mut(&sign_id) {
            record.interpretations.retain(|i| *i != id);
            if record.interpretations.is_empty() {
                if let SignOwner::Line(line_id) = record.owner {
                    if let Some(line) = self.lines.get_mut(&line_id) {
                        line.signs.retain(|s| *s != sign_id);
                    }
                    self.signs.remove(&sign_id);
                    removed_sign = Some(sign_id);
                }
            }
        }

        tracing::debug!(
            edition = %self.edition_id,
            interpretation = %id,
            rewired = rewired.len(),
            sign_removed = removed_sign.is_some(),
            "deleted interpretation"
        );
        Ok(DeletionOutcome {
            deleted: id,
            removed_sign,
            rewired,
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Edges
    // ─────────────────────────────────────────────────────────────────────

    /// Add a next-edge. Returns `false` if the `(to, author)` pair already existed.
    pub fn add_next_edge(
        &mut self,
        from: SignInterpretationId,
        to: SignInterpretationId,
        author: AuthorId,
    ) -> Result<bool, GraphError> {
        let source = self.get_interpretation(from)?;
        self.get_interpretation(to)?;
        if from == to {
            return Err(GraphError::Cycle { from, to });
        }
        if source
            .data
            .next_interpretations
            .contains(&NextInterpretation::new(to, author))
        {
            return Ok(false);
        }
        if !source.data.points_to(to) && self.reachable(to, from) {
            return Err(GraphError::Cycle { from, to });
        }
        self.link(from, to, author);
        Ok(true)
    }

    /// Remove a next-edge. Returns whether it existed.
    pub fn remove_next_edge(
        &mut self,
        from: SignInterpretationId,
        to: SignInterpretationId,
        author: AuthorId,
    ) -> Result<bool, GraphError> {
        self.get_interpretation(from)?;
        let mut still_points = false;
        let mut removed = false;
        if let Some(node) = self.interpretations.get_mut(&from) {
            removed = node.data.remove_next(NextInterpretation::new(to, author));
            still_points = node.data.points_to(to);
        }
        if removed && !still_points {
            if let Some(set) = self.predecessors.get_mut(&to) {
                set.remove(&from);
            }
        }
        Ok(removed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Splicing (persistence-collaborator style operations)
    // ─────────────────────────────────────────────────────────────────────

    /// Create a sign holding `readings` and splice it between `anchors`,
    /// replacing the direct `before -> after` edges.
    pub fn create_sign_with_interpretations(
        &mut self,
        line_id: LineId,
        readings: Vec<SignInterpretationData>,
        anchors: &SurroundingAnchors,
        author: AuthorId,
    ) -> Result<(SignId, Vec<SignInterpretationId>), GraphError> {
        self.transaction(|graph| {
            let sign_id = graph.create_spliced_sign(line_id, &anchors.before, &anchors.after)?;
            let ids = graph.splice(sign_id, readings, &anchors.before, &anchors.after, true, author)?;
            Ok((sign_id, ids))
        })
    }

    /// Add readings to an existing sign, running parallel to the existing
    /// `before -> after` edges.
    pub fn add_sign_interpretations(
        &mut self,
        sign_id: SignId,
        readings: Vec<SignInterpretationData>,
        anchors: &SurroundingAnchors,
        author: AuthorId,
    ) -> Result<Vec<SignInterpretationId>, GraphError> {
        self.transaction(|graph| {
            graph.splice(sign_id, readings, &anchors.before, &anchors.after, false, author)
        })
    }

    /// Create a new sign placed after the first `before` anchor of the line,
    /// else before the first `after` anchor, else at the end.
    fn create_spliced_sign(
        &mut self,
        line_id: LineId,
        before: &[SignInterpretationId],
        after: &[SignInterpretationId],
    ) -> Result<SignId, GraphError> {
        let record = self
            .lines
            .get(&line_id)
            .ok_or(GraphError::LineNotFound(line_id))?;
        let position_of = |id: &SignInterpretationId| {
            self.interpretations
                .get(id)
                .and_then(|i| record.signs.iter().position(|s| *s == i.sign_id))
        };
        let position = before
            .iter()
            .find_map(|b| position_of(b).map(|p| p + 1))
            .or_else(|| after.iter().find_map(position_of))
            .unwrap_or(record.signs.len());
        self.create_sign(line_id, position)
    }

    /// Create readings under `sign_id` with edges `before -> new -> after`.
    /// Not atomic on its own; callers run it inside [`Self::transaction`].
    fn splice(
        &mut self,
        sign_id: SignId,
        readings: Vec<SignInterpretationData>,
        before: &[SignInterpretationId],
        after: &[SignInterpretationId],
        break_links: bool,
        author: AuthorId,
    ) -> Result<Vec<SignInterpretationId>, GraphError> {
        if !self.signs.contains_key(&sign_id) {
            return Err(GraphError::SignNotFound(sign_id));
        }
        for id in before.iter().chain(after) {
            self.get_interpretation(*id)?;
        }

        let mut created = Vec::with_capacity(readings.len());
        for mut data in readings {
            data.next_interpretations = after
                .iter()
                .map(|a| NextInterpretation::new(*a, author))
                .collect();
            created.push(self.create_interpretation(sign_id, data)?);
        }
        for b in before {
            for new in &created {
                self.add_next_edge(*b, *new, author)?;
            }
        }
        if break_links {
            for b in before {
                for a in after {
                    self.unlink_all(*b, *a);
                }
            }
        }
        Ok(created)
    }

    /// Run `f` against a staged copy and commit only if it succeeds.
    pub(crate) fn transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, GraphError>,
    ) -> Result<T, GraphError> {
        let mut staged = self.clone();
        let out = f(&mut staged)?;
        *self = staged;
        Ok(out)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    /// Reject duplicate attributes, collapse duplicate edges, check targets exist.
    fn validated(&self, mut data: SignInterpretationData) -> Result<SignInterpretationData, GraphError> {
        if let Some(attribute) = data.duplicate_attribute() {
            return Err(GraphError::DuplicateAttribute { attribute });
        }
        let mut edges: Vec<NextInterpretation> = Vec::with_capacity(data.next_interpretations.len());
        for edge in data.next_interpretations.drain(..) {
            if !self.interpretations.contains_key(&edge.next) {
                return Err(GraphError::InterpretationNotFound(edge.next));
            }
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
        data.next_interpretations = edges;
        Ok(data)
    }

    fn insert_unchecked(&mut self, sign_id: SignId, data: SignInterpretationData) -> SignInterpretationId {
        let id = self.ids.interpretation();
        self.interpretations
            .insert(id, SignInterpretation::new(id, sign_id, data));
        self.index_edges(id);
        if let Some(record) = self.signs.get_mut(&sign_id) {
            record.interpretations.push(id);
        }
        id
    }

    fn link(&mut self, from: SignInterpretationId, to: SignInterpretationId, author: AuthorId) {
        if let Some(node) = self.interpretations.get_mut(&from) {
            node.data.add_next(NextInterpretation::new(to, author));
            self.predecessors.entry(to).or_default().insert(from);
        }
    }

    fn unlink_all(&mut self, from: SignInterpretationId, to: SignInterpretationId) -> Vec<NextInterpretation> {
        let removed = self
            .interpretations
            .get_mut(&from)
            .map(|node| node.data.remove_edges_to(to))
            .unwrap_or_default();
        if let Some(set) = self.predecessors.get_mut(&to) {
            set.remove(&from);
        }
        removed
    }

    fn index_edges(&mut self, id: SignInterpretationId) {
        let targets = self
            .interpretations
            .get(&id)
            .map(|n| n.data.next_ids())
            .unwrap_or_default();
        for next in targets {
            self.predecessors.entry(next).or_default().insert(id);
        }
    }

    fn unindex_edges(&mut self, id: SignInterpretationId) {
        let targets = self
            .interpretations
            .get(&id)
            .map(|n| n.data.next_ids())
            .unwrap_or_default();
        for next in targets {
            if let Some(set) = self.predecessors.get_mut(&next) {
                set.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::AnchorKind;
    use crate::types::AttributeValueId;

    const AUTHOR: AuthorId = AuthorId::new(1);

    fn graph_with_line() -> (SignInterpretationGraph, LineId) {
        let mut graph = SignInterpretationGraph::new(EditionId::new(1), Arc::new(AttributeVocabulary::default()));
        let fragment = graph.create_text_fragment("frg. 1", AUTHOR);
        let line = graph.append_line(fragment, "1", AUTHOR).unwrap();
        (graph, line)
    }

    /// Splice `chars` as consecutive signs into an empty line.
    fn fill(graph: &mut SignInterpretationGraph, line_id: LineId, chars: &[&str]) -> Vec<SignInterpretationId> {
        let line = graph.line(line_id).unwrap();
        let anchors = LineAnchors::new(graph.vocabulary());
        let mut previous = anchors.find_anchor(&line, AnchorKind::Start).unwrap();
        let end = anchors.find_anchor(&line, AnchorKind::End).unwrap();
        let mut ids = Vec::new();
        for c in chars {
            let around = SurroundingAnchors { before: vec![previous], after: vec![end] };
            let (_, created) = graph
                .create_sign_with_interpretations(line_id, vec![SignInterpretationData::character(*c)], &around, AUTHOR)
                .unwrap();
            previous = created[0];
            ids.push(previous);
        }
        ids
    }

    #[test]
    fn test_fragment_chain_and_line_anchors() {
        let (graph, line_id) = graph_with_line();
        let line = graph.line(line_id).unwrap();
        let anchors = LineAnchors::new(graph.vocabulary());

        let start = anchors.find_anchor(&line, AnchorKind::Start).unwrap();
        let end = anchors.find_anchor(&line, AnchorKind::End).unwrap();
        assert_eq!(graph.successors(start).unwrap(), vec![end]);

        let fragment = graph.fragment(line.fragment_id.unwrap()).unwrap();
        let fragment_start = anchors.find_fragment_anchor(&fragment, AnchorKind::Start).unwrap();
        let fragment_end = anchors.find_fragment_anchor(&fragment, AnchorKind::End).unwrap();
        assert_eq!(graph.successors(fragment_start).unwrap(), vec![start]);
        assert_eq!(graph.successors(end).unwrap(), vec![fragment_end]);
        assert!(graph.is_acyclic());
    }

    #[test]
    fn test_insert_line_between_lines() {
        let (mut graph, first) = graph_with_line();
        let fragment_id = graph.line(first).unwrap().fragment_id.unwrap();
        let third = graph.append_line(fragment_id, "3", AUTHOR).unwrap();
        let second = graph.insert_line(fragment_id, 1, "2", AUTHOR).unwrap();

        assert_eq!(graph.line_ids(fragment_id).unwrap(), vec![first, second, third]);

        let anchors = LineAnchors::new(graph.vocabulary());
        let first_end = anchors.find_anchor(&graph.line(first).unwrap(), AnchorKind::End).unwrap();
        let second_start = anchors.find_anchor(&graph.line(second).unwrap(), AnchorKind::Start).unwrap();
        let second_end = anchors.find_anchor(&graph.line(second).unwrap(), AnchorKind::End).unwrap();
        let third_start = anchors.find_anchor(&graph.line(third).unwrap(), AnchorKind::Start).unwrap();

        assert_eq!(graph.successors(first_end).unwrap(), vec![second_start]);
        assert_eq!(graph.successors(second_end).unwrap(), vec![third_start]);
        assert_eq!(graph.line_by_name(fragment_id, "2").unwrap().id, second);
    }

    #[test]
    fn test_create_rejects_duplicate_attribute() {
        let (mut graph, line_id) = graph_with_line();
        let sign = graph.create_sign(line_id, 1).unwrap();
        let before = graph.num_interpretations();

        let data = SignInterpretationData::character("a")
            .with_attribute(AttributeValueId::new(99))
            .with_attribute(AttributeValueId::new(99));
        assert_eq!(
            graph.create_interpretation(sign, data),
            Err(GraphError::DuplicateAttribute { attribute: AttributeValueId::new(99) })
        );
        assert_eq!(graph.num_interpretations(), before);
    }

    #[test]
    fn test_create_unknown_sign_or_target() {
        let (mut graph, line_id) = graph_with_line();
        assert_eq!(
            graph.create_interpretation(SignId::new(999), SignInterpretationData::character("a")),
            Err(GraphError::SignNotFound(SignId::new(999)))
        );

        let sign = graph.create_sign(line_id, 1).unwrap();
        let data = SignInterpretationData::character("a").with_next(SignInterpretationId::new(999), AUTHOR);
        assert!(graph.create_interpretation(sign, data).unwrap_err().is_not_found());
    }

    #[test]
    fn test_add_edge_rejects_cycle() {
        let (mut graph, line_id) = graph_with_line();
        let ids = fill(&mut graph, line_id, &["a", "b", "c"]);

        assert_eq!(
            graph.add_next_edge(ids[2], ids[0], AUTHOR),
            Err(GraphError::Cycle { from: ids[2], to: ids[0] })
        );
        assert_eq!(
            graph.add_next_edge(ids[1], ids[1], AUTHOR),
            Err(GraphError::Cycle { from: ids[1], to: ids[1] })
        );
        assert!(graph.is_acyclic());
    }

    #[test]
    fn test_edge_pairs_deduplicated_per_author() {
        let (mut graph, line_id) = graph_with_line();
        let ids = fill(&mut graph, line_id, &["a", "b"]);

        assert_eq!(graph.add_next_edge(ids[0], ids[1], AUTHOR), Ok(false));
        assert_eq!(graph.add_next_edge(ids[0], ids[1], AuthorId::new(2)), Ok(true));
        assert_eq!(graph.get_interpretation(ids[0]).unwrap().data.next_interpretations.len(), 2);

        assert_eq!(graph.remove_next_edge(ids[0], ids[1], AUTHOR), Ok(true));
        // The other author's edge keeps the predecessor index entry.
        assert_eq!(graph.predecessors(ids[1]).unwrap(), vec![ids[0]]);
        assert_eq!(graph.remove_next_edge(ids[0], ids[1], AUTHOR), Ok(false));
    }

    #[test]
    fn test_delete_reconnects_predecessor() {
        let (mut graph, line_id) = graph_with_line();
        let ids = fill(&mut graph, line_id, &["a", "b", "c"]);

        let outcome = graph.delete_interpretation(ids[1]).unwrap();
        assert_eq!(outcome.deleted, ids[1]);
        assert!(outcome.removed_sign.is_some());
        assert_eq!(
            outcome.rewired,
            vec![RewiredEdge { from: ids[0], removed: ids[1], added: vec![ids[2]], author: AUTHOR }]
        );
        assert_eq!(graph.successors(ids[0]).unwrap(), vec![ids[2]]);
        assert_eq!(graph.predecessors(ids[2]).unwrap(), vec![ids[0]]);
        assert_eq!(graph.line(line_id).unwrap().signs.len(), 4);
        assert!(matches!(
            graph.get_interpretation(ids[1]),
            Err(GraphError::InterpretationNotFound(_))
        ));
    }

    #[test]
    fn test_delete_variant_adds_no_bypass() {
        let (mut graph, line_id) = graph_with_line();
        let ids = fill(&mut graph, line_id, &["a", "b", "c"]);
        let b_sign = graph.get_interpretation(ids[1]).unwrap().sign_id;
        let around = SurroundingAnchors { before: vec![ids[0]], after: vec![ids[2]] };
        let beta = graph
            .add_sign_interpretations(b_sign, vec![SignInterpretationData::character("β").variant()], &around, AUTHOR)
            .unwrap()[0];

        let outcome = graph.delete_interpretation(ids[1]).unwrap();
        assert_eq!(outcome.removed_sign, None);
        // "a" still reaches "c" through the surviving variant.
        assert_eq!(graph.successors(ids[0]).unwrap(), vec![beta]);
    }

    #[test]
    fn test_delete_anchor_protected() {
        let (mut graph, line_id) = graph_with_line();
        let line = graph.line(line_id).unwrap();
        let start = LineAnchors::new(graph.vocabulary()).find_anchor(&line, AnchorKind::Start).unwrap();

        assert_eq!(graph.delete_interpretation(start), Err(GraphError::AnchorProtected(start)));
        assert!(graph.contains(start));
    }

    #[test]
    fn test_update_rejects_cycle_and_keeps_graph() {
        let (mut graph, line_id) = graph_with_line();
        let ids = fill(&mut graph, line_id, &["a", "b"]);
        let original = graph.get_interpretation(ids[1]).unwrap().data.clone();

        let looping = original.clone().with_next(ids[0], AUTHOR);
        assert_eq!(
            graph.update_interpretation(ids[1], looping),
            Err(GraphError::Cycle { from: ids[1], to: ids[0] })
        );
        assert_eq!(graph.get_interpretation(ids[1]).unwrap().data, original);

        let mut renamed = original.clone();
        renamed.character = "β".to_string();
        graph.update_interpretation(ids[1], renamed).unwrap();
        assert_eq!(graph.get_interpretation(ids[1]).unwrap().character(), "β");
    }

    #[test]
    fn test_failed_splice_rolls_back() {
        let (mut graph, line_id) = graph_with_line();
        let ids = fill(&mut graph, line_id, &["a", "b"]);
        let before = graph.clone();

        // before = b, after = a would close a cycle b -> new -> a -> b.
        let around = SurroundingAnchors { before: vec![ids[1]], after: vec![ids[0]] };
        let result = graph.create_sign_with_interpretations(
            line_id,
            vec![SignInterpretationData::character("x")],
            &around,
            AUTHOR,
        );
        assert!(matches!(result, Err(GraphError::Cycle { .. })));
        assert_eq!(graph.num_interpretations(), before.num_interpretations());
        assert_eq!(graph.line(line_id).unwrap(), before.line(line_id).unwrap());
    }
}
