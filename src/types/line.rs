//! Signs, lines and text fragments.
//!
//! These are owned snapshots of a region of the graph. The reconciler and
//! linearizer work on snapshots only; mutation happens in
//! [`crate::graph::SignInterpretationGraph`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::ids::{LineId, SignId, SignInterpretationId, TextFragmentId};
use super::interpretation::SignInterpretation;
use crate::canonical::canonical_hash_hex;

/// A physical sign position with its interpretations in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sign {
    /// Sign id.
    pub id: SignId,
    /// Interpretations in insertion order.
    pub interpretations: Vec<SignInterpretation>,
}

impl Sign {
    /// Create a sign.
    pub fn new(id: SignId, interpretations: Vec<SignInterpretation>) -> Self {
        Self { id, interpretations }
    }
}

/// Content fingerprint of a line snapshot.
///
/// Any change to any interpretation, edge or sign order changes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineFingerprint(String);

impl LineFingerprint {
    /// Create from a hash string.
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    /// Get the fingerprint as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LineFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered collection of signs.
///
/// A stored line contains its start and end anchors; a freshly parsed
/// source line may not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    /// Line id.
    pub id: LineId,
    /// Owning fragment, if stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_id: Option<TextFragmentId>,
    /// Line name (e.g. "1", "2a").
    pub name: String,
    /// Signs in insertion order.
    pub signs: Vec<Sign>,
}

impl Line {
    /// Create a line.
    pub fn new(id: LineId, name: impl Into<String>, signs: Vec<Sign>) -> Self {
        Self {
            id,
            fragment_id: None,
            name: name.into(),
            signs,
        }
    }

    /// All interpretations in document order (sign order, then insertion order).
    pub fn interpretations(&self) -> impl Iterator<Item = &SignInterpretation> {
        self.signs.iter().flat_map(|s| s.interpretations.iter())
    }

    /// Number of interpretations.
    pub fn num_interpretations(&self) -> usize {
        self.signs.iter().map(|s| s.interpretations.len()).sum()
    }

    /// Look up an interpretation.
    pub fn interpretation(&self, id: SignInterpretationId) -> Option<&SignInterpretation> {
        self.interpretations().find(|i| i.id == id)
    }

    /// Whether the interpretation belongs to this line.
    pub fn contains(&self, id: SignInterpretationId) -> bool {
        self.interpretation(id).is_some()
    }

    /// Look up a sign by id.
    pub fn sign(&self, id: SignId) -> Option<&Sign> {
        self.signs.iter().find(|s| s.id == id)
    }

    /// The sign holding an interpretation.
    pub fn sign_of(&self, id: SignInterpretationId) -> Option<&Sign> {
        self.signs
            .iter()
            .find(|s| s.interpretations.iter().any(|i| i.id == id))
    }

    /// Build an id index for repeated lookups.
    pub fn index(&self) -> LineIndex<'_> {
        LineIndex::new(self)
    }

    /// Compute the content fingerprint.
    pub fn fingerprint(&self) -> LineFingerprint {
        LineFingerprint::new(canonical_hash_hex(self))
    }
}

/// Id index over a line snapshot.
#[derive(Debug)]
pub struct LineIndex<'a> {
    line: &'a Line,
    /// id -> (sign index, interpretation index, document position)
    positions: HashMap<SignInterpretationId, (usize, usize, usize)>,
}

impl<'a> LineIndex<'a> {
    fn new(line: &'a Line) -> Self {
        let mut positions = HashMap::with_capacity(line.num_interpretations());
        let mut doc = 0;
        for (s, sign) in line.signs.iter().enumerate() {
            for (i, interp) in sign.interpretations.iter().enumerate() {
                positions.insert(interp.id, (s, i, doc));
                doc += 1;
            }
        }
        Self { line, positions }
    }

    /// The indexed line.
    pub fn line(&self) -> &'a Line {
        self.line
    }

    /// Look up an interpretation.
    pub fn get(&self, id: SignInterpretationId) -> Option<&'a SignInterpretation> {
        let line = self.line;
        self.positions
            .get(&id)
            .map(|&(s, i, _)| &line.signs[s].interpretations[i])
    }

    /// Whether the interpretation belongs to the line.
    pub fn contains(&self, id: SignInterpretationId) -> bool {
        self.positions.contains_key(&id)
    }

    /// The sign holding an interpretation.
    pub fn sign_of(&self, id: SignInterpretationId) -> Option<&'a Sign> {
        let line = self.line;
        self.positions.get(&id).map(|&(s, _, _)| &line.signs[s])
    }

    /// Document-order position of an interpretation.
    pub fn position(&self, id: SignInterpretationId) -> Option<usize> {
        self.positions.get(&id).map(|&(_, _, doc)| doc)
    }

    /// Ids of interpretations in the line with an edge into `id`, in document order.
    pub fn predecessors(&self, id: SignInterpretationId) -> Vec<SignInterpretationId> {
        self.line
            .interpretations()
            .filter(|i| i.data.points_to(id))
            .map(|i| i.id)
            .collect()
    }

    /// Successor ids of `id` that stay inside the line, in edge insertion order.
    pub fn successors(&self, id: SignInterpretationId) -> Vec<SignInterpretationId> {
        self.get(id)
            .map(|i| {
                i.data
                    .next_ids()
                    .into_iter()
                    .filter(|n| self.contains(*n))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// An ordered collection of lines.
///
/// The fragment-start and fragment-end anchors live in boundary signs that
/// belong to the fragment itself rather than to any line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    /// Fragment id.
    pub id: TextFragmentId,
    /// Fragment name.
    pub name: String,
    /// Signs holding the fragment anchors.
    #[serde(default)]
    pub boundary_signs: Vec<Sign>,
    /// Lines in order.
    pub lines: Vec<Line>,
}

impl TextFragment {
    /// Look up a line by name.
    pub fn line_by_name(&self, name: &str) -> Option<&Line> {
        self.lines.iter().find(|l| l.name == name)
    }

    /// Boundary and line interpretations, boundary signs first.
    pub fn interpretations(&self) -> impl Iterator<Item = &SignInterpretation> {
        self.boundary_signs
            .iter()
            .flat_map(|s| s.interpretations.iter())
            .chain(self.lines.iter().flat_map(|l| l.interpretations()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AuthorId, SignInterpretationData};

    fn line_ab() -> Line {
        let a = SignInterpretation::new(
            SignInterpretationId::new(1),
            SignId::new(1),
            SignInterpretationData::character("a").with_next(SignInterpretationId::new(2), AuthorId::new(1)),
        );
        let b = SignInterpretation::new(
            SignInterpretationId::new(2),
            SignId::new(2),
            SignInterpretationData::character("b").with_next(SignInterpretationId::new(99), AuthorId::new(1)),
        );
        Line::new(
            LineId::new(1),
            "1",
            vec![Sign::new(SignId::new(1), vec![a]), Sign::new(SignId::new(2), vec![b])],
        )
    }

    #[test]
    fn test_index_lookup_and_scope() {
        let line = line_ab();
        let index = line.index();

        assert_eq!(index.get(SignInterpretationId::new(2)).unwrap().character(), "b");
        assert_eq!(index.position(SignInterpretationId::new(2)), Some(1));
        assert_eq!(index.predecessors(SignInterpretationId::new(2)), vec![SignInterpretationId::new(1)]);
        // Edge to 99 leaves the line and is out of scope.
        assert!(index.successors(SignInterpretationId::new(2)).is_empty());
    }

    #[test]
    fn test_fingerprint_changes_with_content() {
        let line = line_ab();
        let mut changed = line.clone();
        changed.signs[0].interpretations[0].data.character = "x".to_string();

        assert_eq!(line.fingerprint(), line_ab().fingerprint());
        assert_ne!(line.fingerprint(), changed.fingerprint());
    }
}
