//! Sign interpretations, their annotations and their "next" edges.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::geometry::InterpretationRoi;
use super::ids::{AttributeValueId, AuthorId, SignId, SignInterpretationId};

/// Authored link from one interpretation to its successor in a reading path.
///
/// Edges are identified by the `(next, author)` pair: two authors may assert
/// the same successor independently, and each assertion is kept.
/// Implements `Ord` for deterministic ordering: (next, author).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NextInterpretation {
    /// Successor interpretation.
    pub next: SignInterpretationId,
    /// Author asserting the edge.
    pub author: AuthorId,
}

impl NextInterpretation {
    /// Create a new edge payload.
    pub fn new(next: SignInterpretationId, author: AuthorId) -> Self {
        Self { next, author }
    }
}

/// An attribute value attached to an interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterpretationAttribute {
    /// Attribute value id from the vocabulary.
    pub attribute_value_id: AttributeValueId,
    /// Optional numeric value (e.g. the width of a vacat).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl InterpretationAttribute {
    /// Attribute without a numeric value.
    pub fn new(attribute_value_id: AttributeValueId) -> Self {
        Self {
            attribute_value_id,
            value: None,
        }
    }

    /// Attribute carrying a numeric value.
    pub fn with_value(attribute_value_id: AttributeValueId, value: f64) -> Self {
        Self {
            attribute_value_id,
            value: Some(value),
        }
    }
}

/// Editorial commentary on an interpretation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Commentary {
    /// Free-text note not tied to a specific attribute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Notes tied to specific attributes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attribute_notes: BTreeMap<AttributeValueId, String>,
}

impl Commentary {
    /// Commentary with only a free-text note.
    pub fn note(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            attribute_notes: BTreeMap::new(),
        }
    }

    /// True when there is neither a note nor attribute notes.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.attribute_notes.is_empty()
    }
}

/// The complete, id-less value of a sign interpretation.
///
/// Graph operations take and return complete values; there are no partial
/// patches at the graph layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignInterpretationData {
    /// Zero or more characters. `""` marks a structural interpretation,
    /// `"?"` an illegible sign.
    pub character: String,
    /// Alternate reading of a sign that already has another interpretation.
    #[serde(default)]
    pub is_variant: bool,
    /// Attribute values, unique by `attribute_value_id`.
    #[serde(default)]
    pub attributes: Vec<InterpretationAttribute>,
    /// Commentary.
    #[serde(default, skip_serializing_if = "Commentary::is_empty")]
    pub commentary: Commentary,
    /// Regions of interest on the source image.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rois: Vec<InterpretationRoi>,
    /// Outgoing next-edges in insertion order.
    #[serde(default)]
    pub next_interpretations: Vec<NextInterpretation>,
}

impl SignInterpretationData {
    /// Data for a reading of the given character.
    pub fn character(character: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            ..Self::default()
        }
    }

    /// Mark as a variant reading.
    pub fn variant(mut self) -> Self {
        self.is_variant = true;
        self
    }

    /// Add an attribute value.
    pub fn with_attribute(mut self, attribute_value_id: AttributeValueId) -> Self {
        self.attributes.push(InterpretationAttribute::new(attribute_value_id));
        self
    }

    /// Add an attribute value with a numeric value.
    pub fn with_attribute_value(mut self, attribute_value_id: AttributeValueId, value: f64) -> Self {
        self.attributes
            .push(InterpretationAttribute::with_value(attribute_value_id, value));
        self
    }

    /// Set the commentary.
    pub fn with_commentary(mut self, commentary: Commentary) -> Self {
        self.commentary = commentary;
        self
    }

    /// Add an ROI.
    pub fn with_roi(mut self, roi: InterpretationRoi) -> Self {
        self.rois.push(roi);
        self
    }

    /// Add a next-edge.
    pub fn with_next(mut self, next: SignInterpretationId, author: AuthorId) -> Self {
        self.add_next(NextInterpretation::new(next, author));
        self
    }

    /// Whether the attribute value is present.
    pub fn has_attribute(&self, attribute_value_id: AttributeValueId) -> bool {
        self.attributes
            .iter()
            .any(|a| a.attribute_value_id == attribute_value_id)
    }

    /// First attribute value id that appears more than once, if any.
    pub fn duplicate_attribute(&self) -> Option<AttributeValueId> {
        let mut seen = std::collections::BTreeSet::new();
        self.attributes
            .iter()
            .map(|a| a.attribute_value_id)
            .find(|id| !seen.insert(*id))
    }

    /// Successor ids in edge insertion order, without duplicates.
    pub fn next_ids(&self) -> Vec<SignInterpretationId> {
        let mut ids: Vec<SignInterpretationId> = Vec::with_capacity(self.next_interpretations.len());
        for edge in &self.next_interpretations {
            if !ids.contains(&edge.next) {
                ids.push(edge.next);
            }
        }
        ids
    }

    /// Whether any edge points at `next`, regardless of author.
    pub fn points_to(&self, next: SignInterpretationId) -> bool {
        self.next_interpretations.iter().any(|e| e.next == next)
    }

    /// Add an edge. Returns `false` if the `(next, author)` pair was already present.
    pub fn add_next(&mut self, edge: NextInterpretation) -> bool {
        if self.next_interpretations.contains(&edge) {
            return false;
        }
        self.next_interpretations.push(edge);
        true
    }

    /// Remove one `(next, author)` edge. Returns whether it was present.
    pub fn remove_next(&mut self, edge: NextInterpretation) -> bool {
        let before = self.next_interpretations.len();
        self.next_interpretations.retain(|e| *e != edge);
        before != self.next_interpretations.len()
    }

    /// Remove every edge pointing at `next`, returning the removed edges.
    pub fn remove_edges_to(&mut self, next: SignInterpretationId) -> Vec<NextInterpretation> {
        let (removed, kept): (Vec<_>, Vec<_>) = self
            .next_interpretations
            .drain(..)
            .partition(|e| e.next == next);
        self.next_interpretations = kept;
        removed
    }

    /// Whether the editorial annotations (everything except the character
    /// and the edges) are equal.
    pub fn annotations_eq(&self, other: &Self) -> bool {
        self.is_variant == other.is_variant
            && self.attributes == other.attributes
            && self.commentary == other.commentary
            && self.rois == other.rois
    }
}

/// A stored sign interpretation: its ids plus its complete data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignInterpretation {
    /// Interpretation id.
    pub id: SignInterpretationId,
    /// Owning sign.
    pub sign_id: SignId,
    /// Complete data.
    #[serde(flatten)]
    pub data: SignInterpretationData,
}

impl SignInterpretation {
    /// Create a new stored interpretation.
    pub fn new(id: SignInterpretationId, sign_id: SignId, data: SignInterpretationData) -> Self {
        Self { id, sign_id, data }
    }

    /// The interpretation's character.
    pub fn character(&self) -> &str {
        &self.data.character
    }

    /// Whether this interpretation has no outgoing edges.
    pub fn is_terminal(&self) -> bool {
        self.data.next_interpretations.is_empty()
    }
}
