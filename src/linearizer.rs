//! Linear readings of a line.
//!
//! A line's next-edges may fork (variants, competing authors) and join
//! again. The linearizer enumerates every maximal path through the line,
//! starting from each interpretation of the first sign, and renders each
//! path as a [`Sequence`] with its canonical comparison string.
//!
//! ## Ordering
//!
//! Sequences are ordered by the originating interpretation's insertion
//! order within the first sign, then depth-first by next-edge insertion
//! order. The same snapshot always yields the same ordered result.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{Line, LineId, SignInterpretationData, SignInterpretationId};
use crate::vocabulary::{AttributeRole, AttributeVocabulary};

/// Token for a space.
pub const SPACE_TOKEN: &str = " ";
/// Token for a vacat.
pub const VACAT_TOKEN: &str = "V";
/// Token for a damage gap.
pub const BREAK_TOKEN: &str = "X";
/// Token for a sign with an empty character.
pub const ILLEGIBLE_TOKEN: &str = "?";

/// Error type for linearization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinearizeError {
    /// A reading path revisits an interpretation.
    #[error("Cycle detected in line {line} at {at}")]
    CycleDetected {
        /// Line being linearized.
        line: LineId,
        /// First revisited interpretation.
        at: SignInterpretationId,
    },
}

/// One maximal reading path through a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sequence {
    /// Interpretation ids in reading order.
    pub interpretation_ids: Vec<SignInterpretationId>,
    /// Canonical token of each interpretation (parallel to `interpretation_ids`).
    pub tokens: Vec<String>,
    /// Concatenation of `tokens`.
    pub comparison: String,
}

impl Sequence {
    fn start(id: SignInterpretationId, token: String) -> Self {
        let mut sequence = Self {
            interpretation_ids: Vec::new(),
            tokens: Vec::new(),
            comparison: String::new(),
        };
        sequence.push(id, token);
        sequence
    }

    fn push(&mut self, id: SignInterpretationId, token: String) {
        self.comparison.push_str(&token);
        self.interpretation_ids.push(id);
        self.tokens.push(token);
    }

    fn pop(&mut self) {
        if let Some(token) = self.tokens.pop() {
            self.comparison.truncate(self.comparison.len() - token.len());
        }
        self.interpretation_ids.pop();
    }

    /// Number of interpretations.
    pub fn len(&self) -> usize {
        self.interpretation_ids.len()
    }

    /// Whether the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.interpretation_ids.is_empty()
    }

    /// First interpretation.
    pub fn first(&self) -> Option<SignInterpretationId> {
        self.interpretation_ids.first().copied()
    }

    /// Last interpretation.
    pub fn last(&self) -> Option<SignInterpretationId> {
        self.interpretation_ids.last().copied()
    }

    /// `(id, token)` pairs in reading order.
    pub fn iter(&self) -> impl Iterator<Item = (SignInterpretationId, &str)> {
        self.interpretation_ids
            .iter()
            .copied()
            .zip(self.tokens.iter().map(String::as_str))
    }
}

/// The preferred sequence: the longest, the first one on ties.
pub fn preferred(sequences: &[Sequence]) -> Option<&Sequence> {
    sequences
        .iter()
        .fold(None, |best: Option<&Sequence>, s| match best {
            Some(b) if b.len() >= s.len() => Some(b),
            _ => Some(s),
        })
}

/// Renders lines into sequences.
#[derive(Debug, Clone, Copy)]
pub struct Linearizer<'v> {
    vocabulary: &'v AttributeVocabulary,
}

impl<'v> Linearizer<'v> {
    /// Create a linearizer for a vocabulary.
    pub fn new(vocabulary: &'v AttributeVocabulary) -> Self {
        Self { vocabulary }
    }

    /// Canonical comparison token of an interpretation.
    ///
    /// Anchors render as the empty string so that they never show up in
    /// comparison strings.
    pub fn token(&self, data: &SignInterpretationData) -> String {
        let vocab = self.vocabulary;
        if vocab.is_anchor(data) {
            String::new()
        } else if vocab.has_role(data, AttributeRole::Space) {
            SPACE_TOKEN.to_string()
        } else if vocab.has_role(data, AttributeRole::Vacat) {
            VACAT_TOKEN.to_string()
        } else if vocab.has_role(data, AttributeRole::Break) {
            BREAK_TOKEN.to_string()
        } else if data.character.is_empty() {
            ILLEGIBLE_TOKEN.to_string()
        } else {
            data.character.clone()
        }
    }

    /// Every maximal reading path through the line.
    ///
    /// Successors outside the line are out of scope and end a path. A line
    /// without signs yields no sequences.
    pub fn linearize(&self, line: &Line) -> Result<Vec<Sequence>, LinearizeError> {
        let index = line.index();
        let Some(first_sign) = line.signs.first() else {
            return Ok(Vec::new());
        };

        let mut sequences = Vec::new();
        for origin in &first_sign.interpretations {
            let mut path = Sequence::start(origin.id, self.token(&origin.data));
            let mut on_path: HashSet<SignInterpretationId> = HashSet::from([origin.id]);
            // Explicit DFS stack: (successors of the node, next child to visit).
            let mut frames: Vec<(Vec<SignInterpretationId>, usize)> =
                vec![(index.successors(origin.id), 0)];

            while let Some((successors, cursor)) = frames.last_mut() {
                if successors.is_empty() {
                    sequences.push(path.clone());
                }
                let Some(&next) = successors.get(*cursor) else {
                    frames.pop();
                    if let Some(id) = path.last() {
                        on_path.remove(&id);
                    }
                    path.pop();
                    continue;
                };
                *cursor += 1;

                if !on_path.insert(next) {
                    return Err(LinearizeError::CycleDetected { line: line.id, at: next });
                }
                let token = index.get(next).map(|i| self.token(&i.data)).unwrap_or_default();
                tracing::trace!(line = %line.id, at = %next, depth = path.len(), "extend sequence");
                path.push(next, token);
                frames.push((index.successors(next), 0));
            }
        }
        Ok(sequences)
    }

    /// The preferred sequence of a line.
    pub fn preferred(&self, line: &Line) -> Result<Option<Sequence>, LinearizeError> {
        let sequences = self.linearize(line)?;
        Ok(preferred(&sequences).cloned())
    }

    /// Comparison string of the preferred sequence (empty for an empty line).
    pub fn comparison_string(&self, line: &Line) -> Result<String, LinearizeError> {
        Ok(self
            .preferred(line)?
            .map(|s| s.comparison)
            .unwrap_or_default())
    }
}
