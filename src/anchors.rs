//! Line and fragment anchors.
//!
//! Anchors are interpretations carrying a line-start, line-end,
//! fragment-start or fragment-end attribute. This module locates them,
//! validates that a line's stream runs from its start anchor to its end
//! anchor(s), and computes the `before`/`after` id lists needed to splice
//! new material into the chain.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::types::{Line, LineId, SignInterpretation, SignInterpretationId, TextFragment, TextFragmentId};
use crate::vocabulary::{AttributeRole, AttributeVocabulary};

/// Which end of a line or fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorKind {
    /// Start anchor.
    Start,
    /// End anchor.
    End,
}

impl AnchorKind {
    fn line_role(self) -> AttributeRole {
        match self {
            Self::Start => AttributeRole::LineStart,
            Self::End => AttributeRole::LineEnd,
        }
    }

    fn fragment_role(self) -> AttributeRole {
        match self {
            Self::Start => AttributeRole::FragmentStart,
            Self::End => AttributeRole::FragmentEnd,
        }
    }
}

impl std::fmt::Display for AnchorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Structural defect found while validating a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "defect", rename_all = "snake_case")]
pub enum LineDefect {
    /// More than one interpretation carries the line-start attribute.
    MultipleStartAnchors {
        /// The competing start anchors.
        anchors: Vec<SignInterpretationId>,
    },
    /// A reading path stops at an interpretation that is not an end anchor.
    DeadEnd {
        /// The terminal interpretation.
        at: SignInterpretationId,
    },
    /// A reading path revisits an interpretation.
    Cycle {
        /// First revisited interpretation.
        at: SignInterpretationId,
    },
}

impl std::fmt::Display for LineDefect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MultipleStartAnchors { anchors } => {
                write!(f, "{} start anchors", anchors.len())
            }
            Self::DeadEnd { at } => write!(f, "path ends at {} before the end anchor", at),
            Self::Cycle { at } => write!(f, "cycle through {}", at),
        }
    }
}

/// Error type for anchor lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnchorError {
    /// The line has no anchor of the requested kind.
    #[error("Line {line} has no {kind} anchor")]
    NotFound {
        /// Line searched.
        line: LineId,
        /// Anchor kind.
        kind: AnchorKind,
    },
    /// The fragment has no anchor of the requested kind.
    #[error("Fragment {fragment} has no {kind} anchor")]
    FragmentAnchorNotFound {
        /// Fragment searched.
        fragment: TextFragmentId,
        /// Anchor kind.
        kind: AnchorKind,
    },
    /// The interpretation does not belong to the line.
    #[error("Interpretation {id} is not part of line {line}")]
    NotInLine {
        /// Interpretation looked up.
        id: SignInterpretationId,
        /// Line searched.
        line: LineId,
    },
    /// Line position outside `0..=lines.len()`.
    #[error("Line position {position} out of range for fragment {fragment} with {len} lines")]
    PositionOutOfRange {
        /// Fragment.
        fragment: TextFragmentId,
        /// Requested position.
        position: usize,
        /// Number of lines.
        len: usize,
    },
    /// The line's stream does not run from its start anchor to an end anchor.
    #[error("Line {line} is malformed: {defect}")]
    MalformedLine {
        /// Line validated.
        line: LineId,
        /// What is wrong with it.
        defect: LineDefect,
    },
}

/// Ids leading into and out of an interpretation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurroundingAnchors {
    /// Interpretations with an edge into the subject, in document order.
    pub before: Vec<SignInterpretationId>,
    /// The subject's successors, in edge insertion order.
    pub after: Vec<SignInterpretationId>,
}

/// Anchor lookups over line and fragment snapshots.
#[derive(Debug, Clone, Copy)]
pub struct LineAnchors<'v> {
    vocabulary: &'v AttributeVocabulary,
}

impl<'v> LineAnchors<'v> {
    /// Create an anchor helper for a vocabulary.
    pub fn new(vocabulary: &'v AttributeVocabulary) -> Self {
        Self { vocabulary }
    }

    /// All interpretations in the line carrying the anchor attribute, in document order.
    pub fn find_anchors(&self, line: &Line, kind: AnchorKind) -> Vec<SignInterpretationId> {
        let role = kind.line_role();
        line.interpretations()
            .filter(|i| self.vocabulary.has_role(&i.data, role))
            .map(|i| i.id)
            .collect()
    }

    /// The first anchor of the given kind.
    pub fn find_anchor(&self, line: &Line, kind: AnchorKind) -> Result<SignInterpretationId, AnchorError> {
        self.find_anchors(line, kind)
            .into_iter()
            .next()
            .ok_or(AnchorError::NotFound { line: line.id, kind })
    }

    /// Whether `id` is a line or fragment anchor within the line.
    pub fn is_anchor(&self, line: &Line, id: SignInterpretationId) -> bool {
        line.interpretation(id)
            .map(|i| self.vocabulary.is_anchor(&i.data))
            .unwrap_or(false)
    }

    /// Interpretations leading into `id` and following it, within the line.
    pub fn anchors_surrounding(
        &self,
        line: &Line,
        id: SignInterpretationId,
    ) -> Result<SurroundingAnchors, AnchorError> {
        let index = line.index();
        if !index.contains(id) {
            return Err(AnchorError::NotInLine { id, line: line.id });
        }
        Ok(SurroundingAnchors {
            before: index.predecessors(id),
            after: index.successors(id),
        })
    }

    /// Check that the line has exactly one start anchor, at least one end
    /// anchor, and that every reading path from the start ends on an end anchor.
    pub fn validate(&self, line: &Line) -> Result<(), AnchorError> {
        let starts = self.find_anchors(line, AnchorKind::Start);
        let start = match starts.as_slice() {
            [] => {
                return Err(AnchorError::NotFound {
                    line: line.id,
                    kind: AnchorKind::Start,
                })
            }
            [only] => *only,
            _ => {
                return Err(AnchorError::MalformedLine {
                    line: line.id,
                    defect: LineDefect::MultipleStartAnchors { anchors: starts },
                })
            }
        };
        self.find_anchor(line, AnchorKind::End)?;

        let index = line.index();
        let end_role = AnchorKind::End.line_role();

        // Iterative DFS with grey/black marking: grey nodes are on the
        // current path, black nodes are fully explored.
        let mut grey: HashSet<SignInterpretationId> = HashSet::new();
        let mut black: HashSet<SignInterpretationId> = HashSet::new();
        let mut stack: Vec<(SignInterpretationId, bool)> = vec![(start, false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                grey.remove(&id);
                black.insert(id);
                continue;
            }
            if black.contains(&id) {
                continue;
            }
            grey.insert(id);
            stack.push((id, true));

            let successors = index.successors(id);
            if successors.is_empty() {
                let is_end = index
                    .get(id)
                    .map(|i| self.vocabulary.has_role(&i.data, end_role))
                    .unwrap_or(false);
                if !is_end {
                    return Err(AnchorError::MalformedLine {
                        line: line.id,
                        defect: LineDefect::DeadEnd { at: id },
                    });
                }
            }
            for next in successors.into_iter().rev() {
                if grey.contains(&next) {
                    return Err(AnchorError::MalformedLine {
                        line: line.id,
                        defect: LineDefect::Cycle { at: next },
                    });
                }
                if !black.contains(&next) {
                    stack.push((next, false));
                }
            }
        }
        Ok(())
    }

    /// The fragment anchor of the given kind, searching boundary signs first.
    pub fn find_fragment_anchor(
        &self,
        fragment: &TextFragment,
        kind: AnchorKind,
    ) -> Result<SignInterpretationId, AnchorError> {
        let role = kind.fragment_role();
        fragment
            .interpretations()
            .find(|i| self.vocabulary.has_role(&i.data, role))
            .map(|i| i.id)
            .ok_or(AnchorError::FragmentAnchorNotFound {
                fragment: fragment.id,
                kind,
            })
    }

    /// Anchors for a new line inserted at `position` in the fragment.
    ///
    /// `before` holds the end anchors of the preceding line (or the
    /// fragment-start anchor), `after` the start anchor of the following
    /// line (or the fragment-end anchor).
    pub fn anchors_between_lines(
        &self,
        fragment: &TextFragment,
        position: usize,
    ) -> Result<SurroundingAnchors, AnchorError> {
        let len = fragment.lines.len();
        if position > len {
            return Err(AnchorError::PositionOutOfRange {
                fragment: fragment.id,
                position,
                len,
            });
        }

        let before = if position == 0 {
            vec![self.find_fragment_anchor(fragment, AnchorKind::Start)?]
        } else {
            let previous = &fragment.lines[position - 1];
            let ends = self.find_anchors(previous, AnchorKind::End);
            if ends.is_empty() {
                return Err(AnchorError::NotFound {
                    line: previous.id,
                    kind: AnchorKind::End,
                });
            }
            ends
        };

        let after = if position == len {
            vec![self.find_fragment_anchor(fragment, AnchorKind::End)?]
        } else {
            vec![self.find_anchor(&fragment.lines[position], AnchorKind::Start)?]
        };

        Ok(SurroundingAnchors { before, after })
    }

    /// Interpretations of the line that are not anchors, in document order.
    pub fn interior<'l>(&self, line: &'l Line) -> impl Iterator<Item = &'l SignInterpretation> + 'l
    where
        'v: 'l,
    {
        let vocabulary = self.vocabulary;
        line.interpretations()
            .filter(move |i| !vocabulary.is_anchor(&i.data))
    }
}
