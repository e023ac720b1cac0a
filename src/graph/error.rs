//! Errors raised by graph mutations.
//!
//! Every failing mutation leaves the graph unmodified.

use crate::anchors::AnchorError;
use crate::types::{AttributeValueId, LineId, SignId, SignInterpretationId, TextFragmentId};

/// Error type for [`super::SignInterpretationGraph`] operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// Interpretation not found.
    #[error("Sign interpretation not found: {0}")]
    InterpretationNotFound(SignInterpretationId),
    /// Sign not found.
    #[error("Sign not found: {0}")]
    SignNotFound(SignId),
    /// Line not found.
    #[error("Line not found: {0}")]
    LineNotFound(LineId),
    /// No line with this name in the fragment.
    #[error("Line '{name}' not found in {fragment}")]
    LineNameNotFound {
        /// Fragment searched.
        fragment: TextFragmentId,
        /// Requested name.
        name: String,
    },
    /// Text fragment not found.
    #[error("Text fragment not found: {0}")]
    FragmentNotFound(TextFragmentId),
    /// The same attribute value appears twice in one interpretation.
    #[error("Attribute {attribute} appears more than once")]
    DuplicateAttribute {
        /// Repeated attribute value.
        attribute: AttributeValueId,
    },
    /// Adding the edge would create a cycle.
    #[error("Edge {from} -> {to} would create a cycle")]
    Cycle {
        /// Edge source.
        from: SignInterpretationId,
        /// Edge target.
        to: SignInterpretationId,
    },
    /// Line and fragment anchors cannot be deleted.
    #[error("Sign interpretation {0} is a line or fragment anchor and cannot be deleted")]
    AnchorProtected(SignInterpretationId),
    /// An edit plan refers to an interpretation no earlier operation created.
    #[error("Edit plan operation {op} created no interpretation #{index}")]
    UnresolvedReference {
        /// Referenced operation.
        op: usize,
        /// Referenced interpretation within the operation.
        index: usize,
    },
    /// Anchor lookup failed.
    #[error(transparent)]
    Anchor(#[from] AnchorError),
}

impl GraphError {
    /// Whether the error reports a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::InterpretationNotFound(_)
                | Self::SignNotFound(_)
                | Self::LineNotFound(_)
                | Self::LineNameNotFound { .. }
                | Self::FragmentNotFound(_)
        )
    }
}
