//! Edit plans produced by the reconciler and their applied results.
//!
//! A plan is an ordered list of operations against one stored line. Inserted
//! interpretations do not have ids until the plan is applied, so later
//! operations refer to them through [`InterpretationRef::Planned`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{AuthorId, LineId, SignId, SignInterpretationId};
use super::interpretation::SignInterpretationData;
use super::line::LineFingerprint;

/// Reference to an interpretation that either exists or will be created by
/// an earlier operation of the same plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterpretationRef {
    /// An interpretation already stored in the graph.
    Stored {
        /// Stored id.
        id: SignInterpretationId,
    },
    /// The `index`-th interpretation created by operation `op`.
    Planned {
        /// Index of the insert operation in the plan.
        op: usize,
        /// Index within that operation's interpretations.
        index: usize,
    },
}

impl InterpretationRef {
    /// Reference to a stored interpretation.
    pub fn stored(id: SignInterpretationId) -> Self {
        Self::Stored { id }
    }

    /// The stored id, if this is a stored reference.
    pub fn as_stored(&self) -> Option<SignInterpretationId> {
        match self {
            Self::Stored { id } => Some(*id),
            Self::Planned { .. } => None,
        }
    }
}

impl From<SignInterpretationId> for InterpretationRef {
    fn from(id: SignInterpretationId) -> Self {
        Self::stored(id)
    }
}

/// Where inserted interpretations live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignPlacement {
    /// A new sign, placed in the line after the sign of the first resolved
    /// `anchors_before` entry.
    NewSign,
    /// Additional readings of an existing sign.
    ExistingSign {
        /// The sign receiving the readings.
        sign_id: SignId,
    },
}

/// One step of an edit plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum EditOperation {
    /// The target interpretation already matches the source.
    Keep {
        /// Kept interpretation.
        target: SignInterpretationId,
    },
    /// Replace the target interpretation's data.
    Update {
        /// Updated interpretation.
        target: SignInterpretationId,
        /// Complete new data (edges preserved from the target).
        data: SignInterpretationData,
    },
    /// Create interpretations and splice them between anchors.
    Insert {
        /// Where the new interpretations live.
        placement: SignPlacement,
        /// New interpretation data; next-edges are derived from `anchors_after`.
        interpretations: Vec<SignInterpretationData>,
        /// Interpretations that get an edge into every new interpretation.
        anchors_before: Vec<InterpretationRef>,
        /// Interpretations every new interpretation gets an edge into.
        anchors_after: Vec<InterpretationRef>,
        /// Remove existing edges from `anchors_before` to `anchors_after`.
        break_anchor_links: bool,
        /// Source-line ids the interpretations were taken from.
        source_ids: Vec<SignInterpretationId>,
    },
    /// Delete an interpretation, reconnecting its predecessors.
    Delete {
        /// Deleted interpretation.
        target: SignInterpretationId,
        /// Predecessors at planning time.
        predecessors: Vec<SignInterpretationId>,
        /// Successors at planning time; predecessors are reconnected to these.
        successors: Vec<SignInterpretationId>,
    },
}

impl EditOperation {
    /// Short operation name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Keep { .. } => "keep",
            Self::Update { .. } => "update",
            Self::Insert { .. } => "insert",
            Self::Delete { .. } => "delete",
        }
    }
}

/// Ordered edit operations against one stored line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditPlan {
    /// Plan id for correlation in logs and responses.
    pub id: Uuid,
    /// Target line.
    pub line_id: LineId,
    /// Fingerprint of the target line the plan was computed against.
    pub target_fingerprint: LineFingerprint,
    /// Author of edges created by the plan.
    pub author: AuthorId,
    /// When the plan was computed.
    pub created_at: DateTime<Utc>,
    /// Operations in document order.
    pub operations: Vec<EditOperation>,
}

impl EditPlan {
    /// Create an empty plan.
    pub fn new(line_id: LineId, target_fingerprint: LineFingerprint, author: AuthorId) -> Self {
        Self {
            id: Uuid::new_v4(),
            line_id,
            target_fingerprint,
            author,
            created_at: Utc::now(),
            operations: Vec::new(),
        }
    }

    /// Append an operation, returning its index.
    pub fn push(&mut self, op: EditOperation) -> usize {
        self.operations.push(op);
        self.operations.len() - 1
    }

    /// Number of keep operations.
    pub fn num_keeps(&self) -> usize {
        self.count(|op| matches!(op, EditOperation::Keep { .. }))
    }

    /// Number of update operations.
    pub fn num_updates(&self) -> usize {
        self.count(|op| matches!(op, EditOperation::Update { .. }))
    }

    /// Number of insert operations.
    pub fn num_inserts(&self) -> usize {
        self.count(|op| matches!(op, EditOperation::Insert { .. }))
    }

    /// Number of delete operations.
    pub fn num_deletes(&self) -> usize {
        self.count(|op| matches!(op, EditOperation::Delete { .. }))
    }

    /// Whether applying the plan would change nothing.
    pub fn is_noop(&self) -> bool {
        self.operations
            .iter()
            .all(|op| matches!(op, EditOperation::Keep { .. }))
    }

    /// Ids scheduled for deletion, in plan order.
    pub fn deleted_ids(&self) -> Vec<SignInterpretationId> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                EditOperation::Delete { target, .. } => Some(*target),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&EditOperation) -> bool) -> usize {
        self.operations.iter().filter(|op| pred(op)).count()
    }
}

/// A next-edge rewritten while deleting an interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewiredEdge {
    /// Predecessor whose edge was rewritten.
    pub from: SignInterpretationId,
    /// The deleted successor.
    pub removed: SignInterpretationId,
    /// Successors the predecessor was reconnected to.
    pub added: Vec<SignInterpretationId>,
    /// Author of the rewritten edge.
    pub author: AuthorId,
}

/// Result of deleting one interpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionOutcome {
    /// Deleted interpretation.
    pub deleted: SignInterpretationId,
    /// Sign removed because it had no interpretations left.
    pub removed_sign: Option<SignId>,
    /// Rewritten predecessor edges.
    pub rewired: Vec<RewiredEdge>,
}

/// Result of applying an edit plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedEditPlan {
    /// Applied plan.
    pub plan_id: Uuid,
    /// Target line.
    pub line_id: LineId,
    /// Created interpretation ids, in plan order.
    pub created: Vec<SignInterpretationId>,
    /// Signs created for `NewSign` inserts.
    pub created_signs: Vec<SignId>,
    /// Updated interpretation ids.
    pub updated: Vec<SignInterpretationId>,
    /// Deleted interpretation ids. Clients must be told about these.
    pub deleted: Vec<SignInterpretationId>,
    /// Signs removed because they became empty.
    pub deleted_signs: Vec<SignId>,
    /// Edges rewritten by deletions.
    pub rewired: Vec<RewiredEdge>,
    /// When the plan was committed.
    pub applied_at: DateTime<Utc>,
}

impl AppliedEditPlan {
    /// Empty result for a plan.
    pub fn new(plan_id: Uuid, line_id: LineId) -> Self {
        Self {
            plan_id,
            line_id,
            created: Vec::new(),
            created_signs: Vec::new(),
            updated: Vec::new(),
            deleted: Vec::new(),
            deleted_signs: Vec::new(),
            rewired: Vec::new(),
            applied_at: Utc::now(),
        }
    }
}
