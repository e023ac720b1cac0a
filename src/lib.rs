//! # sign-stream-kernel
//!
//! Multi-variant sign-interpretation graphs for manuscript transcriptions.
//!
//! Every physical sign on a manuscript carries one or more readings (sign
//! interpretations). Readings are linked into a stream by authored
//! next-edges that may fork for variants or competing opinions and join
//! again. The kernel answers two questions about that stream:
//!
//! > What does this line read? (every reading path, rendered as text)
//!
//! > How do we merge an imported transcription into it without losing edits?
//!
//! ## Architecture
//!
//! ```text
//! Source Line ─┐
//!              ├→ Linearizer → Alignment → Reconciler → EditPlan
//! Target Line ─┘                                           │
//!      ↑                                                   ↓
//! EditionStore (memory) ←──── apply atomically ──── SignInterpretationGraph
//! ```
//!
//! ## Graph Invariants
//!
//! - Next-edges form a DAG within an edition
//! - Interpretation ids are unique and never reused
//! - A `(next, author)` pair appears at most once per interpretation
//! - Deleting an interpretation reconnects its predecessors to its successors
//! - Line and fragment anchors are never deleted
//!
//! ## Determinism Guarantees
//!
//! - Same line snapshot → identical ordered sequences
//! - Same target + source + hint → identical edit operations
//! - Line fingerprints are xxh64 over canonical JSON

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod vocabulary;
pub mod graph;
pub mod linearizer;
pub mod anchors;
pub mod reconciler;
pub mod roi;
pub mod store;
pub mod cache;
pub mod service;
pub mod canonical;
pub mod config;
pub mod builder;

// Re-exports
pub use types::{
    ArtefactGeometry, ArtefactId, AttributeValueId, AuthorId, BoundingBox, Commentary, EditionId,
    InterpretationAttribute, InterpretationRoi, LineId, NextInterpretation, PlacedShape, Point,
    Polygon, SignId, SignInterpretation, SignInterpretationData, SignInterpretationId,
    TextFragmentId,
};
pub use types::{Line, LineFingerprint, LineIndex, Sign, TextFragment};
pub use types::{
    AppliedEditPlan, DeletionOutcome, EditOperation, EditPlan, InterpretationRef, RewiredEdge,
    SignPlacement,
};
pub use vocabulary::{AttributeRole, AttributeVocabulary, VocabularyError, VocabularyTable};
pub use graph::{GraphError, SignInterpretationGraph};
pub use linearizer::{preferred, LinearizeError, Linearizer, Sequence};
pub use anchors::{AnchorError, AnchorKind, LineAnchors, LineDefect, SurroundingAnchors};
pub use reconciler::{
    AlignedPair, Alignment, AlignmentConfig, AlignmentHint, PairKind, ReconcileError, Reconciler,
};
pub use roi::{GeometryError, RoiTransform, ShapeValidator, SimpleShapeValidator};
pub use store::{EditionStore, InMemoryEditionStore, StoreError};
pub use cache::{CacheConfig, CacheStats, CachedLinearization, LinearizationCache};
pub use service::{ReconcileOutcome, ServiceError, SignStreamService};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use config::{ConfigError, KernelConfig};
pub use builder::LineBuilder;

/// Schema version for all serialized kernel types.
/// Increment on breaking changes to any schema type.
pub const SIGN_STREAM_SCHEMA_VERSION: &str = "1.0.0";
