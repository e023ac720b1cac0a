//! Core types for the sign-stream kernel.

pub mod ids;
pub mod interpretation;
pub mod geometry;
pub mod line;
pub mod edit_plan;

pub use ids::{
    ArtefactId, AttributeValueId, AuthorId, EditionId, LineId, SignId, SignInterpretationId,
    TextFragmentId,
};
pub use interpretation::{
    Commentary, InterpretationAttribute, NextInterpretation, SignInterpretation,
    SignInterpretationData,
};
pub use geometry::{
    ArtefactGeometry, BoundingBox, InterpretationRoi, PlacedShape, Point, Polygon,
};
pub use line::{Line, LineFingerprint, LineIndex, Sign, TextFragment};
pub use edit_plan::{
    AppliedEditPlan, DeletionOutcome, EditOperation, EditPlan, InterpretationRef, RewiredEdge,
    SignPlacement,
};
