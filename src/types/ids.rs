//! Identifier types for the sign-interpretation graph.
//!
//! Every id is a thin `u32` newtype. Ids are allocated by the graph (or the
//! persistence layer behind it) and never reused once handed out.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a raw id.
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw id.
            pub const fn get(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

id_type!(
    /// Identifier of a single sign interpretation (one reading of one sign).
    SignInterpretationId,
    "si"
);
id_type!(
    /// Identifier of a physical sign position.
    SignId,
    "sign"
);
id_type!(
    /// Identifier of a line.
    LineId,
    "line"
);
id_type!(
    /// Identifier of a text fragment.
    TextFragmentId,
    "fragment"
);
id_type!(
    /// Identifier of an edition (the authorship and visibility scope).
    EditionId,
    "edition"
);
id_type!(
    /// Identifier of the user asserting an edge or an edit.
    AuthorId,
    "author"
);
id_type!(
    /// Identifier of an attribute value (see [`crate::vocabulary`]).
    AttributeValueId,
    "attr"
);
id_type!(
    /// Identifier of the artefact (image region owner) an ROI is drawn on.
    ArtefactId,
    "artefact"
);
