//! Canonical serialization for line fingerprints.
//!
//! Fingerprints must be stable across runs and processes:
//!
//! - Struct fields serialize in declaration order
//! - Vectors serialize in index order (sign and edge insertion order matter)
//! - Maps in hashed data are `BTreeMap`, never `HashMap`

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    // Kernel types have string or integer map keys only, so this cannot fail.
    serde_json::to_vec(value).expect("Canonical serialization failed")
}

/// xxh64 of the canonical bytes.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// [`canonical_hash`] as 16 hex digits.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeValueId, Commentary, SignInterpretationData};

    #[test]
    fn test_determinism() {
        let data = SignInterpretationData::character("a")
            .with_attribute(AttributeValueId::new(3))
            .with_commentary(Commentary::note("ink faded"));

        assert_eq!(canonical_hash(&data), canonical_hash(&data.clone()));
        assert_eq!(canonical_hash_hex(&data).len(), 16);
    }

    #[test]
    fn test_attribute_order_matters() {
        let ab = SignInterpretationData::character("a")
            .with_attribute(AttributeValueId::new(1))
            .with_attribute(AttributeValueId::new(2));
        let ba = SignInterpretationData::character("a")
            .with_attribute(AttributeValueId::new(2))
            .with_attribute(AttributeValueId::new(1));

        assert_ne!(canonical_hash(&ab), canonical_hash(&ba));
    }
}
