//! Attribute vocabulary: attribute-value ids with meaning to the algorithms.
//!
//! The table is configuration. It is resolved once into an
//! [`AttributeRole`] lookup so the algorithms never compare strings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{AttributeValueId, SignInterpretationData};

/// Semantic role of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeRole {
    /// Inter-word space.
    Space,
    /// Intentionally blank stretch of the writing surface.
    Vacat,
    /// Gap caused by physical damage (lacuna).
    Break,
    /// Sign is damaged, reading certain.
    DamageCertain,
    /// Sign is damaged, reading probable.
    DamageProbable,
    /// Sign is damaged, reading possible.
    DamagePossible,
    /// Start anchor of a line.
    LineStart,
    /// End anchor of a line.
    LineEnd,
    /// Start anchor of a text fragment.
    FragmentStart,
    /// End anchor of a text fragment.
    FragmentEnd,
}

impl AttributeRole {
    /// All roles, in table order.
    pub const ALL: [AttributeRole; 10] = [
        Self::Space,
        Self::Vacat,
        Self::Break,
        Self::DamageCertain,
        Self::DamageProbable,
        Self::DamagePossible,
        Self::LineStart,
        Self::LineEnd,
        Self::FragmentStart,
        Self::FragmentEnd,
    ];

    /// Whether the role marks a line or fragment boundary.
    pub fn is_anchor(&self) -> bool {
        matches!(
            self,
            Self::LineStart | Self::LineEnd | Self::FragmentStart | Self::FragmentEnd
        )
    }
}

impl fmt::Display for AttributeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Space => "space",
            Self::Vacat => "vacat",
            Self::Break => "break",
            Self::DamageCertain => "damage_certain",
            Self::DamageProbable => "damage_probable",
            Self::DamagePossible => "damage_possible",
            Self::LineStart => "line_start",
            Self::LineEnd => "line_end",
            Self::FragmentStart => "fragment_start",
            Self::FragmentEnd => "fragment_end",
        };
        write!(f, "{}", name)
    }
}

/// Error building a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VocabularyError {
    /// Two roles were mapped to the same attribute value.
    #[error("Attribute value {id} is assigned to both {first} and {second}")]
    DuplicateId {
        /// Shared id.
        id: AttributeValueId,
        /// First role holding the id.
        first: AttributeRole,
        /// Second role holding the id.
        second: AttributeRole,
    },
}

/// Serialized form of the vocabulary: one id per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyTable {
    /// Space.
    pub space: AttributeValueId,
    /// Vacat.
    pub vacat: AttributeValueId,
    /// Break (damage gap).
    #[serde(rename = "break")]
    pub break_: AttributeValueId,
    /// Damage, reading certain.
    pub damage_certain: AttributeValueId,
    /// Damage, reading probable.
    pub damage_probable: AttributeValueId,
    /// Damage, reading possible.
    pub damage_possible: AttributeValueId,
    /// Line start anchor.
    pub line_start: AttributeValueId,
    /// Line end anchor.
    pub line_end: AttributeValueId,
    /// Fragment start anchor.
    pub fragment_start: AttributeValueId,
    /// Fragment end anchor.
    pub fragment_end: AttributeValueId,
}

impl VocabularyTable {
    /// Id assigned to a role.
    pub fn id(&self, role: AttributeRole) -> AttributeValueId {
        match role {
            AttributeRole::Space => self.space,
            AttributeRole::Vacat => self.vacat,
            AttributeRole::Break => self.break_,
            AttributeRole::DamageCertain => self.damage_certain,
            AttributeRole::DamageProbable => self.damage_probable,
            AttributeRole::DamagePossible => self.damage_possible,
            AttributeRole::LineStart => self.line_start,
            AttributeRole::LineEnd => self.line_end,
            AttributeRole::FragmentStart => self.fragment_start,
            AttributeRole::FragmentEnd => self.fragment_end,
        }
    }
}

impl Default for VocabularyTable {
    fn default() -> Self {
        Self {
            space: AttributeValueId::new(2),
            vacat: AttributeValueId::new(4),
            break_: AttributeValueId::new(5),
            damage_certain: AttributeValueId::new(18),
            damage_probable: AttributeValueId::new(19),
            damage_possible: AttributeValueId::new(20),
            line_start: AttributeValueId::new(12),
            line_end: AttributeValueId::new(13),
            fragment_start: AttributeValueId::new(14),
            fragment_end: AttributeValueId::new(15),
        }
    }
}

/// Resolved attribute vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VocabularyTable", into = "VocabularyTable")]
pub struct AttributeVocabulary {
    table: VocabularyTable,
    roles: BTreeMap<AttributeValueId, AttributeRole>,
}

impl AttributeVocabulary {
    /// Resolve a table, rejecting ids shared between roles.
    pub fn from_table(table: VocabularyTable) -> Result<Self, VocabularyError> {
        let mut roles = BTreeMap::new();
        for role in AttributeRole::ALL {
            let id = table.id(role);
            if let Some(first) = roles.insert(id, role) {
                return Err(VocabularyError::DuplicateId {
                    id,
                    first,
                    second: role,
                });
            }
        }
        Ok(Self { table, roles })
    }

    /// The underlying table.
    pub fn table(&self) -> &VocabularyTable {
        &self.table
    }

    /// Id assigned to a role.
    pub fn id(&self, role: AttributeRole) -> AttributeValueId {
        self.table.id(role)
    }

    /// Role of an attribute value, if it has one.
    pub fn role_of(&self, id: AttributeValueId) -> Option<AttributeRole> {
        self.roles.get(&id).copied()
    }

    /// Whether the interpretation carries the role.
    pub fn has_role(&self, data: &SignInterpretationData, role: AttributeRole) -> bool {
        data.has_attribute(self.id(role))
    }

    /// Roles carried by an interpretation, in attribute order.
    pub fn roles(&self, data: &SignInterpretationData) -> Vec<AttributeRole> {
        data.attributes
            .iter()
            .filter_map(|a| self.role_of(a.attribute_value_id))
            .collect()
    }

    /// First anchor role carried by an interpretation.
    pub fn anchor_role(&self, data: &SignInterpretationData) -> Option<AttributeRole> {
        self.roles(data).into_iter().find(AttributeRole::is_anchor)
    }

    /// Whether the interpretation is a line or fragment anchor.
    pub fn is_anchor(&self, data: &SignInterpretationData) -> bool {
        self.anchor_role(data).is_some()
    }
}

impl Default for AttributeVocabulary {
    fn default() -> Self {
        // The default table has distinct ids for every role.
        let table = VocabularyTable::default();
        let roles = AttributeRole::ALL
            .iter()
            .map(|role| (table.id(*role), *role))
            .collect();
        Self { table, roles }
    }
}

impl TryFrom<VocabularyTable> for AttributeVocabulary {
    type Error = VocabularyError;

    fn try_from(table: VocabularyTable) -> Result<Self, Self::Error> {
        Self::from_table(table)
    }
}

impl From<AttributeVocabulary> for VocabularyTable {
    fn from(vocabulary: AttributeVocabulary) -> Self {
        vocabulary.table
    }
}
