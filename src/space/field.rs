//! Vocabulary types: fields, id types, entity keys and DOF slots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One scalar degree of freedom in the global numbering.
pub type GlobalIndex = usize;

/// Caller-chosen identifier of a physical field.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct FieldId(pub i32);

/// Caller-chosen tag distinguishing kinds of mesh entity (node, edge, ...).
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct IdType(pub i32);

/// A mesh object: `(id type, id)`. Carries no global order of its own; it
/// gains global indices only through field association.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EntityKey {
    pub id_type: IdType,
    pub id: i64,
}

impl EntityKey {
    #[inline]
    pub const fn new(id_type: IdType, id: i64) -> Self {
        Self { id_type, id }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.id_type.0, self.id)
    }
}

/// An entity together with one of its fields. `field == None` is the
/// structural slot: exactly one index, no physical field attached.
///
/// Ordering puts the structural slot first, then fields by ascending id,
/// which is also the order of the slot's indices inside an entity block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DofSlot {
    pub entity: EntityKey,
    pub field: Option<FieldId>,
}

impl DofSlot {
    #[inline]
    pub const fn new(entity: EntityKey, field: Option<FieldId>) -> Self {
        Self { entity, field }
    }
}

/// Half-open range of global indices owned by one entity (all its fields).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EntityBlock {
    pub start: GlobalIndex,
    pub len: usize,
}

impl EntityBlock {
    #[inline]
    pub fn end(&self) -> GlobalIndex {
        self.start + self.len
    }

    #[inline]
    pub fn contains(&self, index: GlobalIndex) -> bool {
        (self.start..self.end()).contains(&index)
    }
}
