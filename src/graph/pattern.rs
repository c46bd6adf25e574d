//! Patterns: reusable element-local DOF templates.
//!
//! A pattern is an ordered list of slots. Each slot takes one entity ID of
//! the slot's id type and contributes the components of its fields, in the
//! order listed. A slot without fields is structural and contributes a
//! single index.

use crate::algs::communicator::Communicator;
use crate::assembly_error::AssemblyError;
use crate::space::{FieldId, GlobalIndex, IdType, IndexSpace};

/// One entity position of a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternSlot {
    pub id_type: IdType,
    /// Empty for a structural slot.
    pub fields: Vec<FieldId>,
}

impl PatternSlot {
    pub fn new(id_type: IdType, fields: Vec<FieldId>) -> Self {
        Self { id_type, fields }
    }

    pub fn structural(id_type: IdType) -> Self {
        Self {
            id_type,
            fields: Vec::new(),
        }
    }

    /// The slot's fields as index-space slot keys (`None` when structural).
    pub fn slot_fields(&self) -> Vec<Option<FieldId>> {
        if self.fields.is_empty() {
            vec![None]
        } else {
            self.fields.iter().copied().map(Some).collect()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    id: i32,
    slots: Vec<PatternSlot>,
}

impl Pattern {
    /// `num_ids` slots of one id type, each carrying `field`.
    pub fn simple(id: i32, num_ids: usize, id_type: IdType, field: FieldId) -> Self {
        Self {
            id,
            slots: vec![PatternSlot::new(id_type, vec![field]); num_ids],
        }
    }

    /// `num_ids` structural slots of one id type.
    pub fn structural(id: i32, num_ids: usize, id_type: IdType) -> Self {
        Self {
            id,
            slots: vec![PatternSlot::structural(id_type); num_ids],
        }
    }

    pub fn general(id: i32, slots: Vec<PatternSlot>) -> Self {
        Self { id, slots }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn num_ids(&self) -> usize {
        self.slots.len()
    }

    pub fn slots(&self) -> &[PatternSlot] {
        &self.slots
    }

    /// Check that every id type and field exists in `space`.
    pub(crate) fn validate_against<C: Communicator>(
        &self,
        space: &IndexSpace<C>,
    ) -> Result<(), AssemblyError> {
        for slot in &self.slots {
            if !space.has_id_type(slot.id_type) {
                return Err(AssemblyError::Configuration(format!(
                    "pattern {} uses id type {} not defined on space '{}'",
                    self.id,
                    slot.id_type.0,
                    space.name()
                )));
            }
            for f in &slot.fields {
                space.field_size(Some(*f))?;
            }
        }
        Ok(())
    }

    /// Component count of each `(slot, field)` segment, in local order.
    pub fn segments<C: Communicator>(
        &self,
        space: &IndexSpace<C>,
    ) -> Result<Vec<usize>, AssemblyError> {
        let mut out = Vec::new();
        for slot in &self.slots {
            for f in slot.slot_fields() {
                out.push(space.field_size(f)?);
            }
        }
        Ok(out)
    }

    /// Number of local indices one element of this pattern carries.
    pub fn num_indices<C: Communicator>(
        &self,
        space: &IndexSpace<C>,
    ) -> Result<usize, AssemblyError> {
        Ok(self.segments(space)?.iter().sum())
    }

    /// Register every `(id, field)` of one element with `space`.
    pub(crate) fn register<C: Communicator>(
        &self,
        space: &mut IndexSpace<C>,
        ids: &[i64],
    ) -> Result<(), AssemblyError> {
        for (slot, &id) in self.slots.iter().zip(ids) {
            for f in slot.slot_fields() {
                space.add_dof_entries(slot.id_type, f, &[id])?;
            }
        }
        Ok(())
    }

    /// Resolve one element's IDs to global indices in pattern order.
    pub(crate) fn resolve<C: Communicator>(
        &self,
        space: &IndexSpace<C>,
        ids: &[i64],
        out: &mut Vec<GlobalIndex>,
    ) -> Result<(), AssemblyError> {
        for (slot, &id) in self.slots.iter().zip(ids) {
            for f in slot.slot_fields() {
                out.extend(space.slot_indices(slot.id_type, id, f)?);
            }
        }
        Ok(())
    }
}
