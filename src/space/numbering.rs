//! Finalized global numbering of an [`IndexSpace`](super::IndexSpace).
//!
//! Built identically on every rank from the all-gathered registrations:
//! an entity is owned by the lowest rank that registered it, owned entities
//! are numbered rank by rank (ascending), then by `(id type, id)` within a
//! rank, and an entity's slots are laid out contiguously in [`DofSlot`]
//! order. Every rank therefore computes the same offsets and entity blocks
//! without a second round of communication.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap as FastMap;

use crate::assembly_error::AssemblyError;
use crate::debug_invariants::{DebugInvariants, ensure};
use crate::space::field::{DofSlot, EntityBlock, EntityKey, FieldId, GlobalIndex};

/// Partition offsets, the global entity-block map, and the local slot lookup.
#[derive(Clone, Debug)]
pub struct Numbering {
    offsets: Vec<GlobalIndex>,
    blocks: Vec<EntityBlock>,
    slots: FastMap<DofSlot, GlobalIndex>,
}

impl Numbering {
    /// Number the union of all ranks' registrations.
    ///
    /// `gathered[r]` holds rank `r`'s registered slots. Lookups are kept only
    /// for entities in `local_entities`; the block map covers every entity.
    pub(crate) fn build(
        gathered: &[Vec<DofSlot>],
        field_sizes: &BTreeMap<FieldId, usize>,
        local_entities: &BTreeSet<EntityKey>,
    ) -> Result<Self, AssemblyError> {
        let n_ranks = gathered.len().max(1);
        let mut entities: BTreeMap<EntityKey, (usize, BTreeSet<Option<FieldId>>)> =
            BTreeMap::new();
        for (rank, slots) in gathered.iter().enumerate() {
            for slot in slots {
                entities
                    .entry(slot.entity)
                    .or_insert_with(|| (rank, BTreeSet::new()))
                    .1
                    .insert(slot.field);
            }
        }

        let mut per_owner: Vec<Vec<(&EntityKey, &BTreeSet<Option<FieldId>>)>> =
            vec![Vec::new(); n_ranks];
        for (key, (owner, fields)) in &entities {
            per_owner[*owner].push((key, fields));
        }

        let mut offsets = Vec::with_capacity(n_ranks + 1);
        let mut blocks = Vec::with_capacity(entities.len());
        let mut slots = FastMap::new();
        let mut next: GlobalIndex = 0;
        offsets.push(0);
        for owned in &per_owner {
            for &(key, fields) in owned {
                let start = next;
                for &field in fields {
                    let size = match field {
                        None => 1,
                        Some(f) => *field_sizes.get(&f).ok_or_else(|| {
                            AssemblyError::Configuration(format!(
                                "entity {key} registered for undefined field {}",
                                f.0
                            ))
                        })?,
                    };
                    if local_entities.contains(key) {
                        slots.insert(DofSlot::new(*key, field), next);
                    }
                    next += size;
                }
                blocks.push(EntityBlock {
                    start,
                    len: next - start,
                });
            }
            offsets.push(next);
        }

        let numbering = Self {
            offsets,
            blocks,
            slots,
        };
        numbering.debug_assert_invariants();
        Ok(numbering)
    }

    /// The `num_ranks + 1` partition boundaries.
    #[inline]
    pub fn offsets(&self) -> &[GlobalIndex] {
        &self.offsets
    }

    #[inline]
    pub fn global_num_indices(&self) -> usize {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Owned range `[offset[rank], offset[rank + 1])`.
    pub fn owned_range(&self, rank: usize) -> std::ops::Range<GlobalIndex> {
        self.offsets[rank]..self.offsets[rank + 1]
    }

    /// The unique rank `p` with `offset[p] <= index < offset[p + 1]`.
    pub fn owner_of(&self, index: GlobalIndex) -> Option<usize> {
        if index >= self.global_num_indices() {
            return None;
        }
        Some(self.offsets.partition_point(|&o| o <= index) - 1)
    }

    /// The entity block containing `index`.
    pub fn block_of(&self, index: GlobalIndex) -> Option<EntityBlock> {
        let pos = self.blocks.partition_point(|b| b.start <= index);
        pos.checked_sub(1)
            .map(|p| self.blocks[p])
            .filter(|b| b.contains(index))
    }

    /// First global index of a locally known slot.
    #[inline]
    pub fn slot_start(&self, slot: &DofSlot) -> Option<GlobalIndex> {
        self.slots.get(slot).copied()
    }

    /// Number of slots with a local lookup entry.
    #[inline]
    pub fn num_local_slots(&self) -> usize {
        self.slots.len()
    }
}

impl DebugInvariants for Numbering {
    fn validate_invariants(&self) -> Result<(), AssemblyError> {
        ensure(self.offsets.first() == Some(&0), || "offset[0] != 0".into())?;
        for w in self.offsets.windows(2) {
            ensure(w[0] <= w[1], || format!("offsets decrease: {} > {}", w[0], w[1]))?;
        }
        let mut expect = 0;
        for b in &self.blocks {
            ensure(b.start == expect && b.len > 0, || {
                format!("entity block {b:?} does not continue at {expect}")
            })?;
            expect = b.end();
        }
        ensure(expect == self.global_num_indices(), || {
            format!(
                "entity blocks end at {expect}, global size is {}",
                self.global_num_indices()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::field::IdType;

    fn slot(id: i64, field: Option<i32>) -> DofSlot {
        DofSlot::new(EntityKey::new(IdType(0), id), field.map(FieldId))
    }

    #[test]
    fn shared_entity_goes_to_lowest_rank() {
        let sizes: BTreeMap<_, _> = [(FieldId(1), 2)].into_iter().collect();
        let gathered = vec![
            vec![slot(0, Some(1)), slot(1, Some(1))],
            vec![slot(1, Some(1)), slot(2, Some(1))],
        ];
        let local: BTreeSet<_> = [1, 2].iter().map(|&i| EntityKey::new(IdType(0), i)).collect();
        let n = Numbering::build(&gathered, &sizes, &local).unwrap();
        assert_eq!(n.offsets(), &[0, 4, 6]);
        assert_eq!(n.slot_start(&slot(1, Some(1))), Some(2));
        assert_eq!(n.slot_start(&slot(2, Some(1))), Some(4));
        assert_eq!(n.slot_start(&slot(0, Some(1))), None);
        assert_eq!(n.owner_of(3), Some(0));
        assert_eq!(n.owner_of(4), Some(1));
        assert_eq!(n.owner_of(6), None);
        assert_eq!(n.block_of(5), Some(EntityBlock { start: 4, len: 2 }));
        n.validate_invariants().unwrap();
    }

    #[test]
    fn fields_union_across_ranks_and_structural_slot_first() {
        let sizes: BTreeMap<_, _> = [(FieldId(3), 3)].into_iter().collect();
        let gathered = vec![vec![slot(7, Some(3))], vec![slot(7, None)]];
        let local: BTreeSet<_> = [EntityKey::new(IdType(0), 7)].into_iter().collect();
        let n = Numbering::build(&gathered, &sizes, &local).unwrap();
        assert_eq!(n.offsets(), &[0, 4, 4]);
        assert_eq!(n.slot_start(&slot(7, None)), Some(0));
        assert_eq!(n.slot_start(&slot(7, Some(3))), Some(1));
    }

    #[test]
    fn undefined_field_is_configuration_error() {
        let gathered = vec![vec![slot(1, Some(9))]];
        let err = Numbering::build(&gathered, &BTreeMap::new(), &BTreeSet::new()).unwrap_err();
        assert!(matches!(err, AssemblyError::Configuration(_)));
    }
}
