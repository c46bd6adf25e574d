//! IndexSpace: global numbering of `(entity, field)` pairs across ranks.
//!
//! An `IndexSpace` is open while the application defines fields and id
//! types and registers entities; [`IndexSpace::init_complete`] is a
//! collective that agrees on ownership and freezes a [`Numbering`]. After
//! that the space answers lookups only.
//!
//! Ownership follows the rule documented on [`Numbering`]: the lowest rank
//! that registered an entity owns all of its DOFs.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;
use std::sync::Arc;

use crate::algs::communicator::{CommTag, Communicator, PhaseTags};
use crate::algs::exchange::{agree_on_success, allgather_varcount};
use crate::algs::wire::{WireFieldDef, WireRegistration};
use crate::assembly_error::AssemblyError;
use crate::space::field::{DofSlot, EntityBlock, EntityKey, FieldId, GlobalIndex, IdType};
use crate::space::numbering::Numbering;

const TAG_FIELD_DEFS: CommTag = CommTag::new(0xA100);
const TAG_ID_TYPES: CommTag = CommTag::new(0xA102);
const TAG_REGISTRATIONS: CommTag = CommTag::new(0xA104);
const TAG_READY: CommTag = CommTag::new(0xA106);

/// Global numbering of the DOFs of one family of fields over mesh entities.
///
/// Several spaces may coexist (for example the row and column spaces of a
/// rectangular system); each owns its own vocabulary.
#[derive(Debug)]
pub struct IndexSpace<C: Communicator> {
    name: String,
    comm: Arc<C>,
    fields: BTreeMap<FieldId, usize>,
    id_types: BTreeSet<IdType>,
    registrations: BTreeSet<DofSlot>,
    numbering: Option<Numbering>,
}

impl<C: Communicator> IndexSpace<C> {
    pub fn new(comm: impl Into<Arc<C>>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comm: comm.into(),
            fields: BTreeMap::new(),
            id_types: BTreeSet::new(),
            registrations: BTreeSet::new(),
            numbering: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn comm(&self) -> &Arc<C> {
        &self.comm
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.numbering.is_some()
    }

    /// Register fields and their per-entity component counts.
    ///
    /// Redefining a field with the same size is a no-op; with a different
    /// size it is a configuration error, within one call or across calls.
    pub fn define_fields(&mut self, ids: &[FieldId], sizes: &[usize]) -> Result<(), AssemblyError> {
        self.ensure_open("define_fields")?;
        if ids.len() != sizes.len() {
            return Err(AssemblyError::Configuration(format!(
                "{} field ids but {} field sizes",
                ids.len(),
                sizes.len()
            )));
        }
        let mut seen: BTreeMap<FieldId, usize> = BTreeMap::new();
        for (&id, &size) in ids.iter().zip(sizes) {
            if let Some(&earlier) = seen.get(&id) {
                if earlier != size {
                    return Err(AssemblyError::Configuration(format!(
                        "field {} listed twice with sizes {earlier} and {size}",
                        id.0
                    )));
                }
            }
            seen.insert(id, size);
            if size == 0 {
                return Err(AssemblyError::Configuration(format!(
                    "field {} has size 0",
                    id.0
                )));
            }
            if let Some(&old) = self.fields.get(&id) {
                if old != size {
                    return Err(AssemblyError::Configuration(format!(
                        "field {} redefined with size {size} (was {old})",
                        id.0
                    )));
                }
            }
        }
        self.fields.extend(ids.iter().copied().zip(sizes.iter().copied()));
        Ok(())
    }

    pub fn define_id_types(&mut self, id_types: &[IdType]) -> Result<(), AssemblyError> {
        self.ensure_open("define_id_types")?;
        self.id_types.extend(id_types.iter().copied());
        Ok(())
    }

    /// Register `(id, field)` pairs that must receive indices whether or not
    /// any connectivity touches them.
    pub fn init_solution_entries(
        &mut self,
        field: FieldId,
        id_type: IdType,
        ids: &[i64],
    ) -> Result<(), AssemblyError> {
        self.add_dof_entries(id_type, Some(field), ids)
    }

    /// Register entities of `id_type` for `field`, or for the structural
    /// slot when `field` is `None`.
    pub(crate) fn add_dof_entries(
        &mut self,
        id_type: IdType,
        field: Option<FieldId>,
        ids: &[i64],
    ) -> Result<(), AssemblyError> {
        self.ensure_open("add_dof_entries")?;
        if !self.id_types.contains(&id_type) {
            return Err(AssemblyError::Configuration(format!(
                "id type {} is not defined on space '{}'",
                id_type.0, self.name
            )));
        }
        if let Some(f) = field {
            if !self.fields.contains_key(&f) {
                return Err(AssemblyError::Configuration(format!(
                    "field {} is not defined on space '{}'",
                    f.0, self.name
                )));
            }
        }
        self.registrations.extend(
            ids.iter()
                .map(|&id| DofSlot::new(EntityKey::new(id_type, id), field)),
        );
        Ok(())
    }

    /// Collective: agree on ownership and assign contiguous per-rank ranges.
    ///
    /// Every rank must call this. Definitions that differ between ranks fail
    /// with the same `Configuration` error everywhere. A rank that cannot
    /// start (already finalized, no id types) returns its own error and its
    /// peers return `CollectiveFailure`.
    pub fn init_complete(&mut self) -> Result<(), AssemblyError> {
        let comm = &*self.comm;
        let ready = if self.numbering.is_some() {
            Err(AssemblyError::Initialization(format!(
                "space '{}' is already finalized",
                self.name
            )))
        } else if self.id_types.is_empty() {
            Err(AssemblyError::Initialization(format!(
                "space '{}' has no id types defined",
                self.name
            )))
        } else {
            Ok(())
        };
        match (agree_on_success(comm, TAG_READY, ready.is_ok())?, ready) {
            (_, Err(e)) => return Err(e),
            (Some(rank), Ok(())) => {
                return Err(AssemblyError::CollectiveFailure {
                    rank,
                    reason: format!("space '{}' could not be finalized on a peer", self.name),
                });
            }
            (None, Ok(())) => {}
        }

        let defs: Vec<WireFieldDef> = self
            .fields
            .iter()
            .map(|(f, &size)| WireFieldDef::new(f.0, size))
            .collect();
        let all_defs = allgather_varcount(comm, PhaseTags::from_base(TAG_FIELD_DEFS), &defs)?;
        let types: Vec<i32> = self.id_types.iter().map(|t| t.0.to_le()).collect();
        let all_types = allgather_varcount(comm, PhaseTags::from_base(TAG_ID_TYPES), &types)?;

        let decode_defs =
            |v: &[WireFieldDef]| v.iter().map(WireFieldDef::decode).collect::<Vec<_>>();
        let reference = decode_defs(&all_defs[0]);
        if let Some(rank) = (1..all_defs.len()).find(|&r| {
            decode_defs(&all_defs[r]) != reference || all_types[r] != all_types[0]
        }) {
            return Err(AssemblyError::Configuration(format!(
                "space '{}': field or id-type definitions on rank {rank} differ from rank 0",
                self.name
            )));
        }

        let regs: Vec<WireRegistration> = self
            .registrations
            .iter()
            .map(|s| WireRegistration::new(s.entity.id_type.0, s.entity.id, s.field.map(|f| f.0)))
            .collect();
        let gathered = allgather_varcount(comm, PhaseTags::from_base(TAG_REGISTRATIONS), &regs)?;
        let gathered: Vec<Vec<DofSlot>> = gathered
            .iter()
            .map(|recs| {
                recs.iter()
                    .map(|r| {
                        let (id_type, id, field) = r.decode();
                        DofSlot::new(EntityKey::new(IdType(id_type), id), field.map(FieldId))
                    })
                    .collect()
            })
            .collect();

        let local: BTreeSet<EntityKey> = self.registrations.iter().map(|s| s.entity).collect();
        let numbering = Numbering::build(&gathered, &self.fields, &local)?;
        log::debug!(
            "space '{}' finalized on rank {}/{}: {} owned of {} global indices",
            self.name,
            comm.rank(),
            comm.size(),
            numbering.owned_range(comm.rank()).len(),
            numbering.global_num_indices()
        );
        self.numbering = Some(numbering);
        Ok(())
    }

    /// The finalized numbering.
    pub fn numbering(&self) -> Result<&Numbering, AssemblyError> {
        self.numbering.as_ref().ok_or_else(|| {
            AssemblyError::Initialization(format!("space '{}' is not finalized", self.name))
        })
    }

    /// The `num_partitions + 1` partition boundaries.
    pub fn global_index_offsets(&self) -> Result<&[GlobalIndex], AssemblyError> {
        Ok(self.numbering()?.offsets())
    }

    pub fn num_indices_owned(&self) -> Result<usize, AssemblyError> {
        Ok(self.owned_range()?.len())
    }

    pub fn owned_range(&self) -> Result<Range<GlobalIndex>, AssemblyError> {
        Ok(self.numbering()?.owned_range(self.comm.rank()))
    }

    pub fn global_num_indices(&self) -> Result<usize, AssemblyError> {
        Ok(self.numbering()?.global_num_indices())
    }

    pub fn num_partitions(&self) -> usize {
        self.comm.size()
    }

    pub fn local_rank(&self) -> usize {
        self.comm.rank()
    }

    /// Components per entity of `field`; structural slots have one.
    pub fn field_size(&self, field: Option<FieldId>) -> Result<usize, AssemblyError> {
        match field {
            None => Ok(1),
            Some(f) => self.fields.get(&f).copied().ok_or_else(|| {
                AssemblyError::Configuration(format!(
                    "field {} is not defined on space '{}'",
                    f.0, self.name
                ))
            }),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (FieldId, usize)> + '_ {
        self.fields.iter().map(|(&f, &s)| (f, s))
    }

    pub fn has_id_type(&self, id_type: IdType) -> bool {
        self.id_types.contains(&id_type)
    }

    /// Global indices of all components of one locally known slot.
    pub fn slot_indices(
        &self,
        id_type: IdType,
        id: i64,
        field: Option<FieldId>,
    ) -> Result<Range<GlobalIndex>, AssemblyError> {
        let slot = DofSlot::new(EntityKey::new(id_type, id), field);
        let start = self
            .numbering()?
            .slot_start(&slot)
            .ok_or(AssemblyError::UnknownEntity {
                id_type: id_type.0,
                id,
                field: field.map(|f| f.0),
            })?;
        Ok(start..start + self.field_size(field)?)
    }

    /// Global index of `(id_type, id, field, component)`.
    pub fn global_index(
        &self,
        id_type: IdType,
        id: i64,
        field: Option<FieldId>,
        component: usize,
    ) -> Result<GlobalIndex, AssemblyError> {
        let range = self.slot_indices(id_type, id, field)?;
        if component >= range.len() {
            return Err(AssemblyError::Configuration(format!(
                "component {component} out of range for field {:?} of size {}",
                field.map(|f| f.0),
                range.len()
            )));
        }
        Ok(range.start + component)
    }

    pub fn owner_of(&self, index: GlobalIndex) -> Result<usize, AssemblyError> {
        self.numbering()?
            .owner_of(index)
            .ok_or(AssemblyError::IndexNotOwned(index))
    }

    pub fn is_owned(&self, index: GlobalIndex) -> bool {
        self.owned_range().is_ok_and(|r| r.contains(&index))
    }

    /// The contiguous block of the entity that owns `index`.
    pub fn entity_block(&self, index: GlobalIndex) -> Result<EntityBlock, AssemblyError> {
        self.numbering()?
            .block_of(index)
            .ok_or(AssemblyError::IndexNotOwned(index))
    }

    fn ensure_open(&self, op: &str) -> Result<(), AssemblyError> {
        if self.is_finalized() {
            return Err(AssemblyError::Configuration(format!(
                "{op} called on finalized space '{}'",
                self.name
            )));
        }
        Ok(())
    }
}
