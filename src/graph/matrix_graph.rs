//! MatrixGraph: patterns, connectivity and constraints over one or two
//! index spaces, finalized into a sparsity structure.
//!
//! Lifecycle: open (patterns, blocks, connectivity and constraints may be
//! added) → [`MatrixGraph::init_complete`] → closed (read accessors only).
//! Finalization is collective: it finalizes the index spaces, gathers the
//! constraints of every rank, and sends each non-owned row's columns to
//! the row's owner.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use itertools::Itertools;

use crate::algs::communicator::{CommTag, Communicator, PhaseTags};
use crate::algs::exchange::{agree_on_success, allgather_varcount, exchange_payloads};
use crate::algs::wire::WirePair;
use crate::assembly_error::AssemblyError;
use crate::graph::connectivity::ConnectivityBlock;
use crate::graph::constraint::{
    ConstraintEntry, ConstraintSet, Elimination, SlaveConstraint,
};
use crate::graph::pattern::{Pattern, PatternSlot};
use crate::graph::structure::RowStructure;
use crate::space::{FieldId, GlobalIndex, IdType, IndexSpace};

const TAG_AGREE: CommTag = CommTag::new(0xA200);
const TAG_CONSTRAINTS: CommTag = CommTag::new(0xA202);
const TAG_STRUCTURE: CommTag = CommTag::new(0xA204);

#[derive(Debug)]
struct Finalized {
    structure: RowStructure,
    elimination: Elimination,
    overlap_rows: Vec<GlobalIndex>,
}

/// Sparsity graph of a (possibly rectangular) distributed matrix.
#[derive(Debug)]
pub struct MatrixGraph<C: Communicator> {
    row_space: IndexSpace<C>,
    col_space: Option<IndexSpace<C>>,
    patterns: BTreeMap<i32, Pattern>,
    blocks: BTreeMap<i32, ConnectivityBlock>,
    constraints: ConstraintSet,
    finalized: Option<Finalized>,
}

impl<C: Communicator> MatrixGraph<C> {
    /// A graph over `row_space`; `col_space` makes it rectangular.
    pub fn new(row_space: IndexSpace<C>, col_space: Option<IndexSpace<C>>) -> Self {
        Self {
            row_space,
            col_space,
            patterns: BTreeMap::new(),
            blocks: BTreeMap::new(),
            constraints: ConstraintSet::default(),
            finalized: None,
        }
    }

    pub fn row_space(&self) -> &IndexSpace<C> {
        &self.row_space
    }

    pub fn row_space_mut(&mut self) -> &mut IndexSpace<C> {
        &mut self.row_space
    }

    /// The column space; the row space for square graphs.
    pub fn col_space(&self) -> &IndexSpace<C> {
        self.col_space.as_ref().unwrap_or(&self.row_space)
    }

    pub fn col_space_mut(&mut self) -> &mut IndexSpace<C> {
        self.col_space.as_mut().unwrap_or(&mut self.row_space)
    }

    /// True when rows and columns share one index space.
    pub fn is_square(&self) -> bool {
        self.col_space.is_none()
    }

    pub fn comm(&self) -> &Arc<C> {
        self.row_space.comm()
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    // ----- patterns -----

    /// `num_ids` IDs of `id_type`, each carrying `field`.
    pub fn define_pattern(
        &mut self,
        id: i32,
        num_ids: usize,
        id_type: IdType,
        field: FieldId,
    ) -> Result<(), AssemblyError> {
        self.insert_pattern(Pattern::simple(id, num_ids, id_type, field))
    }

    /// `num_ids` IDs of `id_type` with one structural index each.
    pub fn define_structural_pattern(
        &mut self,
        id: i32,
        num_ids: usize,
        id_type: IdType,
    ) -> Result<(), AssemblyError> {
        self.insert_pattern(Pattern::structural(id, num_ids, id_type))
    }

    /// Arbitrary per-slot id types and field lists.
    pub fn define_general_pattern(
        &mut self,
        id: i32,
        slots: Vec<PatternSlot>,
    ) -> Result<(), AssemblyError> {
        self.insert_pattern(Pattern::general(id, slots))
    }

    fn insert_pattern(&mut self, pattern: Pattern) -> Result<(), AssemblyError> {
        if self.is_finalized() {
            return Err(AssemblyError::Configuration(format!(
                "pattern {} defined after the graph was finalized",
                pattern.id()
            )));
        }
        if pattern.num_ids() == 0 {
            return Err(AssemblyError::Configuration(format!(
                "pattern {} has no IDs",
                pattern.id()
            )));
        }
        if self.patterns.contains_key(&pattern.id()) {
            return Err(AssemblyError::Configuration(format!(
                "pattern {} is already defined",
                pattern.id()
            )));
        }
        self.patterns.insert(pattern.id(), pattern);
        Ok(())
    }

    pub fn pattern(&self, id: i32) -> Result<&Pattern, AssemblyError> {
        self.patterns.get(&id).ok_or(AssemblyError::UnknownPattern(id))
    }

    // ----- connectivity -----

    pub fn init_connectivity_block(
        &mut self,
        id: i32,
        num_elements: usize,
        row_pattern: i32,
    ) -> Result<(), AssemblyError> {
        self.add_block(id, num_elements, row_pattern, None, false)
    }

    /// A block whose elements supply separate row and column ID lists.
    pub fn init_connectivity_block_rect(
        &mut self,
        id: i32,
        num_elements: usize,
        row_pattern: i32,
        col_pattern: i32,
    ) -> Result<(), AssemblyError> {
        self.add_block(id, num_elements, row_pattern, Some(col_pattern), false)
    }

    /// A block whose elements couple each `(slot, field)` only with itself.
    pub fn init_connectivity_block_diagonal(
        &mut self,
        id: i32,
        num_elements: usize,
        pattern: i32,
    ) -> Result<(), AssemblyError> {
        self.add_block(id, num_elements, pattern, None, true)
    }

    fn add_block(
        &mut self,
        id: i32,
        num_elements: usize,
        row_pattern: i32,
        col_pattern: Option<i32>,
        diagonal: bool,
    ) -> Result<(), AssemblyError> {
        if self.is_finalized() {
            return Err(AssemblyError::InvalidConnectivity {
                block: id,
                reason: "block declared after the graph was finalized".into(),
            });
        }
        if self.blocks.contains_key(&id) {
            return Err(AssemblyError::Configuration(format!(
                "connectivity block {id} is already defined"
            )));
        }
        let rows = self.pattern(row_pattern)?;
        rows.validate_against(&self.row_space)?;
        let row_shape = (row_pattern, rows.num_ids());
        let col_shape = match col_pattern {
            Some(cp) => {
                let cols = self.pattern(cp)?;
                cols.validate_against(self.col_space())?;
                Some((cp, cols.num_ids()))
            }
            None => None,
        };
        self.blocks.insert(
            id,
            ConnectivityBlock::new(id, num_elements, row_shape, col_shape, diagonal),
        );
        Ok(())
    }

    /// Supply the row IDs of one element of a square block. An element may
    /// be supplied again only with the same IDs.
    pub fn init_connectivity(
        &mut self,
        block: i32,
        element: i64,
        row_ids: &[i64],
    ) -> Result<(), AssemblyError> {
        self.connect(block, element, row_ids, None)
    }

    pub fn init_connectivity_rect(
        &mut self,
        block: i32,
        element: i64,
        row_ids: &[i64],
        col_ids: &[i64],
    ) -> Result<(), AssemblyError> {
        self.connect(block, element, row_ids, Some(col_ids))
    }

    fn connect(
        &mut self,
        block_id: i32,
        element: i64,
        row_ids: &[i64],
        col_ids: Option<&[i64]>,
    ) -> Result<(), AssemblyError> {
        let invalid = |reason: &str| AssemblyError::InvalidConnectivity {
            block: block_id,
            reason: reason.to_owned(),
        };
        if self.is_finalized() {
            return Err(invalid("connectivity supplied after the graph was finalized"));
        }
        if self.row_space.is_finalized() || self.col_space().is_finalized() {
            return Err(invalid("connectivity supplied after the index space was finalized"));
        }
        let block = self
            .blocks
            .get_mut(&block_id)
            .ok_or_else(|| invalid("block is not defined"))?;
        block.set_element(element, row_ids, col_ids)?;
        let (row_pattern, col_pattern) = (block.row_pattern(), block.col_pattern());

        let rows = &self.patterns[&row_pattern];
        rows.register(&mut self.row_space, row_ids)?;
        if let (Some(cp), Some(ids)) = (col_pattern, col_ids) {
            let cols = &self.patterns[&cp];
            let space = self.col_space.as_mut().unwrap_or(&mut self.row_space);
            cols.register(space, ids)?;
        }
        Ok(())
    }

    // ----- constraints -----

    /// Declare `slave = Σ weight · master + rhs` over the listed DOFs.
    ///
    /// The slave is component `slave_field_offset` of entry `slave_offset`.
    /// `weights` holds one value per scalar DOF of the listed entries; the
    /// slave's own weight is ignored.
    #[allow(clippy::too_many_arguments)]
    pub fn init_slave_constraint(
        &mut self,
        num_ids: usize,
        id_types: &[IdType],
        ids: &[i64],
        field_ids: &[FieldId],
        slave_offset: usize,
        slave_field_offset: usize,
        weights: &[f64],
        rhs: f64,
    ) -> Result<(), AssemblyError> {
        if self.is_finalized() || self.row_space.is_finalized() {
            return Err(AssemblyError::Initialization(
                "slave constraint declared after finalization".into(),
            ));
        }
        if id_types.len() != num_ids || ids.len() != num_ids || field_ids.len() != num_ids {
            return Err(AssemblyError::Configuration(format!(
                "constraint declares {num_ids} IDs but lists {} id types, {} ids, {} fields",
                id_types.len(),
                ids.len(),
                field_ids.len()
            )));
        }
        let constraint = SlaveConstraint {
            entries: id_types
                .iter()
                .zip(ids)
                .zip(field_ids)
                .map(|((&id_type, &id), &field)| ConstraintEntry { id_type, id, field })
                .collect(),
            slave_offset,
            slave_field_offset,
            weights: weights.to_vec(),
            rhs,
        };
        constraint.validate(&self.row_space)?;
        for e in &constraint.entries {
            self.row_space
                .add_dof_entries(e.id_type, Some(e.field), &[e.id])?;
        }
        self.constraints.push(constraint);
        Ok(())
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    // ----- finalization -----

    /// Collective: finalize the spaces, resolve connectivity, eliminate
    /// slaves, and reconcile the sparsity of shared rows with their owners.
    pub fn init_complete(&mut self) -> Result<(), AssemblyError> {
        if self.is_finalized() {
            return Err(AssemblyError::Initialization(
                "graph is already finalized".into(),
            ));
        }
        let comm = Arc::clone(self.comm());
        agree(&*comm, self.check_complete())?;

        if !self.row_space.is_finalized() {
            self.row_space.init_complete()?;
        }
        if let Some(cs) = self.col_space.as_mut() {
            if !cs.is_finalized() {
                cs.init_complete()?;
            }
        }

        agree(&*comm, self.resolve_blocks())?;
        let wire = self.constraints.to_wire(&self.row_space);
        let ok = wire.as_ref().map(|_| ()).map_err(Clone::clone);
        agree(&*comm, ok)?;
        let wire = wire?;
        let gathered =
            allgather_varcount(&*comm, PhaseTags::from_base(TAG_CONSTRAINTS), &wire)?;
        let elimination = Elimination::flatten(ConstraintSet::merge_gathered(&gathered)?)?;

        let (mut rows, overlap_rows) = self.local_rows(&elimination)?;
        let owned = self.row_space.owned_range()?;
        let mut outgoing: BTreeMap<usize, Vec<WirePair>> = BTreeMap::new();
        for (&row, cols) in rows.range(..owned.start).chain(rows.range(owned.end..)) {
            let owner = self.row_space.owner_of(row)?;
            outgoing
                .entry(owner)
                .or_default()
                .extend(cols.iter().map(|&c| WirePair::new(row, c)));
        }
        let received =
            exchange_payloads(&*comm, PhaseTags::from_base(TAG_STRUCTURE), &outgoing)?;
        let mut bad = None;
        for (&src, pairs) in &received {
            for p in pairs {
                let (row, col) = p.decode();
                if owned.contains(&row) {
                    rows.entry(row).or_default().insert(col);
                } else if bad.is_none() {
                    bad = Some(AssemblyError::CollectiveFailure {
                        rank: src,
                        reason: format!("rank {src} sent structure for row {row} not owned here"),
                    });
                }
            }
        }
        agree(&*comm, bad.map_or(Ok(()), Err))?;

        let structure = RowStructure::from_rows(owned, rows);
        crate::strict_invariants!(
            crate::debug_invariants::DebugInvariants::validate_invariants(&structure),
            "finalized graph structure"
        );
        log::debug!(
            "graph finalized on rank {}/{}: {} blocks, {} slaves, {} owned rows, {} nonzeros, {} overlap rows",
            comm.rank(),
            comm.size(),
            self.blocks.len(),
            elimination.num_slaves(),
            structure.owned_rows().len(),
            structure.num_nonzeros_owned(),
            overlap_rows.len()
        );
        self.finalized = Some(Finalized {
            structure,
            elimination,
            overlap_rows,
        });
        Ok(())
    }

    fn check_complete(&self) -> Result<(), AssemblyError> {
        for block in self.blocks.values() {
            if block.num_supplied() != block.num_elements() {
                return Err(AssemblyError::IncompleteGraph {
                    block: block.id(),
                    supplied: block.num_supplied(),
                    expected: block.num_elements(),
                });
            }
        }
        Ok(())
    }

    fn resolve_blocks(&mut self) -> Result<(), AssemblyError> {
        let col_space = self.col_space.as_ref().unwrap_or(&self.row_space);
        for block in self.blocks.values_mut() {
            let rows = &self.patterns[&block.row_pattern()];
            let row_stride = rows.num_indices(&self.row_space)?;
            let cols = block.col_pattern().map(|cp| &self.patterns[&cp]);
            let col_stride = match cols {
                Some(p) => p.num_indices(col_space)?,
                None => row_stride,
            };
            let mut row_idx = Vec::with_capacity(row_stride * block.num_supplied());
            let mut col_idx = Vec::new();
            for pos in 0..block.num_supplied() {
                let (row_ids, col_ids) = block.ids_at(pos);
                rows.resolve(&self.row_space, row_ids, &mut row_idx)?;
                if let (Some(p), Some(ids)) = (cols, col_ids) {
                    p.resolve(col_space, ids, &mut col_idx)?;
                }
            }
            block.set_resolved(row_stride, col_stride, row_idx, col_idx);
        }
        Ok(())
    }

    /// Locally contributed `(row, col)` pairs after slave substitution, and
    /// the non-owned row indices this rank references.
    #[allow(clippy::type_complexity)]
    fn local_rows(
        &self,
        elimination: &Elimination,
    ) -> Result<(BTreeMap<GlobalIndex, BTreeSet<GlobalIndex>>, Vec<GlobalIndex>), AssemblyError>
    {
        let square = self.is_square();
        let mut rows: BTreeMap<GlobalIndex, BTreeSet<GlobalIndex>> = BTreeMap::new();
        let mut referenced: BTreeSet<GlobalIndex> = BTreeSet::new();
        let mut insert = |r: GlobalIndex, c: GlobalIndex| {
            elimination.expand(r, |rr, _| {
                if square {
                    elimination.expand(c, |cc, _| {
                        rows.entry(rr).or_default().insert(cc);
                    });
                } else {
                    rows.entry(rr).or_default().insert(c);
                }
            });
        };

        for block in self.blocks.values() {
            let segments = if block.is_diagonal() {
                Some(self.pattern(block.row_pattern())?.segments(&self.row_space)?)
            } else {
                None
            };
            for (r_idx, c_idx) in block.resolved_elements()? {
                for &r in r_idx {
                    referenced.insert(r);
                    elimination.expand(r, |m, _| {
                        referenced.insert(m);
                    });
                }
                match &segments {
                    Some(segs) => {
                        let mut o = 0;
                        for &k in segs {
                            for (&r, &c) in r_idx[o..o + k]
                                .iter()
                                .cartesian_product(&c_idx[o..o + k])
                            {
                                insert(r, c);
                            }
                            o += k;
                        }
                    }
                    None => {
                        for (&r, &c) in r_idx.iter().cartesian_product(c_idx) {
                            insert(r, c);
                        }
                    }
                }
            }
        }

        let owned = self.row_space.owned_range()?;
        let overlap_rows = referenced
            .into_iter()
            .filter(|r| !owned.contains(r))
            .collect();
        Ok((rows, overlap_rows))
    }

    // ----- finalized accessors -----

    fn finalized(&self) -> Result<&Finalized, AssemblyError> {
        self.finalized
            .as_ref()
            .ok_or_else(|| AssemblyError::Initialization("graph is not finalized".into()))
    }

    pub fn block(&self, id: i32) -> Result<&ConnectivityBlock, AssemblyError> {
        self.blocks.get(&id).ok_or(AssemblyError::UnknownBlock(id))
    }

    pub fn block_ids(&self) -> impl Iterator<Item = i32> + '_ {
        self.blocks.keys().copied()
    }

    /// Local index count of one element of `block` (row pattern).
    pub fn connectivity_num_indices(&self, block: i32) -> Result<usize, AssemblyError> {
        let b = self.block(block)?;
        self.pattern(b.row_pattern())?.num_indices(&self.row_space)
    }

    /// `(rows, cols)` local index counts of one element of `block`.
    pub fn connectivity_num_indices_rect(
        &self,
        block: i32,
    ) -> Result<(usize, usize), AssemblyError> {
        let b = self.block(block)?;
        let rows = self.connectivity_num_indices(block)?;
        let cols = match b.col_pattern() {
            Some(cp) => self.pattern(cp)?.num_indices(self.col_space())?,
            None => rows,
        };
        Ok((rows, cols))
    }

    /// Resolved row indices of one element, in pattern order.
    pub fn connectivity_indices(
        &self,
        block: i32,
        element: i64,
    ) -> Result<&[GlobalIndex], AssemblyError> {
        self.block(block)?.row_indices(element)
    }

    /// Resolved column indices of one element, in pattern order.
    pub fn connectivity_col_indices(
        &self,
        block: i32,
        element: i64,
    ) -> Result<&[GlobalIndex], AssemblyError> {
        self.block(block)?.col_indices(element)
    }

    /// Component count of each `(slot, field)` of `block`'s row pattern.
    pub fn block_segments(&self, block: i32) -> Result<Vec<usize>, AssemblyError> {
        let b = self.block(block)?;
        self.pattern(b.row_pattern())?.segments(&self.row_space)
    }

    pub fn structure(&self) -> Result<&RowStructure, AssemblyError> {
        Ok(&self.finalized()?.structure)
    }

    pub fn elimination(&self) -> Result<&Elimination, AssemblyError> {
        Ok(&self.finalized()?.elimination)
    }

    /// Row indices owned elsewhere that local connectivity or constraints
    /// reference, ascending.
    pub fn overlap_rows(&self) -> Result<&[GlobalIndex], AssemblyError> {
        Ok(&self.finalized()?.overlap_rows)
    }

    /// Owned row count with slaves removed.
    pub fn num_solvable_owned(&self) -> Result<usize, AssemblyError> {
        let owned = self.row_space.owned_range()?;
        Ok(owned.len() - self.elimination()?.num_slaves_in(owned))
    }

    /// Global row count with slaves removed.
    pub fn global_num_solvable(&self) -> Result<usize, AssemblyError> {
        Ok(self.row_space.global_num_indices()? - self.elimination()?.num_slaves())
    }

    /// First reduced row index owned by this rank.
    pub fn reduced_row_offset(&self) -> Result<usize, AssemblyError> {
        let start = self.row_space.owned_range()?.start;
        Ok(start - self.elimination()?.num_slaves_below(start))
    }
}

/// Make a locally computed outcome collective: every rank learns whether
/// any rank failed. The failing rank keeps its own error; the others report
/// a `CollectiveFailure` naming the lowest failing rank.
fn agree<C: Communicator>(comm: &C, local: Result<(), AssemblyError>) -> Result<(), AssemblyError> {
    match (agree_on_success(comm, TAG_AGREE, local.is_ok())?, local) {
        (_, Err(e)) => Err(e),
        (Some(rank), Ok(())) => Err(AssemblyError::CollectiveFailure {
            rank,
            reason: "a peer failed during graph finalization".into(),
        }),
        (None, Ok(())) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;

    const NODE: IdType = IdType(0);
    const U: FieldId = FieldId(0);

    fn graph(field_size: usize) -> MatrixGraph<NoComm> {
        let mut s = IndexSpace::new(NoComm, "rows");
        s.define_fields(&[U], &[field_size]).unwrap();
        s.define_id_types(&[NODE]).unwrap();
        MatrixGraph::new(s, None)
    }

    #[test]
    fn two_element_chain_structure() {
        let mut g = graph(1);
        g.define_pattern(0, 2, NODE, U).unwrap();
        g.init_connectivity_block(0, 2, 0).unwrap();
        g.init_connectivity(0, 0, &[0, 1]).unwrap();
        g.init_connectivity(0, 1, &[1, 2]).unwrap();
        g.init_complete().unwrap();

        let s = g.structure().unwrap();
        assert_eq!(s.row(0), Some(&[0, 1][..]));
        assert_eq!(s.row(1), Some(&[0, 1, 2][..]));
        assert_eq!(s.row(2), Some(&[1, 2][..]));
        assert_eq!(g.connectivity_indices(0, 1).unwrap(), &[1, 2]);
        assert_eq!(g.connectivity_num_indices(0).unwrap(), 2);
    }

    #[test]
    fn incomplete_block_is_reported() {
        let mut g = graph(1);
        g.define_pattern(0, 2, NODE, U).unwrap();
        g.init_connectivity_block(7, 2, 0).unwrap();
        g.init_connectivity(7, 0, &[0, 1]).unwrap();
        assert_eq!(
            g.init_complete(),
            Err(AssemblyError::IncompleteGraph {
                block: 7,
                supplied: 1,
                expected: 2
            })
        );
    }

    #[test]
    fn connectivity_errors() {
        let mut g = graph(1);
        g.define_pattern(0, 2, NODE, U).unwrap();
        assert!(matches!(
            g.init_connectivity(3, 0, &[0, 1]),
            Err(AssemblyError::InvalidConnectivity { block: 3, .. })
        ));
        assert!(matches!(
            g.init_connectivity_block(0, 1, 9),
            Err(AssemblyError::UnknownPattern(9))
        ));
        g.init_connectivity_block(0, 1, 0).unwrap();
        assert!(g.init_connectivity(0, 0, &[0]).is_err());
        g.init_connectivity(0, 0, &[0, 1]).unwrap();
        g.init_complete().unwrap();
        assert!(matches!(
            g.init_connectivity(0, 0, &[0, 1]),
            Err(AssemblyError::InvalidConnectivity { .. })
        ));
        assert!(matches!(
            g.init_complete(),
            Err(AssemblyError::Initialization(_))
        ));
    }

    #[test]
    fn duplicate_pattern_is_configuration_error() {
        let mut g = graph(1);
        g.define_pattern(0, 2, NODE, U).unwrap();
        assert!(matches!(
            g.define_structural_pattern(0, 1, NODE),
            Err(AssemblyError::Configuration(_))
        ));
    }

    #[test]
    fn diagonal_block_couples_only_within_segments() {
        let mut g = graph(2);
        g.define_pattern(0, 2, NODE, U).unwrap();
        g.init_connectivity_block_diagonal(0, 1, 0).unwrap();
        g.init_connectivity(0, 0, &[0, 1]).unwrap();
        g.init_complete().unwrap();
        let s = g.structure().unwrap();
        assert_eq!(s.row(0), Some(&[0, 1][..]));
        assert_eq!(s.row(3), Some(&[2, 3][..]));
        assert!(!s.contains(0, 2));
    }

    #[test]
    fn slave_rows_and_columns_fold_into_masters() {
        let mut g = graph(1);
        g.define_pattern(0, 2, NODE, U).unwrap();
        g.init_connectivity_block(0, 2, 0).unwrap();
        g.init_connectivity(0, 0, &[0, 1]).unwrap();
        g.init_connectivity(0, 1, &[1, 2]).unwrap();
        g.init_slave_constraint(2, &[NODE, NODE], &[1, 2], &[U, U], 1, 0, &[1.0, -1.0], 0.0)
            .unwrap();
        g.init_complete().unwrap();

        assert_eq!(g.num_solvable_owned().unwrap(), 2);
        let s = g.structure().unwrap();
        assert_eq!(s.row(2), Some(&[][..]));
        assert_eq!(s.row(1), Some(&[0, 1][..]));
        assert_eq!(g.elimination().unwrap().reduced_index(1), Some(1));
    }
}
