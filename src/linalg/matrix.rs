//! Distributed matrix: the capability interface and its implementation.
//!
//! Sum-in applies slave elimination immediately, accumulates owned rows
//! into a [`RowStorage`] backend, and buffers rows owned elsewhere in an
//! [`OverlapBuffer`] until the collective [`Matrix::global_assemble`].
//!
//! State machine:
//! `Open` --global_assemble--> `Assembling` --> `Assembled`
//! `Assembled | Reset` --sum_in--> `Open`; any --put_scalar--> `Reset`.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::algs::communicator::{CommTag, Communicator, PhaseTags};
use crate::assembly_error::AssemblyError;
use crate::graph::MatrixGraph;
use crate::linalg::format::{CoefFormat, Triple, expand};
use crate::linalg::matrix_market;
use crate::linalg::overlap::{OverlapBuffer, ReductionStats, reduce_to_owners};
use crate::linalg::storage::{BlockRows, RowStorage, ScalarRows};
use crate::params::{AssemblyOptions, OutputLevel, ParameterSet};
use crate::space::GlobalIndex;

const TAGS_COEFS: PhaseTags = PhaseTags::from_base(CommTag::new(0xA300));
const TAGS_RHS: PhaseTags = PhaseTags::from_base(CommTag::new(0xA308));

/// Where a matrix or vector is in its assembly cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AssemblyState {
    /// Accumulating contributions.
    Open,
    /// Inside the collective reconciliation.
    Assembling,
    /// Owned values are complete; safe for solver handoff.
    Assembled,
    /// Values were overwritten by `put_scalar`.
    Reset,
}

/// Capability interface of an assembled sparse matrix.
///
/// Rows and columns are addressed by global index. Reads are limited to
/// rows owned by the calling rank.
pub trait Matrix {
    fn type_name(&self) -> &'static str;

    fn state(&self) -> AssemblyState;

    /// Accumulate the dense contribution of one element of a connectivity
    /// block.
    fn sum_in_element(
        &mut self,
        block: i32,
        element: i64,
        coefs: &[f64],
        format: CoefFormat,
    ) -> Result<(), AssemblyError>;

    /// Accumulate a dense `rows × cols` contribution at explicit indices.
    fn sum_in(
        &mut self,
        rows: &[GlobalIndex],
        cols: &[GlobalIndex],
        coefs: &[f64],
        format: CoefFormat,
    ) -> Result<(), AssemblyError>;

    /// Collective: reconcile overlap contributions into their owners.
    fn gather_from_overlap(&mut self) -> Result<(), AssemblyError>;

    /// Collective: [`gather_from_overlap`](Matrix::gather_from_overlap), then
    /// statistics and matrix-file output as configured.
    fn global_assemble(&mut self) -> Result<(), AssemblyError>;

    /// Number of stored positions in an owned row. `ScalarRows` stores only
    /// structural positions, so its row lengths sum to the structural count.
    /// `BlockRows` stores whole entity tiles and may report more.
    fn row_length(&self, row: GlobalIndex) -> Result<usize, AssemblyError>;

    /// Column indices and coefficients of an owned row, ascending by column.
    fn copy_out_row(&self, row: GlobalIndex) -> Result<(Vec<GlobalIndex>, Vec<f64>), AssemblyError>;

    /// Overwrite every stored coefficient; structure is unchanged. Pending
    /// overlap contributions and rhs corrections are discarded.
    fn put_scalar(&mut self, value: f64);

    /// Write the owned rows in the triplet text format, in reduced
    /// numbering. With several ranks each writes `<path>.<size>.<rank>`.
    fn write_to_file(&self, path: &Path) -> Result<(), AssemblyError>;

    /// Global row count with slaves removed.
    fn global_num_rows(&self) -> usize;
    fn global_num_cols(&self) -> usize;
    /// Owned solvable rows.
    fn local_num_rows(&self) -> usize;
    /// Owned global row range, slaves included.
    fn owned_rows(&self) -> Range<GlobalIndex>;
    /// Reduced index of a solvable row.
    fn reduced_row(&self, row: GlobalIndex) -> Option<usize>;
    /// Reduced index of a solvable column.
    fn reduced_col(&self, col: GlobalIndex) -> Option<usize>;
    /// First reduced row owned by this rank.
    fn reduced_row_offset(&self) -> usize;
    /// Right-hand-side corrections from columns of slaves with non-zero
    /// `rhs`, keyed by owned row.
    fn rhs_corrections(&self) -> &BTreeMap<GlobalIndex, f64>;
}

#[derive(Clone, Debug)]
struct Dims {
    owned: Range<GlobalIndex>,
    global_rows: usize,
    global_cols: usize,
    local_rows: usize,
    reduced_offset: usize,
}

/// A distributed matrix over a finalized [`MatrixGraph`], generic in its
/// owned-row storage.
#[derive(Debug)]
pub struct MatrixImpl<C: Communicator, S: RowStorage> {
    graph: Arc<MatrixGraph<C>>,
    storage: S,
    overlap: OverlapBuffer,
    rhs_overlap: OverlapBuffer,
    rhs_corrections: BTreeMap<GlobalIndex, f64>,
    state: AssemblyState,
    options: AssemblyOptions,
    dims: Dims,
    cycles: usize,
    last_stats: (ReductionStats, ReductionStats),
    scratch: Vec<Triple>,
}

impl<C: Communicator, S: RowStorage> MatrixImpl<C, S> {
    pub fn new(graph: Arc<MatrixGraph<C>>, options: AssemblyOptions) -> Result<Self, AssemblyError> {
        let structure = graph.structure()?;
        let storage = S::build(
            structure,
            graph.row_space().numbering()?,
            graph.col_space().numbering()?,
        )?;
        let global_cols = if graph.is_square() {
            graph.global_num_solvable()?
        } else {
            graph.col_space().global_num_indices()?
        };
        let dims = Dims {
            owned: graph.row_space().owned_range()?,
            global_rows: graph.global_num_solvable()?,
            global_cols,
            local_rows: graph.num_solvable_owned()?,
            reduced_offset: graph.reduced_row_offset()?,
        };
        log::debug!(
            "matrix '{}' ({}) created: {} owned rows, {} stored entries",
            options.name,
            S::NAME,
            dims.owned.len(),
            storage.num_stored()
        );
        Ok(Self {
            graph,
            storage,
            overlap: OverlapBuffer::default(),
            rhs_overlap: OverlapBuffer::default(),
            rhs_corrections: BTreeMap::new(),
            state: AssemblyState::Open,
            options,
            dims,
            cycles: 0,
            last_stats: Default::default(),
            scratch: Vec::new(),
        })
    }

    pub fn graph(&self) -> &Arc<MatrixGraph<C>> {
        &self.graph
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn options(&self) -> &AssemblyOptions {
        &self.options
    }

    /// Substitute slaves, check every target position, then accumulate.
    /// Nothing is stored when any position is rejected.
    fn accumulate(&mut self, triples: &[Triple]) -> Result<(), AssemblyError> {
        let graph = Arc::clone(&self.graph);
        let elim = graph.elimination()?;
        let structure = graph.structure()?;
        let square = graph.is_square();

        let mut staged: Vec<Triple> = Vec::with_capacity(triples.len());
        let mut rhs: Vec<(GlobalIndex, f64)> = Vec::new();
        for &(r, c, v) in triples {
            elim.expand(r, |rr, wr| match elim.substitution(c).filter(|_| square) {
                Some(sub) => {
                    staged.extend(sub.terms.iter().map(|&(m, wc)| (rr, m, v * wr * wc)));
                    if sub.rhs != 0.0 {
                        rhs.push((rr, -v * wr * sub.rhs));
                    }
                }
                None => staged.push((rr, c, v * wr)),
            });
        }

        for &(r, c, _) in &staged {
            if self.dims.owned.contains(&r) {
                if !self.storage.contains(r, c) {
                    return Err(AssemblyError::IndexNotInGraph { row: r, col: c });
                }
            } else {
                structure.check(r, c)?;
            }
        }
        for &(r, _) in &rhs {
            if !self.dims.owned.contains(&r) {
                graph.row_space().owner_of(r)?;
            }
        }

        for (r, c, v) in staged {
            if self.dims.owned.contains(&r) {
                self.storage.add(r, c, v)?;
            } else {
                self.overlap.add(r, c, v);
            }
        }
        for (r, v) in rhs {
            if self.dims.owned.contains(&r) {
                *self.rhs_corrections.entry(r).or_default() += v;
            } else {
                self.rhs_overlap.add(r, 0, v);
            }
        }
        self.state = AssemblyState::Open;
        Ok(())
    }

    fn dump_path(&self) -> PathBuf {
        let dir = self.options.debug_output.clone().unwrap_or_default();
        let name = if self.options.name.is_empty() {
            "matrix"
        } else {
            &self.options.name
        };
        dir.join(format!("{name}_{}.mtx", self.cycles))
    }

    fn require_owned(&self, row: GlobalIndex) -> Result<(), AssemblyError> {
        if self.dims.owned.contains(&row) {
            Ok(())
        } else {
            Err(AssemblyError::IndexNotOwned(row))
        }
    }
}

impl<C: Communicator, S: RowStorage> Matrix for MatrixImpl<C, S> {
    fn type_name(&self) -> &'static str {
        S::NAME
    }

    fn state(&self) -> AssemblyState {
        self.state
    }

    fn sum_in_element(
        &mut self,
        block: i32,
        element: i64,
        coefs: &[f64],
        format: CoefFormat,
    ) -> Result<(), AssemblyError> {
        let graph = Arc::clone(&self.graph);
        let rows = graph.connectivity_indices(block, element)?;
        let cols = graph.connectivity_col_indices(block, element)?;
        let segments = match format {
            CoefFormat::BlockDiagonalRow if graph.block(block)?.is_rectangular() => {
                return Err(AssemblyError::UnsupportedFormat(format!(
                    "block-diagonal coefficients on rectangular block {block}"
                )));
            }
            CoefFormat::BlockDiagonalRow => Some(graph.block_segments(block)?),
            _ => None,
        };
        let mut triples = std::mem::take(&mut self.scratch);
        triples.clear();
        let result = expand(format, rows, cols, segments.as_deref(), coefs, &mut triples)
            .and_then(|()| self.accumulate(&triples));
        self.scratch = triples;
        result
    }

    fn sum_in(
        &mut self,
        rows: &[GlobalIndex],
        cols: &[GlobalIndex],
        coefs: &[f64],
        format: CoefFormat,
    ) -> Result<(), AssemblyError> {
        let mut triples = std::mem::take(&mut self.scratch);
        triples.clear();
        let result = expand(format, rows, cols, None, coefs, &mut triples)
            .and_then(|()| self.accumulate(&triples));
        self.scratch = triples;
        result
    }

    fn gather_from_overlap(&mut self) -> Result<(), AssemblyError> {
        self.state = AssemblyState::Assembling;
        let graph = Arc::clone(&self.graph);
        let comm = graph.comm();
        if comm.is_no_comm() || comm.size() <= 1 {
            self.state = AssemblyState::Assembled;
            return Ok(());
        }
        let row_space = graph.row_space();
        let storage = &mut self.storage;
        let coefs = reduce_to_owners(
            &**comm,
            TAGS_COEFS,
            &mut self.overlap,
            |r| row_space.owner_of(r),
            |r, c, v| storage.add(r, c, v),
        );
        let coefs = match coefs {
            Ok(s) => s,
            Err(e) => {
                self.state = AssemblyState::Open;
                return Err(e);
            }
        };
        let corrections = &mut self.rhs_corrections;
        let owned = self.dims.owned.clone();
        let rhs = reduce_to_owners(
            &**comm,
            TAGS_RHS,
            &mut self.rhs_overlap,
            |r| row_space.owner_of(r),
            |r, _, v| {
                if !owned.contains(&r) {
                    return Err(AssemblyError::IndexNotOwned(r));
                }
                *corrections.entry(r).or_default() += v;
                Ok(())
            },
        );
        match rhs {
            Ok(s) => {
                self.last_stats = (coefs, s);
                self.state = AssemblyState::Assembled;
                Ok(())
            }
            Err(e) => {
                self.state = AssemblyState::Open;
                Err(e)
            }
        }
    }

    fn global_assemble(&mut self) -> Result<(), AssemblyError> {
        self.gather_from_overlap()?;
        self.cycles += 1;
        let comm = self.graph.comm();
        if self.options.output_level >= OutputLevel::Stats {
            let (coefs, rhs) = self.last_stats;
            log::info!(
                "matrix '{}' cycle {} on rank {}/{}: {} local rows, {} stored, sent {} / received {} overlap coefs, {} / {} rhs terms",
                self.options.name,
                self.cycles,
                comm.rank(),
                comm.size(),
                self.dims.local_rows,
                self.storage.num_stored(),
                coefs.sent,
                coefs.received,
                rhs.sent,
                rhs.received
            );
        }
        if self.options.output_level >= OutputLevel::MatrixFiles {
            self.write_to_file(&self.dump_path())?;
        }
        log::debug!(
            "matrix '{}' assembly cycle {} finished on rank {}",
            self.options.name,
            self.cycles,
            comm.rank()
        );
        Ok(())
    }

    fn row_length(&self, row: GlobalIndex) -> Result<usize, AssemblyError> {
        self.require_owned(row)?;
        self.storage
            .row_length(row)
            .ok_or(AssemblyError::IndexNotOwned(row))
    }

    fn copy_out_row(&self, row: GlobalIndex) -> Result<(Vec<GlobalIndex>, Vec<f64>), AssemblyError> {
        self.require_owned(row)?;
        self.storage
            .copy_out_row(row)
            .ok_or(AssemblyError::IndexNotOwned(row))
    }

    fn put_scalar(&mut self, value: f64) {
        self.storage.fill(value);
        self.overlap.clear();
        self.rhs_overlap.clear();
        self.rhs_corrections.clear();
        self.state = AssemblyState::Reset;
    }

    fn write_to_file(&self, path: &Path) -> Result<(), AssemblyError> {
        let comm = self.graph.comm();
        let path = if comm.size() > 1 {
            PathBuf::from(format!("{}.{}.{}", path.display(), comm.size(), comm.rank()))
        } else {
            path.to_path_buf()
        };
        let mut entries = Vec::new();
        for row in self.dims.owned.clone() {
            let Some(rr) = self.reduced_row(row) else {
                continue;
            };
            let (cols, vals) = self.copy_out_row(row)?;
            for (c, v) in cols.into_iter().zip(vals) {
                if let Some(cc) = self.reduced_col(c) {
                    entries.push((rr, cc, v));
                }
            }
        }
        matrix_market::write_file(&path, self.dims.global_rows, self.dims.global_cols, &entries)?;
        log::debug!("wrote {} entries to {}", entries.len(), path.display());
        Ok(())
    }

    fn global_num_rows(&self) -> usize {
        self.dims.global_rows
    }

    fn global_num_cols(&self) -> usize {
        self.dims.global_cols
    }

    fn local_num_rows(&self) -> usize {
        self.dims.local_rows
    }

    fn owned_rows(&self) -> Range<GlobalIndex> {
        self.dims.owned.clone()
    }

    fn reduced_row(&self, row: GlobalIndex) -> Option<usize> {
        self.graph.elimination().ok()?.reduced_index(row)
    }

    fn reduced_col(&self, col: GlobalIndex) -> Option<usize> {
        if self.graph.is_square() {
            self.graph.elimination().ok()?.reduced_index(col)
        } else {
            Some(col)
        }
    }

    fn reduced_row_offset(&self) -> usize {
        self.dims.reduced_offset
    }

    fn rhs_corrections(&self) -> &BTreeMap<GlobalIndex, f64> {
        &self.rhs_corrections
    }
}

/// Build a matrix over `graph`, choosing the storage backend from
/// `params` (`BLOCK_MATRIX`).
pub fn create_matrix<C: Communicator + 'static>(
    graph: Arc<MatrixGraph<C>>,
    params: &ParameterSet,
) -> Result<Box<dyn Matrix>, AssemblyError> {
    let options = AssemblyOptions::from_params(params)?;
    if options.block_matrix {
        Ok(Box::new(MatrixImpl::<C, BlockRows>::new(graph, options)?))
    } else {
        Ok(Box::new(MatrixImpl::<C, ScalarRows>::new(graph, options)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::space::{FieldId, IdType, IndexSpace};

    const NODE: IdType = IdType(0);
    const U: FieldId = FieldId(0);

    /// Three nodes, two line elements, one scalar field.
    fn chain_graph(slave: bool, rhs: f64) -> Arc<MatrixGraph<NoComm>> {
        let mut s = IndexSpace::new(NoComm, "rows");
        s.define_fields(&[U], &[1]).unwrap();
        s.define_id_types(&[NODE]).unwrap();
        let mut g = MatrixGraph::new(s, None);
        g.define_pattern(0, 2, NODE, U).unwrap();
        g.init_connectivity_block(0, 2, 0).unwrap();
        g.init_connectivity(0, 0, &[0, 1]).unwrap();
        g.init_connectivity(0, 1, &[1, 2]).unwrap();
        if slave {
            g.init_slave_constraint(2, &[NODE, NODE], &[1, 2], &[U, U], 1, 0, &[2.0, -1.0], rhs)
                .unwrap();
        }
        g.init_complete().unwrap();
        Arc::new(g)
    }

    fn scalar(graph: Arc<MatrixGraph<NoComm>>) -> MatrixImpl<NoComm, ScalarRows> {
        MatrixImpl::new(graph, AssemblyOptions::default()).unwrap()
    }

    #[test]
    fn element_sum_in_accumulates() {
        let mut m = scalar(chain_graph(false, 0.0));
        let k = [1.0, -1.0, -1.0, 1.0];
        m.sum_in_element(0, 0, &k, CoefFormat::DenseRow).unwrap();
        m.sum_in_element(0, 1, &k, CoefFormat::DenseRow).unwrap();
        m.global_assemble().unwrap();
        assert_eq!(m.state(), AssemblyState::Assembled);
        assert_eq!(m.copy_out_row(1).unwrap(), (vec![0, 1, 2], vec![-1.0, 2.0, -1.0]));
        m.sum_in(&[0], &[0], &[0.5], CoefFormat::DenseRow).unwrap();
        assert_eq!(m.state(), AssemblyState::Open);
        assert_eq!(m.copy_out_row(0).unwrap().1, vec![1.5, -1.0]);
    }

    #[test]
    fn rejected_positions_leave_values_untouched() {
        let mut m = scalar(chain_graph(false, 0.0));
        let err = m
            .sum_in(&[0], &[0, 2], &[1.0, 1.0], CoefFormat::DenseRow)
            .unwrap_err();
        assert_eq!(err, AssemblyError::IndexNotInGraph { row: 0, col: 2 });
        assert_eq!(m.copy_out_row(0).unwrap().1, vec![0.0, 0.0]);
        assert!(matches!(
            m.row_length(3),
            Err(AssemblyError::IndexNotOwned(3))
        ));
    }

    #[test]
    fn slave_row_and_column_redistribute() {
        // node 2 = 2 * node 1 + rhs
        let mut m = scalar(chain_graph(true, 0.5));
        assert_eq!(m.local_num_rows(), 2);
        assert_eq!(m.global_num_rows(), 2);
        m.sum_in(&[2], &[2], &[1.0], CoefFormat::DenseRow).unwrap();
        // a(2,2) -> a(1,1) scaled by 2 * 2, rhs correction -1 * 2 * 0.5
        assert_eq!(m.copy_out_row(1).unwrap(), (vec![0, 1], vec![0.0, 4.0]));
        assert_eq!(m.rhs_corrections().get(&1), Some(&-1.0));
        assert_eq!(m.row_length(2).unwrap(), 0);
    }

    #[test]
    fn put_scalar_keeps_structure() {
        let mut m = scalar(chain_graph(false, 0.0));
        m.sum_in(&[1], &[0, 1, 2], &[1.0, 2.0, 3.0], CoefFormat::DenseRow)
            .unwrap();
        m.put_scalar(0.0);
        assert_eq!(m.state(), AssemblyState::Reset);
        assert_eq!(m.row_length(1).unwrap(), 3);
        assert_eq!(m.copy_out_row(1).unwrap().1, vec![0.0; 3]);
    }

    #[test]
    fn factory_selects_backend() {
        let g = chain_graph(false, 0.0);
        let scalar = create_matrix(Arc::clone(&g), &ParameterSet::new()).unwrap();
        assert_eq!(scalar.type_name(), "ScalarRows");
        let block = create_matrix(g, &ParameterSet::parse_strings(&["BLOCK_MATRIX true"])).unwrap();
        assert_eq!(block.type_name(), "BlockRows");
    }
}
