//! Owned-row storage backends behind the matrix interface.
//!
//! * [`ScalarRows`]: one sorted column list and value list per scalar row
//!   (CSR over the owned rows).
//! * [`BlockRows`]: dense entity-block × entity-block tiles. Every row of an
//!   entity shares one column-block list, so a tile is stored whenever any
//!   of its positions is structural.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::assembly_error::AssemblyError;
use crate::graph::RowStructure;
use crate::space::{EntityBlock, GlobalIndex, Numbering};

/// Storage of the owned rows of an assembled matrix.
pub trait RowStorage: Debug + Sized {
    /// Backend name reported by [`Matrix::type_name`](super::Matrix::type_name).
    const NAME: &'static str;

    /// Allocate zeroed storage for every structural position of the owned
    /// rows. `rows`/`cols` are the numberings of the row and column spaces.
    fn build(
        structure: &RowStructure,
        rows: &Numbering,
        cols: &Numbering,
    ) -> Result<Self, AssemblyError>;

    fn contains(&self, row: GlobalIndex, col: GlobalIndex) -> bool;

    /// Accumulate into a stored position.
    fn add(&mut self, row: GlobalIndex, col: GlobalIndex, value: f64) -> Result<(), AssemblyError>;

    /// Number of stored positions in `row`, `None` when not owned.
    fn row_length(&self, row: GlobalIndex) -> Option<usize>;

    /// Column indices and values of `row`, ascending by column.
    fn copy_out_row(&self, row: GlobalIndex) -> Option<(Vec<GlobalIndex>, Vec<f64>)>;

    /// Set every stored value.
    fn fill(&mut self, value: f64);

    /// Total stored positions.
    fn num_stored(&self) -> usize;
}

/// CSR storage of the owned scalar rows.
#[derive(Clone, Debug)]
pub struct ScalarRows {
    first_row: GlobalIndex,
    row_ptr: Vec<usize>,
    cols: Vec<GlobalIndex>,
    values: Vec<f64>,
}

impl ScalarRows {
    fn span(&self, row: GlobalIndex) -> Option<std::ops::Range<usize>> {
        let i = row.checked_sub(self.first_row)?;
        (i + 1 < self.row_ptr.len()).then(|| self.row_ptr[i]..self.row_ptr[i + 1])
    }

    fn position(&self, row: GlobalIndex, col: GlobalIndex) -> Option<usize> {
        let span = self.span(row)?;
        let start = span.start;
        self.cols[span].binary_search(&col).ok().map(|p| start + p)
    }
}

impl RowStorage for ScalarRows {
    const NAME: &'static str = "ScalarRows";

    fn build(
        structure: &RowStructure,
        _rows: &Numbering,
        _cols: &Numbering,
    ) -> Result<Self, AssemblyError> {
        let cols = structure.col_indices().to_vec();
        Ok(Self {
            first_row: structure.owned_rows().start,
            row_ptr: structure.row_ptr().to_vec(),
            values: vec![0.0; cols.len()],
            cols,
        })
    }

    fn contains(&self, row: GlobalIndex, col: GlobalIndex) -> bool {
        self.position(row, col).is_some()
    }

    fn add(&mut self, row: GlobalIndex, col: GlobalIndex, value: f64) -> Result<(), AssemblyError> {
        let p = self
            .position(row, col)
            .ok_or(AssemblyError::IndexNotInGraph { row, col })?;
        self.values[p] += value;
        Ok(())
    }

    fn row_length(&self, row: GlobalIndex) -> Option<usize> {
        self.span(row).map(|s| s.len())
    }

    fn copy_out_row(&self, row: GlobalIndex) -> Option<(Vec<GlobalIndex>, Vec<f64>)> {
        let span = self.span(row)?;
        Some((self.cols[span.clone()].to_vec(), self.values[span].to_vec()))
    }

    fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }

    fn num_stored(&self) -> usize {
        self.values.len()
    }
}

/// One owned entity's rows: its column tiles and where their values live.
#[derive(Clone, Debug)]
struct BlockRow {
    block: EntityBlock,
    col_blocks: Vec<EntityBlock>,
    value_offsets: Vec<usize>,
}

impl BlockRow {
    fn tile(&self, col: GlobalIndex) -> Option<usize> {
        let k = self
            .col_blocks
            .partition_point(|b| b.start <= col)
            .checked_sub(1)?;
        self.col_blocks[k].contains(col).then_some(k)
    }
}

/// Dense entity-block tiles over the owned rows.
#[derive(Clone, Debug)]
pub struct BlockRows {
    first_row: GlobalIndex,
    rows: Vec<BlockRow>,
    row_to_block: Vec<usize>,
    values: Vec<f64>,
}

impl BlockRows {
    fn block_row(&self, row: GlobalIndex) -> Option<&BlockRow> {
        let i = row.checked_sub(self.first_row)?;
        self.row_to_block.get(i).map(|&b| &self.rows[b])
    }

    fn position(&self, row: GlobalIndex, col: GlobalIndex) -> Option<usize> {
        let br = self.block_row(row)?;
        let k = br.tile(col)?;
        let cb = br.col_blocks[k];
        Some(br.value_offsets[k] + (row - br.block.start) * cb.len + (col - cb.start))
    }

    /// Number of owned entity rows.
    pub fn num_block_rows(&self) -> usize {
        self.rows.len()
    }
}

impl RowStorage for BlockRows {
    const NAME: &'static str = "BlockRows";

    fn build(
        structure: &RowStructure,
        rows: &Numbering,
        cols: &Numbering,
    ) -> Result<Self, AssemblyError> {
        let owned = structure.owned_rows();
        let missing = |i: GlobalIndex| {
            AssemblyError::Initialization(format!("index {i} has no entity block"))
        };
        let mut block_rows = Vec::new();
        let mut row_to_block = Vec::with_capacity(owned.len());
        let mut values_len = 0;
        let mut r = owned.start;
        while r < owned.end {
            let block = rows.block_of(r).ok_or_else(|| missing(r))?;
            let mut tiles: BTreeMap<GlobalIndex, usize> = BTreeMap::new();
            for row in block.start..block.end() {
                for &c in structure.row(row).unwrap_or(&[]) {
                    let cb = cols.block_of(c).ok_or_else(|| missing(c))?;
                    tiles.insert(cb.start, cb.len);
                }
            }
            let mut col_blocks = Vec::with_capacity(tiles.len());
            let mut value_offsets = Vec::with_capacity(tiles.len());
            for (start, len) in tiles {
                col_blocks.push(EntityBlock { start, len });
                value_offsets.push(values_len);
                values_len += block.len * len;
            }
            row_to_block.extend(std::iter::repeat_n(block_rows.len(), block.len));
            block_rows.push(BlockRow {
                block,
                col_blocks,
                value_offsets,
            });
            r = block.end();
        }
        Ok(Self {
            first_row: owned.start,
            rows: block_rows,
            row_to_block,
            values: vec![0.0; values_len],
        })
    }

    fn contains(&self, row: GlobalIndex, col: GlobalIndex) -> bool {
        self.position(row, col).is_some()
    }

    fn add(&mut self, row: GlobalIndex, col: GlobalIndex, value: f64) -> Result<(), AssemblyError> {
        let p = self
            .position(row, col)
            .ok_or(AssemblyError::IndexNotInGraph { row, col })?;
        self.values[p] += value;
        Ok(())
    }

    fn row_length(&self, row: GlobalIndex) -> Option<usize> {
        self.block_row(row)
            .map(|br| br.col_blocks.iter().map(|b| b.len).sum())
    }

    fn copy_out_row(&self, row: GlobalIndex) -> Option<(Vec<GlobalIndex>, Vec<f64>)> {
        let br = self.block_row(row)?;
        let local = row - br.block.start;
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for (cb, &off) in br.col_blocks.iter().zip(&br.value_offsets) {
            let start = off + local * cb.len;
            cols.extend(cb.start..cb.end());
            vals.extend_from_slice(&self.values[start..start + cb.len]);
        }
        Some((cols, vals))
    }

    fn fill(&mut self, value: f64) {
        self.values.fill(value);
    }

    fn num_stored(&self) -> usize {
        self.values.len()
    }
}
