//! Connectivity blocks: patterns bound to concrete elements.
//!
//! All elements of a block share the same row (and column) pattern, so the
//! per-element ID lists and, after finalization, the resolved index lists
//! are stored as flat arrays with a fixed stride.

use hashbrown::HashMap as FastMap;

use crate::assembly_error::AssemblyError;
use crate::space::GlobalIndex;

#[derive(Clone, Debug)]
pub struct ConnectivityBlock {
    id: i32,
    num_elements: usize,
    row_pattern: i32,
    col_pattern: Option<i32>,
    diagonal: bool,
    ids_per_row: usize,
    ids_per_col: usize,
    /// Element IDs in the order they were first supplied.
    elements: Vec<i64>,
    positions: FastMap<i64, usize>,
    row_ids: Vec<i64>,
    col_ids: Vec<i64>,
    resolved: Option<ResolvedIndices>,
}

#[derive(Clone, Debug)]
struct ResolvedIndices {
    row_stride: usize,
    col_stride: usize,
    rows: Vec<GlobalIndex>,
    cols: Vec<GlobalIndex>,
}

impl ConnectivityBlock {
    pub(crate) fn new(
        id: i32,
        num_elements: usize,
        row_pattern: (i32, usize),
        col_pattern: Option<(i32, usize)>,
        diagonal: bool,
    ) -> Self {
        Self {
            id,
            num_elements,
            row_pattern: row_pattern.0,
            col_pattern: col_pattern.map(|p| p.0),
            diagonal,
            ids_per_row: row_pattern.1,
            ids_per_col: col_pattern.map_or(0, |p| p.1),
            elements: Vec::with_capacity(num_elements),
            positions: FastMap::with_capacity(num_elements),
            row_ids: Vec::with_capacity(num_elements * row_pattern.1),
            col_ids: Vec::new(),
            resolved: None,
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn num_elements(&self) -> usize {
        self.num_elements
    }

    /// Elements that have received connectivity so far.
    pub fn num_supplied(&self) -> usize {
        self.elements.len()
    }

    pub fn row_pattern(&self) -> i32 {
        self.row_pattern
    }

    pub fn col_pattern(&self) -> Option<i32> {
        self.col_pattern
    }

    pub fn is_rectangular(&self) -> bool {
        self.col_pattern.is_some()
    }

    pub fn is_diagonal(&self) -> bool {
        self.diagonal
    }

    pub fn element_ids(&self) -> &[i64] {
        &self.elements
    }

    /// Store the ID lists of one element. Supplying an element again is a
    /// no-op when the IDs match and an error otherwise.
    pub(crate) fn set_element(
        &mut self,
        element: i64,
        rows: &[i64],
        cols: Option<&[i64]>,
    ) -> Result<(), AssemblyError> {
        let block = self.id;
        let invalid = |reason: String| AssemblyError::InvalidConnectivity { block, reason };
        if rows.len() != self.ids_per_row {
            return Err(invalid(format!(
                "element {element} supplies {} row IDs, pattern {} needs {}",
                rows.len(),
                self.row_pattern,
                self.ids_per_row
            )));
        }
        match (cols, self.col_pattern) {
            (Some(c), Some(p)) if c.len() != self.ids_per_col => {
                return Err(invalid(format!(
                    "element {element} supplies {} column IDs, pattern {p} needs {}",
                    c.len(),
                    self.ids_per_col
                )));
            }
            (None, Some(_)) => {
                return Err(invalid(format!(
                    "element {element} of a rectangular block needs column IDs"
                )));
            }
            (Some(_), None) => {
                return Err(invalid(format!(
                    "element {element} supplies column IDs to a square block"
                )));
            }
            _ => {}
        }

        match self.positions.get(&element) {
            Some(&pos) => {
                let (old_rows, old_cols) = self.ids_at(pos);
                if old_rows != rows || old_cols != cols {
                    return Err(invalid(format!(
                        "element {element} already has different connectivity"
                    )));
                }
            }
            None => {
                if self.elements.len() == self.num_elements {
                    return Err(invalid(format!(
                        "element {element} exceeds the declared {} elements",
                        self.num_elements
                    )));
                }
                self.positions.insert(element, self.elements.len());
                self.elements.push(element);
                self.row_ids.extend_from_slice(rows);
                if let Some(c) = cols {
                    self.col_ids.extend_from_slice(c);
                }
            }
        }
        Ok(())
    }

    /// Row and column ID lists of the element at `pos`.
    pub(crate) fn ids_at(&self, pos: usize) -> (&[i64], Option<&[i64]>) {
        let rows = &self.row_ids[pos * self.ids_per_row..(pos + 1) * self.ids_per_row];
        let cols = self
            .col_pattern
            .map(|_| &self.col_ids[pos * self.ids_per_col..(pos + 1) * self.ids_per_col]);
        (rows, cols)
    }

    pub(crate) fn set_resolved(
        &mut self,
        row_stride: usize,
        col_stride: usize,
        rows: Vec<GlobalIndex>,
        cols: Vec<GlobalIndex>,
    ) {
        self.resolved = Some(ResolvedIndices {
            row_stride,
            col_stride,
            rows,
            cols,
        });
    }

    fn resolved(&self) -> Result<&ResolvedIndices, AssemblyError> {
        self.resolved.as_ref().ok_or_else(|| {
            AssemblyError::Initialization(format!("block {} is not finalized", self.id))
        })
    }

    fn position(&self, element: i64) -> Result<usize, AssemblyError> {
        self.positions
            .get(&element)
            .copied()
            .ok_or(AssemblyError::UnknownElement {
                block: self.id,
                element,
            })
    }

    /// Resolved row indices of one element, in pattern order.
    pub fn row_indices(&self, element: i64) -> Result<&[GlobalIndex], AssemblyError> {
        let pos = self.position(element)?;
        let r = self.resolved()?;
        Ok(&r.rows[pos * r.row_stride..(pos + 1) * r.row_stride])
    }

    /// Resolved column indices of one element; the row indices for square
    /// blocks.
    pub fn col_indices(&self, element: i64) -> Result<&[GlobalIndex], AssemblyError> {
        if self.col_pattern.is_none() {
            return self.row_indices(element);
        }
        let pos = self.position(element)?;
        let r = self.resolved()?;
        Ok(&r.cols[pos * r.col_stride..(pos + 1) * r.col_stride])
    }

    /// Per-element `(rows, cols)` index lists in supply order.
    pub(crate) fn resolved_elements(
        &self,
    ) -> Result<impl Iterator<Item = (&[GlobalIndex], &[GlobalIndex])>, AssemblyError> {
        let r = self.resolved()?;
        let square = self.col_pattern.is_none();
        Ok((0..self.elements.len()).map(move |pos| {
            let rows = &r.rows[pos * r.row_stride..(pos + 1) * r.row_stride];
            let cols = if square {
                rows
            } else {
                &r.cols[pos * r.col_stride..(pos + 1) * r.col_stride]
            };
            (rows, cols)
        }))
    }
}
