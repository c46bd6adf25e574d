//! Solver handoff: the owned rows of an assembled matrix as CSR in reduced
//! (slave-free) numbering.

use crate::assembly_error::AssemblyError;
use crate::linalg::matrix::{AssemblyState, Matrix};

/// Owned solvable rows of an assembled matrix.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CsrRows {
    /// Reduced index of the first local row.
    pub row_offset: usize,
    pub global_rows: usize,
    pub global_cols: usize,
    pub row_ptr: Vec<usize>,
    pub cols: Vec<usize>,
    pub values: Vec<f64>,
}

impl CsrRows {
    /// Requires the matrix to be [`AssemblyState::Assembled`].
    pub fn from_matrix(matrix: &dyn Matrix) -> Result<Self, AssemblyError> {
        if matrix.state() != AssemblyState::Assembled {
            return Err(AssemblyError::Initialization(format!(
                "solver handoff needs an assembled matrix, state is {:?}",
                matrix.state()
            )));
        }
        let mut out = CsrRows {
            row_offset: matrix.reduced_row_offset(),
            global_rows: matrix.global_num_rows(),
            global_cols: matrix.global_num_cols(),
            row_ptr: Vec::with_capacity(matrix.local_num_rows() + 1),
            ..Default::default()
        };
        out.row_ptr.push(0);
        for row in matrix.owned_rows() {
            if matrix.reduced_row(row).is_none() {
                continue;
            }
            let (cols, vals) = matrix.copy_out_row(row)?;
            for (c, v) in cols.into_iter().zip(vals) {
                if let Some(rc) = matrix.reduced_col(c) {
                    out.cols.push(rc);
                    out.values.push(v);
                }
            }
            out.row_ptr.push(out.cols.len());
        }
        Ok(out)
    }

    pub fn num_rows(&self) -> usize {
        self.row_ptr.len().saturating_sub(1)
    }

    /// Reduced columns and values of local row `i`.
    pub fn row(&self, i: usize) -> Option<(&[usize], &[f64])> {
        let span = *self.row_ptr.get(i)?..*self.row_ptr.get(i + 1)?;
        Some((&self.cols[span.clone()], &self.values[span]))
    }
}
