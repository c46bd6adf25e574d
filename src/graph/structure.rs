//! Finalized sparsity of a matrix graph.
//!
//! Owned rows hold the union of every rank's column indices for that row.
//! Rows owned elsewhere but touched by local connectivity are kept as
//! well ("shared" rows), so that a contribution into overlap can be checked
//! at the call that makes it.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::assembly_error::AssemblyError;
use crate::debug_invariants::{DebugInvariants, ensure};
use crate::space::GlobalIndex;

#[derive(Clone, Debug, Default)]
pub struct RowStructure {
    owned: Range<GlobalIndex>,
    row_ptr: Vec<usize>,
    cols: Vec<GlobalIndex>,
    shared: BTreeMap<GlobalIndex, Vec<GlobalIndex>>,
}

impl RowStructure {
    /// Build from per-row column sets. `rows` may contain rows outside
    /// `owned`; those become shared rows.
    pub fn from_rows(
        owned: Range<GlobalIndex>,
        rows: BTreeMap<GlobalIndex, BTreeSet<GlobalIndex>>,
    ) -> Self {
        let mut row_ptr = Vec::with_capacity(owned.len() + 1);
        let mut cols = Vec::new();
        let mut shared = BTreeMap::new();
        let mut it = rows.into_iter().peekable();
        row_ptr.push(0);
        for r in owned.clone() {
            while let Some((row, set)) = it.next_if(|(row, _)| *row < r) {
                shared.insert(row, set.into_iter().collect());
            }
            if let Some((_, set)) = it.next_if(|(row, _)| *row == r) {
                cols.extend(set);
            }
            row_ptr.push(cols.len());
        }
        for (row, set) in it {
            shared.insert(row, set.into_iter().collect());
        }
        let s = Self {
            owned,
            row_ptr,
            cols,
            shared,
        };
        s.debug_assert_invariants();
        s
    }

    pub fn owned_rows(&self) -> Range<GlobalIndex> {
        self.owned.clone()
    }

    /// Sorted column indices of an owned or shared row.
    pub fn row(&self, row: GlobalIndex) -> Option<&[GlobalIndex]> {
        if self.owned.contains(&row) {
            let i = row - self.owned.start;
            Some(&self.cols[self.row_ptr[i]..self.row_ptr[i + 1]])
        } else {
            self.shared.get(&row).map(Vec::as_slice)
        }
    }

    pub fn contains(&self, row: GlobalIndex, col: GlobalIndex) -> bool {
        self.row(row)
            .is_some_and(|cols| cols.binary_search(&col).is_ok())
    }

    /// Fail with `IndexNotInGraph` unless `(row, col)` is structural.
    pub fn check(&self, row: GlobalIndex, col: GlobalIndex) -> Result<(), AssemblyError> {
        if self.contains(row, col) {
            Ok(())
        } else {
            Err(AssemblyError::IndexNotInGraph { row, col })
        }
    }

    /// Structural entries over all owned rows.
    pub fn num_nonzeros_owned(&self) -> usize {
        self.cols.len()
    }

    /// CSR row pointer of the owned rows (relative to the first owned row).
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// Column indices of the owned rows, concatenated.
    pub fn col_indices(&self) -> &[GlobalIndex] {
        &self.cols
    }

    pub fn shared_rows(&self) -> impl Iterator<Item = (GlobalIndex, &[GlobalIndex])> {
        self.shared.iter().map(|(&r, c)| (r, c.as_slice()))
    }
}

impl DebugInvariants for RowStructure {
    fn validate_invariants(&self) -> Result<(), AssemblyError> {
        ensure(self.row_ptr.len() == self.owned.len() + 1, || {
            format!(
                "row_ptr has {} entries for {} owned rows",
                self.row_ptr.len(),
                self.owned.len()
            )
        })?;
        for i in 0..self.owned.len() {
            let row = &self.cols[self.row_ptr[i]..self.row_ptr[i + 1]];
            ensure(row.windows(2).all(|w| w[0] < w[1]), || {
                format!("row {} columns not strictly ascending", self.owned.start + i)
            })?;
        }
        ensure(self.shared.keys().all(|r| !self.owned.contains(r)), || {
            "a shared row lies in the owned range".into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(pairs: &[(usize, usize)]) -> BTreeMap<usize, BTreeSet<usize>> {
        let mut m: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for &(r, c) in pairs {
            m.entry(r).or_default().insert(c);
        }
        m
    }

    #[test]
    fn owned_and_shared_rows_split() {
        let s = RowStructure::from_rows(2..4, rows(&[(0, 1), (2, 3), (2, 0), (3, 3), (6, 2)]));
        assert_eq!(s.row(2), Some(&[0, 3][..]));
        assert_eq!(s.row(3), Some(&[3][..]));
        assert_eq!(s.row(0), Some(&[1][..]));
        assert_eq!(s.row(6), Some(&[2][..]));
        assert_eq!(s.row(5), None);
        assert_eq!(s.num_nonzeros_owned(), 3);
        assert!(s.contains(6, 2));
        assert_eq!(
            s.check(2, 1),
            Err(AssemblyError::IndexNotInGraph { row: 2, col: 1 })
        );
        s.validate_invariants().unwrap();
    }

    #[test]
    fn empty_owned_rows_have_zero_length() {
        let s = RowStructure::from_rows(0..3, rows(&[(1, 1)]));
        assert_eq!(s.row(0), Some(&[][..]));
        assert_eq!(s.row_ptr(), &[0, 0, 1, 1]);
    }
}
