//! Interpretation of dense element coefficient buffers.

use serde::{Deserialize, Serialize};

use crate::assembly_error::AssemblyError;
use crate::space::GlobalIndex;

/// Layout of the coefficient buffer passed to a sum-in.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoefFormat {
    /// `nrows × ncols`, row-major.
    #[default]
    DenseRow,
    /// `nrows × ncols`, column-major: the transpose-formatted sum-in.
    DenseCol,
    /// One value per index, placed on the diagonal.
    Diagonal,
    /// One `k × k` row-major block per `(slot, field)` segment of the row
    /// pattern, concatenated.
    BlockDiagonalRow,
}

/// A single `(row, col, value)` contribution.
pub type Triple = (GlobalIndex, GlobalIndex, f64);

fn expect_len(expected: usize, got: usize) -> Result<(), AssemblyError> {
    if expected == got {
        Ok(())
    } else {
        Err(AssemblyError::DimensionMismatch { expected, got })
    }
}

/// Expand `coefs` into triples addressed by `rows` and `cols`.
///
/// `segments` carries the per-segment sizes required by
/// [`CoefFormat::BlockDiagonalRow`]; callers without a pattern pass `None`.
pub fn expand(
    format: CoefFormat,
    rows: &[GlobalIndex],
    cols: &[GlobalIndex],
    segments: Option<&[usize]>,
    coefs: &[f64],
    out: &mut Vec<Triple>,
) -> Result<(), AssemblyError> {
    let (nr, nc) = (rows.len(), cols.len());
    match format {
        CoefFormat::DenseRow => {
            expect_len(nr * nc, coefs.len())?;
            for (i, &r) in rows.iter().enumerate() {
                let row = &coefs[i * nc..(i + 1) * nc];
                out.extend(cols.iter().zip(row).map(|(&c, &v)| (r, c, v)));
            }
        }
        CoefFormat::DenseCol => {
            expect_len(nr * nc, coefs.len())?;
            for (j, &c) in cols.iter().enumerate() {
                let col = &coefs[j * nr..(j + 1) * nr];
                out.extend(rows.iter().zip(col).map(|(&r, &v)| (r, c, v)));
            }
        }
        CoefFormat::Diagonal => {
            if nr != nc {
                return Err(AssemblyError::UnsupportedFormat(format!(
                    "diagonal coefficients need a square block, got {nr}x{nc}"
                )));
            }
            expect_len(nr, coefs.len())?;
            out.extend(
                rows.iter()
                    .zip(cols)
                    .zip(coefs)
                    .map(|((&r, &c), &v)| (r, c, v)),
            );
        }
        CoefFormat::BlockDiagonalRow => {
            let segments = segments.ok_or_else(|| {
                AssemblyError::UnsupportedFormat(
                    "block-diagonal coefficients need a connectivity block".into(),
                )
            })?;
            if nr != nc {
                return Err(AssemblyError::UnsupportedFormat(format!(
                    "block-diagonal coefficients need a square block, got {nr}x{nc}"
                )));
            }
            expect_len(nr, segments.iter().sum())?;
            expect_len(segments.iter().map(|k| k * k).sum(), coefs.len())?;
            let (mut o, mut v) = (0, 0);
            for &k in segments {
                for a in 0..k {
                    for b in 0..k {
                        out.push((rows[o + a], cols[o + b], coefs[v]));
                        v += 1;
                    }
                }
                o += k;
            }
        }
    }
    Ok(())
}

/// Transpose a row-major `nrows × ncols` buffer into row-major
/// `ncols × nrows`.
pub fn transpose_coefs(nrows: usize, ncols: usize, coefs: &[f64]) -> Result<Vec<f64>, AssemblyError> {
    expect_len(nrows * ncols, coefs.len())?;
    let mut out = vec![0.0; coefs.len()];
    for i in 0..nrows {
        for j in 0..ncols {
            out[j * nrows + i] = coefs[i * ncols + j];
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_and_col_major_agree_up_to_transpose() {
        let rows = [10, 11];
        let cols = [20, 21, 22];
        let d = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut a = Vec::new();
        expand(CoefFormat::DenseRow, &rows, &cols, None, &d, &mut a).unwrap();
        let t = transpose_coefs(2, 3, &d).unwrap();
        let mut b = Vec::new();
        expand(CoefFormat::DenseCol, &rows, &cols, None, &t, &mut b).unwrap();
        a.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
        b.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
        assert_eq!(a, b);
        assert!(a.contains(&(11, 22, 1.0)));
    }

    #[test]
    fn block_diagonal_row_places_segment_blocks() {
        let idx = [0, 1, 2, 3];
        let coefs = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let mut out = Vec::new();
        expand(
            CoefFormat::BlockDiagonalRow,
            &idx,
            &idx,
            Some(&[2, 2]),
            &coefs,
            &mut out,
        )
        .unwrap();
        assert_eq!(
            out,
            vec![
                (0, 0, 1.0),
                (0, 1, 2.0),
                (1, 0, 3.0),
                (1, 1, 4.0),
                (2, 2, 5.0),
                (2, 3, 6.0),
                (3, 2, 7.0),
                (3, 3, 8.0)
            ]
        );
    }

    #[test]
    fn bad_lengths_and_unsupported_layouts() {
        let mut out = Vec::new();
        assert_eq!(
            expand(CoefFormat::DenseRow, &[0, 1], &[0], None, &[1.0], &mut out),
            Err(AssemblyError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        );
        assert!(matches!(
            expand(CoefFormat::BlockDiagonalRow, &[0], &[0], None, &[1.0], &mut out),
            Err(AssemblyError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            expand(CoefFormat::Diagonal, &[0, 1], &[0], None, &[1.0, 1.0], &mut out),
            Err(AssemblyError::UnsupportedFormat(_))
        ));
    }
}
