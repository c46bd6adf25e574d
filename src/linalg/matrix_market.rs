//! Sparse triplet text format.
//!
//! ```text
//! %%MatrixMarket matrix coordinate real general
//! <nrows> <ncols> <nnz>
//! <row> <col> <value>      (1-based, one entry per line)
//! ```
//!
//! The reader also accepts bare triplet listings without the banner and
//! size line; the dimensions are then inferred from the largest indices.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::assembly_error::AssemblyError;

const BANNER: &str = "%%MatrixMarket matrix coordinate real general";

/// A matrix read back from text, with 0-based indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Triplets {
    pub nrows: usize,
    pub ncols: usize,
    pub entries: Vec<(usize, usize, f64)>,
}

impl Triplets {
    /// Entries sorted by `(row, col)` with duplicates summed.
    pub fn canonical(&self) -> Vec<(usize, usize, f64)> {
        let mut out: Vec<(usize, usize, f64)> = Vec::with_capacity(self.entries.len());
        let mut sorted = self.entries.clone();
        sorted.sort_by_key(|&(r, c, _)| (r, c));
        for (r, c, v) in sorted {
            match out.last_mut() {
                Some(last) if (last.0, last.1) == (r, c) => last.2 += v,
                _ => out.push((r, c, v)),
            }
        }
        out
    }
}

/// Write 0-based `entries` as 1-based triplets under a size header.
pub fn write_triplets<W: Write>(
    mut writer: W,
    nrows: usize,
    ncols: usize,
    entries: &[(usize, usize, f64)],
) -> Result<(), AssemblyError> {
    writeln!(writer, "{BANNER}")?;
    writeln!(writer, "{nrows} {ncols} {}", entries.len())?;
    for &(r, c, v) in entries {
        writeln!(writer, "{} {} {v:e}", r + 1, c + 1)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_file(
    path: &Path,
    nrows: usize,
    ncols: usize,
    entries: &[(usize, usize, f64)],
) -> Result<(), AssemblyError> {
    let file = File::create(path)?;
    write_triplets(BufWriter::new(file), nrows, ncols, entries)
}

fn parse_err(line_no: usize, what: &str) -> AssemblyError {
    AssemblyError::Io(format!("matrix file line {line_no}: {what}"))
}

fn parse_index(tok: Option<&str>, line_no: usize) -> Result<usize, AssemblyError> {
    let tok = tok.ok_or_else(|| parse_err(line_no, "missing index"))?;
    tok.parse::<usize>()
        .map_err(|_| parse_err(line_no, &format!("invalid index '{tok}'")))
}

/// Parse the triplet format back into 0-based entries.
pub fn read_matrix_market<R: Read>(mut reader: R) -> Result<Triplets, AssemblyError> {
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let mut out = Triplets::default();
    let mut expected_nnz = None;
    let mut pending = None;
    if let Some((line_no, first)) = lines.next() {
        if first.starts_with("%%MatrixMarket") {
            let (size_no, size) = lines
                .by_ref()
                .find(|(_, l)| !l.starts_with('%'))
                .ok_or_else(|| parse_err(line_no, "missing size line"))?;
            let mut toks = size.split_whitespace();
            out.nrows = parse_index(toks.next(), size_no)?;
            out.ncols = parse_index(toks.next(), size_no)?;
            expected_nnz = Some(parse_index(toks.next(), size_no)?);
        } else if !first.starts_with('%') {
            pending = Some((line_no, first));
        }
    }

    let infer = expected_nnz.is_none();
    for (line_no, line) in pending.into_iter().chain(lines) {
        if line.starts_with('%') {
            continue;
        }
        let mut toks = line.split_whitespace();
        let r = parse_index(toks.next(), line_no)?;
        let c = parse_index(toks.next(), line_no)?;
        let v_tok = toks
            .next()
            .ok_or_else(|| parse_err(line_no, "missing value"))?;
        let v = v_tok
            .parse::<f64>()
            .map_err(|_| parse_err(line_no, &format!("invalid value '{v_tok}'")))?;
        if r == 0 || c == 0 {
            return Err(parse_err(line_no, "indices are 1-based"));
        }
        if infer {
            out.nrows = out.nrows.max(r);
            out.ncols = out.ncols.max(c);
        } else if r > out.nrows || c > out.ncols {
            return Err(parse_err(line_no, "entry outside the declared size"));
        }
        out.entries.push((r - 1, c - 1, v));
    }

    if let Some(n) = expected_nnz {
        if n != out.entries.len() {
            return Err(AssemblyError::Io(format!(
                "matrix file declares {n} entries but lists {}",
                out.entries.len()
            )));
        }
    }
    Ok(out)
}

pub fn read_file(path: &Path) -> Result<Triplets, AssemblyError> {
    read_matrix_market(File::open(path)?)
}
