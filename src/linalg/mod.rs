//! Numeric objects built on a finalized graph: matrices, vectors, their
//! storage backends and the overlap reconciliation between ranks.

pub mod format;
pub mod handoff;
pub mod matrix;
pub mod matrix_market;
pub mod overlap;
pub mod storage;
pub mod vector;

pub use format::{CoefFormat, transpose_coefs};
pub use handoff::CsrRows;
pub use matrix::{AssemblyState, Matrix, MatrixImpl, create_matrix};
pub use matrix_market::{Triplets, read_matrix_market};
pub use overlap::OverlapBuffer;
pub use storage::{BlockRows, RowStorage, ScalarRows};
pub use vector::DistributedVector;
