//! Patterns, connectivity blocks, slave constraints, and the finalized
//! matrix graph built from them.

pub mod connectivity;
pub mod constraint;
pub mod matrix_graph;
pub mod pattern;
pub mod structure;

pub use connectivity::ConnectivityBlock;
pub use constraint::{ConstraintEntry, ConstraintSet, Elimination, SlaveConstraint, Substitution};
pub use matrix_graph::MatrixGraph;
pub use pattern::{Pattern, PatternSlot};
pub use structure::RowStructure;
