//! AssemblyError: unified error type for the public APIs of this crate.
//!
//! Errors fall into the lifecycle taxonomy (configuration, initialization,
//! connectivity, graph completeness, constraint cycles, collective failure)
//! plus the lookup and shape errors raised by individual calls. Locally
//! detectable errors are returned by the call that triggers them and leave
//! already-committed state untouched.

use thiserror::Error;

use crate::space::field::GlobalIndex;

/// Unified error type for assembly operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// Invalid or missing field / id-type registration, or a bad option value.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Lifecycle violation: finalizing twice, or using an object before setup.
    #[error("initialization error: {0}")]
    Initialization(String),
    /// Connectivity supplied for an undefined block, with the wrong ID count,
    /// or after the graph was finalized.
    #[error("invalid connectivity for block {block}: {reason}")]
    InvalidConnectivity { block: i32, reason: String },
    /// The graph was finalized while a declared block still had elements
    /// without connectivity.
    #[error("incomplete graph: block {block} has connectivity for {supplied} of {expected} elements")]
    IncompleteGraph {
        block: i32,
        supplied: usize,
        expected: usize,
    },
    /// Slave constraints form a dependency cycle through this global index.
    #[error("cyclic slave constraint through global index {0}")]
    CyclicConstraint(GlobalIndex),
    /// A participating rank failed during a collective phase.
    #[error("collective failure involving rank {rank}: {reason}")]
    CollectiveFailure { rank: usize, reason: String },
    /// An (id-type, id, field) triple that has no global index here.
    #[error("entity (type {id_type}, id {id}) has no index for field {field:?}")]
    UnknownEntity {
        id_type: i32,
        id: i64,
        field: Option<i32>,
    },
    /// A pattern id that was never defined on the graph.
    #[error("unknown pattern {0}")]
    UnknownPattern(i32),
    /// A connectivity block id that was never initialized.
    #[error("unknown connectivity block {0}")]
    UnknownBlock(i32),
    /// An element id with no connectivity inside the given block.
    #[error("block {block} has no element {element}")]
    UnknownElement { block: i32, element: i64 },
    /// A coefficient position that is not part of the finalized sparsity.
    #[error("position ({row}, {col}) is not in the matrix graph")]
    IndexNotInGraph { row: GlobalIndex, col: GlobalIndex },
    /// A read of a row or entry this rank does not hold.
    #[error("global index {0} is not held by this rank")]
    IndexNotOwned(GlobalIndex),
    /// Coefficient or index buffers of the wrong length.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// The coefficient format cannot be interpreted for this call.
    #[error("unsupported coefficient format: {0}")]
    UnsupportedFormat(String),
    /// File output or parsing failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AssemblyError {
    fn from(e: std::io::Error) -> Self {
        AssemblyError::Io(e.to_string())
    }
}
