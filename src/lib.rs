#![cfg_attr(docsrs, feature(doc_cfg))]
//! # dof-assembly
//!
//! Distributed finite-element assembly: maps element-local degree-of-freedom
//! contributions, addressed by mesh entity and field, into a globally
//! numbered sparse matrix and vector partitioned across ranks.
//!
//! ## Workflow
//! 1. Define fields and id types on an [`IndexSpace`](space::IndexSpace).
//! 2. Define patterns and connectivity blocks on a
//!    [`MatrixGraph`](graph::MatrixGraph), plus optional slave constraints.
//! 3. Finalize with [`MatrixGraph::init_complete`](graph::MatrixGraph::init_complete)
//!    (collective).
//! 4. Build a matrix with [`create_matrix`](linalg::create_matrix) or a
//!    [`DistributedVector`](linalg::DistributedVector), sum in element
//!    contributions, then `global_assemble` (collective).
//!
//! ## Communication
//! Every collective runs over a [`Communicator`](algs::Communicator):
//! [`NoComm`](algs::NoComm) for serial runs, [`ThreadComm`](algs::ThreadComm)
//! for in-process ranks (tests), and `MpiComm` with the `mpi-support`
//! feature. Errors discovered during a collective are agreed on by all ranks,
//! so every rank returns an error together.
//!
//! ## Example
//! ```
//! use std::sync::Arc;
//! use dof_assembly::prelude::*;
//!
//! let mut space = IndexSpace::new(NoComm, "u");
//! space.define_fields(&[FieldId(0)], &[1])?;
//! space.define_id_types(&[IdType(0)])?;
//! let mut graph = MatrixGraph::new(space, None);
//! graph.define_pattern(0, 2, IdType(0), FieldId(0))?;
//! graph.init_connectivity_block(0, 1, 0)?;
//! graph.init_connectivity(0, 0, &[10, 20])?;
//! graph.init_complete()?;
//!
//! let mut a = create_matrix(Arc::new(graph), &ParameterSet::new())?;
//! a.sum_in_element(0, 0, &[1.0, -1.0, -1.0, 1.0], CoefFormat::DenseRow)?;
//! a.global_assemble()?;
//! assert_eq!(a.copy_out_row(0)?, (vec![0, 1], vec![1.0, -1.0]));
//! # Ok::<(), dof_assembly::assembly_error::AssemblyError>(())
//! ```

pub mod algs;
pub mod assembly_error;
pub mod debug_invariants;
pub mod graph;
pub mod linalg;
pub mod params;
pub mod space;

pub use assembly_error::AssemblyError;
pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, ThreadComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::assembly_error::AssemblyError;
    pub use crate::graph::{MatrixGraph, PatternSlot};
    pub use crate::linalg::{
        AssemblyState, CoefFormat, CsrRows, DistributedVector, Matrix, create_matrix,
    };
    pub use crate::params::{OutputLevel, ParamValue, ParameterSet};
    pub use crate::space::{FieldId, GlobalIndex, IdType, IndexSpace};
}
