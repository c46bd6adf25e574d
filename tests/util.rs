#![allow(dead_code)]
use std::sync::Arc;

use dof_assembly::prelude::*;

pub const NODE: IdType = IdType(0);
pub const ELEM: IdType = IdType(1);
pub const U: FieldId = FieldId(0);
pub const V: FieldId = FieldId(1);

/// Run `f` on every rank of an in-process world of `n` ranks and return the
/// results indexed by rank.
pub fn run_ranks<R, F>(n: usize, f: F) -> Vec<R>
where
    R: Send + 'static,
    F: Fn(ThreadComm) -> R + Send + Sync + 'static,
{
    let f = Arc::new(f);
    let handles: Vec<_> = ThreadComm::world(n)
        .into_iter()
        .map(|comm| {
            let f = Arc::clone(&f);
            std::thread::spawn(move || f(comm))
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("rank panicked"))
        .collect()
}

/// A space with one field of `field_size` components on nodes.
pub fn node_space<C: Communicator>(comm: C, field_size: usize) -> IndexSpace<C> {
    let mut s = IndexSpace::new(comm, "nodes");
    s.define_fields(&[U], &[field_size]).unwrap();
    s.define_id_types(&[NODE]).unwrap();
    s
}

/// Square graph over a 1-D chain: element `e` connects nodes `e` and `e+1`.
/// Only the elements in `elements` are supplied on this rank.
pub fn chain_graph<C: Communicator>(
    comm: C,
    field_size: usize,
    elements: &[i64],
) -> MatrixGraph<C> {
    let mut g = MatrixGraph::new(node_space(comm, field_size), None);
    g.define_pattern(0, 2, NODE, U).unwrap();
    g.init_connectivity_block(0, elements.len(), 0).unwrap();
    for &e in elements {
        g.init_connectivity(0, e, &[e, e + 1]).unwrap();
    }
    g
}

/// 1-D stiffness contribution of a unit line element.
pub const STIFFNESS: [f64; 4] = [1.0, -1.0, -1.0, 1.0];

pub fn assert_close(got: f64, want: f64, tol: f64) {
    let scale = want.abs().max(1.0);
    assert!(
        (got - want).abs() <= tol * scale,
        "got {got}, want {want} (tol {tol})"
    );
}

/// Every owned row of `m` as `(row, cols, values)`.
pub fn owned_rows(m: &dyn Matrix) -> Vec<(GlobalIndex, Vec<GlobalIndex>, Vec<f64>)> {
    m.owned_rows()
        .map(|r| {
            let (c, v) = m.copy_out_row(r).unwrap();
            (r, c, v)
        })
        .collect()
}
