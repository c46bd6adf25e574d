mod util;
use std::sync::Arc;

use dof_assembly::prelude::*;
use util::*;

fn params(block_matrix: bool) -> ParameterSet {
    let mut p = ParameterSet::new();
    p.set("BLOCK_MATRIX", ParamValue::Bool(block_matrix));
    p
}

/// Two entities with a 2-component field on one element.
fn two_entity_graph(diagonal: bool) -> Arc<MatrixGraph<NoComm>> {
    let mut g = MatrixGraph::new(node_space(NoComm, 2), None);
    g.define_pattern(0, 2, NODE, U).unwrap();
    if diagonal {
        g.init_connectivity_block_diagonal(0, 1, 0).unwrap();
    } else {
        g.init_connectivity_block(0, 1, 0).unwrap();
    }
    g.init_connectivity(0, 0, &[0, 1]).unwrap();
    g.init_complete().unwrap();
    Arc::new(g)
}

/// Entries of `m` at `(row, col)` pairs belonging to different entities.
fn cross_entity_values(m: &dyn Matrix) -> Vec<f64> {
    owned_rows(m)
        .into_iter()
        .flat_map(|(r, cols, vals)| {
            cols.into_iter()
                .zip(vals)
                .filter(move |&(c, _)| c / 2 != r / 2)
                .map(|(_, v)| v)
        })
        .collect()
}

#[test]
fn diagonal_block_places_entity_blocks_only() {
    for block_matrix in [false, true] {
        let mut m = create_matrix(two_entity_graph(true), &params(block_matrix)).unwrap();
        m.sum_in_element(0, 0, &[1.0; 8], CoefFormat::BlockDiagonalRow)
            .unwrap();
        m.global_assemble().unwrap();
        for r in 0..4 {
            let first = r / 2 * 2;
            assert_eq!(
                m.copy_out_row(r).unwrap(),
                (vec![first, first + 1], vec![1.0, 1.0]),
                "{}",
                m.type_name()
            );
        }
        assert!(cross_entity_values(&*m).is_empty());
    }
}

#[test]
fn block_diagonal_data_on_full_block_leaves_coupling_zero() {
    for block_matrix in [false, true] {
        let mut m = create_matrix(two_entity_graph(false), &params(block_matrix)).unwrap();
        m.sum_in_element(0, 0, &[1.0; 8], CoefFormat::BlockDiagonalRow)
            .unwrap();
        m.global_assemble().unwrap();
        let cross = cross_entity_values(&*m);
        assert_eq!(cross.len(), 8);
        assert!(cross.iter().all(|&v| v == 0.0));
        assert_eq!(m.copy_out_row(3).unwrap().1, vec![0.0, 0.0, 1.0, 1.0]);
    }
}

#[test]
fn backends_agree_on_dense_element() {
    let k: Vec<f64> = (0..16).map(|x| f64::from(x) * 0.5).collect();
    let mut rows = Vec::new();
    for block_matrix in [false, true] {
        let mut m = create_matrix(two_entity_graph(false), &params(block_matrix)).unwrap();
        m.sum_in_element(0, 0, &k, CoefFormat::DenseRow).unwrap();
        m.global_assemble().unwrap();
        rows.push(owned_rows(&*m));
    }
    assert_eq!(rows[0], rows[1]);
    assert_eq!(rows[0][1].2, vec![2.0, 2.5, 3.0, 3.5]);
}

#[test]
fn block_rows_report_whole_tiles() {
    // element 0 couples nodes 0,1; element 1 is a diagonal block on node 2
    let mut g = MatrixGraph::new(node_space(NoComm, 2), None);
    g.define_pattern(0, 2, NODE, U).unwrap();
    g.define_pattern(1, 1, NODE, U).unwrap();
    g.init_connectivity_block(0, 1, 0).unwrap();
    g.init_connectivity_block_diagonal(1, 1, 1).unwrap();
    g.init_connectivity(0, 0, &[0, 1]).unwrap();
    g.init_connectivity(1, 0, &[2]).unwrap();
    g.init_complete().unwrap();
    let m = create_matrix(Arc::new(g), &params(true)).unwrap();
    assert_eq!(m.type_name(), "BlockRows");
    assert_eq!(m.row_length(0).unwrap(), 4);
    assert_eq!(m.row_length(5).unwrap(), 2);
}

#[test]
fn row_lengths_match_structure_only_for_scalar_rows() {
    // one entity with two scalar fields in a diagonal block: each field
    // couples only with itself, but the entity tile covers both
    let graph = || {
        let mut s = IndexSpace::new(NoComm, "uv");
        s.define_fields(&[U, V], &[1, 1]).unwrap();
        s.define_id_types(&[NODE]).unwrap();
        let mut g = MatrixGraph::new(s, None);
        g.define_general_pattern(0, vec![PatternSlot::new(NODE, vec![U, V])])
            .unwrap();
        g.init_connectivity_block_diagonal(0, 1, 0).unwrap();
        g.init_connectivity(0, 0, &[0]).unwrap();
        g.init_complete().unwrap();
        Arc::new(g)
    };
    let g = graph();
    assert_eq!(g.structure().unwrap().num_nonzeros_owned(), 2);

    let total = |block_matrix: bool| -> usize {
        let m = create_matrix(graph(), &params(block_matrix)).unwrap();
        m.owned_rows().map(|r| m.row_length(r).unwrap()).sum()
    };
    assert_eq!(total(false), 2);
    assert_eq!(total(true), 4);
}
