mod util;
use std::sync::Arc;

use dof_assembly::linalg::transpose_coefs;
use dof_assembly::prelude::*;
use util::*;

/// Rectangular graph with one element: `row_ids` of `row_type` against
/// `col_ids` of `col_type`, one scalar field per space.
fn rect_graph(
    (row_type, row_ids): (IdType, &[i64]),
    (col_type, col_ids): (IdType, &[i64]),
) -> Arc<MatrixGraph<NoComm>> {
    let space = |name: &str, t: IdType| {
        let mut s = IndexSpace::new(NoComm, name);
        s.define_fields(&[U], &[1]).unwrap();
        s.define_id_types(&[t]).unwrap();
        s
    };
    let mut g = MatrixGraph::new(space("rows", row_type), Some(space("cols", col_type)));
    g.define_pattern(0, row_ids.len(), row_type, U).unwrap();
    g.define_pattern(1, col_ids.len(), col_type, U).unwrap();
    g.init_connectivity_block_rect(0, 1, 0, 1).unwrap();
    g.init_connectivity_rect(0, 0, row_ids, col_ids).unwrap();
    g.init_complete().unwrap();
    Arc::new(g)
}

fn dense(m: &dyn Matrix) -> Vec<Vec<f64>> {
    let mut out = vec![vec![0.0; m.global_num_cols()]; m.global_num_rows()];
    for (r, cols, vals) in owned_rows(m) {
        for (c, v) in cols.into_iter().zip(vals) {
            out[r][c] = v;
        }
    }
    out
}

#[test]
fn transpose_formatted_sum_in_matches_transpose() {
    let rows: &[i64] = &[0, 1];
    let cols: &[i64] = &[10, 11, 12];
    // D[i][j] = i, 2 x 3 row-major
    let d: Vec<f64> = (0..2)
        .flat_map(|i| std::iter::repeat_n(i as f64, 3))
        .collect();

    let mut a = create_matrix(rect_graph((NODE, rows), (ELEM, cols)), &ParameterSet::new()).unwrap();
    a.sum_in_element(0, 0, &d, CoefFormat::DenseRow).unwrap();
    a.global_assemble().unwrap();

    let mut b = create_matrix(rect_graph((ELEM, cols), (NODE, rows)), &ParameterSet::new()).unwrap();
    b.sum_in_element(0, 0, &d, CoefFormat::DenseCol).unwrap();
    b.global_assemble().unwrap();

    let mut c = create_matrix(rect_graph((ELEM, cols), (NODE, rows)), &ParameterSet::new()).unwrap();
    c.sum_in_element(0, 0, &transpose_coefs(2, 3, &d).unwrap(), CoefFormat::DenseRow)
        .unwrap();
    c.global_assemble().unwrap();

    let (da, db, dc) = (dense(&*a), dense(&*b), dense(&*c));
    assert_eq!((da.len(), da[0].len()), (2, 3));
    for i in 0..2 {
        for j in 0..3 {
            assert!((da[i][j] - db[j][i]).abs() <= 1e-49, "A[{i}][{j}] != B[{j}][{i}]");
            assert!((da[i][j] - dc[j][i]).abs() <= 1e-49);
            assert_eq!(da[i][j], i as f64);
        }
    }
}

#[test]
fn row_lengths_sum_to_structural_count() {
    let mut g = chain_graph(NoComm, 1, &[0, 1, 2]);
    g.init_complete().unwrap();
    let g = Arc::new(g);
    let nnz = g.structure().unwrap().num_nonzeros_owned();
    let mut m = create_matrix(g, &ParameterSet::new()).unwrap();
    for _ in 0..3 {
        for e in 0..3 {
            m.sum_in_element(0, e, &STIFFNESS, CoefFormat::DenseRow).unwrap();
        }
        m.global_assemble().unwrap();
        let total: usize = m.owned_rows().map(|r| m.row_length(r).unwrap()).sum();
        assert_eq!(total, nnz);
        assert_eq!(total, 10);
    }
    assert_eq!(m.copy_out_row(1).unwrap().1, vec![-3.0, 6.0, -3.0]);
}

#[test]
fn put_scalar_zeroes_values_and_keeps_structure() {
    let mut g = chain_graph(NoComm, 2, &[0, 1]);
    g.init_complete().unwrap();
    let mut m = create_matrix(Arc::new(g), &ParameterSet::new()).unwrap();
    let k: Vec<f64> = (0..16).map(f64::from).collect();
    m.sum_in_element(0, 1, &k, CoefFormat::DenseRow).unwrap();
    m.global_assemble().unwrap();
    let lengths: Vec<usize> = m.owned_rows().map(|r| m.row_length(r).unwrap()).collect();

    m.put_scalar(0.0);
    assert_eq!(m.state(), AssemblyState::Reset);
    for r in m.owned_rows() {
        let (cols, vals) = m.copy_out_row(r).unwrap();
        assert_eq!(cols.len(), lengths[r]);
        assert!(vals.iter().all(|&v| v == 0.0));
    }

    m.sum_in(&[2], &[2], &[1.5], CoefFormat::DenseRow).unwrap();
    assert_eq!(m.state(), AssemblyState::Open);
    m.global_assemble().unwrap();
    assert_eq!(m.state(), AssemblyState::Assembled);
}

#[test]
fn explicit_indices_and_formats() {
    let mut g = chain_graph(NoComm, 1, &[0, 1]);
    g.init_complete().unwrap();
    let mut m = create_matrix(Arc::new(g), &ParameterSet::new()).unwrap();
    m.sum_in(&[0, 1, 2], &[0, 1, 2], &[1.0, 2.0, 3.0], CoefFormat::Diagonal)
        .unwrap();
    m.sum_in(&[1], &[0, 2], &[-1.0, -2.0], CoefFormat::DenseRow)
        .unwrap();
    assert_eq!(m.copy_out_row(1).unwrap(), (vec![0, 1, 2], vec![-1.0, 2.0, -2.0]));

    assert_eq!(
        m.sum_in(&[0], &[2], &[1.0], CoefFormat::DenseRow),
        Err(AssemblyError::IndexNotInGraph { row: 0, col: 2 })
    );
    assert!(matches!(
        m.sum_in(&[0, 1], &[0, 1], &[1.0; 4], CoefFormat::BlockDiagonalRow),
        Err(AssemblyError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        m.sum_in_element(0, 0, &[1.0; 3], CoefFormat::DenseRow),
        Err(AssemblyError::DimensionMismatch { expected: 4, got: 3 })
    ));
    assert!(matches!(
        m.sum_in_element(0, 9, &STIFFNESS, CoefFormat::DenseRow),
        Err(AssemblyError::UnknownElement { block: 0, element: 9 })
    ));
    assert_eq!(m.copy_out_row(0).unwrap().1, vec![1.0, 0.0]);
}

#[test]
fn block_diagonal_format_rejected_on_rectangular_block() {
    let mut m = create_matrix(
        rect_graph((NODE, &[0, 1]), (ELEM, &[5, 6])),
        &ParameterSet::new(),
    )
    .unwrap();
    assert!(matches!(
        m.sum_in_element(0, 0, &[1.0; 2], CoefFormat::BlockDiagonalRow),
        Err(AssemblyError::UnsupportedFormat(_))
    ));
}
