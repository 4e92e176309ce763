// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use basis_lu::{
    status_code, BasisFactorization, BasisMatrix, Factorization, Options, SparseFactorization,
    SparseVector, Status,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const TOL: f64 = 1e-10;

// Column diagonally dominant after a random row permutation, so nonsingular.
fn random_basis(n: usize, density: f64, rng: &mut StdRng) -> BasisMatrix {
    let mut perm: Vec<usize> = (0..n).collect();
    perm.shuffle(rng);
    let columns: Vec<Vec<(usize, f64)>> = (0..n)
        .map(|j| {
            let mut col = vec![(perm[j], rng.gen_range(5.0..8.0))];
            for i in 0..n {
                if i != perm[j] && rng.gen_bool(density) {
                    col.push((i, rng.gen_range(-0.4..0.4)));
                }
            }
            col
        })
        .collect();
    BasisMatrix::from_columns(n, &columns).unwrap()
}

fn random_sparse(n: usize, nz: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut b = vec![0.0; n];
    for _ in 0..nz {
        b[rng.gen_range(0..n)] = rng.gen_range(-1.0..1.0);
    }
    b
}

fn factorize<F: Factorization>(f: &mut F, basis: &BasisMatrix) -> Vec<usize> {
    let n = basis.dimension();
    f.get_areas(n, 0, 0);
    f.pre_process(basis);
    f.factor(&()).unwrap();
    let sequence: Vec<usize> = (0..n).collect();
    let mut pivot_variable = vec![0; n];
    f.post_process(&sequence, &mut pivot_variable);
    pivot_variable
}

// Solution of `B z = b` from the FTRAN result.
fn ftran<F: Factorization>(f: &mut F, pivot_variable: &[usize], b: &[f64]) -> Vec<f64> {
    let mut v = SparseVector::from_dense(b);
    f.update_column(&mut v).unwrap();
    let mut z = vec![0.0; b.len()];
    for (r, &j) in pivot_variable.iter().enumerate() {
        z[j] = v.get(r);
    }
    z
}

// Solution of `B' y = c` with the entry for column `j` of `c` placed at its
// basis position.
fn btran<F: Factorization>(f: &mut F, pivot_variable: &[usize], c: &[f64]) -> Vec<f64> {
    let mut v = SparseVector::new(c.len());
    for (r, &j) in pivot_variable.iter().enumerate() {
        v.set(r, c[j]);
    }
    f.update_column_transpose(&mut v).unwrap();
    v.to_dense()
}

fn assert_close(a: &[f64], b: &[f64], tol: f64) {
    assert_eq!(a.len(), b.len());
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        assert!((x - y).abs() <= tol, "entry {}: {} != {}", i, x, y);
    }
}

#[test]
fn lower_triangular_basis() {
    let a = vec![2.0, 0.0, 0.0, 1.0, 3.0, 0.0, 0.0, 1.0, 4.0];
    let basis = BasisMatrix::from_dense(3, &a).unwrap();
    let mut f = SparseFactorization::new(Options::default());
    let pivot_variable = factorize(&mut f, &basis);

    assert_eq!(f.rank(), 3);
    assert_eq!(f.nnz_l(), 0);
    assert_eq!(f.nnz_u(), 2);
    for j in 0..3 {
        assert_eq!(f.pivot_row_of(j), Some(j));
    }
    assert_eq!(pivot_variable, vec![0, 1, 2]);

    let mut v = SparseVector::from_dense(&[2.0, 4.0, 9.0]);
    assert_eq!(f.update_column(&mut v), Ok(3));
    assert_close(&v.to_dense(), &[1.0, 1.0, 2.0], 1e-15);
}

#[test]
fn row_singleton_is_pivoted_first() {
    let a = vec![
        4.0, 1.0, 0.0, 1.0, //
        1.0, 4.0, 1.0, 0.0, //
        0.0, 2.0, 0.0, 0.0, //
        1.0, 0.0, 1.0, 4.0,
    ];
    let basis = BasisMatrix::from_dense(4, &a).unwrap();
    let mut f = SparseFactorization::new(Options::default());
    let pivot_variable = factorize(&mut f, &basis);

    let (rows, cols) = f.pivot_sequence();
    assert_eq!((rows[0], cols[0]), (2, 1));
    assert_eq!(f.singleton_pivots(), 1);

    let b = vec![1.0, -2.0, 3.0, 0.5];
    let z = ftran(&mut f, &pivot_variable, &b);
    assert_close(&basis.multiply(&z), &b, TOL);
}

#[test]
fn random_sparse_solves() {
    let n = 60;
    let mut rng = StdRng::seed_from_u64(42);
    let basis = random_basis(n, 0.08, &mut rng);

    for (threshold, parallel_threshold) in [(Some(0), 64), (Some(n), 64), (Some(n), 1)] {
        let options = Options {
            sparse_threshold: threshold,
            parallel_threshold,
            ..Options::default()
        };
        let mut f = SparseFactorization::new(options);
        let pivot_variable = factorize(&mut f, &basis);
        assert_eq!(f.rank(), n);

        for nz in [1, 3, 20] {
            let b = random_sparse(n, nz, &mut rng);
            let z = ftran(&mut f, &pivot_variable, &b);
            assert_close(&basis.multiply(&z), &b, TOL);

            let c = random_sparse(n, nz, &mut rng);
            let y = btran(&mut f, &pivot_variable, &c);
            assert_close(&basis.multiply_transpose(&y), &c, TOL);
        }
        if threshold == Some(0) {
            assert_eq!(f.sparse_solves(), 0);
        } else {
            assert!(f.sparse_solves() > 0);
        }
    }
}

#[test]
fn post_process_is_idempotent() {
    let n = 30;
    let mut rng = StdRng::seed_from_u64(7);
    let basis = random_basis(n, 0.1, &mut rng);
    let mut f = SparseFactorization::new(Options::default());
    let first = factorize(&mut f, &basis);
    let threshold = f.sparse_threshold();

    let sequence: Vec<usize> = (0..n).collect();
    let mut second = vec![0; n];
    f.post_process(&sequence, &mut second);
    assert_eq!(first, second);
    assert_eq!(f.sparse_threshold(), threshold);

    let b = random_sparse(n, 5, &mut rng);
    let z1 = ftran(&mut f, &first, &b);
    f.post_process(&sequence, &mut second);
    let z2 = ftran(&mut f, &second, &b);
    assert_eq!(z1, z2);
}

#[test]
fn replace_column_matches_refactorization() {
    let n = 40;
    let mut rng = StdRng::seed_from_u64(3);
    let basis = random_basis(n, 0.1, &mut rng);
    let mut f = SparseFactorization::new(Options::default());
    let pivot_variable = factorize(&mut f, &basis);

    let mut columns: Vec<Vec<f64>> = (0..n)
        .map(|j| {
            let mut a = vec![0.0; n];
            let (idx, val) = basis.column(j);
            for (&i, &x) in idx.iter().zip(val) {
                a[i] = x;
            }
            a
        })
        .collect();

    // column q becomes twice its current values plus noise; column 5 twice
    for (t, q) in [5, 17, 5].into_iter().enumerate() {
        let mut a: Vec<f64> = columns[q].iter().map(|x| 2.0 * x).collect();
        for _ in 0..4 {
            a[rng.gen_range(0..n)] += rng.gen_range(-0.3..0.3);
        }
        let mut alpha = SparseVector::from_dense(&a);
        f.update_column(&mut alpha).unwrap();
        let r = f.pivot_row_of(q).unwrap();
        let pivot_check = alpha.get(r);
        assert!(pivot_check.abs() > 0.1);
        f.replace_column(&alpha, r, pivot_check).unwrap();
        assert_eq!(f.pivots(), t + 1);
        columns[q] = a;
    }

    let columns: Vec<Vec<(usize, f64)>> = columns
        .iter()
        .map(|a| a.iter().copied().enumerate().collect())
        .collect();
    let changed = BasisMatrix::from_columns(n, &columns).unwrap();
    let mut g = SparseFactorization::new(Options::default());
    let changed_pivot_variable = factorize(&mut g, &changed);

    for _ in 0..3 {
        let b = random_sparse(n, 6, &mut rng);
        let updated = ftran(&mut f, &pivot_variable, &b);
        let refactored = ftran(&mut g, &changed_pivot_variable, &b);
        assert_close(&updated, &refactored, 1e-9);
        assert_close(&changed.multiply(&updated), &b, TOL);

        let c = random_sparse(n, 6, &mut rng);
        let y = btran(&mut f, &pivot_variable, &c);
        assert_close(&changed.multiply_transpose(&y), &c, TOL);
    }
}

#[test]
fn dense_breakover_gives_same_solution() {
    let n = 20;
    let mut rng = StdRng::seed_from_u64(2024);
    let a: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let basis = BasisMatrix::from_dense(n, &a).unwrap();
    let b: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();

    let mut sparse = SparseFactorization::new(Options::default());
    let pv_sparse = factorize(&mut sparse, &basis);
    assert_eq!(sparse.dense_block_size(), 0);

    let forced = Options {
        dense_breakover_threshold: Some(0),
        dense_check_interval: 1,
        ..Options::default()
    };
    let mut dense = SparseFactorization::new(forced);
    let pv_dense = factorize(&mut dense, &basis);
    assert_eq!(dense.dense_block_size(), n);

    let z1 = ftran(&mut sparse, &pv_sparse, &b);
    let z2 = ftran(&mut dense, &pv_dense, &b);
    assert_close(&z1, &z2, 1e-8);
    assert_close(&basis.multiply(&z2), &b, 1e-9);

    let y1 = btran(&mut sparse, &pv_sparse, &b);
    let y2 = btran(&mut dense, &pv_dense, &b);
    assert_close(&y1, &y2, 1e-8);
}

#[test]
fn singular_basis_and_make_non_singular() {
    // row 3 and column 3 are empty
    let a = vec![
        2.0, 1.0, 0.0, 0.0, //
        1.0, 3.0, 0.0, 0.0, //
        0.0, 1.0, 5.0, 0.0, //
        0.0, 0.0, 0.0, 0.0,
    ];
    let basis = BasisMatrix::from_dense(4, &a).unwrap();
    let mut f = SparseFactorization::new(Options::default());
    f.get_areas(4, 0, 0);
    f.pre_process(&basis);
    let result = f.factor(&());
    assert_eq!(result, Err(Status::Singular));
    assert_eq!(status_code(&result), -1);
    assert_eq!(f.rank(), 3);

    let mut sequence = vec![10, 11, 12, 13];
    let replaced = f.make_non_singular(&mut sequence, 100);
    assert_eq!(replaced, vec![(3, 3)]);
    assert_eq!(sequence, vec![10, 11, 12, 103]);

    let mut v = SparseVector::new(4);
    assert_eq!(f.update_column(&mut v), Err(Status::InvalidCall));
}

#[test]
fn relaxed_tolerance_accepts_small_pivots() {
    let a = vec![5e-12, 1e-12, 1e-12, 5e-12];
    let basis = BasisMatrix::from_dense(2, &a).unwrap();
    let mut f = SparseFactorization::new(Options::default());
    let pivot_variable = factorize(&mut f, &basis);
    assert_eq!(f.rank(), 2);
    assert!(f.relaxed_pivots() >= 1);

    let b = vec![6e-12, 6e-12];
    let z = ftran(&mut f, &pivot_variable, &b);
    assert_close(&z, &[1.0, 1.0], 1e-9);
}

#[test]
fn driver_grows_small_areas() {
    let n = 50;
    let mut rng = StdRng::seed_from_u64(11);
    let basis = random_basis(n, 0.15, &mut rng);
    let options = Options {
        initial_area_factor: 0.05,
        ..Options::default()
    };
    let mut f = BasisFactorization::new(options);
    let mut sequence: Vec<usize> = (0..n).collect();
    let mut pivot_variable = vec![0; n];
    let summary = f
        .factorize(&basis, &mut sequence, 1000, &mut pivot_variable, &())
        .unwrap();
    assert!(summary.attempts > 1);
    assert!(summary.replaced.is_empty());
    assert!(!summary.dense);

    let b = random_sparse(n, 10, &mut rng);
    let mut v = SparseVector::from_dense(&b);
    f.update_column(&mut v).unwrap();
    let mut z = vec![0.0; n];
    for (r, &j) in pivot_variable.iter().enumerate() {
        z[j] = v.get(r);
    }
    assert_close(&basis.multiply(&z), &b, TOL);
}

#[test]
fn driver_gives_up_after_retries() {
    let n = 50;
    let mut rng = StdRng::seed_from_u64(12);
    let basis = random_basis(n, 0.15, &mut rng);
    let options = Options {
        initial_area_factor: 0.001,
        max_retries: 1,
        ..Options::default()
    };
    let mut f = BasisFactorization::new(options);
    let mut sequence: Vec<usize> = (0..n).collect();
    let mut pivot_variable = vec![0; n];
    let result = f.factorize(&basis, &mut sequence, 1000, &mut pivot_variable, &());
    assert_eq!(result, Err(Status::OutOfMemory));
    assert_eq!(status_code(&result), -99);
}

#[test]
fn packed_vectors_stay_packed() {
    let n = 25;
    let mut rng = StdRng::seed_from_u64(5);
    let basis = random_basis(n, 0.1, &mut rng);
    let mut f = SparseFactorization::new(Options::default());
    factorize(&mut f, &basis);
    let b = random_sparse(n, 4, &mut rng);

    let mut unpacked = SparseVector::from_dense(&b);
    f.update_column(&mut unpacked).unwrap();
    let mut packed = SparseVector::from_dense(&b);
    packed.pack();
    let nz = f.update_column(&mut packed).unwrap();
    assert!(packed.is_packed());
    assert_eq!(nz, packed.num_elements());
    for r in 0..n {
        assert_eq!(packed.get(r), unpacked.get(r));
    }
}

#[test]
fn update_region_limits() {
    let n = 10;
    let mut rng = StdRng::seed_from_u64(9);
    let basis = random_basis(n, 0.2, &mut rng);
    let options = Options {
        max_pivots_before_refactor: 2,
        ..Options::default()
    };
    let mut f = BasisFactorization::new(Options {
        dense_dimension_limit: 0,
        ..options
    });
    let mut sequence: Vec<usize> = (0..n).collect();
    let mut pivot_variable = vec![0; n];
    f.factorize(&basis, &mut sequence, 100, &mut pivot_variable, &())
        .unwrap();

    let column = SparseVector::from_entries(n, &[(0, 1.0), (3, 2.0)]);
    let result = f.replace_column(&column, 3, 1e-15);
    assert_eq!(status_code(&result), 2);
    f.replace_column(&column, 3, 2.0).unwrap();
    f.replace_column(&column, 0, 1.0).unwrap();
    assert!(f.needs_refactor());
    let result = f.replace_column(&column, 3, 2.0);
    assert_eq!(status_code(&result), 3);
    assert!(result.unwrap_err().requires_refactor());
}
