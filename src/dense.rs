// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::factorization::DEFAULT_LOG_TARGET;
use crate::{BasisMatrix, FactorContext, Factorization, Options, SparseVector, Status};
use log::{debug, warn};
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Result of [`dense_lu`]: the elimination order of rows and columns.
#[derive(Debug, Clone)]
pub(crate) struct DenseLu {
    /// `perm[k]` is the row (of the block) pivoted at stage `k`.
    pub perm: Vec<usize>,
    /// `cols[k]` is the column (of the block) pivoted at stage `k`. Columns
    /// without an acceptable pivot are moved behind the first `rank`.
    pub cols: Vec<usize>,
    pub rank: usize,
    pub flops: usize,
}

// LU factorization with partial pivoting of the `m` by `m` column-major block
// `a` with leading dimension `lda`.
//
// On return, rows and columns of `a` are in elimination order. For `k < rank`,
// `a[k*lda+k]` holds the pivot, `a[k*lda+k+1..k*lda+m]` the multipliers of L
// and `a[j*lda..j*lda+k]` the entries of U above the diagonal. A column whose
// largest remaining entry is not greater than `tol` is moved to the end and
// excluded from the elimination.
pub(crate) fn dense_lu(
    a: &mut [f64],
    m: usize,
    lda: usize,
    tol: f64,
    parallel_threshold: usize,
) -> DenseLu {
    assert!(lda >= m);
    assert!(a.len() >= m * lda);

    let mut perm: Vec<usize> = (0..m).collect();
    let mut cols: Vec<usize> = (0..m).collect();
    let mut flops = 0;
    let mut k = 0;
    let mut last = m;

    while k < last {
        let (p, amax) = (k..m)
            .map(|i| (i, a[k * lda + i].abs()))
            .fold((k, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if amax <= tol {
            last -= 1;
            if k != last {
                swap_columns(a, lda, m, k, last);
                cols.swap(k, last);
            }
            continue;
        }
        if p != k {
            for j in 0..m {
                a.swap(j * lda + p, j * lda + k);
            }
            perm.swap(p, k);
        }

        let (head, tail) = a.split_at_mut((k + 1) * lda);
        let pivot_col = &mut head[k * lda..k * lda + m];
        let inv = 1.0 / pivot_col[k];
        for x in &mut pivot_col[k + 1..m] {
            *x *= inv;
        }
        let pivot_col = &pivot_col[..];

        let ncols = m - k - 1;
        let eliminate = |col: &mut [f64]| {
            let u = col[k];
            if u != 0.0 {
                for i in k + 1..m {
                    col[i] -= pivot_col[i] * u;
                }
            }
        };
        #[cfg(feature = "parallel")]
        {
            if ncols >= parallel_threshold {
                tail[..ncols * lda].par_chunks_mut(lda).for_each(eliminate);
            } else {
                tail[..ncols * lda].chunks_mut(lda).for_each(eliminate);
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            let _ = parallel_threshold;
            tail[..ncols * lda].chunks_mut(lda).for_each(eliminate);
        }
        flops += (m - k - 1) * (ncols + 1);
        k += 1;
    }

    DenseLu {
        perm,
        cols,
        rank: k,
        flops,
    }
}

fn swap_columns(a: &mut [f64], lda: usize, m: usize, j1: usize, j2: usize) {
    let (lo, hi) = (j1.min(j2), j1.max(j2));
    let (head, tail) = a.split_at_mut(hi * lda);
    head[lo * lda..lo * lda + m].swap_with_slice(&mut tail[..m]);
}

/// LU factorization of a small basis stored as a flat column-major array.
///
/// The first `n` columns of the buffer hold the factors, the following
/// `max_pivots` columns hold the eta columns of column replacements.
#[derive(Debug, Clone)]
pub struct DenseFactorization {
    pub(crate) options: Options,
    n: usize,
    max_pivots: usize,
    elements: Vec<f64>,
    lu: Option<DenseLu>,

    eta_row: Vec<usize>,
    eta_inv: Vec<f64>,

    loaded: bool,
    valid: bool,
    nfactor: usize,
    factor_flops: usize,
    solve_flops: usize,
    time_factor: f64,
    time_solve: f64,
    min_pivot: f64,
    max_pivot: f64,
    log_target: String,
}

impl DenseFactorization {
    pub fn new(options: Options) -> Self {
        Self {
            max_pivots: options.max_pivots_before_refactor,
            options,
            n: 0,
            elements: Vec::new(),
            lu: None,
            eta_row: Vec::new(),
            eta_inv: Vec::new(),
            loaded: false,
            valid: false,
            nfactor: 0,
            factor_flops: 0,
            solve_flops: 0,
            time_factor: 0.0,
            time_solve: 0.0,
            min_pivot: 0.0,
            max_pivot: 0.0,
            log_target: DEFAULT_LOG_TARGET.to_owned(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Number of factorizations since construction.
    pub fn factor_count(&self) -> usize {
        self.nfactor
    }

    /// Floating point operations in the last factorization.
    pub fn factor_flops(&self) -> usize {
        self.factor_flops
    }

    /// Floating point operations in all solves since the last factorization.
    pub fn solve_flops(&self) -> usize {
        self.solve_flops
    }

    /// Seconds spent in the last factorization and in solves since.
    pub fn timing(&self) -> (f64, f64) {
        (self.time_factor, self.time_solve)
    }

    /// Smallest over largest pivot magnitude of the last factorization.
    pub fn pivot_ratio(&self) -> f64 {
        if self.max_pivot > 0.0 {
            self.min_pivot / self.max_pivot
        } else {
            0.0
        }
    }

    fn eta(&self, t: usize) -> &[f64] {
        let n = self.n;
        &self.elements[(n + t) * n..(n + t + 1) * n]
    }

    fn apply_etas(&mut self, x: &mut [f64]) {
        let n = self.n;
        for t in 0..self.eta_row.len() {
            let r = self.eta_row[t];
            let xr = x[r];
            if xr != 0.0 {
                let eta = self.eta(t);
                for i in 0..n {
                    x[i] -= eta[i] * xr;
                }
                x[r] = xr * self.eta_inv[t];
                self.solve_flops += n;
            }
        }
    }

    fn apply_etas_transpose(&mut self, x: &mut [f64]) {
        for t in (0..self.eta_row.len()).rev() {
            let r = self.eta_row[t];
            let eta = self.eta(t);
            let dot: f64 = eta.iter().zip(x.iter()).map(|(e, y)| e * y).sum();
            x[r] = x[r] * self.eta_inv[t] - dot;
            self.solve_flops += self.n;
        }
    }

    fn solved(&self) -> Result<&DenseLu, Status> {
        match &self.lu {
            Some(lu) if self.valid => Ok(lu),
            _ => Err(Status::InvalidCall),
        }
    }

    fn finish(&mut self, vec: &mut SparseVector, x: &[f64], tic: Instant) -> usize {
        let packed = vec.is_packed();
        let (elements, _) = vec.parts_mut();
        elements.copy_from_slice(x);
        let nz = vec.scan_with_tolerance(0..self.n, self.options.zero_tolerance);
        if packed {
            vec.pack();
        }
        self.time_solve += tic.elapsed().as_secs_f64();
        nz
    }
}

impl Factorization for DenseFactorization {
    fn get_areas(&mut self, n: usize, _max_l: usize, _max_u: usize) {
        self.n = n;
        self.max_pivots = self.options.max_pivots_before_refactor;
        let len = n * (n + self.max_pivots);
        self.elements.clear();
        self.elements.resize(len, 0.0);
        self.lu = None;
        self.loaded = false;
        self.valid = false;
    }

    fn pre_process(&mut self, basis: &BasisMatrix) {
        let n = basis.dimension();
        if n != self.n || self.elements.len() < n * n {
            self.get_areas(n, 0, 0);
        }
        self.elements[..n * n].fill(0.0);
        for j in 0..n {
            let (idx, val) = basis.column(j);
            for (&i, &x) in idx.iter().zip(val) {
                self.elements[j * n + i] = x;
            }
        }
        self.eta_row.clear();
        self.eta_inv.clear();
        self.lu = None;
        self.loaded = true;
        self.valid = false;
    }

    fn factor(&mut self, ctx: &dyn FactorContext) -> Result<(), Status> {
        if !self.loaded {
            return Err(Status::InvalidCall);
        }
        self.log_target.clear();
        self.log_target.push_str(ctx.log_target());
        let tic = Instant::now();
        let n = self.n;
        let result = dense_lu(
            &mut self.elements[..n * n],
            n,
            n,
            self.options.zero_tolerance,
            self.options.parallel_threshold,
        );
        self.loaded = false;
        self.nfactor += 1;
        self.solve_flops = 0;
        self.time_solve = 0.0;
        self.factor_flops = result.flops;
        self.min_pivot = f64::INFINITY;
        self.max_pivot = 0.0;
        for k in 0..result.rank {
            let p = self.elements[k * n + k].abs();
            self.min_pivot = self.min_pivot.min(p);
            self.max_pivot = self.max_pivot.max(p);
        }
        self.time_factor = tic.elapsed().as_secs_f64();

        let rank = result.rank;
        self.lu = Some(result);
        debug!(
            target: ctx.log_target(),
            "dense factor n={} rank={} flops={} time={:.2e}s",
            n, rank, self.factor_flops, self.time_factor
        );
        if rank < n {
            warn!(target: ctx.log_target(), "dense basis singular, rank {} of {}", rank, n);
            self.valid = false;
            return Err(Status::Singular);
        }
        self.valid = true;
        Ok(())
    }

    fn post_process(&mut self, sequence: &[usize], pivot_variable: &mut [usize]) {
        if let Some(lu) = &self.lu {
            for k in 0..self.n {
                pivot_variable[lu.perm[k]] = sequence[lu.cols[k]];
            }
        }
    }

    fn make_non_singular(&self, sequence: &mut [usize], slack_offset: usize) -> Vec<(usize, usize)> {
        let lu = match &self.lu {
            Some(lu) => lu,
            None => return Vec::new(),
        };
        let mut cols: Vec<usize> = lu.cols[lu.rank..].to_vec();
        let mut rows: Vec<usize> = lu.perm[lu.rank..].to_vec();
        cols.sort_unstable();
        rows.sort_unstable();
        let replaced: Vec<(usize, usize)> = cols.into_iter().zip(rows).collect();
        for &(j, i) in &replaced {
            sequence[j] = slack_offset + i;
        }
        replaced
    }

    fn update_column(&mut self, vec: &mut SparseVector) -> Result<usize, Status> {
        let tic = Instant::now();
        let lu = self.solved()?;
        let n = self.n;
        let a = &self.elements;
        let mut y: Vec<f64> = lu.perm.iter().map(|&i| vec.get(i)).collect();
        let mut flops = 0;

        for k in 0..n {
            let yk = y[k];
            if yk != 0.0 {
                let col = &a[k * n..(k + 1) * n];
                for i in k + 1..n {
                    y[i] -= col[i] * yk;
                }
                flops += n - k - 1;
            }
        }
        for k in (0..n).rev() {
            if y[k] != 0.0 {
                let col = &a[k * n..(k + 1) * n];
                y[k] /= col[k];
                let yk = y[k];
                for i in 0..k {
                    y[i] -= col[i] * yk;
                }
                flops += k + 1;
            }
        }
        let mut x = vec![0.0; n];
        for k in 0..n {
            x[lu.perm[k]] = y[k];
        }
        self.solve_flops += flops;
        self.apply_etas(&mut x);
        Ok(self.finish(vec, &x, tic))
    }

    fn update_column_transpose(&mut self, vec: &mut SparseVector) -> Result<usize, Status> {
        let tic = Instant::now();
        self.solved()?;
        let n = self.n;
        let mut c = vec.to_dense();
        self.apply_etas_transpose(&mut c);

        let lu = self.solved()?;
        let a = &self.elements;
        let mut t: Vec<f64> = lu.perm.iter().map(|&i| c[i]).collect();
        let mut flops = 0;
        for k in 0..n {
            let col = &a[k * n..(k + 1) * n];
            let dot: f64 = col[..k].iter().zip(&t[..k]).map(|(u, x)| u * x).sum();
            t[k] = (t[k] - dot) / col[k];
            flops += k + 1;
        }
        for k in (0..n).rev() {
            let col = &a[k * n..(k + 1) * n];
            let dot: f64 = col[k + 1..n].iter().zip(&t[k + 1..n]).map(|(l, x)| l * x).sum();
            t[k] -= dot;
            flops += n - k - 1;
        }
        let mut y = vec![0.0; n];
        for k in 0..n {
            y[lu.perm[k]] = t[k];
        }
        self.solve_flops += flops;
        Ok(self.finish(vec, &y, tic))
    }

    fn replace_column(
        &mut self,
        column: &SparseVector,
        pivot_row: usize,
        pivot_check: f64,
    ) -> Result<(), Status> {
        self.solved()?;
        if self.eta_row.len() >= self.max_pivots {
            return Err(Status::UpdateRegionFull);
        }
        if pivot_check.abs() < self.options.zero_tolerance {
            warn!(
                target: self.log_target.as_str(),
                "column replacement rejected, pivot check {:e}",
                pivot_check
            );
            return Err(Status::SingularUpdate);
        }
        let n = self.n;
        let t = self.eta_row.len();
        let inv = 1.0 / pivot_check;
        let eta = &mut self.elements[(n + t) * n..(n + t + 1) * n];
        eta.fill(0.0);
        for (i, x) in column.iter() {
            if i != pivot_row {
                eta[i] = x * inv;
            }
        }
        self.eta_row.push(pivot_row);
        self.eta_inv.push(inv);
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.n
    }

    fn rank(&self) -> usize {
        self.lu.as_ref().map_or(0, |lu| lu.rank)
    }

    fn pivots(&self) -> usize {
        self.eta_row.len()
    }

    fn max_pivots(&self) -> usize {
        self.max_pivots
    }

    fn pivot_row_of(&self, column: usize) -> Option<usize> {
        let lu = self.lu.as_ref()?;
        let k = lu.cols.iter().position(|&j| j == column)?;
        (k < lu.rank).then(|| lu.perm[k])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn factorize(a: &[f64], n: usize) -> (DenseFactorization, Vec<usize>) {
        let basis = BasisMatrix::from_dense(n, a).unwrap();
        let mut f = DenseFactorization::new(Options::default());
        f.get_areas(n, 0, 0);
        f.pre_process(&basis);
        f.factor(&()).unwrap();
        let sequence: Vec<usize> = (0..n).collect();
        let mut pivot_variable = vec![0; n];
        f.post_process(&sequence, &mut pivot_variable);
        (f, pivot_variable)
    }

    #[test]
    fn kernel_partial_pivoting() {
        // column-major [[1, 2], [4, 3]]
        let mut a = vec![1.0, 4.0, 2.0, 3.0];
        let lu = dense_lu(&mut a, 2, 2, 1e-13, usize::MAX);
        assert_eq!(lu.rank, 2);
        assert_eq!(lu.perm, vec![1, 0]);
        assert_eq!(a[0], 4.0);
        assert_eq!(a[1], 0.25);
        assert_eq!(a[2], 3.0);
        assert!((a[3] - 1.25).abs() < 1e-15);
    }

    #[test]
    fn kernel_skips_dependent_column() {
        // columns 0 and 1 equal
        let mut a = vec![1.0, 2.0, 0.0, 1.0, 2.0, 0.0, 0.0, 0.0, 3.0];
        let lu = dense_lu(&mut a, 3, 3, 1e-13, usize::MAX);
        assert_eq!(lu.rank, 2);
        assert_eq!(lu.cols[2], 1);
    }

    #[test]
    fn ftran_btran_random() {
        let n = 12;
        let mut rng = StdRng::seed_from_u64(0);
        let a: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let basis = BasisMatrix::from_dense(n, &a).unwrap();
        let (mut f, pivot_variable) = factorize(&a, n);
        let b: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut v = SparseVector::from_dense(&b);
        f.update_column(&mut v).unwrap();
        let mut z = vec![0.0; n];
        for r in 0..n {
            z[pivot_variable[r]] = v.get(r);
        }
        let bz = basis.multiply(&z);
        for i in 0..n {
            assert!((bz[i] - b[i]).abs() < 1e-10);
        }

        let mut v = SparseVector::from_dense(&b);
        f.update_column_transpose(&mut v).unwrap();
        let y = v.to_dense();
        let bty = basis.multiply_transpose(&y);
        for j in 0..n {
            let r = f.pivot_row_of(j).unwrap();
            assert!((bty[j] - b[r]).abs() < 1e-10);
        }
    }

    #[test]
    fn singular_and_make_non_singular() {
        let a = vec![1.0, 1.0, 0.0, 2.0, 2.0, 0.0, 0.0, 0.0, 1.0];
        let basis = BasisMatrix::from_dense(3, &a).unwrap();
        let mut f = DenseFactorization::new(Options::default());
        f.get_areas(3, 0, 0);
        f.pre_process(&basis);
        assert_eq!(f.factor(&()), Err(Status::Singular));
        let mut sequence = vec![10, 11, 12];
        let replaced = f.make_non_singular(&mut sequence, 100);
        assert_eq!(replaced.len(), 1);
        let (j, i) = replaced[0];
        assert_eq!(sequence[j], 100 + i);
        let mut v = SparseVector::new(3);
        assert_eq!(f.update_column(&mut v), Err(Status::InvalidCall));
    }

    #[test]
    fn replace_column_limits() {
        let a = vec![2.0, 0.0, 0.0, 3.0];
        let mut options = Options::default();
        options.max_pivots_before_refactor = 1;
        let basis = BasisMatrix::from_dense(2, &a).unwrap();
        let mut f = DenseFactorization::new(options);
        f.get_areas(2, 0, 0);
        f.pre_process(&basis);
        f.factor(&()).unwrap();
        let col = SparseVector::from_dense(&[1.0, 1.0]);
        assert_eq!(f.replace_column(&col, 0, 1e-20), Err(Status::SingularUpdate));
        f.replace_column(&col, 0, 1.0).unwrap();
        assert_eq!(f.replace_column(&col, 1, 1.0), Err(Status::UpdateRegionFull));
    }

    #[test]
    fn log_target_follows_context() {
        struct Simplex;
        impl FactorContext for Simplex {
            fn log_target(&self) -> &str {
                "simplex::basis"
            }
        }
        let basis = BasisMatrix::from_dense(2, &[2.0, 0.0, 0.0, 3.0]).unwrap();
        let mut f = DenseFactorization::new(Options::default());
        assert_eq!(f.log_target, "basis_lu");
        f.get_areas(2, 0, 0);
        f.pre_process(&basis);
        f.factor(&Simplex).unwrap();
        assert_eq!(f.log_target, "simplex::basis");
    }

    #[test]
    fn chained_replacements_solve_changed_basis() {
        let n = 10;
        let mut rng = StdRng::seed_from_u64(7);
        let mut a: Vec<f64> = (0..n * n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        for k in 0..n {
            a[k * n + k] += 2.0 * n as f64;
        }
        let (mut f, mut pivot_variable) = factorize(&a, n);

        // variable n + t replaces the variable at position r by a perturbed copy
        let mut columns: Vec<Vec<f64>> = (0..n)
            .map(|j| (0..n).map(|i| a[i * n + j]).collect())
            .collect();
        for (t, r) in [3, 7, 3].into_iter().enumerate() {
            let entering: Vec<f64> = columns[pivot_variable[r]]
                .iter()
                .map(|x| x + rng.gen_range(-0.5..0.5))
                .collect();
            let mut v = SparseVector::from_dense(&entering);
            f.update_column(&mut v).unwrap();
            let pivot_check = v.get(r);
            assert!(pivot_check.abs() > 0.5);
            f.replace_column(&v, r, pivot_check).unwrap();
            columns.push(entering);
            pivot_variable[r] = n + t;
        }
        assert_eq!(f.pivots(), 3);

        // column r of the changed basis holds the variable at position r
        let current: Vec<Vec<(usize, f64)>> = pivot_variable
            .iter()
            .map(|&var| columns[var].iter().copied().enumerate().collect())
            .collect();
        let basis = BasisMatrix::from_columns(n, &current).unwrap();
        let b: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut v = SparseVector::from_dense(&b);
        f.update_column(&mut v).unwrap();
        let bx = basis.multiply(&v.to_dense());
        for i in 0..n {
            assert!((bx[i] - b[i]).abs() < 1e-10);
        }

        let mut v = SparseVector::from_dense(&b);
        f.update_column_transpose(&mut v).unwrap();
        let bty = basis.multiply_transpose(&v.to_dense());
        for r in 0..n {
            assert!((bty[r] - b[r]).abs() < 1e-10);
        }
    }
}
