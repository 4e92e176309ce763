// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::lu::Task;
use crate::lu::{btran, build_transposes, factorize, ftran, load, replace_column, LU};
use crate::{BasisMatrix, FactorContext, Factorization, Options, SparseVector, Status};
use log::trace;

/// Sparse LU factorization with Markowitz pivoting, dense breakover and
/// column replacement in product form.
#[derive(Debug, Clone)]
pub struct SparseFactorization {
    lu: LU,
}

impl SparseFactorization {
    pub fn new(options: Options) -> Self {
        Self {
            lu: LU::new(options),
        }
    }

    pub fn options(&self) -> &Options {
        &self.lu.options
    }

    /// Multiplier of the area estimates. Default: `Options::initial_area_factor`
    pub fn area_factor(&self) -> f64 {
        self.lu.area_factor
    }

    /// Takes effect with the next `pre_process`.
    pub fn set_area_factor(&mut self, area_factor: f64) {
        assert!(area_factor > 0.0);
        self.lu.area_factor = area_factor;
    }

    /// Number of factorizations since construction.
    pub fn factor_count(&self) -> usize {
        self.lu.nfactorize
    }

    /// Nonzeros in L, without the unit diagonal.
    pub fn nnz_l(&self) -> usize {
        self.lu.l_nz
    }

    /// Nonzeros in U, without the pivots.
    pub fn nnz_u(&self) -> usize {
        self.lu.u_nz
    }

    /// Nonzeros in the etas of column replacements.
    pub fn nnz_r(&self) -> usize {
        self.lu.r_index.len()
    }

    /// Compressions of the row and column file in the last factorization.
    pub fn compressions(&self) -> usize {
        self.lu.compressions()
    }

    /// Dimension of the block handed to the dense kernel, 0 if none.
    pub fn dense_block_size(&self) -> usize {
        self.lu.dense_size
    }

    /// Columns pivoted as slacks while loading the basis.
    pub fn slack_pivots(&self) -> usize {
        self.lu.nslack
    }

    /// Singleton pivots of the last factorization, slacks excluded.
    pub fn singleton_pivots(&self) -> usize {
        self.lu.nsingletons
    }

    /// Rows and columns searched by the Markowitz search.
    pub fn searched_lines(&self) -> usize {
        self.lu.nsearch_pivot
    }

    /// Pivots accepted with the relaxed tolerances.
    pub fn relaxed_pivots(&self) -> usize {
        self.lu.nrelaxed
    }

    pub fn factor_flops(&self) -> usize {
        self.lu.factor_flops
    }

    /// Floating point operations in all solves since the last factorization,
    /// split into L, U and the etas.
    pub fn solve_flops(&self) -> (usize, usize, usize) {
        (self.lu.l_flops, self.lu.u_flops, self.lu.r_flops)
    }

    /// Solves that took the depth-first path.
    pub fn sparse_solves(&self) -> usize {
        self.lu.nsparse_solves
    }

    /// Seconds spent in the last factorization (total, singletons, pivot
    /// search, elimination) and in solves since.
    pub fn timing(&self) -> (f64, f64, f64, f64, f64) {
        let lu = &self.lu;
        (
            lu.time_factorize,
            lu.time_singletons,
            lu.time_search_pivot,
            lu.time_elim_pivot,
            lu.time_solve,
        )
    }

    /// Smallest over largest pivot magnitude of the last factorization.
    pub fn pivot_ratio(&self) -> f64 {
        if self.lu.max_pivot > 0.0 {
            self.lu.min_pivot / self.lu.max_pivot
        } else {
            0.0
        }
    }

    /// Rows and columns in the order they were pivoted.
    pub fn pivot_sequence(&self) -> (&[usize], &[usize]) {
        (&self.lu.pivot_row, &self.lu.pivot_col)
    }

    /// Largest number of nonzeros in a right-hand side that is solved by the
    /// depth-first path. Set by `post_process`.
    pub fn sparse_threshold(&self) -> usize {
        self.lu.sparse_threshold
    }

    fn tuned_sparse_threshold(&self) -> usize {
        if let Some(threshold) = self.lu.options.sparse_threshold {
            return threshold;
        }
        let m = self.lu.m;
        if (self.lu.l_nz + self.lu.u_nz) as f64 > (m as f64) * (m as f64) / 4.0 {
            0
        } else if m >= 10000 {
            1000
        } else if m > 300 {
            usize::min(m / 6, 500)
        } else {
            0
        }
    }
}

impl Factorization for SparseFactorization {
    fn get_areas(&mut self, n: usize, max_l: usize, max_u: usize) {
        self.lu.resize(n);
        self.lu.l_hint = max_l;
        self.lu.u_hint = max_u;
        self.lu.task = Task::NoTask;
    }

    fn pre_process(&mut self, basis: &BasisMatrix) {
        load(&mut self.lu, basis);
    }

    fn factor(&mut self, ctx: &dyn FactorContext) -> Result<(), Status> {
        factorize(&mut self.lu, ctx)
    }

    fn post_process(&mut self, sequence: &[usize], pivot_variable: &mut [usize]) {
        let lu = &self.lu;
        for k in 0..lu.rank() {
            pivot_variable[lu.pivot_row[k]] = sequence[lu.pivot_col[k]];
        }
        if lu.task != Task::Factorized || lu.transposed {
            return;
        }
        build_transposes(&mut self.lu);
        self.lu.sparse_threshold = self.tuned_sparse_threshold();
        trace!(
            target: self.lu.log_target.as_str(),
            "sparse solves for right-hand sides up to {} nonzeros",
            self.lu.sparse_threshold
        );
    }

    fn make_non_singular(&self, sequence: &mut [usize], slack_offset: usize) -> Vec<(usize, usize)> {
        let lu = &self.lu;
        let cols = (0..lu.m).filter(|&j| lu.qinv[j].is_none());
        let rows = (0..lu.m).filter(|&i| lu.pinv[i].is_none());
        let replaced: Vec<(usize, usize)> = cols.zip(rows).collect();
        for &(j, i) in &replaced {
            sequence[j] = slack_offset + i;
        }
        replaced
    }

    fn update_column(&mut self, vec: &mut SparseVector) -> Result<usize, Status> {
        ftran(&mut self.lu, vec)
    }

    fn update_column_transpose(&mut self, vec: &mut SparseVector) -> Result<usize, Status> {
        btran(&mut self.lu, vec)
    }

    fn replace_column(
        &mut self,
        column: &SparseVector,
        pivot_row: usize,
        pivot_check: f64,
    ) -> Result<(), Status> {
        replace_column(&mut self.lu, column, pivot_row, pivot_check)
    }

    fn dimension(&self) -> usize {
        self.lu.m
    }

    fn rank(&self) -> usize {
        self.lu.rank()
    }

    fn pivots(&self) -> usize {
        self.lu.r_row.len()
    }

    fn max_pivots(&self) -> usize {
        self.lu.options.max_pivots_before_refactor
    }

    fn pivot_row_of(&self, column: usize) -> Option<usize> {
        self.lu.qinv.get(column).copied().flatten().map(|k| self.lu.pivot_row[k])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factorize(columns: &[Vec<(usize, f64)>], options: Options) -> SparseFactorization {
        let basis = BasisMatrix::from_columns(columns.len(), columns).unwrap();
        let mut f = SparseFactorization::new(options);
        f.get_areas(basis.dimension(), 0, 0);
        f.pre_process(&basis);
        f.factor(&()).unwrap();
        let sequence: Vec<usize> = (0..basis.dimension()).collect();
        let mut pivot_variable = vec![0; basis.dimension()];
        f.post_process(&sequence, &mut pivot_variable);
        f
    }

    #[test]
    fn slack_columns_are_pivoted_on_load() {
        let columns = vec![
            vec![(1, 1.0)],
            vec![(0, 2.0), (1, 3.0)],
            vec![(2, -1.0)],
        ];
        let f = factorize(&columns, Options::default());
        assert_eq!(f.slack_pivots(), 2);
        assert_eq!(f.rank(), 3);
        assert_eq!(f.pivot_row_of(1), Some(0));
    }

    #[test]
    fn threshold_override() {
        let columns = vec![vec![(0, 2.0)], vec![(1, 3.0)]];
        let options = Options {
            sparse_threshold: Some(5),
            ..Options::default()
        };
        let f = factorize(&columns, options);
        assert_eq!(f.sparse_threshold(), 5);

        let f = factorize(&columns, Options::default());
        assert_eq!(f.sparse_threshold(), 0);
    }

    #[test]
    fn solve_before_factor_is_invalid() {
        let mut f = SparseFactorization::new(Options::default());
        f.get_areas(2, 0, 0);
        let mut v = SparseVector::new(2);
        assert_eq!(f.update_column(&mut v), Err(Status::InvalidCall));
        let column = SparseVector::new(2);
        assert_eq!(f.replace_column(&column, 0, 1.0), Err(Status::InvalidCall));
    }

    #[test]
    fn replace_column_checks() {
        let columns = vec![vec![(0, 2.0)], vec![(1, 3.0)]];
        let options = Options {
            max_pivots_before_refactor: 1,
            ..Options::default()
        };
        let mut f = factorize(&columns, options);
        let column = SparseVector::from_entries(2, &[(0, 1.0), (1, 0.5)]);
        assert_eq!(f.replace_column(&column, 1, 1e-20), Err(Status::SingularUpdate));
        assert_eq!(f.pivots(), 0);
        assert_eq!(f.replace_column(&column, 1, 0.5), Ok(()));
        assert_eq!(f.nnz_r(), 1);
        assert!(f.needs_refactor());
        assert_eq!(f.replace_column(&column, 1, 0.5), Err(Status::UpdateRegionFull));
    }

    struct Simplex;

    impl FactorContext for Simplex {
        fn log_target(&self) -> &str {
            "simplex::basis"
        }
    }

    #[test]
    fn log_target_follows_context() {
        let basis = BasisMatrix::from_columns(2, &[vec![(0, 2.0)], vec![(1, 3.0)]]).unwrap();
        let mut f = SparseFactorization::new(Options::default());
        assert_eq!(f.lu.log_target, "basis_lu");
        f.get_areas(2, 0, 0);
        f.pre_process(&basis);
        f.factor(&Simplex).unwrap();
        assert_eq!(f.lu.log_target, "simplex::basis");

        // the target is kept for the next load and its updates
        f.pre_process(&basis);
        assert_eq!(f.lu.log_target, "simplex::basis");
        f.factor(&()).unwrap();
        assert_eq!(f.lu.log_target, "basis_lu");
    }
}
