// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::{
    BasisMatrix, DenseFactorization, FactorContext, Factorization, Options, SparseFactorization,
    SparseVector, Status,
};
use log::{debug, warn};

/// The factorization in use by a [`BasisFactorization`].
#[derive(Debug, Clone)]
pub enum Engine {
    Dense(DenseFactorization),
    Sparse(SparseFactorization),
}

impl Engine {
    fn as_dyn(&self) -> &dyn Factorization {
        match self {
            Engine::Dense(f) => f,
            Engine::Sparse(f) => f,
        }
    }

    fn as_dyn_mut(&mut self) -> &mut dyn Factorization {
        match self {
            Engine::Dense(f) => f,
            Engine::Sparse(f) => f,
        }
    }
}

impl Factorization for Engine {
    fn get_areas(&mut self, n: usize, max_l: usize, max_u: usize) {
        self.as_dyn_mut().get_areas(n, max_l, max_u)
    }

    fn pre_process(&mut self, basis: &BasisMatrix) {
        self.as_dyn_mut().pre_process(basis)
    }

    fn factor(&mut self, ctx: &dyn FactorContext) -> Result<(), Status> {
        self.as_dyn_mut().factor(ctx)
    }

    fn post_process(&mut self, sequence: &[usize], pivot_variable: &mut [usize]) {
        self.as_dyn_mut().post_process(sequence, pivot_variable)
    }

    fn make_non_singular(&self, sequence: &mut [usize], slack_offset: usize) -> Vec<(usize, usize)> {
        self.as_dyn().make_non_singular(sequence, slack_offset)
    }

    fn update_column(&mut self, vec: &mut SparseVector) -> Result<usize, Status> {
        self.as_dyn_mut().update_column(vec)
    }

    fn update_column_transpose(&mut self, vec: &mut SparseVector) -> Result<usize, Status> {
        self.as_dyn_mut().update_column_transpose(vec)
    }

    fn replace_column(
        &mut self,
        column: &SparseVector,
        pivot_row: usize,
        pivot_check: f64,
    ) -> Result<(), Status> {
        self.as_dyn_mut().replace_column(column, pivot_row, pivot_check)
    }

    fn dimension(&self) -> usize {
        self.as_dyn().dimension()
    }

    fn rank(&self) -> usize {
        self.as_dyn().rank()
    }

    fn pivots(&self) -> usize {
        self.as_dyn().pivots()
    }

    fn max_pivots(&self) -> usize {
        self.as_dyn().max_pivots()
    }

    fn pivot_row_of(&self, column: usize) -> Option<usize> {
        self.as_dyn().pivot_row_of(column)
    }
}

/// Outcome of a successful [`BasisFactorization::factorize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactorSummary {
    /// Factorizations run, including the successful one.
    pub attempts: usize,
    /// `(column, row)` pairs of basis columns replaced by slacks.
    pub replaced: Vec<(usize, usize)>,
    /// Whether the dense factorization was used.
    pub dense: bool,
}

/// Factorization of a simplex basis that picks the dense or the sparse
/// factorization by dimension and recovers from singular bases and small
/// working areas.
#[derive(Debug, Clone)]
pub struct BasisFactorization {
    options: Options,
    engine: Engine,
}

impl BasisFactorization {
    pub fn new(options: Options) -> Self {
        Self {
            engine: Engine::Sparse(SparseFactorization::new(options.clone())),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.engine, Engine::Dense(_))
    }

    fn select_engine(&mut self, n: usize) {
        let dense = n <= self.options.dense_dimension_limit;
        match (&self.engine, dense) {
            (Engine::Dense(_), true) | (Engine::Sparse(_), false) => {}
            (_, true) => self.engine = Engine::Dense(DenseFactorization::new(self.options.clone())),
            (_, false) => {
                self.engine = Engine::Sparse(SparseFactorization::new(self.options.clone()))
            }
        }
    }

    /// ```text
    /// Purpose:
    ///
    ///     Factorize the basis `basis`, whose column `j` belongs to variable
    ///     `sequence[j]`, and write the variable at each basis position into
    ///     `pivot_variable`.
    ///
    ///     When the basis is singular, the columns without a pivot are
    ///     replaced by slack columns of the unused rows, `sequence` is
    ///     updated to `slack_offset + row` for them and the factorization is
    ///     repeated. When a working area is too small, its size is grown by
    ///     `Options::area_growth_factor` and the factorization is repeated.
    ///
    /// Return:
    ///
    ///     FactorSummary
    ///
    ///         the number of attempts and the replaced columns.
    ///
    ///     Status::OutOfMemory, Status::Singular
    ///
    ///         the last failure when `Options::max_retries` attempts did not
    ///         succeed.
    ///
    /// Arguments:
    ///
    ///     sequence
    ///
    ///         size `n` array of the variables of the basis columns.
    ///
    ///     pivot_variable
    ///
    ///         size `n` array, on return the variable at each basis position.
    /// ```
    pub fn factorize(
        &mut self,
        basis: &BasisMatrix,
        sequence: &mut [usize],
        slack_offset: usize,
        pivot_variable: &mut [usize],
        ctx: &dyn FactorContext,
    ) -> Result<FactorSummary, Status> {
        let n = basis.dimension();
        assert_eq!(sequence.len(), n);
        assert_eq!(pivot_variable.len(), n);
        let target = ctx.log_target();
        self.select_engine(n);

        let mut current = basis.clone();
        let mut replaced = Vec::new();
        let mut last = Status::InvalidCall;
        for attempt in 1..=self.options.max_retries.max(1) {
            self.engine.get_areas(n, 0, 0);
            self.engine.pre_process(&current);
            match self.engine.factor(ctx) {
                Ok(()) => {
                    self.engine.post_process(sequence, pivot_variable);
                    if let Engine::Sparse(f) = &mut self.engine {
                        if f.compressions() > 10 {
                            let area_factor = f.area_factor() * 1.1;
                            debug!(
                                target: target,
                                "{} compressions, area factor now {:.2}",
                                f.compressions(),
                                area_factor
                            );
                            f.set_area_factor(area_factor);
                        }
                    }
                    return Ok(FactorSummary {
                        attempts: attempt,
                        replaced,
                        dense: self.is_dense(),
                    });
                }
                Err(Status::OutOfMemory) => {
                    if let Engine::Sparse(f) = &mut self.engine {
                        let area_factor = f.area_factor() * self.options.growth_factor();
                        warn!(
                            target: target,
                            "working area too small, area factor now {:.2}", area_factor
                        );
                        f.set_area_factor(area_factor);
                    }
                    last = Status::OutOfMemory;
                }
                Err(Status::Singular) => {
                    let pairs = self.engine.make_non_singular(sequence, slack_offset);
                    if pairs.is_empty() {
                        return Err(Status::Singular);
                    }
                    warn!(
                        target: target,
                        "replaced {} basis columns by slacks", pairs.len()
                    );
                    current = current.with_slacks(&pairs, self.options.slack_value);
                    replaced.extend(pairs);
                    last = Status::Singular;
                }
                Err(status) => return Err(status),
            }
        }
        warn!(target: target, "factorization failed after {} attempts", self.options.max_retries);
        Err(last)
    }

    /// FTRAN, see [`Factorization::update_column`].
    pub fn update_column(&mut self, vec: &mut SparseVector) -> Result<usize, Status> {
        self.engine.update_column(vec)
    }

    /// BTRAN, see [`Factorization::update_column_transpose`].
    pub fn update_column_transpose(&mut self, vec: &mut SparseVector) -> Result<usize, Status> {
        self.engine.update_column_transpose(vec)
    }

    /// See [`Factorization::replace_column`].
    pub fn replace_column(
        &mut self,
        column: &SparseVector,
        pivot_row: usize,
        pivot_check: f64,
    ) -> Result<(), Status> {
        self.engine.replace_column(column, pivot_row, pivot_check)
    }

    /// Basis position of column `column`.
    pub fn pivot_row_of(&self, column: usize) -> Option<usize> {
        self.engine.pivot_row_of(column)
    }

    pub fn pivots(&self) -> usize {
        self.engine.pivots()
    }

    pub fn needs_refactor(&self) -> bool {
        self.engine.needs_refactor()
    }

    /// Smallest over largest pivot magnitude of the last factorization.
    pub fn pivot_ratio(&self) -> f64 {
        match &self.engine {
            Engine::Dense(f) => f.pivot_ratio(),
            Engine::Sparse(f) => f.pivot_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_follows_dimension() {
        let mut f = BasisFactorization::new(Options::default());
        let mut sequence: Vec<usize> = (0..3).collect();
        let mut pivot_variable = vec![0; 3];
        let basis = BasisMatrix::slack_basis(3, 1.0);
        let summary = f
            .factorize(&basis, &mut sequence, 100, &mut pivot_variable, &())
            .unwrap();
        assert!(summary.dense);
        assert_eq!(summary.attempts, 1);
        assert_eq!(pivot_variable, vec![0, 1, 2]);

        let options = Options {
            dense_dimension_limit: 0,
            ..Options::default()
        };
        let mut f = BasisFactorization::new(options);
        let summary = f
            .factorize(&basis, &mut sequence, 100, &mut pivot_variable, &())
            .unwrap();
        assert!(!summary.dense);
        assert!(!f.is_dense());
    }

    #[test]
    fn singular_basis_gets_slacks() {
        // column 2 duplicates column 0
        let columns = vec![
            vec![(0, 1.0), (1, 2.0)],
            vec![(1, 1.0), (2, 1.0)],
            vec![(0, 1.0), (1, 2.0)],
        ];
        let basis = BasisMatrix::from_columns(3, &columns).unwrap();
        for limit in [0, 16] {
            let options = Options {
                dense_dimension_limit: limit,
                ..Options::default()
            };
            let mut f = BasisFactorization::new(options);
            let mut sequence = vec![10, 11, 12];
            let mut pivot_variable = vec![0; 3];
            let summary = f
                .factorize(&basis, &mut sequence, 100, &mut pivot_variable, &())
                .unwrap();
            assert_eq!(summary.attempts, 2);
            assert_eq!(summary.replaced.len(), 1);
            let (j, i) = summary.replaced[0];
            assert_eq!(sequence[j], 100 + i);
            assert_eq!(pivot_variable[i], 100 + i);
            let mut sorted = pivot_variable.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), 3);
        }
    }
}
