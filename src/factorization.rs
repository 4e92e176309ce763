// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::{BasisMatrix, SparseVector, Status};

/// Log target used until a [`FactorContext`] names another.
pub(crate) const DEFAULT_LOG_TARGET: &str = "basis_lu";

/// Hooks a simplex solver passes into `factor`. Only used for logging and
/// tolerance overrides.
pub trait FactorContext {
    /// Target of the log records of the factorization and of the solves
    /// and updates that use it.
    fn log_target(&self) -> &str {
        DEFAULT_LOG_TARGET
    }

    /// Pivot tolerance to use instead of the configured `default`.
    fn pivot_tolerance(&self, default: f64) -> f64 {
        default
    }
}

impl FactorContext for () {}

/// Contract between a simplex solver and an LU factorization of its basis.
///
/// The basis is given column by column in a [`BasisMatrix`]. Factorization
/// assigns each column a row, its basis position. All vectors passed to the
/// solves are indexed by row: for FTRAN the right-hand side is in row space
/// and the solution entry of column `j` is returned at the position of `j`;
/// for BTRAN the right-hand side entry of column `j` is read from the
/// position of `j` and the solution is returned in row space.
///
/// Control flow: `get_areas`, `pre_process`, `factor` and `post_process`
/// once per refactorization, then any number of `update_column`,
/// `update_column_transpose` and `replace_column` calls.
pub trait Factorization {
    /// Reserves storage for a basis of dimension `n` with room for about
    /// `max_l` and `max_u` nonzeros in L and U. Zero hints let the
    /// factorization choose. Insufficient space is only detected later, by
    /// `factor` returning [`Status::OutOfMemory`].
    fn get_areas(&mut self, n: usize, max_l: usize, max_u: usize);

    /// Loads the basis into the working arrays and discards the previous
    /// factorization and all column replacements.
    fn pre_process(&mut self, basis: &BasisMatrix);

    /// Factorizes the loaded basis.
    ///
    /// Returns [`Status::Singular`] with a partial result when some columns
    /// have no acceptable pivot (see `make_non_singular`), and
    /// [`Status::OutOfMemory`] when a working area is too small. In either
    /// case the basis must be loaded again before the next attempt.
    fn factor(&mut self, ctx: &dyn FactorContext) -> Result<(), Status>;

    /// Writes `pivot_variable[r] = sequence[j]` for the column `j` at basis
    /// position `r`. Also prepares the data used by later solves. Calling it
    /// repeatedly gives the same result.
    fn post_process(&mut self, sequence: &[usize], pivot_variable: &mut [usize]);

    /// Assigns each column that got no pivot an unused row `i` and sets
    /// `sequence[j] = slack_offset + i`. Returns the `(column, row)` pairs.
    fn make_non_singular(&self, sequence: &mut [usize], slack_offset: usize) -> Vec<(usize, usize)>;

    /// FTRAN: solves `B x = b` in place. Returns the number of nonzeros.
    fn update_column(&mut self, vec: &mut SparseVector) -> Result<usize, Status>;

    /// BTRAN: solves `B' y = c` in place. Returns the number of nonzeros.
    fn update_column_transpose(&mut self, vec: &mut SparseVector) -> Result<usize, Status>;

    /// Replaces the column at basis position `pivot_row`. `column` is the
    /// entering column after `update_column`, `pivot_check` its entry at
    /// `pivot_row`.
    ///
    /// Returns [`Status::SingularUpdate`] when `|pivot_check|` is below the
    /// zero tolerance and [`Status::UpdateRegionFull`] when no further
    /// replacement can be stored. The factorization is unchanged then.
    fn replace_column(
        &mut self,
        column: &SparseVector,
        pivot_row: usize,
        pivot_check: f64,
    ) -> Result<(), Status>;

    fn dimension(&self) -> usize;

    /// Number of pivots found by the last `factor`.
    fn rank(&self) -> usize;

    /// Number of column replacements since the last factorization.
    fn pivots(&self) -> usize;

    fn max_pivots(&self) -> usize;

    /// Basis position of column `column`, if it was pivoted.
    fn pivot_row_of(&self, column: usize) -> Option<usize>;

    /// Whether the update region is full.
    fn needs_refactor(&self) -> bool {
        self.pivots() >= self.max_pivots()
    }
}
