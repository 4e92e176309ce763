// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

/// Tuning parameters shared by the sparse and dense factorizations and the
/// driver that chooses between them.
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// A pivot element must be (in absolute value) greater than or equal to
    /// `pivot_tolerance` times the largest entry in its column. A value
    /// greater than or equal to 1.0 enforces partial pivoting. Default: 0.1
    pub pivot_tolerance: f64,

    /// Replaces `pivot_tolerance` for the single retry after no candidate
    /// passed the regular test. Default: 0.01
    pub relaxed_pivot_tolerance: f64,

    /// Entries which magnitude is less than or equal to the zero tolerance
    /// are removed during elimination, and a column replacement with a
    /// smaller diagonal check is rejected. Default: 1e-13
    pub zero_tolerance: f64,

    /// A pivot element must in absolute value be greater than or equal to
    /// `absolute_pivot_tolerance` before the tolerance is relaxed down to
    /// `zero_tolerance`. Default: 1e-11
    pub absolute_pivot_tolerance: f64,

    /// Multiplier applied to the area factor after a factorization ran out
    /// of working memory. Clamped to `1.1..=2.5`. Default: 2.0
    pub area_growth_factor: f64,

    /// Scales the area estimates computed from the basis. Default: 1.0
    pub initial_area_factor: f64,

    /// The sparse elimination hands the remaining block to the dense kernel
    /// once it is dense enough and its dimension exceeds this value. `None`
    /// disables the dense breakover. Default: Some(71)
    pub dense_breakover_threshold: Option<usize>,

    /// The breakover test runs only when the number of completed pivots is a
    /// multiple of this value. Default: 4
    pub dense_check_interval: usize,

    /// Bases with dimension up to this value are factorized densely
    /// throughout. Default: 16
    pub dense_dimension_limit: usize,

    /// Number of column replacements before the update region is full.
    /// Default: 200
    pub max_pivots_before_refactor: usize,

    /// Value of the single entry of a slack column. A column whose only
    /// entry equals plus or minus this value is pivoted while loading.
    /// Default: 1.0
    pub slack_value: f64,

    /// The Markowitz search is terminated after searching `max_search` rows
    /// or columns if a numerically stable pivot element has been found.
    /// Default: 4
    pub max_search: usize,

    /// If false, then the Markowitz search only scans columns. If true, then
    /// both columns and rows are searched in increasing order of number of
    /// entries. Default: true
    pub search_rows: bool,

    /// When this value is greater than or equal to zero, column singletons
    /// are eliminated before row singletons, keeping L sparse. Otherwise row
    /// singletons go first. Default: 1
    pub singleton_bias: i32,

    /// When a row or column cannot be updated in place, it is appended to
    /// the end of its area. For a line with nz elements, `pad` + nz *
    /// `stretch` elements extra space are added for later fill-in.
    /// Default: 4
    pub pad: usize,
    /// Default: 0.3
    pub stretch: f64,

    /// Minimum number of columns (rows) touched by one pivot before the
    /// updates are fanned out to the thread pool. Default: 64
    pub parallel_threshold: usize,

    /// Right-hand sides with at most this many nonzeros are solved by the
    /// depth-first sparse method, others by a sequential pass. `None` lets
    /// `post_process` choose from the dimension. Default: None
    pub sparse_threshold: Option<usize>,

    /// Number of factorization attempts before the driver gives up.
    /// Default: 8
    pub max_retries: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pivot_tolerance: 0.1,
            relaxed_pivot_tolerance: 0.01,
            zero_tolerance: 1e-13,
            absolute_pivot_tolerance: 1e-11,
            area_growth_factor: 2.0,
            initial_area_factor: 1.0,
            dense_breakover_threshold: Some(71),
            dense_check_interval: 4,
            dense_dimension_limit: 16,
            max_pivots_before_refactor: 200,
            slack_value: 1.0,
            max_search: 4,
            search_rows: true,
            singleton_bias: 1,
            pad: 4,
            stretch: 0.3,
            parallel_threshold: 64,
            sparse_threshold: None,
            max_retries: 8,
        }
    }
}

impl Options {
    pub(crate) fn growth_factor(&self) -> f64 {
        self.area_growth_factor.clamp(1.1, 2.5)
    }

    pub(crate) fn pivot_tolerance(&self) -> f64 {
        self.pivot_tolerance.clamp(f64::MIN_POSITIVE, 1.0)
    }

    pub(crate) fn check_interval(&self) -> usize {
        self.dense_check_interval.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_parameters() {
        let mut opts = Options::default();
        assert_eq!(opts.growth_factor(), 2.0);
        opts.area_growth_factor = 10.0;
        assert_eq!(opts.growth_factor(), 2.5);
        opts.area_growth_factor = 1.0;
        assert_eq!(opts.growth_factor(), 1.1);
        opts.pivot_tolerance = 3.0;
        assert_eq!(opts.pivot_tolerance(), 1.0);
        opts.dense_check_interval = 0;
        assert_eq!(opts.check_interval(), 1);
    }
}
