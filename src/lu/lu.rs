// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::file::LineFile;
use crate::lu::list::CountList;
use crate::factorization::DEFAULT_LOG_TARGET;
use crate::{Options, Status};

/// Phase of the factorization in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Task {
    #[default]
    NoTask,
    Loaded,
    Singletons,
    Markowitz,
    DenseBlock,
    BuildFactors,
    Factorized,
}

/// State of the sparse LU factorization.
///
/// During factorization the active submatrix is held twice: columnwise with
/// values in `cols` and rowwise (pattern only) in `rows`. Both are kept
/// consistent after each pivot. The factors are appended stage by stage:
///
/// - `l_index[l_begin[k]..l_begin[k+1]]`, `l_value[..]` hold the column of L
///   computed in stage `k` without the unit diagonal,
/// - `u_index[u_begin[k]..u_begin[k+1]]`, `u_value[..]` hold the row of U
///   computed in stage `k` without the pivot element,
/// - `pivot_inv[k]` holds the reciprocal of the pivot element.
///
/// While factorizing, L is indexed by rows and U by columns. `build_factors`
/// translates both to stages, so that the solves work on stage space.
#[derive(Debug, Clone, Default)]
pub(crate) struct LU {
    pub(crate) options: Options,
    pub(crate) m: usize,

    /// Multiplier of the area estimates.
    pub(crate) area_factor: f64,
    pub(crate) l_hint: usize,
    pub(crate) u_hint: usize,
    /// capacity of `l_index` and `l_value`
    pub(crate) l_mem: usize,
    /// capacity of `u_index` and `u_value`
    pub(crate) u_mem: usize,
    /// capacity of the row and column file
    pub(crate) w_mem: usize,

    // active submatrix //
    pub(crate) cols: LineFile<(usize, f64)>,
    pub(crate) rows: LineFile<usize>,
    pub(crate) colcount: CountList,
    pub(crate) rowcount: CountList,
    pub(crate) col_max: Vec<f64>,
    pub(crate) active_nz: usize,

    // pivot sequence //
    pub(crate) pinv: Vec<Option<usize>>, // stage in which row was pivot row
    pub(crate) qinv: Vec<Option<usize>>, // stage in which col was pivot col
    pub(crate) pivot_row: Vec<usize>,
    pub(crate) pivot_col: Vec<usize>,
    pub(crate) pivot_inv: Vec<f64>,

    // factors //
    pub(crate) l_begin: Vec<usize>,
    pub(crate) l_index: Vec<usize>,
    pub(crate) l_value: Vec<f64>,
    pub(crate) u_begin: Vec<usize>,
    pub(crate) u_index: Vec<usize>,
    pub(crate) u_value: Vec<f64>,

    // copies built by post_process: L rowwise, U columnwise, both in stage space
    pub(crate) lt_begin: Vec<usize>,
    pub(crate) lt_index: Vec<usize>,
    pub(crate) lt_value: Vec<f64>,
    pub(crate) ut_begin: Vec<usize>,
    pub(crate) ut_index: Vec<usize>,
    pub(crate) ut_value: Vec<f64>,
    pub(crate) transposed: bool,
    pub(crate) sparse_threshold: usize,

    // update etas in row space //
    pub(crate) r_begin: Vec<usize>,
    pub(crate) r_index: Vec<usize>,
    pub(crate) r_value: Vec<f64>,
    pub(crate) r_row: Vec<usize>,
    pub(crate) r_inv: Vec<f64>,
    pub(crate) r_mem: usize,

    // workspace //
    pub(crate) slot: Vec<usize>,
    pub(crate) work: Vec<f64>,
    pub(crate) marked: Vec<usize>,
    pub(crate) marker: usize,
    pub(crate) pattern: Vec<usize>,
    pub(crate) pstack: Vec<usize>,

    // state //
    pub(crate) task: Task,
    pub(crate) pending: Option<Status>,
    pub(crate) abstol: f64,
    pub(crate) reltol: f64,
    /// Log target of the last `factorize`.
    pub(crate) log_target: String,

    // statistics //
    pub(crate) nfactorize: usize,
    pub(crate) matrix_nz: usize,
    pub(crate) nslack: usize,
    pub(crate) nsingletons: usize,
    pub(crate) nsearch_pivot: usize,
    pub(crate) nrelaxed: usize,
    pub(crate) nexpand: usize,
    pub(crate) dense_size: usize,
    pub(crate) factor_flops: usize,
    pub(crate) l_nz: usize,
    pub(crate) u_nz: usize,
    pub(crate) min_pivot: f64,
    pub(crate) max_pivot: f64,
    pub(crate) l_flops: usize,
    pub(crate) u_flops: usize,
    pub(crate) r_flops: usize,
    pub(crate) nsparse_solves: usize,
    pub(crate) time_factorize: f64,
    pub(crate) time_singletons: f64,
    pub(crate) time_search_pivot: f64,
    pub(crate) time_elim_pivot: f64,
    pub(crate) time_solve: f64,
}

impl LU {
    pub(crate) fn new(options: Options) -> Self {
        Self {
            area_factor: options.initial_area_factor.max(f64::MIN_POSITIVE),
            options,
            log_target: DEFAULT_LOG_TARGET.to_owned(),
            ..Default::default()
        }
    }

    /// Resize the dimension dependent arrays for matrices of dimension `m`.
    pub(crate) fn resize(&mut self, m: usize) {
        self.m = m;
        self.colcount.reset(m, m + 2);
        self.rowcount.reset(m, m + 2);
        self.col_max.clear();
        self.col_max.resize(m, 0.0);
        self.pinv.clear();
        self.pinv.resize(m, None);
        self.qinv.clear();
        self.qinv.resize(m, None);
        self.slot.clear();
        self.slot.resize(m, usize::MAX);
        self.work.clear();
        self.work.resize(m, 0.0);
        self.marked.clear();
        self.marked.resize(m, 0);
        self.marker = 0;
        self.pattern.clear();
        self.pattern.resize(m, 0);
        self.pstack.clear();
        self.pstack.resize(m, 0);
    }

    pub(crate) fn rank(&self) -> usize {
        self.pivot_row.len()
    }

    /// Discard the pivot sequence, factors and update etas.
    pub(crate) fn clear_factors(&mut self) {
        self.pivot_row.clear();
        self.pivot_col.clear();
        self.pivot_inv.clear();
        self.pinv.fill(None);
        self.qinv.fill(None);
        self.l_begin.clear();
        self.l_begin.push(0);
        self.l_index.clear();
        self.l_value.clear();
        self.u_begin.clear();
        self.u_begin.push(0);
        self.u_index.clear();
        self.u_value.clear();
        self.transposed = false;
        self.clear_etas();
    }

    pub(crate) fn clear_etas(&mut self) {
        self.r_begin.clear();
        self.r_begin.push(0);
        self.r_index.clear();
        self.r_value.clear();
        self.r_row.clear();
        self.r_inv.clear();
    }

    /// Fail unless `extra` more entries fit into L.
    pub(crate) fn check_l(&self, extra: usize) -> Result<(), Status> {
        if self.l_index.len() + extra > self.l_mem {
            Err(Status::OutOfMemory)
        } else {
            Ok(())
        }
    }

    /// Fail unless `extra` more entries fit into U.
    pub(crate) fn check_u(&self, extra: usize) -> Result<(), Status> {
        if self.u_index.len() + extra > self.u_mem {
            Err(Status::OutOfMemory)
        } else {
            Ok(())
        }
    }

    /// Close the current stage with pivot `(i, j)` of value `piv`. The L
    /// column and U row of the stage must have been appended.
    pub(crate) fn record_pivot(&mut self, i: usize, j: usize, piv: f64) {
        let k = self.rank();
        self.pinv[i] = Some(k);
        self.qinv[j] = Some(k);
        self.pivot_row.push(i);
        self.pivot_col.push(j);
        self.pivot_inv.push(1.0 / piv);
        self.l_begin.push(self.l_index.len());
        self.u_begin.push(self.u_index.len());
        self.min_pivot = self.min_pivot.min(piv.abs());
        self.max_pivot = self.max_pivot.max(piv.abs());
    }

    /// Largest magnitude in the active part of column `j`.
    pub(crate) fn column_max(&self, j: usize) -> f64 {
        self.cols
            .line(j)
            .iter()
            .fold(0.0, |m, &(_, x)| f64::max(m, x.abs()))
    }

    /// Offset of row `i` in the column file line of column `j`.
    pub(crate) fn find_in_column(&self, j: usize, i: usize) -> Option<usize> {
        self.cols.line(j).iter().position(|&(k, _)| k == i)
    }

    /// Offset of column `j` in the row file line of row `i`.
    pub(crate) fn find_in_row(&self, i: usize, j: usize) -> Option<usize> {
        self.rows.line(i).iter().position(|&k| k == j)
    }

    /// Number of compressions of the row and column file in this
    /// factorization.
    pub(crate) fn compressions(&self) -> usize {
        self.cols.compressions() + self.rows.compressions()
    }

    pub(crate) fn next_marker(&mut self) -> usize {
        self.marker += 1;
        if self.marker == usize::MAX {
            self.marked.fill(0);
            self.marker = 1;
        }
        self.marker
    }

    /// Check that the row and column file and the count lists agree.
    #[cfg(any(test, feature = "debug"))]
    pub(crate) fn check_consistency(&self) -> bool {
        let m = self.m;
        let mut nz = 0;
        for j in 0..m {
            let line = self.cols.line(j);
            if self.qinv[j].is_some() {
                if !line.is_empty() || self.colcount.contains(j) {
                    return false;
                }
                continue;
            }
            nz += line.len();
            for &(i, _) in line {
                if self.pinv[i].is_some() || self.find_in_row(i, j).is_none() {
                    return false;
                }
            }
        }
        for i in 0..m {
            if self.pinv[i].is_some() {
                if !self.rows.line(i).is_empty() || self.rowcount.contains(i) {
                    return false;
                }
                continue;
            }
            for &j in self.rows.line(i) {
                if self.find_in_column(j, i).is_none() {
                    return false;
                }
            }
        }
        for list in 0..=m {
            if self.colcount.iter(list).any(|j| self.cols.len(j) != list) {
                return false;
            }
            if self.rowcount.iter(list).any(|i| self.rows.len(i) != list) {
                return false;
            }
        }
        nz == self.active_nz
    }
}
