// Copyright (C) 2016-2019 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::lu::LU;
use crate::Status;

// Search for pivot element with small Markowitz cost. An eligible pivot
// must be nonzero and satisfy
//
// 1. `abs(piv) >= abstol`,
// 2. `abs(piv) >= reltol * max[pivot column]`.
//
// From all eligible pivots search for one that minimizes
//
//     mc := (nnz[pivot row] - 1) * (nnz[pivot column] - 1).
//
// Columns and rows are visited in increasing order of their count. The search
// is terminated when `max_search` rows or columns with eligible pivots have
// been searched (if not before).
//
// Returns the row and column of the cheapest pivot found. When the active
// submatrix has entries but none is eligible, `NearSingular` is returned. When
// it has no entries, `None` is returned.
//
// A row that has entries with cost below the best found so far, none of which
// is eligible, is moved to list `m+1` and not searched again until it is
// updated.
//
// The Markowitz search is implemented as described in [1].
//
// [1] U. Suhl, L. Suhl, "Computing Sparse LU Factorizations for Large-Scale
//     Linear Programming Bases", ORSA Journal on Computing (1990)
pub(crate) fn markowitz(lu: &mut LU) -> Result<Option<(usize, usize)>, Status> {
    let m = lu.m;
    let abstol = lu.abstol;
    let reltol = lu.reltol;
    let max_search = lu.options.max_search.max(1);
    let search_rows = lu.options.search_rows;

    // integers for Markowitz cost are 64 bit to prevent overflow
    let mut mc = u64::MAX;
    let mut best: Option<(usize, usize)> = None;
    let mut nsearch = 0;

    let min_colnz = lu.colcount.min_nonempty().filter(|&nz| nz <= m);
    let min_rownz = if search_rows {
        lu.rowcount.min_nonempty().filter(|&nz| nz <= m)
    } else {
        None
    };
    let nz_start = match (min_colnz, min_rownz) {
        (Some(c), Some(r)) => c.min(r),
        (Some(c), None) => c,
        (None, Some(r)) => r,
        (None, None) => m + 1,
    };

    'search: for nz in nz_start..=m {
        let nz1 = nz as u64;

        // Search columns with nz nonzeros.
        let mut next = lu.colcount.first(nz);
        while let Some(j) = next {
            next = lu.colcount.next(j);
            let cmx = lu.col_max[j];
            if cmx == 0.0 || cmx < abstol {
                continue;
            }
            let tol = f64::max(abstol, reltol * cmx);
            for &(i, x) in lu.cols.line(j) {
                if x.abs() < tol {
                    continue;
                }
                let nz2 = lu.rows.len(i) as u64;
                let cost = (nz1 - 1) * nz2.saturating_sub(1);
                if cost < mc {
                    mc = cost;
                    best = Some((i, j));
                    if search_rows && mc <= (nz1 - 1) * (nz1 - 1) {
                        break 'search;
                    }
                }
            }
            nsearch += 1;
            if nsearch >= max_search && best.is_some() {
                break 'search;
            }
        }

        if !search_rows {
            continue;
        }

        // Search rows with nz nonzeros.
        let mut next = lu.rowcount.first(nz);
        while let Some(i) = next {
            // the row may be moved to the rejected list below
            next = lu.rowcount.next(i);
            let mut cheap = false; // row has entries with cost < mc?
            let mut found = false; // eligible pivot found?
            for &j in lu.rows.line(i) {
                let nz2 = lu.cols.len(j) as u64;
                let cost = (nz1 - 1) * nz2.saturating_sub(1);
                if cost >= mc {
                    continue;
                }
                cheap = true;
                let cmx = lu.col_max[j];
                if cmx == 0.0 || cmx < abstol {
                    continue;
                }
                let x = lu
                    .find_in_column(j, i)
                    .map_or(0.0, |pos| lu.cols.line(j)[pos].1.abs());
                if x >= abstol && x >= reltol * cmx {
                    found = true;
                    mc = cost;
                    best = Some((i, j));
                    if mc <= nz1 * (nz1 - 1) {
                        break 'search;
                    }
                }
            }
            if cheap && !found {
                lu.rowcount.move_to(i, m + 1);
            } else {
                nsearch += 1;
                if nsearch >= max_search && best.is_some() {
                    break 'search;
                }
            }
        }
    }

    lu.nsearch_pivot += nsearch;
    match best {
        Some(pivot) => Ok(Some(pivot)),
        None if lu.active_nz > 0 => Err(Status::NearSingular),
        None => Ok(None),
    }
}

/// Return rows from the rejected list to the list of their count.
pub(crate) fn restore_rejected_rows(lu: &mut LU) {
    let m = lu.m;
    while let Some(i) = lu.rowcount.first(m + 1) {
        let nz = lu.rows.len(i);
        lu.rowcount.move_to(i, nz);
    }
}
