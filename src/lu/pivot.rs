// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::lu::LU;
use crate::lu::singletons::{pivot_column_singleton, pivot_row_singleton};
use crate::Status;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

// Pivot elimination in the active submatrix.
//
// With pivot column `c` holding rows `P` (besides the pivot row `r`) and pivot
// row `r` holding columns `Q` (besides `c`), every column `j` in `Q` is
// updated by
//
//     a[i,j] -= l[i] * a[r,j]     for i in P,   l[i] = a[i,c] / a[r,c]
//
// The columns in `Q` are disjoint, so their new contents are computed in one
// fan-out, each task reading the shared multipliers. After the join the new
// columns are written back to the column file one after another. A second
// fan-out computes the new patterns of the rows in `P`: entries outside `Q`
// and `c` are kept as they are, the entries in `Q` are taken from the updated
// columns. Columns of `Q` are found through `marked`, so each row costs time
// linear in its length. The row patterns are again written back sequentially.
//
// Entries with magnitude at or below `zero_tolerance` are dropped.
pub(crate) fn pivot(lu: &mut LU, r: usize, c: usize) -> Result<(), Status> {
    if lu.cols.len(c) == 1 {
        return pivot_column_singleton(lu, r, c, None);
    }
    if lu.rows.len(r) == 1 {
        return pivot_row_singleton(lu, r, c, None);
    }

    let pos = lu
        .find_in_column(c, r)
        .unwrap_or_else(|| panic!("pivot ({}, {}) not in active submatrix", r, c));
    let piv = lu.cols.line(c)[pos].1;
    let mult: Vec<(usize, f64)> = lu
        .cols
        .line(c)
        .iter()
        .filter(|&&(i, _)| i != r)
        .map(|&(i, x)| (i, x / piv))
        .collect();
    let urow: Vec<(usize, f64)> = lu
        .rows
        .line(r)
        .iter()
        .filter(|&&j| j != c)
        .map(|&j| {
            let x = lu.find_in_column(j, r).map_or(0.0, |pos| lu.cols.line(j)[pos].1);
            (j, x)
        })
        .collect();
    lu.check_l(mult.len())?;
    lu.check_u(urow.len())?;

    for (q, &(i, _)) in mult.iter().enumerate() {
        lu.slot[i] = q;
    }
    let result = eliminate(lu, r, c, &mult, &urow);
    for &(i, _) in &mult {
        lu.slot[i] = usize::MAX;
    }
    result?;

    lu.l_index.extend(mult.iter().map(|&(i, _)| i));
    lu.l_value.extend(mult.iter().map(|&(_, l)| l));
    lu.u_index.extend(urow.iter().map(|&(j, _)| j));
    lu.u_value.extend(urow.iter().map(|&(_, u)| u));

    lu.active_nz -= lu.cols.len(c);
    lu.cols.clear_line(c);
    lu.rows.clear_line(r);
    lu.colcount.remove(c);
    lu.rowcount.remove(r);
    lu.record_pivot(r, c, piv);
    Ok(())
}

// New contents of one column of the active submatrix.
struct ColumnUpdate {
    col: usize,
    entries: Vec<(usize, f64)>,
    max: f64,
    flops: usize,
}

fn eliminate(
    lu: &mut LU,
    r: usize,
    c: usize,
    mult: &[(usize, f64)],
    urow: &[(usize, f64)],
) -> Result<(), Status> {
    let droptol = lu.options.zero_tolerance;
    let threshold = lu.options.parallel_threshold;
    let (pad, stretch) = (lu.options.pad, lu.options.stretch);

    let updates = {
        let cols = &lu.cols;
        let slot = &lu.slot[..];
        fan_out(urow, threshold, |&(j, urj)| {
            update_column(cols.line(j), j, urj, r, slot, mult, droptol)
        })
    };

    let marker = lu.next_marker();
    lu.marked[c] = marker;
    for &(j, _) in urow {
        lu.marked[j] = marker;
    }

    let mut kept: Vec<Vec<usize>> = vec![Vec::new(); mult.len()];
    for update in &updates {
        let j = update.col;
        for &(i, _) in &update.entries {
            let q = lu.slot[i];
            if q != usize::MAX {
                kept[q].push(j);
            }
        }
        let old_nz = lu.cols.len(j);
        if update.entries.len() > old_nz {
            lu.nexpand += 1;
        }
        lu.cols.set_line(j, &update.entries, pad, stretch)?;
        lu.active_nz = lu.active_nz + update.entries.len() - old_nz;
        lu.col_max[j] = update.max;
        lu.colcount.move_to(j, update.entries.len());
        lu.factor_flops += update.flops;
    }

    let jobs: Vec<usize> = (0..mult.len()).collect();
    let patterns = {
        let rows = &lu.rows;
        let marked = &lu.marked[..];
        fan_out(&jobs, threshold, |&q| {
            update_row(rows.line(mult[q].0), marked, marker, &kept[q])
        })
    };
    for (q, pattern) in patterns.iter().enumerate() {
        let i = mult[q].0;
        if pattern.len() > lu.rows.len(i) {
            lu.nexpand += 1;
        }
        lu.rows.set_line(i, pattern, pad, stretch)?;
        lu.rowcount.move_to(i, pattern.len());
    }
    Ok(())
}

// Run `task` on every item, on the thread pool when there are at least
// `threshold` items.
fn fan_out<T, R, F>(items: &[T], threshold: usize, task: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        if items.len() >= threshold {
            return items.par_iter().map(task).collect();
        }
    }
    #[cfg(not(feature = "parallel"))]
    let _ = threshold;
    items.iter().map(task).collect()
}

// Subtract `urj` times the multipliers from column `col` and remove the pivot
// row. `slot[i]` is the position of row `i` in `mult`, or `usize::MAX`.
fn update_column(
    old: &[(usize, f64)],
    col: usize,
    urj: f64,
    r: usize,
    slot: &[usize],
    mult: &[(usize, f64)],
    droptol: f64,
) -> ColumnUpdate {
    let mut seen = vec![false; mult.len()];
    let mut entries = Vec::with_capacity(old.len() + mult.len());
    let mut max = 0.0;
    let mut flops = 0;

    for &(i, x) in old {
        if i == r {
            continue;
        }
        let q = slot[i];
        if q == usize::MAX {
            entries.push((i, x));
            max = f64::max(max, x.abs());
            continue;
        }
        seen[q] = true;
        let x = x - mult[q].1 * urj;
        flops += 1;
        if x.abs() > droptol {
            entries.push((i, x));
            max = f64::max(max, x.abs());
        }
    }
    for (q, &(i, l)) in mult.iter().enumerate() {
        if seen[q] {
            continue;
        }
        let x = -l * urj;
        flops += 1;
        if x.abs() > droptol {
            entries.push((i, x));
            max = f64::max(max, x.abs());
        }
    }

    ColumnUpdate {
        col,
        entries,
        max,
        flops,
    }
}

// Pattern of a row in P after the pivot: the entries in columns not marked
// with `marker`, followed by the columns of Q that still hold the row.
fn update_row(old: &[usize], marked: &[usize], marker: usize, kept: &[usize]) -> Vec<usize> {
    let mut pattern: Vec<usize> = old
        .iter()
        .copied()
        .filter(|&j| marked[j] != marker)
        .collect();
    pattern.extend_from_slice(kept);
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lu::load::load;
    use crate::{BasisMatrix, Options};

    fn loaded(columns: &[Vec<(usize, f64)>]) -> LU {
        let mut lu = LU::new(Options::default());
        load(&mut lu, &BasisMatrix::from_columns(columns.len(), columns).unwrap());
        lu
    }

    fn sorted(line: &[usize]) -> Vec<usize> {
        let mut line = line.to_vec();
        line.sort_unstable();
        line
    }

    #[test]
    fn column_update_fill_and_cancellation() {
        // pivot row 0, multipliers for rows 1 and 2
        let slot = vec![usize::MAX, 0, 1, usize::MAX];
        let mult = vec![(1, 0.5), (2, 2.0)];
        let old = vec![(0, 2.0), (1, 1.0), (3, 7.0)];
        let update = update_column(&old, 5, 2.0, 0, &slot, &mult, 1e-13);
        assert_eq!(update.col, 5);
        assert_eq!(update.entries, vec![(3, 7.0), (2, -4.0)]);
        assert_eq!(update.max, 7.0);
    }

    #[test]
    fn row_update() {
        let mut marked = vec![0; 10];
        for j in [1, 2, 7] {
            marked[j] = 3;
        }
        assert_eq!(update_row(&[4, 1, 2, 7], &marked, 3, &[2, 9]), vec![4, 2, 9]);
        assert_eq!(update_row(&[4, 1, 2, 7], &marked, 4, &[]), vec![4, 1, 2, 7]);
    }

    #[test]
    fn pivot_updates_rows_with_fill_and_cancellation() {
        let mut lu = loaded(&[
            vec![(0, 1.0), (1, 1.0), (2, 1.0)],
            vec![(0, 1.0), (1, 1.0), (2, 2.0)],
            vec![(0, 2.0), (2, 4.0)],
        ]);
        pivot(&mut lu, 0, 0).unwrap();
        assert!(lu.check_consistency());
        assert_eq!(lu.rank(), 1);

        // a[1,1] cancels, a[1,2] fills in
        assert_eq!(lu.cols.line(1), &[(2, 1.0)]);
        let mut col2 = lu.cols.line(2).to_vec();
        col2.sort_by_key(|&(i, _)| i);
        assert_eq!(col2, vec![(1, -2.0), (2, 2.0)]);
        assert_eq!(sorted(lu.rows.line(1)), vec![2]);
        assert_eq!(sorted(lu.rows.line(2)), vec![1, 2]);
        assert_eq!(lu.active_nz, 3);
    }

    #[test]
    #[should_panic(expected = "not in active submatrix")]
    fn pivot_outside_pattern_panics() {
        let mut lu = loaded(&[
            vec![(0, 1.0), (1, 1.0)],
            vec![(0, 1.0), (2, 2.0)],
            vec![(1, 2.0), (2, 4.0)],
        ]);
        pivot(&mut lu, 2, 0).unwrap();
    }
}
