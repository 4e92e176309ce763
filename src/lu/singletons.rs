// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::lu::LU;
use crate::Status;
use std::time::Instant;

// Eliminate pivots with Markowitz cost zero.
//
// A column singleton puts the other entries of its row into U and leaves L
// empty. A row singleton puts the other entries of its column, divided by the
// pivot, into L and leaves U empty. We can either eliminate singleton columns
// before singleton rows or vice versa. When `singleton_bias >= 0`, then
// eliminate singleton columns first to keep `L` sparse. Otherwise eliminate
// singleton rows first. The resulting permutations make `PBQ'` of the form
//
//             \uuuuuuuuuuuuuuuuuuuuuuu
//              \u                    u
//               \u                   u
//                \u                  u
//                 \u                 u
//     PBQ' =       \uuuuuuu__________u               singleton columns before
//                   \     |          |               singleton rows
//                   l\    |          |
//                   ll\   |          |
//                   l l\  |   BUMP   |
//                   l  l\ |          |
//                   lllll\|__________|
//
// Eliminating a singleton column never creates a singleton row and vice versa,
// so one cascade of each kind leaves no singletons behind.
//
// Do not pivot on elements which are less than `abstol` in magnitude. Such
// rows and columns remain in the active submatrix for the Markowitz search.
pub(crate) fn singletons(lu: &mut LU) -> Result<(), Status> {
    let tic = Instant::now();
    let result = if lu.options.singleton_bias >= 0 {
        column_singletons(lu).and_then(|_| row_singletons(lu))
    } else {
        row_singletons(lu).and_then(|_| column_singletons(lu))
    };
    lu.time_singletons += tic.elapsed().as_secs_f64();
    result
}

fn column_singletons(lu: &mut LU) -> Result<(), Status> {
    let mut queue: Vec<usize> = lu.colcount.iter(1).collect();
    while let Some(j) = queue.pop() {
        if lu.qinv[j].is_some() || lu.cols.len(j) != 1 {
            continue;
        }
        let (i, x) = lu.cols.line(j)[0];
        if x.abs() < lu.abstol {
            continue;
        }
        pivot_column_singleton(lu, i, j, Some(&mut queue))?;
        lu.nsingletons += 1;
    }
    Ok(())
}

fn row_singletons(lu: &mut LU) -> Result<(), Status> {
    let mut queue: Vec<usize> = lu.rowcount.iter(1).collect();
    while let Some(i) = queue.pop() {
        if lu.pinv[i].is_some() || lu.rows.len(i) != 1 {
            continue;
        }
        let j = lu.rows.line(i)[0];
        let x = lu.find_in_column(j, i).map_or(0.0, |pos| lu.cols.line(j)[pos].1);
        if x.abs() < lu.abstol {
            continue;
        }
        pivot_row_singleton(lu, i, j, Some(&mut queue))?;
        lu.nsingletons += 1;
    }
    Ok(())
}

/// Pivot on `(i, j)` where column `j` has no other entry. Columns reduced to
/// a single entry are appended to `queue`.
pub(crate) fn pivot_column_singleton(
    lu: &mut LU,
    i: usize,
    j: usize,
    mut queue: Option<&mut Vec<usize>>,
) -> Result<(), Status> {
    assert_eq!(lu.cols.len(j), 1);
    let (row, piv) = lu.cols.line(j)[0];
    assert_eq!(row, i);
    lu.check_u(lu.rows.len(i) - 1)?;

    for t in 0..lu.rows.len(i) {
        let jj = lu.rows.line(i)[t];
        if jj == j {
            continue;
        }
        let pos = lu
            .find_in_column(jj, i)
            .unwrap_or_else(|| panic!("row {} missing in column {}", i, jj));
        let x = lu.cols.line(jj)[pos].1;
        lu.cols.swap_remove(jj, pos);
        lu.u_index.push(jj);
        lu.u_value.push(x);

        let nz = lu.cols.len(jj);
        lu.colcount.move_to(jj, nz);
        if x.abs() >= lu.col_max[jj] {
            lu.col_max[jj] = lu.column_max(jj);
        }
        if nz == 1 {
            if let Some(queue) = queue.as_mut() {
                queue.push(jj);
            }
        }
        lu.active_nz -= 1;
    }

    lu.cols.clear_line(j);
    lu.rows.clear_line(i);
    lu.colcount.remove(j);
    lu.rowcount.remove(i);
    lu.active_nz -= 1;
    lu.record_pivot(i, j, piv);
    Ok(())
}

/// Pivot on `(i, j)` where row `i` has no other entry. Rows reduced to a
/// single entry are appended to `queue`.
pub(crate) fn pivot_row_singleton(
    lu: &mut LU,
    i: usize,
    j: usize,
    mut queue: Option<&mut Vec<usize>>,
) -> Result<(), Status> {
    assert_eq!(lu.rows.len(i), 1);
    let pos = lu
        .find_in_column(j, i)
        .unwrap_or_else(|| panic!("row {} missing in column {}", i, j));
    let piv = lu.cols.line(j)[pos].1;
    let nz = lu.cols.len(j);
    lu.check_l(nz - 1)?;

    for t in 0..nz {
        let (ii, x) = lu.cols.line(j)[t];
        if ii == i {
            continue;
        }
        lu.l_index.push(ii);
        lu.l_value.push(x / piv);

        let pos = lu
            .find_in_row(ii, j)
            .unwrap_or_else(|| panic!("column {} missing in row {}", j, ii));
        lu.rows.swap_remove(ii, pos);
        let nz = lu.rows.len(ii);
        lu.rowcount.move_to(ii, nz);
        if nz == 1 {
            if let Some(queue) = queue.as_mut() {
                queue.push(ii);
            }
        }
        lu.active_nz -= 1;
    }
    lu.factor_flops += nz - 1;

    lu.cols.clear_line(j);
    lu.rows.clear_line(i);
    lu.colcount.remove(j);
    lu.rowcount.remove(i);
    lu.active_nz -= 1;
    lu.record_pivot(i, j, piv);
    Ok(())
}
