// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::dense::dense_lu;
use crate::lu::lu::LU;
use crate::Status;
use log::trace;

// Dense breakover
//
// The remaining active submatrix of dimension `left = m - rank` is handed to
// the dense kernel when
//
//     left > dense_breakover_threshold  and  ratio * nnz(active) > left^2,
//
// where `ratio` grows with `left` (1.5 up to 256, 2 up to 800, 3 up to 2000,
// 4 above), and every remaining column is nonempty. The test runs only when
// `rank` is a multiple of `dense_check_interval`.
pub(crate) fn dense_breakover_due(lu: &LU) -> bool {
    let threshold = match lu.options.dense_breakover_threshold {
        Some(threshold) => threshold,
        None => return false,
    };
    let rank = lu.rank();
    if rank % lu.options.check_interval() != 0 {
        return false;
    }
    let left = lu.m - rank;
    if left == 0 || left <= threshold {
        return false;
    }
    let ratio = if left > 2000 {
        4.0
    } else if left > 800 {
        3.0
    } else if left > 256 {
        2.0
    } else {
        1.5
    };
    let full = (left * left) as f64;
    if ratio * (lu.active_nz as f64) <= full {
        return false;
    }
    let nonempty = (0..lu.m)
        .filter(|&j| lu.qinv[j].is_none() && lu.cols.len(j) > 0)
        .count();
    nonempty == left
}

/// Factorize the remaining active submatrix with the dense kernel and append
/// the result to L and U. Columns without an acceptable pivot stay
/// unpivoted.
pub(crate) fn factorize_dense_block(lu: &mut LU, target: &str) -> Result<(), Status> {
    let m = lu.m;
    let active_rows: Vec<usize> = (0..m).filter(|&i| lu.pinv[i].is_none()).collect();
    let active_cols: Vec<usize> = (0..m).filter(|&j| lu.qinv[j].is_none()).collect();
    let d = active_rows.len();
    assert_eq!(d, active_cols.len());

    let extra = d * d.saturating_sub(1) / 2;
    lu.check_l(extra)?;
    lu.check_u(extra)?;

    for (k, &i) in active_rows.iter().enumerate() {
        lu.slot[i] = k;
    }
    let mut block = vec![0.0; d * d];
    for (k, &j) in active_cols.iter().enumerate() {
        for &(i, x) in lu.cols.line(j) {
            block[k * d + lu.slot[i]] = x;
        }
    }
    for &i in &active_rows {
        lu.slot[i] = usize::MAX;
    }

    let result = dense_lu(
        &mut block,
        d,
        d,
        lu.options.zero_tolerance,
        lu.options.parallel_threshold,
    );
    trace!(
        target: target,
        "dense block of dimension {} at stage {}, rank {}",
        d,
        lu.rank(),
        result.rank
    );

    for q in 0..result.rank {
        let i = active_rows[result.perm[q]];
        let j = active_cols[result.cols[q]];
        for t in q + 1..d {
            let x = block[q * d + t];
            if x != 0.0 {
                lu.l_index.push(active_rows[result.perm[t]]);
                lu.l_value.push(x);
            }
        }
        for t in q + 1..d {
            let x = block[t * d + q];
            if x != 0.0 {
                lu.u_index.push(active_cols[result.cols[t]]);
                lu.u_value.push(x);
            }
        }
        lu.record_pivot(i, j, block[q * d + q]);
    }

    for &j in &active_cols {
        lu.cols.clear_line(j);
        lu.colcount.remove(j);
    }
    for &i in &active_rows {
        lu.rows.clear_line(i);
        lu.rowcount.remove(i);
    }
    lu.active_nz = 0;
    lu.dense_size = d;
    lu.factor_flops += result.flops;
    Ok(())
}
