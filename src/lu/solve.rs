// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::dfs::{solve_symbolic, solve_triangular};
use crate::lu::lu::{Task, LU};
use crate::sparse_vector::PLACEHOLDER;
use crate::{SparseVector, Status};
use std::time::Instant;

// Solves with the factored basis.
//
// Right-hand sides are gathered from row space into stage space by the pivot
// rows, solved with L and U, and scattered back by the pivot rows. The etas
// of column replacements then act on row space.
//
// A right-hand side with at most `sparse_threshold` nonzeros is solved by
// the depth-first path, which touches only the entries in the reach of its
// pattern. All others are solved by a sequential pass over all stages.

fn check_solvable(lu: &LU, vec: &SparseVector) -> Result<(), Status> {
    if lu.task != Task::Factorized {
        return Err(Status::InvalidCall);
    }
    if lu.r_row.len() > lu.options.max_pivots_before_refactor || lu.r_index.len() > lu.r_mem {
        return Err(Status::UpdateOverflow);
    }
    assert_eq!(vec.dimension(), lu.m, "vector dimension mismatch");
    Ok(())
}

fn use_sparse_path(lu: &LU, nz: usize) -> bool {
    lu.transposed && nz <= lu.sparse_threshold
}

/// FTRAN: overwrite `vec` with the solution of `B x = b`.
pub(crate) fn ftran(lu: &mut LU, vec: &mut SparseVector) -> Result<usize, Status> {
    check_solvable(lu, vec)?;
    let tic = Instant::now();
    let packed = vec.is_packed();
    {
        let (x, indices) = vec.parts_mut();
        if use_sparse_path(lu, indices.len()) {
            ftran_sparse(lu, x, indices);
            lu.nsparse_solves += 1;
        } else {
            ftran_dense(lu, x, indices);
        }
        apply_etas(lu, x, indices);
    }
    let nz = vec.clean(lu.options.zero_tolerance);
    if packed {
        vec.pack();
    }
    lu.time_solve += tic.elapsed().as_secs_f64();
    Ok(nz)
}

/// BTRAN: overwrite `vec` with the solution of `B' y = c`.
pub(crate) fn btran(lu: &mut LU, vec: &mut SparseVector) -> Result<usize, Status> {
    check_solvable(lu, vec)?;
    let tic = Instant::now();
    let packed = vec.is_packed();
    {
        let (x, indices) = vec.parts_mut();
        apply_etas_transpose(lu, x, indices);
        indices.retain(|&i| x[i] != 0.0);
        if use_sparse_path(lu, indices.len()) {
            btran_sparse(lu, x, indices);
            lu.nsparse_solves += 1;
        } else {
            btran_dense(lu, x, indices);
        }
    }
    let nz = vec.clean(lu.options.zero_tolerance);
    if packed {
        vec.pack();
    }
    lu.time_solve += tic.elapsed().as_secs_f64();
    Ok(nz)
}

// Move the right-hand side from row space into `work`. Returns the stages
// holding nonzeros.
fn gather(lu: &mut LU, x: &mut [f64], indices: &mut Vec<usize>) -> Vec<usize> {
    let mut stages = Vec::with_capacity(indices.len());
    for &i in indices.iter() {
        if let Some(k) = lu.pinv[i] {
            if x[i] != 0.0 {
                lu.work[k] = x[i];
                stages.push(k);
            }
        }
        x[i] = 0.0;
    }
    indices.clear();
    stages
}

// Move the stages in `order` from `work` back to row space.
fn scatter(lu: &mut LU, order: &[usize], x: &mut [f64], indices: &mut Vec<usize>) {
    for &k in order {
        let value = lu.work[k];
        if value != 0.0 {
            let i = lu.pivot_row[k];
            x[i] = value;
            indices.push(i);
        }
        lu.work[k] = 0.0;
    }
}

// Reach of `rhs` in the graph `begin`, `index`.
fn reach(lu: &mut LU, rhs: &[usize], graph: Graph) -> Vec<usize> {
    let marker = lu.next_marker();
    let (begin, index) = match graph {
        Graph::L => (&lu.l_begin, &lu.l_index),
        Graph::Lt => (&lu.lt_begin, &lu.lt_index),
        Graph::U => (&lu.u_begin, &lu.u_index),
        Graph::Ut => (&lu.ut_begin, &lu.ut_index),
    };
    let top = solve_symbolic(
        rhs,
        begin,
        index,
        &mut lu.pattern,
        &mut lu.pstack,
        &mut lu.marked,
        marker,
    );
    lu.pattern[top..].to_vec()
}

#[derive(Clone, Copy)]
enum Graph {
    L,
    Lt,
    U,
    Ut,
}

fn ftran_sparse(lu: &mut LU, x: &mut [f64], indices: &mut Vec<usize>) {
    let rhs = gather(lu, x, indices);

    let order = reach(lu, &rhs, Graph::L);
    lu.l_flops += solve_triangular(&order, &lu.l_begin, &lu.l_index, &lu.l_value, None, &mut lu.work);

    let rhs: Vec<usize> = order.into_iter().filter(|&k| lu.work[k] != 0.0).collect();
    let order = reach(lu, &rhs, Graph::Ut);
    lu.u_flops += solve_triangular(
        &order,
        &lu.ut_begin,
        &lu.ut_index,
        &lu.ut_value,
        Some(&lu.pivot_inv[..]),
        &mut lu.work,
    );

    scatter(lu, &order, x, indices);
}

fn ftran_dense(lu: &mut LU, x: &mut [f64], indices: &mut Vec<usize>) {
    let m = lu.m;
    gather(lu, x, indices);
    let work = &mut lu.work;

    // L solve by columns
    let mut flops = 0;
    for k in 0..m {
        let wk = work[k];
        if wk == 0.0 {
            continue;
        }
        for pos in lu.l_begin[k]..lu.l_begin[k + 1] {
            work[lu.l_index[pos]] -= lu.l_value[pos] * wk;
        }
        flops += lu.l_begin[k + 1] - lu.l_begin[k];
    }
    lu.l_flops += flops;

    // U solve by rows
    let mut flops = 0;
    for k in (0..m).rev() {
        let mut wk = work[k];
        for pos in lu.u_begin[k]..lu.u_begin[k + 1] {
            wk -= lu.u_value[pos] * work[lu.u_index[pos]];
        }
        flops += lu.u_begin[k + 1] - lu.u_begin[k];
        work[k] = wk * lu.pivot_inv[k];
    }
    lu.u_flops += flops;

    let order: Vec<usize> = (0..m).collect();
    scatter(lu, &order, x, indices);
}

fn btran_sparse(lu: &mut LU, x: &mut [f64], indices: &mut Vec<usize>) {
    let rhs = gather(lu, x, indices);

    let order = reach(lu, &rhs, Graph::U);
    lu.u_flops += solve_triangular(
        &order,
        &lu.u_begin,
        &lu.u_index,
        &lu.u_value,
        Some(&lu.pivot_inv[..]),
        &mut lu.work,
    );

    let rhs: Vec<usize> = order.into_iter().filter(|&k| lu.work[k] != 0.0).collect();
    let order = reach(lu, &rhs, Graph::Lt);
    lu.l_flops += solve_triangular(&order, &lu.lt_begin, &lu.lt_index, &lu.lt_value, None, &mut lu.work);

    scatter(lu, &order, x, indices);
}

fn btran_dense(lu: &mut LU, x: &mut [f64], indices: &mut Vec<usize>) {
    let m = lu.m;
    gather(lu, x, indices);
    let work = &mut lu.work;

    // U' solve by rows of U
    let mut flops = 0;
    for k in 0..m {
        if work[k] == 0.0 {
            continue;
        }
        let wk = work[k] * lu.pivot_inv[k];
        work[k] = wk;
        for pos in lu.u_begin[k]..lu.u_begin[k + 1] {
            work[lu.u_index[pos]] -= lu.u_value[pos] * wk;
        }
        flops += lu.u_begin[k + 1] - lu.u_begin[k] + 1;
    }
    lu.u_flops += flops;

    // L' solve by columns of L
    let mut flops = 0;
    for k in (0..m).rev() {
        let mut wk = work[k];
        for pos in lu.l_begin[k]..lu.l_begin[k + 1] {
            wk -= lu.l_value[pos] * work[lu.l_index[pos]];
        }
        flops += lu.l_begin[k + 1] - lu.l_begin[k];
        work[k] = wk;
    }
    lu.l_flops += flops;

    let order: Vec<usize> = (0..m).collect();
    scatter(lu, &order, x, indices);
}

// Apply the etas in the order they were stored. An entry that cancels to
// zero keeps a placeholder so that `indices` stays a superset of the
// nonzeros.
fn apply_etas(lu: &mut LU, x: &mut [f64], indices: &mut Vec<usize>) {
    let mut flops = 0;
    for e in 0..lu.r_row.len() {
        let r = lu.r_row[e];
        let xr = x[r];
        if xr == 0.0 || xr == PLACEHOLDER {
            continue;
        }
        for pos in lu.r_begin[e]..lu.r_begin[e + 1] {
            let i = lu.r_index[pos];
            let xi = x[i];
            if xi == 0.0 {
                indices.push(i);
            }
            let xi = xi - lu.r_value[pos] * xr;
            x[i] = if xi == 0.0 { PLACEHOLDER } else { xi };
        }
        let xr = xr * lu.r_inv[e];
        x[r] = if xr == 0.0 { PLACEHOLDER } else { xr };
        flops += lu.r_begin[e + 1] - lu.r_begin[e] + 1;
    }
    lu.r_flops += flops;
}

fn apply_etas_transpose(lu: &mut LU, x: &mut [f64], indices: &mut Vec<usize>) {
    let mut flops = 0;
    for e in (0..lu.r_row.len()).rev() {
        let r = lu.r_row[e];
        let mut dot = 0.0;
        for pos in lu.r_begin[e]..lu.r_begin[e + 1] {
            dot += lu.r_value[pos] * x[lu.r_index[pos]];
        }
        let xr = x[r];
        let value = xr * lu.r_inv[e] - dot;
        if xr == 0.0 {
            if value == 0.0 {
                continue;
            }
            indices.push(r);
        }
        x[r] = if value == 0.0 { PLACEHOLDER } else { value };
        flops += lu.r_begin[e + 1] - lu.r_begin[e] + 1;
    }
    lu.r_flops += flops;
}
