// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::lu::{Task, LU};
use crate::lu::singletons::pivot_column_singleton;
use crate::{BasisMatrix, Status};
use log::trace;

// Load the basis into the column and row file of the active submatrix, build
// the count lists and pivot slack columns.
//
// The capacities of L, U and the files are derived from the hints given to
// `get_areas` or, for hints of zero, from the size of the basis:
//
//     L: 3*m + 3*nnz(B) + 64
//     U: 2 * (3*m + 3*nnz(B) + 64)
//
// both multiplied by the area factor. The row and column file get the capacity
// of U each. When the files cannot hold the basis, the factorization is marked
// to fail with `OutOfMemory`.
pub(crate) fn load(lu: &mut LU, basis: &BasisMatrix) {
    let m = basis.dimension();
    if m != lu.m || lu.pinv.len() != m {
        lu.resize(m);
    } else {
        lu.colcount.reset(m, m + 2);
        lu.rowcount.reset(m, m + 2);
    }
    lu.clear_factors();
    lu.pending = None;
    lu.transposed = false;
    lu.sparse_threshold = 0;
    lu.nslack = 0;
    lu.nsingletons = 0;
    lu.nsearch_pivot = 0;
    lu.nrelaxed = 0;
    lu.nexpand = 0;
    lu.dense_size = 0;
    lu.factor_flops = 0;
    lu.l_nz = 0;
    lu.u_nz = 0;
    lu.min_pivot = f64::INFINITY;
    lu.max_pivot = 0.0;
    lu.l_flops = 0;
    lu.u_flops = 0;
    lu.r_flops = 0;
    lu.nsparse_solves = 0;
    lu.time_singletons = 0.0;
    lu.time_search_pivot = 0.0;
    lu.time_elim_pivot = 0.0;
    lu.time_solve = 0.0;

    let nnz = basis.nnz();
    lu.matrix_nz = nnz;
    let base = 3 * m + 3 * nnz + 64;
    let area_factor = lu.area_factor;
    let area = |hint: usize, estimate: usize| {
        let size = if hint > 0 { hint } else { estimate };
        (size as f64 * area_factor).ceil() as usize
    };
    lu.l_mem = area(lu.l_hint, base);
    lu.u_mem = area(lu.u_hint, 2 * base);
    lu.w_mem = lu.u_mem;
    lu.r_mem = usize::max(lu.l_mem, m);
    lu.l_index.reserve(lu.l_mem);
    lu.l_value.reserve(lu.l_mem);
    lu.u_index.reserve(lu.u_mem);
    lu.u_value.reserve(lu.u_mem);

    lu.cols.reset(m, lu.w_mem);
    lu.rows.reset(m, lu.w_mem);
    lu.task = Task::Loaded;
    if nnz > lu.w_mem {
        trace!(
            target: lu.log_target.as_str(),
            "basis with {} entries exceeds area of {}",
            nnz,
            lu.w_mem
        );
        lu.pending = Some(Status::OutOfMemory);
        return;
    }
    if let Err(status) = fill_files(lu, basis) {
        lu.pending = Some(status);
        return;
    }
    if let Err(status) = pivot_slacks(lu) {
        lu.pending = Some(status);
    }
}

fn fill_files(lu: &mut LU, basis: &BasisMatrix) -> Result<(), Status> {
    let m = lu.m;
    let nnz = basis.nnz();
    let (pad, stretch) = if (nnz as f64 * (1.0 + lu.options.stretch)) as usize + m * lu.options.pad
        <= lu.w_mem
    {
        (lu.options.pad, lu.options.stretch)
    } else {
        (0, 0.0)
    };

    // Columns, and row counts.
    let mut rowcount = vec![0; m + 1];
    let mut entries = Vec::new();
    for j in 0..m {
        let (idx, val) = basis.column(j);
        entries.clear();
        entries.extend(idx.iter().copied().zip(val.iter().copied()));
        lu.cols.set_line(j, &entries, pad, stretch)?;
        for &i in idx {
            rowcount[i + 1] += 1;
        }
        lu.col_max[j] = lu.column_max(j);
        lu.colcount.add(j, idx.len());
    }

    // Pack the pattern rowwise, then copy each row into the row file.
    for i in 0..m {
        rowcount[i + 1] += rowcount[i];
    }
    let mut put = rowcount.clone();
    let mut pattern = vec![0; nnz];
    for j in 0..m {
        for &i in basis.column(j).0 {
            pattern[put[i]] = j;
            put[i] += 1;
        }
    }
    for i in 0..m {
        let row = &pattern[rowcount[i]..rowcount[i + 1]];
        lu.rows.set_line(i, row, pad, stretch)?;
        lu.rowcount.add(i, row.len());
    }
    lu.active_nz = nnz;
    Ok(())
}

// Pivot each column whose only entry is plus or minus the slack value.
fn pivot_slacks(lu: &mut LU) -> Result<(), Status> {
    let slack = lu.options.slack_value.abs();
    if slack == 0.0 {
        return Ok(());
    }
    for j in 0..lu.m {
        if lu.cols.len(j) != 1 {
            continue;
        }
        let (i, x) = lu.cols.line(j)[0];
        if x.abs() == slack && lu.pinv[i].is_none() {
            pivot_column_singleton(lu, i, j, None)?;
            lu.nslack += 1;
        }
    }
    Ok(())
}
