// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln
//
// Column replacement in product form.

use crate::lu::lu::{Task, LU};
use crate::sparse_vector::TINY_ELEMENT;
use crate::{SparseVector, Status};
use log::warn;

/// Replace the basis column at position `pivot_row` by the column whose
/// FTRAN result is `column`, `pivot_check` being its entry at `pivot_row`.
///
/// The eta stored for the replacement holds `column[i] / pivot_check` for
/// `i != pivot_row` (entries below `TINY_ELEMENT` dropped) and the reciprocal
/// of `pivot_check`. Nothing is stored when the update fails.
pub(crate) fn replace_column(
    lu: &mut LU,
    column: &SparseVector,
    pivot_row: usize,
    pivot_check: f64,
) -> Result<(), Status> {
    if lu.task != Task::Factorized {
        return Err(Status::InvalidCall);
    }
    assert!(pivot_row < lu.m, "pivot row {} out of range", pivot_row);

    let nz = column
        .iter()
        .filter(|&(i, x)| i != pivot_row && x.abs() >= TINY_ELEMENT)
        .count();
    if lu.r_row.len() >= lu.options.max_pivots_before_refactor || lu.r_index.len() + nz > lu.r_mem
    {
        warn!(
            target: lu.log_target.as_str(),
            "update region full after {} replacements ({} eta entries)",
            lu.r_row.len(),
            lu.r_index.len()
        );
        return Err(Status::UpdateRegionFull);
    }
    if pivot_check.abs() < lu.options.zero_tolerance {
        warn!(
            target: lu.log_target.as_str(),
            "column replacement rejected, pivot check {:e}",
            pivot_check
        );
        return Err(Status::SingularUpdate);
    }

    let inv = 1.0 / pivot_check;
    for (i, x) in column.iter() {
        if i != pivot_row && x.abs() >= TINY_ELEMENT {
            lu.r_index.push(i);
            lu.r_value.push(x * inv);
        }
    }
    lu.r_begin.push(lu.r_index.len());
    lu.r_row.push(pivot_row);
    lu.r_inv.push(inv);
    Ok(())
}
