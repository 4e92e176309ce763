// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::build_factors::build_factors;
use crate::lu::dense_block::{dense_breakover_due, factorize_dense_block};
use crate::lu::lu::{Task, LU};
use crate::lu::markowitz::{markowitz, restore_rejected_rows};
use crate::lu::pivot::pivot;
use crate::lu::singletons::singletons;
use crate::{FactorContext, Status};
use log::{debug, trace, warn};
use std::time::Instant;

/// Factorize the loaded basis.
///
/// Singletons are eliminated first, then pivots are chosen by the Markowitz
/// search until the basis is factorized, the dense breakover hands the rest
/// to the dense kernel, or no acceptable pivot remains. When the search finds
/// no pivot passing the tolerances, it is repeated once with the relaxed
/// tolerances before the remaining columns are given up as singular.
pub(crate) fn factorize(lu: &mut LU, ctx: &dyn FactorContext) -> Result<(), Status> {
    let target = ctx.log_target();
    lu.log_target.clear();
    lu.log_target.push_str(target);
    if let Some(status) = lu.pending.take() {
        lu.task = Task::NoTask;
        warn!(target: target, "factorization needs larger areas: {}", status);
        return Err(status);
    }
    if lu.task != Task::Loaded {
        return Err(Status::InvalidCall);
    }
    lu.abstol = lu.options.absolute_pivot_tolerance;
    lu.reltol = ctx
        .pivot_tolerance(lu.options.pivot_tolerance())
        .clamp(f64::MIN_POSITIVE, 1.0);

    let tic = Instant::now();
    let result = eliminate(lu, target);
    lu.time_factorize = tic.elapsed().as_secs_f64();
    lu.nfactorize += 1;

    match result {
        Ok(()) => {
            debug!(
                target: target,
                "factor m={} nnz(B)={} nnz(L)={} nnz(U)={} slacks={} singletons={} dense={} \
                 compressions={} relaxed={} flops={} time={:.2e}s",
                lu.m,
                lu.matrix_nz,
                lu.l_nz,
                lu.u_nz,
                lu.nslack,
                lu.nsingletons,
                lu.dense_size,
                lu.compressions(),
                lu.nrelaxed,
                lu.factor_flops,
                lu.time_factorize
            );
            lu.task = Task::Factorized;
            Ok(())
        }
        Err(status) => {
            if status == Status::Singular {
                warn!(
                    target: target,
                    "basis singular, rank {} of {}",
                    lu.rank(),
                    lu.m
                );
            } else {
                warn!(target: target, "factorization failed at stage {}: {}", lu.rank(), status);
            }
            lu.task = Task::NoTask;
            Err(status)
        }
    }
}

fn eliminate(lu: &mut LU, target: &str) -> Result<(), Status> {
    let mut ncompress = lu.compressions();
    lu.task = Task::Singletons;
    singletons(lu)?;
    trace_compressions(lu, target, &mut ncompress);

    lu.task = Task::Markowitz;
    while lu.rank() < lu.m {
        if dense_breakover_due(lu) {
            lu.task = Task::DenseBlock;
            factorize_dense_block(lu, target)?;
            break;
        }

        let tic = Instant::now();
        let found = match markowitz(lu) {
            Ok(found) => found,
            Err(Status::NearSingular) => relaxed_search(lu, target),
            Err(status) => return Err(status),
        };
        lu.time_search_pivot += tic.elapsed().as_secs_f64();
        let (i, j) = match found {
            Some(pivot) => pivot,
            None => break,
        };

        let tic = Instant::now();
        pivot(lu, i, j)?;
        lu.time_elim_pivot += tic.elapsed().as_secs_f64();
        trace_compressions(lu, target, &mut ncompress);

        #[cfg(feature = "debug")]
        assert!(lu.check_consistency());
    }

    lu.task = Task::BuildFactors;
    build_factors(lu);
    if lu.rank() < lu.m {
        Err(Status::Singular)
    } else {
        Ok(())
    }
}

fn trace_compressions(lu: &LU, target: &str, seen: &mut usize) {
    let n = lu.compressions();
    if n > *seen {
        trace!(
            target: target,
            "compressed row and column files at stage {}, {} entries free",
            lu.rank(),
            lu.cols.free_space()
        );
        *seen = n;
    }
}

// Search once more with `abstol` lowered to the zero tolerance and `reltol`
// to the relaxed pivot tolerance.
fn relaxed_search(lu: &mut LU, target: &str) -> Option<(usize, usize)> {
    restore_rejected_rows(lu);
    let (abstol, reltol) = (lu.abstol, lu.reltol);
    lu.abstol = lu.options.zero_tolerance;
    lu.reltol = f64::min(lu.options.relaxed_pivot_tolerance, reltol);
    let found = markowitz(lu).ok().flatten();
    lu.abstol = abstol;
    lu.reltol = reltol;

    match found {
        Some(_) => {
            lu.nrelaxed += 1;
            debug!(target: target, "relaxed pivot tolerance at stage {}", lu.rank());
        }
        None => restore_rejected_rows(lu),
    }
    found
}
