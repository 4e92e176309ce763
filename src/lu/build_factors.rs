// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::lu::lu::LU;

// Translate the factors from row/column indices to stages.
//
// After translation, for `0 <= k < m`,
//
//     l_index[l_begin[k]..l_begin[k+1]]   stages s > k of the rows in L column k
//     u_index[u_begin[k]..u_begin[k+1]]   stages t > k of the columns in U row k
//
// Nothing is translated when the factorization is incomplete.
pub(crate) fn build_factors(lu: &mut LU) {
    lu.l_nz = lu.l_index.len();
    lu.u_nz = lu.u_index.len();
    if lu.rank() < lu.m {
        return;
    }
    for i in lu.l_index.iter_mut() {
        *i = lu.pinv[*i].unwrap_or(usize::MAX);
    }
    for j in lu.u_index.iter_mut() {
        *j = lu.qinv[*j].unwrap_or(usize::MAX);
    }
    debug_assert!(lu.l_index.iter().all(|&s| s < lu.m));
    debug_assert!(lu.u_index.iter().all(|&t| t < lu.m));
}

// Build the rowwise copy of L and the columnwise copy of U used by the sparse
// triangular solves. Both are stage indexed:
//
//     lt_index[lt_begin[s]..lt_begin[s+1]]   stages k < s with l[s,k] != 0
//     ut_index[ut_begin[t]..ut_begin[t+1]]   stages k < t with u[k,t] != 0
pub(crate) fn build_transposes(lu: &mut LU) {
    let m = lu.m;
    transpose(
        m,
        &lu.l_begin,
        &lu.l_index,
        &lu.l_value,
        &mut lu.lt_begin,
        &mut lu.lt_index,
        &mut lu.lt_value,
    );
    transpose(
        m,
        &lu.u_begin,
        &lu.u_index,
        &lu.u_value,
        &mut lu.ut_begin,
        &mut lu.ut_index,
        &mut lu.ut_value,
    );
    lu.transposed = true;
}

fn transpose(
    m: usize,
    begin: &[usize],
    index: &[usize],
    value: &[f64],
    t_begin: &mut Vec<usize>,
    t_index: &mut Vec<usize>,
    t_value: &mut Vec<f64>,
) {
    t_begin.clear();
    t_begin.resize(m + 1, 0);
    for &i in index {
        t_begin[i + 1] += 1;
    }
    for i in 0..m {
        t_begin[i + 1] += t_begin[i];
    }
    let mut put = t_begin[..m].to_vec();
    t_index.clear();
    t_index.resize(index.len(), 0);
    t_value.clear();
    t_value.resize(index.len(), 0.0);
    for k in 0..m {
        for pos in begin[k]..begin[k + 1] {
            let i = index[pos];
            t_index[put[i]] = k;
            t_value[put[i]] = value[pos];
            put[i] += 1;
        }
    }
}
