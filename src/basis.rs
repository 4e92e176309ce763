// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::Status;

/// Column-sparse snapshot of a square basis matrix.
///
/// Column `j` has entries `row_index[col_start[j]..col_start[j+1]]` with
/// values in `value` at the same positions. Row indices within a column are
/// distinct, values are finite.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisMatrix {
    n: usize,
    col_start: Vec<usize>,
    row_index: Vec<usize>,
    value: Vec<f64>,
}

impl BasisMatrix {
    /// Creates a basis from compressed column arrays, validating them.
    pub fn new(
        n: usize,
        col_start: Vec<usize>,
        row_index: Vec<usize>,
        value: Vec<f64>,
    ) -> Result<Self, Status> {
        if col_start.len() != n + 1 || col_start[0] != 0 {
            return Err(Status::InvalidBasis("column pointers do not match dimension"));
        }
        if row_index.len() != value.len() || col_start[n] != row_index.len() {
            return Err(Status::InvalidBasis("column pointers do not match entries"));
        }
        let mut marker = vec![usize::MAX; n];
        for j in 0..n {
            if col_start[j] > col_start[j + 1] {
                return Err(Status::InvalidBasis("column pointers not increasing"));
            }
            for pos in col_start[j]..col_start[j + 1] {
                let i = row_index[pos];
                if i >= n {
                    return Err(Status::InvalidBasis("row index out of range"));
                }
                if marker[i] == j {
                    return Err(Status::InvalidBasis("duplicate row index in column"));
                }
                marker[i] = j;
                if !value[pos].is_finite() {
                    return Err(Status::InvalidBasis("value not finite"));
                }
            }
        }
        Ok(Self {
            n,
            col_start,
            row_index,
            value,
        })
    }

    /// Builds a basis from per-column `(row, value)` lists. Explicit zeros
    /// are dropped.
    pub fn from_columns(n: usize, columns: &[Vec<(usize, f64)>]) -> Result<Self, Status> {
        if columns.len() != n {
            return Err(Status::InvalidBasis("number of columns does not match dimension"));
        }
        let mut col_start = Vec::with_capacity(n + 1);
        let mut row_index = Vec::new();
        let mut value = Vec::new();
        col_start.push(0);
        for col in columns {
            for &(i, x) in col {
                if x != 0.0 {
                    row_index.push(i);
                    value.push(x);
                }
            }
            col_start.push(row_index.len());
        }
        Self::new(n, col_start, row_index, value)
    }

    /// Builds a basis from a dense row-major array.
    pub fn from_dense(n: usize, a: &[f64]) -> Result<Self, Status> {
        if a.len() != n * n {
            return Err(Status::InvalidBasis("dense array does not match dimension"));
        }
        let columns: Vec<Vec<(usize, f64)>> = (0..n)
            .map(|j| (0..n).map(|i| (i, a[i * n + j])).collect())
            .collect();
        Self::from_columns(n, &columns)
    }

    /// The identity of dimension `n`, scaled by `slack_value`.
    pub fn slack_basis(n: usize, slack_value: f64) -> Self {
        Self {
            n,
            col_start: (0..=n).collect(),
            row_index: (0..n).collect(),
            value: vec![slack_value; n],
        }
    }

    pub fn dimension(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.row_index.len()
    }

    /// Row indices and values of column `j`.
    pub fn column(&self, j: usize) -> (&[usize], &[f64]) {
        let range = self.col_start[j]..self.col_start[j + 1];
        (&self.row_index[range.clone()], &self.value[range])
    }

    /// Copy with columns `(j, i)` replaced by slack columns on row `i`.
    pub fn with_slacks(&self, replaced: &[(usize, usize)], slack_value: f64) -> Self {
        let mut columns: Vec<Vec<(usize, f64)>> = (0..self.n)
            .map(|j| {
                let (idx, val) = self.column(j);
                idx.iter().copied().zip(val.iter().copied()).collect()
            })
            .collect();
        for &(j, i) in replaced {
            columns[j] = vec![(i, slack_value)];
        }
        let mut col_start = vec![0];
        let mut row_index = Vec::with_capacity(self.nnz());
        let mut value = Vec::with_capacity(self.nnz());
        for col in columns {
            for (i, x) in col {
                row_index.push(i);
                value.push(x);
            }
            col_start.push(row_index.len());
        }
        Self {
            n: self.n,
            col_start,
            row_index,
            value,
        }
    }

    /// `y = B x`
    pub fn multiply(&self, x: &[f64]) -> Vec<f64> {
        let mut y = vec![0.0; self.n];
        for j in 0..self.n {
            let (idx, val) = self.column(j);
            for (&i, &a) in idx.iter().zip(val) {
                y[i] += a * x[j];
            }
        }
        y
    }

    /// `y = B' x`
    pub fn multiply_transpose(&self, x: &[f64]) -> Vec<f64> {
        (0..self.n)
            .map(|j| {
                let (idx, val) = self.column(j);
                idx.iter().zip(val).map(|(&i, &a)| a * x[i]).sum()
            })
            .collect()
    }

    /// Maximum column sum of absolute values.
    pub fn one_norm(&self) -> f64 {
        (0..self.n)
            .map(|j| self.column(j).1.iter().map(|x| x.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_input() {
        assert!(BasisMatrix::new(2, vec![0, 1, 2], vec![0, 2], vec![1.0, 1.0]).is_err());
        assert!(BasisMatrix::new(2, vec![0, 2, 2], vec![0, 0], vec![1.0, 1.0]).is_err());
        assert!(BasisMatrix::new(2, vec![0, 1, 2], vec![0, 1], vec![1.0, f64::NAN]).is_err());
        assert!(BasisMatrix::new(2, vec![0, 1, 2], vec![0, 1], vec![1.0, 1.0]).is_ok());
    }

    #[test]
    fn multiply_and_slacks() {
        let b = BasisMatrix::from_dense(2, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(b.nnz(), 4);
        assert_eq!(b.multiply(&[1.0, 1.0]), vec![3.0, 7.0]);
        assert_eq!(b.multiply_transpose(&[1.0, 1.0]), vec![4.0, 6.0]);
        assert_eq!(b.one_norm(), 6.0);
        let s = b.with_slacks(&[(1, 0)], 1.0);
        assert_eq!(s.column(1), (&[0usize][..], &[1.0][..]));
        assert_eq!(s.column(0), b.column(0));
    }
}
