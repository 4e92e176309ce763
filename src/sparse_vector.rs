// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

// Sparse vector with dense scratch storage
//
// The vector keeps
//
//     elements[0..n-1]    values
//     indices[0..nnz-1]   positions of the stored entries
//
// In unpacked mode `elements` is indexed by row, giving O(1) random access.
// In packed mode the values are stored contiguously, `elements[k]` belongs to
// `indices[k]`, and `elements[nnz..]` is zero. Stored entries are never
// exactly zero: an entry that cancels is kept with value `PLACEHOLDER` so that
// the index list stays valid during repeated updates.
use std::ops::Range;

/// Values with smaller magnitude are treated as noise by `add`.
pub const TINY_ELEMENT: f64 = 1e-50;

/// Stand-in stored for an entry that cancelled to zero.
pub const PLACEHOLDER: f64 = 1e-100;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    elements: Vec<f64>,
    indices: Vec<usize>,
    packed: bool,
}

impl SparseVector {
    /// Creates an empty vector of dimension `n` in unpacked mode.
    pub fn new(n: usize) -> Self {
        Self {
            elements: vec![0.0; n],
            indices: Vec::new(),
            packed: false,
        }
    }

    /// Creates an unpacked vector from a dense array, storing its nonzeros.
    pub fn from_dense(values: &[f64]) -> Self {
        let mut v = Self::new(values.len());
        v.elements.copy_from_slice(values);
        v.scan(0..values.len());
        v
    }

    /// Creates an unpacked vector from `(index, value)` pairs. Repeated
    /// indices are summed.
    pub fn from_entries(n: usize, entries: &[(usize, f64)]) -> Self {
        let mut v = Self::new(n);
        for &(i, x) in entries {
            v.add(i, x);
        }
        v
    }

    pub fn dimension(&self) -> usize {
        self.elements.len()
    }

    /// Changes the dimension. Entries at positions `n..` are dropped.
    pub fn resize(&mut self, n: usize) {
        if self.packed {
            self.unpack();
        }
        if n < self.elements.len() {
            self.indices.retain(|&i| i < n);
        }
        self.elements.resize(n, 0.0);
    }

    pub fn num_elements(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Raw element storage: values by row in unpacked mode, by position in
    /// packed mode.
    pub fn elements(&self) -> &[f64] {
        &self.elements
    }

    pub fn is_packed(&self) -> bool {
        self.packed
    }

    /// Value at row `i` (zero when not stored). O(1) in unpacked mode,
    /// O(nnz) in packed mode.
    pub fn get(&self, i: usize) -> f64 {
        if self.packed {
            self.indices
                .iter()
                .position(|&k| k == i)
                .map_or(0.0, |k| self.elements[k])
        } else {
            self.elements[i]
        }
    }

    /// Sets row `i` to `value`. Setting a stored entry to zero keeps it as a
    /// placeholder.
    pub fn set(&mut self, i: usize, value: f64) {
        assert!(i < self.elements.len());
        if self.packed {
            match self.indices.iter().position(|&k| k == i) {
                Some(k) => self.elements[k] = if value == 0.0 { PLACEHOLDER } else { value },
                None if value != 0.0 => {
                    let k = self.indices.len();
                    self.indices.push(i);
                    self.elements[k] = value;
                }
                None => {}
            }
        } else if self.elements[i] != 0.0 {
            self.elements[i] = if value == 0.0 { PLACEHOLDER } else { value };
        } else if value != 0.0 {
            self.indices.push(i);
            self.elements[i] = value;
        }
    }

    /// Stores `value` at row `i`, which must not be stored yet.
    pub fn insert(&mut self, i: usize, value: f64) {
        assert!(!self.packed);
        assert_eq!(self.elements[i], 0.0, "row {} already stored", i);
        self.indices.push(i);
        self.elements[i] = if value == 0.0 { PLACEHOLDER } else { value };
    }

    /// Adds `value` to row `i`. Sums below `TINY_ELEMENT` keep the entry as a
    /// placeholder; tiny values are not inserted into empty slots.
    pub fn add(&mut self, i: usize, value: f64) {
        assert!(!self.packed);
        let old = self.elements[i];
        if old != 0.0 {
            let sum = old + value;
            self.elements[i] = if sum.abs() >= TINY_ELEMENT {
                sum
            } else {
                PLACEHOLDER
            };
        } else if value.abs() >= TINY_ELEMENT {
            self.indices.push(i);
            self.elements[i] = value;
        }
    }

    /// Adds `value` to row `i` without any tolerance handling.
    pub fn quick_add(&mut self, i: usize, value: f64) {
        assert!(!self.packed);
        if self.elements[i] == 0.0 {
            self.indices.push(i);
            self.elements[i] = value;
        } else {
            self.elements[i] += value;
            if self.elements[i] == 0.0 {
                self.elements[i] = PLACEHOLDER;
            }
        }
    }

    /// Removes all entries, keeping the dimension and mode.
    pub fn clear(&mut self) {
        if self.packed || 4 * self.indices.len() < self.elements.len() {
            let nnz = self.indices.len();
            if self.packed {
                self.elements[..nnz].fill(0.0);
            } else {
                for &i in &self.indices {
                    self.elements[i] = 0.0;
                }
            }
        } else {
            self.elements.fill(0.0);
        }
        self.indices.clear();
    }

    /// Rebuilds the index list for rows in `range` from the dense buffer.
    /// Indices outside `range` are kept. Returns the number of stored
    /// entries in `range`.
    pub fn scan(&mut self, range: Range<usize>) -> usize {
        self.scan_with_tolerance(range, 0.0)
    }

    /// As `scan`, but values with magnitude below `tolerance` are zeroed.
    pub fn scan_with_tolerance(&mut self, range: Range<usize>, tolerance: f64) -> usize {
        assert!(!self.packed);
        let end = range.end.min(self.elements.len());
        let start = range.start.min(end);
        self.indices.retain(|&i| i < start || i >= end);
        let before = self.indices.len();
        for i in start..end {
            let x = self.elements[i];
            if x != 0.0 {
                if x.abs() >= tolerance {
                    self.indices.push(i);
                } else {
                    self.elements[i] = 0.0;
                }
            }
        }
        self.indices.len() - before
    }

    /// Removes entries with magnitude below `tolerance`, placeholders
    /// included. Returns the number of remaining entries.
    pub fn clean(&mut self, tolerance: f64) -> usize {
        let tolerance = tolerance.max(TINY_ELEMENT);
        if self.packed {
            let mut put = 0;
            for k in 0..self.indices.len() {
                let x = self.elements[k];
                self.elements[k] = 0.0;
                if x.abs() >= tolerance {
                    self.indices[put] = self.indices[k];
                    self.elements[put] = x;
                    put += 1;
                }
            }
            self.indices.truncate(put);
        } else {
            let elements = &mut self.elements;
            self.indices.retain(|&i| {
                if elements[i].abs() >= tolerance {
                    true
                } else {
                    elements[i] = 0.0;
                    false
                }
            });
        }
        self.indices.len()
    }

    /// Switches to packed mode: values move to positions `0..nnz`.
    pub fn pack(&mut self) {
        if self.packed {
            return;
        }
        let values: Vec<f64> = self.indices.iter().map(|&i| self.elements[i]).collect();
        for &i in &self.indices {
            self.elements[i] = 0.0;
        }
        self.elements[..values.len()].copy_from_slice(&values);
        self.packed = true;
    }

    /// Switches to unpacked mode: values move to their rows.
    pub fn unpack(&mut self) {
        if !self.packed {
            return;
        }
        let nnz = self.indices.len();
        let values: Vec<f64> = self.elements[..nnz].to_vec();
        self.elements[..nnz].fill(0.0);
        for (k, &i) in self.indices.iter().enumerate() {
            self.elements[i] = values[k];
        }
        self.packed = false;
    }

    pub fn set_packed_mode(&mut self, packed: bool) {
        if packed {
            self.pack()
        } else {
            self.unpack()
        }
    }

    /// Iterates over `(row, value)` of the stored entries.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().enumerate().map(move |(k, &i)| {
            if self.packed {
                (i, self.elements[k])
            } else {
                (i, self.elements[i])
            }
        })
    }

    /// Sorts the index list (and packed values) by row.
    pub fn sort_indices(&mut self) {
        if self.packed {
            let nnz = self.indices.len();
            let mut pairs: Vec<(usize, f64)> = self.iter().collect();
            pairs.sort_unstable_by_key(|&(i, _)| i);
            for (k, (i, x)) in pairs.into_iter().enumerate() {
                self.indices[k] = i;
                self.elements[k] = x;
            }
            debug_assert_eq!(nnz, self.indices.len());
        } else {
            self.indices.sort_unstable();
        }
    }

    pub fn to_dense(&self) -> Vec<f64> {
        let mut x = vec![0.0; self.elements.len()];
        for (i, v) in self.iter() {
            x[i] = v;
        }
        x
    }

    /// Largest magnitude over the stored entries.
    pub fn inf_norm(&self) -> f64 {
        self.iter().fold(0.0, |m, (_, x)| f64::max(m, x.abs()))
    }

    /// Dense buffer and index list for in-place solves. Unpacks first.
    pub(crate) fn parts_mut(&mut self) -> (&mut [f64], &mut Vec<usize>) {
        self.unpack();
        (&mut self.elements, &mut self.indices)
    }

    /// Checks that the index list matches the dense buffer exactly.
    pub fn is_consistent(&self) -> bool {
        let n = self.elements.len();
        let mut seen = vec![false; n];
        for (k, &i) in self.indices.iter().enumerate() {
            if i >= n || seen[i] {
                return false;
            }
            seen[i] = true;
            let x = if self.packed { self.elements[k] } else { self.elements[i] };
            if x == 0.0 {
                return false;
            }
        }
        if self.packed {
            self.elements[self.indices.len()..].iter().all(|&x| x == 0.0)
        } else {
            (0..n).all(|i| seen[i] || self.elements[i] == 0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    #[should_panic]
    fn quick_add_rejects_packed() {
        let mut v = SparseVector::from_entries(4, &[(1, 2.0), (3, -1.0)]);
        v.pack();
        v.quick_add(3, 1.0);
    }

    #[test]
    fn set_get_and_placeholder() {
        let mut v = SparseVector::new(5);
        v.set(3, 2.0);
        v.set(1, -1.0);
        assert_eq!(v.num_elements(), 2);
        assert_eq!(v.get(3), 2.0);
        assert_eq!(v.get(0), 0.0);
        v.add(3, -2.0);
        assert_eq!(v.num_elements(), 2);
        assert_eq!(v.get(3), PLACEHOLDER);
        assert_eq!(v.clean(1e-12), 1);
        assert_eq!(v.indices(), &[1]);
        assert!(v.is_consistent());
    }

    #[test]
    fn scan_rebuilds_range() {
        let mut v = SparseVector::from_dense(&[0.0, 1.0, 0.0, 3.0, 4.0, 0.0]);
        assert_eq!(v.indices(), &[1, 3, 4]);
        v.set(0, 7.0);
        assert_eq!(v.scan(0..4), 3);
        let mut idx = v.indices().to_vec();
        idx.sort_unstable();
        assert_eq!(idx, vec![0, 1, 3, 4]);
        assert!(v.is_consistent());
    }

    #[test]
    fn scan_with_tolerance_zeroes_noise() {
        let mut v = SparseVector::from_dense(&[1e-15, 2.0, -1e-14]);
        assert_eq!(v.scan_with_tolerance(0..3, 1e-12), 1);
        assert_eq!(v.to_dense(), vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn pack_and_unpack() {
        let mut v = SparseVector::from_entries(6, &[(5, 5.0), (2, 2.0), (0, 1.0)]);
        v.pack();
        assert!(v.is_packed());
        assert_eq!(&v.elements()[..3], &[5.0, 2.0, 1.0]);
        assert_eq!(v.get(2), 2.0);
        assert!(v.is_consistent());
        v.sort_indices();
        assert_eq!(v.indices(), &[0, 2, 5]);
        assert_eq!(&v.elements()[..3], &[1.0, 2.0, 5.0]);
        v.unpack();
        assert_eq!(v.to_dense(), vec![1.0, 0.0, 2.0, 0.0, 0.0, 5.0]);
        assert!(v.is_consistent());
    }

    #[test]
    fn clear_keeps_dimension() {
        let mut v = SparseVector::from_dense(&[1.0, 2.0, 3.0, 4.0]);
        v.clear();
        assert!(v.is_empty());
        assert_eq!(v.dimension(), 4);
        assert!(v.elements().iter().all(|&x| x == 0.0));
    }

    proptest! {
        #[test]
        fn random_updates_stay_consistent(
            ops in proptest::collection::vec((0usize..16, -3i32..=3), 0..64),
            pack in any::<bool>(),
        ) {
            let mut v = SparseVector::new(16);
            let mut model = vec![0.0f64; 16];
            for (i, x) in ops {
                v.add(i, x as f64);
                model[i] += x as f64;
            }
            v.set_packed_mode(pack);
            prop_assert!(v.is_consistent());
            for i in 0..16 {
                prop_assert!((v.get(i) - model[i]).abs() <= PLACEHOLDER);
            }
            v.clean(1e-12);
            prop_assert_eq!(v.num_elements(), model.iter().filter(|x| **x != 0.0).count());
        }
    }
}
