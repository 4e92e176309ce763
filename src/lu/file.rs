// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

use crate::Status;

// Data file implementation
//
// A data file stores lines of entries. Entries of each line are contiguous in
// memory. Lines can be in any order in memory and there can be gaps between
// consecutive lines.
//
// The data file implementation uses arrays
//
//     data[0:fmem-1],
//     begin[0:nlines], end[0:nlines],
//     next[0:nlines], prev[0:nlines]
//
//     data            storing the entries
//     begin[k]        pointer to first element in line 0 <= k < nlines,
//     end[k]          pointer to one past the last element in line k.
//     begin[nlines]   pointer to the first element of unused space
//     end[nlines]     holds fmem
//
// `next`, `prev` hold the line numbers (`0..nlines-1`) in a double linked list in
// the order in which they appear in memory. That is, for line `0 <= k < nlines`,
// `prev[k]` and `next[k]` are the line which comes before respectively after line
// `k` in memory. `next[nlines]` and `prev[nlines]` are the first respectively last
// line in memory order.
//
// Lines grow in place while the gap behind them allows. Otherwise they are moved
// to the end of the file. Gaps are reclaimed by `compress`, which runs only when
// the unused space at the end is insufficient.
#[derive(Debug, Clone, Default)]
pub(crate) struct LineFile<E> {
    nlines: usize,
    begin: Vec<usize>,
    end: Vec<usize>,
    next: Vec<usize>,
    prev: Vec<usize>,
    data: Vec<E>,
    ncompress: usize,
}

impl<E: Copy + Default> LineFile<E> {
    #[cfg(test)]
    pub(crate) fn new(nlines: usize, fmem: usize) -> Self {
        let mut file = Self::default();
        file.reset(nlines, fmem);
        file
    }

    /// Initialize empty file with `fmem` memory space.
    pub(crate) fn reset(&mut self, nlines: usize, fmem: usize) {
        self.nlines = nlines;
        self.begin.clear();
        self.begin.resize(nlines + 1, 0);
        self.end.clear();
        self.end.resize(nlines + 1, 0);
        self.end[nlines] = fmem;
        self.next.clear();
        self.prev.clear();
        self.next.extend((0..=nlines).map(|i| (i + 1) % (nlines + 1)));
        self.prev.extend((0..=nlines).map(|i| (i + nlines) % (nlines + 1)));
        self.data.clear();
        self.data.resize(fmem, E::default());
        self.ncompress = 0;
    }

    /// Number of compressions since the last reset.
    pub(crate) fn compressions(&self) -> usize {
        self.ncompress
    }

    /// Free space at the end of the file.
    pub(crate) fn free_space(&self) -> usize {
        self.end[self.nlines] - self.begin[self.nlines]
    }

    pub(crate) fn len(&self, line: usize) -> usize {
        self.end[line] - self.begin[line]
    }

    pub(crate) fn line(&self, line: usize) -> &[E] {
        &self.data[self.begin[line]..self.end[line]]
    }

    pub(crate) fn clear_line(&mut self, line: usize) {
        self.end[line] = self.begin[line];
    }

    /// Remove the entry at offset `pos` of `line`, moving the last entry of
    /// the line into its place.
    pub(crate) fn swap_remove(&mut self, line: usize, pos: usize) {
        let b = self.begin[line];
        assert!(b + pos < self.end[line]);
        self.end[line] -= 1;
        self.data[b + pos] = self.data[self.end[line]];
    }

    // Room behind `line` up to the following line in memory, or up to the
    // end of the file for the last line.
    fn room(&self, line: usize) -> usize {
        let next = self.next[line];
        let limit = if next == self.nlines {
            self.end[self.nlines]
        } else {
            self.begin[next]
        };
        limit - self.end[line]
    }

    fn grow_in_place(&mut self, line: usize, extra: usize) -> bool {
        if self.room(line) < extra {
            return false;
        }
        if self.next[line] == self.nlines {
            let n = self.nlines;
            self.begin[n] = usize::max(self.begin[n], self.end[line] + extra);
        }
        true
    }

    /// Make room for `extra` more entries at the end of `line`. When the line
    /// cannot grow in place it is moved to the end of the file with
    /// `stretch*nz+pad` elements additional space.
    pub(crate) fn reserve(
        &mut self,
        line: usize,
        extra: usize,
        pad: usize,
        stretch: f64,
    ) -> Result<(), Status> {
        if self.grow_in_place(line, extra) {
            return Ok(());
        }
        let nz = self.len(line) + extra;
        let slack = (stretch * nz as f64) as usize + pad;
        if self.free_space() < nz + slack {
            self.compress(stretch, pad);
            if self.grow_in_place(line, extra) {
                return Ok(());
            }
            if self.free_space() < nz {
                return Err(Status::OutOfMemory);
            }
        }
        let slack = usize::min(slack, self.free_space() - nz);
        self.reappend(line, extra + slack);
        Ok(())
    }

    /// Replace the entries of `line`.
    pub(crate) fn set_line(
        &mut self,
        line: usize,
        entries: &[E],
        pad: usize,
        stretch: f64,
    ) -> Result<(), Status> {
        let len = self.len(line);
        if entries.len() > len {
            self.reserve(line, entries.len() - len, pad, stretch)?;
        }
        let b = self.begin[line];
        self.data[b..b + entries.len()].copy_from_slice(entries);
        self.end[line] = b + entries.len();
        Ok(())
    }

    /// Append `entry` to `line`.
    #[cfg(test)]
    pub(crate) fn push(
        &mut self,
        line: usize,
        entry: E,
        pad: usize,
        stretch: f64,
    ) -> Result<(), Status> {
        self.reserve(line, 1, pad, stretch)?;
        let e = self.end[line];
        self.data[e] = entry;
        self.end[line] += 1;
        Ok(())
    }

    // Reappend line to file end and add `extra_space` elements room. The file
    // must have at least len(line) + `extra_space` elements free space.
    fn reappend(&mut self, line: usize, extra_space: usize) {
        let n = self.nlines;
        let fmem = self.end[n];
        let mut used = self.begin[n];
        let (ibeg, iend) = (self.begin[line], self.end[line]);
        assert!(iend - ibeg + extra_space <= fmem - used);
        self.begin[line] = used;
        self.data.copy_within(ibeg..iend, used);
        used += iend - ibeg;
        self.end[line] = used;
        self.begin[n] = used + extra_space;

        // move line to the end of the memory order list
        let (p, q) = (self.prev[line], self.next[line]);
        self.next[p] = q;
        self.prev[q] = p;
        let last = self.prev[n];
        self.next[last] = line;
        self.prev[line] = last;
        self.next[line] = n;
        self.prev[n] = line;
    }

    /// Compress file to reuse memory gaps. The ordering of lines in the file is
    /// unchanged. To each line with `nz` entries add `stretch*nz+pad` elements
    /// extra space. Chop extra space if it would overlap the following line in
    /// memory. Entries are moved, never changed.
    ///
    /// Returns the number of entries in the file.
    pub(crate) fn compress(&mut self, stretch: f64, pad: usize) -> usize {
        let n = self.nlines;
        let mut nz = 0;
        let mut used = 0;
        let mut extra_space = 0;
        let mut i = self.next[n];
        while i < n {
            let (ibeg, iend) = (self.begin[i], self.end[i]);
            assert!(ibeg >= used);
            used += extra_space;
            if used > ibeg {
                used = ibeg; // chop extra space added before
            }
            self.begin[i] = used;
            self.data.copy_within(ibeg..iend, used);
            used += iend - ibeg;
            self.end[i] = used;
            extra_space = (stretch * (iend - ibeg) as f64) as usize + pad;
            nz += iend - ibeg;
            i = self.next[i];
        }
        assert!(used <= self.begin[n]);
        used += extra_space;
        if used > self.begin[n] {
            used = self.begin[n]; // never use more space than before
        }
        self.begin[n] = used;
        self.ncompress += 1;
        nz
    }

    /// Lines in memory order.
    #[cfg(test)]
    pub(crate) fn memory_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nlines);
        let mut i = self.next[self.nlines];
        while i < self.nlines {
            order.push(i);
            i = self.next[i];
        }
        order
    }
}
