// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln

// Implementation of doubly linked lists (see [1] section 5.5)
//
// Maintain nelem elements in nlist doubly linked lists. Each element can belong
// to zero or one list at a time.
//
// The implementation uses arrays
//
//     flink[0..nelem+nlist-1],
//     blink[0..nelem+nlist-1].
//
// In each array, the leading nelem entries store links, the trailing nlist
// entries store heads. That is, for 0 <= i < nelem and 0 <= j < nlist:
//
//     flink[i]        next element in the list containing element i
//     blink[i]        previous element in the list containing element i
//     flink[nelem+j]  first element in list j
//     blink[nelem+j]  last element in list j
//
// The forward link of the last element in a list points to its flink-head. The
// backward link of the first element in a list points to its blink-head. For
// empty lists the heads point to themselves. When an element is not in any list
// its links point to itself.
//
// `min_list >= 1` is maintained such that lists 1..min_list-1 are empty. List 0
// is not covered by min_list.
//
//    [1] Istvan Maros, Computational Techniques of the Simplex Method

/// Count lists keyed by the number of nonzeros of a row or column.
#[derive(Debug, Clone, Default)]
pub(crate) struct CountList {
    nelem: usize,
    nlist: usize,
    flink: Vec<usize>,
    blink: Vec<usize>,
    min_list: usize,
}

impl CountList {
    /// `nelem` elements in `nlist` initially empty lists.
    #[cfg(test)]
    pub(crate) fn new(nelem: usize, nlist: usize) -> Self {
        let mut list = Self::default();
        list.reset(nelem, nlist);
        list
    }

    pub(crate) fn reset(&mut self, nelem: usize, nlist: usize) {
        self.nelem = nelem;
        self.nlist = nlist;
        self.flink.clear();
        self.blink.clear();
        self.flink.extend(0..nelem + nlist);
        self.blink.extend(0..nelem + nlist);
        self.min_list = usize::max(1, nlist);
    }

    /// Add `elem` to the end of `list`. `elem` must not be in any list.
    pub(crate) fn add(&mut self, elem: usize, list: usize) {
        assert!(list < self.nlist);
        assert_eq!(self.flink[elem], elem);
        assert_eq!(self.blink[elem], elem);
        let head = self.nelem + list;
        let last = self.blink[head];
        self.blink[head] = elem;
        self.blink[elem] = last;
        self.flink[last] = elem;
        self.flink[elem] = head;
        if list > 0 && list < self.min_list {
            self.min_list = list;
        }
    }

    /// Remove `elem` from its list. Does nothing if `elem` is in no list.
    pub(crate) fn remove(&mut self, elem: usize) {
        let (next, prev) = (self.flink[elem], self.blink[elem]);
        self.flink[prev] = next;
        self.blink[next] = prev;
        self.flink[elem] = elem;
        self.blink[elem] = elem;
    }

    /// Remove `elem` from its list (if in a list) and add it to `list`.
    pub(crate) fn move_to(&mut self, elem: usize, list: usize) {
        self.remove(elem);
        self.add(elem, list);
    }

    #[cfg(any(test, feature = "debug"))]
    pub(crate) fn contains(&self, elem: usize) -> bool {
        self.flink[elem] != elem
    }

    pub(crate) fn first(&self, list: usize) -> Option<usize> {
        let e = self.flink[self.nelem + list];
        (e < self.nelem).then_some(e)
    }

    /// Element following `elem` in its list.
    pub(crate) fn next(&self, elem: usize) -> Option<usize> {
        let e = self.flink[elem];
        (e < self.nelem).then_some(e)
    }

    pub(crate) fn is_empty(&self, list: usize) -> bool {
        self.first(list).is_none()
    }

    /// Smallest nonempty list in `1..nlist`, advancing `min_list` past empty
    /// lists.
    pub(crate) fn min_nonempty(&mut self) -> Option<usize> {
        while self.min_list < self.nlist && self.is_empty(self.min_list) {
            self.min_list += 1;
        }
        (self.min_list < self.nlist).then_some(self.min_list)
    }

    /// Elements of `list` in order. The list must not be modified while
    /// iterating.
    pub(crate) fn iter(&self, list: usize) -> ListIter<'_> {
        ListIter {
            list: self,
            next: self.first(list),
        }
    }
}

pub(crate) struct ListIter<'a> {
    list: &'a CountList,
    next: Option<usize>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let e = self.next?;
        self.next = self.list.next(e);
        Some(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_move_remove() {
        let mut list = CountList::new(5, 4);
        list.add(0, 2);
        list.add(3, 2);
        list.add(1, 3);
        assert_eq!(list.iter(2).collect::<Vec<_>>(), vec![0, 3]);
        assert_eq!(list.min_nonempty(), Some(2));

        list.move_to(0, 1);
        assert_eq!(list.min_nonempty(), Some(1));
        assert_eq!(list.iter(2).collect::<Vec<_>>(), vec![3]);

        list.remove(0);
        assert!(!list.contains(0));
        assert_eq!(list.min_nonempty(), Some(2));
        list.remove(0);
        assert!(list.is_empty(1));

        list.remove(3);
        list.remove(1);
        assert_eq!(list.min_nonempty(), None);
    }

    #[test]
    fn list_zero_not_tracked() {
        let mut list = CountList::new(3, 3);
        list.add(2, 0);
        assert_eq!(list.first(0), Some(2));
        assert_eq!(list.min_nonempty(), None);
    }
}
