// Copyright (C) 2016-2018 ERGO-Code
// Copyright (C) 2022-2023 Richard Lincoln
//
// Depth first search in a graph.

/// Compute `reach(i)` in a graph by depth first search.
///
/// Node `j` has neighbours `index[begin[j]..begin[j+1]]`.
///
/// On return `xi[newtop..top]` hold `reach(i)` in topological order; `newtop`
/// is the function return value. Nodes that were already marked are excluded
/// from the reach. `xi[0..top]` is used as the search stack.
///
/// `pstack` is workspace of size `m` (the number of nodes in the graph).
/// Node `j` is marked iff `marked[j] == marker`; on return the nodes in the
/// reach are marked.
///
/// If node `i` is marked on entry, the function does nothing.
pub(crate) fn dfs(
    i: usize,
    begin: &[usize],
    index: &[usize],
    top: usize,
    xi: &mut [usize],
    pstack: &mut [usize],
    marked: &mut [usize],
    marker: usize,
) -> usize {
    if marked[i] == marker {
        return top;
    }
    let mut top = top;
    let mut head = 1; // stack height; xi[head-1] is on top
    xi[0] = i;
    while head > 0 {
        let node = xi[head - 1];
        if marked[node] != marker {
            // node has not been visited
            marked[node] = marker;
            pstack[head - 1] = begin[node];
        }
        let mut done = true;
        // continue dfs at node
        for p in pstack[head - 1]..begin[node + 1] {
            let next = index[p];
            if marked[next] == marker {
                continue; // skip visited node
            }
            pstack[head - 1] = p + 1;
            xi[head] = next; // start dfs at next
            head += 1;
            done = false;
            break;
        }
        if done {
            // node has no unvisited neighbours
            head -= 1;
            top -= 1;
            xi[top] = node;
        }
    }
    top
}

/// Symbolic solve with a triangular matrix given as a graph.
///
/// Computes the nonzero pattern of the solution for a right-hand side with
/// pattern `rhs`. On return `pattern[top..m]` holds the pattern in topological
/// order; `top` is returned. `pattern` must have size `m`.
pub(crate) fn solve_symbolic(
    rhs: &[usize],
    begin: &[usize],
    index: &[usize],
    pattern: &mut [usize],
    pstack: &mut [usize],
    marked: &mut [usize],
    marker: usize,
) -> usize {
    let mut top = pattern.len();
    for &i in rhs {
        if marked[i] != marker {
            top = dfs(i, begin, index, top, pattern, pstack, marked, marker);
        }
    }
    top
}

/// Substitution with a triangular matrix given columnwise in parallel arrays
/// `begin`, `index`, `value`.
///
/// The nonzero pattern of the solution must be given in topological order in
/// `order`. When `pivot_inv` is given, each solution entry is multiplied by
/// it before it is scattered; otherwise the diagonal is unit. `lhs` holds the
/// right-hand side on entry and the solution on return. Returns the number of
/// flops.
pub(crate) fn solve_triangular(
    order: &[usize],
    begin: &[usize],
    index: &[usize],
    value: &[f64],
    pivot_inv: Option<&[f64]>,
    lhs: &mut [f64],
) -> usize {
    let mut flops = 0;
    for &k in order {
        if lhs[k] == 0.0 {
            continue;
        }
        if let Some(pivot_inv) = pivot_inv {
            lhs[k] *= pivot_inv[k];
            flops += 1;
        }
        let x = lhs[k];
        for pos in begin[k]..begin[k + 1] {
            lhs[index[pos]] -= x * value[pos];
        }
        flops += begin[k + 1] - begin[k];
    }
    flops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reach_in_topological_order() {
        // 0 -> 2, 1 -> 2, 2 -> 3
        let begin = vec![0, 1, 2, 3, 3];
        let index = vec![2, 2, 3];
        let mut pattern = vec![0; 4];
        let mut pstack = vec![0; 4];
        let mut marked = vec![0; 4];
        let top = solve_symbolic(&[0], &begin, &index, &mut pattern, &mut pstack, &mut marked, 1);
        assert_eq!(&pattern[top..], &[0, 2, 3]);

        let top = solve_symbolic(&[1, 0], &begin, &index, &mut pattern, &mut pstack, &mut marked, 2);
        assert_eq!(top, 0);
        let pos = |k: usize| pattern.iter().position(|&x| x == k).unwrap();
        assert!(pos(0) < pos(2) && pos(1) < pos(2) && pos(2) < pos(3));
    }

    #[test]
    fn unit_lower_substitution() {
        // L = [1 0 0; 2 1 0; 0 3 1]
        let begin = vec![0, 1, 2, 2];
        let index = vec![1, 2];
        let value = vec![2.0, 3.0];
        let mut x = vec![1.0, 4.0, 9.0];
        let flops = solve_triangular(&[0, 1, 2], &begin, &index, &value, None, &mut x);
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
        assert_eq!(flops, 2);
    }
}
