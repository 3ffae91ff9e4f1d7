//! Concatenation.
//!
//! Two trees are joined by zipping down the right edge of the left tree and
//! the left edge of the right tree. At every level the nodes along that seam
//! are redistributed so that the result stays within a couple of slots of the
//! optimal number of nodes; everything away from the seam is shared.

use std::cmp::Ordering;

use imbl_sized_chunks::Chunk;

use crate::{
    metrics::{increment, sample},
    node::{bits, Internal, Node, NodeRef, PERSISTENT},
    pointer::PointerKind,
    tree::Tree,
    Const, ValidBranchingConstant,
};

/// Nodes with more than `N - INVARIANT` slots are left alone by rebalancing.
const INVARIANT: usize = 1;

/// How many nodes a level may have beyond the optimum before it is
/// rebalanced.
const EXTRAS: usize = 2;

impl<T: Clone, const N: usize, P: PointerKind> Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    /// Returns the concatenation of `self` and `other`.
    pub fn concat(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        increment!("rrb.concat.calls");

        let mut ret = self.clone();
        let Some(right_root) = &other.root else {
            ret.append_tail(other);
            return ret;
        };

        let root_count = ret.tail_offset();
        let left_tail = std::mem::replace(&mut ret.tail, other.tail.clone());
        ret.push_down(root_count, left_tail, PERSISTENT);

        let Some(left_root) = &ret.root else {
            unreachable!("push_down always leaves a root");
        };
        let (root, shift) =
            concat_sub_tree::<T, N, P>(left_root, ret.shift, right_root, other.shift, true);
        ret.root = Some(P::new(Node::Internal(root.set_sizes(shift))));
        ret.shift = shift;
        ret.count += other.count;
        ret.collapse_root();

        log::debug!(
            "concatenated {} and {} elements, shift {}",
            self.count,
            other.count,
            ret.shift
        );
        ret
    }

    /// Appends a tree that only has a tail.
    fn append_tail(&mut self, other: &Self) {
        let left_len = self.tail_len();
        let right = other.tail.as_leaf();

        if left_len == N {
            let root_count = self.tail_offset();
            let full = std::mem::replace(&mut self.tail, other.tail.clone());
            self.push_down(root_count, full, PERSISTENT);
        } else if left_len + right.len() <= N {
            let tail = P::make_mut(&mut self.tail).leaf_mut();
            for value in right.iter() {
                tail.push_back(value.clone());
            }
        } else {
            let root_count = self.tail_offset();
            let mut rest = right.clone();
            P::make_mut(&mut self.tail)
                .leaf_mut()
                .drain_from_front(&mut rest, N - left_len);
            let full = std::mem::replace(&mut self.tail, P::new(Node::leaf(rest)));
            self.push_down(root_count, full, PERSISTENT);
        }
        self.count += other.count;
    }
}

/// Joins `left` and `right` along their seam.
///
/// Returns a node without a size table, along with its shift. At the top level
/// the node holds the whole result; below it, the caller only looks at the
/// node's children, so there may be a single one.
fn concat_sub_tree<T: Clone, const N: usize, P: PointerKind>(
    left: &NodeRef<T, N, P>,
    left_shift: usize,
    right: &NodeRef<T, N, P>,
    right_shift: usize,
    is_top: bool,
) -> (Internal<T, N, P>, usize) {
    match left_shift.cmp(&right_shift) {
        Ordering::Greater => {
            let left = left.as_internal();
            let Some(last) = left.children.last() else {
                unreachable!("empty internal node");
            };
            let (centre, _) = concat_sub_tree::<T, N, P>(
                last,
                left_shift - bits::<N>(),
                right,
                right_shift,
                false,
            );
            rebalance(Some(left), centre, None, left_shift, is_top)
        }
        Ordering::Less => {
            let right = right.as_internal();
            let (centre, _) = concat_sub_tree::<T, N, P>(
                left,
                left_shift,
                &right.children[0],
                right_shift - bits::<N>(),
                false,
            );
            rebalance(None, centre, Some(right), right_shift, is_top)
        }
        Ordering::Equal if left_shift == 0 => {
            let (l, r) = (left.as_leaf(), right.as_leaf());
            if is_top && l.len() + r.len() <= N {
                let mut merged = l.clone();
                for value in r.iter() {
                    merged.push_back(value.clone());
                }
                (Internal::single(P::new(Node::leaf(merged))), bits::<N>())
            } else {
                (Internal::pair(left.clone(), right.clone()), bits::<N>())
            }
        }
        Ordering::Equal => {
            let (left, right) = (left.as_internal(), right.as_internal());
            let Some(last) = left.children.last() else {
                unreachable!("empty internal node");
            };
            let child_shift = left_shift - bits::<N>();
            let (centre, _) = concat_sub_tree::<T, N, P>(
                last,
                child_shift,
                &right.children[0],
                child_shift,
                false,
            );
            rebalance(Some(left), centre, Some(right), left_shift, is_top)
        }
    }
}

/// Redistributes the children of `left` (minus its last), `centre` and
/// `right` (minus its first), all at `shift`, into as few nodes as the
/// rebalancing plan asks for.
fn rebalance<T: Clone, const N: usize, P: PointerKind>(
    left: Option<&Internal<T, N, P>>,
    centre: Internal<T, N, P>,
    right: Option<&Internal<T, N, P>>,
    shift: usize,
    is_top: bool,
) -> (Internal<T, N, P>, usize) {
    let mut all = Vec::with_capacity(2 * N);
    if let Some(left) = left {
        all.extend(left.children.iter().take(left.children.len() - 1).cloned());
    }
    all.extend(centre.children.iter().cloned());
    if let Some(right) = right {
        all.extend(right.children.iter().skip(1).cloned());
    }

    let plan = concat_plan::<N>(all.iter().map(|node| node.len()));
    let child_shift = shift - bits::<N>();
    let nodes = if child_shift == 0 {
        let runs: Vec<&[T]> = all.iter().map(|node| node.as_leaf().as_slice()).collect();
        execute_plan::<T, N, P>(&all, &plan, |cursor, size| {
            P::new(Node::leaf(take_slots(&runs, cursor, size)))
        })
    } else {
        let runs: Vec<&[NodeRef<T, N, P>]> = all
            .iter()
            .map(|node| node.as_internal().children.as_slice())
            .collect();
        execute_plan::<T, N, P>(&all, &plan, |cursor, size| {
            let node = Internal::new(take_slots(&runs, cursor, size)).set_sizes(child_shift);
            P::new(Node::Internal(node))
        })
    };

    increment!("rrb.concat.rebalances");
    sample!("rrb.concat.slots_saved", all.len() - nodes.len());
    log::trace!(
        "rebalanced {} nodes into {} at shift {}",
        all.len(),
        nodes.len(),
        shift
    );

    if nodes.len() <= N {
        let node = Internal::new(nodes.into_iter().collect());
        if is_top {
            (node, shift)
        } else {
            let node = P::new(Node::Internal(node.set_sizes(shift)));
            (Internal::single(node), shift + bits::<N>())
        }
    } else {
        let mut nodes = nodes;
        let right: Chunk<_, N> = nodes.drain(N..).collect();
        let left: Chunk<_, N> = nodes.into_iter().collect();
        let left = P::new(Node::Internal(Internal::new(left).set_sizes(shift)));
        let right = P::new(Node::Internal(Internal::new(right).set_sizes(shift)));
        (Internal::pair(left, right), shift + bits::<N>())
    }
}

/// Given the slot counts of a row of nodes, decides how many slots each node
/// of the rebalanced row gets.
///
/// Short nodes are merged into their successors until the row has at most
/// `EXTRAS` more nodes than the optimum. Nodes that are nearly full are left
/// where they are, so they can be shared.
fn concat_plan<const N: usize>(sizes: impl Iterator<Item = usize>) -> Vec<usize> {
    let mut plan: Vec<usize> = sizes.collect();
    let total: usize = plan.iter().sum();
    let optimal = (total - 1) / N + 1;

    let mut len = plan.len();
    let mut i = 0;
    while optimal + EXTRAS < len {
        while plan[i] > N - INVARIANT {
            i += 1;
        }
        // Spread node `i` over its successors. Whatever doesn't fit in one
        // moves on to the next.
        let mut remaining = plan[i];
        loop {
            let merged = (remaining + plan[i + 1]).min(N);
            remaining = remaining + plan[i + 1] - merged;
            plan[i] = merged;
            i += 1;
            if remaining == 0 {
                break;
            }
        }
        // Node `i` is now empty.
        plan.copy_within(i + 1..len, i);
        len -= 1;
        i -= 1;
    }
    plan.truncate(len);
    plan
}

/// Where the next slot comes from: a node index into the row, and a slot index
/// inside that node.
type Cursor = (usize, usize);

/// Builds the nodes of a plan. A node whose slots would be copied unchanged is
/// shared instead; the others are built by `build` from the slots at the
/// cursor.
fn execute_plan<T, const N: usize, P: PointerKind>(
    all: &[NodeRef<T, N, P>],
    plan: &[usize],
    mut build: impl FnMut(&mut Cursor, usize) -> NodeRef<T, N, P>,
) -> Vec<NodeRef<T, N, P>> {
    let mut cursor = (0, 0);
    plan.iter()
        .map(|&size| {
            let (node, offset) = cursor;
            if offset == 0 && all[node].len() == size {
                cursor = (node + 1, 0);
                all[node].clone()
            } else {
                build(&mut cursor, size)
            }
        })
        .collect()
}

/// Copies `size` slots from `runs`, starting at `cursor`, into a new chunk.
fn take_slots<X: Clone, const N: usize>(
    runs: &[&[X]],
    cursor: &mut Cursor,
    size: usize,
) -> Chunk<X, N> {
    let mut chunk = Chunk::new();
    while chunk.len() < size {
        let (run, offset) = *cursor;
        let source = runs[run];
        let count = (size - chunk.len()).min(source.len() - offset);
        for value in &source[offset..offset + count] {
            chunk.push_back(value.clone());
        }
        *cursor = if offset + count == source.len() {
            (run + 1, 0)
        } else {
            (run, offset + count)
        };
    }
    chunk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RcK;

    type T4 = Tree<u32, 4, RcK>;

    fn tree(range: std::ops::Range<u32>) -> T4 {
        range.fold(Tree::new(), |t, i| t.push(i))
    }

    fn contents(tree: &T4) -> Vec<u32> {
        (0..tree.len()).map(|i| *tree.nth(i)).collect()
    }

    #[test]
    fn plan_leaves_balanced_rows_alone() {
        assert_eq!(concat_plan::<4>([4, 4, 3, 4].into_iter()), vec![4, 4, 3, 4]);
        assert_eq!(concat_plan::<4>([1, 1].into_iter()), vec![1, 1]);
    }

    #[test]
    fn plan_merges_short_nodes() {
        // 12 slots fit in 3 nodes; 6 is more than 3 + EXTRAS.
        let plan = concat_plan::<4>([4, 1, 1, 2, 2, 2].into_iter());
        assert_eq!(plan.iter().sum::<usize>(), 12);
        assert!(plan.len() <= 3 + EXTRAS);
        assert_eq!(plan[0], 4);
        assert!(plan.iter().all(|&n| n <= 4));
    }

    #[test]
    fn take_slots_crosses_runs() {
        let (a, b, c) = ([0, 1], [2], [3, 4, 5]);
        let runs: [&[u32]; 3] = [&a, &b, &c];
        let mut cursor = (0, 1);
        let chunk: Chunk<u32, 4> = take_slots(&runs, &mut cursor, 4);
        assert_eq!(chunk.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(cursor, (2, 2));
    }

    #[test]
    fn concat_grid() {
        for i in 0..40 {
            for j in 0..40 {
                let left = tree(0..i);
                let right = tree(1000..1000 + j);
                let cat = left.concat(&right);
                cat.check_invariants();
                let mut expected: Vec<u32> = (0..i).collect();
                expected.extend(1000..1000 + j);
                assert_eq!(contents(&cat), expected, "concat of {i} and {j}");
                assert_eq!(contents(&left), (0..i).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn concat_of_tall_trees() {
        let left = tree(0..700);
        let right = tree(700..1337);
        let cat = left.concat(&right);
        cat.check_invariants();
        assert_eq!(contents(&cat), (0..1337).collect::<Vec<_>>());
        assert_eq!(contents(&cat.concat(&left)).len(), 2037);
    }

    #[test]
    fn repeated_small_concat() {
        let piece = tree(0..5);
        let mut cat = T4::new();
        for _ in 0..200 {
            cat = cat.concat(&piece);
            cat.check_invariants();
        }
        assert_eq!(cat.len(), 1000);
        for (i, value) in contents(&cat).into_iter().enumerate() {
            assert_eq!(value, i as u32 % 5);
        }
    }

    #[test]
    fn concat_then_edit() {
        let mut cat = tree(0..23).concat(&tree(23..61)).concat(&tree(61..64));
        for i in 0..64 {
            cat = cat.update(i, i as u32 * 2);
        }
        for i in 64..300 {
            cat = cat.push(i * 2);
            cat.check_invariants();
        }
        assert_eq!(contents(&cat), (0..300).map(|i| i * 2).collect::<Vec<_>>());
        while !cat.is_empty() {
            cat = cat.pop();
            cat.check_invariants();
        }
    }
}
