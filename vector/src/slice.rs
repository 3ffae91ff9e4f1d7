//! Cutting trees at arbitrary indices.
//!
//! Both directions work the same way: walk down the path to the cut, copy the
//! nodes along it with the unwanted children removed, and share everything
//! else. Cutting on the right then refills the tail from the rightmost leaf.

use imbl_sized_chunks::Chunk;

use crate::{
    node::{bits, Internal, Node, NodeRef, PERSISTENT},
    pointer::PointerKind,
    tree::Tree,
    Const, ValidBranchingConstant,
};

impl<T: Clone, const N: usize, P: PointerKind> Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    /// Keeps the first `right` elements.
    pub fn drop_right(&self, right: usize) -> Self {
        if right == 0 {
            return Self::new();
        }
        if right >= self.count {
            return self.clone();
        }

        let tail_offset = self.tail_offset();
        if right > tail_offset {
            let mut data = self.tail.as_leaf().clone();
            data.drop_right(right - tail_offset);
            return Self {
                count: right,
                shift: self.shift,
                root: self.root.clone(),
                tail: P::new(Node::leaf(data)),
            };
        }

        let Some(root) = &self.root else {
            unreachable!("index before the tail of a tree without a root");
        };
        let (root, shift) = drop_right_rec::<T, N, P>(root, right - 1, self.shift, false);
        let mut ret = Self {
            count: right,
            shift,
            root: Some(root),
            tail: P::new(Node::empty_leaf()),
        };
        ret.promote_rightmost_leaf(PERSISTENT);
        ret
    }

    /// Drops the first `left` elements.
    pub fn drop_left(&self, left: usize) -> Self {
        if left >= self.count {
            return Self::new();
        }
        if left == 0 {
            return self.clone();
        }

        let remaining = self.count - left;
        let tail_len = self.tail_len();
        if remaining <= tail_len {
            let mut data = self.tail.as_leaf().clone();
            data.drop_left(tail_len - remaining);
            return Self {
                count: remaining,
                shift: 0,
                root: None,
                tail: P::new(Node::leaf(data)),
            };
        }

        let Some(root) = &self.root else {
            unreachable!("index before the tail of a tree without a root");
        };
        let (root, shift) = drop_left_rec::<T, N, P>(root, left, self.shift, false);
        let mut ret = Self {
            count: remaining,
            shift,
            root: Some(root),
            tail: self.tail.clone(),
        };
        if shift == 0 {
            ret.refill_root_leaf();
        }
        ret
    }

    /// The elements in `[from, to)`.
    ///
    /// Panics unless `from <= to <= self.len()`.
    pub fn slice(&self, from: usize, to: usize) -> Self {
        assert!(
            from <= to && to <= self.count,
            "slice {from}..{to} out of bounds for length {}",
            self.count
        );
        if from == 0 && to == self.count {
            return self.clone();
        }
        if from == to {
            return Self::new();
        }
        self.drop_right(to).drop_left(from)
    }

    /// A root leaf left short by `drop_left` is topped up from the tail, or
    /// folded into it when everything fits.
    fn refill_root_leaf(&mut self) {
        let root_len = self.count - self.tail_len();
        let Some(root) = self.root.as_mut() else {
            return;
        };
        if self.count <= N {
            let mut data = root.as_leaf().clone();
            for value in self.tail.as_leaf().iter() {
                data.push_back(value.clone());
            }
            self.root = None;
            self.tail = P::new(Node::leaf(data));
        } else if root_len < N {
            let mut tail = self.tail.as_leaf().clone();
            P::make_mut(root)
                .leaf_mut()
                .drain_from_front(&mut tail, N - root_len);
            self.tail = P::new(Node::leaf(tail));
        }
    }
}

/// Copies the path to `right`, the last index to keep, dropping everything
/// after it. Returns the new subtree and its shift.
///
/// `has_left` is set once the path has turned right of some sibling: from
/// then on every level is kept, so that the result slots back in at the
/// height its ancestors expect.
fn drop_right_rec<T: Clone, const N: usize, P: PointerKind>(
    node: &NodeRef<T, N, P>,
    right: usize,
    shift: usize,
    has_left: bool,
) -> (NodeRef<T, N, P>, usize) {
    if shift == 0 {
        let mut data = node.as_leaf().clone();
        data.drop_right(right + 1);
        return (P::new(Node::leaf(data)), 0);
    }

    let internal = node.as_internal();
    let (slot, child_index) = internal.position(right, shift);
    let (child, child_shift) = drop_right_rec::<T, N, P>(
        &internal.children[slot],
        child_index,
        shift - bits::<N>(),
        slot != 0 || has_left,
    );

    if slot == 0 {
        if !has_left {
            return (child, child_shift);
        }
        let mut parent = Internal::single(child);
        if internal.is_relaxed() {
            parent = parent.with_sizes(Chunk::unit(right + 1), PERSISTENT);
        }
        return (P::new(Node::Internal(parent)), shift);
    }

    let mut children: Chunk<_, N> = internal.children.iter().take(slot).cloned().collect();
    children.push_back(child);
    let mut parent = Internal::new(children);
    if let Some(table) = internal.size_table() {
        let mut sizes: Chunk<usize, N> = table.iter().take(slot).copied().collect();
        sizes.push_back(right + 1);
        parent = parent.with_sizes(sizes, PERSISTENT);
    }
    (P::new(Node::Internal(parent)), shift)
}

/// The mirror image of [`drop_right_rec`]: drops the first `left` elements
/// below `node`. Since the remaining children no longer start on a boundary,
/// every copied node with more than one child gets a size table.
fn drop_left_rec<T: Clone, const N: usize, P: PointerKind>(
    node: &NodeRef<T, N, P>,
    left: usize,
    shift: usize,
    has_right: bool,
) -> (NodeRef<T, N, P>, usize) {
    if shift == 0 {
        let mut data = node.as_leaf().clone();
        data.drop_left(left);
        return (P::new(Node::leaf(data)), 0);
    }

    let internal = node.as_internal();
    let (slot, child_index) = internal.position(left, shift);
    let last_slot = internal.children.len() - 1;
    let child_shift = shift - bits::<N>();
    let (child, returned_shift) = drop_left_rec::<T, N, P>(
        &internal.children[slot],
        child_index,
        child_shift,
        slot != last_slot || has_right,
    );

    if slot == last_slot {
        if !has_right {
            return (child, returned_shift);
        }
        let child_relaxed =
            matches!(&*child, Node::Internal(inner) if inner.is_relaxed());
        let size = child.size(child_shift);
        let mut parent = Internal::single(child);
        if child_shift != 0 && child_relaxed {
            parent = parent.with_sizes(Chunk::unit(size), PERSISTENT);
        }
        return (P::new(Node::Internal(parent)), shift);
    }

    let mut children = Chunk::unit(child);
    for sibling in internal.children.iter().skip(slot + 1) {
        children.push_back(sibling.clone());
    }
    let sizes: Chunk<usize, N> = match internal.size_table() {
        Some(table) => table.iter().skip(slot).map(|size| size - left).collect(),
        None => {
            let total = node.size(shift);
            (slot..=last_slot)
                .map(|s| {
                    if s == last_slot {
                        total - left
                    } else {
                        ((s + 1) << shift) - left
                    }
                })
                .collect()
        }
    };
    let parent = Internal::new(children).with_sizes(sizes, PERSISTENT);
    (P::new(Node::Internal(parent)), shift)
}
