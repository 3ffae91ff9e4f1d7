use std::fmt;

use imbl_sized_chunks::Chunk;

use crate::{
    metrics::increment,
    node::{bits, make_editable, new_path, Guid, Internal, Node, NodeRef, PERSISTENT},
    pointer::{ArcK, PointerKind},
    transient::TransientTree,
    Const, ValidBranchingConstant,
};

/// A persistent RRB-tree.
///
/// Every operation leaves `self` untouched and returns a new tree that shares
/// as much structure with the old one as possible. Recently pushed elements
/// sit in a tail buffer of up to `N` elements; the rest lives in the tree
/// proper, under `root`.
///
/// `N` is the branching factor and `P` picks between atomic ([`ArcK`]) and
/// plain ([`RcK`](crate::RcK)) reference counts.
pub struct Tree<T, const N: usize = 32, P: PointerKind = ArcK>
where
    Const<N>: ValidBranchingConstant,
{
    pub(crate) count: usize,
    pub(crate) shift: usize,
    pub(crate) root: Option<NodeRef<T, N, P>>,
    // Always a leaf. Never empty when there is a root.
    pub(crate) tail: NodeRef<T, N, P>,
}

impl<T, const N: usize, P: PointerKind> Clone for Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn clone(&self) -> Self {
        Tree {
            count: self.count,
            shift: self.shift,
            root: self.root.clone(),
            tail: self.tail.clone(),
        }
    }
}

impl<T, const N: usize, P: PointerKind> Default for Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, const N: usize, P: PointerKind> fmt::Debug for Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T, const N: usize, P: PointerKind> Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    pub fn new() -> Self {
        Tree {
            count: 0,
            shift: 0,
            root: None,
            tail: P::new(Node::empty_leaf()),
        }
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub(crate) fn tail_len(&self) -> usize {
        self.tail.len()
    }

    /// The index of the first element in the tail.
    pub(crate) fn tail_offset(&self) -> usize {
        self.count - self.tail_len()
    }

    /// Do both trees share the same root and tail?
    ///
    /// This is a cheap check for "nothing was copied", not an equality test.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        let same_root = match (&self.root, &other.root) {
            (None, None) => true,
            (Some(a), Some(b)) => P::ptr_eq(a, b),
            _ => false,
        };
        same_root && self.count == other.count && P::ptr_eq(&self.tail, &other.tail)
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        (index < self.count).then(|| self.nth(index))
    }

    /// The element at `index`.
    ///
    /// Panics if `index` is out of bounds.
    pub fn nth(&self, index: usize) -> &T {
        let (block, start, _) = self.region_for(index);
        &block[index - start]
    }

    /// The last element.
    ///
    /// Panics if the tree is empty.
    pub fn peek(&self) -> &T {
        assert!(!self.is_empty(), "peek on an empty vector");
        self.nth(self.count - 1)
    }

    /// Finds the contiguous block of elements containing `index`.
    ///
    /// Returns the block together with the range `[start, end)` of indices it
    /// covers, so that callers walking consecutive indices only need to come
    /// back once per block.
    ///
    /// Panics if `index` is out of bounds.
    pub fn region_for(&self, index: usize) -> (&[T], usize, usize) {
        let (node, start) = self.region_node(index);
        let block = node.as_leaf();
        (block, start, start + block.len())
    }

    /// The leaf (or tail) holding `index`, and the index of its first element.
    pub(crate) fn region_node(&self, index: usize) -> (&NodeRef<T, N, P>, usize) {
        assert!(
            index < self.count,
            "index {index} out of bounds for length {}",
            self.count
        );
        let tail_offset = self.tail_offset();
        if index >= tail_offset {
            return (&self.tail, tail_offset);
        }

        let Some(mut node) = self.root.as_ref() else {
            unreachable!("index before the tail of a tree without a root");
        };
        let mut shift = self.shift;
        let mut relative = index;
        while shift > 0 {
            let internal = node.as_internal();
            let (slot, child_index) = internal.position(relative, shift);
            node = &internal.children[slot];
            relative = child_index;
            shift -= bits::<N>();
        }
        (node, index - relative)
    }
}

impl<T: Clone, const N: usize, P: PointerKind> Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    /// Returns a copy of this tree with `value` appended.
    pub fn push(&self, value: T) -> Self {
        let mut ret = self.clone();
        ret.push_mut(value, PERSISTENT);
        ret
    }

    /// Returns a copy of this tree without its last element.
    ///
    /// Panics if the tree is empty.
    pub fn pop(&self) -> Self {
        assert!(!self.is_empty(), "pop from an empty vector");
        if self.count == 1 {
            return Self::new();
        }
        let mut ret = self.clone();
        ret.pop_mut(PERSISTENT);
        ret
    }

    /// Returns a copy of this tree with the element at `index` replaced.
    ///
    /// Panics if `index` is out of bounds.
    pub fn update(&self, index: usize, value: T) -> Self {
        let mut ret = self.clone();
        ret.update_mut(index, value, PERSISTENT);
        ret
    }

    /// Starts an edit session on a snapshot of this tree.
    pub fn to_transient(&self) -> TransientTree<T, N, P> {
        TransientTree::new(self)
    }

    // The `_mut` methods below edit `self` through `make_editable`. With
    // `PERSISTENT` that copies whatever is shared with other trees, so a fresh
    // clone of a tree can be edited without disturbing the original. Transient
    // sessions pass their own guid instead.

    pub(crate) fn push_mut(&mut self, value: T, guid: Guid) {
        if self.tail_len() < N {
            make_editable::<T, N, P>(&mut self.tail, guid)
                .leaf_mut()
                .push_back(value);
            self.count += 1;
            return;
        }

        let root_count = self.tail_offset();
        let new_tail = P::new(Node::leaf(Chunk::unit(value)).with_guid(guid));
        let old_tail = std::mem::replace(&mut self.tail, new_tail);
        self.push_down(root_count, old_tail, guid);
        self.count += 1;
    }

    /// Hangs `leaf` to the right of everything under the root, which currently
    /// holds `root_count` elements. Only the root and shift are touched; the
    /// caller is in charge of the count and the tail.
    pub(crate) fn push_down(&mut self, root_count: usize, leaf: NodeRef<T, N, P>, guid: Guid) {
        let leaf_len = leaf.len();
        let Some(root) = self.root.as_mut() else {
            self.root = Some(leaf);
            self.shift = 0;
            return;
        };

        if let Some(open) = open_shift::<T, N, P>(root, self.shift) {
            append_leaf::<T, N, P>(root, self.shift, root_count, open, leaf, leaf_len, guid);
            return;
        }

        // Every node on the rightmost spine is full: grow a new root. It can
        // only stay dense if the old root was exactly full.
        let relaxed = matches!(&**root, Node::Internal(internal) if internal.is_relaxed());
        let full = root_count == 1 << (self.shift + bits::<N>());
        let old_root = root.clone();
        let mut top = Internal::pair(old_root, new_path::<T, N, P>(self.shift, leaf, guid));
        if relaxed || !full {
            top = top.with_sizes(Chunk::pair(root_count, root_count + leaf_len), guid);
        }
        self.root = Some(P::new(Node::Internal(top).with_guid(guid)));
        self.shift += bits::<N>();

        increment!("rrb.push.height_growth");
        log::trace!("tree grew to shift {} at {} elements", self.shift, root_count);
    }

    pub(crate) fn pop_mut(&mut self, guid: Guid) {
        assert!(!self.is_empty(), "pop from an empty vector");
        self.count -= 1;
        if self.tail_len() > 1 || self.root.is_none() {
            make_editable::<T, N, P>(&mut self.tail, guid).leaf_mut().pop_back();
        } else {
            self.promote_rightmost_leaf(guid);
        }
    }

    /// Makes the rightmost leaf under the root the new tail, discarding the
    /// old tail.
    pub(crate) fn promote_rightmost_leaf(&mut self, guid: Guid) {
        let Some(root) = self.root.as_mut() else {
            return;
        };
        let (leaf, emptied) = detach_rightmost_leaf::<T, N, P>(root, self.shift, guid);
        self.tail = leaf;
        if emptied {
            self.root = None;
            self.shift = 0;
        } else {
            self.collapse_root();
        }
    }

    /// Replaces single-child roots by their child.
    pub(crate) fn collapse_root(&mut self) {
        while self.shift > 0 {
            let Some(root) = &self.root else {
                break;
            };
            let internal = root.as_internal();
            if internal.children.len() != 1 {
                break;
            }
            let child = internal.children[0].clone();
            self.root = Some(child);
            self.shift -= bits::<N>();
            log::trace!("collapsed root, shift is now {}", self.shift);
        }
    }

    pub(crate) fn update_mut(&mut self, index: usize, value: T, guid: Guid) {
        assert!(
            index < self.count,
            "index {index} out of bounds for length {}",
            self.count
        );
        let tail_offset = self.tail_offset();
        if index >= tail_offset {
            make_editable::<T, N, P>(&mut self.tail, guid).leaf_mut()[index - tail_offset] = value;
            return;
        }

        let Some(mut ptr) = self.root.as_mut() else {
            unreachable!("index before the tail of a tree without a root");
        };
        let mut shift = self.shift;
        let mut index = index;
        loop {
            match make_editable::<T, N, P>(ptr, guid) {
                Node::Leaf(leaf) => {
                    leaf.data[index] = value;
                    return;
                }
                Node::Internal(internal) => {
                    let (slot, child_index) = internal.position(index, shift);
                    ptr = &mut internal.children[slot];
                    index = child_index;
                    shift -= bits::<N>();
                }
            }
        }
    }
}

/// The shift of the deepest node on the rightmost spine that can take one
/// more child, if any.
fn open_shift<T, const N: usize, P: PointerKind>(
    root: &NodeRef<T, N, P>,
    shift: usize,
) -> Option<usize> {
    let mut node = root;
    let mut shift = shift;
    let mut open = None;
    while shift > 0 {
        let internal = node.as_internal();
        if internal.children.len() < N {
            open = Some(shift);
        }
        let Some(last) = internal.children.last() else {
            break;
        };
        node = last;
        shift -= bits::<N>();
    }
    open
}

/// Walks down the rightmost spine from `ptr` (at `shift`, holding `count`
/// elements) and hangs a new path ending in `leaf` under the node at `open`.
fn append_leaf<T: Clone, const N: usize, P: PointerKind>(
    ptr: &mut NodeRef<T, N, P>,
    shift: usize,
    count: usize,
    open: usize,
    leaf: NodeRef<T, N, P>,
    leaf_len: usize,
    guid: Guid,
) {
    let internal = make_editable::<T, N, P>(ptr, guid).internal_mut();
    let last = internal.children.len() - 1;

    if shift == open {
        // A dense node only stays dense if the child we're about to follow is
        // full.
        if !internal.is_relaxed() && count != internal.children.len() << shift {
            internal.relax(shift, count, guid);
        }
        internal
            .children
            .push_back(new_path::<T, N, P>(shift - bits::<N>(), leaf, guid));
        if let Some(sizes) = internal.sizes_mut(guid) {
            sizes.push_back(count + leaf_len);
        }
        return;
    }

    let child_count = count - internal.offset_of(last, shift);
    if let Some(sizes) = internal.sizes_mut(guid) {
        sizes[last] += leaf_len;
    }
    append_leaf::<T, N, P>(
        &mut internal.children[last],
        shift - bits::<N>(),
        child_count,
        open,
        leaf,
        leaf_len,
        guid,
    );
}

fn rightmost_leaf<'a, T: 'a, const N: usize, P: PointerKind>(
    node: &'a NodeRef<T, N, P>,
    shift: usize,
) -> &'a NodeRef<T, N, P> {
    let mut node = node;
    let mut shift = shift;
    while shift > 0 {
        let Some(last) = node.as_internal().children.last() else {
            unreachable!("empty internal node");
        };
        node = last;
        shift -= bits::<N>();
    }
    node
}

/// Does every internal node from here down to the leaves have one child?
fn is_single_path<T, const N: usize, P: PointerKind>(
    node: &NodeRef<T, N, P>,
    shift: usize,
) -> bool {
    let mut node = node;
    let mut shift = shift;
    while shift > 0 {
        let internal = node.as_internal();
        if internal.children.len() != 1 {
            return false;
        }
        node = &internal.children[0];
        shift -= bits::<N>();
    }
    true
}

/// Removes the rightmost leaf below `ptr` and returns it, along with whether
/// that left `ptr` without any elements. An emptied node is left as it was:
/// the caller drops it.
fn detach_rightmost_leaf<T: Clone, const N: usize, P: PointerKind>(
    ptr: &mut NodeRef<T, N, P>,
    shift: usize,
    guid: Guid,
) -> (NodeRef<T, N, P>, bool) {
    if is_single_path::<T, N, P>(ptr, shift) {
        return (rightmost_leaf::<T, N, P>(ptr, shift).clone(), true);
    }

    let internal = make_editable::<T, N, P>(ptr, guid).internal_mut();
    let last = internal.children.len() - 1;
    let (leaf, emptied) =
        detach_rightmost_leaf::<T, N, P>(&mut internal.children[last], shift - bits::<N>(), guid);
    if emptied {
        internal.children.pop_back();
        if let Some(sizes) = internal.sizes_mut(guid) {
            sizes.pop_back();
        }
    } else if let Some(sizes) = internal.sizes_mut(guid) {
        sizes[last] -= leaf.len();
    }
    (leaf, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RcK;

    fn collect<const N: usize, P: PointerKind>(tree: &Tree<u32, N, P>) -> Vec<u32>
    where
        Const<N>: ValidBranchingConstant,
    {
        (0..tree.len()).map(|i| *tree.nth(i)).collect()
    }

    #[test]
    fn basic() {
        let mut tree = Tree::<u32, 4, RcK>::new();
        tree.check_invariants();
        assert!(tree.is_empty());
        assert_eq!(tree.get(0), None);

        for i in 0..100 {
            tree = tree.push(i);
            tree.check_invariants();
            assert_eq!(tree.len(), i as usize + 1);
            assert_eq!(*tree.peek(), i);
        }
        assert_eq!(collect(&tree), (0..100).collect::<Vec<_>>());

        for i in (0..100).rev() {
            assert_eq!(*tree.peek(), i);
            tree = tree.pop();
            tree.check_invariants();
        }
        assert!(tree.is_empty());
        assert!(tree.root.is_none());
    }

    #[test]
    fn push_keeps_snapshots() {
        let mut snapshots = vec![Tree::<u32, 4, RcK>::new()];
        for i in 0..70 {
            let next = snapshots.last().unwrap().push(i);
            snapshots.push(next);
        }
        for (len, snapshot) in snapshots.iter().enumerate() {
            assert_eq!(collect(snapshot), (0..len as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn first_push_down_makes_a_leaf_root() {
        let tree: Tree<u32, 4, RcK> = (0..5).fold(Tree::new(), |t, i| t.push(i));
        assert_eq!(tree.shift, 0);
        assert_eq!(tree.root.as_ref().unwrap().as_leaf().len(), 4);
        assert_eq!(tree.tail_len(), 1);
    }

    #[test]
    fn update() {
        let tree: Tree<u32, 4, RcK> = (0..50).fold(Tree::new(), |t, i| t.push(i));
        for i in 0..50 {
            let updated = tree.update(i, 1000 + i as u32);
            updated.check_invariants();
            assert_eq!(*updated.nth(i), 1000 + i as u32);
            for j in (0..50).filter(|&j| j != i) {
                assert_eq!(*updated.nth(j), j as u32);
            }
        }
        assert_eq!(collect(&tree), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn region_for() {
        let tree: Tree<u32, 4, RcK> = (0..18).fold(Tree::new(), |t, i| t.push(i));
        assert_eq!(tree.region_for(5), (&[4, 5, 6, 7][..], 4, 8));
        assert_eq!(tree.region_for(17), (&[16, 17][..], 16, 18));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn nth_out_of_bounds() {
        let tree: Tree<u32, 4, RcK> = Tree::new().push(1);
        tree.nth(1);
    }

    #[test]
    #[should_panic(expected = "empty")]
    fn pop_empty() {
        Tree::<u32, 4, RcK>::new().pop();
    }

    #[test]
    fn arc_trees_are_shareable() {
        fn assert_send_sync<X: Send + Sync>() {}
        assert_send_sync::<Tree<u32>>();

        let tree: Tree<u32> = (0..1000).fold(Tree::new(), |t, i| t.push(i));
        let handles: Vec<_> = (0..4)
            .map(|k| {
                let tree = tree.clone();
                std::thread::spawn(move || tree.update(k, 0).nth(500) + tree.push(7).nth(1000))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 507);
        }
    }
}
