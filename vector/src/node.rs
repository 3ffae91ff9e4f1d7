//! Tree nodes.
//!
//! A tree is made of leaves, which hold up to `N` elements, and internal
//! nodes, which hold up to `N` children one level down. An internal node is
//! either *dense*, meaning that every child but the last one is completely
//! full, or *relaxed*, in which case it carries a size table of cumulative
//! element counts. Only relaxed nodes pay for a linear scan on lookup.
//!
//! Levels are described by their `shift`: a leaf sits at shift zero and a node
//! whose children sit at shift `s` sits at shift `s + bits`, where
//! `bits = log2(N)`. A child of a node at shift `s` holds at most `1 << s`
//! elements.
//!
//! Every node and size table also carries the guid of the edit session that
//! last rewrote it. Persistent operations never look at it; transient ones use
//! it to decide whether a node may be edited in place.

use imbl_sized_chunks::Chunk;

use crate::{metrics::increment, pointer::PointerKind};

/// Identifies a transient edit session. Zero means "no session".
pub(crate) type Guid = u32;

pub(crate) const PERSISTENT: Guid = 0;

pub(crate) type NodeRef<T, const N: usize, P> = <P as PointerKind>::Ptr<Node<T, N, P>>;

/// `log2(N)`, the distance in bits between two levels.
pub(crate) const fn bits<const N: usize>() -> usize {
    N.ilog2() as usize
}

pub(crate) enum Node<T, const N: usize, P: PointerKind> {
    Leaf(Leaf<T, N>),
    Internal(Internal<T, N, P>),
}

pub(crate) struct Leaf<T, const N: usize> {
    pub(crate) data: Chunk<T, N>,
    pub(crate) guid: Guid,
}

pub(crate) struct Internal<T, const N: usize, P: PointerKind> {
    pub(crate) children: Chunk<NodeRef<T, N, P>, N>,
    /// `None` for dense nodes. Otherwise it has exactly one entry per child.
    pub(crate) sizes: Option<P::Ptr<SizeTable<N>>>,
    pub(crate) guid: Guid,
}

pub(crate) struct SizeTable<const N: usize> {
    pub(crate) sizes: Chunk<usize, N>,
    pub(crate) guid: Guid,
}

// Clones always start out unowned: only `make_editable` hands out stamped
// copies.

impl<T: Clone, const N: usize> Clone for Leaf<T, N> {
    fn clone(&self) -> Self {
        Leaf {
            data: self.data.clone(),
            guid: PERSISTENT,
        }
    }
}

impl<T, const N: usize, P: PointerKind> Clone for Internal<T, N, P> {
    fn clone(&self) -> Self {
        Internal {
            children: self.children.clone(),
            sizes: self.sizes.clone(),
            guid: PERSISTENT,
        }
    }
}

impl<const N: usize> Clone for SizeTable<N> {
    fn clone(&self) -> Self {
        SizeTable {
            sizes: self.sizes.clone(),
            guid: PERSISTENT,
        }
    }
}

impl<T: Clone, const N: usize, P: PointerKind> Clone for Node<T, N, P> {
    fn clone(&self) -> Self {
        match self {
            Node::Leaf(leaf) => Node::Leaf(leaf.clone()),
            Node::Internal(internal) => Node::Internal(internal.clone()),
        }
    }
}

impl<T, const N: usize, P: PointerKind> Node<T, N, P> {
    pub(crate) fn leaf(data: Chunk<T, N>) -> Self {
        Node::Leaf(Leaf {
            data,
            guid: PERSISTENT,
        })
    }

    pub(crate) fn empty_leaf() -> Self {
        Node::leaf(Chunk::new())
    }

    /// The number of slots (elements or children) in use.
    pub(crate) fn len(&self) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.data.len(),
            Node::Internal(internal) => internal.children.len(),
        }
    }

    pub(crate) fn guid(&self) -> Guid {
        match self {
            Node::Leaf(leaf) => leaf.guid,
            Node::Internal(internal) => internal.guid,
        }
    }

    fn set_guid(&mut self, guid: Guid) {
        match self {
            Node::Leaf(leaf) => leaf.guid = guid,
            Node::Internal(internal) => internal.guid = guid,
        }
    }

    pub(crate) fn with_guid(mut self, guid: Guid) -> Self {
        self.set_guid(guid);
        self
    }

    pub(crate) fn as_leaf(&self) -> &Chunk<T, N> {
        let Node::Leaf(leaf) = self else {
            unreachable!("expected a leaf");
        };
        &leaf.data
    }

    pub(crate) fn as_internal(&self) -> &Internal<T, N, P> {
        let Node::Internal(internal) = self else {
            unreachable!("expected an internal node");
        };
        internal
    }

    pub(crate) fn leaf_mut(&mut self) -> &mut Chunk<T, N> {
        let Node::Leaf(leaf) = self else {
            unreachable!("expected a leaf");
        };
        &mut leaf.data
    }

    pub(crate) fn internal_mut(&mut self) -> &mut Internal<T, N, P> {
        let Node::Internal(internal) = self else {
            unreachable!("expected an internal node");
        };
        internal
    }

    /// The number of elements below this node, which sits at `shift`.
    ///
    /// Dense nodes only need to look down their rightmost spine.
    pub(crate) fn size(&self, shift: usize) -> usize {
        match self {
            Node::Leaf(leaf) => leaf.data.len(),
            Node::Internal(internal) => match (&internal.sizes, internal.children.last()) {
                (Some(table), _) => table.sizes.last().copied().unwrap_or(0),
                (None, Some(last)) => {
                    ((internal.children.len() - 1) << shift) + last.size(shift - bits::<N>())
                }
                (None, None) => 0,
            },
        }
    }
}

impl<T, const N: usize, P: PointerKind> Internal<T, N, P> {
    pub(crate) fn new(children: Chunk<NodeRef<T, N, P>, N>) -> Self {
        Internal {
            children,
            sizes: None,
            guid: PERSISTENT,
        }
    }

    pub(crate) fn single(child: NodeRef<T, N, P>) -> Self {
        Internal::new(Chunk::unit(child))
    }

    pub(crate) fn pair(left: NodeRef<T, N, P>, right: NodeRef<T, N, P>) -> Self {
        Internal::new(Chunk::pair(left, right))
    }

    pub(crate) fn with_sizes(mut self, sizes: Chunk<usize, N>, guid: Guid) -> Self {
        debug_assert_eq!(sizes.len(), self.children.len());
        self.sizes = Some(P::new(SizeTable { sizes, guid }));
        self
    }

    pub(crate) fn size_table(&self) -> Option<&Chunk<usize, N>> {
        self.sizes.as_ref().map(|table| &table.sizes)
    }

    pub(crate) fn is_relaxed(&self) -> bool {
        self.sizes.is_some()
    }

    /// `index` is relative to this node, which sits at `shift`. Returns the
    /// child holding that index and the index relative to that child.
    pub(crate) fn position(&self, index: usize, shift: usize) -> (usize, usize) {
        match self.size_table() {
            None => ((index >> shift) & (N - 1), index & ((1 << shift) - 1)),
            Some(sizes) => {
                // No child holds more than `1 << shift` elements, so the
                // answer is never to the left of this guess.
                let mut slot = index >> shift;
                while sizes[slot] <= index {
                    slot += 1;
                }
                (slot, index - self.offset_of(slot, shift))
            }
        }
    }

    /// How many elements live in the children before `slot`.
    pub(crate) fn offset_of(&self, slot: usize, shift: usize) -> usize {
        match self.size_table() {
            None => slot << shift,
            Some(_) if slot == 0 => 0,
            Some(sizes) => sizes[slot - 1],
        }
    }

    /// Recomputes the size table from the children, which sit one level
    /// below `shift`.
    pub(crate) fn set_sizes(mut self, shift: usize) -> Self {
        let child_shift = shift - bits::<N>();
        let mut total = 0;
        let sizes = self
            .children
            .iter()
            .map(|child| {
                total += child.size(child_shift);
                total
            })
            .collect();
        self.sizes = Some(P::new(SizeTable {
            sizes,
            guid: PERSISTENT,
        }));
        self
    }

    /// Turns a dense node at `shift` holding `count` elements into a relaxed
    /// one with the same contents.
    pub(crate) fn relax(&mut self, shift: usize, count: usize, guid: Guid) {
        if self.sizes.is_some() {
            return;
        }
        let last = self.children.len() - 1;
        let sizes = (0..last)
            .map(|slot| (slot + 1) << shift)
            .chain(std::iter::once(count))
            .collect();
        self.sizes = Some(P::new(SizeTable { sizes, guid }));
    }

    /// Gives write access to the size table, copying it first if it belongs to
    /// someone else.
    pub(crate) fn sizes_mut(&mut self, guid: Guid) -> Option<&mut Chunk<usize, N>> {
        let table = self.sizes.as_mut()?;
        if guid != PERSISTENT && table.guid != guid {
            *table = P::new(SizeTable {
                sizes: table.sizes.clone(),
                guid,
            });
        }
        Some(&mut P::make_mut(table).sizes)
    }
}

/// Gives write access to the node behind `ptr`.
///
/// Outside of an edit session (`guid == PERSISTENT`) this is plain
/// copy-on-write: shared nodes are copied, unshared ones are edited in place.
/// Inside a session, a node stamped by another session (or by none) is copied
/// once and the copy is stamped with `guid`, unless nothing else points to
/// it, in which case it is stamped in place. Stamped nodes are only ever
/// reachable from their session, so later edits happen in place.
pub(crate) fn make_editable<T: Clone, const N: usize, P: PointerKind>(
    ptr: &mut NodeRef<T, N, P>,
    guid: Guid,
) -> &mut Node<T, N, P> {
    if guid != PERSISTENT && ptr.guid() != guid {
        if P::is_unique(ptr) {
            P::make_mut(ptr).set_guid(guid);
        } else {
            increment!("rrb.transient.node_copies");
            *ptr = P::new((**ptr).clone().with_guid(guid));
        }
    }
    P::make_mut(ptr)
}

/// Builds a chain of single-child nodes down from `shift`, ending in `leaf`.
pub(crate) fn new_path<T, const N: usize, P: PointerKind>(
    shift: usize,
    leaf: NodeRef<T, N, P>,
    guid: Guid,
) -> NodeRef<T, N, P> {
    let mut node = leaf;
    let mut level = 0;
    while level < shift {
        level += bits::<N>();
        node = P::new(Node::Internal(Internal::single(node)).with_guid(guid));
    }
    node
}
