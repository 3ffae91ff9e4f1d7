//! Transient edit sessions.
//!
//! A [`TransientTree`] batches many edits without copying a node more than
//! once. Each session gets a fresh guid; nodes it copies are stamped with that
//! guid and edited in place from then on. Everything else is copied on first
//! write, exactly as in a persistent update, so the tree the session started
//! from is never touched.
//!
//! A session belongs to the thread that started it and ends with
//! [`TransientTree::to_persistent`]. Misuse is reported through [`Error`]
//! rather than by panicking.

use std::{
    sync::atomic::{AtomicU32, Ordering},
    thread::{self, ThreadId},
};

use crate::{
    error::{Error, Result},
    metrics::increment,
    node::{Guid, Node, PERSISTENT},
    pointer::{ArcK, PointerKind},
    tree::Tree,
    Const, ValidBranchingConstant,
};

static NEXT_GUID: AtomicU32 = AtomicU32::new(1);

/// The next session guid. Skips [`PERSISTENT`] when the counter wraps.
fn fresh_guid() -> Guid {
    loop {
        let guid = NEXT_GUID.fetch_add(1, Ordering::Relaxed);
        if guid != PERSISTENT {
            return guid;
        }
    }
}

/// A tree that can be edited in place by the thread that created it.
pub struct TransientTree<T, const N: usize = 32, P: PointerKind = ArcK>
where
    Const<N>: ValidBranchingConstant,
{
    tree: Tree<T, N, P>,
    guid: Guid,
    owner: ThreadId,
}

impl<T: Clone, const N: usize, P: PointerKind> TransientTree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    pub(crate) fn new(tree: &Tree<T, N, P>) -> Self {
        let guid = fresh_guid();
        let mut tree = tree.clone();
        tree.tail = P::new((*tree.tail).clone().with_guid(guid));

        increment!("rrb.transient.sessions");
        log::debug!("started transient session {guid} on {} elements", tree.count);
        TransientTree {
            tree,
            guid,
            owner: thread::current().id(),
        }
    }

    fn check(&self) -> Result<()> {
        let error = if self.guid == PERSISTENT {
            Error::UsedAfterFreeze
        } else if thread::current().id() != self.owner {
            Error::CrossThread
        } else {
            return Ok(());
        };
        log::debug!("refused transient call: {error}");
        Err(error)
    }

    pub fn len(&self) -> Result<usize> {
        self.check()?;
        Ok(self.tree.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The element at `index`.
    ///
    /// Panics if `index` is out of bounds.
    pub fn nth(&self, index: usize) -> Result<&T> {
        self.check()?;
        Ok(self.tree.nth(index))
    }

    pub fn get(&self, index: usize) -> Result<Option<&T>> {
        self.check()?;
        Ok(self.tree.get(index))
    }

    /// The last element. Panics if the tree is empty.
    pub fn peek(&self) -> Result<&T> {
        self.check()?;
        Ok(self.tree.peek())
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        self.check()?;
        self.tree.push_mut(value, self.guid);
        Ok(())
    }

    /// Removes the last element. Panics if the tree is empty.
    pub fn pop(&mut self) -> Result<()> {
        self.check()?;
        self.tree.pop_mut(self.guid);
        Ok(())
    }

    /// Replaces the element at `index`. Panics if `index` is out of bounds.
    pub fn update(&mut self, index: usize, value: T) -> Result<()> {
        self.check()?;
        self.tree.update_mut(index, value, self.guid);
        Ok(())
    }

    /// Ends the session and returns the edited tree.
    ///
    /// The transient is unusable afterwards: every further call, including a
    /// second `to_persistent`, fails with [`Error::UsedAfterFreeze`].
    pub fn to_persistent(&mut self) -> Result<Tree<T, N, P>> {
        self.check()?;
        self.guid = PERSISTENT;
        let mut tree = std::mem::take(&mut self.tree);
        tree.tail = P::new(Node::clone(&tree.tail));
        log::debug!("froze transient session on {} elements", tree.count);
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RcK;

    type T4 = Tree<u32, 4, RcK>;

    fn contents(tree: &T4) -> Vec<u32> {
        (0..tree.len()).map(|i| *tree.nth(i)).collect()
    }

    #[test]
    fn guids_are_never_persistent() {
        let a = fresh_guid();
        let b = fresh_guid();
        assert_ne!(a, PERSISTENT);
        assert_ne!(a, b);
    }

    #[test]
    fn edits_leave_the_source_alone() {
        let source: T4 = (0..50).fold(Tree::new(), |t, i| t.push(i));
        let mut transient = source.to_transient();
        for i in 0..50 {
            transient.update(i, 100 + i as u32).unwrap();
        }
        for i in 50..120 {
            transient.push(100 + i).unwrap();
        }
        for _ in 0..30 {
            transient.pop().unwrap();
        }
        assert_eq!(transient.len().unwrap(), 90);
        assert_eq!(*transient.peek().unwrap(), 189);

        let edited = transient.to_persistent().unwrap();
        edited.check_invariants();
        assert_eq!(contents(&edited), (100..190).collect::<Vec<_>>());
        assert_eq!(contents(&source), (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn nodes_are_copied_once() {
        let source: T4 = (0..64).fold(Tree::new(), |t, i| t.push(i));
        let mut transient = source.to_transient();
        transient.update(0, 7).unwrap();
        let leaf: *const Node<u32, 4, RcK> = &**transient.tree.region_node(0).0;
        transient.update(1, 8).unwrap();
        transient.update(2, 9).unwrap();
        assert_eq!(leaf, &**transient.tree.region_node(0).0 as *const _);
        assert_eq!(*source.nth(0), 0);
    }

    #[test]
    fn unshared_trees_are_edited_in_place() {
        let source: T4 = (0..64).fold(Tree::new(), |t, i| t.push(i));
        let leaf: *const Node<u32, 4, RcK> = &**source.region_node(0).0;
        let mut transient = source.to_transient();
        drop(source);

        transient.update(0, 7).unwrap();
        assert_eq!(leaf, &**transient.tree.region_node(0).0 as *const _);
        assert_eq!(*transient.nth(0).unwrap(), 7);
        let edited = transient.to_persistent().unwrap();
        edited.check_invariants();
        assert_eq!(contents(&edited)[..3], [7, 1, 2]);
    }

    #[test]
    fn frozen_transients_refuse_everything() {
        let mut transient = T4::new().push(1).to_transient();
        let tree = transient.to_persistent().unwrap();
        assert_eq!(contents(&tree), vec![1]);

        assert_eq!(transient.push(2), Err(Error::UsedAfterFreeze));
        assert_eq!(transient.pop(), Err(Error::UsedAfterFreeze));
        assert_eq!(transient.update(0, 3), Err(Error::UsedAfterFreeze));
        assert_eq!(transient.nth(0), Err(Error::UsedAfterFreeze));
        assert_eq!(transient.peek(), Err(Error::UsedAfterFreeze));
        assert_eq!(transient.len(), Err(Error::UsedAfterFreeze));
        assert!(matches!(
            transient.to_persistent(),
            Err(Error::UsedAfterFreeze)
        ));
        assert_eq!(contents(&tree), vec![1]);
    }

    #[test]
    fn frozen_trees_are_not_edited_by_later_sessions() {
        let mut first = T4::new().to_transient();
        for i in 0..40 {
            first.push(i).unwrap();
        }
        let frozen = first.to_persistent().unwrap();

        let mut second = frozen.to_transient();
        for i in 0..40 {
            second.update(i, 0).unwrap();
        }
        second.push(40).unwrap();
        let zeroed = second.to_persistent().unwrap();

        assert_eq!(contents(&frozen), (0..40).collect::<Vec<_>>());
        assert_eq!(zeroed.len(), 41);
        assert!((0..40).all(|i| *zeroed.nth(i) == 0));
    }

    #[test]
    fn other_threads_are_refused() {
        let tree: Tree<u32, 4, ArcK> = (0..10).fold(Tree::new(), |t, i| t.push(i));
        let mut transient = tree.to_transient();
        transient.push(10).unwrap();

        let mut transient = thread::spawn(move || {
            assert_eq!(transient.push(11), Err(Error::CrossThread));
            assert_eq!(transient.len(), Err(Error::CrossThread));
            transient
        })
        .join()
        .unwrap();

        transient.push(11).unwrap();
        assert_eq!(transient.to_persistent().unwrap().len(), 12);
    }
}
