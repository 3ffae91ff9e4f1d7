//! Reference-counted pointers, abstracted over the kind of counter.
//!
//! Trees are generic over a [`PointerKind`], which picks the shared-ownership
//! pointer used for every node, size table and tail. [`ArcK`] uses atomic
//! counters so that snapshots can be read and derived from on several threads
//! at once. [`RcK`] uses plain counters, which is faster but confines a tree to
//! a single thread.

use std::{ops::Deref, rc::Rc, sync::Arc};

/// A family of reference-counted pointers.
pub trait PointerKind: Clone + std::fmt::Debug + 'static {
    type Ptr<U>: Deref<Target = U> + Clone;

    fn new<U>(value: U) -> Self::Ptr<U>;

    /// Returns a mutable reference to the pointee, cloning it first if it is
    /// shared with any other pointer.
    fn make_mut<U: Clone>(ptr: &mut Self::Ptr<U>) -> &mut U;

    fn ptr_eq<U>(a: &Self::Ptr<U>, b: &Self::Ptr<U>) -> bool;

    fn strong_count<U>(ptr: &Self::Ptr<U>) -> usize;

    /// Is this the only pointer to its pointee?
    fn is_unique<U>(ptr: &Self::Ptr<U>) -> bool {
        Self::strong_count(ptr) == 1
    }
}

/// Plain (non-atomic) reference counting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RcK;

/// Atomic reference counting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ArcK;

impl PointerKind for RcK {
    type Ptr<U> = Rc<U>;

    fn new<U>(value: U) -> Rc<U> {
        Rc::new(value)
    }

    fn make_mut<U: Clone>(ptr: &mut Rc<U>) -> &mut U {
        Rc::make_mut(ptr)
    }

    fn ptr_eq<U>(a: &Rc<U>, b: &Rc<U>) -> bool {
        Rc::ptr_eq(a, b)
    }

    fn strong_count<U>(ptr: &Rc<U>) -> usize {
        Rc::strong_count(ptr)
    }
}

impl PointerKind for ArcK {
    type Ptr<U> = Arc<U>;

    fn new<U>(value: U) -> Arc<U> {
        Arc::new(value)
    }

    fn make_mut<U: Clone>(ptr: &mut Arc<U>) -> &mut U {
        Arc::make_mut(ptr)
    }

    fn ptr_eq<U>(a: &Arc<U>, b: &Arc<U>) -> bool {
        Arc::ptr_eq(a, b)
    }

    fn strong_count<U>(ptr: &Arc<U>) -> usize {
        Arc::strong_count(ptr)
    }
}
