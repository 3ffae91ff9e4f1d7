//! Errors reported by this crate.
//!
//! Out-of-bounds indices and popping from an empty vector are caller bugs and
//! panic. The errors here are the ones a caller can reasonably recover from:
//! misusing a transient, and (for debugging) a tree that fails validation.

/// Misuse of a transient edit session.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("transient used after it was made persistent")]
    UsedAfterFreeze,
    #[error("transient used by a thread other than the one that created it")]
    CrossThread,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A broken structural invariant, found by [`Tree::validate`].
///
/// `path` lists the child slots taken from the root to reach the offending
/// node.
///
/// [`Tree::validate`]: crate::Tree::validate
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("tail holds {len} elements but the branching factor is {max}")]
    TailOverflow { len: usize, max: usize },
    #[error("tree without a root counts {count} elements but its tail holds {tail_len}")]
    RootlessCount { count: usize, tail_len: usize },
    #[error("tree has a root but an empty tail")]
    EmptyTail,
    #[error("node at {path:?} is a {found} but shift {shift} calls for a {expected}")]
    WrongKind {
        path: Vec<usize>,
        shift: usize,
        found: &'static str,
        expected: &'static str,
    },
    #[error("node at {path:?} is empty")]
    EmptyNode { path: Vec<usize> },
    #[error("leaf at {path:?} holds {actual} elements, expected {expected}")]
    LeafSize {
        path: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error("size table at {path:?} has {entries} entries for {children} children")]
    SizeTableLength {
        path: Vec<usize>,
        entries: usize,
        children: usize,
    },
    #[error("size table at {path:?} does not increase at slot {slot}")]
    SizeTableOrder { path: Vec<usize>, slot: usize },
    #[error("size table at {path:?} ends at {actual}, expected {expected}")]
    SizeTableTotal {
        path: Vec<usize>,
        expected: usize,
        actual: usize,
    },
    #[error(
        "dense node at {path:?} with {children} children at shift {shift} cannot hold {expected} elements"
    )]
    DenseSize {
        path: Vec<usize>,
        shift: usize,
        children: usize,
        expected: usize,
    },
}
