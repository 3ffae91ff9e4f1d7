//! Persistent vectors backed by relaxed radix balanced trees (RRB-trees).
//!
//! [`Tree`] is the persistent core: every operation returns a new tree and
//! leaves its input alone, sharing all the structure it can. On top of the
//! usual push, pop and update of a persistent vector, RRB-trees support
//! slicing and concatenation in logarithmic time, by allowing some nodes to be
//! "relaxed" (not completely full) and keeping a table of cumulative sizes in
//! those.
//!
//! [`TransientTree`] lets a single thread make a batch of edits without paying
//! for a copy per edit. [`Vector`] wraps a [`Tree`] behind a more familiar
//! `&mut self` API.
//!
//! With the `metrics` feature, structural events (height growth,
//! rebalancing, transient copies) are reported through the [`metrics`] crate.
//!
//! [`metrics`]: https://docs.rs/metrics

mod concat;
pub mod error;
mod metrics;
mod node;
pub mod pointer;
mod slice;
pub mod transient;
pub mod tree;
mod validate;
pub mod vector;

/// [`Tree`] takes a "branching factor" parameter, which must be a
/// reasonably-sized power of two. We use this trait to enforce that.
pub trait ValidBranchingConstant {}
pub struct Const<const N: usize> {}

impl ValidBranchingConstant for Const<2> {}
impl ValidBranchingConstant for Const<4> {}
impl ValidBranchingConstant for Const<8> {}
impl ValidBranchingConstant for Const<16> {}
impl ValidBranchingConstant for Const<32> {}
impl ValidBranchingConstant for Const<64> {}
impl ValidBranchingConstant for Const<128> {}

pub use error::{Error, Result, ValidationError};
pub use pointer::{ArcK, PointerKind, RcK};
pub use transient::TransientTree;
pub use tree::Tree;
pub use vector::{IntoIter, Iter, TransientVector, Vector};
