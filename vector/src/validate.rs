//! Structural checks, for tests and debugging.

use crate::{
    error::ValidationError,
    node::{bits, Node, NodeRef},
    pointer::PointerKind,
    tree::Tree,
    Const, ValidBranchingConstant,
};

impl<T, const N: usize, P: PointerKind> Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    /// Checks every structural invariant of the tree, reporting the first one
    /// that fails.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let tail_len = self.tail_len();
        if tail_len > N {
            return Err(ValidationError::TailOverflow {
                len: tail_len,
                max: N,
            });
        }

        match &self.root {
            None if self.count != tail_len => Err(ValidationError::RootlessCount {
                count: self.count,
                tail_len,
            }),
            None => Ok(()),
            Some(_) if tail_len == 0 => Err(ValidationError::EmptyTail),
            Some(root) => {
                validate_node::<T, N, P>(root, self.shift, self.tail_offset(), &mut Vec::new())
            }
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Panics if the tree fails [`validate`](Self::validate).
    pub fn check_invariants(&self) {
        if let Err(e) = self.validate() {
            panic!("invalid tree: {e}");
        }
    }
}

/// Checks the subtree at `node`, which sits at `shift` and should hold
/// `expected` elements. `path` is the way down from the root.
fn validate_node<T, const N: usize, P: PointerKind>(
    node: &NodeRef<T, N, P>,
    shift: usize,
    expected: usize,
    path: &mut Vec<usize>,
) -> Result<(), ValidationError> {
    let internal = match (&**node, shift) {
        (Node::Leaf(leaf), 0) => {
            if leaf.data.is_empty() {
                return Err(ValidationError::EmptyNode { path: path.clone() });
            }
            if leaf.data.len() != expected {
                return Err(ValidationError::LeafSize {
                    path: path.clone(),
                    expected,
                    actual: leaf.data.len(),
                });
            }
            return Ok(());
        }
        (Node::Internal(internal), shift) if shift > 0 => internal,
        (node, shift) => {
            let (found, wanted) = match node {
                Node::Leaf(_) => ("leaf", "internal node"),
                Node::Internal(_) => ("internal node", "leaf"),
            };
            return Err(ValidationError::WrongKind {
                path: path.clone(),
                shift,
                found,
                expected: wanted,
            });
        }
    };

    let len = internal.children.len();
    if len == 0 {
        return Err(ValidationError::EmptyNode { path: path.clone() });
    }
    let child_shift = shift - bits::<N>();

    let Some(sizes) = internal.size_table() else {
        if expected <= (len - 1) << shift || expected > len << shift {
            return Err(ValidationError::DenseSize {
                path: path.clone(),
                shift,
                children: len,
                expected,
            });
        }
        for (slot, child) in internal.children.iter().enumerate() {
            let child_expected = if slot == len - 1 {
                expected - (slot << shift)
            } else {
                1 << shift
            };
            path.push(slot);
            validate_node::<T, N, P>(child, child_shift, child_expected, path)?;
            path.pop();
        }
        return Ok(());
    };

    if sizes.len() != len {
        return Err(ValidationError::SizeTableLength {
            path: path.clone(),
            entries: sizes.len(),
            children: len,
        });
    }
    let total = sizes[len - 1];
    if total != expected {
        return Err(ValidationError::SizeTableTotal {
            path: path.clone(),
            expected,
            actual: total,
        });
    }

    let mut before = 0;
    for (slot, (&size, child)) in sizes.iter().zip(internal.children.iter()).enumerate() {
        if size <= before {
            return Err(ValidationError::SizeTableOrder {
                path: path.clone(),
                slot,
            });
        }
        path.push(slot);
        validate_node::<T, N, P>(child, child_shift, size - before, path)?;
        path.pop();
        before = size;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use imbl_sized_chunks::Chunk;

    use super::*;
    use crate::{
        node::{Internal, PERSISTENT},
        RcK,
    };

    type T4 = Tree<u32, 4, RcK>;

    fn tree(len: u32) -> T4 {
        (0..len).fold(Tree::new(), |t, i| t.push(i))
    }

    fn root_mut(tree: &mut T4) -> &mut Internal<u32, 4, RcK> {
        RcK::make_mut(tree.root.as_mut().unwrap()).internal_mut()
    }

    #[test]
    fn healthy_trees() {
        for len in 0..200 {
            assert!(tree(len).is_valid(), "tree of {len}");
        }
    }

    #[test]
    fn rootless_count() {
        let mut t = tree(3);
        t.count = 4;
        assert_eq!(
            t.validate(),
            Err(ValidationError::RootlessCount {
                count: 4,
                tail_len: 3
            })
        );
    }

    #[test]
    fn empty_tail() {
        let mut t = tree(8);
        t.tail = RcK::new(Node::empty_leaf());
        t.count = 4;
        assert_eq!(t.validate(), Err(ValidationError::EmptyTail));
    }

    #[test]
    fn short_dense_child() {
        // 4 + 4 in the root, 1 in the tail.
        let mut t = tree(9);
        let root = root_mut(&mut t);
        RcK::make_mut(&mut root.children[0]).leaf_mut().pop_back();
        t.count -= 1;
        assert_eq!(
            t.validate(),
            Err(ValidationError::LeafSize {
                path: vec![0],
                expected: 4,
                actual: 3,
            })
        );
    }

    #[test]
    fn wrong_size_table() {
        let mut t = tree(9);
        let root = root_mut(&mut t);
        *root = root.clone().with_sizes(Chunk::pair(4, 9), PERSISTENT);
        assert_eq!(
            t.validate(),
            Err(ValidationError::SizeTableTotal {
                path: vec![],
                expected: 8,
                actual: 9,
            })
        );

        let root = root_mut(&mut t);
        *root = root.clone().with_sizes(Chunk::pair(4, 4), PERSISTENT);
        assert!(matches!(
            t.validate(),
            Err(ValidationError::SizeTableTotal { .. })
        ));

        let root = root_mut(&mut t);
        *root = root.clone().with_sizes(Chunk::pair(5, 8), PERSISTENT);
        assert_eq!(
            t.validate(),
            Err(ValidationError::LeafSize {
                path: vec![0],
                expected: 5,
                actual: 4,
            })
        );
    }

    #[test]
    #[should_panic(expected = "invalid tree")]
    fn check_invariants_panics() {
        let mut t = tree(2);
        t.count = 10;
        t.check_invariants();
    }
}
