use std::{
    fmt,
    hash::{Hash, Hasher},
    ops::{Add, Bound, Index, RangeBounds},
};

use crate::{
    error::Result,
    node::{NodeRef, PERSISTENT},
    pointer::{ArcK, PointerKind},
    transient::TransientTree,
    tree::Tree,
    Const, ValidBranchingConstant,
};

/// A persistent vector.
///
/// Cloning is cheap, and clones share their structure: editing one of them
/// only copies the few nodes on the path to the edit. Unlike a plain
/// persistent vector, this one can also be sliced and concatenated in
/// logarithmic time.
///
/// `N` is the branching factor. It must be a power of 2; values between `8`
/// and `64` are reasonable. `P` picks the reference counting, see
/// [`PointerKind`].
pub struct Vector<T, const N: usize = 32, P: PointerKind = ArcK>
where
    Const<N>: ValidBranchingConstant,
{
    tree: Tree<T, N, P>,
}

impl<T, const N: usize, P: PointerKind> Clone for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn clone(&self) -> Self {
        Vector {
            tree: self.tree.clone(),
        }
    }
}

impl<T, const N: usize, P: PointerKind> Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    pub fn new() -> Self {
        Vector { tree: Tree::new() }
    }

    /// The number of elements in this vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let vec = Vector::<_>::from_iter([0, 1, 2, 3, 4, 5]);
    /// assert_eq!(vec.len(), 6);
    /// ```
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Gets an element at a given index, or `None` if `index` is out of
    /// bounds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let vec = Vector::<_>::from_iter([0, 1, 2, 3, 4, 5]);
    /// assert_eq!(vec.get(2), Some(&2));
    /// assert_eq!(vec.get(6), None);
    /// ```
    pub fn get(&self, index: usize) -> Option<&T> {
        self.tree.get(index)
    }

    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn back(&self) -> Option<&T> {
        self.len().checked_sub(1).and_then(|last| self.get(last))
    }

    pub fn iter(&self) -> Iter<'_, T, N, P> {
        self.tree.iter()
    }

    /// Do both vectors share all of their storage?
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.tree.ptr_eq(&other.tree)
    }

    /// The tree behind this vector.
    pub fn as_tree(&self) -> &Tree<T, N, P> {
        &self.tree
    }
}

impl<T: Clone, const N: usize, P: PointerKind> Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    /// Appends an element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let mut vec = Vector::<_>::new();
    /// vec.push_back(1);
    /// let snapshot = vec.clone();
    /// vec.push_back(2);
    /// assert_eq!(vec.len(), 2);
    /// assert_eq!(snapshot.len(), 1);
    /// ```
    pub fn push_back(&mut self, value: T) {
        self.tree.push_mut(value, PERSISTENT);
    }

    /// Removes and returns the last element, or `None` if the vector is empty.
    pub fn pop_back(&mut self) -> Option<T> {
        let value = self.back()?.clone();
        self.tree.pop_mut(PERSISTENT);
        Some(value)
    }

    /// Replaces the element at `index`.
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) {
        self.tree.update_mut(index, value, PERSISTENT);
    }

    /// Inserts `value` at `index`, shifting everything after it to the right.
    ///
    /// Panics if `index > self.len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let mut vec = Vector::<_>::from_iter([0, 1, 3]);
    /// vec.insert(2, 2);
    /// assert_eq!(vec, Vector::<_>::from_iter(0..4));
    /// ```
    pub fn insert(&mut self, index: usize, value: T) {
        assert!(
            index <= self.len(),
            "insertion index {index} out of bounds for length {}",
            self.len()
        );
        if index == self.len() {
            self.push_back(value);
            return;
        }
        let right = self.tree.drop_left(index);
        let mut left = self.tree.drop_right(index);
        left.push_mut(value, PERSISTENT);
        self.tree = left.concat(&right);
    }

    /// Removes and returns the element at `index`, shifting everything after
    /// it to the left.
    ///
    /// Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> T {
        let value = self.tree.nth(index).clone();
        if index + 1 == self.len() {
            self.tree.pop_mut(PERSISTENT);
        } else {
            let right = self.tree.drop_left(index + 1);
            self.tree = self.tree.drop_right(index).concat(&right);
        }
        value
    }

    /// The first `n` elements, or all of them if there are fewer.
    pub fn take(&self, n: usize) -> Self {
        self.tree.drop_right(n).into()
    }

    /// Everything but the first `n` elements.
    pub fn skip(&self, n: usize) -> Self {
        self.tree.drop_left(n).into()
    }

    /// The elements in `range`.
    ///
    /// Panics if `range` is out of bounds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let vec = Vector::<_>::from_iter(0..100);
    /// assert_eq!(vec.slice(10..13), Vector::<_>::from_iter([10, 11, 12]));
    /// assert_eq!(vec.slice(..), vec);
    /// ```
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Self {
        let (from, to) = self.bounds(range);
        self.tree.slice(from, to).into()
    }

    /// Removes the elements in `range`, shifting everything after it to the
    /// left.
    ///
    /// Panics if `range` is out of bounds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let mut vec = Vector::<_>::from_iter(0..10);
    /// vec.remove_range(2..8);
    /// assert_eq!(vec, Vector::<_>::from_iter([0, 1, 8, 9]));
    /// ```
    pub fn remove_range(&mut self, range: impl RangeBounds<usize>) {
        let (from, to) = self.bounds(range);
        assert!(
            from <= to && to <= self.len(),
            "range {from}..{to} out of bounds for length {}",
            self.len()
        );
        self.tree = self.tree.drop_right(from).concat(&self.tree.drop_left(to));
    }

    /// Inserts all of `other` at `index`, shifting everything after it to the
    /// right.
    ///
    /// Panics if `index > self.len()`.
    pub fn insert_vector(&mut self, index: usize, other: &Self) {
        assert!(
            index <= self.len(),
            "insertion index {index} out of bounds for length {}",
            self.len()
        );
        let right = self.tree.drop_left(index);
        self.tree = self.tree.drop_right(index).concat(&other.tree).concat(&right);
    }

    fn bounds(&self, range: impl RangeBounds<usize>) -> (usize, usize) {
        let from = match range.start_bound() {
            Bound::Included(&i) => i,
            Bound::Excluded(&i) => i + 1,
            Bound::Unbounded => 0,
        };
        let to = match range.end_bound() {
            Bound::Included(&i) => i + 1,
            Bound::Excluded(&i) => i,
            Bound::Unbounded => self.len(),
        };
        (from, to)
    }

    /// Moves all of `other` to the end of `self`.
    pub fn append(&mut self, other: Self) {
        self.tree = self.tree.concat(&other.tree);
    }

    /// Returns the concatenation of `self` and `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::Vector;
    /// let left = Vector::<_>::from_iter(0..50);
    /// let right = Vector::<_>::from_iter(50..120);
    /// assert_eq!(left.concat(&right), Vector::<_>::from_iter(0..120));
    /// ```
    pub fn concat(&self, other: &Self) -> Self {
        self.tree.concat(&other.tree).into()
    }

    /// Starts an edit session on a snapshot of this vector.
    pub fn transient(&self) -> TransientVector<T, N, P> {
        TransientVector {
            inner: self.tree.to_transient(),
        }
    }
}

impl<T, const N: usize, P: PointerKind> From<Tree<T, N, P>> for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn from(tree: Tree<T, N, P>) -> Self {
        Vector { tree }
    }
}

impl<T, const N: usize, P: PointerKind> From<Vector<T, N, P>> for Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn from(vec: Vector<T, N, P>) -> Self {
        vec.tree
    }
}

impl<T, const N: usize, P: PointerKind> Default for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug, const N: usize, P: PointerKind> fmt::Debug for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, const N: usize, P: PointerKind> PartialEq for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && (self.ptr_eq(other) || self.iter().eq(other.iter()))
    }
}

impl<T: Eq, const N: usize, P: PointerKind> Eq for Vector<T, N, P> where
    Const<N>: ValidBranchingConstant
{
}

impl<T: Hash, const N: usize, P: PointerKind> Hash for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for value in self {
            value.hash(state);
        }
    }
}

impl<T, const N: usize, P: PointerKind> Index<usize> for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        self.tree.nth(index)
    }
}

impl<T: Clone, const N: usize, P: PointerKind> Extend<T> for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back(value);
        }
    }
}

impl<T: Clone, const N: usize, P: PointerKind> FromIterator<T> for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut ret = Vector::default();
        ret.extend(iter);
        ret
    }
}

impl<T: Clone, const N: usize, P: PointerKind> Add for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self.append(rhs);
        self
    }
}

impl<T: Clone, const N: usize, P: PointerKind> Add for &Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    type Output = Vector<T, N, P>;

    fn add(self, rhs: Self) -> Vector<T, N, P> {
        self.concat(rhs)
    }
}

impl<T: serde::Serialize, const N: usize, P: PointerKind> serde::Serialize for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;

        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for elt in self.iter() {
            seq.serialize_element(elt)?;
        }
        seq.end()
    }
}

impl<'de, T: Clone + serde::Deserialize<'de>, const N: usize, P: PointerKind>
    serde::Deserialize<'de> for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let vec: Vec<T> = Vec::deserialize(deserializer)?;
        Ok(vec.into_iter().collect())
    }
}

impl<T, const N: usize, P: PointerKind> Tree<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    pub fn iter(&self) -> Iter<'_, T, N, P> {
        Iter {
            tree: self,
            front: 0,
            back: self.len(),
            front_run: &[],
            back_run: &[],
        }
    }
}

/// A borrowing iterator over a [`Vector`] or [`Tree`].
///
/// It walks the tree once per leaf rather than once per element.
pub struct Iter<'a, T, const N: usize, P: PointerKind>
where
    Const<N>: ValidBranchingConstant,
{
    tree: &'a Tree<T, N, P>,
    // Indices of the next elements to yield, from either end. Everything in
    // `front..back` is yet to be yielded.
    front: usize,
    back: usize,
    // The rest of the leaf `front` points into, and the start of the leaf
    // `back - 1` points into. Either may run past the other end: the indices
    // are what counts.
    front_run: &'a [T],
    back_run: &'a [T],
}

impl<T, const N: usize, P: PointerKind> Clone for Iter<'_, T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn clone(&self) -> Self {
        Iter { ..*self }
    }
}

impl<'a, T, const N: usize, P: PointerKind> Iterator for Iter<'a, T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        if self.front_run.is_empty() {
            let (block, start, _) = self.tree.region_for(self.front);
            self.front_run = &block[self.front - start..];
        }
        let (first, rest) = self.front_run.split_first()?;
        self.front_run = rest;
        self.front += 1;
        Some(first)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<T, const N: usize, P: PointerKind> DoubleEndedIterator for Iter<'_, T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        if self.back_run.is_empty() {
            let (block, start, _) = self.tree.region_for(self.back - 1);
            self.back_run = &block[..self.back - start];
        }
        let (last, rest) = self.back_run.split_last()?;
        self.back_run = rest;
        self.back -= 1;
        Some(last)
    }
}

impl<T, const N: usize, P: PointerKind> ExactSizeIterator for Iter<'_, T, N, P> where
    Const<N>: ValidBranchingConstant
{
}

impl<T, const N: usize, P: PointerKind> std::iter::FusedIterator for Iter<'_, T, N, P> where
    Const<N>: ValidBranchingConstant
{
}

impl<'a, T, const N: usize, P: PointerKind> IntoIterator for &'a Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T, N, P>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// An owning iterator over a [`Vector`].
///
/// Elements are cloned out of the leaves, which may still be shared with
/// other vectors.
pub struct IntoIter<T, const N: usize, P: PointerKind>
where
    Const<N>: ValidBranchingConstant,
{
    tree: Tree<T, N, P>,
    front: usize,
    back: usize,
    // The leaves holding `front` and `back - 1`, with their first indices.
    front_leaf: Option<(NodeRef<T, N, P>, usize)>,
    back_leaf: Option<(NodeRef<T, N, P>, usize)>,
}

impl<T: Clone, const N: usize, P: PointerKind> IntoIter<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn element(
        tree: &Tree<T, N, P>,
        cache: &mut Option<(NodeRef<T, N, P>, usize)>,
        index: usize,
    ) -> T {
        if let Some((leaf, start)) = cache {
            if index >= *start && index < *start + leaf.len() {
                return leaf.as_leaf()[index - *start].clone();
            }
        }
        let (leaf, start) = tree.region_node(index);
        *cache = Some((leaf.clone(), start));
        leaf.as_leaf()[index - start].clone()
    }
}

impl<T: Clone, const N: usize, P: PointerKind> Iterator for IntoIter<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        let value = Self::element(&self.tree, &mut self.front_leaf, self.front);
        self.front += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<T: Clone, const N: usize, P: PointerKind> DoubleEndedIterator for IntoIter<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    fn next_back(&mut self) -> Option<T> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(Self::element(&self.tree, &mut self.back_leaf, self.back))
    }
}

impl<T: Clone, const N: usize, P: PointerKind> ExactSizeIterator for IntoIter<T, N, P> where
    Const<N>: ValidBranchingConstant
{
}

impl<T: Clone, const N: usize, P: PointerKind> IntoIterator for Vector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    type Item = T;
    type IntoIter = IntoIter<T, N, P>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            front: 0,
            back: self.len(),
            tree: self.tree,
            front_leaf: None,
            back_leaf: None,
        }
    }
}

/// A [`Vector`] being edited in place by a single thread.
///
/// Every method fails once [`persistent`](Self::persistent) has been called,
/// or when called from another thread than the one that created it.
pub struct TransientVector<T, const N: usize = 32, P: PointerKind = ArcK>
where
    Const<N>: ValidBranchingConstant,
{
    inner: TransientTree<T, N, P>,
}

impl<T: Clone, const N: usize, P: PointerKind> TransientVector<T, N, P>
where
    Const<N>: ValidBranchingConstant,
{
    pub fn len(&self) -> Result<usize> {
        self.inner.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.inner.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<Option<&T>> {
        self.inner.get(index)
    }

    pub fn back(&self) -> Result<Option<&T>> {
        if self.inner.is_empty()? {
            return Ok(None);
        }
        self.inner.peek().map(Some)
    }

    pub fn push_back(&mut self, value: T) -> Result<()> {
        self.inner.push(value)
    }

    pub fn pop_back(&mut self) -> Result<Option<T>> {
        let Some(value) = self.back()?.cloned() else {
            return Ok(None);
        };
        self.inner.pop()?;
        Ok(Some(value))
    }

    /// Replaces the element at `index`.
    ///
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        self.inner.update(index, value)
    }

    /// Ends the edit session.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use rrb_vector::{Error, Vector};
    /// let vec = Vector::<_>::from_iter(0..10);
    /// let mut transient = vec.transient();
    /// for i in 10..1000 {
    ///     transient.push_back(i)?;
    /// }
    /// let grown = transient.persistent()?;
    /// assert_eq!(grown.len(), 1000);
    /// assert_eq!(vec.len(), 10);
    /// assert_eq!(transient.push_back(0), Err(Error::UsedAfterFreeze));
    /// # Ok::<(), Error>(())
    /// ```
    pub fn persistent(&mut self) -> Result<Vector<T, N, P>> {
        self.inner.to_persistent().map(Vector::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RcK;

    type V4 = Vector<u32, 4, RcK>;

    #[test]
    fn basic() {
        let mut vec = Vector::<u32, 2>::new();
        vec.as_tree().check_invariants();
        vec.push_back(1);
        assert_eq!(vec.get(0), Some(&1));
        assert_eq!(vec.get(1), None);

        vec.push_back(2);
        vec.push_back(3);
        vec.as_tree().check_invariants();
        assert_eq!(vec.front(), Some(&1));
        assert_eq!(vec.back(), Some(&3));
        assert_eq!(vec[1], 2);

        let mut iter = vec.iter();
        assert_eq!(iter.next(), Some(&1));
        assert_eq!(iter.next(), Some(&2));
        assert_eq!(iter.next(), Some(&3));
        assert_eq!(iter.next(), None);

        assert_eq!(vec.pop_back(), Some(3));
        vec.as_tree().check_invariants();
        vec.push_back(3);

        vec.extend([1, 2, 3]);
        vec.as_tree().check_invariants();
        assert_eq!(6, vec.len());
        assert_eq!(
            vec.iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3, 1, 2, 3]
        );
        assert_eq!(vec.into_iter().collect::<Vec<_>>(), vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn pop_until_empty() {
        let mut vec: V4 = (0..30).collect();
        for i in (0..30).rev() {
            assert_eq!(vec.pop_back(), Some(i));
            vec.as_tree().check_invariants();
        }
        assert_eq!(vec.pop_back(), None);
        assert_eq!(vec.back(), None);
    }

    #[test]
    fn iterate_from_both_ends() {
        let vec = (0..23).collect::<V4>() + (23..80).collect::<V4>();
        let mut iter = vec.iter();
        let mut forward = Vec::new();
        let mut backward = Vec::new();
        loop {
            assert_eq!(iter.len(), 80 - forward.len() - backward.len());
            match (iter.next(), iter.next_back()) {
                (Some(&a), Some(&b)) => {
                    forward.push(a);
                    backward.push(b);
                }
                (Some(&a), None) => forward.push(a),
                _ => break,
            }
        }
        forward.extend(backward.into_iter().rev());
        assert_eq!(forward, (0..80).collect::<Vec<_>>());

        assert_eq!(
            vec.iter().rev().copied().collect::<Vec<_>>(),
            (0..80).rev().collect::<Vec<_>>()
        );
        assert_eq!(
            vec.clone().into_iter().rev().collect::<Vec<_>>(),
            (0..80).rev().collect::<Vec<_>>()
        );
    }

    #[test]
    fn insert_and_remove() {
        let mut vec: V4 = (0..50).collect();
        let mut model: Vec<u32> = (0..50).collect();
        for (i, index) in [0, 50, 17, 4, 33, 52, 1].into_iter().enumerate() {
            vec.insert(index, 100 + i as u32);
            model.insert(index, 100 + i as u32);
            vec.as_tree().check_invariants();
        }
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), model);

        for index in [0, 55, 20, 3, 30, 0] {
            assert_eq!(vec.remove(index), model.remove(index));
            vec.as_tree().check_invariants();
        }
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), model);
    }

    #[test]
    fn remove_range_and_insert_vector() {
        let mut vec: V4 = (0..60).collect();
        let mut model: Vec<u32> = (0..60).collect();

        vec.remove_range(10..25);
        model.drain(10..25);
        vec.as_tree().check_invariants();
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), model);

        let middle: V4 = (100..130).collect();
        vec.insert_vector(7, &middle);
        model.splice(7..7, 100..130);
        vec.as_tree().check_invariants();
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), model);

        vec.insert_vector(vec.len(), &middle);
        model.extend(100..130);
        vec.remove_range(..3);
        model.drain(..3);
        vec.remove_range(40..40);
        vec.as_tree().check_invariants();
        assert_eq!(vec.iter().copied().collect::<Vec<_>>(), model);

        vec.remove_range(..);
        assert!(vec.is_empty());
        assert_eq!(middle, (100..130).collect::<V4>());
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn remove_range_past_the_end() {
        let mut vec: V4 = (0..10).collect();
        vec.remove_range(5..11);
    }

    #[test]
    fn take_skip_slice() {
        let vec: V4 = (0..100).collect();
        assert_eq!(vec.take(10), (0..10).collect::<V4>());
        assert_eq!(vec.take(1000), vec);
        assert_eq!(vec.skip(90), (90..100).collect::<V4>());
        assert!(vec.skip(100).is_empty());
        assert_eq!(vec.slice(5..=7), (5..8).collect::<V4>());
        assert_eq!(vec.slice(95..), (95..100).collect::<V4>());
        assert!(vec.slice(..).ptr_eq(&vec));
    }

    #[test]
    fn edits_do_not_leak_into_clones() {
        let mut vec: V4 = (0..40).collect();
        let snapshot = vec.clone();
        vec.set(3, 1000);
        vec.push_back(40);
        vec.append((0..5).collect::<V4>());
        assert_eq!(vec[3], 1000);
        assert_eq!(vec.len(), 46);
        assert_eq!(snapshot, (0..40).collect::<V4>());
    }

    #[test]
    fn transient_vector() {
        let vec: V4 = (0..10).collect();
        let mut transient = vec.transient();
        assert_eq!(transient.back(), Ok(Some(&9)));
        assert_eq!(transient.pop_back(), Ok(Some(9)));
        transient.set(0, 100).unwrap();
        transient.push_back(10).unwrap();
        assert_eq!(transient.get(0), Ok(Some(&100)));
        assert_eq!(transient.len(), Ok(10));

        let edited = transient.persistent().unwrap();
        assert_eq!(
            edited.iter().copied().collect::<Vec<_>>(),
            [100, 1, 2, 3, 4, 5, 6, 7, 8, 10]
        );
        assert_eq!(vec, (0..10).collect::<V4>());
    }

    #[test]
    fn serde() {
        let vec: V4 = (0..20).collect();
        let json = serde_json::to_string(&vec).unwrap();
        assert_eq!(
            json,
            serde_json::to_string(&(0..20).collect::<Vec<_>>()).unwrap()
        );
        let back: V4 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vec);
    }

    #[test]
    fn debug_and_hash() {
        use std::collections::hash_map::DefaultHasher;

        let vec: V4 = (0..3).collect();
        assert_eq!(format!("{vec:?}"), "[0, 1, 2]");

        let hash = |v: &V4| {
            let mut hasher = DefaultHasher::new();
            v.hash(&mut hasher);
            hasher.finish()
        };
        let concatenated = (0..1).collect::<V4>() + (1..3).collect::<V4>();
        assert_eq!(hash(&vec), hash(&concatenated));
    }
}
