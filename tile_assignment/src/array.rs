/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Dense, row-major arrays of device ids.
//!
//! [`Array`] is the materialized form of a tile assignment: one
//! device id per shard coordinate, stored in row-major order. It
//! supports the handful of layout operations the compact encoding
//! falls back to (reshape, axis transposition, traversal).

use std::ops::Index;

/// Errors raised when building an [`Array`] from untrusted parts.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShapeError {
    /// The number of values does not match the product of the
    /// dimensions.
    #[error("dimensions {dims:?} hold {expected} elements, got {got}")]
    ElementCountMismatch {
        dims: Vec<usize>,
        expected: usize,
        got: usize,
    },

    /// The product of the dimensions does not fit in a `usize`.
    #[error("element count of dimensions {0:?} overflows")]
    ElementCountOverflow(Vec<usize>),

    /// A dimension of size zero.
    #[error("dimensions {0:?} must be positive")]
    ZeroDimension(Vec<usize>),
}

/// The number of elements of `dims`, or `None` if it overflows.
pub fn checked_product(dims: &[usize]) -> Option<usize> {
    dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

/// Row-major strides for `dims`: the last axis varies fastest.
pub fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for axis in (0..dims.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * dims[axis + 1];
    }
    strides
}

/// Returns true if `perm` is a permutation of `0..n`.
pub(crate) fn is_permutation(perm: &[usize], n: usize) -> bool {
    if perm.len() != n {
        return false;
    }
    let mut seen = vec![false; n];
    for &p in perm {
        if p >= n || seen[p] {
            return false;
        }
        seen[p] = true;
    }
    true
}

/// Advances `index` to the next coordinate of `dims` in row-major
/// order. Returns false once the traversal wraps around.
fn advance(index: &mut [usize], dims: &[usize]) -> bool {
    for axis in (0..dims.len()).rev() {
        index[axis] += 1;
        if index[axis] < dims[axis] {
            return true;
        }
        index[axis] = 0;
    }
    false
}

/// An N-dimensional array of device ids in row-major order.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Array {
    dims: Vec<usize>,
    values: Vec<usize>,
}

impl Array {
    /// A zero-filled array of shape `dims`.
    pub fn new(dims: Vec<usize>) -> Self {
        Self::filled(dims, 0)
    }

    /// An array of shape `dims` with every element set to `value`.
    pub fn filled(dims: Vec<usize>, value: usize) -> Self {
        let len = dims.iter().product();
        Self {
            dims,
            values: vec![value; len],
        }
    }

    /// Builds an array from row-major `values`. Every dimension must
    /// be positive.
    pub fn from_vec(dims: Vec<usize>, values: Vec<usize>) -> Result<Self, ShapeError> {
        if dims.contains(&0) {
            return Err(ShapeError::ZeroDimension(dims));
        }
        let Some(expected) = checked_product(&dims) else {
            return Err(ShapeError::ElementCountOverflow(dims));
        };
        if expected != values.len() {
            return Err(ShapeError::ElementCountMismatch {
                dims,
                expected,
                got: values.len(),
            });
        }
        Ok(Self { dims, values })
    }

    /// Overwrites the elements with `start, start + 1, ...` in
    /// row-major order.
    pub fn fill_iota(&mut self, start: usize) {
        for (i, value) in self.values.iter_mut().enumerate() {
            *value = start + i;
        }
    }

    /// Reinterprets the elements under a new shape. The element order
    /// is unchanged.
    pub fn reshape(&mut self, dims: &[usize]) {
        let len: usize = dims.iter().product();
        assert_eq!(
            len,
            self.values.len(),
            "cannot reshape {:?} into {:?}",
            self.dims,
            dims
        );
        self.dims = dims.to_vec();
    }

    /// Permutes the axes: axis `i` of the result is axis `perm[i]` of
    /// `self`.
    pub fn transpose_dimensions(&mut self, perm: &[usize]) {
        assert!(
            is_permutation(perm, self.dims.len()),
            "{:?} is not a permutation of {} axes",
            perm,
            self.dims.len()
        );
        let old_strides = row_major_strides(&self.dims);
        let dims: Vec<usize> = perm.iter().map(|&p| self.dims[p]).collect();
        let strides: Vec<usize> = perm.iter().map(|&p| old_strides[p]).collect();

        let mut values = Vec::with_capacity(self.values.len());
        let mut index = vec![0; dims.len()];
        for _ in 0..self.values.len() {
            let offset: usize = index.iter().zip(&strides).map(|(i, s)| i * s).sum();
            values.push(self.values[offset]);
            advance(&mut index, &dims);
        }
        self.dims = dims;
        self.values = values;
    }

    pub fn dimensions(&self) -> &[usize] {
        &self.dims
    }

    pub fn num_dimensions(&self) -> usize {
        self.dims.len()
    }

    pub fn dim(&self, n: usize) -> usize {
        self.dims[n]
    }

    pub fn num_elements(&self) -> usize {
        self.values.len()
    }

    /// The elements in row-major order.
    pub fn values(&self) -> &[usize] {
        &self.values
    }

    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.values.iter()
    }

    /// Linear search for `value`.
    pub fn contains(&self, value: usize) -> bool {
        self.values.contains(&value)
    }

    /// The element at multi-index `index`.
    pub fn value_at(&self, index: &[usize]) -> usize {
        self.values[self.offset_of(index)]
    }

    // Row-major linear offset of `index`.
    fn offset_of(&self, index: &[usize]) -> usize {
        assert_eq!(
            index.len(),
            self.dims.len(),
            "index {:?} has wrong rank for dimensions {:?}",
            index,
            self.dims
        );
        let mut offset = 0;
        for (&i, &d) in index.iter().zip(&self.dims) {
            assert!(i < d, "index {:?} out of range {:?}", index, self.dims);
            offset = offset * d + i;
        }
        offset
    }

    /// Calls `f(index, value)` for every element in row-major order.
    pub fn each(&self, mut f: impl FnMut(&[usize], usize)) {
        let mut index = vec![0; self.dims.len()];
        for &value in &self.values {
            f(&index, value);
            advance(&mut index, &self.dims);
        }
    }

    /// Like [`Array::each`], but stops at the first error and returns
    /// it.
    pub fn each_status<E>(
        &self,
        mut f: impl FnMut(&[usize], usize) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut index = vec![0; self.dims.len()];
        for &value in &self.values {
            f(&index, value)?;
            advance(&mut index, &self.dims);
        }
        Ok(())
    }
}

impl Index<&[usize]> for Array {
    type Output = usize;

    fn index(&self, index: &[usize]) -> &usize {
        &self.values[self.offset_of(index)]
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a usize;
    type IntoIter = std::slice::Iter<'a, usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iota(dims: &[usize]) -> Array {
        let mut array = Array::new(dims.to_vec());
        array.fill_iota(0);
        array
    }

    #[test]
    fn test_row_major_strides() {
        assert_eq!(row_major_strides(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(row_major_strides(&[5]), vec![1]);
        assert!(row_major_strides(&[]).is_empty());
    }

    #[test]
    fn test_fill_iota_and_index() {
        let array = iota(&[2, 3]);
        assert_eq!(array.values(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(array[&[1, 2][..]], 5);
        assert_eq!(array.value_at(&[1, 0]), 3);
        assert_eq!(array.num_elements(), 6);
        assert_eq!(array.dim(1), 3);
    }

    #[test]
    fn test_transpose_2d() {
        let mut array = iota(&[2, 3]);
        array.transpose_dimensions(&[1, 0]);
        assert_eq!(array.dimensions(), &[3, 2]);
        assert_eq!(array.values(), &[0, 3, 1, 4, 2, 5]);
    }

    #[test]
    fn test_transpose_3d() {
        let mut array = iota(&[2, 3, 4]);
        array.transpose_dimensions(&[2, 0, 1]);
        assert_eq!(array.dimensions(), &[4, 2, 3]);
        // result[k, i, j] == original[i, j, k]
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    assert_eq!(array.value_at(&[k, i, j]), i * 12 + j * 4 + k);
                }
            }
        }
    }

    #[test]
    #[should_panic(expected = "not a permutation")]
    fn test_transpose_rejects_bad_perm() {
        iota(&[2, 3]).transpose_dimensions(&[0, 0]);
    }

    #[test]
    fn test_reshape_keeps_order() {
        let mut array = iota(&[2, 6]);
        array.reshape(&[3, 4]);
        assert_eq!(array.dimensions(), &[3, 4]);
        assert_eq!(array.value_at(&[2, 1]), 9);
    }

    #[test]
    #[should_panic(expected = "cannot reshape")]
    fn test_reshape_count_mismatch() {
        iota(&[2, 3]).reshape(&[4]);
    }

    #[test]
    fn test_each_row_major() {
        let array = iota(&[2, 2]);
        let mut seen = Vec::new();
        array.each(|index, value| seen.push((index.to_vec(), value)));
        assert_eq!(
            seen,
            vec![
                (vec![0, 0], 0),
                (vec![0, 1], 1),
                (vec![1, 0], 2),
                (vec![1, 1], 3),
            ]
        );
    }

    #[test]
    fn test_each_status_stops_at_first_error() {
        let array = iota(&[3, 2]);
        let mut visited = 0;
        let result = array.each_status(|index, value| {
            visited += 1;
            if value == 3 {
                Err(index.to_vec())
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err(vec![1, 1]));
        assert_eq!(visited, 4);
    }

    #[test]
    fn test_rank_zero() {
        let array = Array::filled(vec![], 7);
        assert_eq!(array.num_elements(), 1);
        assert_eq!(array.value_at(&[]), 7);
        let mut calls = 0;
        array.each(|index, value| {
            assert!(index.is_empty());
            assert_eq!(value, 7);
            calls += 1;
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_from_vec_checks_count() {
        assert_eq!(
            Array::from_vec(vec![2, 2], vec![0, 1, 2]),
            Err(ShapeError::ElementCountMismatch {
                dims: vec![2, 2],
                expected: 4,
                got: 3,
            })
        );
        let array = Array::from_vec(vec![3], vec![4, 5, 6]).unwrap();
        assert!(array.contains(5));
        assert!(!array.contains(0));
    }

    #[test]
    fn test_from_vec_rejects_empty_and_overflowing_shapes() {
        assert_eq!(
            Array::from_vec(vec![0], vec![]),
            Err(ShapeError::ZeroDimension(vec![0]))
        );
        assert_eq!(
            Array::from_vec(vec![2, 0, 3], vec![]),
            Err(ShapeError::ZeroDimension(vec![2, 0, 3]))
        );
        assert_eq!(
            Array::from_vec(vec![usize::MAX, 2], vec![1]),
            Err(ShapeError::ElementCountOverflow(vec![usize::MAX, 2]))
        );
        assert_eq!(Array::from_vec(vec![], vec![9]).unwrap().value_at(&[]), 9);
    }

    #[test]
    fn test_checked_product() {
        assert_eq!(checked_product(&[]), Some(1));
        assert_eq!(checked_product(&[2, 3, 4]), Some(24));
        assert_eq!(checked_product(&[1 << 32, 1 << 32]), None);
        assert_eq!(checked_product(&[usize::MAX, usize::MAX]), None);
    }
}
