/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Compact "iota" encoding of a tile assignment.
//!
//! An [`IotaTileAssignment`] denotes the dense array obtained by
//!
//! 1. counting up `0..N` in row-major order over `reshape_dims`,
//! 2. permuting the axes by `transpose_perm`, and
//! 3. reinterpreting the result (without moving data) as `dims`.
//!
//! Written `[dims]<=[reshape_dims]T(transpose_perm)`. For example
//! `[2,3]<=[3,2]T(1,0)` is
//!
//! ```text
//! [[0, 2, 4],
//!  [1, 3, 5]]
//! ```
//!
//! The encoding is O(rank) in size regardless of the number of
//! devices, and it is closed under most transposes (see
//! [`IotaTileAssignment::transpose`]), so the dense array rarely
//! needs to exist.

use crate::array::is_permutation;
use crate::array::Array;
use crate::canonical::canonicalize;

/// How a permutation acts on a shape, ignoring size-one axes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransposeKind {
    /// Nothing moves.
    Noop,
    /// Only size-one axes move: the flat element order is unchanged.
    Reshape,
    /// Axes of size greater than one change relative order.
    Transpose,
}

/// Classifies the transpose of an array of shape `dims` by `perm`.
pub fn transpose_kind(dims: &[usize], perm: &[usize]) -> TransposeKind {
    let mut kind = TransposeKind::Noop;
    let mut prev_non_one_dim: Option<usize> = None;
    for (i, &d) in perm.iter().enumerate() {
        if dims[d] == 1 {
            if d != i && dims[i] != 1 {
                kind = TransposeKind::Reshape;
            }
            continue;
        }
        if prev_non_one_dim.is_some_and(|prev| d <= prev) {
            return TransposeKind::Transpose;
        }
        prev_non_one_dim = Some(d);
    }
    kind
}

/// Prime factorization of `n` in ascending order. Empty for `n <= 1`.
pub(crate) fn prime_factors(mut n: usize) -> Vec<usize> {
    let mut factors = Vec::new();
    while n > 1 && n % 2 == 0 {
        factors.push(2);
        n /= 2;
    }
    let mut p = 3;
    while p <= n / p {
        while n % p == 0 {
            factors.push(p);
            n /= p;
        }
        p += 2;
    }
    if n > 1 {
        factors.push(n);
    }
    factors
}

/// A reshape split all the way down to prime factors, with
/// bookkeeping that ties every factor back to the reshape dimension
/// it came from.
#[derive(Debug)]
struct Decomposition {
    /// Prime factors of each reshape dimension, in reshape order.
    reshape_dims: Vec<usize>,
    /// The transpose permutation expanded over the factors.
    transpose_perm: Vec<usize>,
    /// For each position of `transpose_perm`, the reshape dimension
    /// the factor came from.
    origin: Vec<usize>,
    /// For each reshape dimension, the positions in `transpose_perm`
    /// holding its factors.
    positions: Vec<Vec<usize>>,
}

impl Decomposition {
    fn new(reshape_dims: &[usize], transpose_perm: &[usize]) -> Self {
        let mut factors = Vec::new();
        // Factors of reshape dim `i` occupy `bounds[i]..bounds[i + 1]`.
        let mut bounds = vec![0; reshape_dims.len() + 1];
        for (i, &size) in reshape_dims.iter().enumerate() {
            factors.extend(prime_factors(size));
            bounds[i + 1] = factors.len();
        }

        let mut perm = Vec::with_capacity(factors.len());
        let mut origin = Vec::with_capacity(factors.len());
        let mut positions = vec![Vec::new(); reshape_dims.len()];
        for &dim in transpose_perm {
            for factor in bounds[dim]..bounds[dim + 1] {
                positions[dim].push(perm.len());
                perm.push(factor);
                origin.push(dim);
            }
        }

        Self {
            reshape_dims: factors,
            transpose_perm: perm,
            origin,
            positions,
        }
    }

    fn len(&self) -> usize {
        self.transpose_perm.len()
    }

    /// Picks the factor at permuted position `idx` if it divides
    /// `target`. Otherwise looks further ahead among factors of the
    /// same reshape dimension and, if one divides `target`, swaps the
    /// two factor sizes (an equally valid split of that dimension).
    /// Returns the reshape index of the chosen factor.
    fn candidate(&mut self, target: usize, idx: usize) -> Option<usize> {
        let dim = self.transpose_perm[idx];
        if target % self.reshape_dims[dim] == 0 {
            return Some(dim);
        }
        let origin = self.origin[idx];
        let ahead = self.positions[origin]
            .iter()
            .copied()
            .filter(|&later| later > idx)
            .map(|later| self.transpose_perm[later])
            .find(|&other| target % self.reshape_dims[other] == 0)?;
        self.reshape_dims.swap(dim, ahead);
        Some(dim)
    }
}

/// Compact tile assignment: `[dims]<=[reshape_dims]T(transpose_perm)`.
///
/// Values are always canonical (see [`crate::canonical`]), so
/// structural equality coincides with equality of the denoted arrays.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IotaTileAssignment {
    dims: Vec<usize>,
    reshape_dims: Vec<usize>,
    transpose_perm: Vec<usize>,
}

impl IotaTileAssignment {
    /// The row-major count-up over `dims`: `[dims]<=[N]`.
    ///
    /// Panics if a dimension is zero.
    pub fn new_row_major(dims: &[usize]) -> Self {
        assert!(
            dims.iter().all(|&d| d > 0),
            "dims {:?} must be positive",
            dims
        );
        Self {
            dims: dims.to_vec(),
            reshape_dims: vec![dims.iter().product()],
            transpose_perm: vec![0],
        }
    }

    /// `[dims]<=[reshape_dims]T(transpose_perm)`, canonicalized.
    ///
    /// Panics if `transpose_perm` is not a permutation of the reshape
    /// axes, if a reshape dimension is zero, or if `dims` and
    /// `reshape_dims` hold different element counts.
    pub fn new(dims: &[usize], reshape_dims: &[usize], transpose_perm: &[usize]) -> Self {
        assert!(
            is_permutation(transpose_perm, reshape_dims.len()),
            "{:?} is not a permutation of reshape dims {:?}",
            transpose_perm,
            reshape_dims
        );
        assert!(
            reshape_dims.iter().all(|&d| d > 0),
            "reshape dims {:?} must be positive",
            reshape_dims
        );
        assert_eq!(
            dims.iter().product::<usize>(),
            reshape_dims.iter().product::<usize>(),
            "dims {:?} and reshape dims {:?} differ in element count",
            dims,
            reshape_dims
        );
        let (reshape_dims, transpose_perm) = canonicalize(reshape_dims, transpose_perm);
        Self {
            dims: dims.to_vec(),
            reshape_dims,
            transpose_perm,
        }
    }

    /// The same encoding viewed under a different shape. This is the
    /// whole of an iota reshape: the flat order does not change.
    pub(crate) fn reshaped(&self, dims: &[usize]) -> Self {
        assert_eq!(
            dims.iter().product::<usize>(),
            self.num_elements(),
            "cannot reshape {:?} into {:?}",
            self.dims,
            dims
        );
        Self {
            dims: dims.to_vec(),
            reshape_dims: self.reshape_dims.clone(),
            transpose_perm: self.transpose_perm.clone(),
        }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    pub fn dim(&self, n: usize) -> usize {
        self.dims[n]
    }

    pub fn reshape_dims(&self) -> &[usize] {
        &self.reshape_dims
    }

    pub fn reshape_ndims(&self) -> usize {
        self.reshape_dims.len()
    }

    pub fn transpose_perm(&self) -> &[usize] {
        &self.transpose_perm
    }

    pub fn num_elements(&self) -> usize {
        self.reshape_dims.iter().product()
    }

    /// Materializes the dense array.
    pub fn to_array(&self) -> Array {
        let mut array = Array::new(self.reshape_dims.clone());
        array.fill_iota(0);
        array.transpose_dimensions(&self.transpose_perm);
        array.reshape(&self.dims);
        array
    }

    /// The device id at multi-index `index`, computed without
    /// materializing.
    pub fn value_at(&self, index: &[usize]) -> usize {
        assert_eq!(
            index.len(),
            self.dims.len(),
            "index {:?} has wrong rank for dims {:?}",
            index,
            self.dims
        );
        // Linear offset in the transposed, flattened order.
        let mut linear = 0;
        for (&i, &d) in index.iter().zip(&self.dims) {
            assert!(i < d, "index {:?} out of range {:?}", index, self.dims);
            linear = linear * d + i;
        }
        // Peel off digits minor to major in transposed order: this
        // undoes the transpose.
        let mut reshape_index = vec![0; self.reshape_dims.len()];
        for &dim in self.transpose_perm.iter().rev() {
            let size = self.reshape_dims[dim];
            reshape_index[dim] = linear % size;
            linear /= size;
        }
        reshape_index
            .iter()
            .zip(&self.reshape_dims)
            .fold(0, |value, (&i, &size)| value * size + i)
    }

    /// Transposes by `perm` (axis `i` of the result is axis `perm[i]`
    /// of `self`) while staying in the compact form.
    ///
    /// Returns `None` when no iota encoding of the result could be
    /// found; the caller then has to transpose the dense array. The
    /// result is never approximate.
    pub fn transpose(&self, perm: &[usize]) -> Option<Self> {
        assert!(
            is_permutation(perm, self.ndims()),
            "{:?} is not a permutation of dims {:?}",
            perm,
            self.dims
        );
        let dims = &self.dims;
        let kind = transpose_kind(dims, perm);
        tracing::trace!("transpose {} by {:?}: {:?}", self, perm, kind);
        if kind == TransposeKind::Noop {
            return Some(self.clone());
        }
        let new_dims: Vec<usize> = perm.iter().map(|&p| dims[p]).collect();
        if kind == TransposeKind::Reshape {
            return Some(Self::new(
                &new_dims,
                &self.reshape_dims,
                &self.transpose_perm,
            ));
        }
        // A flat count-up: the old shape becomes the reshape.
        if self.reshape_ndims() == 1 {
            return Some(Self::new(&new_dims, dims, perm));
        }

        // If the non-unit dims line up one to one with the transposed
        // reshape dims, transposing is just composing permutations.
        let mut is_pure_transpose = true;
        let mut non_one_dims = Vec::with_capacity(dims.len());
        let mut one_to_non_one: Vec<Option<usize>> = Vec::with_capacity(dims.len());
        for &dim in dims {
            if dim == 1 {
                one_to_non_one.push(None);
                continue;
            }
            let k = non_one_dims.len();
            if k >= self.reshape_ndims() || self.reshape_dims[self.transpose_perm[k]] != dim {
                is_pure_transpose = false;
            }
            one_to_non_one.push(Some(k));
            non_one_dims.push(dim);
        }
        if is_pure_transpose {
            let new_perm: Vec<usize> = perm
                .iter()
                .filter_map(|&p| one_to_non_one[p])
                .map(|k| self.transpose_perm[k])
                .collect();
            debug_assert_eq!(new_perm.len(), self.reshape_ndims());
            return Some(Self::new(&new_dims, &self.reshape_dims, &new_perm));
        }

        // General case: split the reshape into prime factors and try to
        // regroup consecutive (transposed) factors into each non-unit
        // dim, major to minor.
        let mut decomposition = Decomposition::new(&self.reshape_dims, &self.transpose_perm);
        let total = decomposition.len();
        debug_assert!(non_one_dims.len() <= total);
        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); non_one_dims.len()];
        let mut idx = 0;
        for (group, &dim) in groups.iter_mut().zip(&non_one_dims) {
            if idx >= total {
                break;
            }
            let mut target = dim;
            while let Some(factor) = decomposition.candidate(target, idx) {
                target /= decomposition.reshape_dims[factor];
                group.push(factor);
                idx += 1;
                if idx >= total {
                    break;
                }
            }
            if target != 1 {
                // A quotient is left over: e.g. `[2,3]<=[2,3]T(1,0)`
                // interleaves the mesh axes and has no iota transpose.
                return None;
            }
        }

        let flattened: Vec<usize> = perm
            .iter()
            .filter_map(|&p| one_to_non_one[p])
            .flat_map(|k| groups[k].iter().copied())
            .collect();
        if flattened.len() != total {
            return None;
        }
        Some(Self::new(
            &new_dims,
            &decomposition.reshape_dims,
            &flattened,
        ))
    }
}
