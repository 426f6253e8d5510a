/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Canonical form of an iota `(reshape_dims, transpose_perm)` pair.
//!
//! Many pairs denote the same dense array. Canonicalization picks the
//! one with the fewest reshape dimensions by repeatedly
//!
//! 1. dropping dimensions of size one, and
//! 2. merging runs of dimensions that stay adjacent, in order, under
//!    the permutation.
//!
//! Some examples, written as `[reshape_dims]T(transpose_perm)`:
//!
//! ```text
//! [3,4,5]T(0,1,2)             => [60]T(0)
//! [3,4,5]T(1,2,0)             => [3,20]T(1,0)
//! [3,4,5]T(2,0,1)             => [12,5]T(1,0)
//! [3,4,5]T(1,0,2)             => [3,4,5]T(1,0,2)
//! [1,3,1,4,1,5]T(4,3,2,5,1,0) => [3,20]T(1,0)
//! ```
//!
//! Canonical pairs are unique per dense array, so two canonical iota
//! encodings of the same shape can be compared structurally.

/// Returns the canonical form of `(reshape_dims, transpose_perm)`.
///
/// The two inputs must have equal length and `transpose_perm` must be
/// a permutation of their indices. A pair that reduces to nothing
/// (every dimension has size one) canonicalizes to `([1], [0])`.
pub fn canonicalize(
    reshape_dims: &[usize],
    transpose_perm: &[usize],
) -> (Vec<usize>, Vec<usize>) {
    debug_assert_eq!(reshape_dims.len(), transpose_perm.len());
    let mut dims = reshape_dims.to_vec();
    let mut perm = transpose_perm.to_vec();

    loop {
        drop_unit_dims(&mut dims, &mut perm);
        if !merge_adjacent_dims(&mut dims, &perm) {
            break;
        }
    }

    if dims.is_empty() {
        return (vec![1], vec![0]);
    }
    (dims, perm)
}

// Removes every dimension of size one and renumbers the permutation
// accordingly.
fn drop_unit_dims(dims: &mut Vec<usize>, perm: &mut Vec<usize>) {
    if !dims.contains(&1) {
        return;
    }
    let mut old_to_new = Vec::with_capacity(dims.len());
    let mut next = 0;
    for &d in dims.iter() {
        if d == 1 {
            old_to_new.push(None);
        } else {
            old_to_new.push(Some(next));
            next += 1;
        }
    }
    *perm = perm.iter().filter_map(|&p| old_to_new[p]).collect();
    dims.retain(|&d| d != 1);
}

// Folds each maximal run of permutation entries `b, b+1, ..., b+k`
// into dimension `b`, leaving size-one placeholders behind for the
// next `drop_unit_dims`. Expects no size-one dimensions. Returns true
// if anything was merged.
fn merge_adjacent_dims(dims: &mut [usize], perm: &[usize]) -> bool {
    let mut changed = false;
    let mut base = 0;
    for i in 1..perm.len() {
        let base_dim = perm[base];
        let dim = perm[i];
        if base_dim + (i - base) == dim {
            dims[base_dim] *= dims[dim];
            dims[dim] = 1;
            changed = true;
        } else {
            base = i;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::strategy::gen_perm;

    #[test]
    fn test_identity_collapses() {
        assert_eq!(canonicalize(&[3, 4, 5], &[0, 1, 2]), (vec![60], vec![0]));
    }

    #[test]
    fn test_partial_merges() {
        assert_eq!(
            canonicalize(&[3, 4, 5], &[1, 2, 0]),
            (vec![3, 20], vec![1, 0])
        );
        assert_eq!(
            canonicalize(&[3, 4, 5], &[2, 0, 1]),
            (vec![12, 5], vec![1, 0])
        );
    }

    #[test]
    fn test_already_minimal() {
        assert_eq!(
            canonicalize(&[3, 4, 5], &[1, 0, 2]),
            (vec![3, 4, 5], vec![1, 0, 2])
        );
        assert_eq!(
            canonicalize(&[3, 4, 5], &[2, 1, 0]),
            (vec![3, 4, 5], vec![2, 1, 0])
        );
    }

    #[test]
    fn test_unit_dims_then_merge() {
        assert_eq!(
            canonicalize(&[1, 3, 1, 4, 1, 5], &[4, 3, 2, 5, 1, 0]),
            (vec![3, 20], vec![1, 0])
        );
    }

    #[test]
    fn test_all_unit_dims() {
        assert_eq!(canonicalize(&[1, 1, 1], &[2, 0, 1]), (vec![1], vec![0]));
        assert_eq!(canonicalize(&[1], &[0]), (vec![1], vec![0]));
        assert_eq!(canonicalize(&[], &[]), (vec![1], vec![0]));
    }

    #[test]
    fn test_single_dim_is_fixed_point() {
        assert_eq!(canonicalize(&[8], &[0]), (vec![8], vec![0]));
    }

    proptest! {
        #[test]
        fn canonicalize_is_idempotent(
            (dims, perm) in prop::collection::vec(1usize..=5, 0..=5)
                .prop_flat_map(|dims| {
                    let n = dims.len();
                    (Just(dims), gen_perm(n))
                })
        ) {
            let (once_dims, once_perm) = canonicalize(&dims, &perm);
            let (twice_dims, twice_perm) = canonicalize(&once_dims, &once_perm);
            prop_assert_eq!(&once_dims, &twice_dims);
            prop_assert_eq!(&once_perm, &twice_perm);
            prop_assert_eq!(
                once_dims.iter().product::<usize>(),
                dims.iter().product::<usize>()
            );
            if once_dims.len() > 1 {
                prop_assert!(!once_dims.contains(&1));
            }
        }
    }
}
