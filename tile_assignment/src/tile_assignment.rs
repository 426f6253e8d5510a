/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! The public tile assignment type.
//!
//! A [`TileAssignment`] is either backed by an [`IotaTileAssignment`]
//! or by a dense [`Array`]. Operations stay in the compact form
//! whenever they can and materialize the dense array only when an
//! algorithm needs it (full traversal, transposes with no iota
//! encoding, comparison against an array-backed peer).
//!
//! Materialization is lazy, happens at most once per instance, and is
//! safe under concurrent readers: the cached array lives behind a
//! mutex and is handed out as a shared [`Arc`] handle, never as a
//! reference whose validity depends on the lock.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::array::is_permutation;
use crate::array::Array;
use crate::iota::transpose_kind;
use crate::iota::IotaTileAssignment;
use crate::iota::TransposeKind;

enum Repr {
    Iota {
        iota: IotaTileAssignment,
        // Filled on first demand, then never changed.
        cache: Mutex<Option<Arc<Array>>>,
    },
    Array(Arc<Array>),
}

/// Mapping from shard coordinates to device ids.
pub struct TileAssignment {
    repr: Repr,
}

// Compile-time assertion: shared across compiler threads.
#[allow(dead_code)]
const _: () = {
    fn assert<T: Send + Sync + 'static>() {}
    let _ = assert::<TileAssignment>;
};

impl TileAssignment {
    /// `[dims]<=[N]`: devices `0..N` in row-major order.
    pub fn new_row_major(dims: &[usize]) -> Self {
        IotaTileAssignment::new_row_major(dims).into()
    }

    /// `[dims]<=[reshape_dims]T(transpose_perm)`.
    pub fn new(dims: &[usize], reshape_dims: &[usize], transpose_perm: &[usize]) -> Self {
        IotaTileAssignment::new(dims, reshape_dims, transpose_perm).into()
    }

    /// A single tile placed on `device`.
    pub fn from_device(device: usize) -> Self {
        Array::filled(vec![1], device).into()
    }

    /// The compact form, if this assignment has one.
    pub fn iota(&self) -> Option<&IotaTileAssignment> {
        match &self.repr {
            Repr::Iota { iota, .. } => Some(iota),
            Repr::Array(_) => None,
        }
    }

    pub fn dimensions(&self) -> &[usize] {
        match &self.repr {
            Repr::Iota { iota, .. } => iota.dims(),
            Repr::Array(array) => array.dimensions(),
        }
    }

    pub fn num_dimensions(&self) -> usize {
        self.dimensions().len()
    }

    pub fn dim(&self, n: usize) -> usize {
        self.dimensions()[n]
    }

    pub fn num_elements(&self) -> usize {
        match &self.repr {
            Repr::Iota { iota, .. } => iota.num_elements(),
            Repr::Array(array) => array.num_elements(),
        }
    }

    /// The device of the first tile in row-major order.
    pub fn first(&self) -> usize {
        match &self.repr {
            // Every iota starts its count at zero.
            Repr::Iota { .. } => 0,
            Repr::Array(array) => array.values()[0],
        }
    }

    /// The device at multi-index `index`.
    pub fn value_at(&self, index: &[usize]) -> usize {
        match &self.repr {
            Repr::Iota { iota, .. } => iota.value_at(index),
            Repr::Array(array) => array.value_at(index),
        }
    }

    /// Reinterprets the tiles under a new shape with the same element
    /// count. Panics if the counts differ.
    pub fn reshape(&self, dims: &[usize]) -> Self {
        match &self.repr {
            Repr::Iota { iota, .. } => iota.reshaped(dims).into(),
            Repr::Array(array) => {
                let mut reshaped = Array::clone(array);
                reshaped.reshape(dims);
                reshaped.into()
            }
        }
    }

    /// Permutes the axes: axis `i` of the result is axis `perm[i]` of
    /// `self`. Stays compact when an iota encoding of the result
    /// exists.
    pub fn transpose(&self, perm: &[usize]) -> Self {
        assert!(
            is_permutation(perm, self.num_dimensions()),
            "{:?} is not a permutation of dimensions {:?}",
            perm,
            self.dimensions()
        );
        if transpose_kind(self.dimensions(), perm) == TransposeKind::Noop {
            return self.clone();
        }
        if let Repr::Iota { iota, .. } = &self.repr {
            if let Some(transposed) = iota.transpose(perm) {
                return transposed.into();
            }
            tracing::debug!(
                "{} has no iota transpose by {:?}, transposing the dense array",
                iota,
                perm
            );
        }
        let mut transposed = self.array_clone();
        transposed.transpose_dimensions(perm);
        transposed.into()
    }

    /// Calls `f(index, device)` for every tile in row-major order.
    pub fn each(&self, f: impl FnMut(&[usize], usize)) {
        self.array().each(f)
    }

    /// Like [`TileAssignment::each`], but stops at the first error
    /// and returns it.
    pub fn each_status<E>(
        &self,
        f: impl FnMut(&[usize], usize) -> Result<(), E>,
    ) -> Result<(), E> {
        self.array().each_status(f)
    }

    /// Whether any tile is placed on `device`.
    pub fn uses_device(&self, device: usize) -> bool {
        match &self.repr {
            Repr::Iota { iota, .. } => device < iota.num_elements(),
            Repr::Array(array) => array.contains(device),
        }
    }

    /// The dense array, materializing it on first use. The returned
    /// handle is shared with this assignment and its clones.
    pub fn array(&self) -> Arc<Array> {
        match &self.repr {
            Repr::Iota { iota, cache } => {
                let mut cache = cache.lock();
                Arc::clone(cache.get_or_insert_with(|| {
                    tracing::debug!("materializing tile assignment {}", iota);
                    Arc::new(iota.to_array())
                }))
            }
            Repr::Array(array) => Arc::clone(array),
        }
    }

    /// A private copy of the dense array, for callers that modify it.
    pub fn array_clone(&self) -> Array {
        Array::clone(&self.array())
    }

    /// Whether the dense array has been computed (or was given).
    pub fn is_materialized(&self) -> bool {
        match &self.repr {
            Repr::Iota { cache, .. } => cache.lock().is_some(),
            Repr::Array(_) => true,
        }
    }
}

impl Clone for TileAssignment {
    fn clone(&self) -> Self {
        let repr = match &self.repr {
            Repr::Iota { iota, cache } => {
                // Snapshot under the source's lock so a concurrent
                // materialization is seen either fully or not at all.
                let cached = cache.lock().clone();
                Repr::Iota {
                    iota: iota.clone(),
                    cache: Mutex::new(cached),
                }
            }
            Repr::Array(array) => Repr::Array(Arc::clone(array)),
        };
        Self { repr }
    }
}

impl Default for TileAssignment {
    /// The replicated assignment: one tile on device 0.
    fn default() -> Self {
        Self::from_device(0)
    }
}

impl From<IotaTileAssignment> for TileAssignment {
    fn from(iota: IotaTileAssignment) -> Self {
        Self {
            repr: Repr::Iota {
                iota,
                cache: Mutex::new(None),
            },
        }
    }
}

impl From<Array> for TileAssignment {
    fn from(array: Array) -> Self {
        Arc::new(array).into()
    }
}

impl From<Arc<Array>> for TileAssignment {
    fn from(array: Arc<Array>) -> Self {
        Self {
            repr: Repr::Array(array),
        }
    }
}

impl PartialEq for TileAssignment {
    fn eq(&self, other: &Self) -> bool {
        if let (Some(lhs), Some(rhs)) = (self.iota(), other.iota()) {
            return lhs == rhs;
        }
        let (lhs, rhs) = (self.array(), other.array());
        Arc::ptr_eq(&lhs, &rhs) || lhs == rhs
    }
}

impl Eq for TileAssignment {}

impl fmt::Debug for TileAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileAssignment")
            .field("dimensions", &self.dimensions())
            .field("iota", &self.iota())
            .field("materialized", &self.is_materialized())
            .finish()
    }
}
