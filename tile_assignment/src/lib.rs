/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Device tile assignments.
//!
//! A tile assignment maps each shard of a partitioned value (a
//! coordinate in a multi-dimensional grid of tiles) to the id of the
//! device that holds it. For large meshes the dense mapping is big,
//! but in practice it is almost always a reshaped and transposed
//! count-up of device ids. This crate represents such assignments
//! compactly as an [`IotaTileAssignment`], implements the algebra
//! (canonicalization, indexing, transposition) directly on that form,
//! and wraps it in a [`TileAssignment`] that falls back to a dense
//! [`Array`] only when it must.
//!
//! ```
//! use tile_assignment::TileAssignment;
//!
//! // Devices 0..6 laid out as [3, 2], transposed, viewed as [2, 3].
//! let tiles = TileAssignment::new(&[2, 3], &[3, 2], &[1, 0]);
//! assert_eq!(tiles.value_at(&[1, 2]), 5);
//! assert_eq!(tiles.to_string(), "devices=[2,3]<=[3,2]T(1,0)");
//!
//! let transposed = tiles.transpose(&[1, 0]);
//! assert_eq!(transposed.to_string(), "devices=[3,2]<=[6]");
//! ```

pub mod array;
pub mod canonical;
pub mod iota;
pub mod parse;
pub mod printer;
#[cfg(test)]
pub mod strategy;
pub mod tile_assignment;

pub use array::Array;
pub use array::ShapeError;
pub use iota::IotaTileAssignment;
pub use iota::TransposeKind;
pub use parse::ParseError;
pub use printer::Printer;
pub use printer::StringPrinter;
pub use tile_assignment::TileAssignment;
