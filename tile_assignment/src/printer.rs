/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Text rendering of tile assignments.
//!
//! The canonical forms are
//!
//! ```text
//! devices=[2,3]<=[3,2]T(1,0)    iota-backed
//! devices=[4]<=[4]              iota-backed, single reshape dim
//! devices=[2,2]3,1,2,0          array-backed (row-major values)
//! ```
//!
//! and are parsed back by [`crate::parse`]. Rendering goes through a
//! [`Printer`] sink so callers embedding assignments in larger
//! documents can append in place.

use std::fmt;

use crate::iota::IotaTileAssignment;
use crate::tile_assignment::TileAssignment;

/// An append-only text sink.
pub trait Printer {
    fn append(&mut self, text: &str);
}

/// A [`Printer`] that accumulates into a `String`.
#[derive(Debug, Default)]
pub struct StringPrinter(String);

impl StringPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Printer for StringPrinter {
    fn append(&mut self, text: &str) {
        self.0.push_str(text);
    }
}

impl Printer for String {
    fn append(&mut self, text: &str) {
        self.push_str(text);
    }
}

/// Appends `items` separated by `separator`.
pub fn append_join<P, I>(printer: &mut P, items: I, separator: &str)
where
    P: Printer + ?Sized,
    I: IntoIterator,
    I::Item: fmt::Display,
{
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            printer.append(separator);
        }
        printer.append(&item.to_string());
    }
}

impl IotaTileAssignment {
    /// Appends `[dims]<=[reshape_dims]T(transpose_perm)`; the
    /// transpose is omitted when there is a single reshape dim.
    pub fn print<P: Printer + ?Sized>(&self, printer: &mut P) {
        printer.append("[");
        append_join(printer, self.dims(), ",");
        printer.append("]<=[");
        append_join(printer, self.reshape_dims(), ",");
        printer.append("]");
        if self.reshape_ndims() > 1 {
            printer.append("T(");
            append_join(printer, self.transpose_perm(), ",");
            printer.append(")");
        }
    }
}

impl TileAssignment {
    /// Appends `devices=` followed by the iota form, or by the
    /// dimensions and row-major values of the dense array.
    pub fn print<P: Printer + ?Sized>(&self, printer: &mut P) {
        printer.append("devices=");
        match self.iota() {
            Some(iota) => iota.print(printer),
            None => {
                let array = self.array();
                printer.append("[");
                append_join(printer, array.dimensions(), ",");
                printer.append("]");
                append_join(printer, array.values(), ",");
            }
        }
    }
}

impl fmt::Display for IotaTileAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = StringPrinter::new();
        self.print(&mut printer);
        f.write_str(&printer.into_string())
    }
}

impl fmt::Display for TileAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = StringPrinter::new();
        self.print(&mut printer);
        f.write_str(&printer.into_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::Array;

    #[test]
    fn test_append_join() {
        let mut out = String::new();
        append_join(&mut out, [1, 2, 3], ",");
        assert_eq!(out, "1,2,3");
        let mut out = String::new();
        append_join(&mut out, Vec::<usize>::new(), ",");
        assert_eq!(out, "");
    }

    #[test]
    fn test_iota_text() {
        let iota = IotaTileAssignment::new(&[2, 3], &[3, 2], &[1, 0]);
        assert_eq!(iota.to_string(), "[2,3]<=[3,2]T(1,0)");
        assert_eq!(
            IotaTileAssignment::new_row_major(&[4, 2]).to_string(),
            "[4,2]<=[8]"
        );
    }

    #[test]
    fn test_tile_assignment_text() {
        let tiles = TileAssignment::new(&[4, 5, 24], &[15, 4, 8], &[1, 0, 2]);
        assert_eq!(tiles.to_string(), "devices=[4,5,24]<=[15,4,8]T(1,0,2)");

        let dense = TileAssignment::from(Array::from_vec(vec![2, 2], vec![3, 1, 2, 0]).unwrap());
        assert_eq!(dense.to_string(), "devices=[2,2]3,1,2,0");
        assert_eq!(TileAssignment::default().to_string(), "devices=[1]0");
    }

    #[test]
    fn test_print_appends_in_place() {
        let mut printer = StringPrinter::new();
        printer.append("sharding={");
        TileAssignment::new_row_major(&[2]).print(&mut printer);
        printer.append("}");
        assert_eq!(printer.into_string(), "sharding={devices=[2]<=[2]}");
    }
}
