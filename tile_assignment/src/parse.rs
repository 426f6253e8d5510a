/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Parsing of the text forms produced by [`crate::printer`].
//!
//! ```text
//! iota             ::= dims "<=" dims ("T(" list ")")?
//! tile_assignment  ::= "devices=" (iota | dims list)
//! dims             ::= "[" list? "]"
//! list             ::= usize ("," usize)*
//! ```
//!
//! Parsed iota forms go through [`IotaTileAssignment::new`], so the
//! result is canonical even when the input is not. Structural
//! problems that would trip a constructor precondition are reported
//! as [`ParseError`]s instead.

use std::str::FromStr;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::char;
use nom::character::complete::digit1;
use nom::combinator::all_consuming;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::multi::separated_list0;
use nom::multi::separated_list1;
use nom::sequence::delimited;
use nom::sequence::pair;
use nom::sequence::preceded;
use nom::sequence::tuple;
use nom::IResult;
use serde::de;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::array::checked_product;
use crate::array::is_permutation;
use crate::array::Array;
use crate::array::ShapeError;
use crate::iota::IotaTileAssignment;
use crate::tile_assignment::TileAssignment;

/// Errors from parsing a tile assignment.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The input does not follow the grammar.
    #[error("invalid tile assignment syntax: {0}")]
    Syntax(String),

    /// A dimension of size zero.
    #[error("dimensions {0:?} must be positive")]
    ZeroDimension(Vec<usize>),

    /// `dims` and `reshape_dims` describe different element counts.
    #[error("dims {dims:?} and reshape dims {reshape_dims:?} differ in element count")]
    ElementCountMismatch {
        dims: Vec<usize>,
        reshape_dims: Vec<usize>,
    },

    /// The element count of `dims` or `reshape_dims` does not fit in
    /// a `usize`.
    #[error("element count of dimensions {0:?} overflows")]
    ElementCountOverflow(Vec<usize>),

    /// The transpose clause is not a permutation of the reshape axes.
    #[error("{perm:?} is not a permutation of {rank} reshape dims")]
    InvalidPermutation { perm: Vec<usize>, rank: usize },

    /// The listed values do not fill the dimensions.
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

// The unvalidated pieces of an iota form.
type IotaParts = (Vec<usize>, Vec<usize>, Option<Vec<usize>>);

enum Parsed {
    Iota(IotaParts),
    Array(Vec<usize>, Vec<usize>),
}

fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse)(input)
}

fn list(input: &str) -> IResult<&str, Vec<usize>> {
    separated_list1(char(','), number)(input)
}

fn dims(input: &str) -> IResult<&str, Vec<usize>> {
    delimited(char('['), separated_list0(char(','), number), char(']'))(input)
}

fn iota(input: &str) -> IResult<&str, IotaParts> {
    tuple((
        dims,
        preceded(tag("<="), dims),
        opt(delimited(tag("T("), list, char(')'))),
    ))(input)
}

fn tile_assignment(input: &str) -> IResult<&str, Parsed> {
    preceded(
        tag("devices="),
        alt((
            map(iota, Parsed::Iota),
            map(pair(dims, list), |(dims, values)| Parsed::Array(dims, values)),
        )),
    )(input)
}

fn syntax_error(input: &str, err: nom::Err<nom::error::Error<&str>>) -> ParseError {
    ParseError::Syntax(format!("{:?}: {}", input, err))
}

// Checks what `IotaTileAssignment::new` would otherwise assert.
fn build_iota(
    (dims, reshape_dims, perm): IotaParts,
) -> Result<IotaTileAssignment, ParseError> {
    if dims.contains(&0) {
        return Err(ParseError::ZeroDimension(dims));
    }
    if reshape_dims.is_empty() || reshape_dims.contains(&0) {
        return Err(ParseError::ZeroDimension(reshape_dims));
    }
    let Some(count) = checked_product(&dims) else {
        return Err(ParseError::ElementCountOverflow(dims));
    };
    let Some(reshape_count) = checked_product(&reshape_dims) else {
        return Err(ParseError::ElementCountOverflow(reshape_dims));
    };
    if count != reshape_count {
        return Err(ParseError::ElementCountMismatch { dims, reshape_dims });
    }
    let perm = perm.unwrap_or_else(|| (0..reshape_dims.len()).collect());
    if !is_permutation(&perm, reshape_dims.len()) {
        return Err(ParseError::InvalidPermutation {
            perm,
            rank: reshape_dims.len(),
        });
    }
    Ok(IotaTileAssignment::new(&dims, &reshape_dims, &perm))
}

impl FromStr for IotaTileAssignment {
    type Err = ParseError;

    /// Parses `[dims]<=[reshape_dims]T(perm)`.
    fn from_str(s: &str) -> Result<Self, ParseError> {
        let (_, parts) = all_consuming(iota)(s).map_err(|err| syntax_error(s, err))?;
        build_iota(parts)
    }
}

impl FromStr for TileAssignment {
    type Err = ParseError;

    /// Parses `devices=[dims]<=[reshape_dims]T(perm)` or
    /// `devices=[dims]v0,v1,...`.
    fn from_str(s: &str) -> Result<Self, ParseError> {
        let (_, parsed) = all_consuming(tile_assignment)(s).map_err(|err| syntax_error(s, err))?;
        match parsed {
            Parsed::Iota(parts) => Ok(build_iota(parts)?.into()),
            Parsed::Array(dims, values) => {
                if dims.contains(&0) {
                    return Err(ParseError::ZeroDimension(dims));
                }
                Ok(Array::from_vec(dims, values)?.into())
            }
        }
    }
}

impl Serialize for IotaTileAssignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IotaTileAssignment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}

impl Serialize for TileAssignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TileAssignment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
