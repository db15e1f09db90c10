// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! This crate implements Protobuf serializers for the profiles export wire
//! schema, including serializers for:
//!
//! - [ProfilesData], the top-level message sent once per batch
//! - [Resource], [KeyValue], [AnyValue] and [ArrayValue]
//! - [Profile], [Sample], [Location], [Line], [Function] and [ValueType]
//!
//! Every field number is a const generic on [Field] or [Repeated], so the
//! field-to-tag mapping of a message is spelled out in its type definition.
//! A field number outside the protobuf range fails const evaluation, which
//! means it is rejected when the crate is built rather than at runtime.
//!
//! Messages borrow their data. The serializers walk every message twice: once
//! to compute the length prefix and once to write the bytes, which is why
//! repeated data must be held in slices rather than iterators.
//!
//! With the `prost_impls` feature, [`prost_impls`] provides `prost::Message`
//! mirrors of every message. They are used to decode payloads and to check
//! the hand-written serializers against an independent implementation.

mod common;
mod fixed;
mod profile;
mod string;
mod varint;

#[cfg(feature = "prost_impls")]
pub mod prost_impls;

pub use common::*;
pub use fixed::*;
pub use profile::*;
pub use string::*;

use std::fmt::{Debug, Formatter};
use std::io::{self, Write};

/// Version of the wire schema produced by this crate. Bumped whenever a field
/// is added; decoders must ignore fields they do not know.
pub const SCHEMA_VERSION: u32 = 1;

/// Content type of an encoded [ProfilesData] message.
pub const CONTENT_TYPE: &str = "application/x-protobuf";

/// Create a field of a given type, field number, and whether to perform the
/// zero-size optimization or not.
#[derive(Copy, Clone, Default, Eq, PartialEq)]
#[repr(transparent)]
#[cfg_attr(test, derive(bolero::generator::TypeGenerator))]
pub struct Field<T: Value, const N: u32, const O: bool> {
    pub value: T,
}

/// Represents the wire type for the in-wire protobuf encoding. There are more
/// types than are represented here; these are just the supported ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
}

/// A value is stored differently depending on the wire_type.
pub trait Value: Default + PartialEq {
    /// The wire type this value uses.
    const WIRE_TYPE: WireType;

    /// The number of bytes it takes to encode this value.
    fn proto_len(&self) -> u64;

    /// Encode the value to the in-wire protobuf format.
    ///
    /// Serialization often happens one byte at a time, so a buffered writer
    /// should probably be used.
    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()>;
}

/// You can use varint to store any of the listed data types:
/// int32 | int64 | uint32 | uint64 | bool | enum | sint32 | sint64
///
/// # Safety
///
/// The [`Value::WIRE_TYPE`] must be [`WireType::Varint`]!
pub unsafe trait Varint: Value + Sized {}

/// Intended to be provided to a Field to mean that it _should_ optimize for a
/// value of zero. See also [`NO_OPT_ZERO`].
pub const OPT_ZERO: bool = true;

/// Intended to be provided to a Field to mean that it shouldn't optimize for a
/// value of zero. Members of a oneof and message fields that must always be
/// present use this.
pub const NO_OPT_ZERO: bool = false;

/// The smallest possible protobuf field number.
const MIN_FIELD: u32 = 1;

/// The largest possible protobuf field number.
const MAX_FIELD: u32 = (1 << 29) - 1;

/// Evaluated in const context by every field type; a bad field number stops
/// the build.
const fn checked_field_number(n: u32) -> u32 {
    assert!(
        n >= MIN_FIELD && n <= MAX_FIELD,
        "protobuf field number out of range"
    );
    n
}

#[inline]
fn field_len<T: Value>(number: u32, value: &T) -> u64 {
    let proto_len = value.proto_len();
    let len = if T::WIRE_TYPE == WireType::LengthDelimited {
        proto_len.proto_len()
    } else {
        0
    };
    Tag::new(number, T::WIRE_TYPE).proto_len() + len + proto_len
}

#[inline]
fn encode_field<T: Value, W: Write>(number: u32, value: &T, writer: &mut W) -> io::Result<()> {
    Tag::new(number, T::WIRE_TYPE).encode(writer)?;
    if T::WIRE_TYPE == WireType::LengthDelimited {
        value.proto_len().encode(writer)?;
    }
    value.encode(writer)
}

impl<T: Value, const N: u32, const O: bool> From<T> for Field<T, N, O> {
    fn from(value: T) -> Self {
        Field { value }
    }
}

impl<T: Value, const N: u32, const O: bool> Field<T, N, O> {
    /// The field number, checked at compile time.
    pub const NUMBER: u32 = checked_field_number(N);

    pub fn proto_len(&self) -> u64 {
        if O && self.value == T::default() {
            return 0;
        }
        field_len(Self::NUMBER, &self.value)
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        if O && self.value == T::default() {
            return Ok(());
        }
        encode_field(Self::NUMBER, &self.value, writer)
    }
}

impl<T: Debug + Value, const N: u32, const O: bool> Debug for Field<T, N, O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("value", &self.value)
            .field("number", &N)
            .field("optimize_for_zero", &O)
            .finish()
    }
}

/// A non-packed repeated field: every element is written with its own tag,
/// including elements equal to their default value. Packed scalars use a
/// [Field] holding a slice instead.
#[derive(Copy, Clone, PartialEq)]
pub struct Repeated<'a, T: Value, const N: u32> {
    pub values: &'a [T],
}

impl<T: Value, const N: u32> Default for Repeated<'_, T, N> {
    fn default() -> Self {
        Self { values: &[] }
    }
}

impl<'a, T: Value, const N: u32> From<&'a [T]> for Repeated<'a, T, N> {
    fn from(values: &'a [T]) -> Self {
        Self { values }
    }
}

impl<T: Value, const N: u32> Repeated<'_, T, N> {
    /// The field number, checked at compile time.
    pub const NUMBER: u32 = checked_field_number(N);

    pub fn proto_len(&self) -> u64 {
        self.values
            .iter()
            .map(|value| field_len(Self::NUMBER, value))
            .sum()
    }

    pub fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for value in self.values {
            encode_field(Self::NUMBER, value, writer)?;
        }
        Ok(())
    }
}

impl<T: Debug + Value, const N: u32> Debug for Repeated<'_, T, N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repeated")
            .field("values", &self.values)
            .field("number", &N)
            .finish()
    }
}

/// A tag is a combination of a wire_type, stored in the least significant
/// three bits, and the field number that is defined in the .proto file.
#[derive(Copy, Clone)]
pub struct Tag(u32);

impl Tag {
    #[cfg_attr(debug_assertions, track_caller)]
    #[inline]
    pub const fn new(field: u32, wire_type: WireType) -> Self {
        debug_assert!(field >= MIN_FIELD && field <= MAX_FIELD);
        Self((field << 3) | wire_type as u32)
    }

    #[inline]
    pub fn proto_len(self) -> u64 {
        (self.0 as u64).proto_len()
    }

    #[inline]
    pub fn encode<W: Write>(self, writer: &mut W) -> io::Result<()> {
        (self.0 as u64).encode(writer)
    }
}

/// Encodes a top-level message into a buffer sized exactly for it.
pub fn encode_message<M: Value>(message: &M) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(message.proto_len() as usize)?;
    message.encode(&mut buffer)?;
    Ok(buffer)
}
