// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::{Value, WireType};
use std::io::{self, Write};

/// An unsigned 64-bit integer written as protobuf `fixed64`: eight bytes,
/// little-endian. Used for nanosecond timestamps, which are nearly always
/// large enough that a varint would take more room.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[repr(transparent)]
#[cfg_attr(test, derive(bolero::generator::TypeGenerator))]
pub struct Fixed64(pub u64);

impl From<u64> for Fixed64 {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Fixed64> for u64 {
    fn from(value: Fixed64) -> Self {
        value.0
    }
}

impl Value for Fixed64 {
    const WIRE_TYPE: WireType = WireType::Fixed64;

    fn proto_len(&self) -> u64 {
        8
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.0.to_le_bytes())
    }
}

/// Protobuf `double`, which shares the fixed64 wire representation.
impl Value for f64 {
    const WIRE_TYPE: WireType = WireType::Fixed64;

    fn proto_len(&self) -> u64 {
        8
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_bits().to_le_bytes())
    }
}
