// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::{Value, WireType};
use std::fmt;
use std::io::{self, Write};

impl Value for &str {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.len() as u64
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.as_bytes())
    }
}

/// Raw protobuf `bytes`. A plain `&[u8]` would be taken for a packed
/// repeated field, so opaque payloads are wrapped in this.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct ByteSlice<'a>(pub &'a [u8]);

impl<'a> From<&'a [u8]> for ByteSlice<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self(bytes)
    }
}

impl Value for ByteSlice<'_> {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.0.len() as u64
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self.0)
    }
}

/// Represents an offset into the Profile's string table. Note that it cannot
/// exceed u32 because an entire protobuf message must not be larger than or
/// equal to 2 GiB. By the time you encode the tag and length prefix for each
/// string, there's no way to get this many unique-ish strings without first
/// exceeding the protobuf 2 GiB limit.
///
/// A value of 0 means "no string" or "empty string" (they are synonymous).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(test, derive(bolero::generator::TypeGenerator))]
pub struct StringOffset(u32);

impl fmt::Display for StringOffset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Value for StringOffset {
    const WIRE_TYPE: WireType = WireType::Varint;

    fn proto_len(&self) -> u64 {
        self.0.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.0.encode(writer)
    }
}

impl TryFrom<usize> for StringOffset {
    type Error = <u32 as TryFrom<usize>>::Error;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Ok(StringOffset(u32::try_from(value)?))
    }
}

impl TryFrom<u64> for StringOffset {
    type Error = <u32 as TryFrom<u64>>::Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Ok(StringOffset(u32::try_from(value)?))
    }
}

impl From<u32> for StringOffset {
    fn from(value: u32) -> Self {
        StringOffset(value)
    }
}

impl From<StringOffset> for usize {
    fn from(s: StringOffset) -> Self {
        s.0 as usize
    }
}

impl From<StringOffset> for u64 {
    fn from(s: StringOffset) -> Self {
        s.0 as u64
    }
}

impl From<StringOffset> for u32 {
    fn from(s: StringOffset) -> Self {
        s.0
    }
}

impl StringOffset {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn new(offset: u32) -> Self {
        Self(offset)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        assert!(StringOffset::ZERO.is_zero());
        assert_eq!(StringOffset::try_from(7usize).unwrap(), StringOffset::new(7));
        assert!(StringOffset::try_from(u64::MAX).is_err());
        assert_eq!(u64::from(StringOffset::new(3)), 3);
        assert_eq!(u32::from(StringOffset::new(u32::MAX)), u32::MAX);
    }

    #[test]
    fn bytes_are_not_packed() {
        let mut buffer = Vec::new();
        ByteSlice(&[0xFF, 0x00]).encode(&mut buffer).unwrap();
        assert_eq!(buffer, [0xFF, 0x00]);
    }
}
