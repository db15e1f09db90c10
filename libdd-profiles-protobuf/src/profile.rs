// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::{
    ByteSlice, Field, Fixed64, KeyValue, Repeated, Resource, StringOffset, Value, WireType,
    NO_OPT_ZERO, OPT_ZERO,
};
use std::io::{self, Write};

/// The message sent for one batch: a schema version, the resource shared by
/// every profile in it, and the profiles themselves.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ProfilesData<'a> {
    pub schema_version: Field<u32, 1, OPT_ZERO>,
    pub resource: Field<Resource<'a>, 2, NO_OPT_ZERO>,
    pub profiles: Repeated<'a, Profile<'a>, 3>,
}

impl Value for ProfilesData<'_> {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.schema_version.proto_len() + self.resource.proto_len() + self.profiles.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.schema_version.encode(writer)?;
        self.resource.encode(writer)?;
        self.profiles.encode(writer)
    }
}

/// One profile record. Frames are split into [Location]s and [Function]s that
/// samples refer to by index, and every string lives in `string_table`,
/// whose first entry must be the empty string.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Profile<'a> {
    pub profile_id: Field<ByteSlice<'a>, 1, OPT_ZERO>,
    pub time_unix_nano: Field<Fixed64, 2, OPT_ZERO>,
    pub duration_nanos: Field<u64, 3, OPT_ZERO>,
    pub sample_types: Repeated<'a, ValueType, 4>,
    pub samples: Repeated<'a, Sample<'a>, 5>,
    pub locations: Repeated<'a, Location, 6>,
    pub functions: Repeated<'a, Function, 7>,
    pub string_table: Repeated<'a, &'a str, 8>,
    pub attributes: Repeated<'a, KeyValue<'a>, 9>,
    pub dropped_attributes_count: Field<u32, 10, OPT_ZERO>,
}

impl Value for Profile<'_> {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.profile_id.proto_len()
            + self.time_unix_nano.proto_len()
            + self.duration_nanos.proto_len()
            + self.sample_types.proto_len()
            + self.samples.proto_len()
            + self.locations.proto_len()
            + self.functions.proto_len()
            + self.string_table.proto_len()
            + self.attributes.proto_len()
            + self.dropped_attributes_count.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.profile_id.encode(writer)?;
        self.time_unix_nano.encode(writer)?;
        self.duration_nanos.encode(writer)?;
        self.sample_types.encode(writer)?;
        self.samples.encode(writer)?;
        self.locations.encode(writer)?;
        self.functions.encode(writer)?;
        self.string_table.encode(writer)?;
        self.attributes.encode(writer)?;
        self.dropped_attributes_count.encode(writer)
    }
}

/// ValueType describes the semantics and measurement units of a value.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(test, derive(bolero::generator::TypeGenerator))]
pub struct ValueType {
    pub type_strindex: Field<StringOffset, 1, OPT_ZERO>,
    pub unit_strindex: Field<StringOffset, 2, OPT_ZERO>,
}

impl Value for ValueType {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.type_strindex.proto_len() + self.unit_strindex.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.type_strindex.encode(writer)?;
        self.unit_strindex.encode(writer)
    }
}

/// Each Sample records values encountered in some program context, here a
/// stack given leaf-first as indices into [Profile::locations].
///
/// It borrows its data but requires it to be a slice. An iterator wouldn't
/// work well because we have to walk over the fields twice: one to calculate
/// the length, and one to encode it.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Sample<'a> {
    pub location_indices: Field<&'a [u64], 1, OPT_ZERO>,
    /// One value per entry in [Profile::sample_types], in the same order.
    pub values: Field<&'a [i64], 2, OPT_ZERO>,
    pub timestamp_unix_nano: Field<Fixed64, 3, OPT_ZERO>,
    /// Empty when the sample is not linked to a span.
    pub trace_id: Field<ByteSlice<'a>, 4, OPT_ZERO>,
    pub span_id: Field<ByteSlice<'a>, 5, OPT_ZERO>,
}

impl Value for Sample<'_> {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.location_indices.proto_len()
            + self.values.proto_len()
            + self.timestamp_unix_nano.proto_len()
            + self.trace_id.proto_len()
            + self.span_id.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.location_indices.encode(writer)?;
        self.values.encode(writer)?;
        self.timestamp_unix_nano.encode(writer)?;
        self.trace_id.encode(writer)?;
        self.span_id.encode(writer)
    }
}

/// A frame's position. The line is always written, even when all zeros,
/// because a location without one is malformed.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(test, derive(bolero::generator::TypeGenerator))]
pub struct Location {
    pub address: Field<u64, 1, OPT_ZERO>,
    pub line: Field<Line, 2, NO_OPT_ZERO>,
}

impl Value for Location {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.address.proto_len() + self.line.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.address.encode(writer)?;
        self.line.encode(writer)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(test, derive(bolero::generator::TypeGenerator))]
pub struct Line {
    /// Index into [Profile::functions].
    pub function_index: Field<u64, 1, OPT_ZERO>,
    pub line: Field<i64, 2, OPT_ZERO>,
}

impl Value for Line {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.function_index.proto_len() + self.line.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.function_index.encode(writer)?;
        self.line.encode(writer)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(test, derive(bolero::generator::TypeGenerator))]
pub struct Function {
    pub name_strindex: Field<StringOffset, 1, OPT_ZERO>,
    pub filename_strindex: Field<StringOffset, 2, OPT_ZERO>,
}

impl Value for Function {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.name_strindex.proto_len() + self.filename_strindex.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.name_strindex.encode(writer)?;
        self.filename_strindex.encode(writer)
    }
}

#[cfg(feature = "prost_impls")]
mod into_prost {
    use super::*;
    use crate::prost_impls;

    impl From<&ValueType> for prost_impls::ValueType {
        fn from(value: &ValueType) -> Self {
            Self {
                type_strindex: i64::from(u32::from(value.type_strindex.value)),
                unit_strindex: i64::from(u32::from(value.unit_strindex.value)),
            }
        }
    }

    impl From<&Function> for prost_impls::Function {
        fn from(function: &Function) -> Self {
            Self {
                name_strindex: i64::from(u32::from(function.name_strindex.value)),
                filename_strindex: i64::from(u32::from(function.filename_strindex.value)),
            }
        }
    }

    impl From<&Line> for prost_impls::Line {
        fn from(line: &Line) -> Self {
            Self {
                function_index: line.function_index.value,
                line: line.line.value,
            }
        }
    }

    impl From<&Location> for prost_impls::Location {
        fn from(location: &Location) -> Self {
            Self {
                address: location.address.value,
                line: Some((&location.line.value).into()),
            }
        }
    }

    impl From<&Sample<'_>> for prost_impls::Sample {
        fn from(sample: &Sample<'_>) -> Self {
            Self {
                location_indices: sample.location_indices.value.to_vec(),
                values: sample.values.value.to_vec(),
                timestamp_unix_nano: sample.timestamp_unix_nano.value.0,
                trace_id: sample.trace_id.value.0.to_vec(),
                span_id: sample.span_id.value.0.to_vec(),
            }
        }
    }

    impl From<&Profile<'_>> for prost_impls::Profile {
        fn from(profile: &Profile<'_>) -> Self {
            Self {
                profile_id: profile.profile_id.value.0.to_vec(),
                time_unix_nano: profile.time_unix_nano.value.0,
                duration_nanos: profile.duration_nanos.value,
                sample_types: profile.sample_types.values.iter().map(Into::into).collect(),
                samples: profile.samples.values.iter().map(Into::into).collect(),
                locations: profile.locations.values.iter().map(Into::into).collect(),
                functions: profile.functions.values.iter().map(Into::into).collect(),
                string_table: profile
                    .string_table
                    .values
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                attributes: profile.attributes.values.iter().map(Into::into).collect(),
                dropped_attributes_count: profile.dropped_attributes_count.value,
            }
        }
    }

    impl From<&ProfilesData<'_>> for prost_impls::ProfilesData {
        fn from(data: &ProfilesData<'_>) -> Self {
            Self {
                schema_version: data.schema_version.value,
                resource: Some((&data.resource.value).into()),
                profiles: data.profiles.values.iter().map(Into::into).collect(),
            }
        }
    }
}
