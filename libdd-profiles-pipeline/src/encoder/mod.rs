// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Maps batches of [ProfileRecord]s to the versioned protobuf wire schema.
//!
//! Every record becomes one profile message with its own string, function and
//! location tables. Strings are interned (index 0 is always the empty
//! string), identical frames share one location, and identical
//! (function name, file name) pairs share one function. Table order follows
//! first use, so the same batch always encodes to the same bytes.

mod decode;

pub use decode::decode;

use crate::batch::Batch;
use crate::error::EncodeError;
use crate::record::{AnyValue, Frame, KeyValue, ProfileRecord};
use bytes::Bytes;
use libdd_profiles_protobuf as pb;
use std::collections::HashMap;

/// Header carrying [`EncodedPayload::schema_version`] next to the body.
pub const SCHEMA_VERSION_HEADER: &str = "x-profiles-schema-version";

/// The serialized form of exactly one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedPayload {
    bytes: Bytes,
    content_type: &'static str,
    schema_version: u32,
    record_count: usize,
}

impl EncodedPayload {
    pub fn new(
        bytes: Bytes,
        content_type: &'static str,
        schema_version: u32,
        record_count: usize,
    ) -> Self {
        Self {
            bytes,
            content_type,
            schema_version,
            record_count,
        }
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

/// Turns a batch of `R` into a payload. Implementations must be
/// deterministic.
pub trait Encoder<R>: Send + Sync {
    fn encode(&self, batch: &Batch<R>) -> Result<EncodedPayload, EncodeError>;
}

/// [Encoder] for the profiles wire schema.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProfilesEncoder;

impl Encoder<ProfileRecord> for ProfilesEncoder {
    fn encode(&self, batch: &Batch<ProfileRecord>) -> Result<EncodedPayload, EncodeError> {
        let resource = batch.resource();
        let records = batch.records();

        let resource_arrays = array_elements(resource.attributes())?;
        let resource_attributes = key_values(resource.attributes(), &resource_arrays)?;

        let tables = records
            .iter()
            .map(ProfileTables::new)
            .collect::<Result<Vec<_>, _>>()?;
        let parts = records
            .iter()
            .zip(&tables)
            .map(|(record, tables)| ProfileParts::new(record, tables))
            .collect::<Result<Vec<_>, _>>()?;
        let profiles: Vec<pb::Profile> = records
            .iter()
            .zip(&tables)
            .zip(&parts)
            .map(|((record, tables), parts)| pb::Profile {
                profile_id: pb::ByteSlice(record.profile_id.as_slice()).into(),
                time_unix_nano: pb::Fixed64(record.time_unix_nano).into(),
                duration_nanos: record.duration_nanos.into(),
                sample_types: tables.sample_types.as_slice().into(),
                samples: parts.samples.as_slice().into(),
                locations: tables.locations.as_slice().into(),
                functions: tables.functions.as_slice().into(),
                string_table: tables.strings.strings.as_slice().into(),
                attributes: parts.attributes.as_slice().into(),
                dropped_attributes_count: record.dropped_attributes_count.into(),
            })
            .collect();

        let message = pb::ProfilesData {
            schema_version: pb::SCHEMA_VERSION.into(),
            resource: pb::Resource {
                service_name: resource.service_name().into(),
                service_instance_id: resource.service_instance_id().into(),
                attributes: resource_attributes.as_slice().into(),
            }
            .into(),
            profiles: profiles.as_slice().into(),
        };

        let bytes = pb::encode_message(&message)?;
        Ok(EncodedPayload::new(
            Bytes::from(bytes),
            pb::CONTENT_TYPE,
            pb::SCHEMA_VERSION,
            records.len(),
        ))
    }
}

struct StringTable<'a> {
    strings: Vec<&'a str>,
    offsets: HashMap<&'a str, pb::StringOffset>,
}

impl<'a> StringTable<'a> {
    fn new() -> Self {
        Self {
            strings: vec![""],
            offsets: HashMap::from([("", pb::StringOffset::ZERO)]),
        }
    }

    fn intern(&mut self, s: &'a str) -> Result<pb::StringOffset, EncodeError> {
        if let Some(offset) = self.offsets.get(s) {
            return Ok(*offset);
        }
        let offset = pb::StringOffset::try_from(self.strings.len())
            .map_err(|_| EncodeError::StringTableOverflow)?;
        self.strings.push(s);
        self.offsets.insert(s, offset);
        Ok(offset)
    }
}

/// Owned lookup tables of one profile. The message structs borrow from
/// these, so they are all built before any message is.
struct ProfileTables<'a> {
    strings: StringTable<'a>,
    sample_types: Vec<pb::ValueType>,
    functions: Vec<pb::Function>,
    locations: Vec<pb::Location>,
    /// Location indices of every sample, leaf first.
    stacks: Vec<Vec<u64>>,
    arrays: Vec<Vec<pb::AnyValue<'a>>>,
}

impl<'a> ProfileTables<'a> {
    fn new(record: &'a ProfileRecord) -> Result<Self, EncodeError> {
        let mut strings = StringTable::new();
        let mut sample_types = Vec::with_capacity(record.sample_types.len());
        for value_type in &record.sample_types {
            sample_types.push(pb::ValueType {
                type_strindex: strings.intern(&value_type.r#type)?.into(),
                unit_strindex: strings.intern(&value_type.unit)?.into(),
            });
        }

        let mut functions = Vec::new();
        let mut locations = Vec::new();
        let mut function_indices: HashMap<(pb::StringOffset, pb::StringOffset), u64> =
            HashMap::new();
        let mut location_indices: HashMap<&'a Frame, u64> = HashMap::new();
        let mut stacks = Vec::with_capacity(record.samples.len());

        for sample in &record.samples {
            let mut stack = Vec::with_capacity(sample.frames.len());
            for frame in &sample.frames {
                if let Some(index) = location_indices.get(frame) {
                    stack.push(*index);
                    continue;
                }
                let name = strings.intern(&frame.function_name)?;
                let file = strings.intern(&frame.file_name)?;
                let function_index = *function_indices.entry((name, file)).or_insert_with(|| {
                    functions.push(pb::Function {
                        name_strindex: name.into(),
                        filename_strindex: file.into(),
                    });
                    functions.len() as u64 - 1
                });
                locations.push(pb::Location {
                    address: frame.address.into(),
                    line: pb::Line {
                        function_index: function_index.into(),
                        line: frame.line.into(),
                    }
                    .into(),
                });
                let index = locations.len() as u64 - 1;
                location_indices.insert(frame, index);
                stack.push(index);
            }
            stacks.push(stack);
        }

        Ok(Self {
            strings,
            sample_types,
            functions,
            locations,
            stacks,
            arrays: array_elements(&record.attributes)?,
        })
    }
}

/// Messages of one profile that borrow from its [ProfileTables].
struct ProfileParts<'a> {
    samples: Vec<pb::Sample<'a>>,
    attributes: Vec<pb::KeyValue<'a>>,
}

impl<'a> ProfileParts<'a> {
    fn new(record: &'a ProfileRecord, tables: &'a ProfileTables<'a>) -> Result<Self, EncodeError> {
        let samples = record
            .samples
            .iter()
            .zip(&tables.stacks)
            .map(|(sample, stack)| {
                let (trace_id, span_id) = match &sample.span_context {
                    Some(context) => (context.trace_id.as_slice(), context.span_id.as_slice()),
                    None => (&[][..], &[][..]),
                };
                pb::Sample {
                    location_indices: stack.as_slice().into(),
                    values: sample.values.as_slice().into(),
                    timestamp_unix_nano: pb::Fixed64(sample.timestamp_unix_nano).into(),
                    trace_id: pb::ByteSlice(trace_id).into(),
                    span_id: pb::ByteSlice(span_id).into(),
                }
            })
            .collect();
        Ok(Self {
            samples,
            attributes: key_values(&record.attributes, &tables.arrays)?,
        })
    }
}

fn unsupported(key: &str, kind: &'static str) -> EncodeError {
    EncodeError::UnsupportedValueType {
        key: key.to_owned(),
        kind,
    }
}

/// Converts values that map onto a single oneof member. Arrays and key-value
/// lists return `None`.
fn scalar(value: &AnyValue) -> Option<pb::AnyValue<'_>> {
    Some(match value {
        AnyValue::String(s) => pb::AnyValue::string(s),
        AnyValue::Bool(b) => pb::AnyValue::bool(*b),
        AnyValue::Int(i) => pb::AnyValue::int(*i),
        AnyValue::Double(d) => pb::AnyValue::double(*d),
        AnyValue::Bytes(bytes) => pb::AnyValue::bytes(bytes),
        AnyValue::Array(_) | AnyValue::KvList(_) => return None,
    })
}

/// Converts the elements of every array attribute. The result has one entry
/// per attribute, empty for non-arrays, so [key_values] can borrow them.
fn array_elements(attributes: &[KeyValue]) -> Result<Vec<Vec<pb::AnyValue<'_>>>, EncodeError> {
    attributes
        .iter()
        .map(|kv| match &kv.value {
            AnyValue::Array(values) => values
                .iter()
                .map(|value| {
                    scalar(value).ok_or_else(|| match value {
                        AnyValue::Array(_) => unsupported(&kv.key, "nested array"),
                        other => unsupported(&kv.key, other.kind()),
                    })
                })
                .collect(),
            AnyValue::KvList(_) => Err(unsupported(&kv.key, kv.value.kind())),
            _ => Ok(Vec::new()),
        })
        .collect()
}

fn key_values<'a>(
    attributes: &'a [KeyValue],
    arrays: &'a [Vec<pb::AnyValue<'a>>],
) -> Result<Vec<pb::KeyValue<'a>>, EncodeError> {
    attributes
        .iter()
        .zip(arrays)
        .map(|(kv, elements)| -> Result<pb::KeyValue<'a>, EncodeError> {
            let value = match &kv.value {
                AnyValue::Array(_) => pb::AnyValue::array(elements),
                value => scalar(value).ok_or_else(|| unsupported(&kv.key, value.kind()))?,
            };
            Ok(pb::KeyValue {
                key: kv.key.as_str().into(),
                value: value.into(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Frame, Resource, SpanContext, StackSample};
    use libdd_profiles_protobuf::prost_impls;
    use prost::Message;
    use std::sync::Arc;

    fn record() -> ProfileRecord {
        let main = Frame::new("main", "main.rs", 10);
        let work = Frame::new("work", "main.rs", 20).with_address(0x40);
        let work_other_line = Frame::new("work", "main.rs", 25);
        ProfileRecord::builder()
            .profile_id([1; 16])
            .time_unix_nano(1_000)
            .sample_type("cpu", "nanoseconds")
            .sample(StackSample::new(
                vec![work.clone(), main.clone()],
                1_000,
                vec![5],
            ))
            .sample(
                StackSample::new(vec![work_other_line, main], 1_010, vec![7]).with_span_context(
                    SpanContext {
                        trace_id: [2; 16],
                        span_id: [3; 8],
                    },
                ),
            )
            .sample(StackSample::new(vec![work], 1_020, vec![0]))
            .attribute("thread.id", 7i64)
            .build()
            .unwrap()
    }

    fn decode_raw(payload: &EncodedPayload) -> prost_impls::ProfilesData {
        prost_impls::ProfilesData::decode(payload.bytes().as_ref()).unwrap()
    }

    #[test]
    fn shares_locations_and_functions() {
        let batch = Batch::new(Arc::new(Resource::new("svc")), vec![record()]);
        let payload = ProfilesEncoder.encode(&batch).unwrap();
        assert_eq!(payload.record_count(), 1);
        assert_eq!(payload.content_type(), "application/x-protobuf");

        let data = decode_raw(&payload);
        assert_eq!(data.schema_version, 1);
        let profile = &data.profiles[0];
        assert_eq!(profile.string_table[0], "");
        assert_eq!(
            profile.string_table,
            ["", "cpu", "nanoseconds", "work", "main.rs", "main"]
        );
        // Three distinct frames, two distinct functions.
        assert_eq!(profile.locations.len(), 3);
        assert_eq!(profile.functions.len(), 2);
        assert_eq!(profile.samples[0].location_indices, [0, 1]);
        assert_eq!(profile.samples[1].location_indices, [2, 1]);
        assert_eq!(profile.samples[2].location_indices, [0]);
        assert_eq!(profile.locations[0].address, 0x40);
        assert_eq!(profile.samples[1].trace_id, [2; 16]);
        assert!(profile.samples[0].span_id.is_empty());
    }

    #[test]
    fn deterministic() {
        let batch = Batch::new(
            Arc::new(Resource::new("svc").with_attribute("host", "a")),
            vec![record(), record()],
        );
        let first = ProfilesEncoder.encode(&batch).unwrap();
        let second = ProfilesEncoder.encode(&batch).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn rejects_kvlist() {
        let resource = Resource::new("svc").with_attribute(
            "nested",
            AnyValue::KvList(vec![KeyValue::new("a", 1i64)]),
        );
        let batch = Batch::new(Arc::new(resource), vec![record()]);
        let err = ProfilesEncoder.encode(&batch).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::UnsupportedValueType { ref key, kind: "kvlist" } if key == "nested"
        ));
    }

    #[test]
    fn rejects_nested_array() {
        let record = ProfileRecord::builder()
            .sample(StackSample::new(vec![Frame::default()], 0, vec![]))
            .attribute("matrix", vec![AnyValue::Array(vec![AnyValue::Int(1)])])
            .build()
            .unwrap();
        let batch = Batch::new(Arc::new(Resource::new("svc")), vec![record]);
        let err = ProfilesEncoder.encode(&batch).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::UnsupportedValueType {
                kind: "nested array",
                ..
            }
        ));
    }

    #[test]
    fn flat_arrays_are_supported() {
        let resource = Resource::new("svc")
            .with_attribute("tags", vec![AnyValue::from("a"), AnyValue::Bool(true)]);
        let batch = Batch::new(Arc::new(resource), vec![record()]);
        let data = decode_raw(&ProfilesEncoder.encode(&batch).unwrap());
        let resource = data.resource.unwrap();
        let value = resource.attributes[0].value.clone().unwrap().value.unwrap();
        match value {
            prost_impls::any_value::Value::ArrayValue(array) => assert_eq!(array.values.len(), 2),
            other => panic!("unexpected value {other:?}"),
        }
    }
}
