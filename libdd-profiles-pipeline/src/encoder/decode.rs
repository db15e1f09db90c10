// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::EncodedPayload;
use crate::batch::Batch;
use crate::error::DecodeError;
use crate::record::{
    self, AnyValue, Frame, KeyValue, ProfileRecord, Resource, SpanContext, StackSample, ValueType,
};
use libdd_profiles_protobuf::prost_impls;
use prost::Message;
use std::sync::Arc;

/// Parses a payload produced by [`super::ProfilesEncoder`] back into a batch.
///
/// Fields this version does not know are skipped, so payloads from newer
/// writers still decode as long as the fields used here keep their meaning.
pub fn decode(payload: &EncodedPayload) -> Result<Batch<ProfileRecord>, DecodeError> {
    let data = prost_impls::ProfilesData::decode(payload.bytes().as_ref())?;
    let resource = data.resource.ok_or(DecodeError::MissingField("resource"))?;
    let resource = Resource {
        service_name: resource.service_name,
        service_instance_id: resource.service_instance_id,
        attributes: key_values(resource.attributes)?,
    };
    let records = data
        .profiles
        .into_iter()
        .map(profile)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Batch::new(Arc::new(resource), records))
}

fn profile(profile: prost_impls::Profile) -> Result<ProfileRecord, DecodeError> {
    let strings = &profile.string_table;
    let string = |field: &'static str, index: i64| -> Result<String, DecodeError> {
        usize::try_from(index)
            .ok()
            .and_then(|index| strings.get(index))
            .cloned()
            .ok_or(DecodeError::InvalidIndex {
                field,
                index: index as u64,
            })
    };

    let sample_types = profile
        .sample_types
        .iter()
        .map(|vt| {
            Ok(ValueType {
                r#type: string("sample_type.type_strindex", vt.type_strindex)?,
                unit: string("sample_type.unit_strindex", vt.unit_strindex)?,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    let functions = profile
        .functions
        .iter()
        .map(|function| {
            Ok((
                string("function.name_strindex", function.name_strindex)?,
                string("function.filename_strindex", function.filename_strindex)?,
            ))
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    let frames = profile
        .locations
        .iter()
        .map(|location| {
            let line = location
                .line
                .ok_or(DecodeError::MissingField("location.line"))?;
            let (function_name, file_name) =
                lookup(&functions, "line.function_index", line.function_index)?;
            Ok(Frame {
                function_name: function_name.clone(),
                file_name: file_name.clone(),
                line: line.line,
                address: location.address,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    let samples = profile
        .samples
        .into_iter()
        .map(|sample| {
            if sample.location_indices.is_empty() {
                return Err(DecodeError::MissingField("sample.location_indices"));
            }
            let stack = sample
                .location_indices
                .iter()
                .map(|index| lookup(&frames, "sample.location_indices", *index).cloned())
                .collect::<Result<Vec<_>, _>>()?;
            let span_context = match (sample.trace_id.is_empty(), sample.span_id.is_empty()) {
                (true, true) => None,
                (false, false) => Some(SpanContext {
                    trace_id: fixed("sample.trace_id", &sample.trace_id)?,
                    span_id: fixed("sample.span_id", &sample.span_id)?,
                }),
                (true, false) => return Err(DecodeError::MissingField("sample.trace_id")),
                (false, true) => return Err(DecodeError::MissingField("sample.span_id")),
            };
            Ok(StackSample {
                frames: stack,
                timestamp_unix_nano: sample.timestamp_unix_nano,
                values: sample.values,
                span_context,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    record::validate(&sample_types, &samples)?;

    if profile.profile_id.is_empty() {
        return Err(DecodeError::MissingField("profile.profile_id"));
    }
    Ok(ProfileRecord {
        profile_id: fixed("profile.profile_id", &profile.profile_id)?,
        time_unix_nano: profile.time_unix_nano,
        duration_nanos: profile.duration_nanos,
        sample_types,
        samples,
        attributes: key_values(profile.attributes)?,
        dropped_attributes_count: profile.dropped_attributes_count,
    })
}

fn lookup<'a, T>(table: &'a [T], field: &'static str, index: u64) -> Result<&'a T, DecodeError> {
    usize::try_from(index)
        .ok()
        .and_then(|i| table.get(i))
        .ok_or(DecodeError::InvalidIndex { field, index })
}

fn fixed<const N: usize>(field: &'static str, bytes: &[u8]) -> Result<[u8; N], DecodeError> {
    bytes.try_into().map_err(|_| DecodeError::InvalidLength {
        field,
        expected: N,
        actual: bytes.len(),
    })
}

fn key_values(attributes: Vec<prost_impls::KeyValue>) -> Result<Vec<KeyValue>, DecodeError> {
    attributes
        .into_iter()
        .map(|kv| {
            let value = kv
                .value
                .ok_or(DecodeError::MissingField("key_value.value"))?;
            Ok(KeyValue {
                key: kv.key,
                value: any_value(value)?,
            })
        })
        .collect()
}

fn any_value(value: prost_impls::AnyValue) -> Result<AnyValue, DecodeError> {
    use prost_impls::any_value::Value;
    Ok(
        match value.value.ok_or(DecodeError::MissingField("any_value.value"))? {
            Value::StringValue(s) => AnyValue::String(s),
            Value::BoolValue(b) => AnyValue::Bool(b),
            Value::IntValue(i) => AnyValue::Int(i),
            Value::DoubleValue(d) => AnyValue::Double(d),
            Value::BytesValue(bytes) => AnyValue::Bytes(bytes),
            Value::ArrayValue(array) => AnyValue::Array(
                array
                    .values
                    .into_iter()
                    .map(any_value)
                    .collect::<Result<_, _>>()?,
            ),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{Encoder, ProfilesEncoder};
    use bytes::Bytes;
    use libdd_profiles_protobuf::{CONTENT_TYPE, SCHEMA_VERSION};

    fn payload(data: &prost_impls::ProfilesData) -> EncodedPayload {
        EncodedPayload::new(
            Bytes::from(data.encode_to_vec()),
            CONTENT_TYPE,
            SCHEMA_VERSION,
            data.profiles.len(),
        )
    }

    fn minimal_profile() -> prost_impls::Profile {
        prost_impls::Profile {
            profile_id: vec![9; 16],
            string_table: vec![String::new(), "f".to_owned(), "f.rs".to_owned()],
            functions: vec![prost_impls::Function {
                name_strindex: 1,
                filename_strindex: 2,
            }],
            locations: vec![prost_impls::Location {
                address: 0,
                line: Some(prost_impls::Line {
                    function_index: 0,
                    line: 3,
                }),
            }],
            samples: vec![prost_impls::Sample {
                location_indices: vec![0],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn data(profile: prost_impls::Profile) -> prost_impls::ProfilesData {
        prost_impls::ProfilesData {
            schema_version: SCHEMA_VERSION,
            resource: Some(prost_impls::Resource {
                service_name: "svc".to_owned(),
                ..Default::default()
            }),
            profiles: vec![profile],
        }
    }

    #[test]
    fn decodes_minimal_profile() {
        let batch = decode(&payload(&data(minimal_profile()))).unwrap();
        assert_eq!(batch.resource().service_name(), "svc");
        let record = &batch.records()[0];
        assert_eq!(record.profile_id(), [9; 16]);
        assert_eq!(record.samples()[0].frames, [Frame::new("f", "f.rs", 3)]);
    }

    #[test]
    fn roundtrip() {
        let record = ProfileRecord::builder()
            .sample_type("alloc", "bytes")
            .sample(
                StackSample::new(vec![Frame::new("a", "a.rs", 1)], 5, vec![64]).with_span_context(
                    SpanContext {
                        trace_id: [1; 16],
                        span_id: [2; 8],
                    },
                ),
            )
            .attribute("ratio", 0.5)
            .attribute("raw", vec![0u8, 1])
            .build()
            .unwrap();
        let batch = Batch::new(
            Arc::new(Resource::new("svc").with_instance_id("i-1")),
            vec![record],
        );
        let encoded = ProfilesEncoder.encode(&batch).unwrap();
        assert_eq!(decode(&encoded).unwrap(), batch);
    }

    #[test]
    fn missing_resource() {
        let mut data = data(minimal_profile());
        data.resource = None;
        assert!(matches!(
            decode(&payload(&data)),
            Err(DecodeError::MissingField("resource"))
        ));
    }

    #[test]
    fn missing_frames() {
        let mut profile = minimal_profile();
        profile.samples[0].location_indices.clear();
        assert!(matches!(
            decode(&payload(&data(profile))),
            Err(DecodeError::MissingField("sample.location_indices"))
        ));
    }

    #[test]
    fn invalid_indices() {
        let mut profile = minimal_profile();
        profile.samples[0].location_indices = vec![4];
        assert!(matches!(
            decode(&payload(&data(profile))),
            Err(DecodeError::InvalidIndex {
                field: "sample.location_indices",
                index: 4
            })
        ));

        let mut profile = minimal_profile();
        profile.functions[0].name_strindex = 17;
        assert!(matches!(
            decode(&payload(&data(profile))),
            Err(DecodeError::InvalidIndex { index: 17, .. })
        ));
    }

    #[test]
    fn ignores_unknown_fields() {
        let mut bytes = data(minimal_profile()).encode_to_vec();
        // Field 15, varint 1: not part of the schema.
        bytes.extend_from_slice(&[15 << 3, 1]);
        let payload = EncodedPayload::new(Bytes::from(bytes), CONTENT_TYPE, SCHEMA_VERSION, 1);
        assert_eq!(decode(&payload).unwrap().len(), 1);
    }

    #[test]
    fn garbage_is_a_protobuf_error() {
        let payload = EncodedPayload::new(Bytes::from_static(&[0xFF, 0xFF]), CONTENT_TYPE, 1, 0);
        assert!(matches!(decode(&payload), Err(DecodeError::Protobuf(_))));
    }
}
