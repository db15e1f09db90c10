// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The profiling data model: [ProfileRecord]s made of [StackSample]s, and
//! the [Resource] identifying the process that produced them.

use crate::error::ValidationError;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A typed attribute value.
///
/// [`AnyValue::KvList`] and arrays nested inside arrays can be built but are
/// rejected by the protobuf encoder.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyValue {
    String(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    Array(Vec<AnyValue>),
    KvList(Vec<KeyValue>),
}

impl AnyValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AnyValue::String(_) => "string",
            AnyValue::Bool(_) => "bool",
            AnyValue::Int(_) => "int",
            AnyValue::Double(_) => "double",
            AnyValue::Bytes(_) => "bytes",
            AnyValue::Array(_) => "array",
            AnyValue::KvList(_) => "kvlist",
        }
    }

    fn truncate(&mut self, max_len: usize) {
        match self {
            AnyValue::String(s) => truncate_on_char_boundary(s, max_len),
            AnyValue::Array(values) => values.iter_mut().for_each(|v| v.truncate(max_len)),
            AnyValue::KvList(kvs) => kvs.iter_mut().for_each(|kv| kv.value.truncate(max_len)),
            AnyValue::Bool(_) | AnyValue::Int(_) | AnyValue::Double(_) | AnyValue::Bytes(_) => {}
        }
    }
}

/// Strings are written as is, bytes as lowercase hex, arrays as `[a, b]` and
/// kvlists as `{k=v}`.
impl fmt::Display for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyValue::String(s) => f.write_str(s),
            AnyValue::Bool(b) => b.fmt(f),
            AnyValue::Int(i) => i.fmt(f),
            AnyValue::Double(d) => d.fmt(f),
            AnyValue::Bytes(bytes) => bytes.iter().try_for_each(|b| write!(f, "{b:02x}")),
            AnyValue::Array(values) => {
                f.write_str("[")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    value.fmt(f)?;
                }
                f.write_str("]")
            }
            AnyValue::KvList(kvs) => {
                f.write_str("{")?;
                for (i, kv) in kvs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    kv.fmt(f)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        AnyValue::String(value.to_owned())
    }
}

impl From<String> for AnyValue {
    fn from(value: String) -> Self {
        AnyValue::String(value)
    }
}

impl From<bool> for AnyValue {
    fn from(value: bool) -> Self {
        AnyValue::Bool(value)
    }
}

impl From<i64> for AnyValue {
    fn from(value: i64) -> Self {
        AnyValue::Int(value)
    }
}

impl From<f64> for AnyValue {
    fn from(value: f64) -> Self {
        AnyValue::Double(value)
    }
}

impl From<Vec<u8>> for AnyValue {
    fn from(value: Vec<u8>) -> Self {
        AnyValue::Bytes(value)
    }
}

impl From<Vec<AnyValue>> for AnyValue {
    fn from(value: Vec<AnyValue>) -> Self {
        AnyValue::Array(value)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: AnyValue,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<AnyValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Static metadata describing the emitting process. A pipeline holds exactly
/// one, shared by every batch it exports.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resource {
    pub(crate) service_name: String,
    pub(crate) service_instance_id: String,
    pub(crate) attributes: Vec<KeyValue>,
}

impl Resource {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    pub fn with_instance_id(mut self, service_instance_id: impl Into<String>) -> Self {
        self.service_instance_id = service_instance_id.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AnyValue>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn service_instance_id(&self) -> &str {
        &self.service_instance_id
    }

    pub fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }
}

/// One frame of a stack.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Frame {
    pub function_name: String,
    pub file_name: String,
    pub line: i64,
    /// Instruction address, 0 when unknown.
    pub address: u64,
}

impl Frame {
    pub fn new(function_name: impl Into<String>, file_name: impl Into<String>, line: i64) -> Self {
        Self {
            function_name: function_name.into(),
            file_name: file_name.into(),
            line,
            address: 0,
        }
    }

    pub fn with_address(mut self, address: u64) -> Self {
        self.address = address;
        self
    }
}

/// Links a sample to the span that was active when it was taken.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SpanContext {
    pub trace_id: [u8; 16],
    pub span_id: [u8; 8],
}

/// Describes the semantics and unit of one value column, e.g. `cpu` in
/// `nanoseconds`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ValueType {
    pub r#type: String,
    pub unit: String,
}

impl ValueType {
    pub fn new(r#type: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            r#type: r#type.into(),
            unit: unit.into(),
        }
    }
}

/// A stack observed at one point in time. Frames are leaf first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackSample {
    pub frames: Vec<Frame>,
    pub timestamp_unix_nano: u64,
    /// One value per sample type of the enclosing record.
    pub values: Vec<i64>,
    pub span_context: Option<SpanContext>,
}

impl StackSample {
    pub fn new(frames: Vec<Frame>, timestamp_unix_nano: u64, values: Vec<i64>) -> Self {
        Self {
            frames,
            timestamp_unix_nano,
            values,
            span_context: None,
        }
    }

    pub fn with_span_context(mut self, span_context: SpanContext) -> Self {
        self.span_context = Some(span_context);
        self
    }
}

/// Caps applied to record attributes when a record is built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordLimits {
    /// Attributes past this count are dropped and counted in
    /// [`ProfileRecord::dropped_attributes_count`].
    pub max_attributes: usize,
    /// Maximum length in bytes of a string attribute value. Longer values are
    /// cut at the nearest char boundary below the limit.
    pub max_attribute_value_length: Option<usize>,
}

impl RecordLimits {
    pub const DEFAULT_MAX_ATTRIBUTES: usize = 128;

    pub const fn unlimited() -> Self {
        Self {
            max_attributes: usize::MAX,
            max_attribute_value_length: None,
        }
    }

    fn apply(&self, mut attributes: Vec<KeyValue>) -> (Vec<KeyValue>, u32) {
        let dropped = attributes.len().saturating_sub(self.max_attributes);
        attributes.truncate(self.max_attributes);
        if let Some(max_len) = self.max_attribute_value_length {
            for kv in attributes.iter_mut() {
                kv.value.truncate(max_len);
            }
        }
        (attributes, u32::try_from(dropped).unwrap_or(u32::MAX))
    }
}

impl Default for RecordLimits {
    fn default() -> Self {
        Self {
            max_attributes: Self::DEFAULT_MAX_ATTRIBUTES,
            max_attribute_value_length: None,
        }
    }
}

fn truncate_on_char_boundary(s: &mut String, max_len: usize) {
    if s.len() <= max_len {
        return;
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

/// One profiling sample group. Immutable once built; see
/// [`ProfileRecord::builder`].
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileRecord {
    pub(crate) profile_id: [u8; 16],
    pub(crate) time_unix_nano: u64,
    pub(crate) duration_nanos: u64,
    pub(crate) sample_types: Vec<ValueType>,
    pub(crate) samples: Vec<StackSample>,
    pub(crate) attributes: Vec<KeyValue>,
    pub(crate) dropped_attributes_count: u32,
}

impl ProfileRecord {
    pub fn builder() -> ProfileRecordBuilder {
        ProfileRecordBuilder::default()
    }

    pub fn profile_id(&self) -> [u8; 16] {
        self.profile_id
    }

    pub fn time_unix_nano(&self) -> u64 {
        self.time_unix_nano
    }

    pub fn duration_nanos(&self) -> u64 {
        self.duration_nanos
    }

    pub fn sample_types(&self) -> &[ValueType] {
        &self.sample_types
    }

    pub fn samples(&self) -> &[StackSample] {
        &self.samples
    }

    pub fn attributes(&self) -> &[KeyValue] {
        &self.attributes
    }

    /// Number of attributes discarded by [RecordLimits] when the record was
    /// built.
    pub fn dropped_attributes_count(&self) -> u32 {
        self.dropped_attributes_count
    }
}

/// Checks the invariants every [ProfileRecord] upholds.
pub(crate) fn validate(
    sample_types: &[ValueType],
    samples: &[StackSample],
) -> Result<(), ValidationError> {
    if samples.is_empty() {
        return Err(ValidationError::NoSamples);
    }
    let mut previous = 0u64;
    for (index, sample) in samples.iter().enumerate() {
        if sample.frames.is_empty() {
            return Err(ValidationError::EmptyStack { sample: index });
        }
        if sample.values.len() != sample_types.len() {
            return Err(ValidationError::ValueCountMismatch {
                sample: index,
                expected: sample_types.len(),
                actual: sample.values.len(),
            });
        }
        if sample.timestamp_unix_nano < previous {
            return Err(ValidationError::NonMonotonicTimestamp { sample: index });
        }
        previous = sample.timestamp_unix_nano;
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct ProfileRecordBuilder {
    profile_id: Option<[u8; 16]>,
    time_unix_nano: u64,
    duration_nanos: u64,
    sample_types: Vec<ValueType>,
    samples: Vec<StackSample>,
    attributes: Vec<KeyValue>,
    limits: RecordLimits,
}

impl ProfileRecordBuilder {
    /// Defaults to a random id.
    pub fn profile_id(mut self, profile_id: [u8; 16]) -> Self {
        self.profile_id = Some(profile_id);
        self
    }

    pub fn time_unix_nano(mut self, time_unix_nano: u64) -> Self {
        self.time_unix_nano = time_unix_nano;
        self
    }

    /// Times before the epoch are recorded as 0.
    pub fn start_time(self, start: SystemTime) -> Self {
        let nanos = start
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        self.time_unix_nano(nanos)
    }

    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration_nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self
    }

    pub fn sample_type(mut self, r#type: impl Into<String>, unit: impl Into<String>) -> Self {
        self.sample_types.push(ValueType::new(r#type, unit));
        self
    }

    pub fn sample(mut self, sample: StackSample) -> Self {
        self.samples.push(sample);
        self
    }

    pub fn samples(mut self, samples: impl IntoIterator<Item = StackSample>) -> Self {
        self.samples.extend(samples);
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<AnyValue>) -> Self {
        self.attributes.push(KeyValue::new(key, value));
        self
    }

    pub fn limits(mut self, limits: RecordLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn build(self) -> Result<ProfileRecord, ValidationError> {
        validate(&self.sample_types, &self.samples)?;
        let (attributes, dropped_attributes_count) = self.limits.apply(self.attributes);
        Ok(ProfileRecord {
            profile_id: self
                .profile_id
                .unwrap_or_else(|| fastrand::u128(..).to_le_bytes()),
            time_unix_nano: self.time_unix_nano,
            duration_nanos: self.duration_nanos,
            sample_types: self.sample_types,
            samples: self.samples,
            attributes,
            dropped_attributes_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(timestamp: u64) -> StackSample {
        StackSample::new(vec![Frame::new("main", "main.rs", 1)], timestamp, vec![1])
    }

    #[test]
    fn builds_valid_record() {
        let record = ProfileRecord::builder()
            .time_unix_nano(10)
            .duration(Duration::from_secs(1))
            .sample_type("cpu", "nanoseconds")
            .sample(sample(10))
            .sample(sample(10))
            .sample(sample(11))
            .attribute("thread.name", "main")
            .build()
            .unwrap();
        assert_eq!(record.samples().len(), 3);
        assert_eq!(record.duration_nanos(), 1_000_000_000);
        assert_eq!(record.dropped_attributes_count(), 0);
    }

    #[test]
    fn rejects_invalid_records() {
        let no_samples = ProfileRecord::builder().sample_type("cpu", "ns").build();
        assert_eq!(no_samples.unwrap_err(), ValidationError::NoSamples);

        let empty_stack = ProfileRecord::builder()
            .sample_type("cpu", "ns")
            .sample(sample(1))
            .sample(StackSample::new(vec![], 2, vec![1]))
            .build();
        assert_eq!(
            empty_stack.unwrap_err(),
            ValidationError::EmptyStack { sample: 1 }
        );

        let backwards = ProfileRecord::builder()
            .sample_type("cpu", "ns")
            .sample(sample(5))
            .sample(sample(4))
            .build();
        assert_eq!(
            backwards.unwrap_err(),
            ValidationError::NonMonotonicTimestamp { sample: 1 }
        );

        let mismatch = ProfileRecord::builder()
            .sample_type("cpu", "ns")
            .sample_type("wall", "ns")
            .sample(sample(1))
            .build();
        assert_eq!(
            mismatch.unwrap_err(),
            ValidationError::ValueCountMismatch {
                sample: 0,
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn attribute_limits() {
        let limits = RecordLimits {
            max_attributes: 2,
            max_attribute_value_length: Some(4),
        };
        let record = ProfileRecord::builder()
            .sample_type("cpu", "ns")
            .sample(sample(1))
            .attribute("a", "héllo")
            .attribute("b", vec![AnyValue::from("abcdef"), AnyValue::Int(7)])
            .attribute("c", true)
            .limits(limits)
            .build()
            .unwrap();

        assert_eq!(record.dropped_attributes_count(), 1);
        assert_eq!(record.attributes().len(), 2);
        // "é" is two bytes wide, so the cut lands before the second "l".
        assert_eq!(record.attributes()[0].value, AnyValue::from("hél"));
        assert_eq!(
            record.attributes()[1].value,
            AnyValue::Array(vec![AnyValue::from("abcd"), AnyValue::Int(7)])
        );
    }

    #[test]
    fn display_values() {
        let value = AnyValue::Array(vec![
            AnyValue::from("a"),
            AnyValue::Int(-2),
            AnyValue::Bytes(vec![0x0f, 0xa0]),
            AnyValue::KvList(vec![KeyValue::new("k", true)]),
        ]);
        assert_eq!(value.to_string(), "[a, -2, 0fa0, {k=true}]");
        assert_eq!(KeyValue::new("ratio", 0.5).to_string(), "ratio=0.5");
    }

    #[test]
    fn random_profile_ids() {
        let a = ProfileRecord::builder()
            .sample(StackSample::new(vec![Frame::default()], 0, vec![]))
            .build()
            .unwrap();
        let b = ProfileRecord::builder()
            .sample(StackSample::new(vec![Frame::default()], 0, vec![]))
            .build()
            .unwrap();
        assert_ne!(a.profile_id(), b.profile_id());
    }
}
