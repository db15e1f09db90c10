// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `prost` mirrors of the wire schema. They decode whatever the serializers
//! in this crate produce, and skip fields they do not know.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProfilesData {
    #[prost(uint32, tag = "1")]
    pub schema_version: u32,
    #[prost(message, optional, tag = "2")]
    pub resource: Option<Resource>,
    #[prost(message, repeated, tag = "3")]
    pub profiles: Vec<Profile>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Resource {
    #[prost(string, tag = "1")]
    pub service_name: String,
    #[prost(string, tag = "2")]
    pub service_instance_id: String,
    #[prost(message, repeated, tag = "3")]
    pub attributes: Vec<KeyValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct KeyValue {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(message, optional, tag = "2")]
    pub value: Option<AnyValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AnyValue {
    #[prost(oneof = "any_value::Value", tags = "1, 2, 3, 4, 5, 7")]
    pub value: Option<any_value::Value>,
}

pub mod any_value {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Value {
        #[prost(string, tag = "1")]
        StringValue(String),
        #[prost(bool, tag = "2")]
        BoolValue(bool),
        #[prost(int64, tag = "3")]
        IntValue(i64),
        #[prost(double, tag = "4")]
        DoubleValue(f64),
        #[prost(message, tag = "5")]
        ArrayValue(super::ArrayValue),
        #[prost(bytes = "vec", tag = "7")]
        BytesValue(Vec<u8>),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ArrayValue {
    #[prost(message, repeated, tag = "1")]
    pub values: Vec<AnyValue>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Profile {
    #[prost(bytes = "vec", tag = "1")]
    pub profile_id: Vec<u8>,
    #[prost(fixed64, tag = "2")]
    pub time_unix_nano: u64,
    #[prost(uint64, tag = "3")]
    pub duration_nanos: u64,
    #[prost(message, repeated, tag = "4")]
    pub sample_types: Vec<ValueType>,
    #[prost(message, repeated, tag = "5")]
    pub samples: Vec<Sample>,
    #[prost(message, repeated, tag = "6")]
    pub locations: Vec<Location>,
    #[prost(message, repeated, tag = "7")]
    pub functions: Vec<Function>,
    #[prost(string, repeated, tag = "8")]
    pub string_table: Vec<String>,
    #[prost(message, repeated, tag = "9")]
    pub attributes: Vec<KeyValue>,
    #[prost(uint32, tag = "10")]
    pub dropped_attributes_count: u32,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct ValueType {
    #[prost(int64, tag = "1")]
    pub type_strindex: i64, // Index into string table
    #[prost(int64, tag = "2")]
    pub unit_strindex: i64, // Index into string table
}

#[derive(Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Sample {
    #[prost(uint64, repeated, tag = "1")]
    pub location_indices: Vec<u64>,
    #[prost(int64, repeated, tag = "2")]
    pub values: Vec<i64>,
    #[prost(fixed64, tag = "3")]
    pub timestamp_unix_nano: u64,
    #[prost(bytes = "vec", tag = "4")]
    pub trace_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "5")]
    pub span_id: Vec<u8>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Location {
    #[prost(uint64, tag = "1")]
    pub address: u64,
    #[prost(message, optional, tag = "2")]
    pub line: Option<Line>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Line {
    #[prost(uint64, tag = "1")]
    pub function_index: u64,
    #[prost(int64, tag = "2")]
    pub line: i64,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Function {
    #[prost(int64, tag = "1")]
    pub name_strindex: i64, // Index into string table
    #[prost(int64, tag = "2")]
    pub filename_strindex: i64, // Index into string table
}
