// Copyright 2026-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::{ByteSlice, Field, Repeated, Value, WireType, NO_OPT_ZERO, OPT_ZERO};
use std::io::{self, Write};

/// An attribute value. Exactly one member of the oneof is written, even when
/// it holds a zero value, so `Int(0)` and `Bool(false)` survive the trip.
///
/// [`AnyValue::Empty`] writes nothing. It exists so that the message has a
/// default and a [KeyValue] without a value can be represented; encoders
/// should not produce it.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum AnyValue<'a> {
    #[default]
    Empty,
    String(Field<&'a str, 1, NO_OPT_ZERO>),
    Bool(Field<bool, 2, NO_OPT_ZERO>),
    Int(Field<i64, 3, NO_OPT_ZERO>),
    Double(Field<f64, 4, NO_OPT_ZERO>),
    Array(Field<ArrayValue<'a>, 5, NO_OPT_ZERO>),
    Bytes(Field<ByteSlice<'a>, 7, NO_OPT_ZERO>),
}

impl Value for AnyValue<'_> {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        match self {
            AnyValue::Empty => 0,
            AnyValue::String(field) => field.proto_len(),
            AnyValue::Bool(field) => field.proto_len(),
            AnyValue::Int(field) => field.proto_len(),
            AnyValue::Double(field) => field.proto_len(),
            AnyValue::Array(field) => field.proto_len(),
            AnyValue::Bytes(field) => field.proto_len(),
        }
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            AnyValue::Empty => Ok(()),
            AnyValue::String(field) => field.encode(writer),
            AnyValue::Bool(field) => field.encode(writer),
            AnyValue::Int(field) => field.encode(writer),
            AnyValue::Double(field) => field.encode(writer),
            AnyValue::Array(field) => field.encode(writer),
            AnyValue::Bytes(field) => field.encode(writer),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ArrayValue<'a> {
    pub values: Repeated<'a, AnyValue<'a>, 1>,
}

impl Value for ArrayValue<'_> {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.values.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.values.encode(writer)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct KeyValue<'a> {
    pub key: Field<&'a str, 1, OPT_ZERO>,
    pub value: Field<AnyValue<'a>, 2, OPT_ZERO>,
}

impl Value for KeyValue<'_> {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.key.proto_len() + self.value.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.key.encode(writer)?;
        self.value.encode(writer)
    }
}

/// Identity of the process that produced a batch of profiles.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Resource<'a> {
    pub service_name: Field<&'a str, 1, OPT_ZERO>,
    pub service_instance_id: Field<&'a str, 2, OPT_ZERO>,
    pub attributes: Repeated<'a, KeyValue<'a>, 3>,
}

impl Value for Resource<'_> {
    const WIRE_TYPE: WireType = WireType::LengthDelimited;

    fn proto_len(&self) -> u64 {
        self.service_name.proto_len()
            + self.service_instance_id.proto_len()
            + self.attributes.proto_len()
    }

    fn encode<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.service_name.encode(writer)?;
        self.service_instance_id.encode(writer)?;
        self.attributes.encode(writer)
    }
}

impl<'a> AnyValue<'a> {
    pub fn string(value: &'a str) -> Self {
        AnyValue::String(value.into())
    }

    pub fn bool(value: bool) -> Self {
        AnyValue::Bool(value.into())
    }

    pub fn int(value: i64) -> Self {
        AnyValue::Int(value.into())
    }

    pub fn double(value: f64) -> Self {
        AnyValue::Double(value.into())
    }

    pub fn array(values: &'a [AnyValue<'a>]) -> Self {
        AnyValue::Array(
            ArrayValue {
                values: values.into(),
            }
            .into(),
        )
    }

    pub fn bytes(value: &'a [u8]) -> Self {
        AnyValue::Bytes(ByteSlice(value).into())
    }
}

#[cfg(feature = "prost_impls")]
impl From<&AnyValue<'_>> for crate::prost_impls::AnyValue {
    fn from(value: &AnyValue<'_>) -> Self {
        use crate::prost_impls::any_value::Value as V;
        let value = match value {
            AnyValue::Empty => None,
            AnyValue::String(field) => Some(V::StringValue(field.value.to_string())),
            AnyValue::Bool(field) => Some(V::BoolValue(field.value)),
            AnyValue::Int(field) => Some(V::IntValue(field.value)),
            AnyValue::Double(field) => Some(V::DoubleValue(field.value)),
            AnyValue::Array(field) => Some(V::ArrayValue(crate::prost_impls::ArrayValue {
                values: field.value.values.values.iter().map(Self::from).collect(),
            })),
            AnyValue::Bytes(field) => Some(V::BytesValue(field.value.0.to_vec())),
        };
        Self { value }
    }
}

#[cfg(feature = "prost_impls")]
impl From<&KeyValue<'_>> for crate::prost_impls::KeyValue {
    fn from(kv: &KeyValue<'_>) -> Self {
        Self {
            key: kv.key.value.to_string(),
            value: match kv.value.value {
                AnyValue::Empty => None,
                ref value => Some(value.into()),
            },
        }
    }
}

#[cfg(feature = "prost_impls")]
impl From<&Resource<'_>> for crate::prost_impls::Resource {
    fn from(resource: &Resource<'_>) -> Self {
        Self {
            service_name: resource.service_name.value.to_string(),
            service_instance_id: resource.service_instance_id.value.to_string(),
            attributes: resource
                .attributes
                .values
                .iter()
                .map(crate::prost_impls::KeyValue::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prost_impls;
    use prost::Message;

    fn roundtrip_key_value(kv: &KeyValue) -> prost_impls::KeyValue {
        let mut buffer = Vec::with_capacity(kv.proto_len() as usize);
        kv.encode(&mut buffer).unwrap();
        assert_eq!(buffer.len() as u64, kv.proto_len());
        prost_impls::KeyValue::decode(buffer.as_slice()).unwrap()
    }

    #[test]
    fn zero_values_are_present() {
        for value in [AnyValue::int(0), AnyValue::bool(false), AnyValue::string("")] {
            let kv = KeyValue {
                key: "k".into(),
                value: value.into(),
            };
            let decoded = roundtrip_key_value(&kv);
            assert_eq!(decoded, prost_impls::KeyValue::from(&kv));
            assert!(decoded.value.unwrap().value.is_some());
        }
    }

    #[test]
    fn array_of_scalars() {
        let elements = [
            AnyValue::string("a"),
            AnyValue::int(-3),
            AnyValue::double(2.5),
            AnyValue::bytes(&[1, 2, 3]),
        ];
        let kv = KeyValue {
            key: "list".into(),
            value: AnyValue::array(&elements).into(),
        };
        assert_eq!(roundtrip_key_value(&kv), prost_impls::KeyValue::from(&kv));
    }

    #[test]
    fn resource_roundtrip() {
        bolero::check!()
            .with_type::<(String, String, Vec<(String, i64)>)>()
            .for_each(|(name, instance, attrs)| {
                let values: Vec<_> = attrs
                    .iter()
                    .map(|(k, v)| KeyValue {
                        key: k.as_str().into(),
                        value: AnyValue::int(*v).into(),
                    })
                    .collect();
                let resource = Resource {
                    service_name: name.as_str().into(),
                    service_instance_id: instance.as_str().into(),
                    attributes: values.as_slice().into(),
                };
                let mut buffer = Vec::with_capacity(resource.proto_len() as usize);
                resource.encode(&mut buffer).unwrap();
                let decoded = prost_impls::Resource::decode(buffer.as_slice()).unwrap();
                assert_eq!(decoded, prost_impls::Resource::from(&resource));
            });
    }
}
