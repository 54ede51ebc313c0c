// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Decode direction: generic dictionary to typed record.
//!
//! Each entry of the incoming map is looked up against the message
//! type's declared tags. A field with no declared tag passes through
//! unchanged as [`FieldValue::Opaque`] — the eventual consumer is the
//! final arbiter for those. Everything else is re-typed: integers are
//! width-checked, sequences convert element-wise, and qualified-path
//! fields resolve their nested type through the registry and recurse.

use std::fmt;
use std::sync::Arc;

use ciborium::value::Value;

use crate::registry::{MessageType, TypeRegistry};
use crate::schema::grammar;
use crate::schema::ranges;

use super::{FieldValue, Record};

/// A value's shape did not match its declared field type.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// The top-level value (or a nested record value) was not a map.
    ExpectedMap,
    /// A map key was not a string.
    KeyNotText,
    /// Value kind mismatch for a declared tag.
    Mismatch {
        tag: String,
        expected: &'static str,
    },
    /// Integer did not fit the declared width.
    OutOfRange { tag: String, value: i128 },
    /// A qualified-path field referenced a type the registry does not
    /// know.
    UnresolvedType { package: String, name: String },
    /// The declared tag matched neither a primitive, a sequence, nor a
    /// qualified path.
    UnsupportedTag(String),
    /// Failure nested inside a named field.
    Field {
        name: String,
        source: Box<ConversionError>,
    },
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpectedMap => write!(f, "expected a map value"),
            Self::KeyNotText => write!(f, "map keys must be strings"),
            Self::Mismatch { tag, expected } => {
                write!(f, "declared type `{tag}` expects a {expected} value")
            }
            Self::OutOfRange { tag, value } => {
                write!(f, "value {value} does not fit declared type `{tag}`")
            }
            Self::UnresolvedType { package, name } => {
                write!(f, "referenced type `{package}/{name}` is not registered")
            }
            Self::UnsupportedTag(tag) => write!(f, "unsupported type tag `{tag}`"),
            Self::Field { name, source } => write!(f, "field `{name}`: {source}"),
        }
    }
}

impl std::error::Error for ConversionError {}

/// Convert a generic map into a typed record of `ty`.
pub fn value_to_record(
    ty: &Arc<MessageType>,
    dict: &Value,
    registry: &TypeRegistry,
) -> Result<Record, ConversionError> {
    let Value::Map(entries) = dict else {
        return Err(ConversionError::ExpectedMap);
    };

    let mut record = Record::new(ty.clone());
    for (key, value) in entries {
        let Value::Text(name) = key else {
            return Err(ConversionError::KeyNotText);
        };
        let converted = match ty.field_tag(name) {
            // Unknown field: best-effort passthrough, the consumer
            // decides what to do with it.
            None => FieldValue::Opaque(value.clone()),
            Some(tag) => {
                convert_value(tag, value, registry).map_err(|source| ConversionError::Field {
                    name: name.clone(),
                    source: Box::new(source),
                })?
            }
        };
        record.set(name.clone(), converted);
    }

    Ok(record)
}

fn convert_value(
    tag: &str,
    value: &Value,
    registry: &TypeRegistry,
) -> Result<FieldValue, ConversionError> {
    if ranges::is_primitive(tag) {
        return convert_primitive(tag, value);
    }

    if let Some(subtype) = grammar::parse_sequence(tag) {
        let Value::Array(items) = value else {
            return Err(ConversionError::Mismatch {
                tag: tag.to_string(),
                expected: "sequence",
            });
        };
        let converted = items
            .iter()
            .map(|item| convert_value(subtype, item, registry))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(FieldValue::Sequence(converted));
    }

    if let Some((package, name)) = grammar::parse_message_path(tag) {
        let nested = registry.resolve_message(package, name).ok_or_else(|| {
            ConversionError::UnresolvedType {
                package: package.to_string(),
                name: name.to_string(),
            }
        })?;
        return value_to_record(&nested, value, registry).map(FieldValue::Record);
    }

    Err(ConversionError::UnsupportedTag(tag.to_string()))
}

fn convert_primitive(tag: &str, value: &Value) -> Result<FieldValue, ConversionError> {
    match tag {
        "boolean" => match value {
            Value::Bool(v) => Ok(FieldValue::Bool(*v)),
            _ => Err(mismatch(tag, "bool")),
        },
        "string" | "wstring" => match value {
            Value::Text(v) => Ok(FieldValue::String(v.clone())),
            _ => Err(mismatch(tag, "string")),
        },
        // Integers promote to float; CBOR encoders are free to emit
        // whole floats as integers.
        "float" | "float32" => Ok(FieldValue::F32(as_float(tag, value)? as f32)),
        "double" | "float64" => Ok(FieldValue::F64(as_float(tag, value)?)),
        _ => {
            let n = match value {
                Value::Integer(n) => i128::from(*n),
                _ => return Err(mismatch(tag, "integer")),
            };
            convert_integer(tag, n)
        }
    }
}

fn convert_integer(tag: &str, n: i128) -> Result<FieldValue, ConversionError> {
    let out_of_range = || ConversionError::OutOfRange {
        tag: tag.to_string(),
        value: n,
    };
    match tag {
        "octet" | "byte" | "char" | "uint8" => {
            u8::try_from(n).map(FieldValue::U8).map_err(|_| out_of_range())
        }
        "uint16" => u16::try_from(n)
            .map(FieldValue::U16)
            .map_err(|_| out_of_range()),
        "uint32" => u32::try_from(n)
            .map(FieldValue::U32)
            .map_err(|_| out_of_range()),
        "uint64" => u64::try_from(n)
            .map(FieldValue::U64)
            .map_err(|_| out_of_range()),
        "int8" => i8::try_from(n).map(FieldValue::I8).map_err(|_| out_of_range()),
        "int16" => i16::try_from(n)
            .map(FieldValue::I16)
            .map_err(|_| out_of_range()),
        "int32" => i32::try_from(n)
            .map(FieldValue::I32)
            .map_err(|_| out_of_range()),
        "int64" => i64::try_from(n)
            .map(FieldValue::I64)
            .map_err(|_| out_of_range()),
        _ => Err(ConversionError::UnsupportedTag(tag.to_string())),
    }
}

fn as_float(tag: &str, value: &Value) -> Result<f64, ConversionError> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Integer(n) => Ok(i128::from(*n) as f64),
        _ => Err(mismatch(tag, "float")),
    }
}

fn mismatch(tag: &str, expected: &'static str) -> ConversionError {
    ConversionError::Mismatch {
        tag: tag.to_string(),
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldDef;
    use crate::value::record_to_value;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn registry_with_point() -> (TypeRegistry, Arc<MessageType>) {
        let mut reg = TypeRegistry::new();
        let point = reg.register_message(MessageType::new(
            "geometry_msgs",
            "Point",
            vec![FieldDef::new("x", "double"), FieldDef::new("y", "double")],
        ));
        (reg, point)
    }

    #[test]
    fn round_trips_every_primitive_width() {
        let reg = TypeRegistry::new();
        let ty = Arc::new(MessageType::new(
            "demo",
            "AllPrimitives",
            vec![
                FieldDef::new("b", "boolean"),
                FieldDef::new("o", "octet"),
                FieldDef::new("i8", "int8"),
                FieldDef::new("i16", "int16"),
                FieldDef::new("i32", "int32"),
                FieldDef::new("i64", "int64"),
                FieldDef::new("u8", "uint8"),
                FieldDef::new("u16", "uint16"),
                FieldDef::new("u32", "uint32"),
                FieldDef::new("u64", "uint64"),
                FieldDef::new("f32", "float"),
                FieldDef::new("f64", "double"),
                FieldDef::new("s", "string"),
            ],
        ));

        let record = Record::new(ty.clone())
            .with("b", FieldValue::Bool(true))
            .with("o", FieldValue::U8(255))
            .with("i8", FieldValue::I8(-128))
            .with("i16", FieldValue::I16(-32768))
            .with("i32", FieldValue::I32(i32::MIN))
            .with("i64", FieldValue::I64(i64::MIN))
            .with("u8", FieldValue::U8(255))
            .with("u16", FieldValue::U16(65535))
            .with("u32", FieldValue::U32(u32::MAX))
            .with("u64", FieldValue::U64(u64::MAX))
            .with("f32", FieldValue::F32(1.25))
            .with("f64", FieldValue::F64(-2.5))
            .with("s", FieldValue::String("round trip".into()));

        let dict = record_to_value(&record);
        let back = value_to_record(&ty, &dict, &reg).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn round_trips_nested_record_and_sequence() {
        let (reg, point) = registry_with_point();
        let ty = Arc::new(MessageType::new(
            "demo",
            "Path",
            vec![
                FieldDef::new("origin", "geometry_msgs/Point"),
                FieldDef::new("samples", "sequence<uint16>"),
                FieldDef::new("corners", "sequence<geometry_msgs/Point>"),
            ],
        ));

        let p = |x: f64, y: f64| {
            Record::new(point.clone())
                .with("x", FieldValue::F64(x))
                .with("y", FieldValue::F64(y))
        };
        let record = Record::new(ty.clone())
            .with("origin", FieldValue::Record(p(0.0, 0.0)))
            .with(
                "samples",
                FieldValue::Sequence(vec![
                    FieldValue::U16(1),
                    FieldValue::U16(2),
                    FieldValue::U16(3),
                ]),
            )
            .with(
                "corners",
                FieldValue::Sequence(vec![
                    FieldValue::Record(p(1.0, 1.0)),
                    FieldValue::Record(p(2.0, 4.0)),
                ]),
            );

        let dict = record_to_value(&record);
        let back = value_to_record(&ty, &dict, &reg).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn width_violation_is_a_conversion_error() {
        let reg = TypeRegistry::new();
        let ty = Arc::new(MessageType::new(
            "demo",
            "Narrow",
            vec![FieldDef::new("level", "uint8")],
        ));

        let dict = Value::Map(vec![(text("level"), Value::Integer(256.into()))]);
        let err = value_to_record(&ty, &dict, &reg).unwrap_err();
        match err {
            ConversionError::Field { name, source } => {
                assert_eq!(name, "level");
                assert!(matches!(*source, ConversionError::OutOfRange { .. }));
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }

    #[test]
    fn shape_mismatch_is_surfaced() {
        let reg = TypeRegistry::new();
        let ty = Arc::new(MessageType::new(
            "demo",
            "Flag",
            vec![FieldDef::new("on", "boolean")],
        ));

        let dict = Value::Map(vec![(text("on"), text("yes"))]);
        assert!(value_to_record(&ty, &dict, &reg).is_err());
    }

    #[test]
    fn undeclared_field_passes_through_unchanged() {
        let reg = TypeRegistry::new();
        let ty = Arc::new(MessageType::new(
            "demo",
            "Flag",
            vec![FieldDef::new("on", "boolean")],
        ));

        let dict = Value::Map(vec![
            (text("on"), Value::Bool(true)),
            (text("mystery"), Value::Float(9.5)),
        ]);
        let record = value_to_record(&ty, &dict, &reg).unwrap();
        assert_eq!(
            record.get("mystery"),
            Some(&FieldValue::Opaque(Value::Float(9.5)))
        );
    }

    #[test]
    fn unresolved_nested_type_is_an_error() {
        let reg = TypeRegistry::new();
        let ty = Arc::new(MessageType::new(
            "demo",
            "Holder",
            vec![FieldDef::new("inner", "missing_pkg/Nothing")],
        ));

        let dict = Value::Map(vec![(text("inner"), Value::Map(vec![]))]);
        let err = value_to_record(&ty, &dict, &reg).unwrap_err();
        match err {
            ConversionError::Field { source, .. } => {
                assert!(matches!(*source, ConversionError::UnresolvedType { .. }));
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }

    #[test]
    fn sequence_uint16_scenario() {
        // sequence<uint16> carries [1, 2, 3] through both directions
        // unchanged.
        let reg = TypeRegistry::new();
        let ty = Arc::new(MessageType::new(
            "demo",
            "Samples",
            vec![FieldDef::new("values", "sequence<uint16>")],
        ));
        let record = Record::new(ty.clone()).with(
            "values",
            FieldValue::Sequence(vec![
                FieldValue::U16(1),
                FieldValue::U16(2),
                FieldValue::U16(3),
            ]),
        );

        let dict = record_to_value(&record);
        assert_eq!(value_to_record(&ty, &dict, &reg).unwrap(), record);
    }
}
