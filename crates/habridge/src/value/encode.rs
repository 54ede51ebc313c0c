// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Encode direction: typed record to generic dictionary.

use ciborium::value::Value;

use super::{FieldValue, Record};

/// Convert a typed record into the generic map form carried on the
/// wire. Primitives copy verbatim, sequences convert element-wise,
/// nested records recurse.
pub fn record_to_value(record: &Record) -> Value {
    let entries = record
        .fields()
        .map(|(name, value)| (Value::Text(name.to_string()), field_to_value(value)))
        .collect();
    Value::Map(entries)
}

fn field_to_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Bool(v) => Value::Bool(*v),
        FieldValue::I8(v) => Value::Integer((*v).into()),
        FieldValue::I16(v) => Value::Integer((*v).into()),
        FieldValue::I32(v) => Value::Integer((*v).into()),
        FieldValue::I64(v) => Value::Integer((*v).into()),
        FieldValue::U8(v) => Value::Integer((*v).into()),
        FieldValue::U16(v) => Value::Integer((*v).into()),
        FieldValue::U32(v) => Value::Integer((*v).into()),
        FieldValue::U64(v) => Value::Integer((*v).into()),
        FieldValue::F32(v) => Value::Float(f64::from(*v)),
        FieldValue::F64(v) => Value::Float(*v),
        FieldValue::String(v) => Value::Text(v.clone()),
        FieldValue::Record(nested) => record_to_value(nested),
        FieldValue::Sequence(items) => Value::Array(items.iter().map(field_to_value).collect()),
        FieldValue::Opaque(raw) => raw.clone(),
    }
}
