// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Per-field UI metadata derived from a received schema.
//!
//! The platform's service-registration layer wants, for every request
//! field, a display name, description, example and an input selector
//! matching the field's type. That layer is outside the bridge core;
//! this module only produces the metadata from the schema.

use ciborium::value::Value;
use serde::Serialize;

use crate::schema::decode::{decode_schema, map_get, SchemaError};

/// Input selector kind for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Boolean,
    /// Free-form number entry.
    Number,
    /// Number entry with a fractional step.
    NumberWithStep { step: f64 },
    Text,
    /// Structured object entry, for dict and sequence fields.
    Object,
}

/// Metadata for one request field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMetadata {
    pub name: String,
    pub required: bool,
    pub description: String,
    pub example: String,
    pub selector: Selector,
}

/// Collect display metadata for every field of a raw schema.
///
/// The schema is structurally validated first; a malformed schema is an
/// error, not a partial result.
pub fn collect_field_metadata(raw: &Value) -> Result<Vec<FieldMetadata>, SchemaError> {
    decode_schema(raw)?;

    let Value::Map(entries) = raw else {
        return Err(SchemaError::NotAMap);
    };

    let mut fields = Vec::with_capacity(entries.len());
    for (key, description) in entries {
        let (Value::Text(name), Value::Map(spec)) = (key, description) else {
            // Unreachable after decode_schema, but stay total.
            return Err(SchemaError::NotAMap);
        };

        let kind = match map_get(spec, "type") {
            Some(Value::Text(kind)) => kind.as_str(),
            _ => return Err(SchemaError::MissingKind(name.clone())),
        };

        fields.push(FieldMetadata {
            name: name.clone(),
            required: true,
            description: text_entry(spec, "description"),
            example: text_entry(spec, "example"),
            selector: selector_for(kind),
        });
    }

    Ok(fields)
}

fn text_entry(entries: &[(Value, Value)], key: &str) -> String {
    match map_get(entries, key) {
        Some(Value::Text(s)) => s.clone(),
        _ => String::new(),
    }
}

fn selector_for(kind: &str) -> Selector {
    match kind {
        "bool" => Selector::Boolean,
        "int" => Selector::Number,
        "float" => Selector::NumberWithStep { step: 1e-3 },
        "str" => Selector::Text,
        _ => Selector::Object,
    }
}
