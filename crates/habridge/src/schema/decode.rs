// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Schema decoding: turn a received raw schema into field validators.
//!
//! This is the inverse of generation, run on the platform side against
//! schemas carried in an advertisement. A raw schema is a generic map
//! of field name to field description; each description must carry a
//! `type` of one of the six recognized kinds. Unknown extra keys inside
//! a description (`description`, `example`, ...) are tolerated at every
//! level; an unrecognized `type` is a hard structural error.

use std::fmt;

use ciborium::value::Value;

/// Structural error in a received schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema itself was not a map.
    NotAMap,
    /// A field description was not a map.
    FieldNotAMap(String),
    /// A field description had no `type` key, or it was not a string.
    MissingKind(String),
    /// A field description's `type` was not a recognized kind.
    UnknownKind { field: String, kind: String },
    /// An `int` range was present but malformed.
    BadRange(String),
    /// A `dict` description had no map-shaped `schema` key.
    MissingSchema(String),
    /// A `sequence` description had no `subtype` key.
    MissingSubtype(String),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAMap => write!(f, "schema is not a map"),
            Self::FieldNotAMap(field) => write!(f, "field `{field}` description is not a map"),
            Self::MissingKind(field) => write!(f, "field `{field}` has no `type` string"),
            Self::UnknownKind { field, kind } => {
                write!(f, "field `{field}` has unknown type `{kind}`")
            }
            Self::BadRange(field) => write!(f, "field `{field}` has a malformed range"),
            Self::MissingSchema(field) => {
                write!(f, "dict field `{field}` has no `schema` map")
            }
            Self::MissingSubtype(field) => {
                write!(f, "sequence field `{field}` has no `subtype`")
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// A value failed validation against a decoded schema.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    ExpectedMap,
    MissingField(String),
    UnknownField(String),
    /// Wrong kind of value; `expected` names the schema kind.
    Expected(&'static str),
    OutOfRange {
        value: i128,
        min: Option<i128>,
        max: Option<i128>,
    },
    FloatOutOfRange {
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },
    /// Failure nested inside a named field.
    Field {
        name: String,
        source: Box<ValidationError>,
    },
    /// Failure at a sequence element.
    Element {
        index: usize,
        source: Box<ValidationError>,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExpectedMap => write!(f, "expected a map"),
            Self::MissingField(name) => write!(f, "required field `{name}` is missing"),
            Self::UnknownField(name) => write!(f, "unexpected field `{name}`"),
            Self::Expected(kind) => write!(f, "expected a {kind} value"),
            Self::OutOfRange { value, min, max } => {
                write!(f, "value {value} outside range [{min:?}, {max:?}]")
            }
            Self::FloatOutOfRange { value, min, max } => {
                write!(f, "value {value} outside range [{min:?}, {max:?}]")
            }
            Self::Field { name, source } => write!(f, "field `{name}`: {source}"),
            Self::Element { index, source } => write!(f, "element {index}: {source}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validator for one field of a service request or response.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValidator {
    Bool,
    /// Integer with optional inclusive bounds.
    Int { min: Option<i128>, max: Option<i128> },
    /// Float with optional inclusive bounds.
    Float { min: Option<f64>, max: Option<f64> },
    Str,
    Dict(MessageValidator),
    Sequence(Box<FieldValidator>),
}

impl FieldValidator {
    /// Check a single value against this validator.
    pub fn check(&self, value: &Value) -> Result<(), ValidationError> {
        match self {
            Self::Bool => match value {
                Value::Bool(_) => Ok(()),
                _ => Err(ValidationError::Expected("bool")),
            },
            Self::Int { min, max } => match value {
                Value::Integer(n) => {
                    let n = i128::from(*n);
                    let below = min.map_or(false, |m| n < m);
                    let above = max.map_or(false, |m| n > m);
                    if below || above {
                        Err(ValidationError::OutOfRange {
                            value: n,
                            min: *min,
                            max: *max,
                        })
                    } else {
                        Ok(())
                    }
                }
                _ => Err(ValidationError::Expected("int")),
            },
            Self::Float { min, max } => match value {
                Value::Float(v) => {
                    let below = min.map_or(false, |m| *v < m);
                    let above = max.map_or(false, |m| *v > m);
                    if below || above {
                        Err(ValidationError::FloatOutOfRange {
                            value: *v,
                            min: *min,
                            max: *max,
                        })
                    } else {
                        Ok(())
                    }
                }
                _ => Err(ValidationError::Expected("float")),
            },
            Self::Str => match value {
                Value::Text(_) => Ok(()),
                _ => Err(ValidationError::Expected("str")),
            },
            Self::Dict(inner) => inner.validate(value),
            Self::Sequence(elem) => match value {
                Value::Array(items) => {
                    for (index, item) in items.iter().enumerate() {
                        elem.check(item).map_err(|source| ValidationError::Element {
                            index,
                            source: Box::new(source),
                        })?;
                    }
                    Ok(())
                }
                _ => Err(ValidationError::Expected("sequence")),
            },
        }
    }
}

/// Validators for every field of a message, in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageValidator {
    fields: Vec<(String, FieldValidator)>,
}

impl MessageValidator {
    /// Look up the validator for one field.
    pub fn field(&self, name: &str) -> Option<&FieldValidator> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate a request/response payload: it must be a map, every
    /// declared field must be present and valid, and no undeclared
    /// keys are allowed.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
        let Value::Map(entries) = value else {
            return Err(ValidationError::ExpectedMap);
        };

        for (key, item) in entries {
            let Value::Text(name) = key else {
                return Err(ValidationError::Expected("string key"));
            };
            let validator = self
                .field(name)
                .ok_or_else(|| ValidationError::UnknownField(name.clone()))?;
            validator
                .check(item)
                .map_err(|source| ValidationError::Field {
                    name: name.clone(),
                    source: Box::new(source),
                })?;
        }

        for (name, _) in &self.fields {
            let present = entries
                .iter()
                .any(|(key, _)| matches!(key, Value::Text(k) if k == name));
            if !present {
                return Err(ValidationError::MissingField(name.clone()));
            }
        }

        Ok(())
    }
}

/// Decode a raw schema into a [`MessageValidator`], validating its
/// structure along the way.
pub fn decode_schema(raw: &Value) -> Result<MessageValidator, SchemaError> {
    let Value::Map(entries) = raw else {
        return Err(SchemaError::NotAMap);
    };

    let mut fields = Vec::with_capacity(entries.len());
    for (key, description) in entries {
        let Value::Text(name) = key else {
            return Err(SchemaError::NotAMap);
        };
        fields.push((name.clone(), decode_field(name, description)?));
    }

    Ok(MessageValidator { fields })
}

fn decode_field(name: &str, description: &Value) -> Result<FieldValidator, SchemaError> {
    let Value::Map(entries) = description else {
        return Err(SchemaError::FieldNotAMap(name.to_string()));
    };

    let kind = match map_get(entries, "type") {
        Some(Value::Text(kind)) => kind.as_str(),
        _ => return Err(SchemaError::MissingKind(name.to_string())),
    };

    match kind {
        "bool" => Ok(FieldValidator::Bool),
        "str" => Ok(FieldValidator::Str),
        "float" => {
            let (min, max) = decode_range(name, map_get(entries, "range"))?;
            Ok(FieldValidator::Float {
                min: min.map(Bound::as_f64),
                max: max.map(Bound::as_f64),
            })
        }
        "int" => {
            let (min, max) = decode_range(name, map_get(entries, "range"))?;
            Ok(FieldValidator::Int {
                // A fractional bound on an integer field tightens to the
                // nearest admissible integer.
                min: min.map(Bound::as_int_min),
                max: max.map(Bound::as_int_max),
            })
        }
        "dict" => match map_get(entries, "schema") {
            Some(inner @ Value::Map(_)) => Ok(FieldValidator::Dict(decode_schema(inner)?)),
            _ => Err(SchemaError::MissingSchema(name.to_string())),
        },
        "sequence" => match map_get(entries, "subtype") {
            Some(subtype) => Ok(FieldValidator::Sequence(Box::new(decode_field(
                name, subtype,
            )?))),
            None => Err(SchemaError::MissingSubtype(name.to_string())),
        },
        other => Err(SchemaError::UnknownKind {
            field: name.to_string(),
            kind: other.to_string(),
        }),
    }
}

/// A numeric range bound as found on the wire: integer or float, both
/// legal on `int` and `float` fields alike.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Int(i128),
    Float(f64),
}

impl Bound {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(f) => f,
        }
    }

    /// Lower bound on an integer field: the smallest integer that
    /// satisfies it.
    fn as_int_min(self) -> i128 {
        match self {
            Self::Int(n) => n,
            Self::Float(f) => f.ceil() as i128,
        }
    }

    /// Upper bound on an integer field: the largest integer that
    /// satisfies it.
    fn as_int_max(self) -> i128 {
        match self {
            Self::Int(n) => n,
            Self::Float(f) => f.floor() as i128,
        }
    }
}

fn decode_range(
    name: &str,
    range: Option<&Value>,
) -> Result<(Option<Bound>, Option<Bound>), SchemaError> {
    let Some(range) = range else {
        return Ok((None, None));
    };
    let Value::Map(entries) = range else {
        return Err(SchemaError::BadRange(name.to_string()));
    };

    let bound = |key: &str| -> Result<Option<Bound>, SchemaError> {
        match map_get(entries, key) {
            None => Ok(None),
            Some(Value::Integer(n)) => Ok(Some(Bound::Int(i128::from(*n)))),
            Some(Value::Float(f)) => Ok(Some(Bound::Float(*f))),
            Some(_) => Err(SchemaError::BadRange(name.to_string())),
        }
    };

    Ok((bound("min")?, bound("max")?))
}

pub(crate) fn map_get<'a>(entries: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|(k, _)| matches!(k, Value::Text(t) if t == key))
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn field(kind: &str) -> Value {
        Value::Map(vec![(text("type"), text(kind))])
    }

    fn int_field(min: i64, max: i64) -> Value {
        Value::Map(vec![
            (text("type"), text("int")),
            (
                text("range"),
                Value::Map(vec![
                    (text("min"), Value::Integer(min.into())),
                    (text("max"), Value::Integer(max.into())),
                ]),
            ),
        ])
    }

    #[test]
    fn decodes_primitive_fields() {
        let raw = Value::Map(vec![
            (text("on"), field("bool")),
            (text("label"), field("str")),
            (text("level"), int_field(0, 255)),
        ]);
        let validator = decode_schema(&raw).unwrap();

        assert_eq!(validator.field_names(), vec!["on", "label", "level"]);
        assert!(validator.field("on").unwrap().check(&Value::Bool(true)).is_ok());
        assert!(validator
            .field("label")
            .unwrap()
            .check(&text("hello"))
            .is_ok());
    }

    #[test]
    fn integer_range_is_inclusive() {
        let raw = Value::Map(vec![(text("level"), int_field(0, 255))]);
        let validator = decode_schema(&raw).unwrap();
        let level = validator.field("level").unwrap();

        assert!(level.check(&Value::Integer(0.into())).is_ok());
        assert!(level.check(&Value::Integer(255.into())).is_ok());
        assert!(level.check(&Value::Integer((-1).into())).is_err());
        assert!(level.check(&Value::Integer(256.into())).is_err());
    }

    #[test]
    fn float_range_is_enforced() {
        let raw = Value::Map(vec![(
            text("ratio"),
            Value::Map(vec![
                (text("type"), text("float")),
                (
                    text("range"),
                    Value::Map(vec![
                        (text("min"), Value::Float(0.0)),
                        (text("max"), Value::Float(1.0)),
                    ]),
                ),
            ]),
        )]);
        let validator = decode_schema(&raw).unwrap();
        let ratio = validator.field("ratio").unwrap();

        assert!(ratio.check(&Value::Float(0.0)).is_ok());
        assert!(ratio.check(&Value::Float(0.5)).is_ok());
        assert!(ratio.check(&Value::Float(1.0)).is_ok());
        assert_eq!(
            ratio.check(&Value::Float(5.0)),
            Err(ValidationError::FloatOutOfRange {
                value: 5.0,
                min: Some(0.0),
                max: Some(1.0),
            })
        );
        assert!(ratio.check(&Value::Float(-0.1)).is_err());
    }

    #[test]
    fn float_field_accepts_integer_bounds() {
        let raw = Value::Map(vec![(
            text("ratio"),
            Value::Map(vec![
                (text("type"), text("float")),
                (
                    text("range"),
                    Value::Map(vec![
                        (text("min"), Value::Integer(0.into())),
                        (text("max"), Value::Integer(1.into())),
                    ]),
                ),
            ]),
        )]);
        let validator = decode_schema(&raw).unwrap();
        let ratio = validator.field("ratio").unwrap();

        assert!(ratio.check(&Value::Float(0.5)).is_ok());
        assert!(ratio.check(&Value::Float(5.0)).is_err());
    }

    #[test]
    fn int_field_accepts_float_bounds() {
        let raw = Value::Map(vec![(
            text("level"),
            Value::Map(vec![
                (text("type"), text("int")),
                (
                    text("range"),
                    Value::Map(vec![
                        (text("min"), Value::Float(0.0)),
                        (text("max"), Value::Float(255.0)),
                    ]),
                ),
            ]),
        )]);
        let validator = decode_schema(&raw).unwrap();
        let level = validator.field("level").unwrap();

        assert!(level.check(&Value::Integer(0.into())).is_ok());
        assert!(level.check(&Value::Integer(255.into())).is_ok());
        assert!(level.check(&Value::Integer(256.into())).is_err());
    }

    #[test]
    fn fractional_bounds_tighten_to_admissible_integers() {
        let raw = Value::Map(vec![(
            text("level"),
            Value::Map(vec![
                (text("type"), text("int")),
                (
                    text("range"),
                    Value::Map(vec![
                        (text("min"), Value::Float(0.5)),
                        (text("max"), Value::Float(9.5)),
                    ]),
                ),
            ]),
        )]);
        let validator = decode_schema(&raw).unwrap();
        let level = validator.field("level").unwrap();

        assert!(level.check(&Value::Integer(0.into())).is_err());
        assert!(level.check(&Value::Integer(1.into())).is_ok());
        assert!(level.check(&Value::Integer(9.into())).is_ok());
        assert!(level.check(&Value::Integer(10.into())).is_err());
    }

    #[test]
    fn non_numeric_bound_is_a_bad_range() {
        let raw = Value::Map(vec![(
            text("level"),
            Value::Map(vec![
                (text("type"), text("int")),
                (
                    text("range"),
                    Value::Map(vec![(text("min"), text("zero"))]),
                ),
            ]),
        )]);
        assert_eq!(
            decode_schema(&raw),
            Err(SchemaError::BadRange("level".into()))
        );
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let raw = Value::Map(vec![(text("blob"), field("banana"))]);
        assert_eq!(
            decode_schema(&raw),
            Err(SchemaError::UnknownKind {
                field: "blob".into(),
                kind: "banana".into(),
            })
        );
    }

    #[test]
    fn extra_keys_in_a_field_description_are_tolerated() {
        let raw = Value::Map(vec![(
            text("on"),
            Value::Map(vec![
                (text("type"), text("bool")),
                (text("description"), text("turn the led on")),
                (text("example"), text("true")),
                (text("vendor_extension"), Value::Integer(7.into())),
            ]),
        )]);
        let validator = decode_schema(&raw).unwrap();
        assert!(validator.field("on").unwrap().check(&Value::Bool(false)).is_ok());
    }

    #[test]
    fn nested_dict_and_sequence_validators() {
        let raw = Value::Map(vec![
            (
                text("target"),
                Value::Map(vec![
                    (text("type"), text("dict")),
                    (
                        text("schema"),
                        Value::Map(vec![(text("x"), field("float"))]),
                    ),
                ]),
            ),
            (
                text("samples"),
                Value::Map(vec![
                    (text("type"), text("sequence")),
                    (text("subtype"), int_field(0, 65535)),
                ]),
            ),
        ]);
        let validator = decode_schema(&raw).unwrap();

        let payload = Value::Map(vec![
            (
                text("target"),
                Value::Map(vec![(text("x"), Value::Float(1.5))]),
            ),
            (
                text("samples"),
                Value::Array(vec![
                    Value::Integer(1.into()),
                    Value::Integer(2.into()),
                    Value::Integer(3.into()),
                ]),
            ),
        ]);
        assert!(validator.validate(&payload).is_ok());

        let bad = Value::Map(vec![
            (
                text("target"),
                Value::Map(vec![(text("x"), Value::Float(1.5))]),
            ),
            (
                text("samples"),
                Value::Array(vec![Value::Integer(70000.into())]),
            ),
        ]);
        assert!(validator.validate(&bad).is_err());
    }

    #[test]
    fn payload_validation_requires_declared_fields_and_rejects_extras() {
        let raw = Value::Map(vec![(text("on"), field("bool"))]);
        let validator = decode_schema(&raw).unwrap();

        assert!(validator
            .validate(&Value::Map(vec![(text("on"), Value::Bool(true))]))
            .is_ok());
        assert_eq!(
            validator.validate(&Value::Map(vec![])),
            Err(ValidationError::MissingField("on".into()))
        );
        assert_eq!(
            validator.validate(&Value::Map(vec![
                (text("on"), Value::Bool(true)),
                (text("extra"), Value::Bool(true)),
            ])),
            Err(ValidationError::UnknownField("extra".into()))
        );
    }

    #[test]
    fn set_led_scenario() {
        // Advertisement request schema {on: {type: bool}} must accept
        // {on: true} and reject {on: "yes"}.
        let raw = Value::Map(vec![(text("on"), field("bool"))]);
        let validator = decode_schema(&raw).unwrap();

        assert!(validator
            .validate(&Value::Map(vec![(text("on"), Value::Bool(true))]))
            .is_ok());
        assert!(validator
            .validate(&Value::Map(vec![(text("on"), text("yes"))]))
            .is_err());
    }

    #[test]
    fn bool_rejects_numeric_lookalikes() {
        let validator = FieldValidator::Bool;
        assert!(validator.check(&Value::Integer(1.into())).is_err());
        assert!(validator.check(&Value::Bool(true)).is_ok());
    }
}
