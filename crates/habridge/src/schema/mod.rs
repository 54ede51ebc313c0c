// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Transport schema generation.
//!
//! A schema describes the request or response shape of a bridged
//! service in a transport-neutral form, so the far side of the socket
//! can validate and render calls without knowing the middleware's
//! native types. Generation walks a [`MessageType`]'s declared fields
//! in order and maps every type tag onto a [`SchemaNode`]:
//!
//! - fixed primitive names map to `bool` / `int` (with its compile-time
//!   range) / `float` / `str`,
//! - `sequence<T>` maps to a `sequence` node wrapping the element node,
//! - `package/TypeName` resolves through the [`TypeRegistry`] and maps
//!   to a nested `dict` node,
//! - anything unresolvable or unparsable drops the field with a logged
//!   diagnostic — generation never aborts.

pub mod decode;
pub mod grammar;
pub mod metadata;
pub mod ranges;

use crate::registry::{MessageType, TypeRegistry};
use ciborium::value::Value;
use ranges::IntRange;
use tracing::warn;

/// One node of the recursive type-description tree.
///
/// The tree is finite and acyclic: recursion is bounded by the depth of
/// the underlying type definitions, which may not reference themselves
/// transitively.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Bool,
    Int { range: IntRange },
    Float,
    Str,
    Dict { schema: Schema },
    Sequence { subtype: Box<SchemaNode> },
}

impl SchemaNode {
    /// Wire name of this node's kind (`bool`, `int`, `float`, `str`,
    /// `dict`, `sequence`).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int { .. } => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Dict { .. } => "dict",
            Self::Sequence { .. } => "sequence",
        }
    }

    /// Render as the generic map form carried inside an advertisement.
    pub fn to_value(&self) -> Value {
        let mut entries = vec![(text("type"), text(self.kind()))];
        match self {
            Self::Bool | Self::Float | Self::Str => {}
            Self::Int { range } => {
                entries.push((
                    text("range"),
                    Value::Map(vec![
                        (text("min"), integer(range.min)),
                        (text("max"), integer(range.max)),
                    ]),
                ));
            }
            Self::Dict { schema } => {
                entries.push((text("schema"), schema.to_value()));
            }
            Self::Sequence { subtype } => {
                entries.push((text("subtype"), subtype.to_value()));
            }
        }
        Value::Map(entries)
    }
}

/// A schema node plus the optional human-facing metadata merged in from
/// the service configuration. Extra keys beside the node's own are the
/// schema grammar's open-field allowance: receivers must tolerate them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldSpec {
    pub description: Option<String>,
    pub example: Option<String>,
}

/// An ordered mapping from field name to schema node, preserving the
/// message type's declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    fields: Vec<(String, SchemaNode, FieldSpec)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Declaration order is preserved.
    pub fn push(&mut self, name: impl Into<String>, node: SchemaNode) {
        self.fields.push((name.into(), node, FieldSpec::default()));
    }

    /// Attach description/example metadata to an existing field.
    /// Unknown field names are ignored, mirroring the configuration
    /// loader's tolerance for stale metadata entries.
    pub fn annotate(&mut self, name: &str, spec: FieldSpec) {
        if let Some((_, _, slot)) = self.fields.iter_mut().find(|(n, _, _)| n == name) {
            *slot = spec;
        }
    }

    pub fn get(&self, name: &str) -> Option<&SchemaNode> {
        self.fields
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, node, _)| node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.fields.iter().map(|(n, node, _)| (n.as_str(), node))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render as the generic map form carried inside an advertisement.
    pub fn to_value(&self) -> Value {
        let entries = self
            .fields
            .iter()
            .map(|(name, node, spec)| {
                let mut rendered = node.to_value();
                if let Value::Map(entries) = &mut rendered {
                    if let Some(description) = &spec.description {
                        entries.push((text("description"), text(description)));
                    }
                    if let Some(example) = &spec.example {
                        entries.push((text("example"), text(example)));
                    }
                }
                (text(name), rendered)
            })
            .collect();
        Value::Map(entries)
    }
}

fn text(s: impl Into<String>) -> Value {
    Value::Text(s.into())
}

/// Encode an `i128` bound as a CBOR integer. Every bound in the fixed
/// range table fits the CBOR integer range.
fn integer(n: i128) -> Value {
    if let Ok(v) = i64::try_from(n) {
        Value::Integer(v.into())
    } else {
        Value::Integer(u64::try_from(n).unwrap_or(u64::MAX).into())
    }
}

/// Generate the transport schema for a message type.
///
/// Fields whose type tag cannot be parsed, or whose referenced type is
/// not in the registry, are omitted with a warning. The result is
/// deterministic for a fixed type graph.
pub fn generate_schema(ty: &MessageType, registry: &TypeRegistry) -> Schema {
    let mut schema = Schema::new();
    for field in &ty.fields {
        match encode_type(&field.type_tag, registry) {
            Some(node) => schema.push(&field.name, node),
            None => warn!(
                field = %field.name,
                tag = %field.type_tag,
                message_type = %ty.qualified_name(),
                "failed to encode field type, omitting from schema"
            ),
        }
    }
    schema
}

fn encode_type(tag: &str, registry: &TypeRegistry) -> Option<SchemaNode> {
    if tag == "boolean" {
        return Some(SchemaNode::Bool);
    }
    if let Some(range) = ranges::integer_range(tag) {
        return Some(SchemaNode::Int { range });
    }
    match tag {
        "float" | "float32" | "double" | "float64" => return Some(SchemaNode::Float),
        "string" | "wstring" => return Some(SchemaNode::Str),
        _ => {}
    }

    if let Some(subtype) = grammar::parse_sequence(tag) {
        return Some(SchemaNode::Sequence {
            subtype: Box::new(encode_type(subtype, registry)?),
        });
    }

    if let Some((package, name)) = grammar::parse_message_path(tag) {
        if let Some(nested) = registry.resolve_message(package, name) {
            return Some(SchemaNode::Dict {
                schema: generate_schema(&nested, registry),
            });
        }
        warn!(package, name, "referenced type not in registry");
        return None;
    }

    None
}
