// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Typed record values and the bidirectional value codec.
//!
//! A [`Record`] is the bridge's in-process form of a middleware
//! message: a [`MessageType`] descriptor plus one typed value per
//! field. The codec converts records to generic CBOR dictionaries and
//! back, driven by the declared field type tags — the same
//! primitive/sequence/path dispatch the schema generator applies, so
//! integer widths and nesting survive a round trip.

mod decode;
mod encode;

pub use decode::{value_to_record, ConversionError};
pub use encode::record_to_value;

use std::sync::Arc;

use ciborium::value::Value;

use crate::registry::MessageType;

/// One typed field value. Integer variants preserve the declared
/// width; `Opaque` carries a value whose declared type could not be
/// determined and is passed through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Record(Record),
    Sequence(Vec<FieldValue>),
    Opaque(Value),
}

impl FieldValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Sequence(v) => Some(v),
            _ => None,
        }
    }
}

/// A typed message instance: descriptor plus field values in insertion
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    ty: Arc<MessageType>,
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new(ty: Arc<MessageType>) -> Self {
        Self {
            ty,
            fields: Vec::new(),
        }
    }

    pub fn ty(&self) -> &Arc<MessageType> {
        &self.ty
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        if let Some((_, slot)) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            *slot = value;
        } else {
            self.fields.push((name, value));
        }
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
