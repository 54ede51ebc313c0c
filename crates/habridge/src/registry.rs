// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Static type registry.
//!
//! The middleware being bridged resolves message and service classes by
//! runtime name. Here that lookup is an explicit registry: descriptors
//! are registered once at startup and queried synchronously. A missing
//! entry is a normal `None`, never an error — callers decide whether to
//! omit a field, log, or surface a conversion failure.

use std::collections::HashMap;
use std::sync::Arc;

/// One declared field of a message type: name plus the middleware type
/// tag (`uint16`, `sequence<float>`, `geometry_msgs/Point`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub type_tag: String,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }
}

/// A message type: an ordered list of field declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageType {
    /// Package the type belongs to.
    pub package: String,
    /// Bare type name within the package.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
}

impl MessageType {
    pub fn new(package: impl Into<String>, name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            fields,
        }
    }

    /// The type tag declared for `field`, if the field exists.
    pub fn field_tag(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| f.type_tag.as_str())
    }

    /// Qualified `package/Name` form.
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.package, self.name)
    }
}

/// A service type: a request message and a response message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceType {
    pub package: String,
    pub name: String,
    pub request: Arc<MessageType>,
    pub response: Arc<MessageType>,
}

impl ServiceType {
    pub fn new(
        package: impl Into<String>,
        name: impl Into<String>,
        request: Arc<MessageType>,
        response: Arc<MessageType>,
    ) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
            request,
            response,
        }
    }
}

/// Registry of message and service descriptors keyed by
/// `(package, name)`, populated at startup.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    messages: HashMap<(String, String), Arc<MessageType>>,
    services: HashMap<(String, String), Arc<ServiceType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message type, replacing any previous entry.
    pub fn register_message(&mut self, ty: MessageType) -> Arc<MessageType> {
        let ty = Arc::new(ty);
        self.messages
            .insert((ty.package.clone(), ty.name.clone()), ty.clone());
        ty
    }

    /// Register a service type, replacing any previous entry.
    pub fn register_service(&mut self, ty: ServiceType) -> Arc<ServiceType> {
        let ty = Arc::new(ty);
        self.services
            .insert((ty.package.clone(), ty.name.clone()), ty.clone());
        ty
    }

    /// Resolve a message type. Absence is a normal lookup miss.
    pub fn resolve_message(&self, package: &str, name: &str) -> Option<Arc<MessageType>> {
        self.messages
            .get(&(package.to_string(), name.to_string()))
            .cloned()
    }

    /// Resolve a service type.
    pub fn resolve_service(&self, package: &str, name: &str) -> Option<Arc<ServiceType>> {
        self.services
            .get(&(package.to_string(), name.to_string()))
            .cloned()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}
