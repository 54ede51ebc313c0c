// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! YAML manifests for the bridge node.
//!
//! Two files drive the daemon: a types manifest declaring the
//! middleware message and service types, and a services manifest
//! naming which of those services to forward to the platform. A
//! manifest that fails to parse is fatal; an individual forward entry
//! that references an unknown service is logged and skipped.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use habridge::{FieldDef, FieldSpec, ForwardedService, MessageType, ServiceType, TypeRegistry};

/// One field declaration in a manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    /// Middleware type tag (`boolean`, `sequence<uint16>`,
    /// `geometry_msgs/Point`, ...).
    #[serde(rename = "type")]
    pub type_tag: String,
}

/// A message type declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageEntry {
    pub package: String,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
}

/// A service type declaration: request and response field lists.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceEntry {
    pub package: String,
    pub name: String,
    #[serde(default)]
    pub request: Vec<FieldEntry>,
    #[serde(default)]
    pub response: Vec<FieldEntry>,
}

/// The types manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TypesManifest {
    #[serde(default)]
    pub messages: Vec<MessageEntry>,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
}

/// Documentation attached to one request field of a forwarded service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldDocEntry {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
}

/// One service to forward to the platform.
#[derive(Debug, Clone, Deserialize)]
pub struct ForwardEntry {
    /// Package of the service type.
    pub package: String,
    /// Name of the service type.
    pub service: String,
    /// Name to advertise under. Defaults to the service type name.
    #[serde(default)]
    pub name: Option<String>,
    /// Middleware endpoint path the executor should call.
    #[serde(default)]
    pub server_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    /// Executor deadline in seconds. Absent means wait indefinitely.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Per-request-field documentation.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDocEntry>,
}

/// The services manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicesManifest {
    #[serde(default)]
    pub forward: Vec<ForwardEntry>,
}

/// Configuration parsing errors.
#[derive(Debug)]
pub enum ConfigError {
    /// YAML parsing failed.
    Yaml(serde_yaml::Error),
    /// File I/O failed.
    Io(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Yaml(e) => write!(f, "YAML parse error: {e}"),
            ConfigError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Io(e) => Some(e),
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl TypesManifest {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

impl ServicesManifest {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }
}

fn field_defs(entries: &[FieldEntry]) -> Vec<FieldDef> {
    entries
        .iter()
        .map(|f| FieldDef::new(&f.name, &f.type_tag))
        .collect()
}

/// Populate a registry from a types manifest. Service request and
/// response messages are registered as `Name_Request`/`Name_Response`
/// so they can also be referenced by qualified path.
pub fn build_registry(manifest: &TypesManifest) -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    for message in &manifest.messages {
        registry.register_message(MessageType::new(
            &message.package,
            &message.name,
            field_defs(&message.fields),
        ));
    }
    for service in &manifest.services {
        let request = registry.register_message(MessageType::new(
            &service.package,
            format!("{}_Request", service.name),
            field_defs(&service.request),
        ));
        let response = registry.register_message(MessageType::new(
            &service.package,
            format!("{}_Response", service.name),
            field_defs(&service.response),
        ));
        registry.register_service(ServiceType::new(
            &service.package,
            &service.name,
            request,
            response,
        ));
    }
    registry
}

/// Resolve the forward list against the registry. Entries naming an
/// unknown service are skipped with a warning, never fatal.
pub fn forwarded_services(
    manifest: &ServicesManifest,
    registry: &TypeRegistry,
) -> Vec<ForwardedService> {
    let mut services = Vec::with_capacity(manifest.forward.len());
    for entry in &manifest.forward {
        let Some(service) = registry.resolve_service(&entry.package, &entry.service) else {
            warn!(
                package = %entry.package,
                service = %entry.service,
                "skipping forward entry, service type not declared"
            );
            continue;
        };

        let field_docs = entry
            .fields
            .iter()
            .map(|(name, doc)| {
                (
                    name.clone(),
                    FieldSpec {
                        description: doc.description.clone(),
                        example: doc.example.clone(),
                    },
                )
            })
            .collect();

        services.push(ForwardedService {
            name: entry.name.clone().unwrap_or_else(|| entry.service.clone()),
            service,
            description: entry.description.clone(),
            example: entry.example.clone(),
            field_docs,
            timeout: entry.timeout_seconds.map(Duration::from_secs),
        });
    }
    services
}

/// Advertised name to middleware service type, for the executor.
pub fn service_index(services: &[ForwardedService]) -> BTreeMap<String, Arc<ServiceType>> {
    services
        .iter()
        .map(|s| (s.name.clone(), s.service.clone()))
        .collect()
}
