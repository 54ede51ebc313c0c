// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Wire protocol: CBOR frames exchanged over the bridge socket.
//!
//! Every WebSocket binary message carries exactly one CBOR map. The
//! first frame after connect is the robot's [`Advertisement`]; every
//! later frame is a tagged envelope — [`BridgeBound`] travels platform
//! to robot, [`PlatformBound`] travels robot to platform. Both sides
//! correlate calls and responses through `instance_id`.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use ciborium::value::Value;

/// Wire-level failure.
#[derive(Debug)]
pub enum ProtoError {
    /// CBOR serialization failed.
    Encode(String),
    /// Frame bytes were not a well-formed envelope.
    Decode(String),
    /// Frame decoded but violates a protocol rule.
    Invalid(String),
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(msg) => write!(f, "frame encode failed: {msg}"),
            Self::Decode(msg) => write!(f, "frame decode failed: {msg}"),
            Self::Invalid(msg) => write!(f, "invalid frame: {msg}"),
        }
    }
}

impl std::error::Error for ProtoError {}

/// Encode one protocol message into CBOR frame bytes.
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtoError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(message, &mut bytes)
        .map_err(|e| ProtoError::Encode(e.to_string()))?;
    Ok(bytes)
}

/// Decode one CBOR frame.
pub fn decode_frame<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtoError> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtoError::Decode(e.to_string()))
}

/// Envelopes travelling platform → robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeBound {
    /// Invoke one of the robot's advertised services.
    CallService {
        instance_id: u64,
        service_name: String,
        request: Value,
    },

    /// Answer to an earlier robot-originated call.
    RespondService {
        instance_id: u64,
        response: ResponseBody,
    },
}

impl BridgeBound {
    /// Protocol rules a well-formed frame must satisfy beyond shape.
    pub fn validate(&self) -> Result<(), ProtoError> {
        match self {
            Self::CallService {
                service_name,
                request,
                ..
            } => {
                if service_name.is_empty() {
                    return Err(ProtoError::Invalid("empty service name".into()));
                }
                require_map(request, "call_service request")
            }
            Self::RespondService { .. } => Ok(()),
        }
    }
}

/// Envelopes travelling robot → platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformBound {
    /// Invoke a platform service in `domain`. `responds` tells the
    /// platform whether the robot is waiting on a response frame.
    CallService {
        instance_id: u64,
        domain: String,
        name: String,
        responds: bool,
        request: Value,
    },

    /// Answer to an earlier platform-originated call.
    RespondService {
        instance_id: u64,
        response: ResponseBody,
    },
}

impl PlatformBound {
    pub fn validate(&self) -> Result<(), ProtoError> {
        match self {
            Self::CallService {
                domain,
                name,
                request,
                ..
            } => {
                if domain.is_empty() || name.is_empty() {
                    return Err(ProtoError::Invalid("empty service domain or name".into()));
                }
                require_map(request, "call_service request")
            }
            Self::RespondService { .. } => Ok(()),
        }
    }
}

/// Body of a `respond_service` envelope.
///
/// On the wire this is null (no payload), a string (error sentinel,
/// e.g. `"not_provided"`), or a map of response fields — so serde
/// derive does not fit and the codec is written out by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Call completed without a payload.
    ///
    /// Earlier protocol revisions also used a null body to mean "peer
    /// went away before responding". Here disconnection is reported
    /// locally, by the pending-call table resolving every in-flight
    /// call on teardown, so a wire null is always a successful empty
    /// response and waiting callers observe it as `Value::Null`.
    Absent,
    /// Call failed; the string names the failure.
    Error(String),
    /// Response fields as a generic dictionary.
    Fields(Value),
}

impl Serialize for ResponseBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Absent => serializer.serialize_unit(),
            Self::Error(message) => serializer.serialize_str(message),
            Self::Fields(fields) => fields.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for ResponseBody {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(Self::Absent),
            Value::Text(message) => Ok(Self::Error(message)),
            map @ Value::Map(_) => Ok(Self::Fields(map)),
            other => Err(D::Error::custom(format!(
                "response must be null, a string or a map, got {other:?}"
            ))),
        }
    }
}

/// Description of one service the robot offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidedService {
    /// Request schema, in the self-describing schema form.
    pub request: Value,
    /// Response schema.
    pub response: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

/// First frame of every connection, robot → platform.
///
/// Topic maps are carried for wire compatibility but must be empty;
/// topic streaming is not part of this protocol revision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    pub provided_services: BTreeMap<String, ProvidedService>,
    #[serde(default)]
    pub provided_topics: BTreeMap<String, Value>,
    #[serde(default)]
    pub expected_topics: BTreeMap<String, Value>,
}

impl Advertisement {
    pub fn validate(&self) -> Result<(), ProtoError> {
        if !self.provided_topics.is_empty() || !self.expected_topics.is_empty() {
            return Err(ProtoError::Invalid(
                "topic advertisement is not supported".into(),
            ));
        }
        for (name, service) in &self.provided_services {
            if name.is_empty() {
                return Err(ProtoError::Invalid("empty service name".into()));
            }
            require_map(&service.request, "service request schema")?;
            require_map(&service.response, "service response schema")?;
        }
        Ok(())
    }
}

fn require_map(value: &Value, what: &str) -> Result<(), ProtoError> {
    match value {
        Value::Map(_) => Ok(()),
        _ => Err(ProtoError::Invalid(format!("{what} must be a map"))),
    }
}
