// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! # habridge - robot middleware to home automation bridge
//!
//! Exposes a robot's middleware services to a home automation platform
//! over one persistent WebSocket carrying CBOR frames, and lets the
//! robot call platform services over the same socket.
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                      connection layer                        |
//! |   BridgeServer (robot, accepts) | PlatformClient (dials)     |
//! |   one Link per connection: writer task, pending-call table   |
//! +--------------------------------------------------------------+
//! |                        proto layer                           |
//! |   Advertisement | call_service / respond_service envelopes   |
//! |   CBOR framing, one frame per WebSocket binary message       |
//! +--------------------------------------------------------------+
//! |                    schema + value codecs                     |
//! |   generate_schema / decode_schema / field metadata           |
//! |   Record <-> generic dictionary, driven by field type tags   |
//! +--------------------------------------------------------------+
//! |                        TypeRegistry                          |
//! |   message and service descriptors, registered at startup     |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TypeRegistry`] | Message and service descriptors by `(package, name)` |
//! | [`Schema`] | Transport-neutral description of a request/response shape |
//! | [`Record`] | Typed message instance, converts to and from CBOR maps |
//! | [`BridgeServer`] | Robot-side endpoint: advertises and executes services |
//! | [`PlatformClient`] | Platform-side endpoint: reconnect loop and call API |

pub mod connection;
pub mod proto;
pub mod registry;
pub mod schema;
pub mod value;

pub use connection::{
    BridgeServer, CallError, CallReply, ExecuteError, ForwardedService, PlatformClient,
    PlatformHandler, RemoteService, ServiceExecutor, RECONNECT_DELAY,
};
pub use proto::{Advertisement, ProtoError, ProvidedService, ResponseBody, Value};
pub use registry::{FieldDef, MessageType, ServiceType, TypeRegistry};
pub use schema::{generate_schema, FieldSpec, Schema, SchemaNode};
pub use value::{record_to_value, value_to_record, ConversionError, FieldValue, Record};
