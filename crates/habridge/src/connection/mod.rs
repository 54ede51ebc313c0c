// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Connection protocol: one persistent WebSocket per robot/platform
//! pair.
//!
//! Both endpoints share the same plumbing: a [`Link`] owns the write
//! half through an mpsc channel (one writer task serializes all sink
//! access), a [`PendingCalls`] table correlates responses, and an
//! atomic counter hands out instance ids. [`BridgeServer`] is the
//! robot side, [`PlatformClient`] the platform side.

pub mod pending;

mod client;
mod server;

pub use client::{PlatformClient, PlatformHandler, RemoteService};
pub use pending::{CallReply, PendingCalls};
pub use server::{BridgeServer, ForwardedService};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{Sink, SinkExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::proto::{self, ProtoError, Value};
use crate::schema::decode::ValidationError;
use crate::value::Record;

/// Failure of an outbound service call.
#[derive(Debug)]
pub enum CallError {
    /// No peer is connected.
    NotConnected,
    /// The link dropped before a response arrived.
    Disconnected,
    /// No response within the caller's deadline.
    Timeout,
    /// The remote peer answered with an error string.
    Remote(String),
    /// The named service is not in the current advertisement.
    UnknownService(String),
    /// The request failed validation against the advertised schema.
    InvalidRequest(ValidationError),
    /// Frame encoding failed.
    Protocol(ProtoError),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "no peer connected"),
            Self::Disconnected => write!(f, "connection lost before response"),
            Self::Timeout => write!(f, "call timed out"),
            Self::Remote(msg) => write!(f, "remote error: {msg}"),
            Self::UnknownService(name) => write!(f, "service `{name}` is not advertised"),
            Self::InvalidRequest(e) => write!(f, "request rejected: {e}"),
            Self::Protocol(e) => write!(f, "protocol error: {e}"),
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidRequest(e) => Some(e),
            Self::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ProtoError> for CallError {
    fn from(e: ProtoError) -> Self {
        Self::Protocol(e)
    }
}

/// Failure of a local service handler.
#[derive(Debug)]
pub enum ExecuteError {
    /// The backing service is not reachable right now.
    Unavailable(String),
    /// The service ran and reported a failure.
    Failed(String),
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "service unavailable: {msg}"),
            Self::Failed(msg) => write!(f, "service call failed: {msg}"),
        }
    }
}

impl std::error::Error for ExecuteError {}

/// Robot-side hook that performs the actual middleware service call
/// for an inbound request.
pub trait ServiceExecutor: Send + Sync + 'static {
    /// Execute `service` with the decoded request record, producing the
    /// response record.
    fn call(
        &self,
        service: &str,
        request: Record,
    ) -> BoxFuture<'static, Result<Record, ExecuteError>>;
}

/// Shared per-connection state: write channel, pending table, id
/// counter. Cloned handles refer to the same connection.
pub(crate) struct Link {
    tx: mpsc::Sender<Vec<u8>>,
    pending: Arc<PendingCalls>,
    next_id: AtomicU64,
}

impl Link {
    pub(crate) fn new(tx: mpsc::Sender<Vec<u8>>, pending: Arc<PendingCalls>) -> Self {
        Self {
            tx,
            pending,
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn pending(&self) -> &Arc<PendingCalls> {
        &self.pending
    }

    /// Hand out the next instance id without registering a pending
    /// slot, for fire-and-forget frames.
    pub(crate) fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Encode and queue one frame for the writer task.
    pub(crate) async fn send<T: Serialize>(&self, message: &T) -> Result<(), CallError> {
        let bytes = proto::encode_frame(message)?;
        self.tx
            .send(bytes)
            .await
            .map_err(|_| CallError::NotConnected)
    }

    /// Issue a call and wait for its response.
    ///
    /// The pending slot is registered before the frame is queued, so a
    /// response can never arrive unmatched. `Value::Null` stands for a
    /// response with no payload.
    pub(crate) async fn call<M, F>(
        &self,
        build: F,
        timeout: Option<Duration>,
    ) -> Result<Value, CallError>
    where
        M: Serialize,
        F: FnOnce(u64) -> M,
    {
        let instance_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let Some(rx) = self.pending.register(instance_id) else {
            return Err(CallError::NotConnected);
        };

        if let Err(e) = self.send(&build(instance_id)).await {
            self.pending.forget(instance_id);
            return Err(e);
        }

        let reply = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(result) => result,
                Err(_) => {
                    self.pending.forget(instance_id);
                    return Err(CallError::Timeout);
                }
            },
            None => rx.await,
        };

        match reply {
            Ok(CallReply::Fields(fields)) => Ok(fields),
            Ok(CallReply::ServiceError(msg)) => Err(CallError::Remote(msg)),
            Ok(CallReply::Disconnected) | Err(_) => Err(CallError::Disconnected),
        }
    }
}

/// Spawn the single writer task that owns the WebSocket sink. All
/// outbound frames flow through its channel.
pub(crate) fn spawn_writer<S>(mut sink: S, mut rx: mpsc::Receiver<Vec<u8>>) -> JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: fmt::Display,
{
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Binary(frame.into())).await {
                debug!("writer task stopping: {e}");
                break;
            }
        }
        let _ = sink.close().await;
    })
}

/// How long both sides wait before retrying after a connection drops.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Depth of the outbound frame queue feeding the writer task.
pub(crate) const OUTBOUND_QUEUE: usize = 256;
