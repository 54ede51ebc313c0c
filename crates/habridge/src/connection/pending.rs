// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! In-flight call table.
//!
//! Every outbound `call_service` registers a oneshot slot under its
//! instance id before the frame is sent, so a fast responder can never
//! race the registration. Teardown resolves every remaining slot with
//! [`CallReply::Disconnected`] and latches the table closed; a closed
//! table refuses new registrations, which keeps a reconnect from
//! inheriting stale ids.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::proto::Value;

/// Outcome delivered to a waiting caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CallReply {
    /// Response fields from the remote peer.
    Fields(Value),
    /// The remote peer reported a failure string.
    ServiceError(String),
    /// The link went down before a response arrived.
    Disconnected,
}

#[derive(Default)]
struct Inner {
    closed: bool,
    calls: HashMap<u64, oneshot::Sender<CallReply>>,
}

/// Table of calls awaiting a `respond_service` frame.
#[derive(Default)]
pub struct PendingCalls {
    inner: Mutex<Inner>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call slot. Returns `None` once the table is closed.
    pub fn register(&self, instance_id: u64) -> Option<oneshot::Receiver<CallReply>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        inner.calls.insert(instance_id, tx);
        Some(rx)
    }

    /// Deliver a reply. Returns false if the id was unknown (already
    /// resolved, timed out, or never ours).
    pub fn resolve(&self, instance_id: u64, reply: CallReply) -> bool {
        let sender = self.inner.lock().calls.remove(&instance_id);
        match sender {
            // A dropped receiver just means the caller gave up waiting.
            Some(tx) => {
                let _ = tx.send(reply);
                true
            }
            None => false,
        }
    }

    /// Drop a slot without delivering anything, after a local timeout.
    pub fn forget(&self, instance_id: u64) -> bool {
        self.inner.lock().calls.remove(&instance_id).is_some()
    }

    /// Resolve every outstanding call with `Disconnected` and latch the
    /// table closed.
    pub fn close(&self) {
        let drained = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            std::mem::take(&mut inner.calls)
        };
        for (_, tx) in drained {
            let _ = tx.send(CallReply::Disconnected);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().calls.is_empty()
    }
}
