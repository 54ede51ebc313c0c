// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Platform-side endpoint: dials the robot and keeps dialing.
//!
//! The client owns the reconnect loop. Connect failures and dropped
//! connections both land in the same place: wait out the backoff and
//! dial again, forever. A connection only becomes active after a valid
//! advertisement arrives; each advertised service is decoded into
//! validators and field metadata before the handler ever sees it.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::proto::{self, Advertisement, BridgeBound, PlatformBound, ResponseBody, Value};
use crate::schema::decode::{decode_schema, MessageValidator};
use crate::schema::metadata::{collect_field_metadata, FieldMetadata};

use super::pending::{CallReply, PendingCalls};
use super::{spawn_writer, CallError, ExecuteError, Link, OUTBOUND_QUEUE, RECONNECT_DELAY};

/// One robot service as seen from the platform: decoded validators
/// plus everything needed to register a UI action for it.
#[derive(Debug)]
pub struct RemoteService {
    pub name: String,
    pub description: Option<String>,
    pub example: Option<String>,
    /// Validator for outbound requests.
    pub request: MessageValidator,
    /// Validator for the robot's responses.
    pub response: MessageValidator,
    /// Per-request-field display metadata.
    pub fields: Vec<FieldMetadata>,
}

/// Platform-side collaborator.
pub trait PlatformHandler: Send + Sync + 'static {
    /// A connection became active with these services advertised.
    fn services_advertised(&self, services: &[Arc<RemoteService>]);

    /// Execute a robot-originated call against a platform service.
    /// The returned map becomes the response body; `Value::Null` means
    /// no payload.
    fn call(
        &self,
        domain: &str,
        name: &str,
        request: Value,
    ) -> BoxFuture<'static, Result<Value, ExecuteError>>;
}

struct Active {
    link: Arc<Link>,
    services: Arc<Vec<Arc<RemoteService>>>,
}

/// The platform-side bridge endpoint.
pub struct PlatformClient {
    url: String,
    handler: Arc<dyn PlatformHandler>,
    reconnect_delay: Duration,
    active: Mutex<Option<Active>>,
}

impl PlatformClient {
    pub fn new(url: impl Into<String>, handler: Arc<dyn PlatformHandler>) -> Self {
        Self {
            url: url.into(),
            handler,
            reconnect_delay: RECONNECT_DELAY,
            active: Mutex::new(None),
        }
    }

    /// Override the fixed backoff between connection attempts.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Names of the currently advertised services.
    pub fn service_names(&self) -> Vec<String> {
        self.active
            .lock()
            .as_ref()
            .map(|a| a.services.iter().map(|s| s.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Connect loop. Runs for the life of the process; neither connect
    /// failures nor dropped connections terminate it.
    pub async fn run(self: Arc<Self>) {
        loop {
            match tokio_tungstenite::connect_async(&self.url).await {
                Ok((ws, _)) => {
                    if let Err(e) = self.session(ws).await {
                        warn!(url = %self.url, "session ended: {e}");
                    }
                }
                Err(e) => {
                    debug!(url = %self.url, "connect failed: {e}");
                }
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    async fn session(
        &self,
        ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (sink, mut ws_rx) = ws.split();

        // The handshake: first binary frame must be a valid
        // advertisement, anything else aborts the connection.
        let advertisement = loop {
            match ws_rx.next().await {
                Some(Ok(Message::Binary(bytes))) => {
                    let adv: Advertisement = proto::decode_frame(&bytes)?;
                    adv.validate()?;
                    break adv;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(other)) => {
                    return Err(format!("expected advertisement, got {other:?}").into());
                }
                Some(Err(e)) => return Err(e.into()),
                None => return Err("connection closed before advertisement".into()),
            }
        };

        let services = Arc::new(decode_services(&advertisement));
        info!(
            url = %self.url,
            services = services.len(),
            "robot connected and advertised"
        );

        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let pending = Arc::new(PendingCalls::new());
        let link = Arc::new(Link::new(tx, pending.clone()));
        let writer = spawn_writer(sink, rx);
        *self.active.lock() = Some(Active {
            link: link.clone(),
            services: services.clone(),
        });
        self.handler.services_advertised(&services);

        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Binary(bytes)) => self.handle_frame(&link, &bytes),
                Ok(Message::Close(_)) => {
                    info!(url = %self.url, "robot closed connection");
                    break;
                }
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                Ok(Message::Text(_)) => {
                    warn!("dropping text frame, protocol is binary");
                }
                Err(e) => {
                    error!("websocket error: {e}");
                    break;
                }
            }
        }

        self.active.lock().take();
        pending.close();
        writer.abort();
        info!(url = %self.url, "robot disconnected");
        Ok(())
    }

    fn handle_frame(&self, link: &Arc<Link>, bytes: &[u8]) {
        let envelope: PlatformBound = match proto::decode_frame(bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("dropping undecodable frame: {e}");
                return;
            }
        };
        if let Err(e) = envelope.validate() {
            warn!("dropping invalid frame: {e}");
            return;
        }

        match envelope {
            PlatformBound::CallService {
                instance_id,
                domain,
                name,
                responds,
                request,
            } => {
                debug!(%domain, %name, instance_id, responds, "robot call");
                let fut = self.handler.call(&domain, &name, request);
                let link = link.clone();
                tokio::spawn(async move {
                    let body = match fut.await {
                        Ok(Value::Null) => ResponseBody::Absent,
                        Ok(fields) => ResponseBody::Fields(fields),
                        Err(e) => {
                            warn!(%domain, %name, instance_id, "handler failed: {e}");
                            ResponseBody::Error(e.to_string())
                        }
                    };
                    if !responds {
                        return;
                    }
                    let frame = BridgeBound::RespondService {
                        instance_id,
                        response: body,
                    };
                    if let Err(e) = link.send(&frame).await {
                        debug!(instance_id, "could not send response: {e}");
                    }
                });
            }
            PlatformBound::RespondService {
                instance_id,
                response,
            } => {
                let reply = match response {
                    ResponseBody::Fields(fields) => CallReply::Fields(fields),
                    ResponseBody::Error(msg) => CallReply::ServiceError(msg),
                    ResponseBody::Absent => CallReply::Fields(Value::Null),
                };
                if !link.pending().resolve(instance_id, reply) {
                    warn!(instance_id, "response for unknown call, ignoring");
                }
            }
        }
    }

    /// Call an advertised robot service.
    ///
    /// The request is validated against the advertised schema before a
    /// frame is sent, so a malformed call never reaches the wire.
    pub async fn call_service(
        &self,
        name: &str,
        request: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, CallError> {
        let (link, service) = {
            let guard = self.active.lock();
            let Some(active) = guard.as_ref() else {
                return Err(CallError::NotConnected);
            };
            let Some(service) = active.services.iter().find(|s| s.name == name) else {
                return Err(CallError::UnknownService(name.to_string()));
            };
            (active.link.clone(), service.clone())
        };

        service
            .request
            .validate(&request)
            .map_err(CallError::InvalidRequest)?;

        link.call(
            |instance_id| BridgeBound::CallService {
                instance_id,
                service_name: name.to_string(),
                request: request.clone(),
            },
            timeout,
        )
        .await
    }
}

/// Decode every advertised service into validators and metadata. A
/// service with a malformed schema is logged and skipped; the rest of
/// the advertisement stays usable.
fn decode_services(advertisement: &Advertisement) -> Vec<Arc<RemoteService>> {
    let mut services = Vec::with_capacity(advertisement.provided_services.len());
    for (name, provided) in &advertisement.provided_services {
        let request = match decode_schema(&provided.request) {
            Ok(validator) => validator,
            Err(e) => {
                warn!(service = %name, "skipping service, bad request schema: {e}");
                continue;
            }
        };
        let response = match decode_schema(&provided.response) {
            Ok(validator) => validator,
            Err(e) => {
                warn!(service = %name, "skipping service, bad response schema: {e}");
                continue;
            }
        };
        let fields = match collect_field_metadata(&provided.request) {
            Ok(fields) => fields,
            Err(e) => {
                warn!(service = %name, "skipping service, bad field metadata: {e}");
                continue;
            }
        };

        services.push(Arc::new(RemoteService {
            name: name.clone(),
            description: provided.description.clone(),
            example: provided.example.clone(),
            request,
            response,
            fields,
        }));
    }
    services
}
