// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! Robot-side endpoint: accepts the platform's WebSocket connection.
//!
//! The server advertises its forwarded services once per connection,
//! executes inbound `call_service` frames against the local
//! [`ServiceExecutor`] and forwards robot-originated calls to the
//! platform. At most one peer is live at a time; later connection
//! attempts are refused until the active peer goes away.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::proto::{
    self, Advertisement, BridgeBound, PlatformBound, ProtoError, ProvidedService, ResponseBody,
    Value,
};
use crate::registry::TypeRegistry;
use crate::schema::{generate_schema, FieldSpec};
use crate::value::{record_to_value, value_to_record};

use super::pending::{CallReply, PendingCalls};
use super::{spawn_writer, CallError, Link, ServiceExecutor, OUTBOUND_QUEUE};

/// Error string sent when a call names a service the robot does not
/// forward.
pub(crate) const NOT_PROVIDED: &str = "not_provided";
/// Error string sent when the local executor misses its deadline.
pub(crate) const TIMED_OUT: &str = "Timed out";

/// Configuration for one service the robot forwards to the platform.
#[derive(Debug, Clone)]
pub struct ForwardedService {
    /// Name the service is advertised under.
    pub name: String,
    /// Middleware service type backing it.
    pub service: Arc<crate::registry::ServiceType>,
    pub description: Option<String>,
    pub example: Option<String>,
    /// Per-request-field documentation merged into the advertised
    /// schema.
    pub field_docs: Vec<(String, FieldSpec)>,
    /// Deadline for the local executor. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

/// The robot-side bridge endpoint.
pub struct BridgeServer {
    registry: Arc<TypeRegistry>,
    executor: Arc<dyn ServiceExecutor>,
    services: HashMap<String, Arc<ForwardedService>>,
    advertisement: Advertisement,
    active: Mutex<Option<Arc<Link>>>,
    busy: AtomicBool,
}

impl BridgeServer {
    /// Build the endpoint. The advertisement is generated once, here;
    /// every connection replays the same one.
    pub fn new(
        registry: Arc<TypeRegistry>,
        executor: Arc<dyn ServiceExecutor>,
        services: Vec<ForwardedService>,
    ) -> Self {
        let services: HashMap<_, _> = services
            .into_iter()
            .map(|svc| (svc.name.clone(), Arc::new(svc)))
            .collect();
        let advertisement = build_advertisement(services.values(), &registry);

        Self {
            registry,
            executor,
            services,
            advertisement,
            active: Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    /// The advertisement sent as the first frame of every connection.
    pub fn advertisement(&self) -> &Advertisement {
        &self.advertisement
    }

    /// Whether a peer session is currently live. Stays true until the
    /// session's teardown finishes and the slot can be taken again.
    pub fn is_connected(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Accept loop. Runs until the listener fails.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> std::io::Result<()> {
        info!(addr = %listener.local_addr()?, "bridge listening");
        loop {
            let (stream, addr) = listener.accept().await?;
            if self.busy.swap(true, Ordering::AcqRel) {
                warn!(%addr, "refusing connection, a peer is already active");
                drop(stream);
                continue;
            }

            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.handle_peer(stream, addr).await {
                    warn!(%addr, "peer session ended: {e}");
                }
                server.busy.store(false, Ordering::Release);
            });
        }
    }

    async fn handle_peer(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws = tokio_tungstenite::accept_async(stream).await?;
        info!(%addr, "platform connected");
        let (sink, mut ws_rx) = ws.split();

        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
        let pending = Arc::new(PendingCalls::new());
        let link = Arc::new(Link::new(tx, pending.clone()));
        *self.active.lock() = Some(link.clone());
        let writer = spawn_writer(sink, rx);

        // Advertisement goes out before anything else.
        let result = link.send(&self.advertisement).await;
        if result.is_ok() {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Binary(bytes)) => self.handle_frame(&link, &bytes),
                    Ok(Message::Close(_)) => {
                        info!(%addr, "platform closed connection");
                        break;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {}
                    Ok(Message::Text(_)) => {
                        warn!(%addr, "dropping text frame, protocol is binary");
                    }
                    Err(e) => {
                        error!(%addr, "websocket error: {e}");
                        break;
                    }
                }
            }
        }

        // Teardown: idle again, every waiting caller learns the peer
        // is gone.
        self.active.lock().take();
        pending.close();
        writer.abort();
        info!(%addr, "platform disconnected");
        result.map_err(Into::into)
    }

    /// Decode and dispatch one inbound frame. A malformed frame is
    /// logged and dropped; it never tears down the connection.
    fn handle_frame(&self, link: &Arc<Link>, bytes: &[u8]) {
        let envelope: BridgeBound = match proto::decode_frame(bytes) {
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
            BridgeBound::CallService {
                instance_id,
                service_name,
                request,
            } => self.dispatch_call(link, instance_id, &service_name, &request),
            BridgeBound::RespondService {
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

    /// Run one inbound service call to completion on its own task, so
    /// a slow executor never stalls the read loop.
    fn dispatch_call(&self, link: &Arc<Link>, instance_id: u64, service_name: &str, request: &Value) {
        let Some(svc) = self.services.get(service_name).cloned() else {
            warn!(service = service_name, "call for unadvertised service");
            respond(link.clone(), instance_id, ResponseBody::Error(NOT_PROVIDED.into()));
            return;
        };

        let record = match value_to_record(&svc.service.request, request, &self.registry) {
            Ok(record) => record,
            Err(e) => {
                warn!(service = service_name, "request conversion failed: {e}");
                respond(link.clone(), instance_id, ResponseBody::Error(e.to_string()));
                return;
            }
        };

        debug!(service = %svc.name, instance_id, "executing service call");
        let fut = self.executor.call(&svc.name, record);
        let link = link.clone();
        tokio::spawn(async move {
            let outcome = match svc.timeout {
                Some(limit) => match tokio::time::timeout(limit, fut).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!(service = %svc.name, instance_id, "executor deadline missed");
                        respond(link, instance_id, ResponseBody::Error(TIMED_OUT.into()));
                        return;
                    }
                },
                None => fut.await,
            };

            let body = match outcome {
                Ok(response) => ResponseBody::Fields(record_to_value(&response)),
                Err(e) => {
                    warn!(service = %svc.name, instance_id, "executor failed: {e}");
                    ResponseBody::Error(e.to_string())
                }
            };
            respond(link, instance_id, body);
        });
    }

    /// Call a platform service over the active connection.
    ///
    /// With `responds` false the call is fire-and-forget and resolves
    /// to `Value::Null` as soon as the frame is queued.
    pub async fn call_platform_service(
        &self,
        domain: &str,
        name: &str,
        request: Value,
        responds: bool,
        timeout: Option<Duration>,
    ) -> Result<Value, CallError> {
        if !matches!(request, Value::Map(_)) {
            return Err(CallError::Protocol(ProtoError::Invalid(
                "platform call request must be a map".into(),
            )));
        }
        let link = self.active.lock().clone().ok_or(CallError::NotConnected)?;

        if responds {
            link.call(
                |instance_id| PlatformBound::CallService {
                    instance_id,
                    domain: domain.to_string(),
                    name: name.to_string(),
                    responds: true,
                    request: request.clone(),
                },
                timeout,
            )
            .await
        } else {
            link.send(&PlatformBound::CallService {
                instance_id: link.allocate_id(),
                domain: domain.to_string(),
                name: name.to_string(),
                responds: false,
                request,
            })
            .await?;
            Ok(Value::Null)
        }
    }
}

fn respond(link: Arc<Link>, instance_id: u64, response: ResponseBody) {
    tokio::spawn(async move {
        let frame = PlatformBound::RespondService {
            instance_id,
            response,
        };
        if let Err(e) = link.send(&frame).await {
            debug!(instance_id, "could not send response: {e}");
        }
    });
}

fn build_advertisement<'a>(
    services: impl Iterator<Item = &'a Arc<ForwardedService>>,
    registry: &TypeRegistry,
) -> Advertisement {
    let mut adv = Advertisement::default();
    for svc in services {
        let mut request = generate_schema(&svc.service.request, registry);
        for (field, spec) in &svc.field_docs {
            request.annotate(field, spec.clone());
        }
        let response = generate_schema(&svc.service.response, registry);

        adv.provided_services.insert(
            svc.name.clone(),
            ProvidedService {
                request: request.to_value(),
                response: response.to_value(),
                description: svc.description.clone(),
                example: svc.example.clone(),
            },
        );
    }
    adv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{FieldDef, MessageType, ServiceType};
    use crate::value::Record;
    use futures_util::future::BoxFuture;

    use super::super::ExecuteError;

    struct EchoExecutor {
        delay: Option<Duration>,
    }

    impl ServiceExecutor for EchoExecutor {
        fn call(
            &self,
            _service: &str,
            request: Record,
        ) -> BoxFuture<'static, Result<Record, ExecuteError>> {
            let delay = self.delay;
            Box::pin(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(request)
            })
        }
    }

    fn test_server(delay: Option<Duration>, timeout: Option<Duration>) -> Arc<BridgeServer> {
        let mut registry = TypeRegistry::new();
        let req = registry.register_message(MessageType::new(
            "demo",
            "SetLed_Request",
            vec![FieldDef::new("on", "boolean")],
        ));
        let resp = registry.register_message(MessageType::new(
            "demo",
            "SetLed_Response",
            vec![FieldDef::new("on", "boolean")],
        ));
        let service = Arc::new(ServiceType::new("demo", "SetLed", req, resp));

        Arc::new(BridgeServer::new(
            Arc::new(registry),
            Arc::new(EchoExecutor { delay }),
            vec![ForwardedService {
                name: "set_led".into(),
                service,
                description: Some("Switch the status LED".into()),
                example: None,
                field_docs: vec![(
                    "on".into(),
                    FieldSpec {
                        description: Some("desired state".into()),
                        example: Some("true".into()),
                    },
                )],
                timeout,
            }],
        ))
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn test_link() -> (Arc<Link>, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(16);
        (Arc::new(Link::new(tx, Arc::new(PendingCalls::new()))), rx)
    }

    async fn next_response(rx: &mut mpsc::Receiver<Vec<u8>>) -> (u64, ResponseBody) {
        let bytes = rx.recv().await.unwrap();
        match proto::decode_frame(&bytes).unwrap() {
            PlatformBound::RespondService {
                instance_id,
                response,
            } => (instance_id, response),
            other => panic!("expected respond_service, got {other:?}"),
        }
    }

    #[test]
    fn advertisement_carries_schemas_and_docs() {
        let server = test_server(None, None);
        let adv = server.advertisement();
        adv.validate().unwrap();

        let svc = &adv.provided_services["set_led"];
        assert_eq!(svc.description.as_deref(), Some("Switch the status LED"));
        let Value::Map(fields) = &svc.request else {
            panic!("request schema must be a map");
        };
        let Value::Map(on) = &fields[0].1 else {
            panic!("field spec must be a map");
        };
        assert!(on.contains(&(text("type"), text("bool"))));
        assert!(on.contains(&(text("description"), text("desired state"))));
    }

    #[tokio::test]
    async fn inbound_call_is_executed_and_answered() {
        let server = test_server(None, None);
        let (link, mut rx) = test_link();

        let frame = proto::encode_frame(&BridgeBound::CallService {
            instance_id: 5,
            service_name: "set_led".into(),
            request: Value::Map(vec![(text("on"), Value::Bool(true))]),
        })
        .unwrap();
        server.handle_frame(&link, &frame);

        let (id, body) = next_response(&mut rx).await;
        assert_eq!(id, 5);
        assert_eq!(
            body,
            ResponseBody::Fields(Value::Map(vec![(text("on"), Value::Bool(true))]))
        );
    }

    #[tokio::test]
    async fn unknown_service_answers_not_provided() {
        let server = test_server(None, None);
        let (link, mut rx) = test_link();

        let frame = proto::encode_frame(&BridgeBound::CallService {
            instance_id: 1,
            service_name: "open_pod_bay_doors".into(),
            request: Value::Map(vec![]),
        })
        .unwrap();
        server.handle_frame(&link, &frame);

        let (id, body) = next_response(&mut rx).await;
        assert_eq!(id, 1);
        assert_eq!(body, ResponseBody::Error(NOT_PROVIDED.into()));
    }

    #[tokio::test]
    async fn slow_executor_answers_timed_out() {
        let server = test_server(
            Some(Duration::from_secs(60)),
            Some(Duration::from_millis(20)),
        );
        let (link, mut rx) = test_link();

        let frame = proto::encode_frame(&BridgeBound::CallService {
            instance_id: 2,
            service_name: "set_led".into(),
            request: Value::Map(vec![(text("on"), Value::Bool(false))]),
        })
        .unwrap();
        server.handle_frame(&link, &frame);

        let (id, body) = next_response(&mut rx).await;
        assert_eq!(id, 2);
        assert_eq!(body, ResponseBody::Error(TIMED_OUT.into()));
    }

    #[tokio::test]
    async fn malformed_request_answers_with_conversion_error() {
        let server = test_server(None, None);
        let (link, mut rx) = test_link();

        let frame = proto::encode_frame(&BridgeBound::CallService {
            instance_id: 3,
            service_name: "set_led".into(),
            request: Value::Map(vec![(text("on"), text("yes"))]),
        })
        .unwrap();
        server.handle_frame(&link, &frame);

        let (id, body) = next_response(&mut rx).await;
        assert_eq!(id, 3);
        assert!(matches!(body, ResponseBody::Error(_)));
        assert_ne!(body, ResponseBody::Error(NOT_PROVIDED.into()));
    }

    #[tokio::test]
    async fn absent_response_resolves_call_as_empty_success() {
        let server = test_server(None, None);
        let (link, _rx) = test_link();
        let waiter = link.pending().register(7).unwrap();

        let frame = proto::encode_frame(&BridgeBound::RespondService {
            instance_id: 7,
            response: ResponseBody::Absent,
        })
        .unwrap();
        server.handle_frame(&link, &frame);

        assert_eq!(waiter.await.unwrap(), CallReply::Fields(Value::Null));
    }

    #[tokio::test]
    async fn platform_call_requires_connection() {
        let server = test_server(None, None);
        let result = server
            .call_platform_service("light", "turn_on", Value::Map(vec![]), true, None)
            .await;
        assert!(matches!(result, Err(CallError::NotConnected)));
    }
}
