// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 habridge contributors

//! habridge-node - robot-side bridge daemon.
//!
//! Loads the type and service manifests, advertises the forwarded
//! services and waits for the platform to connect.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port with the given manifests
//! habridge-node --types types.yaml --services services.yaml
//!
//! # Custom bind address and port
//! habridge-node --bind 0.0.0.0 --port 8080 --types t.yaml --services s.yaml
//! ```
//!
//! The built-in executor echoes each request back through the response
//! type, which is enough to exercise a platform integration end to end
//! without a live middleware.

mod config;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use futures_util::future::BoxFuture;
use tracing::{info, warn};

use habridge::{BridgeServer, ExecuteError, Record, ServiceExecutor, ServiceType};

/// Robot-side bridge daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "habridge-node")]
#[command(about = "Bridge robot middleware services to a home automation platform")]
#[command(version)]
struct Args {
    /// Bind address
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    /// WebSocket server port
    #[arg(short, long, default_value = "8765")]
    port: u16,

    /// Types manifest (messages and service types)
    #[arg(long)]
    types: PathBuf,

    /// Services manifest (which services to forward)
    #[arg(long)]
    services: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Diagnostics executor: copies request fields into the response type
/// where the names overlap.
struct EchoExecutor {
    services: BTreeMap<String, Arc<ServiceType>>,
}

impl ServiceExecutor for EchoExecutor {
    fn call(
        &self,
        service: &str,
        request: Record,
    ) -> BoxFuture<'static, Result<Record, ExecuteError>> {
        let service_type = self.services.get(service).cloned();
        let name = service.to_string();
        Box::pin(async move {
            let Some(service_type) = service_type else {
                return Err(ExecuteError::Unavailable(format!(
                    "no executor mapping for `{name}`"
                )));
            };

            let mut response = Record::new(service_type.response.clone());
            for field in &service_type.response.fields {
                if let Some(value) = request.get(&field.name) {
                    response.set(field.name.clone(), value.clone());
                }
            }
            Ok(response)
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = args.log_level.parse().unwrap_or(tracing::Level::INFO);
    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .init();

    info!("habridge-node v{}", env!("CARGO_PKG_VERSION"));

    let types = config::TypesManifest::from_file(&args.types)?;
    let registry = Arc::new(config::build_registry(&types));
    info!(
        messages = registry.message_count(),
        services = registry.service_count(),
        "type registry loaded"
    );

    let manifest = config::ServicesManifest::from_file(&args.services)?;
    let forwarded = config::forwarded_services(&manifest, &registry);
    if forwarded.is_empty() {
        warn!("no forwardable services configured, advertising an empty service set");
    }
    for entry in &manifest.forward {
        if let Some(path) = &entry.server_path {
            info!(service = %entry.service, server_path = %path, "forwarding");
        }
    }

    let executor = Arc::new(EchoExecutor {
        services: config::service_index(&forwarded),
    });
    let server = Arc::new(BridgeServer::new(registry, executor, forwarded));

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("bridge endpoint: ws://{addr}");

    tokio::select! {
        result = server.run(listener) => result?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }

    Ok(())
}
