//! Startup and shutdown of the gRPC and HTTP listeners.
//!
//! Startup order:
//! 1. settings validated (health: config loaded)
//! 2. OpenAPI document read; a missing document aborts startup
//! 3. both listeners bound
//! 4. route table built (health: route table built, now ready)
//! 5. both servers spawned
//!
//! Shutdown marks health `Stopping`, stops accepting connections and waits up
//! to the configured timeout for in-flight requests.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::limit::GlobalConcurrencyLimitLayer;
use tracing::{error, info, instrument};

use super::config::ServerSettings;
use super::grpc::{MessageServiceServer, mirror_health, publish_health};
use super::http::{self, HttpState};
use crate::dispatch::Dispatcher;
use crate::health::HealthReporter;
use crate::id::IdGenerator;
use crate::routing::{RouteTableBuilder, Router};
use crate::services;
use crate::types::Protocol;
use crate::version::version_string;
use crate::{NjallError, Result};

const GRPC_HEALTH_PATH: &str = "/grpc.health.v1.Health/{*method}";

/// Entry point for starting njall servers.
pub struct Server;

impl Server {
    /// Start with the built-in routes.
    pub async fn start(settings: ServerSettings) -> Result<RunningServer> {
        Self::start_with_routes(settings, services::default_routes).await
    }

    /// Start with a custom route set.
    ///
    /// `routes` receives the bound HTTP port, which the WebFinger handler
    /// advertises.
    #[instrument(skip_all, fields(grpc = %settings.grpc_address, http = %settings.http_address))]
    pub async fn start_with_routes<F>(settings: ServerSettings, routes: F) -> Result<RunningServer>
    where
        F: FnOnce(u16) -> RouteTableBuilder,
    {
        let health = HealthReporter::new();
        health.config_loaded();

        let openapi = std::fs::read(&settings.openapi_spec).map_err(|e| {
            NjallError::Startup(format!(
                "cannot read OpenAPI document {}: {e}",
                settings.openapi_spec.display()
            ))
        })?;

        let grpc_listener = bind("gRPC", settings.grpc_address).await?;
        let http_listener = bind("HTTP", settings.http_address).await?;
        let grpc_addr = grpc_listener.local_addr()?;
        let http_addr = http_listener.local_addr()?;

        let table = routes(http_addr.port()).build()?;
        health.route_table_built(&table);
        info!(
            grpc_methods = ?table.methods(Protocol::Grpc),
            http_methods = ?table.methods(Protocol::Http),
            "Routes registered"
        );

        let dispatcher = Arc::new(
            Dispatcher::new(
                Router::new(Arc::new(table)),
                health.clone(),
                Arc::new(IdGenerator::system()),
            )
            .with_default_deadline(settings.default_deadline),
        );

        let (grpc_health, grpc_health_service) = tonic_health::server::health_reporter();
        publish_health(health.state(), &grpc_health).await;
        let mirror_task = tokio::spawn(mirror_health(health.subscribe(), grpc_health));

        let grpc_app = axum::Router::new()
            .route_service(GRPC_HEALTH_PATH, grpc_health_service)
            .fallback_service(MessageServiceServer::new(dispatcher.clone()))
            .layer(GlobalConcurrencyLimitLayer::new(
                settings.max_concurrent_requests,
            ));
        let http_app = http::router(
            HttpState::new(dispatcher.clone(), openapi),
            settings.max_concurrent_requests,
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let grpc_task = spawn_server("gRPC", grpc_listener, grpc_app, shutdown_rx.clone());
        let http_task = spawn_server("HTTP", http_listener, http_app, shutdown_rx);

        info!(
            version = version_string(),
            %grpc_addr,
            %http_addr,
            "njall serving"
        );

        Ok(RunningServer {
            grpc_addr,
            http_addr,
            health,
            dispatcher,
            shutdown_tx,
            grpc_task,
            http_task,
            mirror_task,
            shutdown_timeout: settings.shutdown_timeout,
        })
    }
}

async fn bind(name: &str, addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| NjallError::Startup(format!("cannot bind {name} listener on {addr}: {e}")))
}

fn spawn_server(
    name: &'static str,
    listener: TcpListener,
    app: axum::Router,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await;
        match &result {
            Ok(()) => info!(server = name, "Server stopped"),
            Err(e) => error!(server = name, error = %e, "Server failed"),
        }
        result
    })
}

/// Handle to running servers.
#[derive(Debug)]
pub struct RunningServer {
    grpc_addr: SocketAddr,
    http_addr: SocketAddr,
    health: HealthReporter,
    dispatcher: Arc<Dispatcher>,
    shutdown_tx: watch::Sender<bool>,
    grpc_task: JoinHandle<std::io::Result<()>>,
    http_task: JoinHandle<std::io::Result<()>>,
    mirror_task: JoinHandle<()>,
    shutdown_timeout: Duration,
}

impl RunningServer {
    /// Bound gRPC address (useful when configured with port 0).
    pub fn grpc_addr(&self) -> SocketAddr {
        self.grpc_addr
    }

    /// Bound HTTP address.
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    pub fn health(&self) -> &HealthReporter {
        &self.health
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Serve until `signal` resolves, then shut down gracefully.
    ///
    /// Returns early with an error if either server stops on its own.
    pub async fn run_until<S>(mut self, signal: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        let exited = tokio::select! {
            _ = signal => None,
            result = &mut self.grpc_task => Some(("gRPC", result)),
            result = &mut self.http_task => Some(("HTTP", result)),
        };

        match exited {
            None => {
                info!("Shutdown requested");
                self.shutdown().await
            }
            Some((name, result)) => {
                self.health.stopping();
                self.mirror_task.abort();
                let _ = self.shutdown_tx.send(true);
                Err(match result {
                    Ok(Ok(())) => NjallError::Transport(format!("{name} server exited unexpectedly")),
                    Ok(Err(e)) => NjallError::Io(e),
                    Err(e) => NjallError::Transport(format!("{name} server task failed: {e}")),
                })
            }
        }
    }

    /// Stop accepting connections and wait for in-flight requests.
    #[instrument(skip(self), fields(timeout = ?self.shutdown_timeout))]
    pub async fn shutdown(self) -> Result<()> {
        let RunningServer {
            health,
            shutdown_tx,
            grpc_task,
            http_task,
            mirror_task,
            shutdown_timeout,
            ..
        } = self;
        health.stopping();
        let _ = shutdown_tx.send(true);

        let grpc_abort = grpc_task.abort_handle();
        let http_abort = http_task.abort_handle();
        let drained =
            tokio::time::timeout(shutdown_timeout, async { tokio::join!(grpc_task, http_task) })
                .await;
        mirror_task.abort();

        let (grpc, http) = match drained {
            Ok(results) => results,
            Err(_) => {
                grpc_abort.abort();
                http_abort.abort();
                error!("Shutdown timed out, aborting servers");
                return Err(NjallError::ShutdownTimeout(shutdown_timeout));
            }
        };

        for (name, result) in [("gRPC", grpc), ("HTTP", http)] {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(NjallError::Io(e)),
                Err(e) => {
                    return Err(NjallError::Transport(format!(
                        "{name} server task failed: {e}"
                    )));
                }
            }
        }
        info!("Shutdown complete");
        Ok(())
    }
}
