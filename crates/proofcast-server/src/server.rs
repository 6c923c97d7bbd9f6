//! `ProofcastServer`: router, shared state and listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use proofcast_core::Verifier;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::{ConnectionConfig, ServerConfig};
use crate::gateway::handlers;
use crate::health::{self, HealthResponse};
use crate::metrics;
use crate::pending::{self, PendingRequestStore};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::Hub;
use crate::workflow::{Workflow, WorkflowCatalog};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session registry.
    pub hub: Hub,
    /// Issued authorization requests.
    pub pending: Arc<PendingRequestStore>,
    /// Proof verifier.
    pub verifier: Arc<dyn Verifier>,
    /// Workflow request templates.
    pub workflows: Arc<WorkflowCatalog>,
    /// Per-connection limits.
    pub connection: Arc<ConnectionConfig>,
    /// Reject workflow starts without a live connection.
    pub require_live_connection: bool,
    /// Server-wide shutdown token.
    pub shutdown: CancellationToken,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`.
    pub metrics: Option<PrometheusHandle>,
}

/// The push hub server.
pub struct ProofcastServer {
    config: ServerConfig,
    hub: Hub,
    hub_worker: Option<JoinHandle<()>>,
    pending: Arc<PendingRequestStore>,
    verifier: Arc<dyn Verifier>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl ProofcastServer {
    /// Create a server and start its hub worker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig, verifier: Arc<dyn Verifier>) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, hub_worker) = Hub::spawn(config.hub_queue_capacity, shutdown.token());
        Self {
            pending: Arc::new(PendingRequestStore::new(config.pending_ttl)),
            config,
            hub,
            hub_worker: Some(hub_worker),
            verifier,
            shutdown,
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            pending: Arc::clone(&self.pending),
            verifier: Arc::clone(&self.verifier),
            workflows: Arc::new(self.config.workflows.clone()),
            connection: Arc::new(self.config.connection.clone()),
            require_live_connection: self.config.require_live_connection,
            shutdown: self.shutdown.token(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/ws", get(handlers::connect))
            .route(Workflow::Login.start_path(), get(handlers::get_login_qr))
            .route(Workflow::Verification.start_path(), get(handlers::get_auth_qr))
            .route(Workflow::Login.callback_path(), post(handlers::login_callback))
            .route(
                Workflow::Verification.callback_path(),
                post(handlers::verification_callback),
            )
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the listener and serve until shutdown.
    ///
    /// Returns the bound address and one task per background job (HTTP
    /// server, pending-request sweeper, hub worker) for
    /// [`ShutdownCoordinator::graceful_shutdown`].
    pub async fn listen(&mut self) -> std::io::Result<(SocketAddr, Vec<JoinHandle<()>>)> {
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        let sweeper = pending::spawn_sweeper(
            Arc::clone(&self.pending),
            self.config.pending_sweep_interval,
            self.shutdown.token(),
        );

        let server = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await;
            if let Err(e) = result {
                error!(error = %e, "http server failed");
            }
        });

        info!(%addr, "proofcast listening");

        let mut tasks = vec![server, sweeper];
        tasks.extend(self.hub_worker.take());
        Ok((addr, tasks))
    }

    /// Session registry.
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Issued authorization requests.
    pub fn pending(&self) -> &Arc<PendingRequestStore> {
        &self.pending
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.hub.len().await;
    let resp = health::health_check(state.start_time, connections, state.pending.len());
    Json(resp)
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
