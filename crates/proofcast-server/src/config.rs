//! Server configuration.

use std::time::Duration;

use proofcast_settings::ProofcastSettings;

use crate::workflow::WorkflowCatalog;

/// Per-connection limits and timers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Outbound queue depth; a full queue marks the peer unresponsive.
    pub send_queue_capacity: usize,
    /// Keepalive ping interval.
    pub heartbeat_interval: Duration,
    /// Inbound silence after which the connection is closed.
    pub read_timeout: Duration,
    /// Deadline for writing one frame.
    pub write_timeout: Duration,
    /// Largest accepted inbound message in bytes.
    pub max_message_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: 256,
            heartbeat_interval: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
            max_message_size: 512,
        }
    }
}

/// Configuration for the proofcast server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Hub command channel capacity.
    pub hub_queue_capacity: usize,
    /// Push connection settings.
    pub connection: ConnectionConfig,
    /// Reject workflow starts for sessions without a live connection.
    pub require_live_connection: bool,
    /// Lifetime of an unanswered authorization request.
    pub pending_ttl: Duration,
    /// Sweep period for expired authorization requests.
    pub pending_sweep_interval: Duration,
    /// Workflow request templates.
    pub workflows: WorkflowCatalog,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            hub_queue_capacity: 1024,
            connection: ConnectionConfig::default(),
            require_live_connection: false,
            pending_ttl: Duration::from_secs(600),
            pending_sweep_interval: Duration::from_secs(60),
            workflows: WorkflowCatalog::default(),
        }
    }
}

impl ServerConfig {
    /// Build from validated settings.
    pub fn from_settings(settings: &ProofcastSettings) -> Self {
        let c = &settings.connection;
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            hub_queue_capacity: c.hub_queue_capacity,
            connection: ConnectionConfig {
                send_queue_capacity: c.send_queue_capacity,
                heartbeat_interval: Duration::from_millis(c.heartbeat_interval_ms),
                read_timeout: Duration::from_millis(c.read_timeout_ms),
                write_timeout: Duration::from_millis(c.write_timeout_ms),
                max_message_size: c.max_message_size,
            },
            require_live_connection: settings.workflow.require_live_connection,
            pending_ttl: Duration::from_millis(settings.workflow.pending_ttl_ms),
            pending_sweep_interval: Duration::from_millis(
                settings.workflow.pending_sweep_interval_ms,
            ),
            workflows: WorkflowCatalog::from_settings(settings),
        }
    }
}
