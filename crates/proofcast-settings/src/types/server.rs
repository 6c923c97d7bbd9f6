//! Network, connection and logging settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// HTTP listener settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Externally reachable base URL, used to build wallet callback URLs.
    pub public_url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
        }
    }
}

/// Push connection tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionSettings {
    /// Outbound frames buffered per connection before it counts as unresponsive.
    pub send_queue_capacity: usize,
    /// Interval between keepalive pings, in milliseconds.
    pub heartbeat_interval_ms: u64,
    /// A connection with no inbound frame for this long is torn down.
    pub read_timeout_ms: u64,
    /// Deadline for writing one frame.
    pub write_timeout_ms: u64,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Capacity of the hub's command channel.
    pub hub_queue_capacity: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            send_queue_capacity: 256,
            heartbeat_interval_ms: 10_000,
            read_timeout_ms: 60_000,
            write_timeout_ms: 10_000,
            max_message_size: 512,
            hub_queue_capacity: 1024,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Per-module level overrides, e.g. `{"proofcast_server::websocket": "debug"}`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            modules: BTreeMap::new(),
        }
    }
}
