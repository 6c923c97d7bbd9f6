//! Settings types.
//!
//! Every struct uses `#[serde(rename_all = "camelCase", default)]` so a
//! partial JSON file only needs the keys it overrides.

mod server;
mod workflow;

pub use server::{ConnectionSettings, LoggingSettings, ServerSettings};
pub use workflow::{
    DEFAULT_SENDER_DID, LoginSettings, VerificationSettings, VerifierSettings, WorkflowSettings,
};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProofcastSettings {
    /// HTTP listener.
    pub server: ServerSettings,
    /// Push connections.
    pub connection: ConnectionSettings,
    /// Workflows.
    pub workflow: WorkflowSettings,
    /// Remote verifier.
    pub verifier: VerifierSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

impl ProofcastSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.connection;
        let nonzero = [
            ("connection.sendQueueCapacity", c.send_queue_capacity as u64),
            ("connection.hubQueueCapacity", c.hub_queue_capacity as u64),
            ("connection.maxMessageSize", c.max_message_size as u64),
            ("connection.heartbeatIntervalMs", c.heartbeat_interval_ms),
            ("connection.readTimeoutMs", c.read_timeout_ms),
            ("connection.writeTimeoutMs", c.write_timeout_ms),
            ("workflow.pendingTtlMs", self.workflow.pending_ttl_ms),
            (
                "workflow.pendingSweepIntervalMs",
                self.workflow.pending_sweep_interval_ms,
            ),
            ("verifier.timeoutMs", self.verifier.timeout_ms),
        ];
        for (key, value) in nonzero {
            if value == 0 {
                return Err(SettingsError::InvalidValue(format!("{key} must be > 0")));
            }
        }
        if c.heartbeat_interval_ms >= c.read_timeout_ms {
            return Err(SettingsError::InvalidValue(format!(
                "connection.heartbeatIntervalMs ({}) must be below connection.readTimeoutMs ({})",
                c.heartbeat_interval_ms, c.read_timeout_ms
            )));
        }
        if self.server.public_url.is_empty() {
            return Err(SettingsError::InvalidValue(
                "server.publicUrl must not be empty".into(),
            ));
        }
        Ok(())
    }
}
