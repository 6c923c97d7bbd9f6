//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Call once at startup before any metrics are recorded.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Push connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// Push connections closed (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Sessions currently registered with the hub (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Envelopes queued to a connection (counter).
pub const HUB_EVENTS_DELIVERED_TOTAL: &str = "hub_events_delivered_total";
/// Envelopes discarded because the connection was unusable (counter, labels: reason).
pub const HUB_EVENTS_DROPPED_TOTAL: &str = "hub_events_dropped_total";
/// Workflow HTTP calls (counter, labels: workflow, stage).
pub const WORKFLOW_REQUESTS_TOTAL: &str = "workflow_requests_total";
/// Verification outcomes (counter, labels: workflow, outcome).
pub const VERIFICATIONS_TOTAL: &str = "verifications_total";
/// Verifier latency (histogram, labels: workflow).
pub const VERIFICATION_DURATION_SECONDS: &str = "verification_duration_seconds";
/// Pending authorization requests (gauge).
pub const PENDING_REQUESTS: &str = "pending_requests";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let output = render(&handle);
        assert!(!output.contains("ws_connections_total"));
    }

    #[test]
    fn metric_constants_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            HUB_EVENTS_DELIVERED_TOTAL,
            HUB_EVENTS_DROPPED_TOTAL,
            WORKFLOW_REQUESTS_TOTAL,
            VERIFICATIONS_TOTAL,
            VERIFICATION_DURATION_SECONDS,
            PENDING_REQUESTS,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "metric name '{name}' must be snake_case"
            );
        }
    }
}
