//! Connect, workflow-start and workflow-callback handlers.

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{Json, Response};
use metrics::{counter, histogram};
use proofcast_core::{AuthorizationRequest, Envelope, Event, SessionId};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use super::errors::GatewayError;
use crate::metrics::{
    VERIFICATION_DURATION_SECONDS, VERIFICATIONS_TOTAL, WORKFLOW_REQUESTS_TOTAL,
    WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};
use crate::server::AppState;
use crate::websocket::{ConnectionHandle, run_connection};
use crate::workflow::Workflow;

/// `?sessionId=` query parameter.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    /// Raw session id as sent by the caller.
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

impl SessionQuery {
    fn parse(self) -> Result<(SessionId, String), GatewayError> {
        let raw = self.session_id.unwrap_or_default();
        let id = SessionId::parse(&raw)?;
        Ok((id, raw))
    }
}

/// GET /ws
pub async fn connect(
    State(state): State<AppState>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, GatewayError> {
    let upgrade = upgrade.map_err(|rejection| {
        debug!(%rejection, "websocket upgrade rejected");
        GatewayError::UpgradeFailed
    })?;

    Ok(upgrade
        .max_message_size(state.connection.max_message_size)
        .on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| serve_connection(state, socket)))
}

async fn serve_connection(state: AppState, socket: WebSocket) {
    let id = SessionId::new();
    let (handle, rx) = ConnectionHandle::new(id.clone(), state.connection.send_queue_capacity);
    let serial = handle.serial;

    // The identity frame must be the first thing the client reads.
    let _ = handle.enqueue(Envelope::identity(id.clone()));
    state.hub.register(handle).await;
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    info!(session_id = %id, serial, "push connection opened");

    let reason = run_connection(socket, id.clone(), rx, &state.connection, &state.shutdown).await;

    state.hub.release(id.clone(), serial).await;
    counter!(WS_DISCONNECTIONS_TOTAL, "reason" => reason.as_str()).increment(1);
    info!(session_id = %id, serial, reason = reason.as_str(), "push connection closed");
}

/// GET /api/get-login-qr
pub async fn get_login_qr(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<AuthorizationRequest>, GatewayError> {
    start_workflow(&state, Workflow::Login, query).await
}

/// GET /api/get-auth-qr
pub async fn get_auth_qr(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<AuthorizationRequest>, GatewayError> {
    start_workflow(&state, Workflow::Verification, query).await
}

/// POST /api/login-callback
pub async fn login_callback(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<String, GatewayError> {
    complete_workflow(&state, Workflow::Login, query, &body).await
}

/// POST /api/verification-callback
pub async fn verification_callback(
    State(state): State<AppState>,
    Query(query): Query<SessionQuery>,
    body: Bytes,
) -> Result<String, GatewayError> {
    complete_workflow(&state, Workflow::Verification, query, &body).await
}

async fn push(state: &AppState, id: &SessionId, event: Event) {
    state
        .hub
        .deliver(id.clone(), Envelope::event(id.clone(), event))
        .await;
}

#[instrument(skip_all, fields(workflow = %workflow))]
async fn start_workflow(
    state: &AppState,
    workflow: Workflow,
    query: SessionQuery,
) -> Result<Json<AuthorizationRequest>, GatewayError> {
    counter!(WORKFLOW_REQUESTS_TOTAL, "workflow" => workflow.as_str(), "stage" => "start")
        .increment(1);
    let (id, raw) = query.parse()?;

    if state.require_live_connection && !state.hub.contains(&id).await {
        debug!(session_id = %id, "start refused, no live connection");
        return Err(GatewayError::NotConnected);
    }

    let function = workflow.start_fn();
    push(state, &id, Event::in_progress(function, Value::String(raw))).await;

    let params = state.workflows.request_params(workflow, &id);
    let request = state.verifier.create_request(&params).correlated_with(&id);
    state.pending.insert(id.clone(), workflow, request.clone());

    let data = serde_json::to_value(&request).unwrap_or_default();
    push(state, &id, Event::done(function, data)).await;

    info!(session_id = %id, "authorization request issued");
    Ok(Json(request))
}

#[instrument(skip_all, fields(workflow = %workflow))]
async fn complete_workflow(
    state: &AppState,
    workflow: Workflow,
    query: SessionQuery,
    body: &[u8],
) -> Result<String, GatewayError> {
    counter!(WORKFLOW_REQUESTS_TOTAL, "workflow" => workflow.as_str(), "stage" => "callback")
        .increment(1);
    let (id, _) = query.parse()?;
    let token = std::str::from_utf8(body).map_err(|_| GatewayError::InvalidToken)?;
    let request = state
        .pending
        .get(&id, workflow)
        .ok_or(GatewayError::MissingPendingRequest)?;

    let function = workflow.callback_fn();
    let data = serde_json::to_value(&request).unwrap_or_default();
    push(state, &id, Event::in_progress(function, data)).await;

    let started = Instant::now();
    let verified = state.verifier.verify(token, &request).await;
    histogram!(VERIFICATION_DURATION_SECONDS, "workflow" => workflow.as_str())
        .record(started.elapsed().as_secs_f64());

    match verified {
        Ok(response) => {
            counter!(VERIFICATIONS_TOTAL, "workflow" => workflow.as_str(), "outcome" => "success")
                .increment(1);
            let _ = state.pending.remove(&id, workflow);
            let message = format!("User with ID {} Successfully authenticated", response.subject());
            info!(session_id = %id, subject = response.subject(), "verification succeeded");

            let data = serde_json::to_value(&response).unwrap_or_default();
            push(state, &id, Event::done(function, data)).await;
            Ok(message)
        }
        Err(e) => {
            counter!(VERIFICATIONS_TOTAL, "workflow" => workflow.as_str(), "outcome" => e.error_kind())
                .increment(1);
            warn!(session_id = %id, error = %e, kind = e.error_kind(), "verification failed");
            push(state, &id, Event::error(function, json!({ "error": e.to_string() }))).await;
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_missing_id_is_invalid() {
        let err = SessionQuery::default().parse().unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSessionId(_)));
    }

    #[test]
    fn query_keeps_raw_text() {
        let raw = "6F9619FF-8B86-D011-B42D-00CF4FC964FF".to_string();
        let (id, kept) = SessionQuery {
            session_id: Some(raw.clone()),
        }
        .parse()
        .unwrap();
        assert_eq!(id.as_str(), raw);
        assert_eq!(kept, raw);
    }

    #[test]
    fn query_deserializes_camel_case() {
        let q: SessionQuery =
            serde_json::from_value(json!({"sessionId": "abc"})).unwrap();
        assert_eq!(q.session_id.as_deref(), Some("abc"));
    }
}
