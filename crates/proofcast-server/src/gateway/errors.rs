//! HTTP-facing errors of the delivery gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use proofcast_core::{InvalidSessionId, VerifyError};

/// Error returned by a gateway handler.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request could not be upgraded to a WebSocket.
    #[error("could not open websocket connection")]
    UpgradeFailed,
    /// `sessionId` is missing or not a UUID.
    #[error("invalid session id")]
    InvalidSessionId(#[from] InvalidSessionId),
    /// The session has no live push connection.
    #[error("session is not connected")]
    NotConnected,
    /// The callback body is not valid UTF-8.
    #[error("token must be valid UTF-8")]
    InvalidToken,
    /// No unexpired request was issued for this session and workflow.
    #[error("no pending request for session")]
    MissingPendingRequest,
    /// The verifier refused the token or failed.
    #[error("{0}")]
    Verification(#[from] VerifyError),
}

impl GatewayError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UpgradeFailed
            | Self::InvalidSessionId(_)
            | Self::NotConnected
            | Self::InvalidToken
            | Self::MissingPendingRequest => StatusCode::BAD_REQUEST,
            Self::Verification(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}
