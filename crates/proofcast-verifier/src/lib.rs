//! # proofcast-verifier
//!
//! [`RemoteVerifier`] builds iden3 authorization requests locally and hands
//! the wallet's JWZ token to a verification service over HTTP.
//!
//! Wire protocol:
//!
//! ```text
//! POST {url}
//! {"token": "<jwz>", "request": {..AuthorizationRequest..}, "acceptedStateTransitionDelaySecs": 300}
//!
//! 2xx  -> AuthorizationResponse JSON
//! else -> rejection, body text is the reason
//! ```

#![deny(unsafe_code)]

use std::time::Duration;

use async_trait::async_trait;
use proofcast_core::{
    AuthorizationRequest, AuthorizationResponse, RequestParams, Verifier, VerifyError,
};
use proofcast_settings::VerifierSettings;
use serde::Serialize;
use tracing::{debug, instrument, warn};

/// Verifier delegating proof checks to a remote service.
#[derive(Clone, Debug)]
pub struct RemoteVerifier {
    client: reqwest::Client,
    endpoint: String,
    accepted_state_transition_delay: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyCall<'a> {
    token: &'a str,
    request: &'a AuthorizationRequest,
    accepted_state_transition_delay_secs: u64,
}

impl RemoteVerifier {
    /// Create a verifier posting to `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        accepted_state_transition_delay: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            accepted_state_transition_delay,
        })
    }

    /// Create a verifier from settings.
    pub fn from_settings(settings: &VerifierSettings) -> Result<Self, reqwest::Error> {
        Self::new(
            settings.url.clone(),
            Duration::from_millis(settings.timeout_ms),
            Duration::from_secs(settings.accepted_state_transition_delay_secs),
        )
    }

    /// Verification endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Verifier for RemoteVerifier {
    fn create_request(&self, params: &RequestParams) -> AuthorizationRequest {
        AuthorizationRequest::new(params)
    }

    #[instrument(skip_all, fields(thid = %request.thid))]
    async fn verify(
        &self,
        token: &str,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResponse, VerifyError> {
        if token.trim().is_empty() {
            return Err(VerifyError::InvalidToken("empty token".into()));
        }

        let call = VerifyCall {
            token,
            request,
            accepted_state_transition_delay_secs: self.accepted_state_transition_delay.as_secs(),
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&call)
            .send()
            .await
            .map_err(|e| VerifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %message, "verifier rejected token");
            return Err(VerifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let response: AuthorizationResponse = resp
            .json()
            .await
            .map_err(|e| VerifyError::InvalidResponse(e.to_string()))?;

        if let Some(thid) = response.thid.as_deref() {
            if thid != request.thid {
                return Err(VerifyError::InvalidResponse(format!(
                    "thread id {thid} does not match request {}",
                    request.thid
                )));
            }
        }

        debug!(subject = response.subject(), "token verified");
        Ok(response)
    }
}
