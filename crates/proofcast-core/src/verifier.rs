//! The proof-verification collaborator.

use async_trait::async_trait;

use crate::protocol::{AuthorizationRequest, AuthorizationResponse, RequestParams};

/// Why a verification attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// The verifier examined the token and refused it.
    #[error("verifier rejected proof ({status}): {message}")]
    Rejected {
        /// Status reported by the verifier.
        status: u16,
        /// Verifier's explanation.
        message: String,
    },
    /// The verifier could not be reached.
    #[error("verifier unreachable: {0}")]
    Transport(String),
    /// The verifier answered with something that is not a valid response.
    #[error("invalid verifier response: {0}")]
    InvalidResponse(String),
    /// The token was refused before contacting the verifier.
    #[error("invalid token: {0}")]
    InvalidToken(String),
}

impl VerifyError {
    /// Short classification string for logging/metrics.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Rejected { .. } => "rejected",
            Self::Transport(_) => "transport",
            Self::InvalidResponse(_) => "invalid_response",
            Self::InvalidToken(_) => "invalid_token",
        }
    }
}

/// Builds authorization requests and verifies the wallet's signed answers.
///
/// Latency of [`Verifier::verify`] is unbounded from the caller's point of
/// view; callers must not hold locks across it.
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Construct the request the wallet will answer.
    fn create_request(&self, params: &RequestParams) -> AuthorizationRequest;

    /// Check `token` against the request it answers.
    async fn verify(
        &self,
        token: &str,
        request: &AuthorizationRequest,
    ) -> Result<AuthorizationResponse, VerifyError>;
}
