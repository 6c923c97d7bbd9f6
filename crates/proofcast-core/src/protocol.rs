//! iden3comm authorization messages.
//!
//! Only the fields the hub reads or writes are modelled; the response body is
//! kept as raw JSON because it is forwarded to the browser untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ids::SessionId;

/// Media type of an unencrypted iden3comm message.
pub const PLAIN_MEDIA_TYPE: &str = "application/iden3comm-plain-json";
/// Protocol message type of an authorization request.
pub const AUTHORIZATION_REQUEST_TYPE: &str =
    "https://iden3-communication.io/authorization/1.0/request";
/// Protocol message type of an authorization response.
pub const AUTHORIZATION_RESPONSE_TYPE: &str =
    "https://iden3-communication.io/authorization/1.0/response";

/// One zero-knowledge proof the wallet is asked to produce.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofRequest {
    /// Request-local proof id.
    pub id: u32,
    /// Circuit the proof must be generated with.
    pub circuit_id: String,
    /// Credential query (schema context, type, constraints).
    pub query: Value,
}

/// Body of an [`AuthorizationRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequestBody {
    /// Where the wallet posts its signed response.
    pub callback_url: String,
    /// Human-readable purpose shown by the wallet.
    pub reason: String,
    /// Optional message the wallet signs along with the proof.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Requested proofs; empty for a plain login.
    #[serde(default)]
    pub scope: Vec<ProofRequest>,
}

/// Authorization request rendered as a QR code for the wallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Message id.
    pub id: String,
    /// Media type.
    pub typ: String,
    /// Protocol message type.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Thread id; responses echo it back.
    pub thid: String,
    /// Request body.
    pub body: AuthorizationRequestBody,
    /// Verifier DID.
    pub from: String,
}

/// Inputs for building an [`AuthorizationRequest`].
#[derive(Clone, Debug, PartialEq)]
pub struct RequestParams {
    /// Purpose shown to the user.
    pub reason: String,
    /// Optional message to sign.
    pub message: Option<String>,
    /// Verifier DID placed in `from`.
    pub sender: String,
    /// Callback the wallet posts to.
    pub callback_url: String,
    /// Requested proofs.
    pub scope: Vec<ProofRequest>,
}

impl AuthorizationRequest {
    /// Build a request with a fresh message and thread id.
    pub fn new(params: &RequestParams) -> Self {
        let id = Uuid::new_v4().to_string();
        Self {
            thid: id.clone(),
            id,
            typ: PLAIN_MEDIA_TYPE.to_owned(),
            message_type: AUTHORIZATION_REQUEST_TYPE.to_owned(),
            body: AuthorizationRequestBody {
                callback_url: params.callback_url.clone(),
                reason: params.reason.clone(),
                message: params.message.clone(),
                scope: params.scope.clone(),
            },
            from: params.sender.clone(),
        }
    }

    /// Use `session` as both message and thread id so the wallet's response
    /// can be correlated with the push connection.
    #[must_use]
    pub fn correlated_with(mut self, session: &SessionId) -> Self {
        self.id = session.to_string();
        self.thid = session.to_string();
        self
    }
}

/// Verified authorization response returned by the verifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    /// Message id.
    pub id: String,
    /// Media type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    /// Protocol message type.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Thread id of the request being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    /// DID of the authenticated subject.
    pub from: String,
    /// Verifier DID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Proofs and signed message.
    #[serde(default)]
    pub body: Value,
}

impl AuthorizationResponse {
    /// Identifier of the verified subject.
    pub fn subject(&self) -> &str {
        &self.from
    }
}
