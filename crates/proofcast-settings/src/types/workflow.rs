//! Workflow catalogue and remote verifier settings.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Default verifier DID placed in the `from` field of authorization requests.
pub const DEFAULT_SENDER_DID: &str =
    "did:polygonid:polygon:mumbai:2qDyy1kEo2AYcP3RT4XGea7BtxsY285szg6yP9SPrs";

const KYC_CONTEXT: &str = "https://raw.githubusercontent.com/iden3/claim-schema-vocab/main/schemas/json-ld/kyc-v3.json-ld";

/// Settings shared by both workflows plus the per-workflow request text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowSettings {
    /// Refuse to start a workflow unless the session has a live connection.
    pub require_live_connection: bool,
    /// Verifier DID.
    pub sender_did: String,
    /// How long an unanswered authorization request stays claimable.
    pub pending_ttl_ms: u64,
    /// How often expired requests are swept.
    pub pending_sweep_interval_ms: u64,
    /// Login workflow.
    pub login: LoginSettings,
    /// Credential verification workflow.
    pub verification: VerificationSettings,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            require_live_connection: false,
            sender_did: DEFAULT_SENDER_DID.to_string(),
            pending_ttl_ms: 600_000,
            pending_sweep_interval_ms: 60_000,
            login: LoginSettings::default(),
            verification: VerificationSettings::default(),
        }
    }
}

/// Text of the login request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoginSettings {
    /// Purpose shown by the wallet.
    pub reason: String,
    /// Message the wallet signs.
    pub message: String,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            reason: "Login to Polygon".to_string(),
            message: "Your Polygon ID".to_string(),
        }
    }
}

/// Proof request of the verification workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationSettings {
    /// Purpose shown by the wallet.
    pub reason: String,
    /// Circuit the proof is generated with.
    pub circuit_id: String,
    /// Credential query.
    pub query: Value,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            reason: "Must be born before this year".to_string(),
            circuit_id: "credentialAtomicQuerySigV2".to_string(),
            query: json!({
                "allowedIssuers": ["*"],
                "credentialSubject": {
                    "birthday": {"$lt": 20_000_101}
                },
                "context": KYC_CONTEXT,
                "type": "KYCAgeCredential",
            }),
        }
    }
}

/// Remote proof verifier endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerifierSettings {
    /// Verification endpoint.
    pub url: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Accepted age of a superseded identity state, in seconds.
    pub accepted_state_transition_delay_secs: u64,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8090/verify".to_string(),
            timeout_ms: 30_000,
            accepted_state_transition_delay_secs: 300,
        }
    }
}
