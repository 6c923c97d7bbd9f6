//! The two identity workflows and the requests they issue.

use std::fmt;

use proofcast_core::{ProofRequest, RequestParams, SessionId};
use proofcast_settings::ProofcastSettings;

/// A challenge/response workflow exposed over HTTP.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Workflow {
    /// Plain DID login.
    Login,
    /// Credential proof (age check).
    Verification,
}

impl Workflow {
    /// Both workflows.
    pub const ALL: [Self; 2] = [Self::Login, Self::Verification];

    /// Event `fn` for the start endpoint.
    pub const fn start_fn(self) -> &'static str {
        match self {
            Self::Login => "getLoginQr",
            Self::Verification => "getAuthQr",
        }
    }

    /// Event `fn` for the callback endpoint.
    pub const fn callback_fn(self) -> &'static str {
        match self {
            Self::Login => "handleLogin",
            Self::Verification => "handleVerification",
        }
    }

    /// Route of the start endpoint.
    pub const fn start_path(self) -> &'static str {
        match self {
            Self::Login => "/api/get-login-qr",
            Self::Verification => "/api/get-auth-qr",
        }
    }

    /// Route of the callback endpoint.
    pub const fn callback_path(self) -> &'static str {
        match self {
            Self::Login => "/api/login-callback",
            Self::Verification => "/api/verification-callback",
        }
    }

    /// Metric/log label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Verification => "verification",
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request text and scope for one workflow.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowTemplate {
    /// Purpose shown by the wallet.
    pub reason: String,
    /// Message the wallet signs.
    pub message: Option<String>,
    /// Requested proofs.
    pub scope: Vec<ProofRequest>,
}

/// Everything needed to build an authorization request for either workflow.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkflowCatalog {
    /// Base URL the wallet reaches this server on.
    pub public_url: String,
    /// Verifier DID.
    pub sender: String,
    /// Login template.
    pub login: WorkflowTemplate,
    /// Verification template.
    pub verification: WorkflowTemplate,
}

impl WorkflowCatalog {
    /// Build the catalogue from settings.
    pub fn from_settings(settings: &ProofcastSettings) -> Self {
        let w = &settings.workflow;
        Self {
            public_url: settings.server.public_url.clone(),
            sender: w.sender_did.clone(),
            login: WorkflowTemplate {
                reason: w.login.reason.clone(),
                message: Some(w.login.message.clone()).filter(|m| !m.is_empty()),
                scope: Vec::new(),
            },
            verification: WorkflowTemplate {
                reason: w.verification.reason.clone(),
                message: None,
                scope: vec![ProofRequest {
                    id: 1,
                    circuit_id: w.verification.circuit_id.clone(),
                    query: w.verification.query.clone(),
                }],
            },
        }
    }

    /// Template for `workflow`.
    pub fn template(&self, workflow: Workflow) -> &WorkflowTemplate {
        match workflow {
            Workflow::Login => &self.login,
            Workflow::Verification => &self.verification,
        }
    }

    /// Callback URL the wallet posts to for `session`.
    pub fn callback_url(&self, workflow: Workflow, session: &SessionId) -> String {
        format!(
            "{}{}?sessionId={}",
            self.public_url.trim_end_matches('/'),
            workflow.callback_path(),
            session
        )
    }

    /// Request parameters for a new request in `workflow`.
    pub fn request_params(&self, workflow: Workflow, session: &SessionId) -> RequestParams {
        let template = self.template(workflow);
        RequestParams {
            reason: template.reason.clone(),
            message: template.message.clone(),
            sender: self.sender.clone(),
            callback_url: self.callback_url(workflow, session),
            scope: template.scope.clone(),
        }
    }
}

impl Default for WorkflowCatalog {
    fn default() -> Self {
        Self::from_settings(&ProofcastSettings::default())
    }
}
