//! # proofcast-core
//!
//! Shared vocabulary for the proofcast push hub.
//!
//! - [`SessionId`]: the opaque key that ties a push connection to HTTP workflow calls
//! - [`Event`] / [`Envelope`]: what is pushed to a connection and how it looks on the wire
//! - [`protocol`]: iden3 authorization request/response messages
//! - [`Verifier`]: the external proof-verification collaborator

#![deny(unsafe_code)]

pub mod events;
pub mod ids;
pub mod protocol;
pub mod verifier;

pub use events::{Envelope, Event, EventStatus};
pub use ids::{InvalidSessionId, SessionId};
pub use protocol::{
    AuthorizationRequest, AuthorizationRequestBody, AuthorizationResponse, ProofRequest,
    RequestParams,
};
pub use verifier::{Verifier, VerifyError};
