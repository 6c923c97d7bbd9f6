//! # proofcast-server
//!
//! Axum HTTP + `WebSocket` push hub for identity workflows.
//!
//! - `WebSocket` gateway: each connection gets a fresh [`SessionId`](proofcast_core::SessionId)
//!   and receives `IN_PROGRESS` / `DONE` / `ERROR` events addressed to it
//! - Hub actor owning the session registry, one bounded send queue per connection
//! - Login and verification workflow endpoints backed by a [`Verifier`](proofcast_core::Verifier)
//! - Heartbeat and read/write deadlines per connection
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod pending;
pub mod server;
pub mod shutdown;
pub mod websocket;
pub mod workflow;

pub use config::{ConnectionConfig, ServerConfig};
pub use gateway::GatewayError;
pub use server::{AppState, ProofcastServer};
pub use shutdown::{ShutdownCoordinator, wait_for_signal};
pub use websocket::Hub;
pub use workflow::{Workflow, WorkflowCatalog};
