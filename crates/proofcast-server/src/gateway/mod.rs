//! Delivery gateway: the HTTP surface that opens push connections and runs
//! the login and verification workflows against them.

pub mod errors;
pub mod handlers;

pub use errors::GatewayError;
pub use handlers::SessionQuery;
