//! Push connections and the hub that routes events to them.

pub mod connection;
pub mod hub;
pub mod pump;

pub use connection::{ConnectionHandle, EnqueueOutcome};
pub use hub::Hub;
pub use pump::{Disconnect, run_connection};
