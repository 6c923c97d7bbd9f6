//! Hub-side handle of one push connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use proofcast_core::{Envelope, SessionId};
use tokio::sync::mpsc::{self, error::TrySendError};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

/// Result of offering an envelope to a connection's outbound queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Accepted; the writer will send it.
    Queued,
    /// Queue at capacity: the peer is not draining.
    Full,
    /// The writer has gone away.
    Closed,
}

impl EnqueueOutcome {
    /// Metric label for a rejected envelope.
    pub const fn drop_reason(self) -> Option<&'static str> {
        match self {
            Self::Queued => None,
            Self::Full => Some("queue_full"),
            Self::Closed => Some("closed"),
        }
    }
}

/// Sending side of a push connection, owned by the hub.
///
/// Dropping the handle closes the outbound queue, which makes the writer
/// send a close frame and exit.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Session this connection serves.
    pub id: SessionId,
    /// Process-unique number telling apart connections that share an id.
    pub serial: u64,
    tx: mpsc::Sender<Envelope>,
    /// When this connection was established.
    pub connected_at: Instant,
}

impl ConnectionHandle {
    /// Create a handle with an outbound queue of `capacity` envelopes.
    pub fn new(id: SessionId, capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = Self {
            id,
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            tx,
            connected_at: Instant::now(),
        };
        (handle, rx)
    }

    /// Offer `envelope` without waiting.
    pub fn enqueue(&self, envelope: Envelope) -> EnqueueOutcome {
        match self.tx.try_send(envelope) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(TrySendError::Full(_)) => EnqueueOutcome::Full,
            Err(TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    /// Whether the writer has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
