//! Authorization requests waiting for the wallet's callback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metrics::gauge;
use parking_lot::Mutex;
use proofcast_core::{AuthorizationRequest, SessionId};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::metrics::PENDING_REQUESTS;
use crate::workflow::Workflow;

/// An issued request and the workflow it belongs to.
#[derive(Clone, Debug)]
pub struct PendingRequest {
    /// Workflow that issued the request.
    pub workflow: Workflow,
    /// The request the wallet is answering.
    pub request: AuthorizationRequest,
    /// When the request was issued.
    pub created_at: Instant,
}

/// `SessionId -> PendingRequest` with a time-to-live.
///
/// The lock is only held for single map operations.
#[derive(Debug)]
pub struct PendingRequestStore {
    entries: Mutex<HashMap<SessionId, PendingRequest>>,
    ttl: Duration,
}

impl PendingRequestStore {
    /// Create an empty store.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Store `request`, replacing any earlier one for `id`.
    pub fn insert(&self, id: SessionId, workflow: Workflow, request: AuthorizationRequest) {
        let pending = PendingRequest {
            workflow,
            request,
            created_at: Instant::now(),
        };
        let len = {
            let mut entries = self.entries.lock();
            let _ = entries.insert(id, pending);
            entries.len()
        };
        gauge!(PENDING_REQUESTS).set(len as f64);
    }

    /// Unexpired request for `id` issued by `workflow`.
    pub fn get(&self, id: &SessionId, workflow: Workflow) -> Option<AuthorizationRequest> {
        let entries = self.entries.lock();
        entries
            .get(id)
            .filter(|p| p.workflow == workflow && p.created_at.elapsed() < self.ttl)
            .map(|p| p.request.clone())
    }

    /// Drop the request for `id` if it belongs to `workflow`.
    pub fn remove(&self, id: &SessionId, workflow: Workflow) -> bool {
        let (removed, len) = {
            let mut entries = self.entries.lock();
            let owned = entries.get(id).is_some_and(|p| p.workflow == workflow);
            let removed = owned && entries.remove(id).is_some();
            (removed, entries.len())
        };
        gauge!(PENDING_REQUESTS).set(len as f64);
        removed
    }

    /// Number of stored requests, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired requests; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let (removed, len) = {
            let mut entries = self.entries.lock();
            let before = entries.len();
            entries.retain(|_, p| p.created_at.elapsed() < self.ttl);
            (before - entries.len(), entries.len())
        };
        gauge!(PENDING_REQUESTS).set(len as f64);
        removed
    }
}

/// Periodically purge expired requests until `cancel` fires.
pub fn spawn_sweeper(
    store: Arc<PendingRequestStore>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.purge_expired();
                    if removed > 0 {
                        info!(removed, "expired pending requests purged");
                    }
                }
            }
        }
        debug!("pending request sweeper stopped");
    })
}
