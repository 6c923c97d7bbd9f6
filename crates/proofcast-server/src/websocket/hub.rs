//! Session registry and per-session delivery.
//!
//! A single worker task owns the `SessionId -> ConnectionHandle` map and
//! applies commands in the order they were sent. [`Hub`] is the cloneable
//! front door; callers only ever wait for command-channel capacity, never on
//! socket I/O.

use std::collections::HashMap;

use metrics::{counter, gauge};
use proofcast_core::{Envelope, SessionId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection::ConnectionHandle;
use crate::metrics::{HUB_EVENTS_DELIVERED_TOTAL, HUB_EVENTS_DROPPED_TOTAL, WS_CONNECTIONS_ACTIVE};

enum HubCommand {
    Register(ConnectionHandle),
    Unregister(SessionId),
    Release {
        id: SessionId,
        serial: u64,
    },
    Deliver {
        id: SessionId,
        envelope: Envelope,
    },
    Contains {
        id: SessionId,
        reply: oneshot::Sender<bool>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
    SessionIds {
        reply: oneshot::Sender<Vec<SessionId>>,
    },
}

/// Handle to the registry worker.
#[derive(Clone, Debug)]
pub struct Hub {
    tx: mpsc::Sender<HubCommand>,
}

impl std::fmt::Debug for HubCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Register(_) => "Register",
            Self::Unregister(_) => "Unregister",
            Self::Release { .. } => "Release",
            Self::Deliver { .. } => "Deliver",
            Self::Contains { .. } => "Contains",
            Self::Len { .. } => "Len",
            Self::SessionIds { .. } => "SessionIds",
        };
        f.write_str(name)
    }
}

impl Hub {
    /// Spawn the worker with a command queue of `capacity`.
    ///
    /// The worker stops when `cancel` fires or every `Hub` clone is dropped;
    /// it drops all registered handles on the way out.
    pub fn spawn(capacity: usize, cancel: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let worker = tokio::spawn(hub_worker(rx, cancel));
        (Self { tx }, worker)
    }

    async fn send(&self, command: HubCommand) {
        if let Err(e) = self.tx.send(command).await {
            warn!(command = ?e.0, "hub worker stopped, command ignored");
        }
    }

    async fn ask<T: Default>(&self, build: impl FnOnce(oneshot::Sender<T>) -> HubCommand) -> T {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(build(reply_tx)).await.is_err() {
            return T::default();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Register `handle`, replacing any connection already under its id.
    pub async fn register(&self, handle: ConnectionHandle) {
        self.send(HubCommand::Register(handle)).await;
    }

    /// Remove the connection registered under `id`, if any.
    pub async fn unregister(&self, id: SessionId) {
        self.send(HubCommand::Unregister(id)).await;
    }

    /// Remove `id` only if it is still held by the connection `serial`.
    pub async fn release(&self, id: SessionId, serial: u64) {
        self.send(HubCommand::Release { id, serial }).await;
    }

    /// Queue `envelope` for the connection registered under `id`.
    ///
    /// Best effort: unknown ids are ignored and an unresponsive connection
    /// is dropped together with the envelope.
    pub async fn deliver(&self, id: SessionId, envelope: Envelope) {
        self.send(HubCommand::Deliver { id, envelope }).await;
    }

    /// Whether `id` currently has a registered connection.
    pub async fn contains(&self, id: &SessionId) -> bool {
        let id = id.clone();
        self.ask(|reply| HubCommand::Contains { id, reply }).await
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.ask(|reply| HubCommand::Len { reply }).await
    }

    /// Whether no connection is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Ids of all registered connections.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.ask(|reply| HubCommand::SessionIds { reply }).await
    }
}

async fn hub_worker(mut rx: mpsc::Receiver<HubCommand>, cancel: CancellationToken) {
    let mut registry: HashMap<SessionId, ConnectionHandle> = HashMap::new();

    loop {
        let command = tokio::select! {
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };
        apply(&mut registry, command);
        gauge!(WS_CONNECTIONS_ACTIVE).set(registry.len() as f64);
    }

    info!(connections = registry.len(), "hub worker stopping");
    registry.clear();
    gauge!(WS_CONNECTIONS_ACTIVE).set(0.0);
}

fn apply(registry: &mut HashMap<SessionId, ConnectionHandle>, command: HubCommand) {
    match command {
        HubCommand::Register(handle) => {
            let serial = handle.serial;
            if let Some(previous) = registry.insert(handle.id.clone(), handle) {
                warn!(
                    session_id = %previous.id,
                    old_serial = previous.serial,
                    new_serial = serial,
                    "session re-registered, dropping previous connection"
                );
            }
        }
        HubCommand::Unregister(id) => {
            if registry.remove(&id).is_some() {
                debug!(session_id = %id, "connection unregistered");
            }
        }
        HubCommand::Release { id, serial } => match registry.get(&id).map(|h| h.serial) {
            Some(current) if current == serial => {
                let _ = registry.remove(&id);
                debug!(session_id = %id, serial, "connection released");
            }
            Some(current) => {
                debug!(
                    session_id = %id,
                    serial,
                    current_serial = current,
                    "stale release ignored"
                );
            }
            None => {}
        },
        HubCommand::Deliver { id, envelope } => {
            let Some(handle) = registry.get(&id) else {
                debug!(session_id = %id, "no connection for session, event discarded");
                return;
            };
            match handle.enqueue(envelope).drop_reason() {
                None => counter!(HUB_EVENTS_DELIVERED_TOTAL).increment(1),
                Some(reason) => {
                    warn!(
                        session_id = %id,
                        serial = handle.serial,
                        reason,
                        "connection unusable, dropping it with the event"
                    );
                    counter!(HUB_EVENTS_DROPPED_TOTAL, "reason" => reason).increment(1);
                    let _ = registry.remove(&id);
                }
            }
        }
        HubCommand::Contains { id, reply } => {
            let _ = reply.send(registry.contains_key(&id));
        }
        HubCommand::Len { reply } => {
            let _ = reply.send(registry.len());
        }
        HubCommand::SessionIds { reply } => {
            let _ = reply.send(registry.keys().cloned().collect());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofcast_core::Event;
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    fn event(id: &SessionId, n: i64) -> Envelope {
        Envelope::event(id.clone(), Event::in_progress("f", json!(n)))
    }

    fn spawn() -> Hub {
        Hub::spawn(64, CancellationToken::new()).0
    }

    #[tokio::test]
    async fn register_then_deliver() {
        let hub = spawn();
        let id = SessionId::new();
        let (handle, mut rx) = ConnectionHandle::new(id.clone(), 8);
        hub.register(handle).await;
        hub.deliver(id.clone(), event(&id, 1)).await;
        assert_eq!(rx.recv().await, Some(event(&id, 1)));
        assert!(hub.contains(&id).await);
        assert_eq!(hub.len().await, 1);
    }

    #[tokio::test]
    async fn deliver_to_unknown_is_noop() {
        let hub = spawn();
        hub.deliver(SessionId::new(), event(&SessionId::new(), 1)).await;
        assert!(hub.is_empty().await);
    }

    #[tokio::test]
    async fn per_session_order_preserved() {
        let hub = spawn();
        let id = SessionId::new();
        let (handle, mut rx) = ConnectionHandle::new(id.clone(), 64);
        hub.register(handle).await;
        for n in 0..20 {
            hub.deliver(id.clone(), event(&id, n)).await;
        }
        for n in 0..20 {
            assert_eq!(rx.recv().await, Some(event(&id, n)));
        }
    }

    #[tokio::test]
    async fn unregister_closes_queue() {
        let hub = spawn();
        let id = SessionId::new();
        let (handle, mut rx) = ConnectionHandle::new(id.clone(), 8);
        hub.register(handle).await;
        hub.unregister(id.clone()).await;
        assert!(!hub.contains(&id).await);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn unregister_absent_is_noop() {
        let hub = spawn();
        let id = SessionId::new();
        let (handle, _rx) = ConnectionHandle::new(id.clone(), 8);
        hub.register(handle).await;
        hub.unregister(SessionId::new()).await;
        assert_eq!(hub.len().await, 1);
    }

    #[tokio::test]
    async fn re_register_replaces_and_closes_previous() {
        let hub = spawn();
        let id = SessionId::new();
        let (first, mut first_rx) = ConnectionHandle::new(id.clone(), 8);
        let (second, mut second_rx) = ConnectionHandle::new(id.clone(), 8);
        hub.register(first).await;
        hub.register(second).await;
        assert_eq!(first_rx.recv().await, None);
        hub.deliver(id.clone(), event(&id, 7)).await;
        assert_eq!(second_rx.recv().await, Some(event(&id, 7)));
        assert_eq!(hub.len().await, 1);
    }

    #[tokio::test]
    async fn stale_release_keeps_newer_connection() {
        let hub = spawn();
        let id = SessionId::new();
        let (first, _first_rx) = ConnectionHandle::new(id.clone(), 8);
        let stale_serial = first.serial;
        let (second, _second_rx) = ConnectionHandle::new(id.clone(), 8);
        let current_serial = second.serial;
        hub.register(first).await;
        hub.register(second).await;

        hub.release(id.clone(), stale_serial).await;
        assert!(hub.contains(&id).await);

        hub.release(id.clone(), current_serial).await;
        assert!(!hub.contains(&id).await);
    }

    #[tokio::test]
    async fn saturated_queue_is_removed() {
        let hub = spawn();
        let id = SessionId::new();
        let (handle, mut rx) = ConnectionHandle::new(id.clone(), 1);
        hub.register(handle).await;

        hub.deliver(id.clone(), event(&id, 1)).await;
        hub.deliver(id.clone(), event(&id, 2)).await;
        assert!(!hub.contains(&id).await);

        assert_eq!(rx.try_recv(), Ok(event(&id, 1)));
        assert_eq!(rx.try_recv(), Err(TryRecvError::Disconnected));
    }

    #[tokio::test]
    async fn closed_queue_is_removed_on_delivery() {
        let hub = spawn();
        let id = SessionId::new();
        let (handle, rx) = ConnectionHandle::new(id.clone(), 4);
        hub.register(handle).await;
        drop(rx);
        hub.deliver(id.clone(), event(&id, 1)).await;
        assert!(!hub.contains(&id).await);
    }

    #[tokio::test]
    async fn session_ids_lists_registered() {
        let hub = spawn();
        let a = SessionId::new();
        let b = SessionId::new();
        let (ha, _ra) = ConnectionHandle::new(a.clone(), 1);
        let (hb, _rb) = ConnectionHandle::new(b.clone(), 1);
        hub.register(ha).await;
        hub.register(hb).await;
        let mut ids = hub.session_ids().await;
        ids.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        let mut expected = vec![a, b];
        expected.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn cancelled_worker_ignores_commands() {
        let cancel = CancellationToken::new();
        let (hub, worker) = Hub::spawn(8, cancel.clone());
        let id = SessionId::new();
        let (handle, mut rx) = ConnectionHandle::new(id.clone(), 8);
        hub.register(handle).await;
        assert!(hub.contains(&id).await);

        cancel.cancel();
        worker.await.unwrap();

        assert_eq!(rx.recv().await, None);
        hub.deliver(id.clone(), event(&id, 1)).await;
        assert!(!hub.contains(&id).await);
        assert_eq!(hub.len().await, 0);
        assert!(hub.session_ids().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_converge() {
        let hub = spawn();
        let mut tasks = Vec::new();
        let mut kept = Vec::new();

        for n in 0..32 {
            let hub = hub.clone();
            let id = SessionId::new();
            let keep = n % 2 == 0;
            if keep {
                kept.push(id.clone());
            }
            tasks.push(tokio::spawn(async move {
                let (handle, rx) = ConnectionHandle::new(id.clone(), 64);
                hub.register(handle).await;
                for i in 0..10 {
                    hub.deliver(id.clone(), event(&id, i)).await;
                }
                if !keep {
                    hub.unregister(id.clone()).await;
                }
                rx
            }));
        }

        let mut receivers = Vec::new();
        for task in tasks {
            receivers.push(task.await.unwrap());
        }

        let mut ids = hub.session_ids().await;
        ids.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        kept.sort_by(|x, y| x.as_str().cmp(y.as_str()));
        assert_eq!(ids, kept);
        drop(receivers);
    }

    mod model {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Register(usize),
            Unregister(usize),
            ReleaseCurrent(usize),
            ReleaseStale(usize),
            Deliver(usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (0..4usize).prop_map(Op::Register),
                (0..4usize).prop_map(Op::Unregister),
                (0..4usize).prop_map(Op::ReleaseCurrent),
                (0..4usize).prop_map(Op::ReleaseStale),
                (0..4usize).prop_map(Op::Deliver),
            ]
        }

        proptest! {
            #[test]
            fn hub_matches_map_model(ops in proptest::collection::vec(op(), 1..40)) {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                rt.block_on(async {
                    let ids: Vec<SessionId> = (0..4).map(|_| SessionId::new()).collect();
                    let hub = spawn();
                    let mut model: HashMap<usize, u64> = HashMap::new();
                    let mut receivers = Vec::new();

                    for op in ops {
                        match op {
                            Op::Register(i) => {
                                let (handle, rx) = ConnectionHandle::new(ids[i].clone(), 64);
                                let _ = model.insert(i, handle.serial);
                                receivers.push(rx);
                                hub.register(handle).await;
                            }
                            Op::Unregister(i) => {
                                let _ = model.remove(&i);
                                hub.unregister(ids[i].clone()).await;
                            }
                            Op::ReleaseCurrent(i) => {
                                if let Some(serial) = model.remove(&i) {
                                    hub.release(ids[i].clone(), serial).await;
                                }
                            }
                            Op::ReleaseStale(i) => {
                                hub.release(ids[i].clone(), 0).await;
                            }
                            Op::Deliver(i) => {
                                hub.deliver(ids[i].clone(), event(&ids[i], 0)).await;
                            }
                        }

                        for (i, id) in ids.iter().enumerate() {
                            assert_eq!(hub.contains(id).await, model.contains_key(&i));
                        }
                        assert_eq!(hub.len().await, model.len());
                    }
                });
            }
        }
    }
}
