//! Reader and writer tasks for one push connection.
//!
//! The writer drains the outbound queue and sends keepalive pings; the reader
//! enforces the inbound deadline. Whichever finishes first cancels the shared
//! token so the other one exits too.

use std::fmt::Display;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use proofcast_core::{Envelope, SessionId};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::ConnectionConfig;

/// Why a connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disconnect {
    /// The hub dropped the outbound queue.
    QueueClosed,
    /// The peer sent a close frame or the stream ended.
    PeerClosed,
    /// Nothing was received within the read deadline.
    ReadTimeout,
    /// A frame could not be written within the write deadline.
    WriteTimeout,
    /// The transport reported a read error.
    ReadError,
    /// The transport reported a write error.
    WriteError,
    /// Server shutdown.
    Cancelled,
    /// A pump task panicked.
    TaskFailed,
}

impl Disconnect {
    /// Metric/log label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueueClosed => "queue_closed",
            Self::PeerClosed => "peer_closed",
            Self::ReadTimeout => "read_timeout",
            Self::WriteTimeout => "write_timeout",
            Self::ReadError => "read_error",
            Self::WriteError => "write_error",
            Self::Cancelled => "cancelled",
            Self::TaskFailed => "task_failed",
        }
    }
}

/// Pump `socket` until either side gives up.
///
/// `cancel` is the server shutdown token; a child of it is shared by the two
/// pumps.
pub async fn run_connection<S, E>(
    socket: S,
    id: SessionId,
    rx: mpsc::Receiver<Envelope>,
    config: &ConnectionConfig,
    cancel: &CancellationToken,
) -> Disconnect
where
    S: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <S as Sink<Message>>::Error: Display + Send + 'static,
    E: Display + Send + 'static,
{
    let token = cancel.child_token();
    let (sink, stream) = socket.split();

    let writer = tokio::spawn(write_pump(
        sink,
        rx,
        id.clone(),
        config.heartbeat_interval,
        config.write_timeout,
        token.clone(),
    ));
    let reader = tokio::spawn(read_pump(stream, id, config.read_timeout, token));

    let (written, read) = tokio::join!(writer, reader);
    let written = written.unwrap_or(Disconnect::TaskFailed);
    let read = read.unwrap_or(Disconnect::TaskFailed);

    if written == Disconnect::Cancelled {
        read
    } else {
        written
    }
}

/// Forward queued envelopes as text frames and ping every `heartbeat`.
pub async fn write_pump<W>(
    mut sink: W,
    mut rx: mpsc::Receiver<Envelope>,
    id: SessionId,
    heartbeat: Duration,
    write_timeout: Duration,
    cancel: CancellationToken,
) -> Disconnect
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let mut ping = tokio::time::interval_at(Instant::now() + heartbeat, heartbeat);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        let frame = tokio::select! {
            () = cancel.cancelled() => break Disconnect::Cancelled,
            queued = rx.recv() => match queued {
                Some(envelope) => match serde_json::to_string(&envelope) {
                    Ok(text) => Message::Text(text.into()),
                    Err(e) => {
                        warn!(session_id = %id, error = %e, "failed to encode envelope, skipping");
                        continue;
                    }
                },
                None => break Disconnect::QueueClosed,
            },
            _ = ping.tick() => {
                trace!(session_id = %id, "sending ping");
                Message::Ping(Bytes::new())
            }
        };

        if let Err(reason) = send_frame(&mut sink, frame, write_timeout).await {
            break reason;
        }
    };

    if matches!(reason, Disconnect::QueueClosed | Disconnect::Cancelled) {
        let _ = send_frame(&mut sink, Message::Close(None), write_timeout).await;
    }
    debug!(session_id = %id, reason = reason.as_str(), "writer finished");
    cancel.cancel();
    reason
}

async fn send_frame<W>(sink: &mut W, frame: Message, write_timeout: Duration) -> Result<(), Disconnect>
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    match tokio::time::timeout(write_timeout, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            debug!(error = %e, "websocket write failed");
            Err(Disconnect::WriteError)
        }
        Err(_) => Err(Disconnect::WriteTimeout),
    }
}

/// Consume inbound frames until close, error or `read_timeout` of silence.
pub async fn read_pump<R, E>(
    mut stream: R,
    id: SessionId,
    read_timeout: Duration,
    cancel: CancellationToken,
) -> Disconnect
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let reason = loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break Disconnect::Cancelled,
            next = tokio::time::timeout(read_timeout, stream.next()) => next,
        };

        match next {
            Err(_) => break Disconnect::ReadTimeout,
            Ok(None | Some(Ok(Message::Close(_)))) => break Disconnect::PeerClosed,
            Ok(Some(Err(e))) => {
                debug!(session_id = %id, error = %e, "websocket read failed");
                break Disconnect::ReadError;
            }
            Ok(Some(Ok(Message::Text(text)))) => {
                debug!(session_id = %id, len = text.len(), "ignoring client text frame");
            }
            Ok(Some(Ok(Message::Binary(data)))) => {
                debug!(session_id = %id, len = data.len(), "ignoring client binary frame");
            }
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => {
                trace!(session_id = %id, "keepalive frame");
            }
        }
    };

    debug!(session_id = %id, reason = reason.as_str(), "reader finished");
    cancel.cancel();
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc as fmpsc;
    use proofcast_core::Event;
    use serde_json::json;

    type Inbound = Result<Message, std::io::Error>;

    fn event(id: &SessionId, n: i64) -> Envelope {
        Envelope::event(id.clone(), Event::done("f", json!(n)))
    }

    fn text_of(message: &Message) -> serde_json::Value {
        match message {
            Message::Text(t) => serde_json::from_str(t.as_str()).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn writer_sends_queue_in_order_then_close() {
        let id = SessionId::new();
        let (sink_tx, mut sink_rx) = fmpsc::channel::<Message>(16);
        let (tx, rx) = mpsc::channel(8);
        tx.send(Envelope::identity(id.clone())).await.unwrap();
        tx.send(event(&id, 1)).await.unwrap();
        drop(tx);

        let reason = write_pump(
            sink_tx,
            rx,
            id.clone(),
            Duration::from_secs(10),
            Duration::from_secs(1),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(reason, Disconnect::QueueClosed);

        let first = sink_rx.next().await.unwrap();
        assert_eq!(text_of(&first)["type"], "id");
        let second = sink_rx.next().await.unwrap();
        assert_eq!(text_of(&second)["event"]["data"], 1);
        assert_eq!(sink_rx.next().await, Some(Message::Close(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn writer_pings_on_heartbeat() {
        let id = SessionId::new();
        let (sink_tx, mut sink_rx) = fmpsc::channel::<Message>(16);
        let (tx, rx) = mpsc::channel::<Envelope>(8);
        let cancel = CancellationToken::new();

        let writer = tokio::spawn(write_pump(
            sink_tx,
            rx,
            id,
            Duration::from_secs(10),
            Duration::from_secs(1),
            cancel.clone(),
        ));

        assert_eq!(sink_rx.next().await, Some(Message::Ping(Bytes::new())));
        drop(tx);
        assert_eq!(writer.await.unwrap(), Disconnect::QueueClosed);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn writer_times_out_on_stalled_peer() {
        let id = SessionId::new();
        let (sink_tx, _sink_rx) = fmpsc::channel::<Message>(0);
        let (tx, rx) = mpsc::channel(8);
        for n in 0..4 {
            tx.send(event(&id, n)).await.unwrap();
        }

        let cancel = CancellationToken::new();
        let reason = write_pump(
            sink_tx,
            rx,
            id,
            Duration::from_secs(10),
            Duration::from_secs(2),
            cancel.clone(),
        )
        .await;
        assert_eq!(reason, Disconnect::WriteTimeout);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn writer_reports_write_error() {
        let id = SessionId::new();
        let (sink_tx, sink_rx) = fmpsc::channel::<Message>(4);
        drop(sink_rx);
        let (tx, rx) = mpsc::channel(8);
        tx.send(event(&id, 1)).await.unwrap();

        let reason = write_pump(
            sink_tx,
            rx,
            id,
            Duration::from_secs(10),
            Duration::from_secs(1),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(reason, Disconnect::WriteError);
    }

    #[tokio::test]
    async fn writer_stops_on_cancel_with_close_frame() {
        let id = SessionId::new();
        let (sink_tx, mut sink_rx) = fmpsc::channel::<Message>(4);
        let (_tx, rx) = mpsc::channel::<Envelope>(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let reason = write_pump(
            sink_tx,
            rx,
            id,
            Duration::from_secs(10),
            Duration::from_secs(1),
            cancel,
        )
        .await;
        assert_eq!(reason, Disconnect::Cancelled);
        assert_eq!(sink_rx.next().await, Some(Message::Close(None)));
    }

    #[tokio::test(start_paused = true)]
    async fn reader_times_out_on_silence() {
        let (_in_tx, in_rx) = fmpsc::unbounded::<Inbound>();
        let cancel = CancellationToken::new();
        let reason = read_pump(in_rx, SessionId::new(), Duration::from_secs(60), cancel.clone()).await;
        assert_eq!(reason, Disconnect::ReadTimeout);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn any_frame_resets_read_deadline() {
        let (in_tx, in_rx) = fmpsc::unbounded::<Inbound>();
        let reader = tokio::spawn(read_pump(
            in_rx,
            SessionId::new(),
            Duration::from_secs(60),
            CancellationToken::new(),
        ));

        tokio::time::sleep(Duration::from_secs(40)).await;
        in_tx.unbounded_send(Ok(Message::Pong(Bytes::new()))).unwrap();
        tokio::time::sleep(Duration::from_secs(40)).await;
        in_tx
            .unbounded_send(Ok(Message::Text(String::from("hello").into())))
            .unwrap();
        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(!reader.is_finished());

        assert_eq!(reader.await.unwrap(), Disconnect::ReadTimeout);
    }

    #[tokio::test]
    async fn reader_stops_on_close_frame() {
        let (in_tx, in_rx) = fmpsc::unbounded::<Inbound>();
        in_tx.unbounded_send(Ok(Message::Close(None))).unwrap();
        let reason = read_pump(
            in_rx,
            SessionId::new(),
            Duration::from_secs(60),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(reason, Disconnect::PeerClosed);
    }

    #[tokio::test]
    async fn reader_stops_on_stream_end() {
        let (in_tx, in_rx) = fmpsc::unbounded::<Inbound>();
        drop(in_tx);
        let reason = read_pump(
            in_rx,
            SessionId::new(),
            Duration::from_secs(60),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(reason, Disconnect::PeerClosed);
    }

    #[tokio::test]
    async fn reader_stops_on_error() {
        let (in_tx, in_rx) = fmpsc::unbounded::<Inbound>();
        in_tx
            .unbounded_send(Err(std::io::Error::other("reset")))
            .unwrap();
        let reason = read_pump(
            in_rx,
            SessionId::new(),
            Duration::from_secs(60),
            CancellationToken::new(),
        )
        .await;
        assert_eq!(reason, Disconnect::ReadError);
    }

    #[tokio::test]
    async fn reader_observes_cancel() {
        let (_in_tx, in_rx) = fmpsc::unbounded::<Inbound>();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reason = read_pump(in_rx, SessionId::new(), Duration::from_secs(60), cancel).await;
        assert_eq!(reason, Disconnect::Cancelled);
    }
}
