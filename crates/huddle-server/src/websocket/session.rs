//! Session lifecycle: one connected client from accept through departure.
//!
//! ```text
//! Connecting ──add ok──▶ Active ──close/error/evict/shutdown──▶ Closing ──▶ Closed
//!     │
//!     └──duplicate username──▶ Closed (close frame 1008, no announcements)
//! ```
//!
//! While Active, text frames are persisted and then broadcast as
//! `[<username>]: <content>`; binary frames are broadcast as-is. On the way
//! out the session is deregistered before the departure announcement goes
//! to the remaining peers.

use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{CloseFrame, Message, close_code};
use bytes::Bytes;
use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use huddle_core::messages::{format_chat_line, join_announcement, leave_announcement};
use huddle_core::{HubError, Username};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use super::broadcast::BroadcastReport;
use super::connection::{ClientSession, Outbound};
use crate::hub::Hub;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL, WS_FRAMES_RECEIVED_TOTAL, record_error,
};

/// How long a final close frame may take to send.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Close reason sent when the username is taken.
pub const DUPLICATE_USERNAME_REASON: &str = "username already connected";

/// Lifecycle phase of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accepted by the transport, not yet registered.
    Connecting,
    /// Registered; frames are being relayed.
    Active,
    /// Deregistering and announcing departure.
    Closing,
    /// Finished.
    Closed,
}

/// Why a session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The username was already live; the session never became active.
    Rejected,
    /// The client sent a close frame.
    ClientClosed,
    /// The inbound stream ended without a close frame.
    Disconnected,
    /// Reading from the transport failed.
    TransportError,
    /// The hub closed the session (eviction or failed write).
    ClosedByHub,
    /// The server is shutting down.
    Shutdown,
}

impl SessionOutcome {
    /// Short label for logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::ClientClosed => "client_closed",
            Self::Disconnected => "disconnected",
            Self::TransportError => "transport_error",
            Self::ClosedByHub => "closed_by_hub",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Drive one session until it closes.
///
/// `inbound` and `outbound` are the two halves of the client's transport.
/// Production passes a split axum `WebSocket`; any `Stream`/`Sink` pair
/// carrying [`Message`]s works.
#[instrument(skip_all, fields(username = %username, conn_id = tracing::field::Empty))]
pub async fn run_session<S, W, E>(
    mut inbound: S,
    mut outbound: W,
    username: Username,
    hub: Arc<Hub>,
) -> SessionOutcome
where
    S: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
    W: Sink<Message> + Unpin + Send + 'static,
    W::Error: Display,
{
    let (session, queue) = ClientSession::with_queue(username, hub.outbound_queue_capacity);
    let username = session.username().clone();
    let _ = tracing::Span::current().record("conn_id", session.id().as_str());
    debug!(phase = ?SessionPhase::Connecting);

    // ── Connecting ──────────────────────────────────────────────────
    if let Err(err) = hub.registry.add(Arc::clone(&session)) {
        record_error(&err);
        send_close(&mut outbound, close_code::POLICY, DUPLICATE_USERNAME_REASON).await;
        debug!(phase = ?SessionPhase::Closed, outcome = SessionOutcome::Rejected.as_str());
        return SessionOutcome::Rejected;
    }

    // ── Active ──────────────────────────────────────────────────────
    let started = Instant::now();
    info!(phase = ?SessionPhase::Active, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let writer = tokio::spawn(write_loop(outbound, queue, Arc::clone(&session)));
    report(hub.broadcast.broadcast_text(&join_announcement(&username), &username));

    let outcome = read_loop(&mut inbound, &session, &hub).await;

    // ── Closing ─────────────────────────────────────────────────────
    debug!(phase = ?SessionPhase::Closing, outcome = outcome.as_str());
    let _ = hub.registry.remove_session(&session);
    session.close();
    report(hub.broadcast.broadcast_text(&leave_announcement(&username), &username));
    if let Err(e) = writer.await {
        debug!(error = %e, "writer task ended abnormally");
    }

    // ── Closed ──────────────────────────────────────────────────────
    info!(
        phase = ?SessionPhase::Closed,
        outcome = outcome.as_str(),
        drops = session.drop_count(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL, "outcome" => outcome.as_str()).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
    outcome
}

async fn read_loop<S, E>(inbound: &mut S, session: &ClientSession, hub: &Hub) -> SessionOutcome
where
    S: Stream<Item = Result<Message, E>> + Unpin + Send,
    E: Display + Send,
{
    let closed = session.close_token();
    loop {
        let next = tokio::select! {
            biased;
            () = closed.cancelled() => return SessionOutcome::ClosedByHub,
            () = hub.shutdown.cancelled() => return SessionOutcome::Shutdown,
            next = inbound.next() => next,
        };

        match next {
            None => return SessionOutcome::Disconnected,
            Some(Err(e)) => {
                record_error(&HubError::Transport(e.to_string()));
                return SessionOutcome::TransportError;
            }
            Some(Ok(Message::Text(text))) => {
                counter!(WS_FRAMES_RECEIVED_TOTAL, "kind" => "text").increment(1);
                handle_text(session, hub, text.as_str()).await;
            }
            Some(Ok(Message::Binary(data))) => {
                counter!(WS_FRAMES_RECEIVED_TOTAL, "kind" => "binary").increment(1);
                handle_binary(session, hub, data);
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(code = frame.as_ref().map(|f| f.code), "client sent close frame");
                return SessionOutcome::ClientClosed;
            }
            // the transport answers pings itself
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
        }
    }
}

/// Persist, then broadcast. A failed write is reported and the message is
/// still delivered.
async fn handle_text(session: &ClientSession, hub: &Hub, content: &str) {
    let username = session.username().as_str();
    let received_at = Utc::now();
    if let Err(e) = hub.store.append(username, content, received_at).await {
        record_error(&e.into());
    }
    let line = format_chat_line(username, content);
    report(hub.broadcast.broadcast_text(&line, username));
}

fn handle_binary(session: &ClientSession, hub: &Hub, data: Bytes) {
    debug!(len = data.len(), "relaying binary frame");
    report(hub.broadcast.broadcast_binary(data, session.username().as_str()));
}

fn report(outcome: BroadcastReport) {
    if let Err(e) = outcome.into_result() {
        record_error(&e);
    }
}

/// Drain the session queue onto the transport until the session closes or
/// a write fails. A failed write closes the session.
async fn write_loop<W>(mut sink: W, mut queue: mpsc::Receiver<Outbound>, session: Arc<ClientSession>)
where
    W: Sink<Message> + Unpin + Send,
    W::Error: Display,
{
    let closed = session.close_token().clone();
    loop {
        let frame = tokio::select! {
            biased;
            () = closed.cancelled() => break,
            frame = queue.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };
        let message = match frame {
            Outbound::Text(text) => Message::Text(text),
            Outbound::Binary(data) => Message::Binary(data),
        };
        let sent = tokio::select! {
            biased;
            () = closed.cancelled() => break,
            sent = sink.send(message) => sent,
        };
        if let Err(e) = sent {
            record_error(&HubError::Transport(e.to_string()));
            break;
        }
    }
    session.close();
    send_close(&mut sink, close_code::NORMAL, "").await;
}

/// Best-effort close frame, bounded by [`CLOSE_TIMEOUT`].
async fn send_close<W>(sink: &mut W, code: u16, reason: &'static str)
where
    W: Sink<Message> + Unpin,
{
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(Some(frame)))).await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::DateTime;
    use futures::channel::mpsc as fmpsc;
    use huddle_core::{MessageId, StoredMessage};
    use huddle_store::{MessageStore, SqliteMessageStore, StoreError};
    use mockall::mock;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::config::ServerConfig;

    const TIMEOUT: Duration = Duration::from_secs(5);

    mock! {
        Store {}
        #[async_trait]
        impl MessageStore for Store {
            async fn append(
                &self,
                username: &str,
                content: &str,
                timestamp: DateTime<Utc>,
            ) -> huddle_store::Result<MessageId>;
            async fn list_recent(&self, limit: usize) -> huddle_store::Result<Vec<StoredMessage>>;
        }
    }

    type Inbound = fmpsc::UnboundedSender<Result<Message, std::io::Error>>;
    type Outbox = fmpsc::UnboundedReceiver<Message>;

    fn sqlite_hub() -> (Arc<Hub>, Arc<SqliteMessageStore>) {
        let store = Arc::new(SqliteMessageStore::in_memory().unwrap());
        let hub = Hub::new(
            Arc::clone(&store) as Arc<dyn MessageStore>,
            &ServerConfig::default(),
            CancellationToken::new(),
        );
        (Arc::new(hub), store)
    }

    /// A registered peer whose queue the test reads directly.
    fn peer(hub: &Hub, name: &str) -> (Arc<ClientSession>, mpsc::Receiver<Outbound>) {
        let (s, rx) = ClientSession::with_queue(Username::parse(name).unwrap(), 64);
        hub.registry.add(Arc::clone(&s)).unwrap();
        (s, rx)
    }

    fn start(hub: &Arc<Hub>, name: &str) -> (Inbound, Outbox, JoinHandle<SessionOutcome>) {
        let (in_tx, in_rx) = fmpsc::unbounded();
        let (out_tx, out_rx) = fmpsc::unbounded();
        let handle = tokio::spawn(run_session(
            in_rx,
            out_tx,
            Username::parse(name).unwrap(),
            Arc::clone(hub),
        ));
        (in_tx, out_rx, handle)
    }

    async fn next_text(rx: &mut mpsc::Receiver<Outbound>) -> String {
        match timeout(TIMEOUT, rx.recv()).await.unwrap().unwrap() {
            Outbound::Text(t) => t.as_str().to_owned(),
            Outbound::Binary(_) => panic!("expected text frame"),
        }
    }

    async fn wait_registered(hub: &Hub, name: &str) {
        timeout(TIMEOUT, async {
            while hub.registry.get(name).is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn join_chat_and_leave() {
        let (hub, store) = sqlite_hub();
        let (_alice, mut alice_rx) = peer(&hub, "alice");

        let (bob_in, _bob_out, handle) = start(&hub, "bob");
        assert_eq!(next_text(&mut alice_rx).await, join_announcement("bob"));

        let sent_at = Utc::now();
        bob_in.unbounded_send(Ok(Message::Text("hi".into()))).unwrap();
        assert_eq!(next_text(&mut alice_rx).await, "[bob]: hi");

        bob_in.unbounded_send(Ok(Message::Close(None))).unwrap();
        let outcome = timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert_eq!(outcome, SessionOutcome::ClientClosed);
        assert_eq!(next_text(&mut alice_rx).await, leave_announcement("bob"));
        assert!(hub.registry.get("bob").is_none());

        let stored = store.list_recent(10).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].username, "bob");
        assert_eq!(stored[0].content, "hi");
        // stored at microsecond precision
        assert!(stored[0].timestamp.timestamp_micros() >= sent_at.timestamp_micros());
        assert!(stored[0].timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn sender_does_not_receive_own_messages() {
        let (hub, _store) = sqlite_hub();
        let (_alice, mut alice_rx) = peer(&hub, "alice");
        let (bob_in, mut bob_out, handle) = start(&hub, "bob");
        let _ = next_text(&mut alice_rx).await;

        bob_in.unbounded_send(Ok(Message::Text("echo?".into()))).unwrap();
        assert_eq!(next_text(&mut alice_rx).await, "[bob]: echo?");
        drop(bob_in);
        assert_eq!(
            timeout(TIMEOUT, handle).await.unwrap().unwrap(),
            SessionOutcome::Disconnected
        );

        // only the writer's final close frame reaches bob
        let mut seen = Vec::new();
        while let Ok(Some(msg)) = timeout(Duration::from_millis(200), bob_out.next()).await {
            seen.push(msg);
        }
        assert!(seen.iter().all(|m| matches!(m, Message::Close(_))), "{seen:?}");
    }

    #[tokio::test]
    async fn peer_messages_are_written_to_transport() {
        let (hub, _store) = sqlite_hub();
        let (_bob_in, mut bob_out, _handle) = start(&hub, "bob");
        wait_registered(&hub, "bob").await;

        let _ = hub.broadcast.broadcast_text("[alice]: hey", "alice");
        let msg = timeout(TIMEOUT, bob_out.next()).await.unwrap().unwrap();
        assert_eq!(msg, Message::Text("[alice]: hey".into()));
    }

    #[tokio::test]
    async fn binary_frames_are_relayed_not_persisted() {
        let (hub, store) = sqlite_hub();
        let (_alice, mut alice_rx) = peer(&hub, "alice");
        let (bob_in, _bob_out, _handle) = start(&hub, "bob");
        let _ = next_text(&mut alice_rx).await;

        let audio = Bytes::from_static(&[9, 8, 7, 0, 1]);
        bob_in
            .unbounded_send(Ok(Message::Binary(audio.clone())))
            .unwrap();
        let frame = timeout(TIMEOUT, alice_rx.recv()).await.unwrap().unwrap();
        assert_eq!(frame, Outbound::Binary(audio));
        assert!(store.list_recent(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected_with_policy_close() {
        let (hub, _store) = sqlite_hub();
        let (first, mut first_rx) = peer(&hub, "alice");
        let (_bob, mut bob_rx) = peer(&hub, "bob");

        let (_dup_in, mut dup_out, handle) = start(&hub, "alice");
        let outcome = timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert_eq!(outcome, SessionOutcome::Rejected);

        let Some(Message::Close(Some(frame))) = dup_out.next().await else {
            panic!("expected a close frame");
        };
        assert_eq!(frame.code, close_code::POLICY);
        assert_eq!(frame.reason.as_str(), DUPLICATE_USERNAME_REASON);

        assert_eq!(hub.registry.get("alice").unwrap().id(), first.id());
        assert!(first_rx.try_recv().is_err());
        assert!(bob_rx.try_recv().is_err(), "no announcement for a rejected session");
    }

    #[tokio::test]
    async fn persistence_failure_still_broadcasts() {
        let mut store = MockStore::new();
        let _ = store
            .expect_append()
            .times(1)
            .returning(|_, _, _| Err(StoreError::Task("disk full".into())));
        let hub = Arc::new(Hub::new(
            Arc::new(store),
            &ServerConfig::default(),
            CancellationToken::new(),
        ));
        let (_alice, mut alice_rx) = peer(&hub, "alice");
        let (bob_in, _bob_out, _handle) = start(&hub, "bob");
        let _ = next_text(&mut alice_rx).await;

        bob_in.unbounded_send(Ok(Message::Text("hi".into()))).unwrap();
        assert_eq!(next_text(&mut alice_rx).await, "[bob]: hi");
    }

    #[tokio::test]
    async fn transport_error_ends_session_and_announces() {
        let (hub, _store) = sqlite_hub();
        let (_alice, mut alice_rx) = peer(&hub, "alice");
        let (bob_in, _bob_out, handle) = start(&hub, "bob");
        let _ = next_text(&mut alice_rx).await;

        bob_in
            .unbounded_send(Err(std::io::Error::other("connection reset")))
            .unwrap();
        assert_eq!(
            timeout(TIMEOUT, handle).await.unwrap().unwrap(),
            SessionOutcome::TransportError
        );
        assert_eq!(next_text(&mut alice_rx).await, leave_announcement("bob"));
        assert!(hub.registry.get("bob").is_none());
    }

    #[tokio::test]
    async fn eviction_ends_session() {
        let (hub, _store) = sqlite_hub();
        let (_bob_in, _bob_out, handle) = start(&hub, "bob");
        wait_registered(&hub, "bob").await;

        hub.registry.get("bob").unwrap().close();
        assert_eq!(
            timeout(TIMEOUT, handle).await.unwrap().unwrap(),
            SessionOutcome::ClosedByHub
        );
        assert!(hub.registry.get("bob").is_none());
    }

    #[tokio::test]
    async fn shutdown_ends_session() {
        let (hub, _store) = sqlite_hub();
        let (_bob_in, _bob_out, handle) = start(&hub, "bob");
        wait_registered(&hub, "bob").await;

        hub.shutdown.cancel();
        assert_eq!(
            timeout(TIMEOUT, handle).await.unwrap().unwrap(),
            SessionOutcome::Shutdown
        );
        assert!(hub.registry.is_empty());
    }

    #[tokio::test]
    async fn dead_transport_closes_session() {
        let (hub, _store) = sqlite_hub();
        let (_bob_in, bob_out, handle) = start(&hub, "bob");
        wait_registered(&hub, "bob").await;
        drop(bob_out);

        let _ = hub.broadcast.broadcast_text("anyone there?", "alice");
        assert_eq!(
            timeout(TIMEOUT, handle).await.unwrap().unwrap(),
            SessionOutcome::ClosedByHub
        );
    }

    #[tokio::test]
    async fn username_is_free_again_after_leave() {
        let (hub, _store) = sqlite_hub();
        let (bob_in, _out, handle) = start(&hub, "bob");
        wait_registered(&hub, "bob").await;
        bob_in.unbounded_send(Ok(Message::Close(None))).unwrap();
        let _ = timeout(TIMEOUT, handle).await.unwrap().unwrap();

        let (_in2, _out2, _handle2) = start(&hub, "bob");
        wait_registered(&hub, "bob").await;
        assert_eq!(hub.registry.len(), 1);
    }

    #[test]
    fn outcome_labels_are_snake_case() {
        for outcome in [
            SessionOutcome::Rejected,
            SessionOutcome::ClientClosed,
            SessionOutcome::Disconnected,
            SessionOutcome::TransportError,
            SessionOutcome::ClosedByHub,
            SessionOutcome::Shutdown,
        ] {
            assert!(outcome.as_str().chars().all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }
}
