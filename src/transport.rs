// Adaptive WebSocket session to the portrait inference server: connection
// lifecycle with capped exponential backoff, request/response correlation,
// and a latency-driven throttle on outgoing edits. The session runs as a
// single task; callers talk to it through a cloneable handle and consume a
// typed event stream.

use std::collections::HashMap;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::TransportError;
use crate::latency::LatencyTracker;
use crate::params::ControlParams;
use crate::protocol::{decode_data_uri, EditRequest, FramingMetadata, ServerMessage};

/// A frame on the wire, independent of the underlying socket library.
#[derive(Debug, Clone, PartialEq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
}

pub type WireTx = Pin<Box<dyn Sink<WireFrame, Error = TransportError> + Send>>;
pub type WireRx = Pin<Box<dyn Stream<Item = Result<WireFrame, TransportError>> + Send>>;

/// Produces a fresh sink/stream pair per connection attempt. The real
/// implementation dials a WebSocket; tests substitute channel-backed pairs.
#[async_trait]
pub trait Connector: Send {
    async fn connect(&mut self) -> Result<(WireTx, WireRx), TransportError>;
}

/// Dials the configured endpoint with tokio-tungstenite. Ping/pong is left
/// to the socket library; close frames end the stream.
pub struct WebSocketConnector {
    endpoint: String,
}

impl WebSocketConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&mut self) -> Result<(WireTx, WireRx), TransportError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.endpoint.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let (sink, stream) = socket.split();

        let tx: WireTx = Box::pin(sink.sink_map_err(TransportError::from).with(
            |frame: WireFrame| async move {
                Ok::<Message, TransportError>(match frame {
                    WireFrame::Text(text) => Message::Text(text),
                    WireFrame::Binary(bytes) => Message::Binary(bytes),
                })
            },
        ));

        let rx: WireRx = Box::pin(stream.filter_map(|item| async move {
            match item {
                Ok(Message::Text(text)) => Some(Ok(WireFrame::Text(text))),
                Ok(Message::Binary(bytes)) => Some(Ok(WireFrame::Binary(bytes))),
                Ok(Message::Close(_)) => None,
                Ok(_) => None,
                Err(e) => Some(Err(TransportError::from(e))),
            }
        }));

        Ok((tx, rx))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Typed event stream consumed by the interaction state owner. Multiple
/// concerns (identity, framing, frames, errors) arrive as distinct events
/// instead of one opaque response callback.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Structured status/metadata payload. `new_identity` is true when the
    /// server issued a session identity differing from the current one.
    Metadata {
        session_id: Option<String>,
        framing: Option<FramingMetadata>,
        new_identity: bool,
    },
    /// An updated rendered frame (raw bytes, whether delivered as a binary
    /// frame or an inline data URI).
    Frame(Vec<u8>),
    /// The server reported an edit failure; the session identity has been
    /// cleared and the caller should revert to the original image.
    RemoteError(String),
    /// Non-fatal internal transport trouble, surfaced for diagnostics.
    Warning(String),
    /// The reconnect budget is exhausted; no further automatic attempts.
    GaveUp { attempts: u32 },
}

enum Command {
    SendParams(ControlParams),
    UploadImage(Vec<u8>),
    Shutdown,
}

/// Cloneable handle onto a running session task.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Queue one parameter edit. Subject to the latency-derived throttle:
    /// at most one frame per interval leaves the socket, a mid-interval
    /// call is deferred to the interval boundary, and only the newest
    /// deferred payload survives.
    pub fn send_params(&self, params: ControlParams) -> Result<(), TransportError> {
        if self.state() != SessionState::Open {
            return Err(TransportError::NotOpen);
        }
        self.commands
            .send(Command::SendParams(params))
            .map_err(|_| TransportError::SessionGone)
    }

    /// Upload the full image, starting a fresh server-side session. Not a
    /// control message: bypasses the throttle and carries no request id.
    pub fn upload_image(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        if self.state() != SessionState::Open {
            return Err(TransportError::NotOpen);
        }
        self.commands
            .send(Command::UploadImage(bytes))
            .map_err(|_| TransportError::SessionGone)
    }

    /// Intentional teardown: cancels pending timers, suppresses reconnects
    /// and closes the channel with a normal-closure handshake.
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

/// Backoff delay before reconnect attempt `attempt` (1-based):
/// `min(base * 2^attempt, cap)`.
pub fn reconnect_delay(config: &SessionConfig, attempt: u32) -> Duration {
    let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
    let delay = config.reconnect_base_ms.saturating_mul(factor);
    Duration::from_millis(delay.min(config.reconnect_cap_ms))
}

pub struct TransportSession {
    config: SessionConfig,
    connector: Box<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
    state: watch::Sender<SessionState>,
    tracker: LatencyTracker,
    in_flight: HashMap<Uuid, Instant>,
    session_id: Option<String>,
    attempts: u32,
    shutting_down: bool,
}

impl TransportSession {
    /// Spawn the session task. Returns the command handle and the event
    /// stream; the task lives until shutdown or reconnect exhaustion.
    pub fn spawn(
        config: SessionConfig,
        connector: Box<dyn Connector>,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Connecting);

        let tracker = LatencyTracker::new(
            config.latency_window,
            config.min_throttle(),
            config.initial_throttle(),
        );
        let session = TransportSession {
            config,
            connector,
            commands: cmd_rx,
            events: event_tx,
            state: state_tx,
            tracker,
            in_flight: HashMap::new(),
            session_id: None,
            attempts: 0,
            shutting_down: false,
        };
        tokio::spawn(session.run());

        (
            SessionHandle {
                commands: cmd_tx,
                state: state_rx,
            },
            event_rx,
        )
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn set_state(&mut self, state: SessionState) {
        let _ = self.state.send(state);
        self.emit(SessionEvent::StateChanged(state));
    }

    async fn run(mut self) {
        loop {
            self.set_state(SessionState::Connecting);
            match self.connector.connect().await {
                Ok((tx, rx)) => {
                    self.attempts = 0;
                    self.set_state(SessionState::Open);
                    info!("session open against {}", self.config.endpoint);
                    self.drive(tx, rx).await;
                }
                Err(e) => {
                    warn!("connect to {} failed: {e}", self.config.endpoint);
                }
            }

            // Responses can no longer be correlated across a connection.
            self.in_flight.clear();
            self.set_state(SessionState::Closed);

            if self.shutting_down {
                break;
            }
            if self.attempts >= self.config.max_reconnect_attempts {
                warn!(
                    "giving up after {} reconnect attempts",
                    self.config.max_reconnect_attempts
                );
                self.emit(SessionEvent::GaveUp {
                    attempts: self.attempts,
                });
                break;
            }
            self.attempts += 1;
            let delay = reconnect_delay(&self.config, self.attempts);
            info!(
                "reconnecting in {}ms (attempt {}/{})",
                delay.as_millis(),
                self.attempts,
                self.config.max_reconnect_attempts
            );
            let retry_at = Instant::now() + delay;
            loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(retry_at) => break,
                    cmd = self.commands.recv() => match cmd {
                        Some(Command::Shutdown) | None => {
                            self.shutting_down = true;
                            break;
                        }
                        Some(_) => {
                            // A send raced the close; the handle has already
                            // reported NotOpen for anything after it.
                            debug!("dropping queued send while disconnected");
                        }
                    },
                }
            }
            if self.shutting_down {
                break;
            }
        }
    }

    /// Event loop over one open connection. Returns when the connection
    /// drops (reconnect path) or the session is shut down.
    async fn drive(&mut self, mut tx: WireTx, mut rx: WireRx) {
        let mut last_sent: Option<Instant> = None;
        let mut pending: Option<ControlParams> = None;

        loop {
            let throttle = self.tracker.current_throttle();
            let deadline = match (&pending, last_sent) {
                (Some(_), Some(at)) => Some(at + throttle),
                _ => None,
            };
            let trailing_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

            tokio::select! {
                biased;

                _ = tokio::time::sleep_until(trailing_at), if deadline.is_some() => {
                    if let Some(params) = pending.take() {
                        if self.transmit(&mut tx, params).await.is_err() {
                            return;
                        }
                        last_sent = Some(Instant::now());
                    }
                }

                cmd = self.commands.recv() => match cmd {
                    None => {
                        self.shutting_down = true;
                        let _ = tx.close().await;
                        return;
                    }
                    Some(Command::Shutdown) => {
                        self.shutting_down = true;
                        self.set_state(SessionState::Closing);
                        let _ = tx.close().await;
                        return;
                    }
                    Some(Command::UploadImage(bytes)) => {
                        // A locally selected image invalidates the server
                        // session; the next edit re-establishes one.
                        self.session_id = None;
                        debug!("uploading image ({} bytes)", bytes.len());
                        if let Err(e) = tx.send(WireFrame::Binary(bytes)).await {
                            self.report_send_failure(e);
                            return;
                        }
                    }
                    Some(Command::SendParams(params)) => {
                        let now = Instant::now();
                        let due = last_sent.map_or(true, |at| now >= at + throttle);
                        if due {
                            // Leading edge: fires immediately. A call landing
                            // exactly on the boundary takes this path and is
                            // not queued again.
                            pending = None;
                            if self.transmit(&mut tx, params).await.is_err() {
                                return;
                            }
                            last_sent = Some(now);
                        } else {
                            // Mid-interval: defer to the boundary, newest
                            // payload supersedes older deferred ones.
                            pending = Some(params);
                        }
                    }
                },

                frame = rx.next() => match frame {
                    None => {
                        warn!("connection closed by peer");
                        return;
                    }
                    Some(Err(e)) => {
                        warn!("socket error: {e}");
                        self.emit(SessionEvent::Warning(format!("socket error: {e}")));
                        return;
                    }
                    Some(Ok(WireFrame::Binary(bytes))) => {
                        debug!("<- rendered frame ({} bytes)", bytes.len());
                        self.emit(SessionEvent::Frame(bytes));
                    }
                    Some(Ok(WireFrame::Text(text))) => self.handle_text(&text),
                },
            }
        }
    }

    async fn transmit(
        &mut self,
        tx: &mut WireTx,
        params: ControlParams,
    ) -> Result<(), TransportError> {
        let request = EditRequest {
            id: Uuid::new_v4(),
            session_id: self.session_id.clone(),
            params,
        };
        let text = match serde_json::to_string(&request) {
            Ok(text) => text,
            Err(e) => {
                warn!("failed to encode edit request: {e}");
                return Err(TransportError::Encoding(e));
            }
        };
        self.in_flight.insert(request.id, Instant::now());
        debug!("-> edit {} ({} in flight)", request.id, self.in_flight.len());
        if let Err(e) = tx.send(WireFrame::Text(text)).await {
            self.in_flight.remove(&request.id);
            self.report_send_failure(e);
            return Err(TransportError::NotOpen);
        }
        Ok(())
    }

    fn report_send_failure(&mut self, error: TransportError) {
        warn!("send failed: {error}");
        self.emit(SessionEvent::Warning(format!("send failed: {error}")));
    }

    fn handle_text(&mut self, text: &str) {
        let message: ServerMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("unparseable server message: {e}");
                self.emit(SessionEvent::Warning(format!(
                    "unparseable server message: {e}"
                )));
                return;
            }
        };

        // Correlate first: a matched id feeds the latency estimate even
        // when the payload turns out to be an error.
        if let Some(id) = message.id {
            match self.in_flight.remove(&id) {
                Some(sent_at) => {
                    let rtt = sent_at.elapsed();
                    self.tracker.record_round_trip(rtt);
                    debug!(
                        "<- response {} after {}ms (throttle now {}ms)",
                        id,
                        rtt.as_millis(),
                        self.tracker.current_throttle().as_millis()
                    );
                }
                None => {
                    warn!("response references unknown request {id}");
                    self.emit(SessionEvent::Warning(format!(
                        "response references unknown request {id}"
                    )));
                }
            }
        }

        if message.is_error() {
            let reason = message
                .error
                .clone()
                .unwrap_or_else(|| "unspecified server error".to_string());
            warn!("server reported: {reason}");
            self.session_id = None;
            self.emit(SessionEvent::RemoteError(reason));
            return;
        }

        let framing = message.framing();
        if message.session_id.is_some() || framing.is_some() {
            let new_identity = message.session_id.is_some()
                && message.session_id != self.session_id;
            if new_identity {
                self.session_id = message.session_id.clone();
                info!("session identity established: {:?}", self.session_id);
            }
            self.emit(SessionEvent::Metadata {
                session_id: message.session_id.clone(),
                framing,
                new_identity,
            });
        }

        if let Some(uri) = message.image.as_deref() {
            match decode_data_uri(uri) {
                Some(bytes) => self.emit(SessionEvent::Frame(bytes)),
                None => {
                    warn!("response carried an undecodable data URI");
                    self.emit(SessionEvent::Warning(
                        "response carried an undecodable data URI".to_string(),
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct TestLink {
        outbound: mpsc::UnboundedReceiver<WireFrame>,
        inbound: mpsc::UnboundedSender<Result<WireFrame, TransportError>>,
    }

    impl TestLink {
        fn drain(&mut self) -> Vec<WireFrame> {
            let mut frames = Vec::new();
            while let Ok(frame) = self.outbound.try_recv() {
                frames.push(frame);
            }
            frames
        }

        fn inject(&self, json: &str) {
            self.inbound
                .send(Ok(WireFrame::Text(json.to_string())))
                .unwrap();
        }
    }

    struct TestConnector {
        links: Arc<Mutex<Vec<TestLink>>>,
        connects: Arc<AtomicUsize>,
        refuse_all: bool,
    }

    impl TestConnector {
        fn new() -> (Self, Arc<Mutex<Vec<TestLink>>>, Arc<AtomicUsize>) {
            let links = Arc::new(Mutex::new(Vec::new()));
            let connects = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    links: Arc::clone(&links),
                    connects: Arc::clone(&connects),
                    refuse_all: false,
                },
                links,
                connects,
            )
        }

        fn refusing() -> (Self, Arc<AtomicUsize>) {
            let (mut connector, _, connects) = Self::new();
            connector.refuse_all = true;
            (connector, connects)
        }
    }

    #[async_trait]
    impl Connector for TestConnector {
        async fn connect(&mut self) -> Result<(WireTx, WireRx), TransportError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.refuse_all {
                return Err(TransportError::Connect("refused".to_string()));
            }
            let (out_tx, out_rx) = mpsc::unbounded_channel::<WireFrame>();
            let (in_tx, in_rx) = mpsc::unbounded_channel::<Result<WireFrame, TransportError>>();
            self.links.lock().unwrap().push(TestLink {
                outbound: out_rx,
                inbound: in_tx,
            });

            let tx: WireTx = Box::pin(futures_util::sink::unfold(
                out_tx,
                |out_tx, frame: WireFrame| async move {
                    out_tx
                        .send(frame)
                        .map_err(|_| TransportError::NotOpen)?;
                    Ok::<_, TransportError>(out_tx)
                },
            ));
            let rx: WireRx = Box::pin(futures_util::stream::unfold(in_rx, |mut in_rx| async move {
                in_rx.recv().await.map(|item| (item, in_rx))
            }));
            Ok((tx, rx))
        }
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            endpoint: "ws://test.invalid/ws".to_string(),
            ..Default::default()
        }
    }

    async fn wait_for_open(events: &mut mpsc::UnboundedReceiver<SessionEvent>) {
        loop {
            match events.recv().await {
                Some(SessionEvent::StateChanged(SessionState::Open)) => return,
                Some(_) => continue,
                None => panic!("event stream ended before the session opened"),
            }
        }
    }

    fn take_link(links: &Arc<Mutex<Vec<TestLink>>>) -> TestLink {
        links.lock().unwrap().remove(0)
    }

    fn edit(frame: &WireFrame) -> EditRequest {
        match frame {
            WireFrame::Text(text) => serde_json::from_str(text).unwrap(),
            WireFrame::Binary(_) => panic!("expected a text frame"),
        }
    }

    fn yaw(value: f64) -> ControlParams {
        ControlParams {
            rotate_yaw: Some(value),
            ..Default::default()
        }
    }

    #[test]
    fn backoff_sequence_doubles_then_caps() {
        let config = test_config();
        let delays: Vec<u64> = (1..=5)
            .map(|attempt| reconnect_delay(&config, attempt).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![2000, 4000, 8000, 16000, 30000]);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_updates_collapse_to_leading_and_trailing_sends() {
        let (connector, links, _) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;
        let mut link = take_link(&links);

        for i in 0..6 {
            handle.send_params(yaw(i as f64)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let frames = link.drain();
        assert_eq!(frames.len(), 2, "expected leading + trailing sends only");
        assert_eq!(edit(&frames[0]).params.rotate_yaw, Some(0.0));
        // Intermediate payloads 1..=4 were superseded.
        assert_eq!(edit(&frames[1]).params.rotate_yaw, Some(5.0));

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn call_exactly_on_the_boundary_fires_once() {
        let (connector, links, _) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;
        let mut link = take_link(&links);

        handle.send_params(yaw(1.0)).unwrap();
        // Default throttle before any samples is 500 ms; land the second
        // call exactly on the interval boundary.
        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.send_params(yaw(2.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let frames = link.drain();
        assert_eq!(frames.len(), 2, "a boundary call must not double-fire");
        assert_eq!(edit(&frames[0]).params.rotate_yaw, Some(1.0));
        assert_eq!(edit(&frames[1]).params.rotate_yaw, Some(2.0));

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn round_trips_retune_the_throttle() {
        let (connector, links, _) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;
        let mut link = take_link(&links);

        handle.send_params(yaw(1.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let sent = link.drain();
        assert_eq!(sent.len(), 1);
        let id = edit(&sent[0]).id;

        // Respond 200 ms later; the measured round trip becomes the new
        // throttle interval (above the 100 ms floor).
        tokio::time::sleep(Duration::from_millis(199)).await;
        link.inject(&format!(r#"{{"id":"{id}","sessionId":"s-1"}}"#));
        match events.recv().await {
            Some(SessionEvent::Metadata {
                session_id,
                new_identity,
                ..
            }) => {
                assert_eq!(session_id.as_deref(), Some("s-1"));
                assert!(new_identity);
            }
            other => panic!("expected metadata event, got {other:?}"),
        }

        // Two quick sends: the trailing one must now fire after ~200 ms,
        // not the 500 ms initial default.
        handle.send_params(yaw(2.0)).unwrap();
        handle.send_params(yaw(3.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(link.drain().len(), 1, "trailing send fired too early");
        tokio::time::sleep(Duration::from_millis(100)).await;
        let trailing = link.drain();
        assert_eq!(trailing.len(), 1, "trailing send missing after interval");
        assert_eq!(edit(&trailing[0]).params.rotate_yaw, Some(3.0));

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_ids_are_ignored_for_latency_but_payload_is_processed() {
        let (connector, links, _) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;
        let link = take_link(&links);

        link.inject(&format!(r#"{{"id":"{}","sessionId":"s-9"}}"#, Uuid::new_v4()));
        // Garbage is logged and skipped, never fatal.
        link.inject("not json at all");

        let mut saw_warning = false;
        let mut saw_metadata = false;
        for _ in 0..3 {
            match events.recv().await {
                Some(SessionEvent::Warning(_)) => saw_warning = true,
                Some(SessionEvent::Metadata { session_id, .. }) => {
                    assert_eq!(session_id.as_deref(), Some("s-9"));
                    saw_metadata = true;
                }
                other => panic!("unexpected event {other:?}"),
            }
            if saw_warning && saw_metadata {
                break;
            }
        }
        assert!(saw_warning && saw_metadata);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn remote_error_clears_the_session_identity() {
        let (connector, links, _) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;
        let mut link = take_link(&links);

        link.inject(r#"{"sessionId":"s-1"}"#);
        match events.recv().await {
            Some(SessionEvent::Metadata { new_identity, .. }) => assert!(new_identity),
            other => panic!("expected metadata event, got {other:?}"),
        }

        handle.send_params(yaw(1.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let sent = link.drain();
        assert_eq!(edit(&sent[0]).session_id.as_deref(), Some("s-1"));

        link.inject(r#"{"success":false,"error":"inference failed"}"#);
        match events.recv().await {
            Some(SessionEvent::RemoteError(reason)) => assert_eq!(reason, "inference failed"),
            other => panic!("expected remote error event, got {other:?}"),
        }

        // The next edit must re-establish a session from scratch.
        tokio::time::sleep(Duration::from_millis(600)).await;
        handle.send_params(yaw(2.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let sent = link.drain();
        assert_eq!(edit(&sent[0]).session_id, None);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn image_upload_bypasses_the_throttle_and_resets_identity() {
        let (connector, links, _) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;
        let mut link = take_link(&links);

        link.inject(r#"{"sessionId":"s-1"}"#);
        match events.recv().await {
            Some(SessionEvent::Metadata { .. }) => {}
            other => panic!("expected metadata event, got {other:?}"),
        }

        handle.send_params(yaw(1.0)).unwrap();
        handle.upload_image(vec![1, 2, 3]).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        let frames = link.drain();
        assert_eq!(frames.len(), 2);
        assert!(matches!(frames[0], WireFrame::Text(_)));
        assert_eq!(frames[1], WireFrame::Binary(vec![1, 2, 3]));

        // Selecting a new image locally cleared the identity.
        tokio::time::sleep(Duration::from_millis(600)).await;
        handle.send_params(yaw(2.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        let sent = link.drain();
        assert_eq!(edit(&sent[0]).session_id, None);

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn binary_and_inline_frames_both_become_frame_events() {
        let (connector, links, _) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;
        let link = take_link(&links);

        link.inbound
            .send(Ok(WireFrame::Binary(vec![9, 9, 9])))
            .unwrap();
        match events.recv().await {
            Some(SessionEvent::Frame(bytes)) => assert_eq!(bytes, vec![9, 9, 9]),
            other => panic!("expected frame event, got {other:?}"),
        }

        link.inject(r#"{"image":"data:image/webp;base64,AAEC"}"#);
        match events.recv().await {
            Some(SessionEvent::Frame(bytes)) => assert_eq!(bytes, vec![0, 1, 2]),
            other => panic!("expected frame event, got {other:?}"),
        }

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn unclean_close_reconnects_and_resets_attempts_after_open() {
        let (connector, links, connects) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;

        // Drop the first link entirely: the peer is gone, unclean close.
        drop(take_link(&links));
        let closed_at = Instant::now();
        wait_for_open(&mut events).await;
        assert_eq!(connects.load(Ordering::SeqCst), 2);
        // First retry waits base * 2^1.
        assert_eq!(closed_at.elapsed(), Duration::from_millis(2000));

        // Attempts were reset by the successful open: the next unclean
        // close starts the backoff ladder from the bottom again.
        drop(take_link(&links));
        let closed_at = Instant::now();
        wait_for_open(&mut events).await;
        assert_eq!(connects.load(Ordering::SeqCst), 3);
        assert_eq!(closed_at.elapsed(), Duration::from_millis(2000));

        handle.shutdown();
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_budget_exhaustion_gives_up() {
        let (connector, connects) = TestConnector::refusing();
        let started = Instant::now();
        let (_handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));

        loop {
            match events.recv().await {
                Some(SessionEvent::GaveUp { attempts }) => {
                    assert_eq!(attempts, 5);
                    break;
                }
                Some(_) => continue,
                None => panic!("event stream ended without a give-up event"),
            }
        }
        // Initial attempt plus five retries.
        assert_eq!(connects.load(Ordering::SeqCst), 6);
        // 2s + 4s + 8s + 16s + 30s of backoff.
        assert_eq!(started.elapsed(), Duration::from_millis(60000));
    }

    #[tokio::test(start_paused = true)]
    async fn intentional_shutdown_suppresses_reconnects() {
        let (connector, links, connects) = TestConnector::new();
        let (handle, mut events) = TransportSession::spawn(test_config(), Box::new(connector));
        wait_for_open(&mut events).await;
        let _link = take_link(&links);

        handle.shutdown();
        let mut saw_closed = false;
        while let Some(event) = events.recv().await {
            if matches!(event, SessionEvent::StateChanged(SessionState::Closed)) {
                saw_closed = true;
            }
        }
        assert!(saw_closed);
        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert!(handle.send_params(yaw(1.0)).is_err());
    }
}
