//! Connection manager task.
//!
//! One tokio task owns the physical connection, the subscriber registry,
//! every timer, and the heartbeat. Handles talk to it through an unbounded
//! command channel and observe its state through a `watch` channel, so
//! state is only ever mutated from this task.
//!
//! # Event Loop
//!
//! The task multiplexes:
//!
//! - Commands from [`StreamClient`](super::StreamClient) handles
//! - The in-flight connection attempt (bounded by the connect timeout)
//! - Inbound frames from the open transport
//! - The first-connect debounce timer
//! - The reconnect timer
//! - The heartbeat deadline
//!
//! Timers are plain deadlines held in `Option<Instant>`. Arming one
//! replaces the previous deadline and clearing it cancels it, so two
//! timers of the same kind can never be pending at once.

// ============================================================================
// Imports
// ============================================================================

use std::future::pending;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::identifiers::SubscriptionId;
use crate::protocol::{ClientMessage, ControlMessage, Decoded, MessageCodec};
use crate::transport::{Connector, Frame, FrameSink, FrameStream, Transport};

use super::heartbeat::{HeartbeatAction, HeartbeatMonitor};
use super::policy::ReconnectPolicy;
use super::registry::{Change, SubscriberRegistry, Subscription};
use super::state::{ClientEvent, ConnectionState, EventHandler};

// ============================================================================
// Constants
// ============================================================================

/// Bound on writing the close frame during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Types
// ============================================================================

/// Connection attempt in flight.
type ConnectFuture = BoxFuture<'static, Result<Transport>>;

/// Internal commands from handles to the manager task.
pub(crate) enum Command {
    /// Register a subscriber.
    Subscribe(Subscription),
    /// Drop a subscriber. Unknown ids are ignored.
    Unsubscribe(SubscriptionId),
    /// Write a message to the open connection.
    Send(ClientMessage),
    /// Leave [`ConnectionState::Failed`] and start over.
    Reset,
    /// Close everything and stop the task.
    Shutdown(oneshot::Sender<()>),
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// State owned by the manager task.
pub(crate) struct ConnectionManager {
    config: ClientConfig,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    codec: Box<dyn MessageCodec>,
    registry: SubscriberRegistry,
    heartbeat: HeartbeatMonitor,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    event_handler: Option<EventHandler>,
    commands: mpsc::UnboundedReceiver<Command>,

    /// Reconnect attempts since the last successful open.
    attempt: u32,
    pending: Option<ConnectFuture>,
    sink: Option<Box<dyn FrameSink>>,
    inbound: Option<FrameStream>,
    connect_at: Option<Instant>,
    reconnect_at: Option<Instant>,
}

impl ConnectionManager {
    /// Creates the manager. Nothing happens until [`run`](Self::run) is polled.
    pub(crate) fn new(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        codec: Box<dyn MessageCodec>,
        event_handler: Option<EventHandler>,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ConnectionState>,
    ) -> Self {
        let policy = config.reconnect_policy();
        let heartbeat = HeartbeatMonitor::new(config.heartbeat_interval, config.heartbeat_timeout);

        Self {
            config,
            policy,
            connector,
            codec,
            registry: SubscriberRegistry::new(),
            heartbeat,
            state: ConnectionState::Idle,
            state_tx,
            event_handler,
            commands,
            attempt: 0,
            pending: None,
            sink: None,
            inbound: None,
            connect_at: None,
            reconnect_at: None,
        }
    }

    /// Runs the event loop until shutdown or until every handle is dropped.
    pub(crate) async fn run(mut self) {
        debug!(url = %self.config.url, "Connection manager started");
        let mut shutdown_done = None;

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown(done)) => {
                            debug!("Shutdown command received");
                            self.close().await;
                            shutdown_done = Some(done);
                            break;
                        }

                        Some(command) => self.handle_command(command).await,

                        None => {
                            debug!("Command channel closed");
                            self.close().await;
                            break;
                        }
                    }
                }

                result = poll_connect(&mut self.pending) => {
                    self.pending = None;
                    self.handle_connect_result(result).await;
                }

                frame = next_frame(&mut self.inbound) => {
                    self.handle_frame(frame).await;
                }

                () = wait_until(self.connect_at) => {
                    self.connect_at = None;
                    self.handle_grace_elapsed();
                }

                () = wait_until(self.reconnect_at) => {
                    self.reconnect_at = None;
                    self.handle_reconnect_due();
                }

                () = wait_until(self.heartbeat.deadline()) => {
                    self.handle_heartbeat().await;
                }
            }
        }

        // Handles must observe the shutdown before the waiter is released.
        let Self {
            mut commands,
            state_tx,
            ..
        } = self;
        commands.close();
        drop(state_tx);

        if let Some(done) = shutdown_done {
            let _ = done.send(());
        }

        debug!("Connection manager terminated");
    }

    // ========================================================================
    // Commands
    // ========================================================================

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe(subscription) => {
                let id = subscription.id;
                let change = self.registry.insert(subscription);
                trace!(%id, subscribers = self.registry.len(), "Subscriber added");
                self.apply_change(change).await;
            }

            Command::Unsubscribe(id) => {
                let change = self.registry.remove(id);
                trace!(%id, subscribers = self.registry.len(), "Subscriber removed");
                self.apply_change(change).await;
            }

            Command::Send(message) => {
                if self.state.is_open() {
                    self.write_or_drop(message).await;
                } else {
                    debug!(state = %self.state, "Dropping message sent while not open");
                }
            }

            Command::Reset => self.reset(),

            // Handled by the event loop.
            Command::Shutdown(_) => {}
        }
    }

    async fn apply_change(&mut self, change: Change) {
        match change {
            Change::None => {}

            Change::FirstSubscriber => self.handle_first_subscriber().await,

            Change::TopicsAdded(topics) => {
                if self.state.is_open() {
                    self.write_or_drop(ControlMessage::subscribe(&topics).into())
                        .await;
                }
            }

            Change::TopicsRemoved(topics) => {
                if self.state.is_open() {
                    self.write_or_drop(ControlMessage::unsubscribe(&topics).into())
                        .await;
                }
            }

            Change::LastSubscriberGone => {
                debug!("Last subscriber gone, closing connection");
                self.close().await;
            }
        }
    }

    async fn handle_first_subscriber(&mut self) {
        match self.state {
            ConnectionState::Idle => {
                if self.config.connect_grace.is_zero() {
                    self.connect();
                } else if self.connect_at.is_none() {
                    self.connect_at = Some(Instant::now() + self.config.connect_grace);
                    trace!(grace = ?self.config.connect_grace, "Connect scheduled");
                }
            }

            ConnectionState::Open => {
                let topics = self.registry.topics();
                self.write_or_drop(ControlMessage::subscribe(&topics).into())
                    .await;
            }

            ConnectionState::Failed { .. } => {
                debug!("Subscriber added while failed; waiting for reset");
            }

            ConnectionState::Connecting
            | ConnectionState::Closing
            | ConnectionState::Reconnecting { .. } => {}
        }
    }

    fn reset(&mut self) {
        if !matches!(self.state, ConnectionState::Failed { .. }) {
            debug!(state = %self.state, "Reset ignored outside failed state");
            return;
        }

        info!("Resetting failed connection");
        self.attempt = 0;
        self.set_state(ConnectionState::Idle);

        if !self.registry.is_empty() {
            self.connect();
        }
    }

    // ========================================================================
    // Connection Lifecycle
    // ========================================================================

    /// Starts a connection attempt.
    fn connect(&mut self) {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            return;
        }

        self.connect_at = None;
        self.reconnect_at = None;

        let connector = Arc::clone(&self.connector);
        let url = self.config.url.clone();
        let limit = self.config.connect_timeout;

        debug!(%url, attempt = self.attempt, "Connecting");

        self.pending = Some(Box::pin(async move {
            match timeout(limit, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(Error::connection_timeout(
                    u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                )),
            }
        }));

        self.set_state(ConnectionState::Connecting);
    }

    async fn handle_connect_result(&mut self, result: Result<Transport>) {
        match result {
            Ok(transport) => self.handle_open(transport).await,
            Err(e) => {
                warn!(error = %e, "Connection attempt failed");
                self.emit(ClientEvent::TransportError {
                    message: e.to_string(),
                });
                self.handle_connection_lost(e.to_string());
            }
        }
    }

    async fn handle_open(&mut self, transport: Transport) {
        let Transport { mut sink, stream } = transport;

        let topics = self.registry.topics();
        if !topics.is_empty() {
            let sent = match self.codec.encode(&ControlMessage::subscribe(&topics).into()) {
                Ok(frame) => sink.send(frame).await,
                Err(e) => Err(e),
            };

            if let Err(e) = sent {
                warn!(error = %e, "Failed to send subscribe on open");
                self.emit(ClientEvent::TransportError {
                    message: e.to_string(),
                });
                self.handle_connection_lost(e.to_string());
                return;
            }
        }

        self.sink = Some(sink);
        self.inbound = Some(stream);
        self.heartbeat.start(Instant::now());
        self.attempt = 0;
        self.set_state(ConnectionState::Open);

        info!(url = %self.config.url, topics = topics.len(), "Stream connected");
        self.emit(ClientEvent::Connected);
    }

    /// Handles an unrequested end of the connection or of an attempt.
    fn handle_connection_lost(&mut self, reason: String) {
        self.heartbeat.stop();
        self.pending = None;
        self.sink = None;
        self.inbound = None;

        if self.state.is_open() {
            self.emit(ClientEvent::Disconnected {
                reason: reason.clone(),
            });
        }

        if self.registry.is_empty() {
            debug!(%reason, "Connection lost with no subscribers");
            self.attempt = 0;
            self.set_state(ConnectionState::Idle);
            return;
        }

        let next = self.attempt.saturating_add(1);
        if self.policy.allows(next) {
            let delay = self.policy.delay(next);
            self.attempt = next;
            self.reconnect_at = Some(Instant::now() + delay);
            self.set_state(ConnectionState::Reconnecting { attempt: next });

            debug!(%reason, attempt = next, ?delay, "Reconnect scheduled");
            self.emit(ClientEvent::ReconnectScheduled {
                attempt: next,
                delay,
            });
        } else {
            self.reconnect_at = None;
            self.set_state(ConnectionState::Failed {
                attempts: self.attempt,
            });

            error!(%reason, attempts = self.attempt, "Reconnect attempts exhausted");
            self.emit(ClientEvent::ReconnectExhausted {
                attempts: self.attempt,
            });
        }
    }

    /// Closes on request. [`ConnectionState::Failed`] is kept as is.
    async fn close(&mut self) {
        self.connect_at = None;
        self.reconnect_at = None;
        self.pending = None;
        self.heartbeat.stop();
        self.inbound = None;

        if matches!(self.state, ConnectionState::Failed { .. }) {
            return;
        }

        self.attempt = 0;

        let Some(mut sink) = self.sink.take() else {
            self.set_state(ConnectionState::Idle);
            return;
        };

        self.set_state(ConnectionState::Closing);

        match timeout(CLOSE_TIMEOUT, sink.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "Error while closing transport"),
            Err(_) => debug!("Timed out closing transport"),
        }

        info!("Stream closed");
        self.emit(ClientEvent::Disconnected {
            reason: "closed by client".to_string(),
        });
        self.set_state(ConnectionState::Idle);
    }

    // ========================================================================
    // Timers
    // ========================================================================

    fn handle_grace_elapsed(&mut self) {
        if self.registry.is_empty() || self.state != ConnectionState::Idle {
            return;
        }
        self.connect();
    }

    fn handle_reconnect_due(&mut self) {
        if self.registry.is_empty() {
            debug!("Reconnect due with no subscribers");
            self.attempt = 0;
            self.set_state(ConnectionState::Idle);
            return;
        }

        if matches!(self.state, ConnectionState::Reconnecting { .. }) {
            self.connect();
        }
    }

    async fn handle_heartbeat(&mut self) {
        match self.heartbeat.poll(Instant::now()) {
            HeartbeatAction::Idle => {}

            HeartbeatAction::SendPing => {
                trace!("Sending heartbeat ping");
                self.write_or_drop(ControlMessage::Ping.into()).await;
            }

            HeartbeatAction::Stale => {
                warn!(timeout = ?self.config.heartbeat_timeout, "Heartbeat timed out");
                if let Some(sink) = self.sink.as_mut() {
                    let _ = timeout(CLOSE_TIMEOUT, sink.close()).await;
                }
                self.handle_connection_lost("heartbeat timeout".to_string());
            }
        }
    }

    // ========================================================================
    // Inbound
    // ========================================================================

    async fn handle_frame(&mut self, frame: Option<Result<Frame>>) {
        match frame {
            Some(Ok(frame)) => {
                self.heartbeat.observe(Instant::now());
                trace!(len = frame.len(), "Frame received");

                match self.codec.decode(&frame) {
                    Ok(Decoded::Messages(messages)) => {
                        for message in &messages {
                            let outcome = self.registry.dispatch(message);
                            if outcome.delivered == 0 && outcome.panicked.is_empty() {
                                trace!(topic = %message.topic, "No subscriber for topic");
                            }
                            for subscription in outcome.panicked {
                                self.emit(ClientEvent::HandlerPanicked {
                                    subscription,
                                    topic: message.topic.clone(),
                                });
                            }
                        }
                    }

                    Ok(Decoded::Ping) => {
                        self.write_or_drop(ControlMessage::Pong.into()).await;
                    }

                    Ok(Decoded::Pong) => trace!("Heartbeat pong"),

                    Ok(Decoded::Control(kind)) => debug!(%kind, "Control frame"),

                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable frame");
                        self.emit(ClientEvent::DecodeError {
                            message: e.to_string(),
                        });
                    }
                }
            }

            Some(Err(e)) => {
                error!(error = %e, "Transport error");
                self.emit(ClientEvent::TransportError {
                    message: e.to_string(),
                });
                self.handle_connection_lost(e.to_string());
            }

            None => {
                debug!("Stream closed by remote");
                self.handle_connection_lost("closed by remote".to_string());
            }
        }
    }

    // ========================================================================
    // Outbound
    // ========================================================================

    /// Writes a message. A failed write counts as a lost connection.
    async fn write_or_drop(&mut self, message: ClientMessage) {
        let frame = match self.codec.encode(&message) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode outbound message");
                return;
            }
        };

        let Some(sink) = self.sink.as_mut() else {
            return;
        };

        if let Err(e) = sink.send(frame).await {
            warn!(error = %e, "Failed to write to transport");
            self.emit(ClientEvent::TransportError {
                message: e.to_string(),
            });
            self.handle_connection_lost(e.to_string());
        }
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    fn set_state(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }

        self.state = to;
        self.state_tx.send_replace(to);
        trace!(%from, %to, "State changed");
        self.emit(ClientEvent::StateChanged { from, to });
    }

    fn emit(&self, event: ClientEvent) {
        let Some(handler) = &self.event_handler else {
            return;
        };

        if panic::catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
            warn!(?event, "Event handler panicked");
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn poll_connect(pending: &mut Option<ConnectFuture>) -> Result<Transport> {
    match pending {
        Some(attempt) => attempt.await,
        None => pending_forever().await,
    }
}

async fn next_frame(inbound: &mut Option<FrameStream>) -> Option<Result<Frame>> {
    match inbound {
        Some(stream) => stream.next().await,
        None => pending_forever().await,
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending_forever().await,
    }
}

async fn pending_forever<T>() -> T {
    pending().await
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::{Value, json};
    use tokio::sync::mpsc;
    use tokio::time::sleep;
    use tracing_subscriber::EnvFilter;

    use crate::client::{ClientEvent, ConnectionState, StreamClient};
    use crate::config::ClientConfig;
    use crate::error::Error;
    use crate::protocol::Message;
    use crate::transport::Frame;
    use crate::transport::mock::{MockConnector, MockServer, Outcome};

    struct Harness {
        client: StreamClient,
        connector: MockConnector,
        accepted: mpsc::UnboundedReceiver<MockServer>,
        events: Arc<Mutex<Vec<ClientEvent>>>,
    }

    impl Harness {
        async fn accept(&mut self) -> MockServer {
            self.accepted.recv().await.unwrap()
        }

        fn saw(&self, predicate: impl Fn(&ClientEvent) -> bool) -> bool {
            self.events.lock().iter().any(predicate)
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("ws://stream.test/ws")
            .unwrap()
            .with_reconnect(Duration::from_millis(100), Duration::from_secs(1))
            .with_max_attempts(3)
            .with_heartbeat(Duration::from_secs(600), Duration::from_secs(1800))
            .with_connect_grace(Duration::from_millis(50))
            .with_connect_timeout(Duration::from_secs(2))
    }

    /// Set `RUST_LOG=topic_stream=trace` to see the manager's logs.
    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn harness(config: ClientConfig) -> Harness {
        init_tracing();
        let (connector, accepted) = MockConnector::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let client = StreamClient::builder(config)
            .connector(connector.clone())
            .on_event(move |event| sink.lock().push(event.clone()))
            .build()
            .unwrap();

        Harness {
            client,
            connector,
            accepted,
            events,
        }
    }

    fn forward(tx: mpsc::UnboundedSender<Message>) -> impl Fn(&Message) + Send + Sync + 'static {
        move |message| {
            let _ = tx.send(message.clone());
        }
    }

    fn subscribe_frame(topics: &[&str]) -> Value {
        json!({ "type": "subscribe", "topics": topics })
    }

    #[tokio::test(start_paused = true)]
    async fn test_metrics_update_lifecycle() {
        let mut h = harness(config());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let id = h.client.subscribe(["metrics_update"], forward(tx)).unwrap();

        let mut server = h.accept().await;
        assert_eq!(
            server.next_sent().await.unwrap(),
            subscribe_frame(&["metrics_update"])
        );

        server.push(json!({ "type": "metrics_update", "data": { "cpu": 42 } }));
        let message = rx.recv().await.unwrap();
        assert_eq!(message.topic, "metrics_update");
        assert_eq!(message.payload, json!({ "cpu": 42 }));
        assert!(rx.try_recv().is_err());
        assert_eq!(h.client.state(), ConnectionState::Open);

        server.disconnect();

        let mut server = h.accept().await;
        let first_delay = Duration::from_millis(100);
        assert!(h.saw(|e| matches!(
            e,
            ClientEvent::ReconnectScheduled { attempt: 1, delay } if *delay == first_delay
        )));
        assert_eq!(
            server.next_sent().await.unwrap(),
            subscribe_frame(&["metrics_update"])
        );

        server.push(json!({ "type": "metrics_update", "data": { "cpu": 7 } }));
        assert_eq!(rx.recv().await.unwrap().payload, json!({ "cpu": 7 }));

        h.client.unsubscribe(id);
        h.client
            .wait_for_state(|state| state == ConnectionState::Idle)
            .await
            .unwrap();
        assert!(server.client_closed());

        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.attempts(), 2);
        assert_eq!(h.client.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_then_unsubscribe_within_grace_never_connects() {
        let h = harness(config());

        let id = h.client.subscribe(["logs"], |_| {}).unwrap();
        sleep(Duration::from_millis(10)).await;
        h.client.unsubscribe(id);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(h.connector.attempts(), 0);
        assert_eq!(h.client.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_many_subscribers_share_one_connection() {
        let mut h = harness(config());
        let (tx, mut rx) = mpsc::unbounded_channel();

        for label in ["a", "b", "c"] {
            let tx = tx.clone();
            h.client
                .subscribe(["metrics_update", "alert"], move |message: &Message| {
                    let _ = tx.send((label, message.topic.clone()));
                })
                .unwrap();
        }

        let mut server = h.accept().await;
        assert_eq!(
            server.next_sent().await.unwrap(),
            subscribe_frame(&["alert", "metrics_update"])
        );

        server.push(json!({ "type": "metrics_update", "data": 1 }));

        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(rx.recv().await.unwrap().0);
        }
        seen.sort_unstable();
        assert_eq!(seen, ["a", "b", "c"]);

        sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(h.connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_topic_union_changes_while_open() {
        let mut h = harness(config());

        let _first = h.client.subscribe(["metrics_update"], |_| {}).unwrap();
        let mut server = h.accept().await;
        assert_eq!(
            server.next_sent().await.unwrap(),
            subscribe_frame(&["metrics_update"])
        );

        let second = h.client.subscribe(["log_entry"], |_| {}).unwrap();
        assert_eq!(
            server.next_sent().await.unwrap(),
            subscribe_frame(&["log_entry", "metrics_update"])
        );

        let _overlap = h.client.subscribe(["metrics_update"], |_| {}).unwrap();

        h.client.unsubscribe(second);
        assert_eq!(
            server.next_sent().await.unwrap(),
            json!({ "type": "unsubscribe", "topics": ["log_entry"] })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_does_not_block_later_frames() {
        let mut h = harness(config());
        let (tx, mut rx) = mpsc::unbounded_channel();

        h.client.subscribe(["alert"], forward(tx)).unwrap();
        let mut server = h.accept().await;
        server.next_sent().await.unwrap();

        server.push_frame(Frame::Text("{not json".into()));
        server.push(json!({ "type": "alert", "data": { "level": "high" } }));

        let message = rx.recv().await.unwrap();
        assert_eq!(message.payload["level"], "high");
        assert!(h.saw(|e| matches!(e, ClientEvent::DecodeError { .. })));
        assert_eq!(h.client.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_subscriber_does_not_stop_others() {
        let mut h = harness(config());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let bad = h
            .client
            .subscribe(["bad"], |_| panic!("subscriber bug"))
            .unwrap();
        h.client.subscribe(["a", "bad"], forward(tx)).unwrap();
        let mut server = h.accept().await;
        server.next_sent().await.unwrap();

        server.push(json!({ "type": "bad", "data": 1 }));
        server.push(json!({ "type": "a", "data": 2 }));

        assert_eq!(rx.recv().await.unwrap().topic, "bad");
        assert_eq!(rx.recv().await.unwrap().topic, "a");
        assert!(h.saw(|e| matches!(
            e,
            ClientEvent::HandlerPanicked { subscription, topic }
                if *subscription == bad && topic == "bad"
        )));

        assert_eq!(h.client.state(), ConnectionState::Open);
        assert!(h.client.subscribe(["c"], |_| {}).is_ok());
        assert_eq!(
            server.next_sent().await.unwrap(),
            subscribe_frame(&["a", "bad", "c"])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_ping_is_answered() {
        let mut h = harness(config());
        let (tx, mut rx) = mpsc::unbounded_channel();

        h.client.subscribe(["alert"], forward(tx)).unwrap();
        let mut server = h.accept().await;
        server.next_sent().await.unwrap();

        server.push(json!({ "type": "ping" }));
        assert_eq!(server.next_sent().await.unwrap(), json!({ "type": "pong" }));

        server.push(json!({ "type": "subscribed", "topics": ["alert"] }));
        sleep(Duration::from_millis(10)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_connection_is_replaced() {
        let config = config().with_heartbeat(Duration::from_secs(10), Duration::from_secs(25));
        let mut h = harness(config);

        h.client.subscribe(["metrics_update"], |_| {}).unwrap();
        let mut server = h.accept().await;

        let _replacement = h.accept().await;

        let sent = server.drain_sent();
        assert_eq!(sent[0], subscribe_frame(&["metrics_update"]));
        assert!(sent.contains(&json!({ "type": "ping" })));
        assert!(server.client_closed());
        assert!(h.saw(|e| matches!(
            e,
            ClientEvent::Disconnected { reason } if reason == "heartbeat timeout"
        )));
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_traffic_keeps_connection_alive() {
        let config = config().with_heartbeat(Duration::from_secs(10), Duration::from_secs(25));
        let mut h = harness(config);
        let (tx, mut rx) = mpsc::unbounded_channel();

        h.client.subscribe(["metrics_update"], forward(tx)).unwrap();
        let server = h.accept().await;

        for _ in 0..6 {
            sleep(Duration::from_secs(15)).await;
            server.push(json!({ "type": "metrics_update", "data": 1 }));
            rx.recv().await.unwrap();
        }

        assert_eq!(h.connector.attempts(), 1);
        assert_eq!(h.client.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_then_reset() {
        let mut h = harness(config());

        h.client.subscribe(["alert"], |_| {}).unwrap();
        let mut server = h.accept().await;

        h.connector
            .script([Outcome::Refuse, Outcome::Refuse, Outcome::Refuse]);
        server.disconnect();

        h.client
            .wait_for_state(|state| state == ConnectionState::Failed { attempts: 3 })
            .await
            .unwrap();
        assert_eq!(h.connector.attempts(), 4);
        assert!(h.saw(|e| matches!(e, ClientEvent::ReconnectExhausted { attempts: 3 })));

        sleep(Duration::from_secs(60)).await;
        assert_eq!(h.connector.attempts(), 4);
        assert!(h.client.is_degraded());
        assert!(matches!(
            h.client.send_json(json!({ "type": "custom" })),
            Err(Error::ReconnectExhausted { attempts: 3 })
        ));

        h.client.reset();
        let mut server = h.accept().await;
        assert_eq!(server.next_sent().await.unwrap(), subscribe_frame(&["alert"]));
        h.client
            .wait_for_state(|state| state.is_open())
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_delays_grow() {
        let mut h = harness(config());

        h.client.subscribe(["alert"], |_| {}).unwrap();
        let mut server = h.accept().await;

        h.connector.script([Outcome::Refuse, Outcome::Refuse]);
        server.disconnect();

        let _server = h.accept().await;

        let delays: Vec<_> = h
            .events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ClientEvent::ReconnectScheduled { delay, .. } => Some(*delay),
                _ => None,
            })
            .collect();
        assert_eq!(
            delays,
            [
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(300)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_cancels_pending_reconnect() {
        let mut h = harness(config());

        let id = h.client.subscribe(["alert"], |_| {}).unwrap();
        let mut server = h.accept().await;

        server.disconnect();
        h.client
            .wait_for_state(|state| matches!(state, ConnectionState::Reconnecting { .. }))
            .await
            .unwrap();

        h.client.unsubscribe(id);
        h.client
            .wait_for_state(|state| state == ConnectionState::Idle)
            .await
            .unwrap();

        sleep(Duration::from_secs(10)).await;
        assert_eq!(h.connector.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out() {
        let mut h = harness(config());
        h.connector.script([Outcome::Hang]);

        h.client.subscribe(["alert"], |_| {}).unwrap();
        let _server = h.accept().await;

        assert_eq!(h.connector.attempts(), 2);
        assert!(h.saw(|e| matches!(
            e,
            ClientEvent::TransportError { message } if message.contains("timeout")
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_triggers_reconnect() {
        let mut h = harness(config());

        h.client.subscribe(["alert"], |_| {}).unwrap();
        let mut server = h.accept().await;
        server.fail();

        let mut server = h.accept().await;
        assert_eq!(server.next_sent().await.unwrap(), subscribe_frame(&["alert"]));
        assert!(h.saw(|e| matches!(e, ClientEvent::TransportError { .. })));
        assert!(h.saw(|e| matches!(e, ClientEvent::Disconnected { .. })));
    }
}
