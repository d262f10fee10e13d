//! Reconnecting bridge consumer.
//!
//! One driver task owns the socket and the reconnect timer and walks the
//! state machine sequentially:
//!
//! ```text
//!  Disabled ──enable──▶ Connecting ──ok──▶ Connected
//!     ▲                    │  ▲                │
//!     │                 fail  └──delay── Reconnecting ◀── lost
//!     └────────────── disable (from any state) ─┘
//! ```
//!
//! Because nothing else touches the socket or the timer, there is never more
//! than one of either.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trilho_core::{BridgeMessage, PositionScale, PositionValue};

use crate::errors::ConsumerError;
use crate::options::ConsumerOptions;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

type BridgeSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Where the consumer is in its connection lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; waiting to be enabled.
    Disabled,
    /// Handshake in progress.
    Connecting,
    /// Socket open and receiving positions.
    Connected,
    /// Waiting out the reconnect delay.
    Reconnecting,
}

/// Handle to a running consumer.
///
/// Dropping the handle stops the consumer and closes its socket.
pub struct BridgeConsumer {
    enabled: watch::Sender<bool>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl BridgeConsumer {
    /// Start a consumer that calls `on_position_change` with each new,
    /// distinct position, scaled per [`ConsumerOptions::scale`].
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn<F>(options: ConsumerOptions, on_position_change: F) -> Result<Self, ConsumerError>
    where
        F: FnMut(f64) + Send + 'static,
    {
        options.validate()?;

        let (enabled_tx, enabled_rx) = watch::channel(options.enabled);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disabled);
        let cancel = CancellationToken::new();

        let driver = Driver {
            url: options.url,
            reconnect_delay: options.reconnect_delay,
            scale: options.scale,
            on_position_change,
            last_delivered: None,
            enabled: enabled_rx,
            state: state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run());

        Ok(Self {
            enabled: enabled_tx,
            state: state_rx,
            cancel,
            task: Some(task),
        })
    }

    /// Turn the consumer on or off.
    ///
    /// Disabling closes any open or opening socket and cancels a pending
    /// reconnect. Re-enabling while a reconnect is pending connects at once.
    pub fn set_enabled(&self, enabled: bool) {
        let _ = self.enabled.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        });
    }

    /// Same as `set_enabled(false)`.
    pub fn disconnect(&self) {
        self.set_enabled(false);
    }

    /// Whether the consumer is enabled.
    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Whether a socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stop the consumer and wait for its socket to close.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for BridgeConsumer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum SessionEnd {
    Lost,
    Disabled,
    Cancelled,
}

struct Driver<F> {
    url: String,
    reconnect_delay: Duration,
    scale: PositionScale,
    on_position_change: F,
    last_delivered: Option<PositionValue>,
    enabled: watch::Receiver<bool>,
    state: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl<F> Driver<F>
where
    F: FnMut(f64) + Send + 'static,
{
    async fn run(mut self) {
        while !self.cancel.is_cancelled() {
            if !*self.enabled.borrow_and_update() {
                self.set_state(ConnectionState::Disabled);
                tokio::select! {
                    changed = self.enabled.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    () = self.cancel.cancelled() => break,
                }
                continue;
            }

            self.set_state(ConnectionState::Connecting);
            let socket = tokio::select! {
                res = connect_async(self.url.as_str()) => match res {
                    Ok((socket, _)) => Some(socket),
                    Err(e) => {
                        let err = ConsumerError::from(e);
                        warn!(url = %self.url, error = %err, "bridge connection failed");
                        None
                    }
                },
                () = disabled(&mut self.enabled) => continue,
                () = self.cancel.cancelled() => break,
            };

            if let Some(mut socket) = socket {
                self.set_state(ConnectionState::Connected);
                info!(url = %self.url, "connected to position bridge");
                match self.session(&mut socket).await {
                    SessionEnd::Disabled => {
                        close_quietly(socket).await;
                        info!(url = %self.url, "disconnected from position bridge");
                        continue;
                    }
                    SessionEnd::Cancelled => {
                        close_quietly(socket).await;
                        break;
                    }
                    SessionEnd::Lost => {
                        warn!(url = %self.url, "lost connection to position bridge");
                    }
                }
            }

            self.set_state(ConnectionState::Reconnecting);
            debug!(delay_ms = self.reconnect_delay.as_millis(), "scheduling reconnect");
            tokio::select! {
                () = tokio::time::sleep(self.reconnect_delay) => {}
                // re-evaluated at the top of the loop
                _ = self.enabled.changed() => {}
                () = self.cancel.cancelled() => break,
            }
        }
        self.set_state(ConnectionState::Disabled);
    }

    async fn session(&mut self, socket: &mut BridgeSocket) -> SessionEnd {
        loop {
            tokio::select! {
                msg = socket.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()),
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "bridge sent close");
                        return SessionEnd::Lost;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "bridge socket error");
                        return SessionEnd::Lost;
                    }
                    None => return SessionEnd::Lost,
                },
                () = disabled(&mut self.enabled) => return SessionEnd::Disabled,
                () = self.cancel.cancelled() => return SessionEnd::Cancelled,
            }
        }
    }

    fn handle_text(&mut self, text: &str) {
        let value = match BridgeMessage::from_json(text) {
            Ok(BridgeMessage::Position(msg)) => msg.value,
            Err(e) => {
                debug!(error = %e, "skipping message from bridge");
                return;
            }
        };
        if self.last_delivered == Some(value) {
            return;
        }
        self.last_delivered = Some(value);
        (self.on_position_change)(value.scaled(self.scale));
    }

    fn set_state(&self, next: ConnectionState) {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            debug!(state = ?next, "consumer state changed");
        }
    }
}

/// Resolves once the enabled flag reads `false` or its sender is gone.
async fn disabled(enabled: &mut watch::Receiver<bool>) {
    let _ = enabled.wait_for(|on| !*on).await;
}

async fn close_quietly(mut socket: BridgeSocket) {
    if tokio::time::timeout(CLOSE_TIMEOUT, socket.close(None)).await.is_err() {
        debug!("timed out closing bridge socket");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    const TIMEOUT: Duration = Duration::from_secs(5);

    type ServerSocket = WebSocketStream<TcpStream>;

    /// Minimal bridge stand-in that hands each accepted socket to the test.
    async fn test_bridge() -> (String, mpsc::UnboundedReceiver<ServerSocket>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/", listener.local_addr().unwrap());
        let (tx, rx) = mpsc::unbounded_channel();
        let _server = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                if let Ok(ws) = accept_async(stream).await {
                    if tx.send(ws).is_err() {
                        break;
                    }
                }
            }
        });
        (url, rx)
    }

    fn options(url: &str, delay_ms: u64) -> ConsumerOptions {
        ConsumerOptions {
            reconnect_delay: Duration::from_millis(delay_ms),
            ..ConsumerOptions::new(url)
        }
    }

    fn spawn_recording(opts: ConsumerOptions) -> (BridgeConsumer, mpsc::UnboundedReceiver<f64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let consumer = BridgeConsumer::spawn(opts, move |v| {
            let _ = tx.send(v);
        })
        .unwrap();
        (consumer, rx)
    }

    async fn accept(sockets: &mut mpsc::UnboundedReceiver<ServerSocket>) -> ServerSocket {
        timeout(TIMEOUT, sockets.recv()).await.unwrap().unwrap()
    }

    async fn wait_state(consumer: &BridgeConsumer, want: ConnectionState) {
        let mut rx = consumer.subscribe_state();
        let _ = timeout(TIMEOUT, rx.wait_for(|s| *s == want))
            .await
            .unwrap()
            .unwrap();
    }

    async fn send_position(ws: &mut ServerSocket, value: f64) {
        let json = format!(r#"{{"type":"position","value":{value},"timestamp":1700000000000}}"#);
        ws.send(Message::Text(json.into())).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_url_is_rejected() {
        let result = BridgeConsumer::spawn(ConsumerOptions::new("http://127.0.0.1:1/"), |_| {});
        assert!(matches!(result, Err(ConsumerError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn delivers_distinct_scaled_positions() {
        let (url, mut sockets) = test_bridge().await;
        let (consumer, mut values) = spawn_recording(options(&url, 50));
        let mut ws = accept(&mut sockets).await;
        wait_state(&consumer, ConnectionState::Connected).await;
        assert!(consumer.is_connected());

        send_position(&mut ws, 0.25).await;
        send_position(&mut ws, 0.25).await;
        ws.send(Message::Text(r#"{"type":"status"}"#.into())).await.unwrap();
        ws.send(Message::Text("not json".into())).await.unwrap();
        send_position(&mut ws, 2.0).await;
        send_position(&mut ws, 0.5).await;

        assert_eq!(timeout(TIMEOUT, values.recv()).await.unwrap(), Some(25.0));
        assert_eq!(timeout(TIMEOUT, values.recv()).await.unwrap(), Some(50.0));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(values.try_recv().is_err());
    }

    #[tokio::test]
    async fn unit_scale_passes_wire_value() {
        let (url, mut sockets) = test_bridge().await;
        let opts = ConsumerOptions {
            scale: PositionScale::Unit,
            ..options(&url, 50)
        };
        let (_consumer, mut values) = spawn_recording(opts);
        let mut ws = accept(&mut sockets).await;
        send_position(&mut ws, 0.42).await;
        assert_eq!(timeout(TIMEOUT, values.recv()).await.unwrap(), Some(0.42));
    }

    #[tokio::test]
    async fn starts_disabled_until_enabled() {
        let (url, mut sockets) = test_bridge().await;
        let opts = ConsumerOptions {
            enabled: false,
            ..options(&url, 50)
        };
        let (consumer, _values) = spawn_recording(opts);
        assert!(!consumer.is_enabled());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sockets.try_recv().is_err());
        assert_eq!(consumer.state(), ConnectionState::Disabled);

        consumer.set_enabled(true);
        let _ws = accept(&mut sockets).await;
        wait_state(&consumer, ConnectionState::Connected).await;
    }

    #[tokio::test]
    async fn reconnects_after_server_drops_socket() {
        let (url, mut sockets) = test_bridge().await;
        let (consumer, mut values) = spawn_recording(options(&url, 50));
        let mut first = accept(&mut sockets).await;
        send_position(&mut first, 0.3).await;
        assert_eq!(timeout(TIMEOUT, values.recv()).await.unwrap(), Some(30.0));

        drop(first);
        let mut second = accept(&mut sockets).await;
        wait_state(&consumer, ConnectionState::Connected).await;

        // duplicates are suppressed across reconnects
        send_position(&mut second, 0.3).await;
        send_position(&mut second, 0.4).await;
        assert_eq!(timeout(TIMEOUT, values.recv()).await.unwrap(), Some(40.0));
    }

    #[tokio::test]
    async fn disable_closes_socket_and_stops_reconnecting() {
        let (url, mut sockets) = test_bridge().await;
        let (consumer, _values) = spawn_recording(options(&url, 20));
        let mut ws = accept(&mut sockets).await;
        wait_state(&consumer, ConnectionState::Connected).await;

        consumer.disconnect();
        assert!(!consumer.is_enabled());
        wait_state(&consumer, ConnectionState::Disabled).await;

        let closed = timeout(TIMEOUT, async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(sockets.try_recv().is_err());
    }

    #[tokio::test]
    async fn toggle_during_reconnect_opens_one_socket() {
        let (url, mut sockets) = test_bridge().await;
        let (consumer, _values) = spawn_recording(options(&url, 300));
        let first = accept(&mut sockets).await;
        wait_state(&consumer, ConnectionState::Connected).await;

        drop(first);
        wait_state(&consumer, ConnectionState::Reconnecting).await;
        consumer.set_enabled(false);
        consumer.set_enabled(true);

        let _second = accept(&mut sockets).await;
        wait_state(&consumer, ConnectionState::Connected).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(sockets.try_recv().is_err());
    }

    #[tokio::test]
    async fn unreachable_bridge_keeps_retrying() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (consumer, _values) = spawn_recording(options(&format!("ws://{addr}/"), 20));
        wait_state(&consumer, ConnectionState::Reconnecting).await;
        assert!(!consumer.is_connected());
        assert!(consumer.is_enabled());
    }

    #[tokio::test]
    async fn shutdown_closes_socket() {
        let (url, mut sockets) = test_bridge().await;
        let (consumer, _values) = spawn_recording(options(&url, 20));
        let mut ws = accept(&mut sockets).await;
        wait_state(&consumer, ConnectionState::Connected).await;

        let state = consumer.subscribe_state();
        consumer.shutdown().await;
        assert_eq!(*state.borrow(), ConnectionState::Disabled);

        let end = timeout(TIMEOUT, ws.next()).await.unwrap();
        assert!(matches!(end, Some(Ok(Message::Close(_))) | None | Some(Err(_))));
    }
}
