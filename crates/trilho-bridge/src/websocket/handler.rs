//! Per-connection WebSocket lifecycle.
//!
//! Each upgraded socket is split into a writer task (drains the client's
//! outbound queue and sends pings), a reader task (tracks pongs and close
//! frames) and a heartbeat watchdog. Whichever finishes first ends the
//! connection; the client is then removed from the hub.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket, close_code};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use crate::hub::BroadcastHub;

/// How long the writer gets to flush a close frame after the connection ends.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Per-connection knobs taken from [`BridgeConfig`](crate::BridgeConfig).
#[derive(Clone, Copy, Debug)]
pub struct ConnectionSettings {
    /// Outbound queue length.
    pub send_queue: usize,
    /// Ping interval.
    pub heartbeat_interval: Duration,
    /// Silence tolerated before the connection is dropped.
    pub heartbeat_timeout: Duration,
}

/// Why a connection ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame.
    ClientClosed,
    /// The socket errored or ended without a close frame.
    TransportError,
    /// No pong within the heartbeat timeout.
    HeartbeatTimeout,
    /// The bridge is stopping.
    Shutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClientClosed => "client_closed",
            Self::TransportError => "transport_error",
            Self::HeartbeatTimeout => "heartbeat_timeout",
            Self::Shutdown => "shutdown",
        })
    }
}

enum ReadEnd {
    Closed,
    Failed,
}

enum WriteEnd {
    Cancelled,
    Failed,
}

/// Drive one upgraded socket until it disconnects or `shutdown` fires.
pub async fn handle_connection(
    socket: WebSocket,
    peer: Option<SocketAddr>,
    hub: Arc<BroadcastHub>,
    settings: ConnectionSettings,
    shutdown: CancellationToken,
) -> DisconnectReason {
    let (tx, rx) = mpsc::channel(settings.send_queue.max(1));
    let conn = Arc::new(ClientConnection::new(ClientConnection::generate_id(), peer, tx));
    let (ws_tx, ws_rx) = socket.split();

    let catch_up = hub.register_client(Arc::clone(&conn));
    info!(
        conn_id = %conn.id,
        peer = ?conn.peer,
        catch_up = ?catch_up.map(trilho_core::PositionValue::get),
        clients = hub.connection_count(),
        "WebSocket client connected"
    );

    let done = shutdown.child_token();
    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        rx,
        settings.heartbeat_interval,
        done.clone(),
    ));
    let mut reader = tokio::spawn(read_loop(ws_rx, Arc::clone(&conn)));
    let mut heartbeat = tokio::spawn(run_heartbeat(
        Arc::clone(&conn),
        settings.heartbeat_interval,
        settings.heartbeat_timeout,
        done.clone(),
    ));

    let reason = tokio::select! {
        res = &mut reader => match res {
            Ok(ReadEnd::Closed) => DisconnectReason::ClientClosed,
            Ok(ReadEnd::Failed) | Err(_) => DisconnectReason::TransportError,
        },
        res = &mut writer => match res {
            Ok(WriteEnd::Cancelled) => DisconnectReason::Shutdown,
            Ok(WriteEnd::Failed) | Err(_) => DisconnectReason::TransportError,
        },
        res = &mut heartbeat => match res {
            Ok(HeartbeatResult::TimedOut) => DisconnectReason::HeartbeatTimeout,
            Ok(HeartbeatResult::Cancelled) | Err(_) => DisconnectReason::Shutdown,
        },
    };

    let _ = hub.unregister_client(&conn.id);
    done.cancel();
    if !writer.is_finished() && tokio::time::timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        writer.abort();
    }
    reader.abort();
    heartbeat.abort();

    info!(
        conn_id = %conn.id,
        peer = ?conn.peer,
        %reason,
        age_ms = u64::try_from(conn.age().as_millis()).unwrap_or(u64::MAX),
        dropped = conn.drop_count(),
        clients = hub.connection_count(),
        "WebSocket client disconnected"
    );
    reason
}

async fn write_loop(
    mut ws_tx: SplitSink<WebSocket, WsMessage>,
    mut rx: mpsc::Receiver<Arc<String>>,
    ping_every: Duration,
    cancel: CancellationToken,
) -> WriteEnd {
    let mut ping_interval = tokio::time::interval(ping_every);
    let _ = ping_interval.tick().await;

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(text) = msg else {
                    return WriteEnd::Failed;
                };
                if ws_tx.send(WsMessage::Text(text.as_str().to_owned().into())).await.is_err() {
                    return WriteEnd::Failed;
                }
            }
            _ = ping_interval.tick() => {
                if ws_tx.send(WsMessage::Ping(Vec::new().into())).await.is_err() {
                    return WriteEnd::Failed;
                }
                trace!("sent ping");
            }
            () = cancel.cancelled() => {
                let frame = CloseFrame {
                    code: close_code::AWAY,
                    reason: Utf8Bytes::from_static("bridge closing connection"),
                };
                let _ = ws_tx.send(WsMessage::Close(Some(frame))).await;
                let _ = ws_tx.close().await;
                return WriteEnd::Cancelled;
            }
        }
    }
}

async fn read_loop(mut ws_rx: SplitStream<WebSocket>, conn: Arc<ClientConnection>) -> ReadEnd {
    while let Some(msg) = ws_rx.next().await {
        match msg {
            Ok(WsMessage::Pong(_)) => conn.mark_alive(),
            Ok(WsMessage::Close(frame)) => {
                debug!(conn_id = %conn.id, ?frame, "client sent close");
                return ReadEnd::Closed;
            }
            Ok(WsMessage::Text(text)) => {
                debug!(conn_id = %conn.id, len = text.len(), "ignoring inbound text frame");
            }
            Ok(WsMessage::Binary(data)) => {
                debug!(conn_id = %conn.id, len = data.len(), "ignoring inbound binary frame");
            }
            // axum answers pings itself
            Ok(WsMessage::Ping(_)) => {}
            Err(e) => {
                debug!(conn_id = %conn.id, error = %e, "WebSocket read failed");
                return ReadEnd::Failed;
            }
        }
    }
    ReadEnd::Failed
}
