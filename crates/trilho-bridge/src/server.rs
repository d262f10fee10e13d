//! `BridgeServer`: UDP listener plus the Axum HTTP/WebSocket server.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use trilho_core::PositionValue;

use crate::config::BridgeConfig;
use crate::errors::{BridgeError, Transport};
use crate::health::{self, HealthResponse, StatusResponse};
use crate::hub::BroadcastHub;
use crate::shutdown::{ListenerTask, STOP_GRACE, drain_listeners};
use crate::udp::UdpListener;
use crate::websocket::handler::{ConnectionSettings, handle_connection};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Fan-out point for positions.
    pub hub: Arc<BroadcastHub>,
    /// Server configuration.
    pub config: Arc<BridgeConfig>,
    /// Fires when the bridge starts stopping.
    pub stop: CancellationToken,
    /// When the server was created.
    pub start_time: Instant,
    /// Bound UDP address, set once `listen` succeeds.
    pub udp_addr: Arc<OnceLock<SocketAddr>>,
}

/// The position bridge.
pub struct BridgeServer {
    config: Arc<BridgeConfig>,
    hub: Arc<BroadcastHub>,
    stop: CancellationToken,
    start_time: Instant,
    udp_addr: Arc<OnceLock<SocketAddr>>,
}

impl BridgeServer {
    /// Create a server with an empty hub. Nothing is bound until [`listen`](Self::listen).
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config: Arc::new(config),
            hub: Arc::new(BroadcastHub::new()),
            stop: CancellationToken::new(),
            start_time: Instant::now(),
            udp_addr: Arc::new(OnceLock::new()),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            config: Arc::clone(&self.config),
            stop: self.stop.clone(),
            start_time: self.start_time,
            udp_addr: Arc::clone(&self.udp_addr),
        };

        Router::new()
            .route("/", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/position", post(position_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind both sockets and start serving.
    ///
    /// The UDP socket is bound first; failure to bind either listener is
    /// returned as a fatal [`BridgeError::Bind`].
    pub async fn listen(&self) -> Result<BridgeHandle, BridgeError> {
        let udp = UdpListener::bind(&self.config.udp_addr(), self.config.max_datagram_bytes).await?;
        let udp_addr = udp.local_addr()?;
        let _ = self.udp_addr.set(udp_addr);

        let ws_bind = self.config.ws_addr();
        let listener = TcpListener::bind(&ws_bind)
            .await
            .map_err(|source| BridgeError::Bind {
                transport: Transport::WebSocket,
                addr: ws_bind.clone(),
                source,
            })?;
        let ws_addr = listener.local_addr()?;

        info!(%udp_addr, %ws_addr, "position bridge listening");

        let udp_task = ListenerTask::spawn(
            Transport::Udp,
            udp.run(Arc::clone(&self.hub), self.stop.clone()),
        );

        let app = self.router();
        let token = self.stop.clone();
        let http_task = ListenerTask::spawn(Transport::WebSocket, async move {
            let served = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;
            if let Err(e) = served {
                error!(error = %e, "HTTP server failed");
            }
        });

        Ok(BridgeHandle {
            udp_addr,
            ws_addr,
            stop: self.stop.clone(),
            listeners: vec![udp_task, http_task],
        })
    }

    /// The hub shared with every connection.
    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    /// Whether [`BridgeHandle::stop`] has been called.
    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// The server configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

/// Handle to a running bridge.
pub struct BridgeHandle {
    /// Bound UDP address.
    pub udp_addr: SocketAddr,
    /// Bound WebSocket/HTTP address.
    pub ws_addr: SocketAddr,
    stop: CancellationToken,
    listeners: Vec<ListenerTask>,
}

impl BridgeHandle {
    /// `ws://` URL of the WebSocket endpoint.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/", self.ws_addr)
    }

    /// Stop accepting, close every client and wait for both listeners.
    ///
    /// Listeners still running after [`STOP_GRACE`] are aborted.
    pub async fn stop(self) {
        self.stop.cancel();
        let report = drain_listeners(self.listeners, STOP_GRACE).await;
        info!(aborted = report.aborted.len(), "position bridge stopped");
    }
}

/// GET / (WebSocket upgrade)
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    if state.stop.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let clients = state.hub.connection_count();
    if clients >= state.config.max_connections {
        warn!(%peer, clients, limit = state.config.max_connections, "refusing WebSocket upgrade");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    }

    let settings = ConnectionSettings {
        send_queue: state.config.send_queue,
        heartbeat_interval: state.config.heartbeat_interval(),
        heartbeat_timeout: state.config.heartbeat_timeout(),
    };
    let token = state.stop.clone();
    ws.on_upgrade(move |socket| async move {
        let _ = handle_connection(socket, Some(peer), state.hub, settings, token).await;
    })
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.connection_count(),
    ))
}

/// GET /status
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(health::status_report(
        &state.hub,
        state.udp_addr.get().copied(),
        state.stop.is_cancelled(),
    ))
}

/// Body of `POST /position`.
#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    /// Candidate position in `[0, 1]`.
    pub position: f64,
}

#[derive(Debug, Serialize)]
struct PositionAccepted {
    success: bool,
    position: PositionValue,
    clients: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorBody { error })).into_response()
}

/// POST /position
async fn position_handler(
    State(state): State<AppState>,
    body: Result<Json<PositionRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    match PositionValue::new(req.position) {
        Ok(value) => {
            let clients = state.hub.record_and_broadcast(value);
            debug!(value = value.get(), clients, "HTTP position accepted");
            Json(PositionAccepted {
                success: true,
                position: value,
                clients,
            })
            .into_response()
        }
        Err(e) => {
            state.hub.record_rejected();
            debug!(reason = e.error_kind(), "HTTP position rejected: {e}");
            bad_request(e.to_string())
        }
    }
}
