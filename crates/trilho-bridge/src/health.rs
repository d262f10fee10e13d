//! `/health` and `/status` response bodies.

use std::net::SocketAddr;
use std::time::Instant;

use serde::Serialize;
use trilho_core::PositionValue;

use crate::hub::{BroadcastHub, HubStats};

/// `/health` body.
#[derive(Clone, Debug, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is running.
    pub status: &'static str,
    /// Seconds since the bridge started.
    pub uptime_secs: u64,
    /// Current WebSocket connection count.
    pub connections: usize,
}

/// Build a health response from live counters.
pub fn health_check(start_time: Instant, connections: usize) -> HealthResponse {
    HealthResponse {
        status: "ok",
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
    }
}

/// `/status` body, describing the bridge to control panels.
#[derive(Clone, Debug, Serialize)]
pub struct StatusResponse {
    /// `"running"`, or `"stopping"` once shutdown has begun.
    pub status: &'static str,
    /// Bound UDP address, if the listener is up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp_addr: Option<SocketAddr>,
    /// Connected WebSocket clients.
    pub clients: usize,
    /// Last accepted position.
    pub last_position: Option<PositionValue>,
    /// Hub counters.
    pub stats: HubStats,
}

/// Snapshot the hub into a status response.
pub fn status_report(
    hub: &BroadcastHub,
    udp_addr: Option<SocketAddr>,
    stopping: bool,
) -> StatusResponse {
    StatusResponse {
        status: if stopping { "stopping" } else { "running" },
        udp_addr,
        clients: hub.connection_count(),
        last_position: hub.last_position(),
        stats: hub.stats(),
    }
}
