//! Broadcast hub: the single owner of the connection set and the last known
//! position.
//!
//! Every mutation goes through one short critical section that never awaits,
//! so registration, recording and removal are totally ordered. A client that
//! joins after a broadcast gets that value as catch-up; a client that joins
//! before it gets the broadcast itself. Sends are non-blocking `try_send`s
//! into per-client queues, so one slow client never holds up the rest.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};
use trilho_core::{BridgeMessage, PositionMessage, PositionValue};

use crate::websocket::connection::ClientConnection;

struct HubState {
    connections: HashMap<String, Arc<ClientConnection>>,
    last_position: Option<PositionValue>,
}

#[derive(Default)]
struct HubCounters {
    accepted: AtomicU64,
    rejected: AtomicU64,
    broadcasts: AtomicU64,
    dropped_sends: AtomicU64,
}

/// Snapshot of hub activity counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Positions accepted (UDP or HTTP).
    pub positions_accepted: u64,
    /// Payloads rejected by validation.
    pub positions_rejected: u64,
    /// Messages fanned out, one per accepted position.
    pub broadcasts: u64,
    /// Per-client sends skipped because the queue was full or closed.
    pub dropped_sends: u64,
}

/// Fan-out point for position updates.
pub struct BroadcastHub {
    state: Mutex<HubState>,
    counters: HubCounters,
}

impl BroadcastHub {
    /// Create an empty hub with no last known position.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState {
                connections: HashMap::new(),
                last_position: None,
            }),
            counters: HubCounters::default(),
        }
    }

    /// Store `value` as the last known position and send it to every client.
    ///
    /// Clients whose queue is full or closed are skipped, not retried and not
    /// removed. Returns the number of clients that accepted the message.
    pub fn record_and_broadcast(&self, value: PositionValue) -> usize {
        let mut state = self.state.lock();
        state.last_position = Some(value);
        let _ = self.counters.accepted.fetch_add(1, Ordering::Relaxed);

        let Some(json) = encode(value) else {
            return 0;
        };
        let _ = self.counters.broadcasts.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        for conn in state.connections.values() {
            if conn.send(Arc::clone(&json)) {
                delivered += 1;
            } else {
                let _ = self.counters.dropped_sends.fetch_add(1, Ordering::Relaxed);
                warn!(conn_id = %conn.id, "failed to queue position for client");
            }
        }
        debug!(
            value = value.get(),
            recipients = state.connections.len(),
            delivered,
            "broadcast position"
        );
        delivered
    }

    /// Add a client and, if a position is known, send it to that client alone.
    ///
    /// Returns the catch-up value that was queued, if any. Registering an ID
    /// that is already present replaces the previous connection.
    pub fn register_client(&self, connection: Arc<ClientConnection>) -> Option<PositionValue> {
        let mut state = self.state.lock();
        let catch_up = state.last_position;
        if let Some(value) = catch_up {
            if let Some(json) = encode(value) {
                if !connection.send(json) {
                    let _ = self.counters.dropped_sends.fetch_add(1, Ordering::Relaxed);
                    warn!(conn_id = %connection.id, "failed to queue catch-up position");
                }
            }
        }
        let _ = state.connections.insert(connection.id.clone(), connection);
        catch_up
    }

    /// Remove a client. Removing an absent client is a no-op.
    ///
    /// Returns whether a connection was removed.
    pub fn unregister_client(&self, connection_id: &str) -> bool {
        self.state.lock().connections.remove(connection_id).is_some()
    }

    /// Count a payload that failed validation.
    pub fn record_rejected(&self) {
        let _ = self.counters.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// The most recently validated position, if any.
    pub fn last_position(&self) -> Option<PositionValue> {
        self.state.lock().last_position
    }

    /// Number of registered clients.
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Current counter values.
    pub fn stats(&self) -> HubStats {
        HubStats {
            positions_accepted: self.counters.accepted.load(Ordering::Relaxed),
            positions_rejected: self.counters.rejected.load(Ordering::Relaxed),
            broadcasts: self.counters.broadcasts.load(Ordering::Relaxed),
            dropped_sends: self.counters.dropped_sends.load(Ordering::Relaxed),
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize a freshly stamped position message.
fn encode(value: PositionValue) -> Option<Arc<String>> {
    match BridgeMessage::from(PositionMessage::now(value)).to_json() {
        Ok(json) => Some(Arc::new(json)),
        Err(e) => {
            warn!(error = %e, "failed to serialize position message");
            None
        }
    }
}
