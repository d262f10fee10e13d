//! Ping/pong liveness checks for browser connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tokio_util::sync::CancellationToken;

use super::connection::ClientConnection;

/// How the heartbeat loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeartbeatResult {
    /// No pong arrived within the timeout window.
    TimedOut,
    /// The connection was torn down for another reason.
    Cancelled,
}

/// Number of consecutive silent intervals tolerated before timing out.
fn max_missed(interval: Duration, timeout: Duration) -> u128 {
    (timeout.as_millis() / interval.as_millis().max(1)).max(1)
}

/// Watch a connection's alive flag until it goes quiet or `cancel` fires.
///
/// The flag is consumed on every tick; the reader task sets it again when a
/// pong arrives. Pings themselves are sent by the writer task.
pub async fn run_heartbeat(
    connection: Arc<ClientConnection>,
    interval: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> HeartbeatResult {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    let limit = max_missed(interval, timeout);
    let mut missed: u128 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if connection.check_alive() {
                    missed = 0;
                } else {
                    missed += 1;
                    if missed >= limit {
                        return HeartbeatResult::TimedOut;
                    }
                }
            }
            () = cancel.cancelled() => return HeartbeatResult::Cancelled,
        }
    }
}
