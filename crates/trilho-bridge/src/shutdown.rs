//! Stopping the bridge's listener tasks.
//!
//! Both listeners watch the bridge's stop token. Once it fires they get a
//! shared grace period to wind down; whatever is still running after that
//! is aborted so no listener outlives [`BridgeHandle::stop`](crate::BridgeHandle::stop).

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::errors::Transport;

/// How long [`BridgeHandle::stop`](crate::BridgeHandle::stop) waits before aborting listeners.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// A spawned listener loop.
#[derive(Debug)]
pub struct ListenerTask {
    transport: Transport,
    handle: JoinHandle<()>,
}

impl ListenerTask {
    /// Spawn `fut` as the listener for `transport`.
    pub fn spawn<F>(transport: Transport, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            transport,
            handle: tokio::spawn(fut),
        }
    }

    /// Which socket this task serves.
    pub fn transport(&self) -> Transport {
        self.transport
    }
}

/// Outcome of [`drain_listeners`].
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StopReport {
    /// Listeners that exited on their own, panicked ones included.
    pub finished: Vec<Transport>,
    /// Listeners still running at the deadline.
    pub aborted: Vec<Transport>,
}

/// Wait up to `grace` for every listener, then abort the rest.
///
/// The deadline is shared, so total wait never exceeds `grace`. The stop
/// signal must already have been sent.
pub async fn drain_listeners(tasks: Vec<ListenerTask>, grace: Duration) -> StopReport {
    let deadline = Instant::now() + grace;
    let mut report = StopReport::default();

    for mut task in tasks {
        match tokio::time::timeout_at(deadline, &mut task.handle).await {
            Ok(joined) => {
                if let Err(e) = joined {
                    warn!(transport = %task.transport, error = %e, "listener task failed");
                }
                report.finished.push(task.transport);
            }
            Err(_) => {
                task.handle.abort();
                warn!(transport = %task.transport, ?grace, "listener did not stop in time, aborted");
                report.aborted.push(task.transport);
            }
        }
    }

    info!(
        finished = report.finished.len(),
        aborted = report.aborted.len(),
        "listener tasks drained"
    );
    report
}
