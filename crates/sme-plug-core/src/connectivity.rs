use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::api::Backend;
use crate::state::ConnectivityState;

/// Background health poller. Probes immediately, then every `interval`.
///
/// The polling task is aborted on [`ConnectivityMonitor::shutdown`] or drop.
pub struct ConnectivityMonitor {
    state: watch::Receiver<ConnectivityState>,
    task: JoinHandle<()>,
}

impl ConnectivityMonitor {
    pub fn spawn(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        let (tx, rx) = watch::channel(ConnectivityState::Offline);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let next = probe(backend.as_ref()).await;
                tx.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    info!(?next, "connectivity changed");
                    *current = next;
                    true
                });
            }
        });

        Self { state: rx, task }
    }

    pub fn state(&self) -> ConnectivityState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.state.clone()
    }

    pub fn shutdown(self) {
        self.task.abort();
        info!("connectivity monitor stopped");
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// One health probe. Failures mean offline, never an error.
pub async fn probe(backend: &dyn Backend) -> ConnectivityState {
    match backend.health().await {
        Ok(report) if report.is_ok() => ConnectivityState::Online,
        Ok(report) => {
            debug!(status = %report.status, "backend reports not ok");
            ConnectivityState::Offline
        }
        Err(err) => {
            debug!(error = %err, "health probe failed");
            ConnectivityState::Offline
        }
    }
}
