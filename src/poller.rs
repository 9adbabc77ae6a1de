use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::device::NestDevice;
use crate::transport::Transport;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Handle to a running poll loop.
pub struct Poller {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Stops scheduling new refreshes and waits for the loop to exit. A
    /// refresh already in progress runs to completion.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("poller task failed: {e}");
        }
    }
}

/// Refreshes `device` every `interval` on a background task. Host writes
/// lock the same mutex, so polls and writes never interleave.
pub fn spawn_poller<T: Transport + 'static>(
    device: Arc<Mutex<NestDevice<T>>>,
    interval: Duration,
) -> Poller {
    let (shutdown, mut stop) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = stop.changed() => break,
                _ = ticker.tick() => {
                    let mut device = device.lock().await;
                    let result = device.refresh().await.map(|_| ());
                    if let Err(e) = result {
                        warn!(device = device.name(), error = %e, "poll failed");
                    }
                }
            }
        }
        debug!("poller stopped");
    });

    Poller { shutdown, handle }
}
