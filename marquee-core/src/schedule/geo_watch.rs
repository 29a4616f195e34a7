//! Geolocation watcher adapter.
//!
//! Converts coordinate updates into "schedule is stale" pulses: the first
//! valid fix, and any later fix far enough from the stored one, records the
//! position and wakes the resolver. Driver trouble is logged and worked
//! around, never fatal.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ports::{GeoUpdate, PositionSource, WatcherStatus};
use crate::schedule::agent::ScheduleHandle;

/// Subscribes to a [`PositionSource`] and feeds fixes into the resolver.
pub struct GeoWatcher {
    handle: ScheduleHandle,
    source: Arc<dyn PositionSource>,
    refresh_distance_m: f64,
    shutdown: CancellationToken,
}

impl fmt::Debug for GeoWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoWatcher")
            .field("refresh_distance_m", &self.refresh_distance_m)
            .finish_non_exhaustive()
    }
}

impl GeoWatcher {
    /// `refresh_distance_m` is the movement threshold beyond which the
    /// schedule is considered stale.
    pub fn new(
        handle: ScheduleHandle,
        source: Arc<dyn PositionSource>,
        refresh_distance_m: f64,
    ) -> Self {
        let shutdown = handle.shutdown_token();
        Self {
            handle,
            source,
            refresh_distance_m,
            shutdown,
        }
    }

    /// Run the watcher on its own task. It stops with the agent.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut updates = match self.source.subscribe().await {
            Ok(updates) => updates,
            Err(err) => {
                warn!(target: "schedule::geo", error = %err, "position source unavailable, geo gating disabled");
                return;
            }
        };
        info!(target: "schedule::geo", "geo watcher started");

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                update = updates.recv() => match update {
                    Some(GeoUpdate::Fix(fix)) => self.on_fix(fix),
                    Some(GeoUpdate::Status(WatcherStatus::Active)) => {}
                    Some(GeoUpdate::Status(WatcherStatus::Disabled)) => {
                        warn!(target: "schedule::geo", "position watcher disabled, attempting restart");
                        match self.source.subscribe().await {
                            Ok(fresh) => updates = fresh,
                            Err(err) => {
                                warn!(target: "schedule::geo", error = %err, "position watcher restart failed");
                            }
                        }
                    }
                    None => {
                        info!(target: "schedule::geo", "position stream ended");
                        break;
                    }
                }
            }
        }
        info!(target: "schedule::geo", "geo watcher stopped");
    }

    fn on_fix(&self, fix: marquee_model::PlayerPosition) {
        if fix.is_unknown() {
            return;
        }
        if self.handle.update_position(fix, self.refresh_distance_m) {
            debug!(
                target: "schedule::geo",
                latitude = fix.latitude,
                longitude = fix.longitude,
                "position moved, schedule marked stale"
            );
        }
    }
}

/// Convenience [`PositionSource`] backed by a channel, for hosts that push
/// fixes from a platform callback.
#[derive(Debug)]
pub struct ChannelPositionSource {
    sender: parking_lot::Mutex<Option<mpsc::Sender<GeoUpdate>>>,
    capacity: usize,
}

impl ChannelPositionSource {
    pub fn new(capacity: usize) -> Self {
        Self {
            sender: parking_lot::Mutex::new(None),
            capacity,
        }
    }

    /// Push one update; dropped when nobody has subscribed yet or the
    /// watcher lags behind.
    pub fn push(&self, update: GeoUpdate) {
        let sender = self.sender.lock().clone();
        if let Some(sender) = sender
            && sender.try_send(update).is_err()
        {
            debug!(target: "schedule::geo", "dropping position update, watcher lagging");
        }
    }
}

#[async_trait::async_trait]
impl PositionSource for ChannelPositionSource {
    async fn subscribe(&self) -> crate::error::Result<mpsc::Receiver<GeoUpdate>> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        *self.sender.lock() = Some(sender);
        Ok(receiver)
    }
}
