//! Resolver change events.
//!
//! Events carry no payload; observers read the `current_*` state through a
//! [`ScheduleHandle`](super::agent::ScheduleHandle) after the event lands.
//! The state is always updated before the event is emitted.

use tokio::sync::broadcast;
use tracing::trace;

/// One notification from the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEvent {
    /// The resolved layout or overlay set changed; the renderer must swap.
    NewScheduleAvailable,
    /// A tick completed with no material change.
    RefreshSchedule,
    /// End-of-tick marker, emitted after the lock is released.
    CheckComplete,
}

/// Broadcast fan-out for schedule events.
#[derive(Debug, Clone)]
pub struct ScheduleEvents {
    sender: broadcast::Sender<ScheduleEvent>,
}

impl ScheduleEvents {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register an observer. Late subscribers only see subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ScheduleEvent) {
        // No receivers is normal during startup and shutdown.
        if self.sender.send(event).is_err() {
            trace!(target: "schedule::events", ?event, "no observers for event");
        }
    }
}

impl Default for ScheduleEvents {
    fn default() -> Self {
        Self::new(64)
    }
}
