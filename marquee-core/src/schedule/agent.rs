//! The tick loop and its externally facing handle.
//!
//! One long-running task drives resolution: every wake it takes the global
//! state lock, re-reads the schedule document, runs the filter/override/
//! cycle/share-of-voice pipeline, updates the `current_*` state, and emits
//! change events. External threads interact through a cloneable
//! [`ScheduleHandle`] whose setters take the same lock for brief critical
//! sections; a refresh pulse or stop signal short-circuits the inter-tick
//! wait.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use marquee_config::PlayerConfig;
use marquee_model::{
    ItemKey, LayoutChangeAction, OverlayLayoutAction, PlayerPosition, ScheduleAction,
    ScheduleCommand, ScheduleItem,
};
use parking_lot::Mutex;
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{commands, cycle, document, overlay, overrides, resolver, validity};
use crate::error::Result;
use crate::ports::{AdExchange, CommandRunner, DocumentStore, LayoutCache, ScreenshotSink};
use crate::schedule::events::{ScheduleEvent, ScheduleEvents};
use crate::schedule::state::{ResolverState, ScheduleSnapshot};
use crate::schedule::validity::ValidityContext;

/// External services the resolver consumes.
#[derive(Clone)]
pub struct Collaborators {
    pub cache: Arc<dyn LayoutCache>,
    pub exchange: Arc<dyn AdExchange>,
    pub runner: Arc<dyn CommandRunner>,
    pub screenshots: Arc<dyn ScreenshotSink>,
    pub store: Arc<dyn DocumentStore>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("cache", &"LayoutCache")
            .field("exchange", &"AdExchange")
            .field("runner", &"CommandRunner")
            .field("screenshots", &"ScreenshotSink")
            .field("store", &"DocumentStore")
            .finish()
    }
}

/// What one successful tick decided beyond the state mutation.
#[derive(Debug)]
struct TickOutcome {
    changed: bool,
    screenshot_due: bool,
    due_commands: Vec<ScheduleCommand>,
}

/// The schedule resolution agent. Construct once, hand out
/// [`ScheduleHandle`]s, then [`spawn`](Self::spawn).
pub struct ScheduleAgent {
    config: PlayerConfig,
    collaborators: Collaborators,
    state: Arc<Mutex<ResolverState>>,
    events: ScheduleEvents,
    refresh: Arc<Notify>,
    shutdown: CancellationToken,
}

impl fmt::Debug for ScheduleAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleAgent")
            .field("config", &self.config)
            .field("collaborators", &self.collaborators)
            .finish()
    }
}

impl ScheduleAgent {
    pub fn new(config: PlayerConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            collaborators,
            state: Arc::new(Mutex::new(ResolverState::default())),
            events: ScheduleEvents::default(),
            refresh: Arc::new(Notify::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// A cloneable handle for observers and external mutators.
    pub fn handle(&self) -> ScheduleHandle {
        ScheduleHandle {
            state: Arc::clone(&self.state),
            refresh: Arc::clone(&self.refresh),
            shutdown: self.shutdown.clone(),
            store: Arc::clone(&self.collaborators.store),
        }
    }

    /// Register an event observer. Subscribe before spawning to see the
    /// first tick's events.
    pub fn subscribe(&self) -> broadcast::Receiver<ScheduleEvent> {
        self.events.subscribe()
    }

    /// Run the tick loop on its own task.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// The tick loop. Wakes on the base interval, a refresh pulse, or
    /// shutdown; never aborts on a tick error.
    pub async fn run(self) {
        if self.config.adspace_enabled
            && let Err(err) = self.collaborators.exchange.configure().await
        {
            warn!(target: "schedule::agent", error = %err, "ad exchange configuration failed");
        }

        info!(target: "schedule::agent", "schedule agent started");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.tick();

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.refresh.notified() => {
                    debug!(target: "schedule::agent", "woken by refresh pulse");
                }
                _ = tokio::time::sleep(self.config.tick_interval()) => {}
            }
        }
        info!(target: "schedule::agent", "schedule agent stopped");
    }

    /// Run one guarded resolution pass and emit its events.
    ///
    /// Resolution happens entirely under the state lock; the screenshot
    /// upload and command execution it decides on are spawned after the lock
    /// is released.
    pub fn tick(&self) {
        let outcome = {
            let mut state = self.state.lock();
            match self.resolve(&mut state) {
                Ok(outcome) => {
                    state.last_status = "ok".to_string();
                    Some(outcome)
                }
                Err(err) => {
                    warn!(target: "schedule::agent", error = %err, "tick failed");
                    state.last_status = err.to_string();
                    None
                }
            }
        };

        let Some(outcome) = outcome else {
            self.events.emit(ScheduleEvent::CheckComplete);
            return;
        };

        // State is already updated, so observers woken here read new values.
        self.events.emit(if outcome.changed {
            ScheduleEvent::NewScheduleAvailable
        } else {
            ScheduleEvent::RefreshSchedule
        });

        if outcome.screenshot_due {
            let screenshots = Arc::clone(&self.collaborators.screenshots);
            tokio::spawn(async move {
                if let Err(err) = screenshots.capture_and_send().await {
                    warn!(target: "schedule::agent", error = %err, "screenshot upload failed");
                }
            });
        }

        commands::dispatch(outcome.due_commands, Arc::clone(&self.collaborators.runner));

        self.events.emit(ScheduleEvent::CheckComplete);
    }

    /// One resolution pass over the locked state.
    fn resolve(&self, state: &mut ResolverState) -> Result<TickOutcome> {
        let now = Utc::now();

        // Deferred removal of overrides the renderer already played.
        overrides::prune_serviced(state);

        // Re-read the document; the downloader may have replaced it.
        let mut doc = document::load(self.collaborators.store.as_ref())?;
        commands::carry_over_run_flags(&mut doc.commands, &state.commands);

        // Pending injected actions join the candidate lists before filtering.
        doc.layouts
            .extend(overrides::materialize_layout_overrides(&state.layout_change_actions));
        doc.overlays
            .extend(overrides::materialize_overlay_overrides(&state.overlay_layout_actions));

        state.raw_layout_schedule = doc.layouts;
        state.raw_overlay_schedule = doc.overlays;
        state.commands = doc.commands;
        state.raw_actions_schedule = doc.actions;

        let fix = state.last_geo_fix;
        let ctx = ValidityContext {
            cache: self.collaborators.cache.as_ref(),
            now,
            fix: fix.as_ref(),
            expire_modified_layouts: self.config.expire_modified_layouts,
            active_layout_id: state.active_layout_id,
        };

        // Validity, window, and geofence filtering.
        let layout_pass = validity::filter_playable(state.raw_layout_schedule.clone(), &ctx);
        state.invalid_schedule = layout_pass.invalid;
        let default_layout = layout_pass
            .default_layout
            .unwrap_or_else(ScheduleItem::splash);

        // Surviving overrides displace everything else.
        let (override_items, candidates) = overrides::split_overrides(layout_pass.playable);
        let new_schedule = if override_items.is_empty() {
            let mut candidates = candidates;
            if self.config.adspace_enabled {
                let share = self.collaborators.exchange.share_of_voice();
                if share > 0 {
                    candidates.push(resolver::adspace_item(
                        share,
                        self.collaborators.exchange.average_ad_duration(),
                    ));
                }
            }
            let grouped = cycle::group_cycles(candidates);
            resolver::resolve_rotation(grouped, self.collaborators.cache.as_ref(), &default_layout)
        } else {
            override_items
        };
        let new_schedule = if new_schedule.is_empty() {
            vec![default_layout.clone()]
        } else {
            new_schedule
        };

        // Overlays resolve independently of the layout rotation.
        let overlay_pass = validity::filter_playable(state.raw_overlay_schedule.clone(), &ctx);
        state.invalid_schedule.extend(overlay_pass.invalid);
        let new_overlays = overlay::resolve_overlays(overlay_pass.playable);

        // Action priority watermark over the current fix and time.
        let new_actions =
            document::resolve_actions(&state.raw_actions_schedule, now, fix.as_ref());

        let changed = force_change(
            &state.current_schedule,
            &new_schedule,
            &state.current_overlay_schedule,
            &new_overlays,
        );

        state.current_schedule = new_schedule;
        state.current_overlay_schedule = new_overlays;
        state.current_actions_schedule = new_actions;
        state.current_default_layout = default_layout;
        state.refresh_requested = false;
        state.last_tick_at = Some(now);

        let screenshot_due = match self.config.screenshot_interval() {
            Some(interval) => state
                .last_screenshot_at
                .is_none_or(|at| now > at + interval),
            None => false,
        };
        if screenshot_due {
            state.last_screenshot_at = Some(now);
        }

        // Flip has_run under the lock; execution is spawned by the caller.
        let due_commands =
            commands::take_due_commands(&mut state.commands, now, self.config.command_window());

        Ok(TickOutcome {
            changed,
            screenshot_due,
            due_commands,
        })
    }
}

/// Whether the renderer must be told to swap.
///
/// A change is forced when nothing is on screen yet, when any on-screen item
/// disappeared from the new rotation, or when the overlay set differs by
/// length or membership. Item identity is `(layout, schedule, action, window)`.
fn force_change(
    current: &[ScheduleItem],
    new: &[ScheduleItem],
    current_overlays: &[ScheduleItem],
    new_overlays: &[ScheduleItem],
) -> bool {
    if current.is_empty() {
        return true;
    }

    let new_keys: HashSet<ItemKey> = new.iter().map(ScheduleItem::key).collect();
    if current.iter().any(|item| !new_keys.contains(&item.key())) {
        return true;
    }

    if current_overlays.len() != new_overlays.len() {
        return true;
    }
    let new_overlay_keys: HashSet<ItemKey> =
        new_overlays.iter().map(ScheduleItem::key).collect();
    current_overlays
        .iter()
        .any(|item| !new_overlay_keys.contains(&item.key()))
}

/// Cloneable front door to the resolver state.
///
/// Every method takes the global lock for a brief critical section, so
/// callers on any thread observe consistent state and the tick loop never
/// races them.
#[derive(Clone)]
pub struct ScheduleHandle {
    state: Arc<Mutex<ResolverState>>,
    refresh: Arc<Notify>,
    shutdown: CancellationToken,
    store: Arc<dyn DocumentStore>,
}

impl fmt::Debug for ScheduleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduleHandle").finish_non_exhaustive()
    }
}

impl ScheduleHandle {
    /// The resolved layout rotation.
    pub fn current_schedule(&self) -> Vec<ScheduleItem> {
        self.state.lock().current_schedule.clone()
    }

    /// The resolved overlay set.
    pub fn current_overlay_schedule(&self) -> Vec<ScheduleItem> {
        self.state.lock().current_overlay_schedule.clone()
    }

    /// The surfaced action set.
    pub fn current_actions_schedule(&self) -> Vec<ScheduleAction> {
        self.state.lock().current_actions_schedule.clone()
    }

    pub fn current_default_layout(&self) -> ScheduleItem {
        self.state.lock().current_default_layout.clone()
    }

    /// Layouts quarantined as invalid during the last pass.
    pub fn invalid_schedule(&self) -> Vec<ScheduleItem> {
        self.state.lock().invalid_schedule.clone()
    }

    /// Point-in-time diagnostics.
    pub fn snapshot(&self) -> ScheduleSnapshot {
        self.state.lock().snapshot()
    }

    /// Human-readable outcome of the last tick.
    pub fn status(&self) -> String {
        self.state.lock().last_status.clone()
    }

    /// Inject a layout-change override and wake the resolver.
    pub fn add_layout_change_action(
        &self,
        layout_id: i64,
        created_at: chrono::DateTime<Utc>,
        action_id: i64,
        download_required: bool,
    ) {
        {
            let mut state = self.state.lock();
            state.layout_change_actions.push(LayoutChangeAction::new(
                layout_id,
                created_at,
                action_id,
                download_required,
            ));
            state.refresh_requested = true;
        }
        self.refresh.notify_one();
    }

    /// Inject an overlay-layout override and wake the resolver.
    pub fn add_overlay_layout_action(
        &self,
        layout_id: i64,
        action_id: i64,
        download_required: bool,
    ) {
        {
            let mut state = self.state.lock();
            state
                .overlay_layout_actions
                .push(OverlayLayoutAction::new(layout_id, action_id, download_required));
            state.refresh_requested = true;
        }
        self.refresh.notify_one();
    }

    /// Drop all pending layout-change overrides.
    pub fn clear_layout_change_actions(&self) {
        let mut state = self.state.lock();
        state.layout_change_actions.clear();
    }

    /// Mark every pending override's download as complete so the next tick
    /// materialises them.
    pub fn set_all_actions_downloaded(&self) {
        {
            let mut state = self.state.lock();
            for action in &mut state.layout_change_actions {
                action.download_required = false;
            }
            for action in &mut state.overlay_layout_actions {
                action.download_required = false;
            }
            state.refresh_requested = true;
        }
        self.refresh.notify_one();
    }

    /// Renderer report: the override layout with this action id has played.
    /// The matching injected action is pruned on the next tick.
    pub fn notify_layout_played(&self, action_id: i64) {
        let mut state = self.state.lock();
        for action in &mut state.layout_change_actions {
            if action.action_id == action_id {
                action.set_played();
            }
        }
        for action in &mut state.overlay_layout_actions {
            if action.action_id == action_id {
                action.set_played();
            }
        }
    }

    /// Renderer report: which layout is on screen. Consumed by the
    /// keep-alive exception when layout expiry is disabled.
    pub fn set_active_layout(&self, layout_id: Option<i64>) {
        self.state.lock().active_layout_id = layout_id;
    }

    /// Wake the tick loop immediately without resetting the base interval.
    pub fn refresh_now(&self) {
        self.state.lock().refresh_requested = true;
        self.refresh.notify_one();
    }

    /// Record a position fix. Stores the fix and pulses a refresh when it is
    /// the first valid fix or the player moved at least `threshold_m` metres.
    /// Returns whether a refresh was pulsed.
    pub fn update_position(&self, fix: PlayerPosition, threshold_m: f64) -> bool {
        if fix.is_unknown() {
            return false;
        }
        let moved = {
            let mut state = self.state.lock();
            let moved = match state.last_geo_fix {
                None => true,
                Some(previous) => previous.distance_m(&fix) >= threshold_m,
            };
            if moved {
                state.last_geo_fix = Some(fix);
                state.refresh_requested = true;
            }
            moved
        };
        if moved {
            self.refresh.notify_one();
        }
        moved
    }

    /// The last recorded position fix.
    pub fn last_geo_fix(&self) -> Option<PlayerPosition> {
        self.state.lock().last_geo_fix
    }

    /// Persist a received schedule document verbatim and wake the resolver.
    /// Serialised against the tick loop's reads through the state lock;
    /// write failures propagate.
    pub fn write_document(&self, contents: &str) -> Result<()> {
        {
            let mut state = self.state.lock();
            self.store.write(contents)?;
            state.refresh_requested = true;
        }
        self.refresh.notify_one();
        Ok(())
    }

    /// Signal the tick loop (and the geo watcher) to stop.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    /// Cancellation token shared with the agent's background tasks.
    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(layout_id: i64) -> ScheduleItem {
        ScheduleItem {
            layout_id,
            ..ScheduleItem::default()
        }
    }

    #[test]
    fn empty_current_schedule_forces_change() {
        assert!(force_change(&[], &[item(1)], &[], &[]));
    }

    #[test]
    fn identical_sets_do_not_force_change() {
        let current = vec![item(1), item(2)];
        let new = vec![item(1), item(2)];
        assert!(!force_change(&current, &new, &[], &[]));
    }

    #[test]
    fn disappearing_item_forces_change() {
        let current = vec![item(1), item(2)];
        let new = vec![item(1)];
        assert!(force_change(&current, &new, &[], &[]));
    }

    #[test]
    fn pure_addition_does_not_force_change() {
        let current = vec![item(1)];
        let new = vec![item(1), item(2)];
        assert!(!force_change(&current, &new, &[], &[]));
    }

    #[test]
    fn overlay_count_change_forces_change() {
        let current = vec![item(1)];
        let new = vec![item(1)];
        assert!(force_change(&current, &new, &[], &[item(9)]));
        assert!(force_change(&current, &new, &[item(9)], &[]));
    }

    #[test]
    fn overlay_membership_change_forces_change() {
        let current = vec![item(1)];
        let new = vec![item(1)];
        assert!(force_change(&current, &new, &[item(8)], &[item(9)]));
        assert!(!force_change(&current, &new, &[item(8)], &[item(8)]));
    }
}
