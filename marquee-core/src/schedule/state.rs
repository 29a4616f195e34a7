//! The process-wide resolver state.
//!
//! One instance lives behind one `parking_lot::Mutex` for the life of the
//! process. The tick loop holds the lock for the duration of a resolution
//! pass; external setters take it for brief critical sections. Nothing in
//! here performs IO.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use marquee_model::{
    LayoutChangeAction, OverlayLayoutAction, PlayerPosition, ScheduleAction, ScheduleCommand,
    ScheduleItem,
};
use serde::Serialize;

/// Everything the resolver knows between ticks.
#[derive(Debug)]
pub struct ResolverState {
    // Parsed document, refreshed every tick.
    pub raw_layout_schedule: Vec<ScheduleItem>,
    pub raw_overlay_schedule: Vec<ScheduleItem>,
    pub commands: Vec<ScheduleCommand>,
    pub raw_actions_schedule: Vec<ScheduleAction>,

    // Player-injected overrides, appended by external threads.
    pub layout_change_actions: Vec<LayoutChangeAction>,
    pub overlay_layout_actions: Vec<OverlayLayoutAction>,

    // Resolved output, read by the renderer after change events.
    pub current_schedule: Vec<ScheduleItem>,
    pub current_overlay_schedule: Vec<ScheduleItem>,
    pub current_actions_schedule: Vec<ScheduleAction>,
    pub current_default_layout: ScheduleItem,
    pub invalid_schedule: Vec<ScheduleItem>,

    pub refresh_requested: bool,
    pub last_screenshot_at: Option<DateTime<Utc>>,
    pub last_geo_fix: Option<PlayerPosition>,

    /// Layout currently on screen, as reported by the renderer.
    pub active_layout_id: Option<i64>,
    /// Human-readable outcome of the last tick, for diagnostics.
    pub last_status: String,
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl Default for ResolverState {
    fn default() -> Self {
        Self {
            raw_layout_schedule: Vec::new(),
            raw_overlay_schedule: Vec::new(),
            commands: Vec::new(),
            raw_actions_schedule: Vec::new(),
            layout_change_actions: Vec::new(),
            overlay_layout_actions: Vec::new(),
            current_schedule: Vec::new(),
            current_overlay_schedule: Vec::new(),
            current_actions_schedule: Vec::new(),
            current_default_layout: ScheduleItem::splash(),
            invalid_schedule: Vec::new(),
            refresh_requested: false,
            last_screenshot_at: None,
            last_geo_fix: None,
            active_layout_id: None,
            last_status: String::new(),
            last_tick_at: None,
        }
    }
}

impl ResolverState {
    /// Layout ids currently quarantined as invalid.
    pub fn invalid_ids(&self) -> HashSet<i64> {
        self.invalid_schedule
            .iter()
            .map(|item| item.layout_id)
            .collect()
    }

    /// Point-in-time diagnostics for the status surface.
    pub fn snapshot(&self) -> ScheduleSnapshot {
        ScheduleSnapshot {
            layout_ids: self
                .current_schedule
                .iter()
                .map(|item| item.layout_id)
                .collect(),
            overlay_ids: self
                .current_overlay_schedule
                .iter()
                .map(|item| item.layout_id)
                .collect(),
            invalid_ids: self
                .invalid_schedule
                .iter()
                .map(|item| item.layout_id)
                .collect(),
            action_count: self.current_actions_schedule.len(),
            default_layout_id: self.current_default_layout.layout_id,
            last_status: self.last_status.clone(),
            last_fix: self.last_geo_fix,
            last_tick_at: self.last_tick_at,
        }
    }
}

/// Serialisable resolver diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleSnapshot {
    pub layout_ids: Vec<i64>,
    pub overlay_ids: Vec<i64>,
    pub invalid_ids: Vec<i64>,
    pub action_count: usize,
    pub default_layout_id: i64,
    pub last_status: String,
    pub last_fix: Option<PlayerPosition>,
    pub last_tick_at: Option<DateTime<Utc>>,
}

impl ScheduleSnapshot {
    /// JSON rendering for the status surface and CMS reporting.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
