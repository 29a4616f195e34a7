//! CMS-scheduled actions and player-injected override actions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{GeoFence, PlayerPosition};

/// An action block from the schedule document.
///
/// The payload is opaque to the resolver; only priority, window, and geofence
/// participate in filtering. Everything else is carried through for the
/// action consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleAction {
    pub action_id: i64,
    pub priority: u32,
    pub from_dt: DateTime<Utc>,
    pub to_dt: DateTime<Utc>,
    pub is_geo_aware: bool,
    pub geo_fence: Option<GeoFence>,
    /// Remaining attributes, verbatim.
    pub attributes: BTreeMap<String, String>,
    /// Inner text of the action node, if any.
    pub payload: Option<String>,
}

impl ScheduleAction {
    /// Time-and-geo validity used by the priority watermark.
    pub fn is_active(&self, now: DateTime<Utc>, fix: Option<&PlayerPosition>) -> bool {
        if now < self.from_dt || now > self.to_dt {
            return false;
        }
        if !self.is_geo_aware {
            return true;
        }
        match (&self.geo_fence, fix) {
            (Some(fence), Some(fix)) => fence.contains(fix),
            _ => false,
        }
    }
}

/// A player-injected instruction to change the current layout.
///
/// Appended by API threads; consumed by the resolver, which materialises it
/// as an override schedule item until the renderer reports it played.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutChangeAction {
    pub layout_id: i64,
    pub created_at: DateTime<Utc>,
    pub action_id: i64,
    /// True until the layout file has been fetched; the action is not
    /// materialised while the download is outstanding.
    pub download_required: bool,
    played: bool,
}

impl LayoutChangeAction {
    pub fn new(
        layout_id: i64,
        created_at: DateTime<Utc>,
        action_id: i64,
        download_required: bool,
    ) -> Self {
        Self {
            layout_id,
            created_at,
            action_id,
            download_required,
            played: false,
        }
    }

    pub fn set_played(&mut self) {
        self.played = true;
    }

    pub fn is_serviced(&self) -> bool {
        self.played
    }
}

/// A player-injected instruction to show an overlay layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLayoutAction {
    pub layout_id: i64,
    pub action_id: i64,
    pub download_required: bool,
    played: bool,
}

impl OverlayLayoutAction {
    pub fn new(layout_id: i64, action_id: i64, download_required: bool) -> Self {
        Self {
            layout_id,
            action_id,
            download_required,
            played: false,
        }
    }

    pub fn set_played(&mut self) {
        self.played = true;
    }

    pub fn is_serviced(&self) -> bool {
        self.played
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn action_window_gates_activity() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        let action = ScheduleAction {
            action_id: 1,
            priority: 2,
            from_dt: now - chrono::Duration::hours(1),
            to_dt: now + chrono::Duration::hours(1),
            is_geo_aware: false,
            geo_fence: None,
            attributes: BTreeMap::new(),
            payload: None,
        };
        assert!(action.is_active(now, None));
        assert!(!action.is_active(now + chrono::Duration::hours(2), None));
    }

    #[test]
    fn injected_action_lifecycle() {
        let mut action = LayoutChangeAction::new(5, Utc::now(), 99, false);
        assert!(!action.is_serviced());
        action.set_played();
        assert!(action.is_serviced());
    }
}
