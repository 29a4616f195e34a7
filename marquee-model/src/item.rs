//! Candidate layout entries as parsed from the schedule document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::{GeoFence, PlayerPosition};

/// Where in the schedule document an item originated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The fallback layout nominated by the CMS.
    Default,
    /// An ordinary scheduled layout.
    #[default]
    Layout,
    /// A layout drawn on top of the current layout.
    Overlay,
    /// The built-in splash layout used when nothing else is playable.
    Splash,
    /// An ad-exchange slot injected by the player.
    AdSpace,
}

/// Identity used for change detection between resolver passes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub layout_id: i64,
    pub schedule_id: i64,
    pub action_id: i64,
    pub from_dt: DateTime<Utc>,
    pub to_dt: DateTime<Utc>,
}

/// A single candidate layout in the schedule.
///
/// One instance per `<layout>`/`<default>`/`<overlay>` node, plus synthetic
/// instances for player-injected overrides, ad-exchange slots, and the cycle
/// placeholder at index 0 of `cycle_children`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleItem {
    pub layout_id: i64,
    /// 0 for the default/splash layout.
    pub schedule_id: i64,
    /// 0 unless the item was materialised from an injected action.
    pub action_id: i64,
    pub node_kind: NodeKind,
    pub from_dt: DateTime<Utc>,
    pub to_dt: DateTime<Utc>,
    pub priority: u32,
    pub is_override: bool,
    /// Seconds per hour this item must occupy; 0 = not an interrupt.
    pub share_of_voice: u32,
    /// Seconds; 0 means "ask the cache manager for the last observed duration".
    pub duration_hint: u32,
    pub is_geo_aware: bool,
    pub geo_fence: Option<GeoFence>,
    pub is_cycle_playback: bool,
    pub cycle_group_key: String,
    pub cycle_play_count: u32,
    /// Filenames that must all be cache-valid for the item to play.
    pub dependents: Vec<String>,
    /// Ordered cycle members; index 0 is a placeholder reserving the parent's
    /// own slot. Empty unless this item is a cycle parent.
    pub cycle_children: Vec<ScheduleItem>,
    /// Transient accumulator used by the share-of-voice resolution pass.
    #[serde(skip)]
    pub committed_duration: u32,
}

impl Default for ScheduleItem {
    fn default() -> Self {
        Self {
            layout_id: 0,
            schedule_id: 0,
            action_id: 0,
            node_kind: NodeKind::default(),
            from_dt: DateTime::<Utc>::MIN_UTC,
            to_dt: DateTime::<Utc>::MAX_UTC,
            priority: 0,
            is_override: false,
            share_of_voice: 0,
            duration_hint: 0,
            is_geo_aware: false,
            geo_fence: None,
            is_cycle_playback: false,
            cycle_group_key: String::new(),
            cycle_play_count: 0,
            dependents: Vec::new(),
            cycle_children: Vec::new(),
            committed_duration: 0,
        }
    }
}

impl ScheduleItem {
    /// The built-in splash entry installed when the document is empty or
    /// unparsable.
    pub fn splash() -> Self {
        Self {
            node_kind: NodeKind::Splash,
            ..Self::default()
        }
    }

    /// The CMS-nominated default layout. Its window is ignored.
    pub fn default_layout(layout_id: i64) -> Self {
        Self {
            layout_id,
            node_kind: NodeKind::Default,
            ..Self::default()
        }
    }

    /// The empty entry reserving sequence index 0 of a cycle parent's
    /// children for the parent itself.
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// An item is an interrupt iff it demands a share of voice.
    pub fn is_interrupt(&self) -> bool {
        self.share_of_voice > 0
    }

    /// Whether `now` falls inside the item's date window. The default layout
    /// and overrides are exempt at the call sites that matter.
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        self.from_dt <= now && now <= self.to_dt
    }

    /// Geofence verdict for the current fix. Items without geo-awareness are
    /// always active; geo-aware items with no fix or no usable fence never
    /// are.
    pub fn is_geo_active(&self, fix: Option<&PlayerPosition>) -> bool {
        if !self.is_geo_aware {
            return true;
        }
        match (&self.geo_fence, fix) {
            (Some(fence), Some(fix)) => fence.contains(fix),
            _ => false,
        }
    }

    /// The layout file this item renders, relative to the library root.
    pub fn layout_file(&self) -> String {
        format!("{}.xlf", self.layout_id)
    }

    /// Change-detection identity.
    pub fn key(&self) -> ItemKey {
        ItemKey {
            layout_id: self.layout_id,
            schedule_id: self.schedule_id,
            action_id: self.action_id,
            from_dt: self.from_dt,
            to_dt: self.to_dt,
        }
    }
}
