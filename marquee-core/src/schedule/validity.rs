//! Cache-validity, window, and geofence filtering.
//!
//! An item is playable iff its layout file is cache-valid, the layout is not
//! quarantined as unsafe, every dependent is cache-valid, `now` falls inside
//! its window, and its geofence (if any) covers the current fix. Cache-port
//! errors count as invalidity. Invalid items are quarantined so diagnostics
//! can report them; out-of-window and geo-inactive items are merely dropped.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use marquee_model::{NodeKind, PlayerPosition, ScheduleItem};
use tracing::{debug, warn};

use crate::ports::LayoutCache;

/// Per-tick inputs to the filter.
pub struct ValidityContext<'a> {
    pub cache: &'a dyn LayoutCache,
    pub now: DateTime<Utc>,
    pub fix: Option<&'a PlayerPosition>,
    /// When false, the layout currently on screen skips the cache test so an
    /// in-place update cannot blank the display mid-play.
    pub expire_modified_layouts: bool,
    pub active_layout_id: Option<i64>,
}

/// Result of one filter pass.
#[derive(Debug, Default)]
pub struct FilterOutcome {
    /// Valid, in-window, geo-active items in input order.
    pub playable: Vec<ScheduleItem>,
    /// The `default`-kind item, extracted regardless of window.
    pub default_layout: Option<ScheduleItem>,
    /// Cache-invalid items, quarantined for diagnostics.
    pub invalid: Vec<ScheduleItem>,
}

/// Filter a layout or overlay list down to what may play right now.
pub fn filter_playable(items: Vec<ScheduleItem>, ctx: &ValidityContext<'_>) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    // One cache verdict per layout id per pass.
    let mut verdicts: HashMap<i64, bool> = HashMap::new();

    for item in items {
        let exempt = !ctx.expire_modified_layouts && ctx.active_layout_id == Some(item.layout_id);
        let valid = if exempt {
            true
        } else {
            *verdicts
                .entry(item.layout_id)
                .or_insert_with(|| layout_is_valid(&item, ctx.cache))
        };

        if !valid {
            debug!(
                target: "schedule::validity",
                layout = item.layout_id,
                schedule = item.schedule_id,
                "quarantining invalid layout"
            );
            outcome.invalid.push(item);
            continue;
        }

        if item.node_kind == NodeKind::Default {
            // The default layout ignores its window; keep the first one seen.
            if outcome.default_layout.is_none() {
                outcome.default_layout = Some(item);
            }
            continue;
        }

        if !item.is_in_window(ctx.now) {
            continue;
        }

        if !item.is_geo_active(ctx.fix) {
            debug!(
                target: "schedule::validity",
                layout = item.layout_id,
                "dropping geo-inactive layout"
            );
            continue;
        }

        outcome.playable.push(item);
    }

    outcome
}

/// Cache verdict for one item: layout file valid, layout not unsafe, every
/// dependent valid. Cache errors are treated as invalidity.
fn layout_is_valid(item: &ScheduleItem, cache: &dyn LayoutCache) -> bool {
    // Adspace slots render exchange creatives, not library files.
    if item.node_kind == NodeKind::AdSpace {
        return true;
    }

    let file = item.layout_file();
    match cache.is_valid_path(&file) {
        Ok(true) => {}
        Ok(false) => return false,
        Err(err) => {
            warn!(target: "schedule::validity", layout = item.layout_id, error = %err, "cache lookup failed");
            return false;
        }
    }

    match cache.is_unsafe_layout(item.layout_id) {
        Ok(false) => {}
        Ok(true) => return false,
        Err(err) => {
            warn!(target: "schedule::validity", layout = item.layout_id, error = %err, "unsafe-layout lookup failed");
            return false;
        }
    }

    item.dependents.iter().all(|dependent| {
        cache.is_valid_path(dependent).unwrap_or_else(|err| {
            warn!(target: "schedule::validity", layout = item.layout_id, dependent, error = %err, "dependent lookup failed");
            false
        })
    })
}
