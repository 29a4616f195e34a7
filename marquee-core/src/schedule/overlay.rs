//! Overlay resolution.
//!
//! Overlays ride on top of the layout rotation and resolve independently:
//! after validity and window filtering, an override set wins outright, then
//! the highest priority band, then the unprioritised base set.

use marquee_model::ScheduleItem;

/// Resolve the overlay set from the post-validity, in-window overlay list.
pub fn resolve_overlays(overlays: Vec<ScheduleItem>) -> Vec<ScheduleItem> {
    let mut override_bucket: Vec<ScheduleItem> = Vec::new();
    let mut priority_bucket: Vec<ScheduleItem> = Vec::new();
    let mut base: Vec<ScheduleItem> = Vec::new();

    for overlay in overlays {
        if overlay.is_override {
            override_bucket.push(overlay);
        } else if overlay.priority >= 1 {
            priority_bucket.push(overlay);
        } else {
            base.push(overlay);
        }
    }

    if !override_bucket.is_empty() {
        return override_bucket;
    }

    if let Some(max) = priority_bucket.iter().map(|o| o.priority).max() {
        priority_bucket.retain(|o| o.priority == max);
        return priority_bucket;
    }

    base
}
