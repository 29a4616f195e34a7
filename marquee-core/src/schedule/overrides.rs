//! Player-injected override handling.
//!
//! Pending layout-change and overlay actions are materialised as synthetic
//! schedule items ahead of validity filtering; after filtering, surviving
//! overrides displace the entire resolved schedule. Serviced actions are
//! pruned in a deferred pass, never while the lists are being iterated.

use chrono::{DateTime, Duration, Utc};
use marquee_model::{LayoutChangeAction, NodeKind, OverlayLayoutAction, ScheduleItem};
use tracing::debug;

use super::state::ResolverState;

/// Drop injected actions the renderer has already serviced.
pub fn prune_serviced(state: &mut ResolverState) {
    let before =
        state.layout_change_actions.len() + state.overlay_layout_actions.len();
    state.layout_change_actions.retain(|a| !a.is_serviced());
    state.overlay_layout_actions.retain(|a| !a.is_serviced());
    let pruned =
        before - state.layout_change_actions.len() - state.overlay_layout_actions.len();
    if pruned > 0 {
        debug!(target: "schedule::overrides", pruned, "pruned serviced override actions");
    }
}

/// Synthetic schedule items for pending layout-change actions. Actions still
/// waiting on a download are skipped until `set_all_actions_downloaded`.
pub fn materialize_layout_overrides(actions: &[LayoutChangeAction]) -> Vec<ScheduleItem> {
    actions
        .iter()
        .filter(|action| !action.download_required && !action.is_serviced())
        .map(|action| ScheduleItem {
            layout_id: action.layout_id,
            action_id: action.action_id,
            node_kind: NodeKind::Layout,
            is_override: true,
            // Backdate a second so the window test passes on the same tick.
            from_dt: action.created_at - Duration::seconds(1),
            to_dt: DateTime::<Utc>::MAX_UTC,
            ..ScheduleItem::default()
        })
        .collect()
}

/// Synthetic overlay items for pending overlay-layout actions.
pub fn materialize_overlay_overrides(actions: &[OverlayLayoutAction]) -> Vec<ScheduleItem> {
    actions
        .iter()
        .filter(|action| !action.download_required && !action.is_serviced())
        .map(|action| ScheduleItem {
            layout_id: action.layout_id,
            action_id: action.action_id,
            node_kind: NodeKind::Overlay,
            is_override: true,
            ..ScheduleItem::default()
        })
        .collect()
}

/// Separate surviving overrides from the rest of the post-validity list.
/// A non-empty override set becomes the whole resolved schedule.
pub fn split_overrides(items: Vec<ScheduleItem>) -> (Vec<ScheduleItem>, Vec<ScheduleItem>) {
    items.into_iter().partition(|item| item.is_override)
}
