//! Priority and share-of-voice resolution.
//!
//! Normals and interrupts are filtered to their top priority band, interrupts
//! accumulate play slots until each has its share of the hour, normals fill
//! the remaining seconds, and the two sequences interleave into the rotation
//! handed to the renderer.

use marquee_model::{NodeKind, ScheduleItem};
use tracing::debug;

use crate::ports::LayoutCache;

const SECONDS_PER_HOUR: u32 = 3600;

/// Used when the cache has never observed the layout playing.
const DEFAULT_LAYOUT_DURATION: u32 = 60;

/// Floor for pathological durations; a zero-second slot would spin the fill
/// and accumulation loops forever.
const MIN_EFFECTIVE_DURATION: u32 = 10;

/// The synthetic interrupt representing the ad exchange's booked share.
pub fn adspace_item(share_of_voice: u32, average_ad_duration: u32) -> ScheduleItem {
    ScheduleItem {
        node_kind: NodeKind::AdSpace,
        share_of_voice,
        duration_hint: average_ad_duration,
        ..ScheduleItem::default()
    }
}

/// Resolve the rotation for one tick.
///
/// `items` is the post-validity, post-grouping flat list; `default_layout`
/// stands in whenever resolution would otherwise come up empty.
pub fn resolve_rotation(
    items: Vec<ScheduleItem>,
    cache: &dyn LayoutCache,
    default_layout: &ScheduleItem,
) -> Vec<ScheduleItem> {
    let (mut interrupts, mut normals): (Vec<ScheduleItem>, Vec<ScheduleItem>) =
        items.into_iter().partition(|item| item.is_interrupt());

    retain_top_priority(&mut normals);
    retain_top_priority(&mut interrupts);

    if interrupts.is_empty() {
        if normals.is_empty() {
            return vec![default_layout.clone()];
        }
        return normals;
    }
    if normals.is_empty() {
        normals.push(default_layout.clone());
    }

    // Share-of-voice accumulation: round-robin the interrupts, committing one
    // effective duration per visit, until every interrupt owns its share.
    for item in &mut interrupts {
        item.committed_duration = 0;
    }
    let mut resolved_interrupt: Vec<ScheduleItem> = Vec::new();
    let mut interrupt_seconds: u64 = 0;
    while interrupts
        .iter()
        .any(|item| item.committed_duration < item.share_of_voice)
    {
        for item in &mut interrupts {
            if item.committed_duration >= item.share_of_voice {
                continue;
            }
            let duration = effective_duration(item, cache);
            item.committed_duration += duration;
            interrupt_seconds += u64::from(duration);
            resolved_interrupt.push(item.clone());
        }
    }

    // Normal fill: whatever the interrupts left of the hour.
    let mut resolved_normal: Vec<ScheduleItem> = Vec::new();
    let mut remaining = i64::from(SECONDS_PER_HOUR) - interrupt_seconds as i64;
    let mut index = 0usize;
    while remaining > 0 {
        let item = &normals[index % normals.len()];
        remaining -= i64::from(effective_duration(item, cache));
        resolved_normal.push(item.clone());
        index += 1;
    }
    if resolved_normal.is_empty() {
        // Interrupts consumed the whole hour; the default keeps the
        // interleave divisor non-zero.
        resolved_normal.push(default_layout.clone());
    }

    debug!(
        target: "schedule::resolver",
        interrupts = resolved_interrupt.len(),
        normals = resolved_normal.len(),
        interrupt_seconds,
        "interleaving rotation"
    );

    interleave(resolved_normal, resolved_interrupt)
}

/// Deterministic blend of the two sequences: never over-picks interrupts,
/// may repeat normals.
fn interleave(normals: Vec<ScheduleItem>, interrupts: Vec<ScheduleItem>) -> Vec<ScheduleItem> {
    let n = normals.len();
    let m = interrupts.len();
    let pick = n.max(m);
    let normal_step = pick.div_ceil(n);
    // More interrupts than picks means an interrupt on every slot.
    let interrupt_step = (pick / m).max(1);

    let mut rotation = Vec::with_capacity(n + m);
    let mut normal_index = 0usize;
    let mut interrupt_index = 0usize;
    for slot in 0..pick {
        if slot % normal_step == 0 {
            rotation.push(normals[normal_index % n].clone());
            normal_index += 1;
        }
        if slot % interrupt_step == 0 && interrupt_index < m {
            rotation.push(interrupts[interrupt_index].clone());
            interrupt_index += 1;
        }
    }
    rotation
}

/// Keep only the highest priority band, preserving input order. Ties all
/// survive.
fn retain_top_priority(items: &mut Vec<ScheduleItem>) {
    if let Some(max) = items.iter().map(|item| item.priority).max() {
        items.retain(|item| item.priority == max);
    }
}

/// The seconds one play of `item` commits: the schedule's duration hint, else
/// the cache's last observed duration, floored against pathological values.
fn effective_duration(item: &ScheduleItem, cache: &dyn LayoutCache) -> u32 {
    let duration = if item.duration_hint > 0 {
        item.duration_hint
    } else {
        cache.layout_duration(item.layout_id, DEFAULT_LAYOUT_DURATION)
    };
    if duration == 0 {
        MIN_EFFECTIVE_DURATION
    } else {
        duration
    }
}
