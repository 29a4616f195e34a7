//! Cycle-playback grouping.
//!
//! Items sharing a cycle group key collapse into a single parent slot whose
//! `cycle_children` carry the members. Index 0 of the children is a
//! placeholder reserving the parent's own position; the renderer walks the
//! children using `cycle_play_count`.

use std::collections::HashMap;

use marquee_model::ScheduleItem;

/// Collapse cycle groups in `items`, preserving input order.
pub fn group_cycles(items: Vec<ScheduleItem>) -> Vec<ScheduleItem> {
    let mut flat: Vec<ScheduleItem> = Vec::new();
    // group key -> (index of the parent in `flat`, members including parent)
    let mut groups: HashMap<String, (usize, Vec<ScheduleItem>)> = HashMap::new();

    for item in items {
        if item.is_cycle_playback && !item.is_override {
            match groups.get_mut(&item.cycle_group_key) {
                Some((_, members)) => members.push(item),
                None => {
                    groups.insert(
                        item.cycle_group_key.clone(),
                        (flat.len(), vec![item.clone()]),
                    );
                    flat.push(item);
                }
            }
        } else {
            flat.push(item);
        }
    }

    for (index, members) in groups.into_values() {
        let mut children = Vec::with_capacity(members.len() + 1);
        children.push(ScheduleItem::placeholder());
        children.extend(members);
        flat[index].cycle_children = children;
    }

    flat
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle_item(layout_id: i64, key: &str) -> ScheduleItem {
        ScheduleItem {
            layout_id,
            is_cycle_playback: true,
            cycle_group_key: key.to_string(),
            ..ScheduleItem::default()
        }
    }

    fn plain_item(layout_id: i64) -> ScheduleItem {
        ScheduleItem {
            layout_id,
            ..ScheduleItem::default()
        }
    }

    #[test]
    fn members_collapse_into_first_seen_parent() {
        let flat = group_cycles(vec![
            cycle_item(1, "k"),
            cycle_item(2, "k"),
            plain_item(3),
        ]);

        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].layout_id, 1);
        assert_eq!(flat[1].layout_id, 3);

        let children = &flat[0].cycle_children;
        assert_eq!(children.len(), 3);
        // Index 0 reserves the parent's own slot.
        assert_eq!(children[0].layout_id, 0);
        assert_eq!(children[1].layout_id, 1);
        assert_eq!(children[2].layout_id, 2);
        assert!(children[2].cycle_group_key == flat[0].cycle_group_key);
    }

    #[test]
    fn distinct_keys_stay_separate() {
        let flat = group_cycles(vec![
            cycle_item(1, "a"),
            cycle_item(2, "b"),
            cycle_item(3, "a"),
        ]);
        assert_eq!(flat.len(), 2);
        assert_eq!(flat[0].cycle_children.len(), 3);
        assert_eq!(flat[1].cycle_children.len(), 2);
    }

    #[test]
    fn overrides_never_group() {
        let mut item = cycle_item(1, "k");
        item.is_override = true;
        let flat = group_cycles(vec![item, cycle_item(2, "k")]);
        assert_eq!(flat.len(), 2);
        assert!(flat[0].cycle_children.is_empty());
        // The non-override member becomes its own parent.
        assert_eq!(flat[1].cycle_children.len(), 2);
    }
}
