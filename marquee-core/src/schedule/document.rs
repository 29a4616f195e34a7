//! Schedule document loader.
//!
//! Parses the cached schedule XML into typed layout items, overlays,
//! commands, and actions. Parsing is deliberately forgiving: a malformed
//! attribute degrades that field to a safe default, a wholly unparsable item
//! is logged and dropped, and an unparsable document falls back to a single
//! splash item so the player always has something to show.

use chrono::{DateTime, NaiveDateTime, Utc};
use marquee_model::{
    GeoFence, NodeKind, PlayerPosition, ScheduleAction, ScheduleCommand, ScheduleItem,
};
use tracing::{debug, warn};

use crate::error::{Result, ScheduleError};
use crate::ports::DocumentStore;

const SCHEDULE_DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The document used when no schedule has been cached yet.
pub const EMPTY_DOCUMENT: &str = "<schedule/>";

/// Typed contents of one schedule document.
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// `layout` and `default` nodes, in document order.
    pub layouts: Vec<ScheduleItem>,
    pub overlays: Vec<ScheduleItem>,
    pub commands: Vec<ScheduleCommand>,
    pub actions: Vec<ScheduleAction>,
}

impl ParsedDocument {
    /// The degraded document installed when parsing fails outright.
    pub fn splash_fallback() -> Self {
        Self {
            layouts: vec![ScheduleItem::splash()],
            ..Self::default()
        }
    }
}

/// Read and parse the cached schedule document.
///
/// A missing file yields the empty document and an unparsable one yields the
/// splash fallback, so the resolver keeps ticking regardless of what the
/// downloader last wrote. Only a read failure on an existing file surfaces as
/// an error.
pub fn load(store: &dyn DocumentStore) -> Result<ParsedDocument> {
    let xml = match store.read()? {
        Some(contents) => contents,
        None => EMPTY_DOCUMENT.to_string(),
    };

    let parsed = match parse_document(&xml) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(target: "schedule::loader", error = %err, "schedule document unparsable, installing splash schedule");
            ParsedDocument::splash_fallback()
        }
    };
    Ok(parsed)
}

/// Parse a schedule document.
pub fn parse_document(xml: &str) -> Result<ParsedDocument> {
    let doc =
        roxmltree::Document::parse(xml).map_err(|err| ScheduleError::Parse(err.to_string()))?;
    let root = doc.root_element();

    let mut parsed = ParsedDocument::default();
    let mut saw_child = false;

    for node in root.children().filter(|n| n.is_element()) {
        saw_child = true;
        match node.tag_name().name() {
            "layout" => {
                if let Some(item) = parse_layout_item(&node, NodeKind::Layout) {
                    parsed.layouts.push(item);
                }
            }
            "default" => {
                if let Some(item) = parse_layout_item(&node, NodeKind::Default) {
                    parsed.layouts.push(item);
                }
            }
            "command" => {
                if let Some(command) = parse_command(&node) {
                    parsed.commands.push(command);
                }
            }
            "overlays" => {
                for child in node.children().filter(|n| n.is_element()) {
                    if let Some(item) = parse_layout_item(&child, NodeKind::Overlay) {
                        parsed.overlays.push(item);
                    }
                }
            }
            "actions" => {
                for child in node.children().filter(|n| n.is_element()) {
                    if let Some(action) = parse_action(&child) {
                        parsed.actions.push(action);
                    }
                }
            }
            // Top-level dependants are a CMS artefact with no player-side use.
            "dependants" => {}
            other => {
                debug!(target: "schedule::loader", tag = other, "ignoring unknown schedule node");
            }
        }
    }

    if !saw_child {
        parsed.layouts.push(ScheduleItem::splash());
    }

    Ok(parsed)
}

/// Surface the highest-priority band of currently valid actions.
///
/// The maximum priority among time-and-geo-valid actions wins; ties
/// accumulate, lower priorities are discarded.
pub fn resolve_actions(
    actions: &[ScheduleAction],
    now: DateTime<Utc>,
    fix: Option<&PlayerPosition>,
) -> Vec<ScheduleAction> {
    let mut watermark: Option<u32> = None;
    let mut surfaced: Vec<ScheduleAction> = Vec::new();

    for action in actions {
        if !action.is_active(now, fix) {
            continue;
        }
        match watermark {
            Some(best) if action.priority < best => {}
            Some(best) if action.priority == best => surfaced.push(action.clone()),
            _ => {
                watermark = Some(action.priority);
                surfaced.clear();
                surfaced.push(action.clone());
            }
        }
    }

    surfaced
}

fn parse_layout_item(node: &roxmltree::Node<'_, '_>, kind: NodeKind) -> Option<ScheduleItem> {
    let Some(file) = node.attribute("file") else {
        warn!(target: "schedule::loader", tag = node.tag_name().name(), "dropping item without file attribute");
        return None;
    };
    let stem = file
        .strip_suffix(".xml")
        .or_else(|| file.strip_suffix(".xlf"))
        .unwrap_or(file);
    let Ok(layout_id) = stem.trim().parse::<i64>() else {
        warn!(target: "schedule::loader", file, "dropping item with non-numeric layout id");
        return None;
    };

    let mut item = ScheduleItem {
        layout_id,
        schedule_id: attr_i64(node, "scheduleid", 0),
        node_kind: kind,
        from_dt: attr_dt(node, "fromdt").unwrap_or(DateTime::<Utc>::MIN_UTC),
        to_dt: attr_dt(node, "todt").unwrap_or(DateTime::<Utc>::MAX_UTC),
        priority: attr_u32(node, "priority", 0),
        share_of_voice: attr_u32(node, "shareOfVoice", 0),
        duration_hint: attr_u32(node, "duration", 0),
        is_geo_aware: attr_flag(node, "isGeoAware"),
        dependents: parse_dependents(node),
        ..ScheduleItem::default()
    };

    if item.is_geo_aware
        && let Some(raw) = node.attribute("geoLocation")
        && !raw.trim().is_empty()
    {
        match GeoFence::parse(raw) {
            Ok(fence) => item.geo_fence = Some(fence),
            Err(err) => {
                // A geo-aware item without a usable fence is never geo-active.
                warn!(target: "schedule::loader", layout = layout_id, error = %err, "unparsable geofence");
            }
        }
    }

    let cycle = attr_flag(node, "cyclePlayback");
    let group_key = node.attribute("groupKey").unwrap_or_default().trim();
    if cycle && !group_key.is_empty() {
        item.is_cycle_playback = true;
        item.cycle_group_key = group_key.to_string();
        item.cycle_play_count = attr_u32(node, "playCount", 0);
    }

    if kind == NodeKind::Default {
        // The default layout ignores its window and never outranks anything.
        item.schedule_id = 0;
        item.priority = 0;
        item.from_dt = DateTime::<Utc>::MIN_UTC;
        item.to_dt = DateTime::<Utc>::MAX_UTC;
    }

    Some(item)
}

fn parse_command(node: &roxmltree::Node<'_, '_>) -> Option<ScheduleCommand> {
    let Some(due_at) = attr_dt(node, "date") else {
        warn!(target: "schedule::loader", "dropping command without a parsable date");
        return None;
    };
    let Some(code) = node.attribute("code").filter(|c| !c.trim().is_empty()) else {
        warn!(target: "schedule::loader", "dropping command without a code");
        return None;
    };
    Some(ScheduleCommand::new(
        due_at,
        code,
        attr_i64(node, "scheduleid", 0),
    ))
}

fn parse_action(node: &roxmltree::Node<'_, '_>) -> Option<ScheduleAction> {
    let mut action = ScheduleAction {
        action_id: attr_i64(node, "id", 0),
        priority: attr_u32(node, "priority", 0),
        from_dt: attr_dt(node, "fromdt").unwrap_or(DateTime::<Utc>::MIN_UTC),
        to_dt: attr_dt(node, "todt").unwrap_or(DateTime::<Utc>::MAX_UTC),
        is_geo_aware: attr_flag(node, "isGeoAware"),
        geo_fence: None,
        attributes: node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect(),
        payload: node
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    };

    if action.is_geo_aware
        && let Some(raw) = node.attribute("geoLocation")
        && !raw.trim().is_empty()
    {
        match GeoFence::parse(raw) {
            Ok(fence) => action.geo_fence = Some(fence),
            Err(err) => {
                warn!(target: "schedule::loader", action = action.action_id, error = %err, "unparsable action geofence");
            }
        }
    }

    Some(action)
}

/// Dependents come from the comma-separated attribute plus any
/// `<dependents><file>…</file></dependents>` children.
fn parse_dependents(node: &roxmltree::Node<'_, '_>) -> Vec<String> {
    let mut dependents: Vec<String> = node
        .attribute("dependents")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .collect();

    for child in node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "dependents")
    {
        for file in child
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "file")
        {
            if let Some(name) = file.text().map(str::trim).filter(|t| !t.is_empty()) {
                dependents.push(name.to_string());
            }
        }
    }

    dependents
}

fn attr_u32(node: &roxmltree::Node<'_, '_>, name: &str, default: u32) -> u32 {
    match node.attribute(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            debug!(target: "schedule::loader", attr = name, value = raw, "malformed attribute, using default");
            default
        }),
    }
}

fn attr_i64(node: &roxmltree::Node<'_, '_>, name: &str, default: i64) -> i64 {
    match node.attribute(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            debug!(target: "schedule::loader", attr = name, value = raw, "malformed attribute, using default");
            default
        }),
    }
}

fn attr_flag(node: &roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.attribute(name).map(str::trim) == Some("1")
}

fn attr_dt(node: &roxmltree::Node<'_, '_>, name: &str) -> Option<DateTime<Utc>> {
    let raw = node.attribute(name)?;
    match NaiveDateTime::parse_from_str(raw.trim(), SCHEDULE_DT_FORMAT) {
        Ok(naive) => Some(naive.and_utc()),
        Err(_) => {
            debug!(target: "schedule::loader", attr = name, value = raw, "malformed timestamp, using open window");
            None
        }
    }
}
