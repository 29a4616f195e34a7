//! Schedule resolution pipeline.
//!
//! Per tick: load the document, materialise injected overrides, filter by
//! cache validity / window / geofence, collapse cycle groups, resolve the
//! priority and share-of-voice rotation, resolve overlays and actions, mark
//! due commands, and publish change events.

pub mod agent;
pub mod commands;
pub mod cycle;
pub mod document;
pub mod events;
pub mod geo_watch;
pub mod overlay;
pub mod overrides;
pub mod resolver;
pub mod state;
pub mod validity;
