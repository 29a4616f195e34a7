//! Schedule resolution core for the Marquee signage player.
//!
//! Given a cached schedule document, player-injected override actions, and a
//! stream of position fixes, the resolver computes the playable layout
//! rotation, overlay set, and action set once per tick, dispatches commands
//! whose due time is imminent, and broadcasts change events for the renderer.
#![allow(missing_docs)]

pub mod error;
pub mod ports;
pub mod schedule;

pub use error::*;
pub use ports::{
    AdExchange, CommandRunner, DocumentStore, FsDocumentStore, GeoUpdate,
    LayoutCache, PositionSource, ScreenshotSink, WatcherStatus,
};
pub use schedule::agent::{Collaborators, ScheduleAgent, ScheduleHandle};
pub use schedule::events::ScheduleEvent;
pub use schedule::state::{ResolverState, ScheduleSnapshot};
