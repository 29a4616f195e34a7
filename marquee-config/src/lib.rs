//! Shared configuration library for Marquee.
//!
//! Centralizes player settings: where the cached schedule document and the
//! media library live, resolver cadence, screenshot reporting, adspace, and
//! geofence refresh tuning. The player binary and the resolver core both load
//! through here so there is a single source of truth for defaults and
//! validation rules.

pub mod models;
pub mod validation;

pub use models::{PlayerConfig, PlayerConfigSource};
pub use validation::{ConfigError, ConfigWarning};
