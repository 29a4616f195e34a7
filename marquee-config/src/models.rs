use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::validation::{ConfigError, ConfigWarning};

fn default_schedule_path() -> PathBuf {
    PathBuf::from("schedule.xml")
}

fn default_library_root() -> PathBuf {
    PathBuf::from("library")
}

/// Source that produced the player configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlayerConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    File(PathBuf),
}

/// Top-level player settings consumed by the schedule resolver.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Path of the cached schedule XML document. The downloader replaces this
    /// file in place; the resolver re-reads it every tick.
    pub schedule_path: PathBuf,
    /// Directory holding downloaded layout files (`<id>.xlf`) and their
    /// dependents.
    pub library_root: PathBuf,
    /// Resolver wake cadence in seconds. A refresh pulse wakes the loop early
    /// without resetting the base interval.
    pub tick_interval_secs: u64,
    /// Look-ahead window for command dispatch, in seconds.
    pub command_window_secs: u64,
    /// Screenshot reporting cadence in seconds; 0 disables reporting.
    pub screenshot_interval_secs: u64,
    /// When false, the layout currently on screen skips cache-validity checks
    /// so an in-place update cannot blank the display mid-play.
    pub expire_modified_layouts: bool,
    /// Whether the ad exchange may inject an adspace interrupt into the
    /// rotation.
    pub adspace_enabled: bool,
    /// Movement threshold (metres) beyond which a position fix marks the
    /// schedule stale.
    pub geo_refresh_distance_m: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            schedule_path: default_schedule_path(),
            library_root: default_library_root(),
            tick_interval_secs: 10,
            command_window_secs: 10,
            screenshot_interval_secs: 0,
            expire_modified_layouts: true,
            adspace_enabled: false,
            geo_refresh_distance_m: 100.0,
        }
    }
}

impl PlayerConfig {
    /// Load player configuration overrides using environment variables.
    /// Evaluation order:
    /// 1) `$MARQUEE_CONFIG_PATH` (TOML file),
    /// 2) `marquee.toml` in the working directory,
    /// 3) defaults if neither is present.
    pub fn load_from_env() -> anyhow::Result<(Self, PlayerConfigSource)> {
        if let Ok(path_str) = env::var("MARQUEE_CONFIG_PATH")
            && !path_str.trim().is_empty()
        {
            let path = PathBuf::from(path_str);
            let config = Self::load_from_file(&path)?;
            return Ok((config, PlayerConfigSource::EnvPath(path)));
        }

        let local = Path::new("marquee.toml");
        if local.is_file() {
            let config = Self::load_from_file(local)?;
            return Ok((config, PlayerConfigSource::File(local.to_path_buf())));
        }

        Ok((Self::default(), PlayerConfigSource::Default))
    }

    /// Load and parse a TOML configuration file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Check field ranges. Hard errors reject the config; warnings flag
    /// settings that are legal but probably unintended.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        if self.tick_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "tick_interval_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if !self.geo_refresh_distance_m.is_finite() || self.geo_refresh_distance_m < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "geo_refresh_distance_m",
                reason: "must be a non-negative number of metres".to_string(),
            });
        }

        let mut warnings = Vec::new();
        if self.command_window_secs < self.tick_interval_secs {
            warnings.push(ConfigWarning::new(
                "command_window_secs",
                "window is shorter than the tick interval; commands landing between ticks will be missed",
            ));
        }
        if self.screenshot_interval_secs > 0
            && self.screenshot_interval_secs < self.tick_interval_secs
        {
            warnings.push(ConfigWarning::new(
                "screenshot_interval_secs",
                "interval is shorter than the tick interval; screenshots are taken at most once per tick",
            ));
        }
        Ok(warnings)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn command_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.command_window_secs as i64)
    }

    /// Screenshot cadence, `None` when reporting is disabled.
    pub fn screenshot_interval(&self) -> Option<chrono::Duration> {
        if self.screenshot_interval_secs == 0 {
            None
        } else {
            Some(chrono::Duration::seconds(self.screenshot_interval_secs as i64))
        }
    }
}
