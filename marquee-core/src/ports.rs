//! Ports to the resolver's external collaborators.
//!
//! The cache manager, ad exchange, command runner, screenshot uploader, and
//! geolocation driver all live outside this crate; the resolver consumes them
//! through these traits. Cache and exchange reads are synchronous on purpose:
//! they are called with the state lock held, and the lock must never be held
//! across an await.

use std::path::PathBuf;

use async_trait::async_trait;
use marquee_model::{Ad, PlayerPosition};
use tokio::sync::mpsc;

use crate::error::{Result, ScheduleError};

/// The download cache: answers whether a layout and its dependents are
/// present and safe to play, and remembers observed layout durations.
pub trait LayoutCache: Send + Sync {
    /// Whether `filename` (relative to the library root) is downloaded and
    /// checksum-valid.
    fn is_valid_path(&self, filename: &str) -> Result<bool>;

    /// Whether the layout was quarantined after a failed render.
    fn is_unsafe_layout(&self, layout_id: i64) -> Result<bool>;

    /// Last observed play duration in seconds, or `fallback` when the layout
    /// has never completed a play.
    fn layout_duration(&self, layout_id: i64, fallback: u32) -> u32;
}

/// The ad-exchange client. Share-of-voice figures are cached by the client
/// and read synchronously; fetching a creative is network IO.
#[async_trait]
pub trait AdExchange: Send + Sync {
    /// Refresh the exchange session; called once when the agent starts.
    async fn configure(&self) -> Result<()>;

    /// Seconds per hour the exchange has sold, 0 when nothing is booked.
    fn share_of_voice(&self) -> u32;

    /// Mean creative duration in seconds, used to size the adspace slot.
    fn average_ad_duration(&self) -> u32;

    /// Fetch a concrete creative for an adspace slot.
    async fn get_ad(&self, width: u32, height: u32) -> Result<Ad>;
}

/// Executes a schedule command's opaque code in the host shell.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, code: &str) -> Result<()>;
}

/// Snaps the current screen and uploads it to the CMS.
#[async_trait]
pub trait ScreenshotSink: Send + Sync {
    async fn capture_and_send(&self) -> Result<()>;
}

/// Health of the underlying geolocation driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherStatus {
    Active,
    Disabled,
}

/// One message from the geolocation driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeoUpdate {
    Fix(PlayerPosition),
    Status(WatcherStatus),
}

/// Source of coordinate updates (GPS hardware, OS location service, ...).
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Open a fresh update stream. Called again after a `Disabled` status.
    async fn subscribe(&self) -> Result<mpsc::Receiver<GeoUpdate>>;
}

/// Storage for the cached schedule document.
pub trait DocumentStore: Send + Sync {
    /// The document text, or `None` when no document has been cached yet.
    fn read(&self) -> Result<Option<String>>;

    /// Replace the document verbatim (UTF-8).
    fn write(&self, contents: &str) -> Result<()>;
}

/// Filesystem-backed document store.
///
/// The file is opened with shared read/write semantics so the downloader can
/// replace it between ticks; the resolver serialises its own reads and writes
/// through the global state lock.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    path: PathBuf,
}

impl FsDocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl DocumentStore for FsDocumentStore {
    fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(ScheduleError::Io(err)),
        }
    }

    fn write(&self, contents: &str) -> Result<()> {
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fs_store_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsDocumentStore::new(dir.path().join("schedule.xml"));
        assert!(store.read().unwrap().is_none());

        store.write("<schedule/>").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("<schedule/>"));
    }
}
