//! Shared test doubles for the resolver integration suites.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use marquee_config::PlayerConfig;
use marquee_core::error::{Result, ScheduleError};
use marquee_core::{
    AdExchange, Collaborators, CommandRunner, FsDocumentStore, LayoutCache, ScheduleAgent,
    ScheduleEvent, ScheduleHandle, ScreenshotSink,
};
use marquee_model::Ad;
use parking_lot::Mutex;
use tokio::sync::{Notify, broadcast};

/// Cache stub with adjustable validity verdicts.
#[derive(Default)]
pub struct StubCache {
    pub missing: Mutex<HashSet<String>>,
    pub unsafe_ids: Mutex<HashSet<i64>>,
    pub durations: Mutex<HashMap<i64, u32>>,
}

impl StubCache {
    pub fn mark_missing(&self, filename: &str) {
        self.missing.lock().insert(filename.to_string());
    }
}

impl LayoutCache for StubCache {
    fn is_valid_path(&self, filename: &str) -> Result<bool> {
        Ok(!self.missing.lock().contains(filename))
    }

    fn is_unsafe_layout(&self, layout_id: i64) -> Result<bool> {
        Ok(self.unsafe_ids.lock().contains(&layout_id))
    }

    fn layout_duration(&self, layout_id: i64, fallback: u32) -> u32 {
        self.durations.lock().get(&layout_id).copied().unwrap_or(fallback)
    }
}

/// Exchange stub with fixed share-of-voice figures.
pub struct StubExchange {
    pub share: u32,
    pub average_duration: u32,
}

#[async_trait]
impl AdExchange for StubExchange {
    async fn configure(&self) -> Result<()> {
        Ok(())
    }

    fn share_of_voice(&self) -> u32 {
        self.share
    }

    fn average_ad_duration(&self) -> u32 {
        self.average_duration
    }

    async fn get_ad(&self, _width: u32, _height: u32) -> Result<Ad> {
        Err(ScheduleError::Internal("no creatives in stub".to_string()))
    }
}

/// Records executed command codes and wakes waiting assertions.
#[derive(Default)]
pub struct RecordingRunner {
    pub executed: Mutex<Vec<String>>,
    pub notify: Notify,
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn execute(&self, code: &str) -> Result<()> {
        self.executed.lock().push(code.to_string());
        self.notify.notify_waiters();
        Ok(())
    }
}

/// Counts screenshot uploads.
#[derive(Default)]
pub struct CountingScreenshots {
    pub captures: AtomicUsize,
    pub notify: Notify,
}

impl CountingScreenshots {
    pub fn count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenshotSink for CountingScreenshots {
    async fn capture_and_send(&self) -> Result<()> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
        Ok(())
    }
}

/// A ready-to-tick agent over a temp-dir schedule file and stub services.
pub struct TestRig {
    pub agent: ScheduleAgent,
    pub handle: ScheduleHandle,
    pub events: broadcast::Receiver<ScheduleEvent>,
    pub cache: Arc<StubCache>,
    pub runner: Arc<RecordingRunner>,
    pub screenshots: Arc<CountingScreenshots>,
    pub store: Arc<FsDocumentStore>,
    _dir: tempfile::TempDir,
}

impl TestRig {
    pub fn new(config: PlayerConfig) -> Self {
        Self::with_exchange(
            config,
            StubExchange {
                share: 0,
                average_duration: 0,
            },
        )
    }

    pub fn with_exchange(config: PlayerConfig, exchange: StubExchange) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(FsDocumentStore::new(dir.path().join("schedule.xml")));
        let cache = Arc::new(StubCache::default());
        let runner = Arc::new(RecordingRunner::default());
        let screenshots = Arc::new(CountingScreenshots::default());

        let agent = ScheduleAgent::new(
            config,
            Collaborators {
                cache: cache.clone(),
                exchange: Arc::new(exchange),
                runner: runner.clone(),
                screenshots: screenshots.clone(),
                store: store.clone(),
            },
        );
        let handle = agent.handle();
        let events = agent.subscribe();

        Self {
            agent,
            handle,
            events,
            cache,
            runner,
            screenshots,
            store,
            _dir: dir,
        }
    }

    pub fn write_schedule(&self, xml: &str) {
        use marquee_core::DocumentStore;
        self.store.write(xml).expect("write schedule");
    }

    /// Events emitted so far, drained.
    pub fn drain_events(&mut self) -> Vec<ScheduleEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

/// Format a timestamp the way the schedule document carries them.
pub fn schedule_dt(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
