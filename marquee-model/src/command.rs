//! Shell commands scheduled by the CMS.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A command due for execution at a fixed time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleCommand {
    pub due_at: DateTime<Utc>,
    /// Opaque identifier forwarded to the shell runner.
    pub code: String,
    pub schedule_id: i64,
    /// Flipped exactly once when the command enters the dispatch window.
    pub has_run: bool,
}

impl ScheduleCommand {
    pub fn new(due_at: DateTime<Utc>, code: impl Into<String>, schedule_id: i64) -> Self {
        Self {
            due_at,
            code: code.into(),
            schedule_id,
            has_run: false,
        }
    }

    /// Identity that survives a document reload, so `has_run` can be carried
    /// over when the downloader replaces the schedule file.
    pub fn reload_key(&self) -> (&str, DateTime<Utc>, i64) {
        (&self.code, self.due_at, self.schedule_id)
    }

    /// Whether the command falls in the dispatch window `[now, now + window]`
    /// and has not run yet.
    pub fn is_due(&self, now: DateTime<Utc>, window: Duration) -> bool {
        !self.has_run && self.due_at >= now && self.due_at <= now + window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn due_window_is_inclusive_and_one_shot() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let window = Duration::seconds(10);

        let mut cmd = ScheduleCommand::new(now + Duration::seconds(5), "reboot", 1);
        assert!(cmd.is_due(now, window));

        cmd.has_run = true;
        assert!(!cmd.is_due(now, window));

        let past = ScheduleCommand::new(now - Duration::seconds(1), "reboot", 1);
        assert!(!past.is_due(now, window));

        let far = ScheduleCommand::new(now + Duration::seconds(11), "reboot", 1);
        assert!(!far.is_due(now, window));
    }
}
