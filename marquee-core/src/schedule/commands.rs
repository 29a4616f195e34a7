//! Command dispatch windowing.
//!
//! Each tick marks commands whose due time falls inside the look-ahead window
//! and hands them to the shell runner, one task per command so a slow or
//! wedged command cannot stall the tick loop. Failures are logged, never
//! retried.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use marquee_model::ScheduleCommand;
use tracing::{debug, warn};

use crate::ports::CommandRunner;

/// Mark and collect commands due in `[now, now + window]`. The `has_run`
/// flip happens here, under the state lock, so a command is collected at
/// most once.
pub fn take_due_commands(
    commands: &mut [ScheduleCommand],
    now: DateTime<Utc>,
    window: Duration,
) -> Vec<ScheduleCommand> {
    let mut due = Vec::new();
    for command in commands.iter_mut() {
        if command.is_due(now, window) {
            command.has_run = true;
            due.push(command.clone());
        }
    }
    due
}

/// Carry `has_run` flags over a document reload so a refresh pulse inside
/// the due window cannot dispatch a command twice.
pub fn carry_over_run_flags(fresh: &mut [ScheduleCommand], previous: &[ScheduleCommand]) {
    for command in fresh.iter_mut() {
        if previous
            .iter()
            .any(|p| p.has_run && p.reload_key() == command.reload_key())
        {
            command.has_run = true;
        }
    }
}

/// Fire each due command on its own task.
pub fn dispatch(due: Vec<ScheduleCommand>, runner: Arc<dyn CommandRunner>) {
    for command in due {
        let runner = Arc::clone(&runner);
        tokio::spawn(async move {
            debug!(
                target: "schedule::commands",
                code = %command.code,
                schedule = command.schedule_id,
                "dispatching command"
            );
            if let Err(err) = runner.execute(&command.code).await {
                warn!(
                    target: "schedule::commands",
                    code = %command.code,
                    error = %err,
                    "command dispatch failed"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs_from: i64, base: DateTime<Utc>) -> ScheduleCommand {
        ScheduleCommand::new(base + Duration::seconds(secs_from), "code", 1)
    }

    #[test]
    fn only_window_commands_are_taken() {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
        let mut commands = vec![at(-5, now), at(0, now), at(5, now), at(10, now), at(11, now)];

        let due = take_due_commands(&mut commands, now, Duration::seconds(10));
        assert_eq!(due.len(), 3);
        assert!(!commands[0].has_run);
        assert!(commands[1].has_run && commands[2].has_run && commands[3].has_run);
        assert!(!commands[4].has_run);
    }

    #[test]
    fn taken_commands_are_not_taken_twice() {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
        let mut commands = vec![at(5, now)];
        assert_eq!(
            take_due_commands(&mut commands, now, Duration::seconds(10)).len(),
            1
        );
        assert!(
            take_due_commands(&mut commands, now, Duration::seconds(10)).is_empty()
        );
    }

    #[test]
    fn run_flags_survive_a_reload() {
        let now = Utc.with_ymd_and_hms(2026, 7, 1, 10, 0, 0).unwrap();
        let mut old = vec![at(5, now)];
        take_due_commands(&mut old, now, Duration::seconds(10));

        // The downloader replaced the file; the same command reappears fresh.
        let mut fresh = vec![at(5, now), at(20, now)];
        carry_over_run_flags(&mut fresh, &old);
        assert!(fresh[0].has_run);
        assert!(!fresh[1].has_run);

        assert!(take_due_commands(&mut fresh, now, Duration::seconds(10)).is_empty());
    }
}
