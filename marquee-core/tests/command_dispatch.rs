//! Command windowing and screenshot cadence against the tick loop.

mod support;

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use marquee_config::PlayerConfig;
use support::{TestRig, schedule_dt};

/// Poll until `condition` holds or two seconds pass.
async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test(flavor = "multi_thread")]
async fn imminent_command_dispatches_exactly_once() {
    let rig = TestRig::new(PlayerConfig::default());
    let now = Utc::now();
    rig.write_schedule(&format!(
        r#"<schedule>
            <command date="{}" code="shutdown -r" scheduleid="3"/>
        </schedule>"#,
        schedule_dt(now + Duration::seconds(5)),
    ));

    rig.agent.tick();
    assert!(
        wait_until(|| rig.runner.executed.lock().len() == 1).await,
        "command was not dispatched"
    );
    assert_eq!(rig.runner.executed.lock()[0], "shutdown -r");

    // The reload on the next tick carries the run flag over; no re-dispatch.
    rig.agent.tick();
    rig.agent.tick();
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert_eq!(rig.runner.executed.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn stale_and_distant_commands_stay_unrun() {
    let rig = TestRig::new(PlayerConfig::default());
    let now = Utc::now();
    rig.write_schedule(&format!(
        r#"<schedule>
            <command date="{}" code="too-late" scheduleid="1"/>
            <command date="{}" code="too-early" scheduleid="2"/>
        </schedule>"#,
        schedule_dt(now - Duration::seconds(60)),
        schedule_dt(now + Duration::seconds(60)),
    ));

    rig.agent.tick();
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert!(rig.runner.executed.lock().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn screenshot_cadence_follows_the_interval() {
    let rig = TestRig::new(PlayerConfig {
        screenshot_interval_secs: 3600,
        ..PlayerConfig::default()
    });

    // First tick has no previous screenshot, so one is due immediately.
    rig.agent.tick();
    assert!(
        wait_until(|| rig.screenshots.count() == 1).await,
        "screenshot was not captured"
    );

    // Within the interval nothing more is captured.
    rig.agent.tick();
    rig.agent.tick();
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert_eq!(rig.screenshots.count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_screenshots_never_capture() {
    let rig = TestRig::new(PlayerConfig::default());
    rig.agent.tick();
    rig.agent.tick();
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert_eq!(rig.screenshots.count(), 0);
}
