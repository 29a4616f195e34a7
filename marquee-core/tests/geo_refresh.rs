//! Geofence gating and movement-driven refresh.

mod support;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use marquee_config::PlayerConfig;
use marquee_core::schedule::geo_watch::{ChannelPositionSource, GeoWatcher};
use marquee_core::{GeoUpdate, ScheduleEvent};
use marquee_model::{NodeKind, PlayerPosition};
use support::{TestRig, schedule_dt};

// Rough box around Berlin, single-quoted so it can sit in an XML attribute.
const BERLIN_FENCE: &str = r#"{"type":"Feature","properties":{},"geometry":{"type":"Polygon","coordinates":[[[13.0,52.3],[13.8,52.3],[13.8,52.7],[13.0,52.7],[13.0,52.3]]]}}"#;

fn berlin() -> PlayerPosition {
    PlayerPosition::new(52.52, 13.405)
}

fn paris() -> PlayerPosition {
    PlayerPosition::new(48.8566, 2.3522)
}

fn fenced_schedule(now: chrono::DateTime<Utc>) -> String {
    format!(
        r#"<schedule>
            <layout file='7.xml' scheduleid='1' isGeoAware='1'
                    geoLocation='{fence}' fromdt='{from}' todt='{to}'/>
        </schedule>"#,
        fence = BERLIN_FENCE,
        from = schedule_dt(now - Duration::hours(1)),
        to = schedule_dt(now + Duration::hours(1)),
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn out_of_fence_layout_is_dropped_until_the_player_arrives() {
    let mut rig = TestRig::new(PlayerConfig::default());
    rig.write_schedule(&fenced_schedule(Utc::now()));

    // Player is in Paris: the fenced layout cannot play, splash stands in.
    assert!(rig.handle.update_position(paris(), 100.0));
    rig.agent.tick();
    let schedule = rig.handle.current_schedule();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].node_kind, NodeKind::Splash);
    let _ = rig.drain_events();

    // The move to Berlin is well past the threshold and swaps the schedule.
    assert!(rig.handle.update_position(berlin(), 100.0));
    rig.agent.tick();
    let schedule = rig.handle.current_schedule();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0].layout_id, 7);
    assert!(
        rig.drain_events()
            .contains(&ScheduleEvent::NewScheduleAvailable)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn small_moves_and_unknown_fixes_do_not_mark_stale() {
    let rig = TestRig::new(PlayerConfig::default());

    // First valid fix always registers.
    assert!(rig.handle.update_position(berlin(), 100.0));

    // (0, 0) is the no-lock sentinel.
    assert!(!rig.handle.update_position(PlayerPosition::new(0.0, 0.0), 100.0));

    // A few metres of drift stays below the threshold.
    let nearby = PlayerPosition::new(52.5201, 13.4051);
    assert!(!rig.handle.update_position(nearby, 100.0));
    assert_eq!(rig.handle.last_geo_fix(), Some(berlin()));

    // A kilometre away crosses it.
    let moved = PlayerPosition::new(52.53, 13.405);
    assert!(rig.handle.update_position(moved, 100.0));
    assert_eq!(rig.handle.last_geo_fix(), Some(moved));
}

#[tokio::test(flavor = "multi_thread")]
async fn watcher_feeds_fixes_from_the_position_source() {
    let rig = TestRig::new(PlayerConfig::default());

    let source = Arc::new(ChannelPositionSource::new(16));
    GeoWatcher::new(rig.handle.clone(), source.clone(), 100.0).spawn();

    // Give the watcher a moment to subscribe.
    for _ in 0..200 {
        source.push(GeoUpdate::Fix(berlin()));
        if rig.handle.last_geo_fix().is_some() {
            break;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    assert_eq!(rig.handle.last_geo_fix(), Some(berlin()));

    rig.handle.stop();
}
