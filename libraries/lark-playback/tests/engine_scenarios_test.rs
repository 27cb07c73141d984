//! End-to-end engine scenarios on a paused clock
//!
//! Every test drives the real engine actor against hand-written fakes; the
//! 1 s retry backoff and the 8 s failure grace run on tokio's virtual time.

mod support;

use lark_core::{RepeatMode, SetPlaylist, StreamResolution};
use lark_playback::{DeviceEvent, EngineStatus, PlaybackConfig};
use std::sync::atomic::Ordering;
use std::time::Duration;
use support::{settle, tracks, Harness};
use tokio::time::{sleep, Instant};

// ===== Failure handling =====

#[tokio::test(start_paused = true)]
async fn no_candidates_fail_without_touching_device() {
    let h = Harness::new();
    h.resolver.route("t1", StreamResolution::found(Vec::<String>::new()));
    h.load(&["t1", "t2"]).await;

    assert!(h.engine.play().await);
    settle().await;

    assert!(h.played().is_empty());
    assert_eq!(h.events.errors().len(), 1);
    assert!(h.events.errors()[0].contains("No stream candidates"));
    assert!(h.events.track_changes().is_empty());
    assert_eq!(h.engine.state().await.status, EngineStatus::Stopped);
    // Failed track stays current while the grace timer runs.
    let playlist = h.engine.playlist().await;
    assert_eq!(playlist.current_track().unwrap().id.as_str(), "t1");
}

#[tokio::test(start_paused = true)]
async fn resolver_failure_is_treated_like_no_candidates() {
    let h = Harness::new();
    h.resolver.route("t1", StreamResolution::failed());
    h.load(&["t1"]).await;

    h.engine.play().await;
    settle().await;

    assert!(h.played().is_empty());
    assert_eq!(h.events.errors().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn unreachable_resolver_fails_the_track() {
    let h = Harness::new();
    h.resolver.unreachable.store(true, Ordering::SeqCst);
    h.load(&["t1", "t2"]).await;

    assert!(h.engine.play().await);
    settle().await;

    assert!(h.played().is_empty());
    assert_eq!(h.events.errors().len(), 1);
    assert_eq!(h.engine.state().await.status, EngineStatus::Stopped);
}

#[tokio::test(start_paused = true)]
async fn exhausted_invalid_candidates_name_the_bad_url() {
    let h = Harness::new();
    h.resolver.route("t1", StreamResolution::found(["", "http://"]));
    h.load(&["t1"]).await;

    h.engine.play().await;
    settle().await;

    assert!(h.played().is_empty());
    let errors = h.events.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Invalid stream URL"), "{}", errors[0]);
}

#[tokio::test(start_paused = true)]
async fn terminal_failure_advances_after_grace_period() {
    let h = Harness::new();
    h.resolver.route("t1", StreamResolution::failed());
    h.load(&["t1", "t2"]).await;

    h.engine.play().await;
    settle().await;

    sleep(Duration::from_secs(7)).await;
    assert!(h.played().is_empty(), "advanced before the grace period");

    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.played(), vec!["ok:t2"]);
    assert_eq!(h.events.track_changes(), vec!["t2"]);
    assert_eq!(h.engine.state().await.status, EngineStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn falls_back_through_candidates_and_announces_once() {
    let h = Harness::new();
    h.resolver.route(
        "t1",
        StreamResolution::found(["bad:a", "bad:b", "ok:c"]),
    );
    h.load(&["t1"]).await;

    let started = Instant::now();
    assert!(h.engine.play().await);
    sleep(Duration::from_secs(5)).await;

    let played = h.played();
    let failed = played.iter().filter(|url| url.starts_with("bad:")).count();
    assert_eq!(failed, 2 * 3);
    assert_eq!(played.last().map(String::as_str), Some("ok:c"));
    assert_eq!(h.events.track_changes(), vec!["t1"]);
    assert!(h.events.errors().is_empty());
    assert!(started.elapsed() >= Duration::from_secs(4));
    assert_eq!(h.recorded_plays(), vec!["t1"]);
}

#[tokio::test(start_paused = true)]
async fn invalid_urls_never_reach_device() {
    let h = Harness::new();
    h.resolver
        .route("t1", StreamResolution::found(["", "   ", "http://", "ok:real"]));
    h.load(&["t1"]).await;

    h.engine.play().await;
    settle().await;

    assert_eq!(h.played(), vec!["ok:real"]);
    assert_eq!(h.events.track_changes(), vec!["t1"]);
}

#[tokio::test(start_paused = true)]
async fn mid_playback_device_error_fails_track() {
    let h = Harness::new();
    h.load(&["t1", "t2"]).await;
    h.engine.play().await;
    settle().await;

    assert!(h.device_event(DeviceEvent::Error {
        reason: "decoder stalled".into(),
    }));
    settle().await;

    assert!(h.events.errors()[0].contains("decoder stalled"));
    assert_eq!(h.engine.state().await.status, EngineStatus::Stopped);

    sleep(Duration::from_secs(9)).await;
    assert_eq!(h.events.track_changes(), vec!["t1", "t2"]);
}

// ===== Navigation =====

#[tokio::test(start_paused = true)]
async fn linear_navigation_stops_at_end() {
    let h = Harness::new();
    h.load(&["t1", "t2", "t3"]).await;

    assert!(h.engine.play_next().await);
    assert!(h.engine.play_next().await);
    settle().await;

    assert_eq!(
        h.engine.playlist().await.current_track().unwrap().id.as_str(),
        "t3"
    );
    let mutations = h.store.mutations.load(Ordering::SeqCst);

    assert!(!h.engine.play_next().await);
    assert_eq!(h.store.mutations.load(Ordering::SeqCst), mutations);
    assert_eq!(h.engine.playlist().await.current_index, Some(2));
}

#[tokio::test(start_paused = true)]
async fn out_of_range_jump_changes_nothing() {
    let h = Harness::new();
    h.load(&["t1", "t2", "t3"]).await;

    assert!(!h.engine.jump(5).await);

    assert_eq!(h.engine.playlist().await.current_index, Some(0));
    assert!(h.played().is_empty());
    assert!(h.events.errors().is_empty());
}

#[tokio::test(start_paused = true)]
async fn empty_playlist_navigation_is_silent() {
    let h = Harness::new();

    assert!(!h.engine.play().await);
    assert!(!h.engine.play_next().await);
    assert!(!h.engine.play_previous().await);
    assert!(!h.engine.set_playlist(SetPlaylist::new(Vec::new(), 0, "Empty")).await);

    assert!(h.events.errors().is_empty());
    assert!(h.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rapid_next_requests_coalesce() {
    let h = Harness::new();
    h.load(&["t1", "t2", "t3", "t4"]).await;
    settle().await;
    let before = h.store.mutations.load(Ordering::SeqCst);

    let (first, second, third) = tokio::join!(
        h.engine.play_next(),
        h.engine.play_next(),
        h.engine.play_next()
    );
    settle().await;

    assert_eq!((first, second, third), (false, false, true));
    assert_eq!(h.store.mutations.load(Ordering::SeqCst), before + 1);
    // Superseded requests are not failures.
    assert!(h.events.errors().is_empty());
    assert_eq!(h.engine.playlist().await.current_index, Some(1));
    assert_eq!(h.events.track_changes(), vec!["t2"]);
}

#[tokio::test(start_paused = true)]
async fn manual_navigation_cancels_grace_timer() {
    let h = Harness::new();
    h.resolver.route("t1", StreamResolution::failed());
    h.load(&["t1", "t2", "t3"]).await;

    h.engine.play().await;
    settle().await;
    sleep(Duration::from_secs(3)).await;

    assert!(h.engine.jump(2).await);
    sleep(Duration::from_secs(10)).await;

    assert_eq!(h.events.track_changes(), vec!["t3"]);
    assert_eq!(h.engine.playlist().await.current_index, Some(2));
    assert_eq!(h.played(), vec!["ok:t3"]);
}

#[tokio::test(start_paused = true)]
async fn superseded_session_never_starts_playback() {
    let h = Harness::new();
    h.resolver
        .route("t1", StreamResolution::found(["bad:x", "ok:late"]));
    h.load(&["t1", "t2"]).await;

    h.engine.play().await;
    settle().await;
    // t1 is now waiting out its first retry backoff.
    assert!(h.engine.play_next().await);
    sleep(Duration::from_secs(10)).await;

    assert!(!h.played().contains(&"ok:late".to_string()));
    assert_eq!(h.events.track_changes(), vec!["t2"]);
}

// ===== Device lifecycle =====

#[tokio::test(start_paused = true)]
async fn natural_end_advances() {
    let h = Harness::new();
    h.load(&["t1", "t2"]).await;
    h.engine.play().await;
    settle().await;

    assert!(h.device_event(DeviceEvent::Ended));
    settle().await;

    assert_eq!(h.events.track_changes(), vec!["t1", "t2"]);

    assert!(h.device_event(DeviceEvent::Ended));
    settle().await;
    assert_eq!(h.engine.state().await.status, EngineStatus::Stopped);
    assert_eq!(h.played(), vec!["ok:t1", "ok:t2"]);
}

#[tokio::test(start_paused = true)]
async fn repeat_one_restarts_same_track() {
    let h = Harness::new();
    h.load(&["t1", "t2"]).await;
    assert!(h.engine.set_mode(false, RepeatMode::One).await);
    h.engine.play().await;
    settle().await;

    for _ in 0..3 {
        assert!(h.device_event(DeviceEvent::Ended));
        settle().await;
    }

    assert_eq!(h.played(), vec!["ok:t1"]);
    assert_eq!(h.events.track_changes(), vec!["t1"]);
    assert_eq!(h.recorded_plays(), vec!["t1"; 4]);
    assert_eq!(h.engine.state().await.status, EngineStatus::Playing);
}

#[tokio::test(start_paused = true)]
async fn pause_and_resume_are_idempotent() {
    let h = Harness::new();
    h.load(&["t1"]).await;

    // No-ops before anything plays.
    h.engine.pause().await;
    h.engine.resume().await;

    h.engine.play().await;
    settle().await;

    h.engine.pause().await;
    h.engine.pause().await;
    assert_eq!(h.engine.state().await.status, EngineStatus::Paused);

    h.engine.resume().await;
    h.engine.resume().await;
    assert_eq!(h.engine.state().await.status, EngineStatus::Playing);

    let log = h.backend.log.lock().unwrap();
    assert_eq!((log.paused, log.resumed), (1, 1));
    drop(log);
    assert_eq!(h.events.play_states(), vec![true, false, true]);
}

#[tokio::test(start_paused = true)]
async fn progress_and_lyrics_are_exposed() {
    let h = Harness::new();
    let mut resolution = StreamResolution::found(["ok:t1"]);
    resolution.lyrics = Some("[00:01.00]la la".into());
    h.resolver.route("t1", resolution);
    h.load(&["t1"]).await;

    let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _progress = h
        .engine
        .on_progress(move |current, _| sink.lock().unwrap().push(current));

    h.engine.play().await;
    settle().await;
    h.device_event(DeviceEvent::TimeUpdate {
        current: Duration::from_secs(12),
        duration: Duration::from_secs(180),
    });
    settle().await;

    let state = h.engine.state().await;
    assert_eq!(state.current_time, Duration::from_secs(12));
    assert_eq!(state.duration, Duration::from_secs(180));
    assert!(seen.lock().unwrap().contains(&Duration::from_secs(12)));
    assert_eq!(h.engine.lyrics().await.as_deref(), Some("[00:01.00]la la"));
}

// ===== Store round-trips =====

#[tokio::test(start_paused = true)]
async fn store_failure_leaves_state_and_reports() {
    let h = Harness::new();
    h.load(&["t1", "t2"]).await;
    let before = h.engine.playlist().await;

    h.store.offline.store(true, Ordering::SeqCst);
    assert!(!h.engine.play_next().await);
    assert!(!h.engine.add_track(tracks(&["t9"]).remove(0), false).await);

    assert_eq!(h.engine.playlist().await, before);
    assert_eq!(h.events.errors().len(), 2);
    assert!(h.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn front_insert_keeps_playing_track_current() {
    let h = Harness::new();
    h.load(&["t1", "t2"]).await;
    h.engine.jump(1).await;
    settle().await;

    assert!(h.engine.add_track(tracks(&["t0"]).remove(0), true).await);

    let playlist = h.engine.playlist().await;
    assert_eq!(playlist.current_index, Some(2));
    assert_eq!(playlist.current_track().unwrap().id.as_str(), "t2");
    assert_eq!(h.store.snapshot(), playlist);
}

#[tokio::test(start_paused = true)]
async fn clear_stops_playback() {
    let h = Harness::new();
    h.load(&["t1"]).await;
    h.engine.play().await;
    settle().await;

    assert!(h.engine.clear().await);

    assert_eq!(h.engine.state().await.status, EngineStatus::Stopped);
    assert!(h.engine.playlist().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn custom_grace_period_is_honoured() {
    let config = PlaybackConfig {
        failure_grace_ms: 2_000,
        ..PlaybackConfig::default()
    };
    let h = Harness::with_config(config);
    h.resolver.route("t1", StreamResolution::failed());
    h.load(&["t1", "t2"]).await;

    h.engine.play().await;
    sleep(Duration::from_secs(3)).await;

    assert_eq!(h.events.track_changes(), vec!["t2"]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_closes_engine() {
    let h = Harness::new();
    h.load(&["t1"]).await;

    h.engine.shutdown().await;
    settle().await;

    assert!(!h.engine.is_running());
    assert!(!h.engine.play().await);
}

// ===== Source lifecycle =====

#[tokio::test(start_paused = true)]
async fn abandoned_load_is_detached_before_next_source() {
    let h = Harness::new();
    h.backend.log.lock().unwrap().play_delay = Some(Duration::from_secs(2));
    h.load(&["t1", "t2"]).await;

    assert!(h.engine.play().await);
    sleep(Duration::from_millis(100)).await;
    // t1's play call is still pending.
    assert!(h.engine.play_next().await);
    sleep(Duration::from_secs(3)).await;

    let timeline = h.backend.log.lock().unwrap().timeline.clone();
    assert_eq!(timeline, vec!["attach ok:t1", "detach", "attach ok:t2"]);
    assert_eq!(h.events.track_changes(), vec!["t2"]);
}

#[tokio::test(start_paused = true)]
async fn replacing_playlist_stops_old_track() {
    let h = Harness::new();
    h.load(&["old1", "old2"]).await;
    h.engine.play().await;
    settle().await;

    h.load(&["a", "b", "c"]).await;

    let state = h.engine.state().await;
    assert_eq!(state.status, EngineStatus::Stopped);
    // Late events from the old source no longer reach the engine.
    assert!(!h.device_event(DeviceEvent::Ended));
    settle().await;

    assert!(h.engine.play().await);
    settle().await;
    assert_eq!(h.events.track_changes(), vec!["old1", "a"]);
    assert_eq!(h.engine.playlist().await.current_index, Some(0));
}

#[tokio::test(start_paused = true)]
async fn appending_with_new_start_hands_over_to_it() {
    let h = Harness::new();
    h.load(&["t1"]).await;
    h.engine.play().await;
    settle().await;

    let request = SetPlaylist::new(tracks(&["t2", "t3"]), 0, "Test").appending();
    assert!(h.engine.set_playlist(request).await);

    assert_eq!(h.engine.state().await.status, EngineStatus::Stopped);
    assert_eq!(h.engine.playlist().await.current_index, Some(1));

    assert!(h.engine.play().await);
    settle().await;
    assert_eq!(h.events.track_changes(), vec!["t1", "t2"]);
}

#[tokio::test(start_paused = true)]
async fn reloading_same_start_track_keeps_playing() {
    let h = Harness::new();
    h.load(&["t1", "t2"]).await;
    h.engine.play().await;
    settle().await;

    h.load(&["t1", "t3"]).await;

    assert_eq!(h.engine.state().await.status, EngineStatus::Playing);
    assert!(h.device_event(DeviceEvent::Ended));
    settle().await;
    assert_eq!(h.events.track_changes(), vec!["t1", "t3"]);
}

#[tokio::test(start_paused = true)]
async fn rejected_history_write_does_not_interrupt_playback() {
    let h = Harness::new();
    h.history.rejecting.store(true, Ordering::SeqCst);
    h.load(&["t1"]).await;

    h.engine.play().await;
    settle().await;

    assert_eq!(h.events.track_changes(), vec!["t1"]);
    assert!(h.recorded_plays().is_empty());
    assert!(h.events.errors().is_empty());
    assert_eq!(h.engine.state().await.status, EngineStatus::Playing);
}
