//! Mix session tests: selection, premium gating and timer coupling

mod helpers;

use std::time::Duration;

use helpers::{drain_types, sound, TestMixer, SETTLE};
use lull_common::{MixerEvent, SubscriptionTier};
use lull_mixer::playback::{MixSession, TimerState};
use lull_mixer::Error;

fn session(t: &TestMixer) -> MixSession {
    MixSession::new(t.mixer.clone(), t.tier_rx.clone(), t.state.clone())
}

/// Let watcher tasks observe the latest state before the clock moves
async fn settle_watchers() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_timer_pauses_with_playback_and_resumes_from_remaining() {
    let t = TestMixer::start();
    let session = session(&t);

    session.play_sound(sound("rain", 0.8)).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    session.set_timer(Some(Duration::from_secs(900))).await.unwrap();
    assert_eq!(session.timer().current().name(), "running");

    tokio::time::sleep(Duration::from_secs(10)).await;
    session.pause().await.unwrap();
    settle_watchers().await;

    assert_eq!(
        session.timer().current(),
        TimerState::Paused {
            remaining: Duration::from_secs(890)
        }
    );

    // Nothing plays, nothing counts down
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(session.timer().current().remaining(), Some(Duration::from_secs(890)));

    session.play_sound(sound("rain", 0.8)).await.unwrap();
    settle_watchers().await;

    let state = session.timer().current();
    assert_eq!(state.name(), "running");
    let remaining = state.remaining().unwrap();
    assert!(remaining > Duration::from_secs(889) && remaining <= Duration::from_secs(890));
}

#[tokio::test(start_paused = true)]
async fn test_timer_armed_paused_until_playback_starts() {
    let t = TestMixer::start();
    let session = session(&t);

    session.set_timer(Some(Duration::from_secs(60))).await.unwrap();
    assert_eq!(
        session.timer().current(),
        TimerState::Paused {
            remaining: Duration::from_secs(60)
        }
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(session.timer().current().remaining(), Some(Duration::from_secs(60)));

    session.play_sound(sound("rain", 0.8)).await.unwrap();
    settle_watchers().await;
    assert_eq!(session.timer().current().name(), "running");
}

#[tokio::test(start_paused = true)]
async fn test_timer_completion_stops_everything() {
    let t = TestMixer::start();
    let mut events = t.events();
    let session = session(&t);

    session.play_sound(sound("rain", 0.8)).await.unwrap();
    session.play_sound(sound("wind", 0.6)).await.unwrap();
    session.set_timer(Some(Duration::from_secs(5))).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5500)).await;
    tokio::time::sleep(SETTLE).await;

    assert_eq!(session.timer().current(), TimerState::Idle);
    assert!(t.mixer.snapshot().await.unwrap().is_empty());
    assert!(session.selected().await.is_empty());
    assert_eq!(t.backend.live_count(), 0);

    let types = drain_types(&mut events);
    assert!(types.contains(&"TimerFinished"));
    assert!(types.contains(&"TimerStateChanged"));
    assert!(types.contains(&"SoundStopped"));
}

#[tokio::test(start_paused = true)]
async fn test_timer_state_is_broadcast_with_display() {
    let t = TestMixer::start();
    let mut events = t.events();
    let session = session(&t);

    session.set_timer(Some(Duration::from_secs(900))).await.unwrap();
    settle_watchers().await;

    let mut displays = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let MixerEvent::TimerStateChanged { state, display, .. } = event {
            displays.push((state, display));
        }
    }
    assert_eq!(displays, vec![("paused".to_string(), Some("15:00".to_string()))]);

    session.set_timer(None).await.unwrap();
    assert_eq!(session.timer_status().state, "idle");
}

#[tokio::test(start_paused = true)]
async fn test_premium_sounds_need_premium_tier() {
    let t = TestMixer::start();
    let session = session(&t);
    let fire = sound("fire", 0.7).premium();

    let result = session.play_sound(fire.clone()).await;
    assert!(matches!(result, Err(Error::PremiumRequired(ref id)) if id == "fire"));
    assert!(t.mixer.snapshot().await.unwrap().is_empty());

    t.set_tier(SubscriptionTier::Premium);
    session.play_sound(fire).await.unwrap();
    assert_eq!(session.selected().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_selects_and_deselects() {
    let t = TestMixer::start();
    let session = session(&t);

    assert!(session.toggle_sound(sound("rain", 0.8)).await.unwrap());
    assert!(session.selected().await[0].selected);
    assert_eq!(t.mixer.snapshot().await.unwrap().len(), 1);

    assert!(!session.toggle_sound(sound("rain", 0.8)).await.unwrap());
    assert!(session.selected().await.is_empty());
    assert!(t.mixer.snapshot().await.unwrap()[0].stopping);

    tokio::time::sleep(SETTLE).await;
    assert!(t.mixer.snapshot().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_apply_mix_reports_rejected_entries() {
    let t = TestMixer::start();
    let session = session(&t);

    session.play_sound(sound("rain", 0.8)).await.unwrap();

    let report = session
        .apply_mix(vec![sound("wind", 0.5), sound("fire", 0.5), sound("birds", 0.5)])
        .await
        .unwrap();

    assert_eq!(report.stopped, vec!["rain".to_string()]);
    assert_eq!(report.playing, vec!["wind".to_string(), "fire".to_string()]);
    assert!(report.failed.contains_key("birds"));

    let selected: Vec<String> = session.selected().await.into_iter().map(|s| s.id).collect();
    assert_eq!(selected, vec!["fire".to_string(), "wind".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_volume_update_tracks_selection() {
    let t = TestMixer::start();
    let session = session(&t);

    session.play_sound(sound("rain", 0.8)).await.unwrap();
    session.update_volume("rain", 0.25).await.unwrap();

    assert_eq!(session.selected().await[0].volume, 0.25);
    assert_eq!(t.backend.volume_of("rain"), Some(0.25));
}
