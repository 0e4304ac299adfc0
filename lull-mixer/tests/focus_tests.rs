//! Host audio-focus integration tests
//!
//! Focus changes are delivered through the mixer handle and applied in
//! order with ordinary commands, so a following `snapshot()` observes them.

mod helpers;

use helpers::{approx, drain_types, sound, TestMixer, SETTLE};
use lull_common::FocusChange;
use lull_mixer::Error;

#[tokio::test(start_paused = true)]
async fn test_duck_scales_and_regain_restores_base_volumes() {
    let t = TestMixer::start();

    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    t.mixer.play(sound("wind", 0.6)).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    t.mixer.focus_changed(FocusChange::LossTransientCanDuck).unwrap();
    let snapshot = t.mixer.snapshot().await.unwrap();

    assert!(approx(t.backend.volume_of("rain"), 0.24));
    assert!(approx(t.backend.volume_of("wind"), 0.18));
    assert!(approx(Some(snapshot[0].base_volume), 0.8));
    assert!(approx(Some(snapshot[1].base_volume), 0.6));

    // Ducking does not pause
    assert!(t.mixer.is_any_playing().await.unwrap());

    t.mixer.focus_changed(FocusChange::Gain).unwrap();
    t.mixer.snapshot().await.unwrap();

    assert_eq!(t.backend.volume_of("rain"), Some(0.8));
    assert_eq!(t.backend.volume_of("wind"), Some(0.6));
}

#[tokio::test(start_paused = true)]
async fn test_volume_changes_while_ducked_stay_attenuated() {
    let t = TestMixer::start();

    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    tokio::time::sleep(SETTLE).await;
    t.mixer.focus_changed(FocusChange::LossTransientCanDuck).unwrap();

    t.mixer.update_volume("rain", 0.5).await.unwrap();
    assert!(approx(t.backend.volume_of("rain"), 0.15));

    t.mixer.play(sound("wind", 1.0)).await.unwrap();
    tokio::time::sleep(SETTLE).await;
    assert!(approx(t.backend.volume_of("wind"), 0.3));

    t.mixer.focus_changed(FocusChange::Gain).unwrap();
    t.mixer.snapshot().await.unwrap();
    assert!(approx(t.backend.volume_of("rain"), 0.5));
    assert!(approx(t.backend.volume_of("wind"), 1.0));
}

#[tokio::test(start_paused = true)]
async fn test_transient_loss_pauses_and_regain_resumes() {
    let t = TestMixer::start();

    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    t.mixer.focus_changed(FocusChange::LossTransient).unwrap();
    assert!(!t.mixer.is_any_playing().await.unwrap());
    assert_eq!(t.mixer.snapshot().await.unwrap().len(), 1);

    t.mixer.focus_changed(FocusChange::Gain).unwrap();
    assert!(t.mixer.is_any_playing().await.unwrap());
    assert!(approx(t.backend.volume_of("rain"), 0.8));
}

#[tokio::test(start_paused = true)]
async fn test_user_pause_is_not_overridden_by_regain() {
    let t = TestMixer::start();

    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    t.mixer.focus_changed(FocusChange::LossTransient).unwrap();
    t.mixer.pause_all().await.unwrap();
    t.mixer.focus_changed(FocusChange::Gain).unwrap();

    assert!(!t.mixer.is_any_playing().await.unwrap());

    // An explicit resume still works
    t.mixer.resume_all().await.unwrap();
    assert!(t.mixer.is_any_playing().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_play_keeps_user_pause() {
    let t = TestMixer::start();

    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    t.mixer.play(sound("wind", 0.6)).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    t.mixer.pause_all().await.unwrap();
    let result = t.mixer.play(sound("fire", 0.5)).await;
    assert!(matches!(result, Err(Error::ResourceExhaustion { .. })));

    t.mixer.focus_changed(FocusChange::LossTransient).unwrap();
    t.mixer.focus_changed(FocusChange::Gain).unwrap();

    assert!(!t.mixer.is_any_playing().await.unwrap());
    assert_eq!(t.focus_host.request_count(), 1);
    assert_eq!(t.backend.created_count("fire"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_permanent_loss_needs_a_new_play() {
    let t = TestMixer::start();

    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    t.mixer.focus_changed(FocusChange::Loss).unwrap();
    assert!(!t.mixer.is_any_playing().await.unwrap());
    assert_eq!(t.focus_host.abandon_count(), 1);

    // No automatic resume
    t.mixer.focus_changed(FocusChange::Gain).unwrap();
    assert!(!t.mixer.is_any_playing().await.unwrap());

    // Playing again re-requests focus
    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    assert_eq!(t.focus_host.request_count(), 2);
    assert!(t.mixer.is_any_playing().await.unwrap());
    assert_eq!(t.backend.created_count("rain"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_focus_denied_is_not_fatal() {
    let t = TestMixer::start();
    let mut events = t.events();
    t.focus_host.set_grant(false);

    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    tokio::time::sleep(SETTLE).await;

    assert!(t.mixer.is_any_playing().await.unwrap());
    assert!(approx(t.backend.volume_of("rain"), 0.8));
    assert!(drain_types(&mut events).contains(&"FocusDenied"));

    // Without a grant, host changes are not acted on
    t.mixer.focus_changed(FocusChange::LossTransient).unwrap();
    assert!(t.mixer.is_any_playing().await.unwrap());

    // Next play retries
    t.focus_host.set_grant(true);
    t.mixer.play(sound("wind", 0.5)).await.unwrap();
    assert_eq!(t.focus_host.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_focus_changes_are_broadcast() {
    let t = TestMixer::start();
    let mut events = t.events();

    t.mixer.play(sound("rain", 0.8)).await.unwrap();
    t.mixer.focus_changed(FocusChange::LossTransientCanDuck).unwrap();
    t.mixer.snapshot().await.unwrap();

    assert!(drain_types(&mut events).contains(&"FocusChanged"));
}
