//! Sleep timer integration tests (paused clock)

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lull_mixer::playback::{CountdownTimer, TimerState};

fn finish_counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let hits = count.clone();
    (count, move || {
        hits.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(start_paused = true)]
async fn test_pause_after_ten_seconds_keeps_remaining() {
    let timer = CountdownTimer::new();
    let (finished, on_finish) = finish_counter();

    timer.start(Duration::from_secs(900), on_finish);
    tokio::time::sleep(Duration::from_secs(10)).await;
    timer.pause();

    assert_eq!(
        timer.current(),
        TimerState::Paused {
            remaining: Duration::from_secs(890)
        }
    );
    assert_eq!(*timer.remaining().borrow(), Some(Duration::from_secs(890)));

    // A long pause does not consume time
    tokio::time::sleep(Duration::from_secs(3600)).await;
    timer.resume();
    assert_eq!(
        timer.current(),
        TimerState::Running {
            remaining: Duration::from_secs(890)
        }
    );

    // Total running time before completion is exactly 900s
    tokio::time::sleep(Duration::from_secs(889)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(timer.current(), TimerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_remaining_is_non_increasing_while_running() {
    let timer = CountdownTimer::new();
    let mut remaining = timer.remaining();
    let (_finished, on_finish) = finish_counter();

    timer.start(Duration::from_secs(5), on_finish);

    let mut seen = Vec::new();
    while remaining.changed().await.is_ok() {
        let value = *remaining.borrow_and_update();
        seen.push(value);
        if value.is_none() {
            break;
        }
    }

    let secs: Vec<u64> = seen.iter().flatten().map(|d| d.as_secs()).collect();
    assert!(secs.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(secs.last(), Some(&1));
    assert_eq!(seen.last(), Some(&None));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_never_invokes_on_finish() {
    let timer = CountdownTimer::new();

    let (finished, on_finish) = finish_counter();
    timer.start(Duration::from_secs(3), on_finish);
    tokio::time::sleep(Duration::from_secs(1)).await;
    timer.cancel();
    assert_eq!(timer.current(), TimerState::Idle);
    assert_eq!(timer.original(), None);

    let (finished_paused, on_finish) = finish_counter();
    timer.setup_paused(Duration::from_secs(3), on_finish);
    timer.cancel();
    assert_eq!(timer.current(), TimerState::Idle);

    // Resume after cancel has nothing to resume
    timer.resume();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert_eq!(finished_paused.load(Ordering::SeqCst), 0);
    assert_eq!(*timer.state().borrow(), TimerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_cycles_never_extend_the_countdown() {
    let timer = CountdownTimer::new();
    let (finished, on_finish) = finish_counter();

    timer.start(Duration::from_secs(10), on_finish);
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(1500)).await;
        timer.pause();
        tokio::time::sleep(Duration::from_secs(30)).await;
        timer.resume();
    }

    // 6s of running time used, 4s left
    assert_eq!(timer.current().remaining(), Some(Duration::from_secs(4)));
    tokio::time::sleep(Duration::from_millis(4500)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}
