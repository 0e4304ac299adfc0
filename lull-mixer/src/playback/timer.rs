//! Pausable sleep timer
//!
//! Counts down at one-second resolution and invokes its completion callback
//! exactly once when it reaches zero. The timer knows nothing about playback;
//! the owning session decides when to pause and resume it.
//!
//! Every transition bumps a generation number under the lock. A tick task
//! only publishes or finishes while its generation is still current, so a
//! pause or cancel that races with the final tick can never lose the
//! remaining time or fire the callback twice.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

const TICK: Duration = Duration::from_secs(1);

/// Countdown state with the remaining time where there is one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerState {
    #[default]
    Idle,
    Running {
        remaining: Duration,
    },
    Paused {
        remaining: Duration,
    },
}

impl TimerState {
    pub fn name(&self) -> &'static str {
        match self {
            TimerState::Idle => "idle",
            TimerState::Running { .. } => "running",
            TimerState::Paused { .. } => "paused",
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            TimerState::Idle => None,
            TimerState::Running { remaining } | TimerState::Paused { remaining } => Some(*remaining),
        }
    }
}

type OnFinish = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct Inner {
    generation: u64,
    /// Set while running
    deadline: Option<Instant>,
    /// Set while paused
    paused_remaining: Option<Duration>,
    original: Option<Duration>,
    on_finish: Option<OnFinish>,
    task: Option<JoinHandle<()>>,
}

impl Inner {
    /// Stop any tick task and invalidate its pending work
    fn invalidate(&mut self) {
        self.generation += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.deadline = None;
    }
}

struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<TimerState>,
    remaining_tx: watch::Sender<Option<Duration>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: TimerState) {
        self.state_tx.send_replace(state);
        self.remaining_tx.send_replace(state.remaining());
    }
}

pub struct CountdownTimer {
    shared: Arc<Shared>,
}

impl CountdownTimer {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(TimerState::Idle);
        let (remaining_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                state_tx,
                remaining_tx,
            }),
        }
    }

    /// Start counting down from `duration`, replacing any previous countdown.
    ///
    /// A replaced countdown's callback is dropped without being invoked.
    pub fn start(&self, duration: Duration, on_finish: impl FnOnce() + Send + 'static) {
        let mut inner = self.shared.lock();
        inner.invalidate();
        inner.original = Some(duration);
        inner.on_finish = Some(Box::new(on_finish));
        info!("Timer started: {:?}", duration);
        self.run_from(&mut inner, duration);
    }

    /// Arm a countdown in the paused state without ticking
    pub fn setup_paused(&self, duration: Duration, on_finish: impl FnOnce() + Send + 'static) {
        let mut inner = self.shared.lock();
        inner.invalidate();
        inner.original = Some(duration);
        inner.on_finish = Some(Box::new(on_finish));
        inner.paused_remaining = Some(duration);
        info!("Timer armed (paused): {:?}", duration);
        self.shared.publish(TimerState::Paused { remaining: duration });
    }

    /// Freeze a running countdown; no-op otherwise
    pub fn pause(&self) {
        let mut inner = self.shared.lock();
        let Some(deadline) = inner.deadline else {
            return;
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        inner.invalidate();
        inner.paused_remaining = Some(remaining);
        debug!("Timer paused with {:?} remaining", remaining);
        self.shared.publish(TimerState::Paused { remaining });
    }

    /// Continue a paused countdown from where it stopped; no-op otherwise
    pub fn resume(&self) {
        let mut inner = self.shared.lock();
        if inner.deadline.is_some() {
            return;
        }
        let Some(remaining) = inner.paused_remaining else {
            return;
        };

        inner.invalidate();
        debug!("Timer resumed with {:?} remaining", remaining);
        self.run_from(&mut inner, remaining);
    }

    /// Return to Idle; the completion callback is dropped, never invoked
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        inner.invalidate();
        inner.paused_remaining = None;
        inner.original = None;
        inner.on_finish = None;
        debug!("Timer cancelled");
        self.shared.publish(TimerState::Idle);
    }

    /// Live state, with the remaining time computed now
    pub fn current(&self) -> TimerState {
        let inner = self.shared.lock();
        match (inner.deadline, inner.paused_remaining) {
            (Some(deadline), _) => TimerState::Running {
                remaining: deadline.saturating_duration_since(Instant::now()),
            },
            (None, Some(remaining)) => TimerState::Paused { remaining },
            (None, None) => TimerState::Idle,
        }
    }

    /// Duration the current countdown was started or armed with
    pub fn original(&self) -> Option<Duration> {
        self.shared.lock().original
    }

    /// State stream, updated on every transition and tick
    pub fn state(&self) -> watch::Receiver<TimerState> {
        self.shared.state_tx.subscribe()
    }

    /// Remaining-time stream; `None` while idle
    pub fn remaining(&self) -> watch::Receiver<Option<Duration>> {
        self.shared.remaining_tx.subscribe()
    }

    fn run_from(&self, inner: &mut Inner, remaining: Duration) {
        let deadline = Instant::now() + remaining;
        inner.deadline = Some(deadline);
        inner.paused_remaining = None;
        self.shared.publish(TimerState::Running { remaining });

        let shared = self.shared.clone();
        let generation = inner.generation;
        inner.task = Some(tokio::spawn(tick(shared, generation, deadline)));
    }
}

impl Default for CountdownTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.shared.lock().invalidate();
    }
}

async fn tick(shared: Arc<Shared>, generation: u64, deadline: Instant) {
    loop {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }

        // Wake on whole seconds of remaining time so the display steps evenly
        let fraction = Duration::from_nanos((left.as_nanos() % TICK.as_nanos()) as u64);
        let wait = if fraction.is_zero() { TICK } else { fraction };
        tokio::time::sleep(wait.min(left)).await;

        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            break;
        }

        let inner = shared.lock();
        if inner.generation != generation {
            return;
        }
        shared.publish(TimerState::Running { remaining: left });
    }

    let on_finish = {
        let mut inner = shared.lock();
        if inner.generation != generation {
            return;
        }
        inner.generation += 1;
        inner.deadline = None;
        inner.paused_remaining = None;
        inner.original = None;
        inner.task = None;
        shared.publish(TimerState::Idle);
        inner.on_finish.take()
    };

    info!("Timer finished");
    if let Some(on_finish) = on_finish {
        on_finish();
    }
}
