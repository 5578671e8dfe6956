//! Clock abstraction for tick scheduling.
//!
//! Mixers and animators never read wall time directly. They ask a [`Clock`]
//! for `now()` and hand it callbacks to run at a later time. Two
//! realizations exist:
//! - [`WallClock`]: real time since an epoch, callbacks fire after a real delay
//! - [`StepClock`]: logical time that only moves when [`StepClock::advance`]
//!   is called, used for deterministic tests and offline simulation
//!
//! There is no cancellation. An owner that goes away while a callback is
//! still queued must make the callback a no-op itself (typically by holding
//! only a weak handle and checking it on entry).

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::time::{RationalTime, DEFAULT_SCALE};

/// Deferred work handed to a clock. Receives the clock time at invocation.
pub type ClockCallback = Box<dyn FnOnce(RationalTime) + Send + 'static>;

/// Source of "now" and of "run this later".
pub trait Clock: Send + Sync {
    /// Current clock time.
    fn now(&self) -> RationalTime;

    /// Run `callback` once `at` is reached.
    ///
    /// If `at <= now()` the callback runs synchronously, before `schedule`
    /// returns.
    fn schedule(&self, at: RationalTime, callback: ClockCallback);

    /// Map a Unix timestamp (in `1/100000` s units) onto this clock's timeline.
    fn from_unix_time(&self, unix: i64) -> RationalTime;

    /// Map a clock time to a Unix timestamp in `1/100000` s units.
    fn to_unix_time(&self, time: RationalTime) -> i64;
}

/// Clock handle shared between components.
pub type SharedClock = Arc<dyn Clock>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Real-time clock anchored at a monotonic epoch.
#[derive(Debug, Clone)]
pub struct WallClock {
    epoch: Instant,
    /// Unix time of `epoch`, in `1/100000` s.
    epoch_unix: i64,
}

impl WallClock {
    /// Clock whose zero is the moment of construction.
    pub fn new() -> Self {
        Self::with_epoch(Instant::now(), Utc::now())
    }

    /// Clock anchored to a known epoch and its wall-clock time.
    pub fn with_epoch(epoch: Instant, wall: DateTime<Utc>) -> Self {
        Self {
            epoch,
            epoch_unix: wall.timestamp_micros() / 10,
        }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> RationalTime {
        RationalTime::from_duration(self.epoch.elapsed())
    }

    fn schedule(&self, at: RationalTime, callback: ClockCallback) {
        let now = self.now();
        if at <= now {
            callback(now);
            return;
        }
        let delay = (at - now).to_duration();
        let epoch = self.epoch;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    callback(RationalTime::from_duration(epoch.elapsed()));
                });
            }
            Err(_) => {
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    callback(RationalTime::from_duration(epoch.elapsed()));
                });
            }
        }
    }

    fn from_unix_time(&self, unix: i64) -> RationalTime {
        RationalTime::new(unix - self.epoch_unix, DEFAULT_SCALE)
    }

    fn to_unix_time(&self, time: RationalTime) -> i64 {
        time.rescale(DEFAULT_SCALE).value + self.epoch_unix
    }
}

struct PendingCallback {
    at: RationalTime,
    seq: u64,
    callback: ClockCallback,
}

struct StepState {
    time: RationalTime,
    seq: u64,
    queue: Vec<PendingCallback>,
}

/// Deterministic clock driven by explicit [`advance`](StepClock::advance) calls.
///
/// Time starts at zero in the step's scale. Callbacks run on the thread that
/// advances the clock, in deadline order with ties broken by scheduling order.
pub struct StepClock {
    step: RationalTime,
    state: Mutex<StepState>,
}

impl StepClock {
    pub fn new(step: RationalTime) -> Self {
        Self {
            step,
            state: Mutex::new(StepState {
                time: RationalTime::zero(step.scale),
                seq: 0,
                queue: Vec::new(),
            }),
        }
    }

    /// The amount a single [`advance`](Self::advance) moves time by.
    pub fn step(&self) -> RationalTime {
        self.step
    }

    /// Move forward by one step and run every callback that became due.
    pub fn advance(&self) -> RationalTime {
        self.advance_by(self.step)
    }

    /// Move forward by `delta` and run every callback that became due.
    pub fn advance_by(&self, delta: RationalTime) -> RationalTime {
        let now = {
            let mut state = lock(&self.state);
            state.time = state.time + delta;
            state.time
        };
        self.run_due(now);
        now
    }

    /// Time back to zero. Pending callbacks are dropped without running.
    pub fn reset(&self) {
        let dropped = {
            let mut state = lock(&self.state);
            state.time = RationalTime::zero(self.step.scale);
            std::mem::take(&mut state.queue)
        };
        drop(dropped);
    }

    /// Number of callbacks still waiting for their deadline.
    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }

    fn run_due(&self, now: RationalTime) {
        // Callbacks run without the lock held so they can schedule again.
        let mut due = {
            let mut state = lock(&self.state);
            let (due, rest): (Vec<_>, Vec<_>) =
                std::mem::take(&mut state.queue).into_iter().partition(|p| p.at <= now);
            state.queue = rest;
            due
        };
        due.sort_by(|a, b| a.at.cmp(&b.at).then(a.seq.cmp(&b.seq)));
        for pending in due {
            (pending.callback)(now);
        }
    }
}

impl fmt::Debug for StepClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("StepClock")
            .field("step", &self.step)
            .field("time", &state.time)
            .field("pending", &state.queue.len())
            .finish()
    }
}

impl Clock for StepClock {
    fn now(&self) -> RationalTime {
        lock(&self.state).time
    }

    fn schedule(&self, at: RationalTime, callback: ClockCallback) {
        let mut state = lock(&self.state);
        let now = state.time;
        if at <= now {
            drop(state);
            callback(now);
            return;
        }
        let seq = state.seq;
        state.seq += 1;
        state.queue.push(PendingCallback { at, seq, callback });
    }

    fn from_unix_time(&self, unix: i64) -> RationalTime {
        RationalTime::new(unix, DEFAULT_SCALE)
    }

    fn to_unix_time(&self, time: RationalTime) -> i64 {
        time.rescale(DEFAULT_SCALE).value
    }
}
