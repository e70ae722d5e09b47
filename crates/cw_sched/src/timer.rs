use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;

type TimerCallback = Arc<dyn Fn() + Send + Sync + 'static>;

// -----------------------------------------------------------------------------
// TimerShared

struct TimerShared {
    running: Mutex<bool>,
    cv: Condvar,
    invoked: AtomicU64,
    missed: AtomicU64,
}

// -----------------------------------------------------------------------------
// HighPrecisionTimer

/// A single-callback periodic timer with drift correction.
///
/// The callback is invoked on a dedicated worker thread at every interval
/// boundary. Fire times stay anchored to the `start + k·interval` grid: a
/// callback that overruns its interval does not shift the grid, the
/// boundaries that passed meanwhile are skipped and counted as *missed*.
/// Two counters account for every elapsed boundary —
/// [`invoked_callback_count`](Self::invoked_callback_count) for boundaries
/// where the callback actually ran and
/// [`missed_callback_count`](Self::missed_callback_count) for the skipped
/// ones.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use cw_sched::HighPrecisionTimer;
///
/// let timer = HighPrecisionTimer::new();
/// assert!(!timer.start(Duration::from_millis(10))); // no callback yet
///
/// timer.set_callback(|| { /* periodic work */ });
/// assert!(timer.start(Duration::from_millis(10)));
///
/// std::thread::sleep(Duration::from_millis(100));
/// timer.stop();
/// assert!(timer.invoked_callback_count() > 0);
/// ```
pub struct HighPrecisionTimer {
    shared: Arc<TimerShared>,
    callback: Mutex<Option<TimerCallback>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl HighPrecisionTimer {
    /// Creates a stopped timer with no callback.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TimerShared {
                running: Mutex::new(false),
                cv: Condvar::new(),
                invoked: AtomicU64::new(0),
                missed: AtomicU64::new(0),
            }),
            callback: Mutex::new(None),
            worker: Mutex::new(None),
        }
    }

    /// Stores the callback to be invoked on every interval boundary.
    ///
    /// Does not start the timer. Replacing the callback while the timer runs
    /// takes effect on the next [`start`](Self::start); the running worker
    /// keeps the callback it was started with.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Starts the worker thread firing every `interval`.
    ///
    /// Any previous run is stopped first and both counters reset to zero.
    /// Blocks until the worker has entered its wait loop. Returns `false`
    /// when no callback has been set, or when `interval` is zero (a zero
    /// interval could never advance the fire-time grid).
    pub fn start(&self, interval: Duration) -> bool {
        let Some(callback) = self.callback.lock().unwrap().clone() else {
            return false;
        };
        if interval.is_zero() {
            return false;
        }

        self.stop();

        self.shared.invoked.store(0, Ordering::Relaxed);
        self.shared.missed.store(0, Ordering::Relaxed);

        let next_fire = Instant::now() + interval;
        let ready = Arc::new(Barrier::new(2));
        let handle = thread::Builder::new()
            .name(String::from("cw-timer"))
            .spawn({
                let shared = Arc::clone(&self.shared);
                let ready = Arc::clone(&ready);
                move || {
                    {
                        let mut running = shared.running.lock().unwrap();
                        *running = true;
                    }
                    ready.wait();
                    worker_loop(&shared, &callback, interval, next_fire);
                }
            })
            .expect("failed to spawn timer thread");

        ready.wait();
        *self.worker.lock().unwrap() = Some(handle);
        true
    }

    /// Stops the timer and joins the worker thread.
    ///
    /// An in-flight callback invocation is waited out. Counters keep their
    /// values until the next [`start`](Self::start).
    pub fn stop(&self) {
        {
            let mut running = self.shared.running.lock().unwrap();
            *running = false;
        }

        self.shared.cv.notify_all();

        if let Some(worker) = self.worker.lock().unwrap().take() {
            if worker.join().is_err() {
                debug!("timer worker terminated abnormally");
            }
        }
    }

    /// Number of interval boundaries at which the callback was entered.
    pub fn invoked_callback_count(&self) -> u64 {
        self.shared.invoked.load(Ordering::Relaxed)
    }

    /// Number of interval boundaries skipped because a previous invocation
    /// was still running.
    pub fn missed_callback_count(&self) -> u64 {
        self.shared.missed.load(Ordering::Relaxed)
    }
}

impl Default for HighPrecisionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HighPrecisionTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

// -----------------------------------------------------------------------------
// Worker loop

fn worker_loop(
    shared: &TimerShared,
    callback: &TimerCallback,
    interval: Duration,
    mut next_fire: Instant,
) {
    let mut running = shared.running.lock().unwrap();

    loop {
        // Deadline wait; spurious wakeups re-enter the wait with the
        // remaining timeout.
        loop {
            if !*running {
                return;
            }

            let timeout = next_fire.saturating_duration_since(Instant::now());
            if timeout.is_zero() {
                break;
            }

            let (guard, _wait) = shared.cv.wait_timeout(running, timeout).unwrap();
            running = guard;
        }

        if panic::catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            debug!("timer callback panicked, timer continues");
        }
        shared.invoked.fetch_add(1, Ordering::Relaxed);

        // Re-anchor to the fire-time grid. The slot just served is the first
        // step; every further step is a boundary that elapsed during the
        // callback and is accounted as missed.
        let now = Instant::now();
        let mut skipped = 0_u64;
        while next_fire <= now {
            next_fire += interval;
            skipped += 1;
        }
        shared.missed.fetch_add(skipped.saturating_sub(1), Ordering::Relaxed);
    }
}

// -----------------------------------------------------------------------------
// Tests
