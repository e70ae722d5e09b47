use std::collections::BTreeMap;
use std::mem;
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cw_task::{Task, TaskHandle, ThreadPool};
use cw_utils::hash::fixed_hash;
use log::debug;

// -----------------------------------------------------------------------------
// FireKey

/// Ordering key of the schedule: fire time first, then insertion order.
///
/// The `seq` counter admits any number of entries with the same fire time and
/// makes ties dispatch in submission order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
struct FireKey {
    when: Instant,
    seq: u64,
}

// -----------------------------------------------------------------------------
// Schedulable

/// A caller-supplied task name, stored with its hash.
///
/// Lookups compare the hash first and confirm with the string, so a hash
/// collision between two names can never alias their tasks.
struct TaskIdentity {
    hash: u64,
    name: String,
}

impl TaskIdentity {
    fn new(name: &str) -> Self {
        Self {
            hash: fixed_hash(name),
            name: name.to_owned(),
        }
    }

    fn matches(&self, hash: u64, name: &str) -> bool {
        self.hash == hash && self.name == name
    }
}

/// The work carried by a schedule entry.
enum Work {
    /// A packaged one-shot task, handed to the pool exactly once.
    Once(Option<Task>),
    /// A recurring callable; each tick wraps a fresh clone into a [`Task`].
    Shared(Arc<dyn Fn() + Send + Sync + 'static>),
}

/// A scheduled unit: the work plus its scheduling metadata.
struct Schedulable {
    work: Work,
    enabled: bool,
    /// Present iff the entry was created by the `every*` family.
    interval: Option<Duration>,
    /// Present iff the entry was created with a task name.
    identity: Option<TaskIdentity>,
}

// -----------------------------------------------------------------------------
// Scheduler state

struct SchedulerState {
    tasks: BTreeMap<FireKey, Schedulable>,
    next_seq: u64,
}

impl SchedulerState {
    fn insert(&mut self, when: Instant, schedulable: Schedulable) {
        let key = FireKey {
            when,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.tasks.insert(key, schedulable);
    }

    /// Finds the entry carrying the given identity, if any.
    fn find_key(&self, hash: u64, name: &str) -> Option<FireKey> {
        self.tasks.iter().find_map(|(key, schedulable)| {
            match &schedulable.identity {
                Some(identity) if identity.matches(hash, name) => Some(*key),
                _ => None,
            }
        })
    }
}

struct SchedulerShared {
    state: Mutex<SchedulerState>,
    tasks_cv: Condvar,
}

// -----------------------------------------------------------------------------
// TaskScheduler

/// A time-triggered dispatcher over an owned [`ThreadPool`].
///
/// Work can be submitted for an absolute time point ([`at`](Self::at)), after
/// a delay ([`after`](Self::after)), or on a recurring interval
/// ([`every`](Self::every)). Each submission variant has a `_named` form
/// taking a caller-chosen task name; named entries can later be queried,
/// enabled or disabled, retuned, or removed. Names are unique: a submission
/// whose name is already scheduled is rejected.
///
/// A dedicated scheduler thread sleeps until the earliest fire time, hands
/// every due, enabled entry to the pool, and re-inserts recurring entries on
/// a fixed-phase grid: the fire times of an interval `I` entry stay anchored
/// to `first_fire + k·I`, and ticks that pass while a previous run is still
/// executing are skipped, never replayed.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use cw_sched::TaskScheduler;
///
/// let scheduler = TaskScheduler::new();
/// assert!(scheduler.start(2));
///
/// assert!(scheduler.every_named("heartbeat", Duration::from_millis(100), || {
///     // periodic work
/// }));
/// assert!(scheduler.is_scheduled("heartbeat"));
/// assert!(scheduler.remove_task("heartbeat"));
///
/// assert!(scheduler.stop());
/// ```
pub struct TaskScheduler {
    pool: Arc<ThreadPool>,
    shared: Arc<SchedulerShared>,
    scheduler_thread: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    /// Creates a stopped scheduler.
    pub fn new() -> Self {
        Self {
            pool: Arc::new(ThreadPool::new()),
            shared: Arc::new(SchedulerShared {
                state: Mutex::new(SchedulerState {
                    tasks: BTreeMap::new(),
                    next_seq: 0,
                }),
                tasks_cv: Condvar::new(),
            }),
            scheduler_thread: Mutex::new(None),
        }
    }

    /// Starts the underlying pool with `threads` workers, then the scheduler
    /// thread. Returns `false` when already running.
    ///
    /// Blocks until the scheduler thread has entered its wait loop.
    pub fn start(&self, threads: usize) -> bool {
        if !self.pool.start(threads) {
            return false;
        }

        let ready = Arc::new(Barrier::new(2));
        let handle = thread::Builder::new()
            .name(String::from("cw-scheduler"))
            .spawn({
                let pool = Arc::clone(&self.pool);
                let shared = Arc::clone(&self.shared);
                let ready = Arc::clone(&ready);
                move || {
                    ready.wait();
                    scheduler_loop(&pool, &shared);
                }
            })
            .expect("failed to spawn scheduler thread");

        ready.wait();
        *self.scheduler_thread.lock().unwrap() = Some(handle);
        debug!("task scheduler started");
        true
    }

    /// Stops the pool and the scheduler thread, discarding every scheduled
    /// entry. Returns `false` when not running.
    ///
    /// Handles of not-yet-fired one-shots resolve with
    /// [`TaskError::Cancelled`](cw_task::TaskError::Cancelled). Every
    /// submission API rejects until the next [`start`](Self::start).
    pub fn stop(&self) -> bool {
        if !self.pool.stop() {
            return false;
        }

        self.shared.tasks_cv.notify_all();

        {
            let mut state = self.shared.state.lock().unwrap();
            state.tasks.clear();
        }

        if let Some(handle) = self.scheduler_thread.lock().unwrap().take() {
            if handle.join().is_err() {
                debug!("scheduler thread terminated abnormally");
            }
        }

        debug!("task scheduler stopped");
        true
    }

    /// Returns `true` while the scheduler accepts submissions.
    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    // -------------------------------------------------------------------------
    // Submission

    /// Schedules `callable` to run once at `when`.
    ///
    /// Returns a handle to the callable's result, or `None` when the
    /// scheduler is stopped.
    pub fn at<F, R>(&self, when: Instant, callable: F) -> Option<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_once(None, when, callable)
    }

    /// Like [`at`](Self::at), under a task name.
    ///
    /// Also returns `None` when `name` is already scheduled.
    pub fn at_named<F, R>(&self, name: &str, when: Instant, callable: F) -> Option<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_once(Some(name), when, callable)
    }

    /// Schedules `callable` to run once, `delay` from now.
    pub fn after<F, R>(&self, delay: Duration, callable: F) -> Option<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.at(Instant::now() + delay, callable)
    }

    /// Like [`after`](Self::after), under a task name.
    pub fn after_named<F, R>(&self, name: &str, delay: Duration, callable: F) -> Option<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.at_named(name, Instant::now() + delay, callable)
    }

    /// Schedules `callable` to run every `interval`, starting now.
    ///
    /// Returns `false` when the scheduler is stopped or `interval` is zero
    /// (a zero interval can never advance past the current time).
    pub fn every<F>(&self, interval: Duration, callable: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.submit_recurring(None, interval, Duration::ZERO, callable)
    }

    /// Like [`every`](Self::every), under a task name.
    ///
    /// Also returns `false` when `name` is already scheduled.
    pub fn every_named<F>(&self, name: &str, interval: Duration, callable: F) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.submit_recurring(Some(name), interval, Duration::ZERO, callable)
    }

    /// Like [`every_named`](Self::every_named), with the first run deferred
    /// by `initial_delay`.
    pub fn every_named_after<F>(
        &self,
        name: &str,
        initial_delay: Duration,
        interval: Duration,
        callable: F,
    ) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.submit_recurring(Some(name), interval, initial_delay, callable)
    }

    // -------------------------------------------------------------------------
    // Named-task control

    /// Returns the number of scheduled entries, enabled or not.
    pub fn tasks_count(&self) -> usize {
        self.shared.state.lock().unwrap().tasks.len()
    }

    /// Returns `true` when an entry named `name` is scheduled.
    pub fn is_scheduled(&self, name: &str) -> bool {
        let state = self.shared.state.lock().unwrap();
        state.find_key(fixed_hash(name), name).is_some()
    }

    /// Returns `true` when the entry named `name` exists and is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        let state = self.shared.state.lock().unwrap();
        match state.find_key(fixed_hash(name), name) {
            Some(key) => state.tasks[&key].enabled,
            None => false,
        }
    }

    /// Enables or disables the entry named `name`.
    ///
    /// A disabled entry keeps its slot and keeps advancing its fire time; it
    /// just does not dispatch. Returns `false` for unknown names.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        let Some(key) = state.find_key(fixed_hash(name), name) else {
            return false;
        };

        if let Some(schedulable) = state.tasks.get_mut(&key) {
            schedulable.enabled = enabled;
        }
        true
    }

    /// Removes the entry named `name`. Returns `false` for unknown names.
    pub fn remove_task(&self, name: &str) -> bool {
        let mut state = self.shared.state.lock().unwrap();
        let Some(key) = state.find_key(fixed_hash(name), name) else {
            return false;
        };

        state.tasks.remove(&key);
        true
    }

    /// Returns the interval of the recurring entry named `name`.
    ///
    /// `None` for unknown names and for one-shot entries.
    pub fn get_interval(&self, name: &str) -> Option<Duration> {
        let state = self.shared.state.lock().unwrap();
        let key = state.find_key(fixed_hash(name), name)?;
        state.tasks[&key].interval
    }

    /// Retunes the recurring entry named `name` to a new interval.
    ///
    /// The next fire time is recomputed from the entry's current anchor
    /// (`next_fire - old_interval`) and advanced past now with the new
    /// interval, then the entry is re-keyed and the scheduler woken. Returns
    /// `false` for unknown names, one-shot entries, and zero intervals.
    pub fn update_interval(&self, name: &str, interval: Duration) -> bool {
        if interval.is_zero() {
            return false;
        }

        {
            let mut state = self.shared.state.lock().unwrap();
            let Some(key) = state.find_key(fixed_hash(name), name) else {
                return false;
            };

            let Some(old_interval) = state.tasks[&key].interval else {
                return false;
            };

            let Some(mut schedulable) = state.tasks.remove(&key) else {
                return false;
            };

            // Anchor underflow can only happen for an entry that has never
            // fired and sits closer to process start than one old interval.
            let anchor = key.when.checked_sub(old_interval).unwrap_or(key.when);
            let now = Instant::now();
            let mut next = anchor;
            while next <= now {
                next += interval;
            }

            schedulable.interval = Some(interval);
            state.insert(next, schedulable);
        }

        self.shared.tasks_cv.notify_one();
        true
    }

    // -------------------------------------------------------------------------
    // Internals

    fn submit_once<F, R>(
        &self,
        name: Option<&str>,
        when: Instant,
        callable: F,
    ) -> Option<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = self.pool.package(callable);
        let schedulable = Schedulable {
            work: Work::Once(Some(task)),
            enabled: true,
            interval: None,
            identity: name.map(TaskIdentity::new),
        };

        self.add_task(when, schedulable).then_some(handle)
    }

    fn submit_recurring<F>(
        &self,
        name: Option<&str>,
        interval: Duration,
        initial_delay: Duration,
        callable: F,
    ) -> bool
    where
        F: Fn() + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return false;
        }

        let schedulable = Schedulable {
            work: Work::Shared(Arc::new(callable)),
            enabled: true,
            interval: Some(interval),
            identity: name.map(TaskIdentity::new),
        };

        self.add_task(Instant::now() + initial_delay, schedulable)
    }

    fn add_task(&self, when: Instant, schedulable: Schedulable) -> bool {
        if !self.pool.is_running() {
            return false;
        }

        {
            let mut state = self.shared.state.lock().unwrap();
            if let Some(identity) = &schedulable.identity {
                if state.find_key(identity.hash, &identity.name).is_some() {
                    return false;
                }
            }

            state.insert(when, schedulable);
        }

        self.shared.tasks_cv.notify_one();
        true
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// -----------------------------------------------------------------------------
// Scheduler loop

fn scheduler_loop(pool: &ThreadPool, shared: &SchedulerShared) {
    while pool.is_running() {
        let mut state = shared.state.lock().unwrap();

        if state.tasks.is_empty() {
            state = shared
                .tasks_cv
                .wait_while(state, |s| pool.is_running() && s.tasks.is_empty())
                .unwrap();
        } else {
            let next_fire = match state.tasks.first_key_value() {
                Some((key, _)) => key.when,
                None => continue,
            };

            let timeout = next_fire.saturating_duration_since(Instant::now());
            if !timeout.is_zero() {
                let (guard, wait) = shared.tasks_cv.wait_timeout(state, timeout).unwrap();
                state = guard;
                if !wait.timed_out() {
                    // A submission, retune, or stop request: re-examine the
                    // first key instead of dispatching.
                    continue;
                }
            }
        }

        if !pool.is_running() {
            return;
        }

        update_tasks(pool, &mut state);
    }
}

/// Dispatches every due entry and re-inserts the recurring ones.
fn update_tasks(pool: &ThreadPool, state: &mut SchedulerState) {
    let now = Instant::now();

    // Entries at or before `now` are due. `split_off` keeps the rest; the
    // sequence component makes the boundary key compare above every real
    // entry sharing the same instant.
    let boundary = FireKey {
        when: now,
        seq: u64::MAX,
    };
    let pending = state.tasks.split_off(&boundary);
    let due = mem::replace(&mut state.tasks, pending);

    for (key, mut schedulable) in due {
        if schedulable.enabled {
            match &mut schedulable.work {
                Work::Once(slot) => {
                    if let Some(task) = slot.take() {
                        pool.execute(task);
                    }
                }
                Work::Shared(callable) => {
                    let callable = Arc::clone(callable);
                    pool.execute(Task::new(move || callable()));
                }
            }
        }

        if let Some(interval) = schedulable.interval {
            // Fixed-phase cadence: advance from the old fire time in whole
            // intervals until the next slot lies in the future. Slots that
            // passed while we were busy are skipped, not replayed.
            let mut next = key.when + interval;
            let now = Instant::now();
            while next <= now {
                next += interval;
            }

            state.insert(next, schedulable);
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
