use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread::JoinHandle;
use std::{panic, thread};

use futures_lite::FutureExt;
use log::debug;

use crate::handle::TaskHandle;
use crate::task::Task;

// -----------------------------------------------------------------------------
// PoolShared

/// State shared between the pool handle and its worker threads.
struct PoolShared {
    tasks: Mutex<VecDeque<Task>>,
    task_cv: Condvar,
    running: AtomicBool,
}

impl PoolShared {
    fn enqueue(&self, task: Task) {
        {
            let mut tasks = self.tasks.lock().unwrap();
            tasks.push_back(task);
        }

        self.task_cv.notify_one();
    }
}

// -----------------------------------------------------------------------------
// ThreadPool

/// A fixed-size pool of worker threads executing type-erased tasks.
///
/// Submitted callables run in FIFO submission order as workers become free.
/// [`run`](Self::run) returns a [`TaskHandle`] carrying the callable's
/// result; [`execute`](Self::execute) enqueues a bare [`Task`] when no result
/// is needed.
///
/// The pool starts stopped. [`start`](Self::start) spawns the workers and
/// does not return before every worker has entered its wait loop;
/// [`stop`](Self::stop) discards still-queued tasks (their handles resolve
/// with [`TaskError::Cancelled`](crate::TaskError::Cancelled)), lets
/// in-flight tasks finish, and joins every worker. A stopped pool can be
/// started again.
///
/// A panic inside a submitted callable never takes a worker down: the worker
/// logs the failure and keeps serving the queue, and the task's handle
/// resolves with the panic payload.
///
/// # Examples
///
/// ```
/// use cw_task::ThreadPool;
///
/// let pool = ThreadPool::new();
/// assert!(pool.start(4));
/// assert!(!pool.start(4)); // already running
///
/// let doubled = pool.run(|| 2 + 2);
/// assert_eq!(doubled.wait().unwrap(), 4);
///
/// assert!(pool.stop());
/// assert!(!pool.stop()); // already stopped
/// ```
pub struct ThreadPool {
    shared: Arc<PoolShared>,
    /// Worker handles; the mutex also serializes `start`/`stop`.
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    /// Creates a stopped pool with no workers.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PoolShared {
                tasks: Mutex::new(VecDeque::new()),
                task_cv: Condvar::new(),
                running: AtomicBool::new(false),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Starts `count` worker threads.
    ///
    /// The count is clamped to `[1, available_parallelism]`. Blocks until
    /// every worker has reached its wait loop, so a task submitted right
    /// after `start` returns is guaranteed to have a consumer.
    ///
    /// Returns `false` when the pool is already running.
    pub fn start(&self, count: usize) -> bool {
        let mut workers = self.workers.lock().unwrap();
        if self.shared.running.load(Ordering::Acquire) {
            return false;
        }

        let count = count.clamp(1, available_parallelism());
        self.shared.running.store(true, Ordering::Release);

        let ready = Arc::new(Barrier::new(count + 1));
        workers.reserve(count);
        for index in 0..count {
            let shared = Arc::clone(&self.shared);
            let ready = Arc::clone(&ready);
            let handle = thread::Builder::new()
                .name(format!("cw-worker ({index})"))
                .spawn(move || worker(&shared, &ready))
                .expect("failed to spawn worker thread");
            workers.push(handle);
        }

        ready.wait();
        debug!("thread pool started with {count} workers");
        true
    }

    /// Stops the pool: discards queued tasks, wakes and joins every worker.
    ///
    /// Returns `false` when the pool is not running.
    pub fn stop(&self) -> bool {
        let mut workers = self.workers.lock().unwrap();
        if !self.shared.running.load(Ordering::Acquire) {
            return false;
        }

        self.shared.running.store(false, Ordering::Release);

        {
            let mut tasks = self.shared.tasks.lock().unwrap();
            tasks.clear();
        }

        self.shared.task_cv.notify_all();

        for worker in workers.drain(..) {
            if let Err(payload) = worker.join() {
                debug!("worker thread terminated abnormally: {payload:?}");
            }
        }

        debug!("thread pool stopped");
        true
    }

    /// Submits a callable and returns a handle to its result.
    ///
    /// The callable runs as soon as a worker is free. Submitting to a
    /// stopped pool parks the task in the queue; it is either executed after
    /// the next [`start`](Self::start) or discarded by [`stop`](Self::stop).
    pub fn run<F, R>(&self, callable: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = self.package(callable);
        self.execute(task);
        handle
    }

    /// Packages a callable into an executable [`Task`] and its result
    /// handle, without submitting it.
    ///
    /// The task can be enqueued later with [`execute`](Self::execute) — the
    /// deferred-submission path the task scheduler uses. Dropping the task
    /// unrun resolves the handle with
    /// [`TaskError::Cancelled`](crate::TaskError::Cancelled).
    pub fn package<F, R>(&self, callable: F) -> (Task, TaskHandle<R>)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        // Capture panics into the future's output so the handle observes
        // them; the worker-side catch is what keeps the worker itself alive.
        let future = AssertUnwindSafe(async move { callable() }).catch_unwind();

        let shared = Arc::clone(&self.shared);
        let (runnable, task) = async_task::spawn(future, move |runnable: async_task::Runnable| {
            shared.enqueue(Task::new(move || {
                runnable.run();
            }));
        });

        let task_for_queue = Task::new(move || {
            runnable.run();
        });
        (task_for_queue, TaskHandle::new(task.fallible()))
    }

    /// Enqueues a bare task with no result handle.
    pub fn execute(&self, task: Task) {
        self.shared.enqueue(task);
    }

    /// Returns the number of live worker threads.
    pub fn threads_count(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    /// Returns `true` while the pool is running.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clamp ceiling for worker counts.
fn available_parallelism() -> usize {
    thread::available_parallelism().map_or(1, usize::from)
}

// -----------------------------------------------------------------------------
// Worker loop

fn worker(shared: &PoolShared, ready: &Barrier) {
    ready.wait();

    loop {
        let task = {
            let mut tasks = shared.tasks.lock().unwrap();
            loop {
                if !shared.running.load(Ordering::Acquire) {
                    return;
                }
                if let Some(task) = tasks.pop_front() {
                    break task;
                }
                tasks = shared.task_cv.wait(tasks).unwrap();
            }
        };

        // Run outside the lock; a panicking task must not poison the queue
        // or retire the worker.
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.invoke())) {
            let message = payload
                .downcast_ref::<&'static str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string payload>");
            debug!("task panicked, worker continues: {message}");
        }
    }
}

// -----------------------------------------------------------------------------
// Tests
