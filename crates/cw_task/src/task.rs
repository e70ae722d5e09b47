use core::fmt;

// -----------------------------------------------------------------------------
// Task

/// A type-erased, parameterless unit of work.
///
/// Wraps any `FnOnce() + Send` callable without exposing its concrete type.
/// A task is created by the submitter, moved through a queue, and consumed by
/// [`invoke`](Task::invoke) on whichever thread picks it up — ownership
/// guarantees it runs at most once.
///
/// Return values are not part of the task contract; callers that need a
/// result pair the callable with a completion handle before erasing it (see
/// [`ThreadPool::run`](crate::ThreadPool::run)).
///
/// # Examples
///
/// ```
/// use cw_task::Task;
///
/// let task = Task::new(|| println!("tick"));
/// task.invoke();
/// ```
pub struct Task {
    callable: Box<dyn FnOnce() + Send + 'static>,
}

impl Task {
    /// Erases `callable` into a task.
    pub fn new<F>(callable: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            callable: Box::new(callable),
        }
    }

    /// Runs the wrapped callable, consuming the task.
    #[inline]
    pub fn invoke(self) {
        (self.callable)();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task(..)")
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::Task;

    #[test]
    fn invoke_runs_the_callable() {
        let counter = Arc::new(AtomicU32::new(0));
        let task = {
            let counter = Arc::clone(&counter);
            Task::new(move || {
                counter.fetch_add(1, Ordering::AcqRel);
            })
        };

        task.invoke();
        assert_eq!(counter.load(Ordering::Acquire), 1);
    }

    #[test]
    fn tasks_move_across_threads() {
        let counter = Arc::new(AtomicU32::new(0));
        let task = {
            let counter = Arc::clone(&counter);
            Task::new(move || {
                counter.fetch_add(1, Ordering::AcqRel);
            })
        };

        std::thread::spawn(move || task.invoke()).join().unwrap();
        assert_eq!(counter.load(Ordering::Acquire), 1);
    }

    #[test]
    fn is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Task>();
    }
}
