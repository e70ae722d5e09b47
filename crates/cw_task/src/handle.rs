use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use std::any::Any;
use std::error::Error;

use async_task::FallibleTask;
use futures_lite::future::block_on;

/// How the pool reports a submitted callable's outcome: the value it
/// returned, or the panic payload it unwound with.
pub(crate) type TaskResult<R> = std::thread::Result<R>;

// -----------------------------------------------------------------------------
// TaskError

/// The ways a [`TaskHandle`] can resolve without a value.
pub enum TaskError {
    /// The task was dropped before it could run, typically because the pool
    /// was stopped while the task was still queued.
    Cancelled,
    /// The callable panicked; the payload is the one the panic unwound with.
    Panicked(Box<dyn Any + Send>),
}

impl TaskError {
    /// Best-effort extraction of a panic message from the payload.
    fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
        payload
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
    }
}

impl fmt::Debug for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Panicked(payload) => match Self::panic_message(payload.as_ref()) {
                Some(message) => f.debug_tuple("Panicked").field(&message).finish(),
                None => f.write_str("Panicked(..)"),
            },
        }
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("task was cancelled before it could run"),
            Self::Panicked(payload) => match Self::panic_message(payload.as_ref()) {
                Some(message) => write!(f, "task panicked: {message}"),
                None => f.write_str("task panicked"),
            },
        }
    }
}

impl Error for TaskError {}

// -----------------------------------------------------------------------------
// TaskHandle

/// An awaitable handle to a callable submitted to a
/// [`ThreadPool`](crate::ThreadPool).
///
/// The handle is a [`Future`] resolving to the callable's return value, or
/// to a [`TaskError`] when the task was cancelled or panicked. Synchronous
/// callers can use [`wait`](Self::wait) instead of awaiting.
///
/// Dropping the handle **detaches** the task: the work still runs, only the
/// result is discarded. Fire-and-forget submission is therefore just
/// ignoring the handle.
pub struct TaskHandle<R> {
    task: Option<FallibleTask<TaskResult<R>>>,
}

impl<R> TaskHandle<R> {
    pub(crate) fn new(task: FallibleTask<TaskResult<R>>) -> Self {
        Self { task: Some(task) }
    }

    /// Explicitly lets the task keep running in the background.
    ///
    /// Equivalent to dropping the handle; provided for call sites that want
    /// to make the fire-and-forget intent visible.
    pub fn detach(mut self) {
        if let Some(task) = self.task.take() {
            task.detach();
        }
    }

    /// Blocks the current thread until the task resolves.
    pub fn wait(self) -> Result<R, TaskError> {
        block_on(self)
    }
}

impl<R> Future for TaskHandle<R> {
    type Output = Result<R, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let task = self
            .task
            .as_mut()
            .expect("TaskHandle polled after completion");

        match Pin::new(task).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(outcome) => {
                // Consumed: Drop must not detach a finished task.
                self.task = None;
                Poll::Ready(match outcome {
                    Some(Ok(value)) => Ok(value),
                    Some(Err(payload)) => Err(TaskError::Panicked(payload)),
                    None => Err(TaskError::Cancelled),
                })
            }
        }
    }
}

impl<R> Drop for TaskHandle<R> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.detach();
        }
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TaskHandle(..)")
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use super::TaskError;

    #[test]
    fn error_messages() {
        let cancelled = TaskError::Cancelled;
        assert_eq!(
            cancelled.to_string(),
            "task was cancelled before it could run"
        );

        let panicked = TaskError::Panicked(Box::new("boom"));
        assert_eq!(panicked.to_string(), "task panicked: boom");

        let silent = TaskError::Panicked(Box::new(17_u8));
        assert_eq!(silent.to_string(), "task panicked");
    }
}
