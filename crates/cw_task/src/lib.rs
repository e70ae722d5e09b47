//! Task execution primitives: a type-erased unit of work, a bounded blocking
//! queue, and a fixed-size thread pool that turns submitted callables into
//! awaitable results.
//!
//! The pool is the execution backend for the higher SDK layers (the task
//! scheduler and the event dispatcher both feed it), but every type in this
//! crate is usable on its own.
//!
//! # Examples
//!
//! ```
//! use cw_task::ThreadPool;
//!
//! let pool = ThreadPool::new();
//! assert!(pool.start(2));
//!
//! let handle = pool.run(|| 21 * 2);
//! assert_eq!(handle.wait().unwrap(), 42);
//!
//! assert!(pool.stop());
//! ```

// -----------------------------------------------------------------------------
// Modules

mod handle;
mod pool;
mod queue;
mod task;

// -----------------------------------------------------------------------------
// Exports

pub use handle::{TaskError, TaskHandle};
pub use pool::ThreadPool;
pub use queue::BlockingQueue;
pub use task::Task;

/// Blocks the current thread on `future` until it resolves.
///
/// A re-export of [`futures_lite::future::block_on`] so synchronous callers
/// can await a [`TaskHandle`] without pulling in an async runtime.
pub use futures_lite::future::block_on;
