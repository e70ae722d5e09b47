//! Time-triggered execution: a task scheduler dispatching one-shot and
//! recurring work through a [`cw_task::ThreadPool`], and a single-callback
//! periodic timer with drift correction.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use cw_sched::TaskScheduler;
//!
//! let scheduler = TaskScheduler::new();
//! assert!(scheduler.start(2));
//!
//! let answer = scheduler
//!     .after(Duration::from_millis(10), || 6 * 7)
//!     .expect("scheduler accepts the task");
//! assert_eq!(answer.wait().unwrap(), 42);
//!
//! assert!(scheduler.stop());
//! ```

// -----------------------------------------------------------------------------
// Modules

mod scheduler;
mod timer;

// -----------------------------------------------------------------------------
// Exports

pub use scheduler::TaskScheduler;
pub use timer::HighPrecisionTimer;
