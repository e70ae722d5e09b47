//! Typed publish/subscribe over a [`cw_task::ThreadPool`], plus an
//! equality-gated observable value.
//!
//! Events are addressed by name *and* by the argument types of their
//! handlers: emitting `("door", (3_i32,))` only reaches handlers registered
//! for `"door"` with a single `i32` parameter. Handlers run asynchronously
//! on the dispatcher's pool.
//!
//! # Examples
//!
//! ```
//! use cw_event::EventDispatcher;
//!
//! let dispatcher = EventDispatcher::new();
//! assert!(dispatcher.start(1));
//!
//! dispatcher.add_handler::<(i32,), _>("door", |floor: i32| {
//!     println!("door opened on floor {floor}");
//! });
//!
//! assert!(dispatcher.emit("door", (3_i32,)));
//! assert!(!dispatcher.emit("door", ("penthouse",))); // wrong signature
//!
//! assert!(dispatcher.stop());
//! ```

// -----------------------------------------------------------------------------
// Modules

mod args;
mod dispatcher;
mod observable;

// -----------------------------------------------------------------------------
// Exports

pub use args::{EventArgs, EventHandler};
pub use dispatcher::EventDispatcher;
pub use observable::Observable;
