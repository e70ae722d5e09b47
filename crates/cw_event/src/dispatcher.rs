use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cw_task::{Task, ThreadPool};
use cw_utils::hash::HashMap;
use log::debug;

use crate::args::{EventArgs, EventHandler};

// -----------------------------------------------------------------------------
// Keys and records

/// Composite routing key: event name plus argument-type signature.
///
/// Same-named events with different argument tuples are distinct keys and
/// never see each other's handlers.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct EventKey {
    name: String,
    signature: u64,
}

impl EventKey {
    fn of<A: EventArgs>(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            signature: A::signature(),
        }
    }
}

/// A handler boxed behind its concrete argument tuple, recoverable at emit
/// time by downcast.
struct TypedHandler<A: EventArgs> {
    handler: Box<dyn EventHandler<A>>,
}

struct HandlerRecord {
    id: u64,
    invoker: Arc<dyn Any + Send + Sync>,
}

// -----------------------------------------------------------------------------
// EventDispatcher

/// A typed event dispatcher executing handlers on an owned [`ThreadPool`].
///
/// Handlers are registered under an event name *and* an argument tuple type;
/// [`emit`](Self::emit) only reaches the handlers whose tuple matches the
/// emitted arguments. Each matching handler runs as its own pool task with a
/// clone of the arguments, so one emit fans out to as many tasks as there
/// are handlers. Handler submission follows registration order; execution
/// order across handlers depends on pool parallelism.
///
/// Registration returns a handler id, unique between one
/// [`start`](Self::start)/[`stop`](Self::stop) pair — `stop` clears the
/// handler table and restarts the id sequence.
///
/// # Examples
///
/// ```
/// use cw_event::EventDispatcher;
///
/// let dispatcher = EventDispatcher::new();
/// assert!(dispatcher.start(2));
///
/// let id = dispatcher.add_handler::<(String,), _>("greet", |name: String| {
///     println!("hello {name}");
/// });
///
/// assert!(dispatcher.emit("greet", (String::from("clockwork"),)));
/// assert!(dispatcher.remove_handler(id));
/// assert!(!dispatcher.emit("greet", (String::from("nobody"),)));
///
/// assert!(dispatcher.stop());
/// ```
pub struct EventDispatcher {
    handlers: Mutex<HashMap<EventKey, Vec<HandlerRecord>>>,
    next_handler_id: AtomicU64,
    pool: ThreadPool,
}

impl EventDispatcher {
    /// Creates a stopped dispatcher with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: Mutex::new(HashMap::default()),
            next_handler_id: AtomicU64::new(0),
            pool: ThreadPool::new(),
        }
    }

    /// Starts the dispatch pool with `threads` workers.
    ///
    /// Returns `false` when already running.
    pub fn start(&self, threads: usize) -> bool {
        self.pool.start(threads)
    }

    /// Stops the dispatch pool, clears every handler, and restarts the
    /// handler id sequence.
    ///
    /// Returns `false` when not running (the table is cleared regardless).
    pub fn stop(&self) -> bool {
        {
            let mut handlers = self.handlers.lock().unwrap();
            handlers.clear();
        }
        self.next_handler_id.store(0, Ordering::Relaxed);

        self.pool.stop()
    }

    /// Returns `true` while the dispatch pool is running.
    pub fn is_running(&self) -> bool {
        self.pool.is_running()
    }

    /// Registers `handler` for events named `event_name` carrying the
    /// argument tuple `A`. Returns the handler's id.
    ///
    /// Handlers registered for the same key are dispatched in registration
    /// order. Registration is accepted whether or not the dispatcher is
    /// running.
    pub fn add_handler<A, H>(&self, event_name: &str, handler: H) -> u64
    where
        A: EventArgs,
        H: EventHandler<A>,
    {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed) + 1;
        let record = HandlerRecord {
            id,
            invoker: Arc::new(TypedHandler::<A> {
                handler: Box::new(handler),
            }),
        };

        let mut handlers = self.handlers.lock().unwrap();
        handlers
            .entry(EventKey::of::<A>(event_name))
            .or_default()
            .push(record);
        id
    }

    /// Emits an event: submits one pool task per registered handler, each
    /// invoked with a clone of `args`.
    ///
    /// Returns `false` when no handler is registered for the combination of
    /// `event_name` and the type of `args`.
    pub fn emit<A: EventArgs>(&self, event_name: &str, args: A) -> bool {
        let key = EventKey::of::<A>(event_name);

        // Snapshot the records under the lock; dispatch outside it so
        // handlers registered or removed mid-emit do not block on us.
        let snapshot: Vec<Arc<dyn Any + Send + Sync>> = {
            let handlers = self.handlers.lock().unwrap();
            match handlers.get(&key) {
                Some(records) => records
                    .iter()
                    .map(|record| Arc::clone(&record.invoker))
                    .collect(),
                None => return false,
            }
        };

        for invoker in snapshot {
            match invoker.downcast::<TypedHandler<A>>() {
                Ok(typed) => {
                    let args = args.clone();
                    self.pool
                        .execute(Task::new(move || typed.handler.invoke(args)));
                }
                Err(_) => {
                    // Two distinct tuples collided on the signature hash;
                    // invoking through the wrong type is not an option.
                    debug!("skipping handler with colliding signature for '{event_name}'");
                }
            }
        }

        true
    }

    /// Removes the handler with the given id, wherever it is registered.
    ///
    /// A key whose last handler is removed disappears entirely. Returns
    /// `false` when no record carries the id.
    pub fn remove_handler(&self, handler_id: u64) -> bool {
        let mut handlers = self.handlers.lock().unwrap();

        let mut emptied = None;
        let mut removed = false;
        for (key, records) in handlers.iter_mut() {
            if let Some(position) = records.iter().position(|record| record.id == handler_id) {
                records.remove(position);
                removed = true;
                if records.is_empty() {
                    emptied = Some(key.clone());
                }
                break;
            }
        }

        if let Some(key) = emptied {
            handlers.remove(&key);
        }
        removed
    }

    /// Removes every key whose event name starts with `event_name`,
    /// regardless of signature, with all their handlers.
    ///
    /// Returns `false` when nothing matched.
    pub fn remove_event(&self, event_name: &str) -> bool {
        let mut handlers = self.handlers.lock().unwrap();
        let before = handlers.len();
        handlers.retain(|key, _| !key.name.starts_with(event_name));
        handlers.len() != before
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventDispatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use super::EventDispatcher;

    /// Lets queued handler tasks run to completion on the dispatcher pool.
    ///
    /// All tests drive a single-worker pool, so a sentinel task resolves
    /// only after everything queued before it has finished.
    fn drain(dispatcher: &EventDispatcher) {
        dispatcher.pool.run(|| ()).wait().unwrap();
    }

    #[test]
    fn emit_reaches_handlers_in_registration_order() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start(1));

        let order = Arc::new(Mutex::new(Vec::new()));
        for n in 1..=3 {
            let order = Arc::clone(&order);
            dispatcher.add_handler::<(i32,), _>("sample", move |value: i32| {
                order.lock().unwrap().push((n, value));
            });
        }

        assert!(dispatcher.emit("sample", (7_i32,)));
        drain(&dispatcher);

        assert_eq!(*order.lock().unwrap(), vec![(1, 7), (2, 7), (3, 7)]);
        assert!(dispatcher.stop());
    }

    #[test]
    fn emit_with_mismatched_signature_is_rejected() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start(1));

        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            dispatcher.add_handler::<(i32,), _>("typed", move |_: i32| {
                calls.fetch_add(1, Ordering::AcqRel);
            });
        }

        assert!(!dispatcher.emit("typed", ("wrong",)));
        assert!(!dispatcher.emit("typed", (1_i32, 2_i32)));
        assert!(!dispatcher.emit("other", (1_i32,)));
        drain(&dispatcher);
        assert_eq!(calls.load(Ordering::Acquire), 0);

        assert!(dispatcher.emit("typed", (5_i32,)));
        drain(&dispatcher);
        assert_eq!(calls.load(Ordering::Acquire), 1);

        assert!(dispatcher.stop());
    }

    #[test]
    fn unit_events_need_no_arguments() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start(1));

        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            dispatcher.add_handler::<(), _>("ping", move || {
                calls.fetch_add(1, Ordering::AcqRel);
            });
        }

        assert!(dispatcher.emit("ping", ()));
        assert!(dispatcher.emit("ping", ()));
        drain(&dispatcher);
        assert_eq!(calls.load(Ordering::Acquire), 2);

        assert!(dispatcher.stop());
    }

    #[test]
    fn remove_handler_restores_the_pre_add_state() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start(1));

        let first = dispatcher.add_handler::<(i32,), _>("key", |_: i32| {});
        let second = dispatcher.add_handler::<(i32,), _>("key", |_: i32| {});
        assert_ne!(first, second);

        assert!(dispatcher.remove_handler(first));
        assert!(!dispatcher.remove_handler(first));
        assert!(dispatcher.emit("key", (0_i32,)));

        // Removing the last handler drops the key entirely.
        assert!(dispatcher.remove_handler(second));
        assert!(!dispatcher.emit("key", (0_i32,)));

        assert!(dispatcher.stop());
    }

    #[test]
    fn remove_event_matches_names_by_prefix_across_signatures() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start(1));

        dispatcher.add_handler::<(i32,), _>("click", |_: i32| {});
        dispatcher.add_handler::<(String,), _>("click", |_: String| {});
        dispatcher.add_handler::<(), _>("click.left", || {});
        dispatcher.add_handler::<(), _>("scroll", || {});

        assert!(dispatcher.remove_event("click"));
        assert!(!dispatcher.emit("click", (1_i32,)));
        assert!(!dispatcher.emit("click", (String::new(),)));
        assert!(!dispatcher.emit("click.left", ()));
        assert!(dispatcher.emit("scroll", ()));

        assert!(!dispatcher.remove_event("click"));
        assert!(dispatcher.stop());
    }

    #[test]
    fn handler_ids_grow_within_a_run_and_reset_on_stop() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start(1));

        let a = dispatcher.add_handler::<(), _>("e", || {});
        let b = dispatcher.add_handler::<(), _>("e", || {});
        assert!(b > a);

        assert!(dispatcher.stop());
        assert!(dispatcher.start(1));

        let after_restart = dispatcher.add_handler::<(), _>("e", || {});
        assert_eq!(after_restart, a);

        assert!(dispatcher.stop());
    }

    #[test]
    fn stop_clears_registered_handlers() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start(1));

        dispatcher.add_handler::<(), _>("gone", || {});
        assert!(dispatcher.stop());

        assert!(dispatcher.start(1));
        assert!(!dispatcher.emit("gone", ()));
        assert!(dispatcher.stop());
    }

    #[test]
    fn arguments_are_cloned_per_handler() {
        let dispatcher = EventDispatcher::new();
        assert!(dispatcher.start(1));

        let seen = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            dispatcher.add_handler::<(String,), _>("name", move |value: String| {
                seen.lock().unwrap().push(value);
            });
        }

        assert!(dispatcher.emit("name", (String::from("twice"),)));
        drain(&dispatcher);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|value| value == "twice"));

        assert!(dispatcher.stop());
    }
}
