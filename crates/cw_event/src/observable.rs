use std::sync::Mutex;

// -----------------------------------------------------------------------------
// Observable

struct ObservableState<T> {
    value: T,
    callback_enabled: bool,
}

/// A value that notifies a callback when it actually changes.
///
/// [`set`](Self::set) compares the incoming value against the current one
/// and only stores and notifies on a real change; assigning an equal value
/// is a no-op. The callback can be suspended with
/// [`set_callback_enabled`](Self::set_callback_enabled) — assignments made
/// while disabled still update the value, silently.
///
/// The callback runs under the observable's lock, so concurrent setters
/// observe a serialized notification sequence. Keep callbacks short and
/// never re-enter the observable from inside one.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use cw_event::Observable;
///
/// let notifications = Arc::new(AtomicUsize::new(0));
/// let observed = {
///     let notifications = Arc::clone(&notifications);
///     Observable::new(0, move |_: &i32| {
///         notifications.fetch_add(1, Ordering::AcqRel);
///     })
/// };
///
/// observed.set(0); // unchanged, no notification
/// observed.set(1); // changed, notifies
/// assert_eq!(observed.value(), 1);
/// assert_eq!(notifications.load(Ordering::Acquire), 1);
/// ```
pub struct Observable<T: PartialEq> {
    state: Mutex<ObservableState<T>>,
    callback: Box<dyn Fn(&T) + Send + Sync>,
}

impl<T: PartialEq> Observable<T> {
    /// Creates an observable with an initial value and a change callback.
    ///
    /// The callback starts enabled.
    pub fn new<F>(value: T, callback: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        Self {
            state: Mutex::new(ObservableState {
                value,
                callback_enabled: true,
            }),
            callback: Box::new(callback),
        }
    }

    /// Returns a copy of the observed value.
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        self.state.lock().unwrap().value.clone()
    }

    /// Returns `true` while change notifications are enabled.
    pub fn callback_enabled(&self) -> bool {
        self.state.lock().unwrap().callback_enabled
    }

    /// Enables or disables change notifications.
    pub fn set_callback_enabled(&self, enabled: bool) {
        self.state.lock().unwrap().callback_enabled = enabled;
    }

    /// Assigns a new value.
    ///
    /// Returns without side effects when `value` equals the current one;
    /// otherwise stores it and, if notifications are enabled, invokes the
    /// callback with the stored value.
    pub fn set(&self, value: T) {
        let mut state = self.state.lock().unwrap();

        if value == state.value {
            return;
        }

        state.value = value;

        if state.callback_enabled {
            (self.callback)(&state.value);
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;

    use super::Observable;

    fn counting_observable(initial: i32) -> (Observable<i32>, Arc<AtomicUsize>) {
        let notifications = Arc::new(AtomicUsize::new(0));
        let observable = {
            let notifications = Arc::clone(&notifications);
            Observable::new(initial, move |_: &i32| {
                notifications.fetch_add(1, Ordering::AcqRel);
            })
        };
        (observable, notifications)
    }

    #[test]
    fn callback_fires_only_on_enabled_changes() {
        let (observed, notifications) = counting_observable(0);

        observed.set(0); // unchanged
        observed.set(1); // fires
        observed.set(1); // unchanged

        observed.set_callback_enabled(false);
        observed.set(2); // silent change

        observed.set_callback_enabled(true);
        observed.set(2); // unchanged
        observed.set(3); // fires

        assert_eq!(notifications.load(Ordering::Acquire), 2);
        assert_eq!(observed.value(), 3);
    }

    #[test]
    fn disabled_assignments_still_update_the_value() {
        let (observed, notifications) = counting_observable(10);

        observed.set_callback_enabled(false);
        assert!(!observed.callback_enabled());
        observed.set(11);

        assert_eq!(observed.value(), 11);
        assert_eq!(notifications.load(Ordering::Acquire), 0);
    }

    #[test]
    fn callback_receives_the_new_value() {
        let last_seen = Arc::new(Mutex::new(None));
        let observed = {
            let last_seen = Arc::clone(&last_seen);
            Observable::new(String::new(), move |value: &String| {
                *last_seen.lock().unwrap() = Some(value.clone());
            })
        };

        observed.set(String::from("updated"));
        assert_eq!(last_seen.lock().unwrap().as_deref(), Some("updated"));
    }

    #[test]
    fn concurrent_setters_serialize_notifications() {
        let (observed, notifications) = counting_observable(0);
        let observed = Arc::new(observed);

        thread::scope(|scope| {
            for offset in 1..=4 {
                let observed = Arc::clone(&observed);
                scope.spawn(move || {
                    for step in 0..25 {
                        observed.set(offset * 100 + step);
                    }
                });
            }
        });

        // Every stored assignment differed from its predecessor inside the
        // lock, so the notification count equals the number of effective
        // changes; at minimum each thread's first assignment changed it.
        assert!(notifications.load(Ordering::Acquire) >= 4);
        assert!(observed.value() != 0);
    }
}
