use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

// -----------------------------------------------------------------------------
// BlockingQueue

/// A thread-safe bounded FIFO queue.
///
/// The queue holds at most `capacity` items. [`push`](Self::push) blocks
/// while the queue is full and [`pop`](Self::pop) blocks while it is empty;
/// the `try_` variants return immediately instead. Contention is expressed
/// purely by blocking — no operation fails with an error.
///
/// Two condition variables carry the edge notifications: when the queue
/// transitions out of *full* exactly one blocked pusher is woken, and when it
/// transitions out of *empty* exactly one blocked popper is woken. All waits
/// re-check their predicate, so spurious wakeups are harmless.
///
/// # Examples
///
/// ```
/// use cw_task::BlockingQueue;
///
/// let queue = BlockingQueue::new(2);
/// queue.push(1);
/// queue.push(2);
/// assert!(queue.try_push(3).is_err());
///
/// assert_eq!(queue.pop(), 1);
/// assert_eq!(queue.pop(), 2);
/// assert_eq!(queue.try_pop(), None);
/// ```
pub struct BlockingQueue<T> {
    items: Mutex<VecDeque<T>>,
    /// Signaled when a pop makes a full queue non-full.
    not_full: Condvar,
    /// Signaled when a push makes an empty queue non-empty.
    not_empty: Condvar,
    capacity: usize,
}

impl<T> BlockingQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    ///
    /// A zero capacity is clamped to 1 — a queue that can never accept an
    /// item would deadlock the first pusher.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    /// Inserts `item`, blocking while the queue is full.
    pub fn push(&self, item: T) {
        let mut items = self.items.lock().unwrap();
        while items.len() >= self.capacity {
            items = self.not_full.wait(items).unwrap();
        }

        items.push_back(item);
        self.notify_pushed(items);
    }

    /// Attempts to insert `item` without blocking.
    ///
    /// Returns the item back as `Err` when the queue is full.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            return Err(item);
        }

        items.push_back(item);
        self.notify_pushed(items);
        Ok(())
    }

    /// Removes the oldest item, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        let mut items = self.items.lock().unwrap();
        while items.is_empty() {
            items = self.not_empty.wait(items).unwrap();
        }

        let item = items.pop_front().expect("queue is non-empty");
        self.notify_popped(items);
        item
    }

    /// Attempts to remove the oldest item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let mut items = self.items.lock().unwrap();
        let item = items.pop_front()?;
        self.notify_popped(items);
        Some(item)
    }

    /// Returns the number of items currently queued.
    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    /// Returns `true` when no items are queued.
    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    /// Returns the maximum number of items the queue can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wakes one popper when this push made the queue non-empty.
    fn notify_pushed(&self, items: std::sync::MutexGuard<'_, VecDeque<T>>) {
        let became_non_empty = items.len() == 1;
        drop(items);

        if became_non_empty {
            self.not_empty.notify_one();
        }
    }

    /// Wakes one pusher when this pop made the queue non-full.
    fn notify_popped(&self, items: std::sync::MutexGuard<'_, VecDeque<T>>) {
        let became_non_full = items.len() == self.capacity - 1;
        drop(items);

        if became_non_full {
            self.not_full.notify_one();
        }
    }
}

// -----------------------------------------------------------------------------
// Tests

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::BlockingQueue;

    #[test]
    fn fifo_order() {
        let queue = BlockingQueue::new(8);
        for n in 0..5 {
            queue.push(n);
        }
        for n in 0..5 {
            assert_eq!(queue.pop(), n);
        }
    }

    #[test]
    fn capacity_is_clamped_to_one() {
        let queue = BlockingQueue::<u8>::new(0);
        assert_eq!(queue.capacity(), 1);

        queue.push(7);
        assert_eq!(queue.try_push(8), Err(8));
        assert_eq!(queue.pop(), 7);
    }

    #[test]
    fn try_push_rejects_when_full() {
        let queue = BlockingQueue::new(2);
        assert!(queue.try_push("a").is_ok());
        assert!(queue.try_push("b").is_ok());
        assert_eq!(queue.try_push("c"), Err("c"));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn try_pop_returns_none_when_empty() {
        let queue = BlockingQueue::<i32>::new(4);
        assert_eq!(queue.try_pop(), None);
        queue.push(1);
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn blocked_push_is_released_by_pop() {
        let queue = Arc::new(BlockingQueue::new(1));
        queue.push(0);

        let pusher = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(1))
        };

        // Give the pusher time to block on the full queue.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.pop(), 0);

        pusher.join().unwrap();
        assert_eq!(queue.pop(), 1);
    }

    #[test]
    fn blocked_pop_is_released_by_push() {
        let queue = Arc::new(BlockingQueue::new(1));

        let popper = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };

        thread::sleep(Duration::from_millis(50));
        queue.push(99);

        assert_eq!(popper.join().unwrap(), 99);
    }

    #[test]
    fn size_stays_within_bounds_under_contention() {
        const CAPACITY: usize = 4;
        const ITEMS: usize = 200;

        let queue = Arc::new(BlockingQueue::new(CAPACITY));

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for n in 0..ITEMS {
                    queue.push(n);
                    assert!(queue.len() <= CAPACITY);
                }
            })
        };

        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for expected in 0..ITEMS {
                    let item = queue.pop();
                    assert_eq!(item, expected);
                }
            })
        };

        producer.join().unwrap();
        consumer.join().unwrap();
        assert!(queue.is_empty());
    }
}
