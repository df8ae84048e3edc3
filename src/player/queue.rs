//! Bounded frame queue for ClipPlayer
//!
//! A small fixed-capacity FIFO with blocking push/pop and an explicit
//! stop/start cancellation protocol. One instance exists per media
//! type. The tiny capacity is deliberate: it caps end-to-end latency
//! and memory, and throttles the decoder through backpressure so a
//! seek never has to discard much decode-ahead.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

/// Thread-safe bounded FIFO with cooperative cancellation.
pub struct BoundedQueue<T> {
    inner: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    stopped: bool,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` items. The queue
    /// starts in the stopped state; call `start()` to arm it.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                stopped: true,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Push an item, blocking while the queue is full.
    ///
    /// Returns the item back to the caller if the queue is (or becomes)
    /// stopped, so a producer always knows when a frame was refused.
    pub fn wait_and_push(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        loop {
            if inner.stopped {
                return Err(item);
            }
            if inner.items.len() < self.capacity {
                inner.items.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            self.not_full.wait(&mut inner);
        }
    }

    /// Pop the oldest item, blocking while the queue is empty.
    ///
    /// Returns None if the queue is (or becomes) stopped.
    pub fn wait_and_pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if inner.stopped {
                return None;
            }
            if let Some(item) = inner.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            self.not_empty.wait(&mut inner);
        }
    }

    /// Mark the queue inert and wake every blocked waiter. This is the
    /// sole cancellation primitive; it never deadlocks regardless of
    /// fill level.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        inner.stopped = true;
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Clear the stopped flag, beginning a fresh epoch. Items pushed
    /// before a stop but never popped are stale; discarding them is the
    /// caller's protocol (see `drain`), not the queue's.
    pub fn start(&self) {
        self.inner.lock().stopped = false;
    }

    /// Remove and drop all queued items, returning how many there were.
    pub fn drain(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.items.len();
        inner.items.clear();
        self.not_full.notify_all();
        count
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }
}
