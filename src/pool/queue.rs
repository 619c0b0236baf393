//! Capacity-bounded blocking queue.
//!
//! Producers block while the queue is full, consumers while it is empty.
//! `close` drops whatever is still queued, wakes every waiter and makes all
//! later pushes fail and pops return `None`.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Rejected push; carries the item back to the caller.
pub enum PushError<T> {
    Full(T),
    Closed(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::Closed(item) => item,
        }
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushError::Full(_) => f.write_str("Full(..)"),
            PushError::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}

struct Inner<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct BlockQueue<T> {
    inner: Mutex<Inner<T>>,
    consumer: Condvar,
    producer: Condvar,
    capacity: usize,
}

impl<T> BlockQueue<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                closed: false,
            }),
            consumer: Condvar::new(),
            producer: Condvar::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.inner.lock().items.len() >= self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Appends `item`, waiting for room. Returns the item if the queue closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut inner = self.inner.lock();
        while inner.items.len() >= self.capacity && !inner.closed {
            self.producer.wait(&mut inner);
        }
        if inner.closed {
            return Err(item);
        }
        inner.items.push_back(item);
        self.consumer.notify_one();
        Ok(())
    }

    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(PushError::Closed(item));
        }
        if inner.items.len() >= self.capacity {
            return Err(PushError::Full(item));
        }
        inner.items.push_back(item);
        self.consumer.notify_one();
        Ok(())
    }

    /// Takes the oldest item, waiting while empty. `None` once closed.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(item) = inner.items.pop_front() {
                self.producer.notify_one();
                return Some(item);
            }
            self.consumer.wait(&mut inner);
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(item) = inner.items.pop_front() {
                self.producer.notify_one();
                return Some(item);
            }
            if self.consumer.wait_until(&mut inner, deadline).timed_out() {
                return None;
            }
        }
    }

    pub fn clear(&self) {
        let drained: Vec<T> = {
            let mut inner = self.inner.lock();
            inner.items.drain(..).collect()
        };
        self.producer.notify_all();
        drop(drained);
    }

    pub fn close(&self) {
        let drained: Vec<T> = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.items.drain(..).collect()
        };
        self.consumer.notify_all();
        self.producer.notify_all();
        // queued items are dropped outside the lock
        drop(drained);
    }
}

impl<T> fmt::Debug for BlockQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BlockQueue")
            .field("len", &inner.items.len())
            .field("capacity", &self.capacity)
            .field("closed", &inner.closed)
            .finish()
    }
}
