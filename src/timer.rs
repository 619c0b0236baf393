//! Min-heap of connection deadlines.
//!
//! Each entry carries the id it belongs to (the connection's token), its expiry
//! and the callback that evicts it. A side index maps ids to heap slots so
//! that `adjust` and `remove` stay logarithmic; every swap keeps it in sync.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::time::{Duration, Instant};

use thiserror::Error;

/// Poll interval reported by [`TimerHeap::next_tick`] when nothing is scheduled.
pub const IDLE_POLL_MS: i32 = 1000;

pub type TimeoutCallback = Box<dyn FnOnce() + Send>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer {0} is already scheduled")]
    DuplicateId(String),
    #[error("no timer scheduled for {0}")]
    UnknownId(String),
}

struct TimerNode<Id> {
    id: Id,
    expires: Instant,
    callback: TimeoutCallback,
}

pub struct TimerHeap<Id> {
    heap: Vec<TimerNode<Id>>,
    index: HashMap<Id, usize>,
}

impl<Id> Default for TimerHeap<Id>
where
    Id: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<Id> TimerHeap<Id>
where
    Id: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        Self {
            heap: Vec::with_capacity(64),
            index: HashMap::with_capacity(64),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.index.contains_key(&id)
    }

    /// Schedules `on_expire` to run `timeout` from now.
    ///
    /// Fails if `id` already has an entry; use [`adjust`](Self::adjust) to
    /// move an existing deadline.
    pub fn add<F>(&mut self, id: Id, timeout: Duration, on_expire: F) -> Result<(), TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.index.contains_key(&id) {
            return Err(TimerError::DuplicateId(format!("{id:?}")));
        }

        let i = self.heap.len();
        self.index.insert(id, i);
        self.heap.push(TimerNode {
            id,
            expires: Instant::now() + timeout,
            callback: Box::new(on_expire),
        });
        self.sift_up(i);
        Ok(())
    }

    /// Moves the deadline of `id` to `timeout` from now.
    pub fn adjust(&mut self, id: Id, timeout: Duration) -> Result<(), TimerError> {
        let i = *self
            .index
            .get(&id)
            .ok_or_else(|| TimerError::UnknownId(format!("{id:?}")))?;

        let old = self.heap[i].expires;
        let new = Instant::now() + timeout;
        self.heap[i].expires = new;

        if new < old {
            self.sift_up(i);
        } else {
            let n = self.heap.len();
            self.sift_down(i, n);
        }
        Ok(())
    }

    /// Runs the callback of `id` right away and drops its entry.
    pub fn do_work(&mut self, id: Id) -> bool {
        match self.index.get(&id).copied() {
            Some(i) => {
                let node = self.delete(i);
                (node.callback)();
                true
            }
            None => false,
        }
    }

    /// Cancels `id` without running its callback.
    pub fn remove(&mut self, id: Id) -> bool {
        match self.index.get(&id).copied() {
            Some(i) => {
                self.delete(i);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.index.clear();
    }

    /// Fires every entry whose deadline has passed. Returns how many fired.
    pub fn tick(&mut self) -> usize {
        self.tick_at(Instant::now())
    }

    /// Like [`tick`](Self::tick) against an explicit instant.
    pub fn tick_at(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        while let Some(front) = self.heap.first() {
            if front.expires > now {
                break;
            }
            let node = self.delete(0);
            (node.callback)();
            fired += 1;
        }
        fired
    }

    /// Milliseconds until the earliest deadline: 0 when already due,
    /// [`IDLE_POLL_MS`] when the heap is empty.
    pub fn next_tick(&self) -> i32 {
        self.next_tick_at(Instant::now())
    }

    pub fn next_tick_at(&self, now: Instant) -> i32 {
        match self.heap.first() {
            Some(front) => {
                let ms = front.expires.saturating_duration_since(now).as_millis();
                i32::try_from(ms).unwrap_or(i32::MAX)
            }
            None => IDLE_POLL_MS,
        }
    }

    fn delete(&mut self, i: usize) -> TimerNode<Id> {
        // swap with the last slot, shrink, then restore order at `i`
        let node = self.heap.swap_remove(i);
        self.index.remove(&node.id);

        if i < self.heap.len() {
            self.index.insert(self.heap[i].id, i);
            let n = self.heap.len();
            if !self.sift_down(i, n) {
                self.sift_up(i);
            }
        }
        node
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[parent].expires <= self.heap[i].expires {
                break;
            }
            self.swap_node(i, parent);
            i = parent;
        }
    }

    /// Returns whether the node moved.
    fn sift_down(&mut self, start: usize, n: usize) -> bool {
        let mut i = start;
        loop {
            let mut child = i * 2 + 1;
            if child >= n {
                break;
            }
            if child + 1 < n && self.heap[child + 1].expires < self.heap[child].expires {
                child += 1;
            }
            if self.heap[i].expires <= self.heap[child].expires {
                break;
            }
            self.swap_node(i, child);
            i = child;
        }
        i > start
    }

    fn swap_node(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.index.insert(self.heap[i].id, i);
        self.index.insert(self.heap[j].id, j);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn index_tracks_every_swap() {
        let mut timers = TimerHeap::new();
        for (id, ms) in [(1, 50), (2, 10), (3, 40), (4, 5), (5, 30)] {
            timers.add(id, Duration::from_millis(ms), || {}).unwrap();
        }
        timers.remove(2);
        timers.adjust(5, Duration::from_millis(1)).unwrap();

        for (id, &i) in &timers.index {
            assert_eq!(timers.heap[i].id, *id);
        }
        assert_eq!(timers.heap[0].id, 5);
    }

    #[test]
    fn tick_fires_in_deadline_order() {
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut timers = TimerHeap::new();
        for (id, ms) in [(1, 30), (2, 10), (3, 20)] {
            let order = order.clone();
            timers
                .add(id, Duration::from_millis(ms), move || order.lock().push(id))
                .unwrap();
        }

        let fired = timers.tick_at(Instant::now() + Duration::from_secs(1));
        assert_eq!(fired, 3);
        assert_eq!(*order.lock(), vec![2, 3, 1]);
    }

    #[test]
    fn do_work_runs_callback_once() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut timers = TimerHeap::new();
        let h = hits.clone();
        timers
            .add(7, Duration::from_secs(60), move || {
                h.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(timers.do_work(7));
        assert!(!timers.do_work(7));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(timers.is_empty());
    }
}
