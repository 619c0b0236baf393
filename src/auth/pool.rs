//! Pool of credential-store connections.
//!
//! Connections are checked out for the duration of a single call and returned
//! when the [`PooledConn`] guard drops. A counting semaphore bounds the number
//! of concurrent checkouts; a separate lock guards the free list.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use parking_lot::{Condvar, Mutex};

struct SemState {
    permits: usize,
    closed: bool,
}

/// Counting semaphore that can be closed to release every waiter.
struct Semaphore {
    state: Mutex<SemState>,
    cond: Condvar,
}

impl Semaphore {
    fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(SemState {
                permits,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    /// Waits for a permit. `false` if the semaphore was closed.
    fn acquire(&self) -> bool {
        let mut state = self.state.lock();
        while state.permits == 0 && !state.closed {
            self.cond.wait(&mut state);
        }
        if state.closed {
            return false;
        }
        state.permits -= 1;
        true
    }

    fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.closed || state.permits == 0 {
            return false;
        }
        state.permits -= 1;
        true
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;
        self.cond.notify_one();
    }

    fn close(&self) {
        self.state.lock().closed = true;
        self.cond.notify_all();
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

pub struct ConnPool<C> {
    free: Mutex<VecDeque<C>>,
    sem: Semaphore,
    max: usize,
}

impl<C> ConnPool<C> {
    pub fn new(conns: Vec<C>) -> Self {
        let max = conns.len();
        Self {
            free: Mutex::new(conns.into()),
            sem: Semaphore::new(max),
            max,
        }
    }

    /// Builds `size` connections with `connect`, failing on the first error.
    pub fn with_factory<E, F>(size: usize, mut connect: F) -> Result<Self, E>
    where
        F: FnMut() -> Result<C, E>,
    {
        let conns = (0..size).map(|_| connect()).collect::<Result<Vec<_>, E>>()?;
        Ok(Self::new(conns))
    }

    pub fn max_conns(&self) -> usize {
        self.max
    }

    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }

    /// Checks out a connection, waiting until one is free.
    ///
    /// Returns `None` once the pool has been closed.
    pub fn get(&self) -> Option<PooledConn<'_, C>> {
        if !self.sem.acquire() {
            return None;
        }
        self.take()
    }

    /// Checks out a connection only if one is free right now.
    pub fn try_get(&self) -> Option<PooledConn<'_, C>> {
        if !self.sem.try_acquire() {
            tracing::warn!(max = self.max, "Credential pool busy");
            return None;
        }
        self.take()
    }

    /// Drops every idle connection and wakes all waiters. Connections still
    /// checked out are dropped when their guards are.
    pub fn close(&self) {
        self.sem.close();
        self.free.lock().clear();
    }

    fn take(&self) -> Option<PooledConn<'_, C>> {
        let conn = self.free.lock().pop_front();
        match conn {
            Some(conn) => Some(PooledConn {
                pool: self,
                conn: Some(conn),
            }),
            None => {
                self.sem.release();
                None
            }
        }
    }

    fn put_back(&self, conn: C) {
        if self.sem.is_closed() {
            return;
        }
        self.free.lock().push_back(conn);
        self.sem.release();
    }
}

/// A checked-out connection, returned to its pool on drop.
pub struct PooledConn<'a, C> {
    pool: &'a ConnPool<C>,
    conn: Option<C>,
}

impl<C> Deref for PooledConn<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl<C> DerefMut for PooledConn<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl<C> Drop for PooledConn<'_, C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put_back(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_returns_connection() {
        let pool = ConnPool::new(vec![1, 2]);
        {
            let a = pool.get().unwrap();
            let _b = pool.get().unwrap();
            assert_eq!(*a, 1);
            assert_eq!(pool.free_count(), 0);
            assert!(pool.try_get().is_none());
        }
        assert_eq!(pool.free_count(), 2);
    }

    #[test]
    fn closed_pool_hands_out_nothing() {
        let pool = ConnPool::new(vec!["a"]);
        pool.close();
        assert!(pool.get().is_none());
        assert_eq!(pool.free_count(), 0);
    }
}
