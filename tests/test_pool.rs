use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use staticd::pool::{BlockQueue, PushError, TrySubmitError, WorkerPool};

#[test]
fn test_queue_is_fifo() {
    let q = BlockQueue::new(4);
    for i in 0..4 {
        q.push(i).unwrap();
    }
    assert!(q.is_full());
    assert_eq!((0..4).map(|_| q.pop().unwrap()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    assert!(q.is_empty());
}

#[test]
fn test_try_push_full_and_closed() {
    let q = BlockQueue::new(1);
    q.try_push(1).unwrap();
    assert!(matches!(q.try_push(2), Err(PushError::Full(2))));
    q.close();
    assert!(matches!(q.try_push(3), Err(PushError::Closed(3))));
    assert_eq!(q.push(4), Err(4));
}

#[test]
fn test_push_blocks_until_space() {
    let q = Arc::new(BlockQueue::new(1));
    q.push(1).unwrap();

    let producer = {
        let q = q.clone();
        thread::spawn(move || q.push(2))
    };
    thread::sleep(Duration::from_millis(50));
    assert_eq!(q.len(), 1);

    assert_eq!(q.pop(), Some(1));
    producer.join().unwrap().unwrap();
    assert_eq!(q.pop(), Some(2));
}

#[test]
fn test_close_wakes_blocked_consumers() {
    let q: Arc<BlockQueue<u32>> = Arc::new(BlockQueue::new(2));
    let consumer = {
        let q = q.clone();
        thread::spawn(move || q.pop())
    };
    thread::sleep(Duration::from_millis(50));
    q.close();
    assert_eq!(consumer.join().unwrap(), None);
    assert!(q.is_closed());
}

#[test]
fn test_clear_frees_capacity() {
    let q = BlockQueue::new(2);
    q.push(1).unwrap();
    q.push(2).unwrap();
    q.clear();
    assert!(q.is_empty());
    assert_eq!(q.capacity(), 2);
    q.try_push(3).unwrap();
    assert_eq!(q.pop(), Some(3));
}

#[test]
fn test_pop_timeout_expires() {
    let q: BlockQueue<u32> = BlockQueue::new(2);
    assert_eq!(q.pop_timeout(Duration::from_millis(20)), None);
    q.push(7).unwrap();
    assert_eq!(q.pop_timeout(Duration::from_millis(20)), Some(7));
}

#[test]
fn test_every_task_runs_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut pool = WorkerPool::new(4, 8).unwrap();
    assert_eq!(pool.threads(), 4);

    for _ in 0..1000 {
        let hits = hits.clone();
        pool.submit(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    // shutdown drops queued tasks, so wait for them first
    for _ in 0..500 {
        if hits.load(Ordering::SeqCst) == 1000 {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    pool.shutdown();
    assert_eq!(pool.pending(), 0);
    assert_eq!(hits.load(Ordering::SeqCst), 1000);
}

#[test]
fn test_panicking_task_does_not_kill_worker() {
    let hits = Arc::new(AtomicUsize::new(0));
    let mut pool = WorkerPool::new(1, 4).unwrap();

    pool.submit(|| panic!("boom")).unwrap();
    let h = hits.clone();
    pool.submit(move || {
        h.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    thread::sleep(Duration::from_millis(100));
    pool.shutdown();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_submit_after_shutdown_fails() {
    let mut pool = WorkerPool::new(2, 2).unwrap();
    pool.shutdown();
    assert!(pool.submit(|| {}).is_err());
    assert!(matches!(pool.try_submit(|| {}), Err(TrySubmitError::Closed)));
}
