//! EventQueue - unordered work queue with in-flight tracking
//!
//! Guarantees:
//! - An item handed out by `get` is not handed out again until `done`
//! - An item is never processed by two workers at once; re-adding an
//!   in-flight item defers it until the current holder calls `done`
//! - Adding an item that is already waiting is a no-op

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

struct QueueState<T> {
    /// Items ready to be handed out
    queue: VecDeque<T>,
    /// Items that need processing (queued or re-added while in flight)
    dirty: HashSet<T>,
    /// Items currently held by a worker
    processing: HashSet<T>,
    shutting_down: bool,
    /// Pending items remain deliverable after shutdown
    draining: bool,
}

/// Shared work queue between the watch handler and the worker pool
pub struct EventQueue<T> {
    state: Mutex<QueueState<T>>,
    /// Wakes workers blocked in `get`
    available: Notify,
    /// Wakes `shutdown_with_drain` when in-flight work completes
    idle: Notify,
}

impl<T: Clone + Eq + Hash> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Eq + Hash> EventQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                dirty: HashSet::new(),
                processing: HashSet::new(),
                shutting_down: false,
                draining: false,
            }),
            available: Notify::new(),
            idle: Notify::new(),
        }
    }

    /// Insert an item
    ///
    /// Returns false when the item was not queued (shutting down, or
    /// already waiting).
    pub fn add(&self, item: T) -> bool {
        let mut state = self.state.lock();
        if state.shutting_down {
            return false;
        }
        if !state.dirty.insert(item.clone()) {
            return false;
        }
        if state.processing.contains(&item) {
            // queued again by `done`
            return true;
        }
        state.queue.push_back(item);
        drop(state);
        self.available.notify_one();
        true
    }

    /// Wait for the next item
    ///
    /// Returns `None` once the queue is shut down (after pending items are
    /// exhausted when draining).
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.shutting_down && !state.draining {
                    return None;
                }
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark an item as fully processed
    pub fn done(&self, item: &T) {
        let mut state = self.state.lock();
        state.processing.remove(item);
        let requeue = state.dirty.contains(item) && !(state.shutting_down && !state.draining);
        if requeue {
            state.queue.push_back(item.clone());
        }
        let idle = state.processing.is_empty();
        drop(state);

        if requeue {
            self.available.notify_one();
        }
        if idle {
            self.idle.notify_waiters();
        }
    }

    /// Shut down immediately
    ///
    /// Every blocked and future `get` returns `None`; pending items are
    /// discarded.
    pub fn shutdown(&self) {
        let dropped = {
            let mut state = self.state.lock();
            state.shutting_down = true;
            state.draining = false;
            let dropped = state.queue.len();
            state.queue.clear();
            state.dirty.clear();
            dropped
        };
        if dropped > 0 {
            debug!(dropped, "Queue shut down with pending items");
        }
        self.available.notify_waiters();
    }

    /// Shut down after pending items are handed out and in-flight items
    /// are done
    pub async fn shutdown_with_drain(&self) {
        {
            let mut state = self.state.lock();
            if state.shutting_down && !state.draining {
                return;
            }
            state.shutting_down = true;
            state.draining = true;
        }
        self.available.notify_waiters();

        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.state.lock();
                if state.queue.is_empty() && state.processing.is_empty() {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Number of items waiting to be handed out
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Whether no item is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of items currently held by workers
    pub fn in_flight(&self) -> usize {
        self.state.lock().processing.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().shutting_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_add_get_done() {
        let queue = EventQueue::new();
        assert!(queue.add("a"));
        assert!(queue.add("b"));
        assert_eq!(queue.len(), 2);

        let first = queue.get().await.unwrap();
        assert_eq!(queue.in_flight(), 1);
        queue.done(&first);
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_add_is_idempotent() {
        let queue = EventQueue::new();
        assert!(queue.add(1));
        assert!(!queue.add(1));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_item_is_deferred_until_done() {
        let queue = EventQueue::new();
        queue.add(7);
        let item = queue.get().await.unwrap();

        // re-added while a worker holds it
        assert!(queue.add(7));
        assert_eq!(queue.len(), 0);
        assert!(timeout(Duration::from_millis(20), queue.get()).await.is_err());

        queue.done(&item);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await, Some(7));
    }

    #[tokio::test]
    async fn test_get_blocks_until_add() {
        let queue = Arc::new(EventQueue::new());
        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.get().await })
        };
        tokio::task::yield_now().await;
        queue.add("late");
        let got = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert_eq!(got, Some("late"));
    }

    #[tokio::test]
    async fn test_shutdown_unblocks_all_waiters() {
        let queue: Arc<EventQueue<u32>> = Arc::new(EventQueue::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.get().await })
            })
            .collect();
        tokio::task::yield_now().await;

        queue.shutdown();
        for waiter in waiters {
            let got = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
            assert_eq!(got, None);
        }
    }

    #[tokio::test]
    async fn test_no_live_item_after_shutdown() {
        let queue = EventQueue::new();
        queue.add(1);
        queue.add(2);
        queue.shutdown();

        assert_eq!(queue.get().await, None);
        assert!(!queue.add(3));
        assert_eq!(queue.get().await, None);
        assert!(queue.is_shutting_down());
    }

    #[tokio::test]
    async fn test_shutdown_with_drain_delivers_pending() {
        let queue = Arc::new(EventQueue::new());
        queue.add(1);
        queue.add(2);
        let held = queue.get().await.unwrap();

        let drain = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.shutdown_with_drain().await })
        };
        while !queue.is_shutting_down() {
            tokio::task::yield_now().await;
        }

        let pending = queue.get().await.unwrap();
        assert_eq!(queue.get().await, None);
        assert!(!drain.is_finished());

        queue.done(&held);
        queue.done(&pending);
        timeout(Duration::from_secs(1), drain).await.unwrap().unwrap();
    }
}
