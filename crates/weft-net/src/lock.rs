//! Per-key async mutual exclusion
//!
//! Holders of different keys never contend. A key's table entry is removed
//! once nobody holds or waits on it, including when a waiter gives up
//! before acquiring the lock.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

type Table<K> = Arc<DashMap<K, Arc<Mutex<()>>>>;

/// Table of async mutexes keyed by `K`
pub struct KeyedLock<K: Eq + Hash + Clone> {
    locks: Table<K>,
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &K) -> KeyedGuard<K> {
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let mut pending = Pending {
            acquire: Box::pin(Arc::clone(&mutex).lock_owned()),
            slot: Slot {
                key: key.clone(),
                locks: Arc::clone(&self.locks),
                mutex: Some(mutex),
            },
        };
        let guard = (&mut pending.acquire).await;

        let Pending { acquire, slot } = pending;
        drop(acquire);
        KeyedGuard {
            guard: Some(guard),
            _slot: slot,
        }
    }

    /// Number of keys held or waited on
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no key is held or waited on
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// A waiter; dropping it mid-wait releases the acquire before the slot
struct Pending<K: Eq + Hash + Clone> {
    acquire: Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>,
    slot: Slot<K>,
}

/// One holder's or waiter's interest in a key
struct Slot<K: Eq + Hash + Clone> {
    key: K,
    locks: Table<K>,
    mutex: Option<Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> Drop for Slot<K> {
    fn drop(&mut self) {
        let Some(ours) = self.mutex.take() else {
            return;
        };
        let weak = Arc::downgrade(&ours);
        drop(ours);
        // Idle once only the table refers to the mutex
        self.locks.remove_if(&self.key, |_, mutex| {
            std::ptr::eq(Arc::as_ptr(mutex), weak.as_ptr()) && Arc::strong_count(mutex) == 1
        });
    }
}

/// Exclusive access to one key, released on drop
pub struct KeyedGuard<K: Eq + Hash + Clone> {
    guard: Option<OwnedMutexGuard<()>>,
    _slot: Slot<K>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        // Release before the slot checks whether the entry is idle
        drop(self.guard.take());
    }
}
