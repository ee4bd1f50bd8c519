//! Named async mutexes keyed by logical resource (`folder:<name>`).

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub fn folder_key(folder: &str) -> String {
    format!("folder:{folder}")
}

#[derive(Debug, Default)]
pub struct LockManager {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` while holding `key`. Calls sharing a key run one at a time;
    /// different keys do not block each other.
    pub async fn with_lock<F, T>(&self, key: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        self.with_locks(&[key], fut).await
    }

    /// Hold several keys at once. Keys are acquired in sorted order so two
    /// callers locking the same pair cannot deadlock.
    pub async fn with_locks<K, F, T>(&self, keys: &[K], fut: F) -> T
    where
        K: AsRef<str>,
        F: Future<Output = T>,
    {
        let mut names: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        names.sort_unstable();
        names.dedup();

        let mut held = Held {
            manager: self,
            names: Vec::with_capacity(names.len()),
            guards: Vec::with_capacity(names.len()),
        };
        for name in names {
            let lock = self.entry(name);
            held.names.push(name);
            held.guards.push(lock.lock_owned().await);
        }
        fut.await
    }

    /// Number of keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn release(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(key);
        }
    }
}

/// Guards for one `with_locks` call. Dropping it, including when the caller's
/// future is cancelled, unlocks and prunes idle keys.
struct Held<'a> {
    manager: &'a LockManager,
    names: Vec<&'a str>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for Held<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        for name in &self.names {
            self.manager.release(name);
        }
    }
}
