//! Reactive key/value store for cross-view UI state
//!
//! Each key owns its own watcher list. Writing a key notifies that key's
//! watchers and nobody else. Writes are never suppressed, even when the new
//! value equals the old one; callers that want suppression compare first.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error};

use crate::error::{CoreError, Result};
use crate::subscription::Subscription;

type WatchCallback = Box<dyn Fn(&Value) + Send + Sync>;

struct Watcher {
    id: u64,
    active: AtomicBool,
    callback: WatchCallback,
}

#[derive(Default)]
struct Entry {
    value: Option<Value>,
    watchers: Vec<Arc<Watcher>>,
}

struct StoreInner {
    entries: Mutex<AHashMap<String, Entry>>,
    next_id: AtomicU64,
}

/// Shared reactive store. Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct ReactiveStore {
    inner: Arc<StoreInner>,
}

impl ReactiveStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                entries: Mutex::new(AHashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Current value of `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner
            .entries
            .lock()
            .get(key)
            .and_then(|entry| entry.value.clone())
    }

    /// Current value of `key` decoded as `T`
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)
            .map(|value| {
                serde_json::from_value(value).map_err(|source| CoreError::StoreValue {
                    key: key.to_string(),
                    source,
                })
            })
            .transpose()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .entries
            .lock()
            .get(key)
            .map(|entry| entry.value.is_some())
            .unwrap_or(false)
    }

    /// Write `key` and notify its watchers. Returns how many watchers ran.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> usize {
        let value = value.into();
        let watchers = {
            let mut entries = self.inner.entries.lock();
            let entry = entries.entry(key.to_string()).or_default();
            entry.value = Some(value.clone());
            entry.watchers.clone()
        };

        debug!(key, watchers = watchers.len(), "store set");
        let mut notified = 0;
        for watcher in watchers {
            if !watcher.active.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (watcher.callback)(&value))) {
                Ok(()) => notified += 1,
                Err(_) => error!(key, watcher = watcher.id, "store watcher failed; continuing"),
            }
        }
        notified
    }

    /// Serialize `value` and write it under `key`
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<usize> {
        let value = serde_json::to_value(value).map_err(|source| CoreError::StoreValue {
            key: key.to_string(),
            source,
        })?;
        Ok(self.set(key, value))
    }

    /// Call `callback` with the new value every time `key` is written
    pub fn watch<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .entries
            .lock()
            .entry(key.to_string())
            .or_default()
            .watchers
            .push(Arc::new(Watcher {
                id,
                active: AtomicBool::new(true),
                callback: Box::new(callback),
            }));

        let weak = Arc::downgrade(&self.inner);
        let key = key.to_string();
        Subscription::new(id, move || unwatch(&weak, &key, id))
    }

    /// Delete `key` together with its watchers, without notifying them
    pub fn remove(&self, key: &str) -> Option<Value> {
        let entry = self.inner.entries.lock().remove(key)?;
        for watcher in &entry.watchers {
            watcher.active.store(false, Ordering::Release);
        }
        entry.value
    }

    /// Number of live watchers on `key`
    pub fn watcher_count(&self, key: &str) -> usize {
        self.inner
            .entries
            .lock()
            .get(key)
            .map(|entry| entry.watchers.len())
            .unwrap_or(0)
    }

    /// Keys that currently hold a value
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.value.is_some())
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}

impl Default for ReactiveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReactiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveStore")
            .field("keys", &self.keys())
            .finish()
    }
}

fn unwatch(weak: &Weak<StoreInner>, key: &str, id: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut entries = inner.entries.lock();
    let Some(entry) = entries.get_mut(key) else {
        return;
    };
    if let Some(pos) = entry.watchers.iter().position(|w| w.id == id) {
        entry.watchers[pos].active.store(false, Ordering::Release);
        entry.watchers.remove(pos);
    }
    if entry.watchers.is_empty() && entry.value.is_none() {
        entries.remove(key);
    }
}
