//! Trailing-edge debounce with one pending timer per topic

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use super::{Event, Topic};
use crate::ids::SourceId;

struct Pending {
    generation: u64,
    event: Event,
    timer: JoinHandle<()>,
}

#[derive(Default)]
pub(super) struct Debouncer {
    pending: Mutex<AHashMap<Topic, Pending>>,
    generation: AtomicU64,
}

impl Debouncer {
    /// Store `event` as the pending payload for its topic and restart the
    /// window. `fire` runs with the arming generation once the window elapses.
    pub(super) fn arm<F>(&self, runtime: &Handle, event: Event, window: Duration, fire: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let topic = event.topic();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        // Hold the lock across spawn so a zero window cannot fire before insert
        let mut pending = self.pending.lock();
        let timer = runtime.spawn(async move {
            tokio::time::sleep(window).await;
            fire(generation);
        });
        let previous = pending.insert(
            topic,
            Pending {
                generation,
                event,
                timer,
            },
        );
        drop(pending);

        if let Some(previous) = previous {
            previous.timer.abort();
            trace!(%topic, superseded = previous.generation, "debounced payload replaced");
        }
    }

    /// Take the pending event if `generation` is still the latest for `topic`
    pub(super) fn take(&self, topic: Topic, generation: u64) -> Option<Event> {
        let mut pending = self.pending.lock();
        match pending.get(&topic) {
            Some(entry) if entry.generation == generation => {
                pending.remove(&topic).map(|entry| entry.event)
            }
            _ => None,
        }
    }

    /// Drop the pending event for `topic` if `source` produced it
    pub(super) fn cancel_from(&self, topic: Topic, source: &SourceId) -> bool {
        let mut pending = self.pending.lock();
        match pending.get(&topic) {
            Some(entry) if entry.event.is_from(source) => {
                if let Some(entry) = pending.remove(&topic) {
                    entry.timer.abort();
                }
                true
            }
            _ => false,
        }
    }

    pub(super) fn is_pending(&self, topic: Topic) -> bool {
        self.pending.lock().contains_key(&topic)
    }

    /// Cancel every timer and hand back the pending events, oldest first
    pub(super) fn drain(&self) -> Vec<Event> {
        let mut entries: Vec<Pending> = self.pending.lock().drain().map(|(_, p)| p).collect();
        entries.sort_by_key(|p| p.generation);
        entries
            .into_iter()
            .map(|p| {
                p.timer.abort();
                p.event
            })
            .collect()
    }
}
