//! Session-wide event bus
//!
//! Delivery is synchronous: [`EventBus::emit`] runs every live subscriber of
//! the event's topic, in registration order, before it returns. A subscriber
//! that panics is caught and logged; the remaining subscribers still run and
//! whatever state change triggered the emission stays applied.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, trace};

mod debounce;
mod topic;

pub use topic::{
    Axis, BrushBounds, BrushPreview, Event, FilterChanged, FilterReset, Hover, SelectionChanged,
    SelectionCleared, Topic, ViewDestroyed,
};

use crate::error::{CoreError, Result};
use crate::ids::{SelectionType, SourceId};
use crate::selection::ClearScope;
use crate::subscription::Subscription;
use debounce::Debouncer;

/// Handler trait for struct-based subscribers
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &Event);
}

type Callback = Box<dyn Fn(&Event) + Send + Sync>;

/// One registration on one topic
struct Handler {
    id: u64,
    active: AtomicBool,
    callback: Callback,
}

#[derive(Default)]
struct BatchState {
    depth: u32,
    queued: Vec<Event>,
}

struct BusInner {
    handlers: Mutex<AHashMap<Topic, Vec<Arc<Handler>>>>,
    next_id: AtomicU64,
    batch: Mutex<BatchState>,
    debouncer: Debouncer,
    runtime: Option<Handle>,
}

/// Outcome of a single `emit` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers that ran to completion
    pub delivered: usize,
    /// Subscribers that panicked and were skipped over
    pub faulted: usize,
    /// The event was queued by an open batch instead of delivered
    pub deferred: bool,
}

/// System-wide event bus. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// Debounced delivery uses the tokio runtime current at construction time,
    /// if there is one.
    pub fn new() -> Self {
        Self::build(Handle::try_current().ok())
    }

    /// Create a bus whose debounce timers run on `runtime`
    pub fn with_runtime(runtime: Handle) -> Self {
        Self::build(Some(runtime))
    }

    fn build(runtime: Option<Handle>) -> Self {
        Self {
            inner: Arc::new(BusInner {
                handlers: Mutex::new(AHashMap::new()),
                next_id: AtomicU64::new(1),
                batch: Mutex::new(BatchState::default()),
                debouncer: Debouncer::default(),
                runtime,
            }),
        }
    }

    /// Register `callback` for `topic`.
    ///
    /// Registering the same closure twice creates two independent
    /// subscriptions. The callback stays registered until the returned
    /// handle is unsubscribed.
    pub fn on<F>(&self, topic: Topic, callback: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let handler = Arc::new(Handler {
            id,
            active: AtomicBool::new(true),
            callback: Box::new(callback),
        });

        self.inner
            .handlers
            .lock()
            .entry(topic)
            .or_default()
            .push(handler);
        trace!(%topic, subscription = id, "subscribed");

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(id, move || release(&weak, topic, id))
    }

    /// Register a struct-based handler for `topic`
    pub fn on_handler(&self, topic: Topic, handler: Arc<dyn EventHandler>) -> Subscription {
        self.on(topic, move |event| handler.handle(event))
    }

    /// Number of live subscriptions on `topic`
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .handlers
            .lock()
            .get(&topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Deliver `event` to every subscriber of its topic.
    ///
    /// Inside [`EventBus::batch`] the event is queued instead and delivered
    /// when the outermost batch closes.
    pub fn emit(&self, event: Event) -> DeliveryReport {
        {
            let mut batch = self.inner.batch.lock();
            if batch.depth > 0 {
                enqueue(&mut batch.queued, event);
                return DeliveryReport {
                    deferred: true,
                    ..DeliveryReport::default()
                };
            }
        }
        self.deliver(&event)
    }

    /// Deliver `event` once no further event of the same topic has been
    /// debounced for `window`.
    ///
    /// Each call replaces the pending payload for the topic and restarts the
    /// window, so a burst produces one delivery carrying the last payload.
    pub fn emit_debounced(&self, event: Event, window: Duration) -> Result<()> {
        let topic = event.topic();
        let runtime = self
            .inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or_else(|| CoreError::NoRuntime(topic.to_string()))?;

        let weak = Arc::downgrade(&self.inner);
        self.inner.debouncer.arm(&runtime, event, window, move |generation| {
            if let Some(inner) = weak.upgrade() {
                EventBus { inner }.fire_pending(topic, generation);
            }
        });
        Ok(())
    }

    /// Whether a debounced delivery is waiting on `topic`
    pub fn has_pending(&self, topic: Topic) -> bool {
        self.inner.debouncer.is_pending(topic)
    }

    /// Drop the debounced event waiting on `topic` if `source` produced it
    pub fn cancel_debounced(&self, topic: Topic, source: &SourceId) -> bool {
        let cancelled = self.inner.debouncer.cancel_from(topic, source);
        if cancelled {
            trace!(%topic, %source, "debounced delivery cancelled");
        }
        cancelled
    }

    /// Deliver every pending debounced event now, oldest first
    pub fn flush_debounced(&self) -> usize {
        let events = self.inner.debouncer.drain();
        let count = events.len();
        for event in events {
            self.emit(event);
        }
        count
    }

    /// Run `f` with delivery deferred until it returns.
    ///
    /// Events emitted inside are delivered in order when the outermost batch
    /// exits. A `selection-changed` for a type replaces an earlier queued one
    /// for the same type when nothing touching that type was queued in
    /// between.
    pub fn batch<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.batch.lock().depth += 1;
        let _guard = BatchGuard { bus: self };
        f()
    }

    fn fire_pending(&self, topic: Topic, generation: u64) {
        if let Some(event) = self.inner.debouncer.take(topic, generation) {
            debug!(%topic, source = %event.source(), "debounced delivery");
            self.emit(event);
        }
    }

    fn deliver(&self, event: &Event) -> DeliveryReport {
        let topic = event.topic();
        // Snapshot so subscribers may emit, subscribe or unsubscribe re-entrantly
        let handlers: Vec<Arc<Handler>> = match self.inner.handlers.lock().get(&topic) {
            Some(handlers) => handlers.clone(),
            None => Vec::new(),
        };

        let mut report = DeliveryReport::default();
        if handlers.is_empty() {
            trace!(%topic, "emit with no subscribers");
            return report;
        }

        debug!(%topic, source = %event.source(), subscribers = handlers.len(), "emit");
        for handler in handlers {
            if !handler.active.load(Ordering::Acquire) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| (handler.callback)(event))) {
                Ok(()) => report.delivered += 1,
                Err(panic) => {
                    report.faulted += 1;
                    error!(
                        %topic,
                        subscription = handler.id,
                        source = %event.source(),
                        reason = panic_message(panic.as_ref()),
                        "subscriber failed; continuing delivery"
                    );
                }
            }
        }
        report
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let topics = self.inner.handlers.lock().len();
        f.debug_struct("EventBus")
            .field("topics", &topics)
            .field("has_runtime", &self.inner.runtime.is_some())
            .finish()
    }
}

struct BatchGuard<'a> {
    bus: &'a EventBus,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let queued = {
            let mut batch = self.bus.inner.batch.lock();
            batch.depth = batch.depth.saturating_sub(1);
            if batch.depth > 0 {
                return;
            }
            std::mem::take(&mut batch.queued)
        };
        for event in queued {
            self.bus.deliver(&event);
        }
    }
}

fn release(weak: &Weak<BusInner>, topic: Topic, id: u64) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let mut handlers = inner.handlers.lock();
    if let Some(list) = handlers.get_mut(&topic) {
        if let Some(pos) = list.iter().position(|h| h.id == id) {
            // Stop a snapshot taken by an in-flight emit from calling it
            list[pos].active.store(false, Ordering::Release);
            list.remove(pos);
            trace!(%topic, subscription = id, "unsubscribed");
        }
        if list.is_empty() {
            handlers.remove(&topic);
        }
    }
}

/// Selection type an event is about, if it concerns exactly one
fn selection_scope(event: &Event) -> Option<Option<&SelectionType>> {
    match event {
        Event::SelectionChanged(e) => Some(Some(&e.selection_type)),
        Event::SelectionCleared(e) => match &e.scope {
            ClearScope::All => Some(None),
            ClearScope::Type(t) => Some(Some(t)),
        },
        _ => None,
    }
}

fn enqueue(queued: &mut Vec<Event>, event: Event) {
    if let Event::SelectionChanged(changed) = &event {
        // Latest event touching this selection type, `None` scope meaning "all"
        let last = queued.iter().rposition(|e| match selection_scope(e) {
            Some(Some(t)) => *t == changed.selection_type,
            Some(None) => true,
            None => false,
        });
        if let Some(pos) = last {
            if matches!(&queued[pos], Event::SelectionChanged(_)) {
                queued[pos] = event;
                return;
            }
        }
    }
    queued.push(event);
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
