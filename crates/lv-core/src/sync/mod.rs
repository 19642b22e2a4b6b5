//! Cross-view synchronization
//!
//! [`SyncManager`] records which kinds of updates each view takes part in.
//! [`ViewLink`] is the per-view half of the protocol: it owns the view's
//! subscriptions and interaction state and turns gestures into store
//! mutations and bus emissions tagged with the view's id.

use ahash::AHashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

mod interaction;
mod link;

pub use interaction::{HoverTarget, Interaction, InteractionState};
pub use link::ViewLink;

use crate::events::{Event, EventBus, Topic};
use crate::ids::SourceId;
use crate::subscription::Subscription;

/// Synchronization settings for a specific view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSyncSettings {
    /// Whether this view follows selection changes from other views
    pub sync_selection: bool,

    /// Whether this view follows hover from other views
    pub sync_hover: bool,

    /// Whether this view draws other views' brush previews
    pub sync_preview: bool,

    /// Whether this view re-derives its rows from the shared filters
    pub sync_filters: bool,
}

impl Default for ViewSyncSettings {
    fn default() -> Self {
        Self {
            sync_selection: true,
            sync_hover: true,
            sync_preview: true,
            sync_filters: true,
        }
    }
}

/// Registry of per-view sync settings
pub struct SyncManager {
    view_settings: Arc<RwLock<AHashMap<SourceId, ViewSyncSettings>>>,
    defaults: ViewSyncSettings,
}

impl SyncManager {
    pub fn new(defaults: ViewSyncSettings) -> Self {
        Self {
            view_settings: Arc::new(RwLock::new(AHashMap::new())),
            defaults,
        }
    }

    /// Drop a view's settings once it announces its destruction
    pub fn attach(&self, bus: &EventBus) -> Subscription {
        let settings = self.view_settings.clone();
        bus.on(Topic::ViewDestroyed, move |event| {
            if let Event::ViewDestroyed(destroyed) = event {
                if settings.write().remove(&destroyed.source).is_some() {
                    debug!(view = %destroyed.source, "sync settings released");
                }
            }
        })
    }

    /// Register a view with sync settings
    pub fn register_view(&self, view_id: SourceId, settings: ViewSyncSettings) {
        self.view_settings.write().insert(view_id, settings);
    }

    pub fn unregister_view(&self, view_id: &SourceId) {
        self.view_settings.write().remove(view_id);
    }

    pub fn is_registered(&self, view_id: &SourceId) -> bool {
        self.view_settings.read().contains_key(view_id)
    }

    pub fn registered_views(&self) -> Vec<SourceId> {
        let mut views: Vec<SourceId> = self.view_settings.read().keys().cloned().collect();
        views.sort();
        views
    }

    /// Settings for `view_id`, or the session defaults if unknown
    pub fn settings(&self, view_id: &SourceId) -> ViewSyncSettings {
        self.view_settings
            .read()
            .get(view_id)
            .copied()
            .unwrap_or(self.defaults)
    }

    pub fn update_settings(&self, view_id: &SourceId, update: impl FnOnce(&mut ViewSyncSettings)) {
        let mut settings = self.view_settings.write();
        let entry = settings.entry(view_id.clone()).or_insert(self.defaults);
        update(entry);
    }

    pub fn should_sync_selection(&self, view_id: &SourceId) -> bool {
        self.settings(view_id).sync_selection
    }

    pub fn should_sync_hover(&self, view_id: &SourceId) -> bool {
        self.settings(view_id).sync_hover
    }

    pub fn should_sync_preview(&self, view_id: &SourceId) -> bool {
        self.settings(view_id).sync_preview
    }

    pub fn should_sync_filters(&self, view_id: &SourceId) -> bool {
        self.settings(view_id).sync_filters
    }
}

impl Default for SyncManager {
    fn default() -> Self {
        Self::new(ViewSyncSettings::default())
    }
}
