//! The per-view half of the synchronization protocol

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use super::interaction::{HoverTarget, Interaction, InteractionState};
use super::ViewSyncSettings;
use crate::error::Result;
use crate::events::{BrushBounds, BrushPreview, Event, Hover, Topic, ViewDestroyed};
use crate::ids::{Point, SelectionId, SelectionType, SourceId};
use crate::selection::{ClearScope, SelectOptions};
use crate::session::Session;
use crate::subscription::SubscriptionSet;

/// Connects one view to the session.
///
/// Every callback registered through the link is released by
/// [`ViewLink::destroy`], which then announces `view-destroyed`. Gestures go
/// through the link so that every emission and mutation carries the view's
/// id as its source.
pub struct ViewLink {
    id: SourceId,
    session: Session,
    interaction: Interaction,
    subscriptions: SubscriptionSet,
    destroyed: bool,
}

impl ViewLink {
    /// Register `id` with the session's sync registry
    pub fn new(session: &Session, id: SourceId, settings: ViewSyncSettings) -> Self {
        session.sync().register_view(id.clone(), settings);
        info!(view = %id, "view linked");
        Self {
            id,
            session: session.clone(),
            interaction: Interaction::new(),
            subscriptions: SubscriptionSet::new(),
            destroyed: false,
        }
    }

    /// Register with the session's default sync settings
    pub fn with_defaults(session: &Session, id: SourceId) -> Self {
        let settings = session.config().default_sync;
        Self::new(session, id, settings)
    }

    pub fn id(&self) -> &SourceId {
        &self.id
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> &InteractionState {
        self.interaction.state()
    }

    pub fn settings(&self) -> ViewSyncSettings {
        self.session.sync().settings(&self.id)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Subscribe to `topic`, including this view's own events
    pub fn on<F>(&mut self, topic: Topic, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let subscription = self.session.bus().on(topic, callback);
        self.subscriptions.push(subscription);
    }

    /// Subscribe to `topic`, skipping events this view produced itself
    pub fn on_remote<F>(&mut self, topic: Topic, callback: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let own = self.id.clone();
        self.on(topic, move |event| {
            if event.is_from(&own) {
                trace!(view = %own, topic = %event.topic(), "echo skipped");
                return;
            }
            callback(event);
        });
    }

    /// Watch a reactive store key for the lifetime of the view
    pub fn watch<F>(&mut self, key: &str, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let subscription = self.session.store().watch(key, callback);
        self.subscriptions.push(subscription);
    }

    /// Pointer entered a data element. Emits `hover-end` for an element left
    /// on the way, then `hover-start`. Ignored while brushing.
    pub fn hover_enter(
        &mut self,
        id: SelectionId,
        selection_type: SelectionType,
        position: Option<Point>,
    ) -> Result<bool> {
        let target = HoverTarget {
            id,
            selection_type,
            position,
        };
        if self.interaction.hovered() == Some(&target) {
            return Ok(false);
        }
        match self.interaction.enter(target.clone()) {
            Ok(left) => {
                if let Some(left) = left {
                    self.emit_hover_end(left)?;
                }
                let hover = self.hover_payload(target);
                self.session.set_hovered(Some(&hover))?;
                self.session.bus().emit(Event::HoverStart(hover));
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Pointer left the hovered element; emits `hover-end`
    pub fn hover_leave(&mut self) -> Result<bool> {
        match self.interaction.leave() {
            Some(left) => {
                self.emit_hover_end(left)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Begin a brush gesture at `origin`
    pub fn brush_start(&mut self, origin: Point) -> Result<()> {
        if let Some(left) = self.interaction.drag_start(origin) {
            self.emit_hover_end(left)?;
        }
        debug!(view = %self.id, "brush started");
        Ok(())
    }

    /// Record brush movement and publish a debounced, non-committing preview
    pub fn brush_move(&mut self, bounds: BrushBounds, ids: Vec<SelectionId>) -> Result<bool> {
        if !self.interaction.drag_move(bounds) {
            return Ok(false);
        }
        let preview = BrushPreview::new(bounds, ids, self.id.clone());
        let window = self.session.config().brush_preview_window();
        self.session
            .bus()
            .emit_debounced(Event::BrushPreview(preview), window)?;
        Ok(true)
    }

    pub fn brush_origin(&self) -> Option<Point> {
        self.interaction.brush_origin()
    }

    /// Current brush region
    pub fn brush_bounds(&self) -> Option<&BrushBounds> {
        self.interaction.brush_bounds()
    }

    /// Finish the brush and commit `ids` to the selection store.
    ///
    /// Returns the resulting selection, or `None` if no brush was active.
    pub fn brush_end(
        &mut self,
        selection_type: SelectionType,
        ids: Vec<SelectionId>,
        additive: bool,
    ) -> Option<Vec<SelectionId>> {
        self.interaction.drag_end()?;
        // A preview still waiting out its window would land after the commit
        self.session
            .bus()
            .cancel_debounced(Topic::BrushPreview, &self.id);
        debug!(view = %self.id, count = ids.len(), "brush committed");
        let options = SelectOptions {
            additive,
            source: self.id.clone(),
        };
        Some(self.session.selection().select(selection_type, ids, options))
    }

    /// Abandon the brush; the selection is left untouched.
    ///
    /// If a preview may already have gone out, an empty preview withdraws it.
    pub fn brush_abort(&mut self) -> bool {
        let Some((_, bounds)) = self.interaction.drag_end() else {
            return false;
        };
        let bus = self.session.bus();
        bus.cancel_debounced(Topic::BrushPreview, &self.id);
        if let Some(bounds) = bounds {
            bus.emit(Event::BrushPreview(BrushPreview::new(
                bounds,
                Vec::new(),
                self.id.clone(),
            )));
        }
        debug!(view = %self.id, "brush aborted");
        true
    }

    /// Replace or extend a selection on behalf of this view
    pub fn select(
        &self,
        selection_type: SelectionType,
        ids: Vec<SelectionId>,
        additive: bool,
    ) -> Vec<SelectionId> {
        let options = SelectOptions {
            additive,
            source: self.id.clone(),
        };
        self.session.selection().select(selection_type, ids, options)
    }

    pub fn toggle(&self, selection_type: SelectionType, id: SelectionId) -> bool {
        self.session
            .selection()
            .toggle(selection_type, id, self.id.clone())
    }

    pub fn clear(&self, scope: ClearScope) {
        self.session.selection().clear(scope, self.id.clone());
    }

    /// Release every subscription, then announce `view-destroyed`.
    /// Calling it again does nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        self.brush_abort();
        if let Some(left) = self.interaction.leave() {
            if let Err(err) = self.emit_hover_end(left) {
                warn!(view = %self.id, error = %err, "hover not released on destroy");
            }
        }

        let released = self.subscriptions.len();
        self.subscriptions.unsubscribe_all();
        self.session.bus().emit(Event::ViewDestroyed(ViewDestroyed {
            source: self.id.clone(),
        }));
        info!(view = %self.id, released, "view destroyed");
    }

    fn hover_payload(&self, target: HoverTarget) -> Hover {
        Hover {
            id: target.id,
            selection_type: target.selection_type,
            source: self.id.clone(),
            position: target.position,
        }
    }

    fn emit_hover_end(&self, left: HoverTarget) -> Result<()> {
        let hover = self.hover_payload(left);
        self.session.release_hover(&self.id)?;
        self.session.bus().emit(Event::HoverEnd(hover));
        Ok(())
    }
}

impl Drop for ViewLink {
    fn drop(&mut self) {
        if !self.destroyed && !self.subscriptions.is_empty() {
            warn!(
                view = %self.id,
                subscriptions = self.subscriptions.len(),
                "view dropped without destroy; subscriptions remain registered"
            );
        }
    }
}

impl std::fmt::Debug for ViewLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewLink")
            .field("id", &self.id)
            .field("state", self.interaction.state())
            .field("subscriptions", &self.subscriptions.len())
            .field("destroyed", &self.destroyed)
            .finish()
    }
}
