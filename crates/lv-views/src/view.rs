//! Wiring shared by the data views
//!
//! [`ViewCore`] links a view to the session, keeps its rows and highlight in
//! step with remote events and turns pointer gestures into hover, brush and
//! selection traffic. Views describe their layout through [`Geometry`].

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use lv_core::{
    BrushBounds, ClearScope, Event, FilterState, Point, SelectionId, SelectionType, Session,
    SourceId, SyncManager, Topic, ViewLink, ViewSyncSettings,
};

use crate::data::Record;
use crate::error::Result;
use crate::highlight::{Highlight, PreviewLayer, RemoteHover};
use crate::ViewKind;

#[derive(Debug, Default)]
pub(crate) struct ViewState {
    pub records: Vec<Record>,
    pub filters: FilterState,
    /// Indices into `records` that pass the filters, in data order
    pub visible: Vec<usize>,
    pub highlight: Highlight,
    pub renders: u64,
}

impl ViewState {
    pub fn visible_records(&self) -> impl Iterator<Item = &Record> + '_ {
        self.visible.iter().map(move |&i| &self.records[i])
    }

    fn refilter(&mut self) {
        let filters = &self.filters;
        self.visible = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| filters.matches(*record))
            .map(|(i, _)| i)
            .collect();
    }

    fn render(&mut self, reason: &'static str) {
        self.renders += 1;
        trace!(reason, renders = self.renders, "view redrawn");
    }
}

/// View-specific layout used to resolve pointer positions
pub(crate) trait Geometry {
    /// Type cleared by a plain click on empty space
    fn primary_type(&self) -> &SelectionType;

    fn element_at(&self, state: &ViewState, point: Point) -> Option<(SelectionId, SelectionType)>;

    fn brush_region(&self, origin: Point, current: Point) -> BrushBounds;

    /// Elements inside `bounds` and the type they belong to
    fn brushed(&self, state: &ViewState, bounds: &BrushBounds) -> (SelectionType, Vec<SelectionId>);
}

/// Remote-event handlers, cloned into each subscription
#[derive(Clone)]
struct RemoteSync {
    view: SourceId,
    sync: Arc<SyncManager>,
    tracked: Arc<Vec<SelectionType>>,
    state: Arc<Mutex<ViewState>>,
}

impl RemoteSync {
    fn selection_changed(&self, event: &Event) {
        let Event::SelectionChanged(change) = event else {
            return;
        };
        let mut state = self.state.lock();
        let mut changed = state.highlight.drop_preview_from(&change.source);
        if self.tracked.contains(&change.selection_type)
            && self.sync.should_sync_selection(&self.view)
        {
            state
                .highlight
                .set_selected(change.selection_type.clone(), change.ids.iter().cloned());
            changed = true;
        }
        if changed {
            state.render("selection-changed");
        }
    }

    fn selection_cleared(&self, event: &Event) {
        let Event::SelectionCleared(cleared) = event else {
            return;
        };
        let mut state = self.state.lock();
        let mut changed = state.highlight.drop_preview_from(&cleared.source);
        if self.sync.should_sync_selection(&self.view) && state.highlight.clear(&cleared.scope) {
            changed = true;
        }
        if changed {
            state.render("selection-cleared");
        }
    }

    fn hover_start(&self, event: &Event) {
        let Event::HoverStart(hover) = event else {
            return;
        };
        if !self.tracked.contains(&hover.selection_type) || !self.sync.should_sync_hover(&self.view)
        {
            return;
        }
        let mut state = self.state.lock();
        state.highlight.hovered = Some(RemoteHover {
            source: hover.source.clone(),
            id: hover.id.clone(),
            selection_type: hover.selection_type.clone(),
        });
        state.render("hover-start");
    }

    fn hover_end(&self, event: &Event) {
        let Event::HoverEnd(hover) = event else {
            return;
        };
        let mut state = self.state.lock();
        let ends_current = state
            .highlight
            .hovered
            .as_ref()
            .is_some_and(|h| h.source == hover.source && h.id == hover.id);
        if ends_current {
            state.highlight.hovered = None;
            state.render("hover-end");
        }
    }

    fn brush_preview(&self, event: &Event) {
        let Event::BrushPreview(preview) = event else {
            return;
        };
        if !self.sync.should_sync_preview(&self.view) {
            return;
        }
        let mut state = self.state.lock();
        // An empty preview withdraws the source's brush
        if preview.ids.is_empty() {
            if state.highlight.drop_preview_from(&preview.source) {
                state.render("brush-preview");
            }
            return;
        }
        state.highlight.preview = Some(PreviewLayer {
            source: preview.source.clone(),
            bounds: preview.bounds,
            ids: preview.ids.clone(),
        });
        state.render("brush-preview");
    }

    fn view_destroyed(&self, event: &Event) {
        let mut state = self.state.lock();
        if state.highlight.release_source(event.source()) {
            state.render("view-destroyed");
        }
    }

    fn filters_changed(&self, value: &Value) {
        if !self.sync.should_sync_filters(&self.view) {
            return;
        }
        let filters = if value.is_null() {
            FilterState::default()
        } else {
            match serde_json::from_value::<FilterState>(value.clone()) {
                Ok(filters) => filters,
                Err(err) => {
                    warn!(view = %self.view, error = %err, "ignoring malformed filter record");
                    return;
                }
            }
        };
        let mut state = self.state.lock();
        state.filters = filters;
        state.refilter();
        debug!(view = %self.view, visible = state.visible.len(), "rows re-derived from filters");
        state.render("filters");
    }
}

/// Session link, rows and highlight of one data view
pub(crate) struct ViewCore {
    kind: ViewKind,
    link: ViewLink,
    tracked: Arc<Vec<SelectionType>>,
    state: Arc<Mutex<ViewState>>,
}

impl ViewCore {
    /// Link a new view that highlights the `tracked` selection types.
    ///
    /// Starts from the session's current filters and selections so a view
    /// added mid-session matches the others.
    pub fn new(
        session: &Session,
        kind: ViewKind,
        id: Option<SourceId>,
        settings: Option<ViewSyncSettings>,
        tracked: Vec<SelectionType>,
    ) -> Result<Self> {
        let mut initial = ViewState {
            filters: session.filters()?,
            ..ViewState::default()
        };
        for selection_type in &tracked {
            let ids = session.selection().get_selected(selection_type.clone());
            initial.highlight.set_selected(selection_type.clone(), ids);
        }

        let id = id.unwrap_or_else(|| SourceId::generate(kind.as_str()));
        let settings = settings.unwrap_or(session.config().default_sync);
        let mut core = Self {
            kind,
            link: ViewLink::new(session, id, settings),
            tracked: Arc::new(tracked),
            state: Arc::new(Mutex::new(initial)),
        };
        core.wire();
        debug!(view = %core.id(), kind = kind.as_str(), "view created");
        Ok(core)
    }

    fn wire(&mut self) {
        let remote = RemoteSync {
            view: self.link.id().clone(),
            sync: self.link.session().sync().clone(),
            tracked: self.tracked.clone(),
            state: self.state.clone(),
        };

        let r = remote.clone();
        self.link
            .on_remote(Topic::SelectionChanged, move |e| r.selection_changed(e));
        let r = remote.clone();
        self.link
            .on_remote(Topic::SelectionCleared, move |e| r.selection_cleared(e));
        let r = remote.clone();
        self.link.on_remote(Topic::HoverStart, move |e| r.hover_start(e));
        let r = remote.clone();
        self.link.on_remote(Topic::HoverEnd, move |e| r.hover_end(e));
        let r = remote.clone();
        self.link.on_remote(Topic::BrushPreview, move |e| r.brush_preview(e));
        let r = remote.clone();
        self.link.on_remote(Topic::ViewDestroyed, move |e| r.view_destroyed(e));

        let filter_key = self.link.session().config().filter_key.clone();
        self.link
            .watch(&filter_key, move |value| remote.filters_changed(value));
    }

    pub fn id(&self) -> &SourceId {
        self.link.id()
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock()
    }

    /// Replace the rows and re-apply the current filters
    pub fn load(&self, records: Vec<Record>) {
        let mut state = self.state.lock();
        state.records = records;
        state.refilter();
        info!(
            view = %self.link.id(),
            rows = state.records.len(),
            visible = state.visible.len(),
            "data loaded"
        );
        state.render("data");
    }

    /// Count a redraw caused by the view's own presentation change
    pub fn redraw(&self, reason: &'static str) {
        self.state.lock().render(reason);
    }

    pub fn highlight(&self) -> Highlight {
        self.state.lock().highlight.clone()
    }

    pub fn render_count(&self) -> u64 {
        self.state.lock().renders
    }

    pub fn is_destroyed(&self) -> bool {
        self.link.is_destroyed()
    }

    /// Hover while idle, extend the brush while dragging
    pub fn pointer_move(&mut self, geometry: &impl Geometry, point: Point) -> Result<()> {
        if let Some(origin) = self.link.brush_origin() {
            let bounds = geometry.brush_region(origin, point);
            let (_, ids) = {
                let state = self.state.lock();
                geometry.brushed(&state, &bounds)
            };
            self.link.brush_move(bounds, ids)?;
            return Ok(());
        }

        let hit = {
            let state = self.state.lock();
            geometry.element_at(&state, point)
        };
        match hit {
            Some((id, selection_type)) => {
                self.link.hover_enter(id, selection_type, Some(point))?;
            }
            None => {
                self.link.hover_leave()?;
            }
        }
        Ok(())
    }

    pub fn pointer_down(&mut self, point: Point) -> Result<()> {
        self.link.brush_start(point)?;
        Ok(())
    }

    /// Commit the brush, or treat the press as a click if it never moved
    pub fn pointer_up(
        &mut self,
        geometry: &impl Geometry,
        point: Point,
        additive: bool,
    ) -> Result<Option<Vec<SelectionId>>> {
        let Some(origin) = self.link.brush_origin() else {
            return Ok(None);
        };
        if self.link.brush_bounds().is_none() {
            self.link.brush_abort();
            return Ok(self.click(geometry, point, additive));
        }

        let bounds = geometry.brush_region(origin, point);
        let (selection_type, ids) = {
            let state = self.state.lock();
            geometry.brushed(&state, &bounds)
        };
        let committed = self.link.brush_end(selection_type.clone(), ids, additive);
        if let Some(ids) = &committed {
            self.apply_local(selection_type, ids.clone());
        }
        Ok(committed)
    }

    pub fn pointer_leave(&mut self) -> Result<()> {
        self.link.hover_leave()?;
        Ok(())
    }

    pub fn cancel_gesture(&mut self) -> bool {
        self.link.brush_abort()
    }

    /// Plain click replaces the selection with the element (or clears it on
    /// empty space); an additive click toggles the element
    fn click(
        &mut self,
        geometry: &impl Geometry,
        point: Point,
        additive: bool,
    ) -> Option<Vec<SelectionId>> {
        let hit = {
            let state = self.state.lock();
            geometry.element_at(&state, point)
        };
        match hit {
            Some((id, selection_type)) if additive => Some(self.toggle(selection_type, id)),
            Some((id, selection_type)) => Some(self.select(selection_type, vec![id], false)),
            None if additive => None,
            None => {
                self.clear(ClearScope::Type(geometry.primary_type().clone()));
                Some(Vec::new())
            }
        }
    }

    /// Select on behalf of this view and redraw locally; the view skips its
    /// own `selection-changed`
    pub fn select(
        &self,
        selection_type: SelectionType,
        ids: Vec<SelectionId>,
        additive: bool,
    ) -> Vec<SelectionId> {
        let result = self.link.select(selection_type.clone(), ids, additive);
        self.apply_local(selection_type, result.clone());
        result
    }

    /// Toggle one id and redraw locally; returns the resulting selection
    pub fn toggle(&self, selection_type: SelectionType, id: SelectionId) -> Vec<SelectionId> {
        self.link.toggle(selection_type.clone(), id);
        let current = self
            .link
            .session()
            .selection()
            .get_selected(selection_type.clone());
        self.apply_local(selection_type, current.clone());
        current
    }

    pub fn clear(&self, scope: ClearScope) {
        self.link.clear(scope.clone());
        let mut state = self.state.lock();
        if state.highlight.clear(&scope) {
            state.render("local clear");
        }
    }

    fn apply_local(&self, selection_type: SelectionType, ids: Vec<SelectionId>) {
        if !self.tracked.contains(&selection_type) {
            return;
        }
        let mut state = self.state.lock();
        state.highlight.set_selected(selection_type, ids);
        state.render("local selection");
    }

    pub fn destroy(&mut self) {
        self.link.destroy();
    }
}
