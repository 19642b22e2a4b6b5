//! Overlay state a view draws on top of its data

use indexmap::{IndexMap, IndexSet};
use lv_core::{BrushBounds, ClearScope, SelectionId, SelectionType, SourceId};

/// Another view's in-progress brush
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewLayer {
    pub source: SourceId,
    pub bounds: BrushBounds,
    pub ids: Vec<SelectionId>,
}

/// Element hovered in another view
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteHover {
    pub source: SourceId,
    pub id: SelectionId,
    pub selection_type: SelectionType,
}

/// Everything a view highlights: committed selections per type, at most one
/// brush preview and at most one remote hover
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Highlight {
    pub selected: IndexMap<SelectionType, IndexSet<SelectionId>>,
    pub preview: Option<PreviewLayer>,
    pub hovered: Option<RemoteHover>,
}

impl Highlight {
    pub fn is_selected(&self, selection_type: &SelectionType, id: &SelectionId) -> bool {
        self.selected
            .get(selection_type)
            .map(|ids| ids.contains(id))
            .unwrap_or(false)
    }

    /// Selected ids of one type, in selection order
    pub fn selected(&self, selection_type: &SelectionType) -> Vec<SelectionId> {
        self.selected
            .get(selection_type)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_previewed(&self, id: &SelectionId) -> bool {
        self.preview
            .as_ref()
            .map(|layer| layer.ids.contains(id))
            .unwrap_or(false)
    }

    pub fn is_hovered(&self, id: &SelectionId) -> bool {
        self.hovered.as_ref().map(|h| &h.id == id).unwrap_or(false)
    }

    pub(crate) fn set_selected(
        &mut self,
        selection_type: SelectionType,
        ids: impl IntoIterator<Item = SelectionId>,
    ) {
        let ids: IndexSet<SelectionId> = ids.into_iter().collect();
        if ids.is_empty() {
            self.selected.shift_remove(&selection_type);
        } else {
            self.selected.insert(selection_type, ids);
        }
    }

    /// Drop selections `scope` covers. True if anything was removed.
    pub(crate) fn clear(&mut self, scope: &ClearScope) -> bool {
        let before = self.selected.len();
        self.selected.retain(|selection_type, _| !scope.covers(selection_type));
        self.selected.len() != before
    }

    /// Drop the preview `source` put up. True if there was one.
    pub(crate) fn drop_preview_from(&mut self, source: &SourceId) -> bool {
        if self.preview.as_ref().is_some_and(|p| &p.source == source) {
            self.preview = None;
            true
        } else {
            false
        }
    }

    /// Forget the preview and hover that `source` put up. True if either existed.
    pub(crate) fn release_source(&mut self, source: &SourceId) -> bool {
        let mut changed = self.drop_preview_from(source);
        if self.hovered.as_ref().is_some_and(|h| &h.source == source) {
            self.hovered = None;
            changed = true;
        }
        changed
    }
}
