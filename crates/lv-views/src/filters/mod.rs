//! Filter panel
//!
//! The panel edits a draft [`FilterState`] and publishes it as a whole. The
//! applied record lives in the reactive store, so every data view re-derives
//! its rows from the same value; the panel keeps its draft in step when
//! another source changes the filters.

use arrow::record_batch::RecordBatch;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use lv_core::{
    CategoryFilter, FilterState, NumericRange, Point, SelectionId, Session, SourceId, ViewLink,
    ViewSyncSettings,
};

use crate::data::{distinct_categories, numeric_extent, records_from_batch, Cell, Record};
use crate::error::{Result, ViewError};
use crate::highlight::Highlight;
use crate::{ViewAdapter, ViewKind};

/// Configuration for filter panels
#[derive(Debug, Clone)]
pub struct FilterPanelConfig {
    /// Explicit view id; generated when unset
    pub view_id: Option<SourceId>,

    /// Column holding each row's id
    pub id_column: String,

    /// Fields offered for filtering; every non-id column when empty
    pub fields: Vec<String>,

    /// Sync settings; session defaults when unset
    pub sync: Option<ViewSyncSettings>,
}

impl Default for FilterPanelConfig {
    fn default() -> Self {
        Self {
            view_id: None,
            id_column: "id".to_string(),
            fields: Vec::new(),
            sync: None,
        }
    }
}

/// Values a field takes in the loaded data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FieldDomain {
    Numeric { field: String, range: NumericRange },
    Categorical { field: String, values: Vec<String> },
}

impl FieldDomain {
    pub fn field(&self) -> &str {
        match self {
            FieldDomain::Numeric { field, .. } | FieldDomain::Categorical { field, .. } => field,
        }
    }
}

#[derive(Debug, Default)]
struct PanelState {
    draft: FilterState,
    applied: FilterState,
    renders: u64,
}

/// Panel that edits and publishes the session's filters
pub struct FilterPanel {
    link: ViewLink,
    config: FilterPanelConfig,
    records: Vec<Record>,
    domains: Vec<FieldDomain>,
    state: Arc<Mutex<PanelState>>,
}

impl FilterPanel {
    /// Create a new filter panel linked to `session`
    pub fn new(session: &Session, config: FilterPanelConfig) -> Result<Self> {
        let applied = session.filters()?;
        let state = Arc::new(Mutex::new(PanelState {
            draft: applied.clone(),
            applied,
            renders: 0,
        }));

        let id = config
            .view_id
            .clone()
            .unwrap_or_else(|| SourceId::generate(ViewKind::FilterPanel.as_str()));
        let settings = config.sync.unwrap_or(session.config().default_sync);
        let mut link = ViewLink::new(session, id, settings);

        let view = link.id().clone();
        let sync = session.sync().clone();
        let panel_state = state.clone();
        let filter_key = session.config().filter_key.clone();
        link.watch(&filter_key, move |value| {
            if !sync.should_sync_filters(&view) {
                return;
            }
            let filters = if value.is_null() {
                FilterState::default()
            } else {
                match serde_json::from_value::<FilterState>(value.clone()) {
                    Ok(filters) => filters,
                    Err(err) => {
                        warn!(view = %view, error = %err, "ignoring malformed filter record");
                        return;
                    }
                }
            };
            let mut state = panel_state.lock();
            state.draft = filters.clone();
            state.applied = filters;
            state.renders += 1;
        });

        Ok(Self {
            link,
            config,
            records: Vec::new(),
            domains: Vec::new(),
            state,
        })
    }

    pub fn config(&self) -> &FilterPanelConfig {
        &self.config
    }

    pub fn domains(&self) -> &[FieldDomain] {
        &self.domains
    }

    pub fn domain(&self, field: &str) -> Option<&FieldDomain> {
        self.domains.iter().find(|d| d.field() == field)
    }

    /// Filters being edited
    pub fn draft(&self) -> FilterState {
        self.state.lock().draft.clone()
    }

    /// Filters currently in effect for the session
    pub fn applied(&self) -> FilterState {
        self.state.lock().applied.clone()
    }

    /// Whether the draft differs from the applied filters
    pub fn is_dirty(&self) -> bool {
        let state = self.state.lock();
        state.draft != state.applied
    }

    /// Constrain `field` to `[min, max]` in the draft
    pub fn set_range(&mut self, field: &str, min: f64, max: f64) -> Result<()> {
        let range = NumericRange::checked(field, min, max)?;
        self.edit(|draft| {
            draft.ranges.insert(field.to_string(), range);
        });
        Ok(())
    }

    /// Allow only `values` for `field` in the draft; an empty list allows everything
    pub fn set_categories(&mut self, field: &str, values: Vec<String>) {
        let filter = match <[String; 1]>::try_from(values) {
            Ok([one]) => CategoryFilter::One(one),
            Err(values) => CategoryFilter::Any(values),
        };
        self.edit(|draft| {
            draft.categories.insert(field.to_string(), filter);
        });
    }

    /// Drop every draft constraint on `field`. True if there was one.
    pub fn clear_field(&mut self, field: &str) -> bool {
        let mut removed = false;
        self.edit(|draft| {
            removed = draft.ranges.remove(field).is_some();
            removed |= draft.categories.remove(field).is_some();
        });
        removed
    }

    /// Rows of the loaded data the draft would keep
    pub fn matching_count(&self) -> usize {
        let draft = self.draft();
        self.records.iter().filter(|r| draft.matches(*r)).count()
    }

    /// Publish the draft as the session's filters
    pub fn apply(&self) -> Result<()> {
        let draft = self.draft();
        debug!(view = %self.link.id(), fields = draft.fields().count(), "filters applied");
        self.link.session().set_filters(draft, self.link.id().clone())?;
        Ok(())
    }

    /// Drop every filter for the whole session
    pub fn reset(&self) -> Result<()> {
        self.link.session().reset_filters(self.link.id().clone())?;
        Ok(())
    }

    fn edit(&mut self, change: impl FnOnce(&mut FilterState)) {
        let mut state = self.state.lock();
        change(&mut state.draft);
        state.renders += 1;
    }

    fn compute_domains(&self) -> Vec<FieldDomain> {
        let fields: Vec<String> = match (self.config.fields.is_empty(), self.records.first()) {
            (false, _) => self.config.fields.clone(),
            (true, Some(first)) => first.values.keys().cloned().collect(),
            (true, None) => Vec::new(),
        };
        fields
            .into_iter()
            .filter_map(|field| {
                let numeric = self
                    .records
                    .iter()
                    .any(|r| matches!(r.get(&field), Some(Cell::Number(_))));
                if numeric {
                    numeric_extent(&self.records, &field)
                        .map(|range| FieldDomain::Numeric { field, range })
                } else {
                    let values = distinct_categories(&self.records, &field);
                    (!values.is_empty()).then_some(FieldDomain::Categorical { field, values })
                }
            })
            .collect()
    }
}

impl ViewAdapter for FilterPanel {
    fn id(&self) -> &SourceId {
        self.link.id()
    }

    fn kind(&self) -> ViewKind {
        ViewKind::FilterPanel
    }

    fn set_data(&mut self, batch: &RecordBatch) -> Result<()> {
        for field in &self.config.fields {
            if batch.column_by_name(field).is_none() {
                return Err(ViewError::MissingColumn(field.clone()));
            }
        }
        self.records = records_from_batch(batch, &self.config.id_column)?;
        self.domains = self.compute_domains();
        debug!(view = %self.link.id(), fields = self.domains.len(), "filter domains computed");
        self.state.lock().renders += 1;
        Ok(())
    }

    /// The panel has no data elements to hit
    fn hit_test(&self, _point: Point) -> Option<SelectionId> {
        None
    }

    /// Ids of the rows passing the applied filters
    fn visible_ids(&self) -> Vec<SelectionId> {
        let applied = self.applied();
        self.records
            .iter()
            .filter(|r| applied.matches(*r))
            .map(|r| r.id.clone())
            .collect()
    }

    fn highlight(&self) -> Highlight {
        Highlight::default()
    }

    fn render_count(&self) -> u64 {
        self.state.lock().renders
    }

    fn destroy(&mut self) {
        self.link.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.link.is_destroyed()
    }
}
