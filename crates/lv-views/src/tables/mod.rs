//! Table view implementation

use arrow::record_batch::RecordBatch;
use lv_core::{
    Axis, BrushBounds, NumericRange, Point, SelectionId, SelectionType, Session, SourceId,
    ViewSyncSettings,
};
use std::cmp::Ordering;
use tracing::debug;

use crate::data::{records_from_batch, Cell, Record};
use crate::error::{Result, ViewError};
use crate::highlight::Highlight;
use crate::view::{Geometry, ViewCore, ViewState};
use crate::{ViewAdapter, ViewKind};

/// Configuration for table views
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Explicit view id; generated when unset
    pub view_id: Option<SourceId>,

    /// Column holding each row's id
    pub id_column: String,

    /// Selection type of rows
    pub selection_type: SelectionType,

    /// Columns to show, in order; every column when empty
    pub columns: Vec<String>,

    /// Height of one row; the header sits above y = 0
    pub row_height: f64,

    /// Sync settings; session defaults when unset
    pub sync: Option<ViewSyncSettings>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            view_id: None,
            id_column: "id".to_string(),
            selection_type: SelectionType::from("sample"),
            columns: Vec::new(),
            row_height: 20.0,
            sync: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
struct TableLayout {
    config: TableConfig,
    /// Every column in the loaded batch, id column first
    schema: Vec<String>,
    sort: Option<(String, SortDirection)>,
}

impl TableLayout {
    /// Visible record indices in display order
    fn order(&self, state: &ViewState) -> Vec<usize> {
        let mut order = state.visible.clone();
        if let Some((column, direction)) = &self.sort {
            // Stable, so ties keep data order
            order.sort_by(|&a, &b| {
                self.compare(&state.records[a], &state.records[b], column, *direction)
            });
        }
        order
    }

    /// Missing values sort last in either direction
    fn compare(&self, a: &Record, b: &Record, column: &str, direction: SortDirection) -> Ordering {
        let ordering = if column == self.config.id_column {
            a.id.cmp(&b.id)
        } else {
            match (a.get(column), b.get(column)) {
                (Some(Cell::Number(x)), Some(Cell::Number(y))) => x.total_cmp(y),
                (Some(Cell::Text(x)), Some(Cell::Text(y))) => x.cmp(y),
                (Some(Cell::Number(_)), Some(Cell::Text(_))) => Ordering::Less,
                (Some(Cell::Text(_)), Some(Cell::Number(_))) => Ordering::Greater,
                (left, right) => {
                    let missing = |c: Option<&Cell>| matches!(c, None | Some(Cell::Null));
                    return missing(left).cmp(&missing(right));
                }
            }
        };
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    }

    fn row_index(&self, y: f64) -> Option<usize> {
        if y < 0.0 {
            return None;
        }
        Some((y / self.config.row_height).floor() as usize)
    }

    fn rows_in(&self, state: &ViewState, range: &NumericRange) -> Vec<SelectionId> {
        let height = self.config.row_height;
        self.order(state)
            .into_iter()
            .enumerate()
            .filter(|(row, _)| {
                let top = *row as f64 * height;
                range.min < top + height && range.max >= top
            })
            .map(|(_, index)| state.records[index].id.clone())
            .collect()
    }
}

impl Geometry for TableLayout {
    fn primary_type(&self) -> &SelectionType {
        &self.config.selection_type
    }

    fn element_at(&self, state: &ViewState, point: Point) -> Option<(SelectionId, SelectionType)> {
        let row = self.row_index(point.y)?;
        let index = *self.order(state).get(row)?;
        Some((
            state.records[index].id.clone(),
            self.config.selection_type.clone(),
        ))
    }

    /// Tables brush contiguous row ranges
    fn brush_region(&self, origin: Point, current: Point) -> BrushBounds {
        BrushBounds::Interval {
            axis: Axis::Y,
            range: NumericRange::new(origin.y, current.y),
        }
    }

    fn brushed(&self, state: &ViewState, bounds: &BrushBounds) -> (SelectionType, Vec<SelectionId>) {
        let ids = match bounds {
            BrushBounds::Interval {
                axis: Axis::Y,
                range,
            }
            | BrushBounds::Rect { y: range, .. } => self.rows_in(state, range),
            BrushBounds::Interval { axis: Axis::X, .. } => Vec::new(),
        };
        (self.config.selection_type.clone(), ids)
    }
}

/// Table view that lists rows with their selection and hover state
pub struct TableView {
    core: ViewCore,
    layout: TableLayout,
}

impl TableView {
    /// Create a new table view linked to `session`
    pub fn new(session: &Session, config: TableConfig) -> Result<Self> {
        let core = ViewCore::new(
            session,
            ViewKind::Table,
            config.view_id.clone(),
            config.sync,
            vec![config.selection_type.clone()],
        )?;
        Ok(Self {
            core,
            layout: TableLayout {
                config,
                schema: Vec::new(),
                sort: None,
            },
        })
    }

    pub fn config(&self) -> &TableConfig {
        &self.layout.config
    }

    /// Shown columns, id column first
    pub fn columns(&self) -> Vec<String> {
        if self.layout.config.columns.is_empty() {
            return self.layout.schema.clone();
        }
        let mut columns = vec![self.layout.config.id_column.clone()];
        columns.extend(
            self.layout
                .config
                .columns
                .iter()
                .filter(|c| **c != self.layout.config.id_column)
                .cloned(),
        );
        columns
    }

    /// Row ids in display order
    pub fn rows(&self) -> Vec<SelectionId> {
        self.visible_ids()
    }

    pub fn cell(&self, id: &SelectionId, column: &str) -> Option<Cell> {
        let state = self.core.state();
        let record = state.records.iter().find(|r| &r.id == id)?;
        if column == self.layout.config.id_column {
            return Some(Cell::Text(record.id.to_string()));
        }
        record.get(column).cloned()
    }

    /// Order rows by `column`. Unknown columns are rejected once data is loaded.
    pub fn sort_by(&mut self, column: &str, direction: SortDirection) -> Result<()> {
        if !self.layout.schema.is_empty() && !self.layout.schema.iter().any(|c| c == column) {
            return Err(ViewError::MissingColumn(column.to_string()));
        }
        self.layout.sort = Some((column.to_string(), direction));
        debug!(view = %self.core.id(), column, ?direction, "table sorted");
        self.core.redraw("sort");
        Ok(())
    }

    pub fn clear_sort(&mut self) {
        if self.layout.sort.take().is_some() {
            self.core.redraw("sort");
        }
    }

    pub fn sort(&self) -> Option<(&str, SortDirection)> {
        self.layout
            .sort
            .as_ref()
            .map(|(column, direction)| (column.as_str(), *direction))
    }

    /// Row click: plain replaces the selection, additive toggles the row.
    /// Rows hidden by the filters are ignored.
    pub fn click_row(&self, id: &SelectionId, additive: bool) -> Option<Vec<SelectionId>> {
        let visible = {
            let state = self.core.state();
            let found = state.visible_records().any(|r| &r.id == id);
            found
        };
        if !visible {
            return None;
        }
        let selection_type = self.layout.config.selection_type.clone();
        Some(if additive {
            self.core.toggle(selection_type, id.clone())
        } else {
            self.core.select(selection_type, vec![id.clone()], false)
        })
    }

    pub fn select(&self, ids: Vec<SelectionId>, additive: bool) -> Vec<SelectionId> {
        self.core
            .select(self.layout.config.selection_type.clone(), ids, additive)
    }
}

impl ViewAdapter for TableView {
    fn id(&self) -> &SourceId {
        self.core.id()
    }

    fn kind(&self) -> ViewKind {
        self.core.kind()
    }

    fn set_data(&mut self, batch: &RecordBatch) -> Result<()> {
        for column in &self.layout.config.columns {
            if batch.column_by_name(column).is_none() {
                return Err(ViewError::MissingColumn(column.clone()));
            }
        }
        let records = records_from_batch(batch, &self.layout.config.id_column)?;

        let id_column = &self.layout.config.id_column;
        let mut schema = vec![id_column.clone()];
        schema.extend(
            batch
                .schema()
                .fields()
                .iter()
                .map(|field| field.name().clone())
                .filter(|name| name != id_column),
        );
        if let Some((column, _)) = &self.layout.sort {
            if !schema.contains(column) {
                self.layout.sort = None;
            }
        }
        self.layout.schema = schema;
        self.core.load(records);
        Ok(())
    }

    fn hit_test(&self, point: Point) -> Option<SelectionId> {
        self.layout
            .element_at(&self.core.state(), point)
            .map(|(id, _)| id)
    }

    fn visible_ids(&self) -> Vec<SelectionId> {
        let state = self.core.state();
        self.layout
            .order(&state)
            .into_iter()
            .map(|index| state.records[index].id.clone())
            .collect()
    }

    fn highlight(&self) -> Highlight {
        self.core.highlight()
    }

    fn render_count(&self) -> u64 {
        self.core.render_count()
    }

    fn pointer_move(&mut self, point: Point) -> Result<()> {
        self.core.pointer_move(&self.layout, point)
    }

    fn pointer_down(&mut self, point: Point) -> Result<()> {
        self.core.pointer_down(point)
    }

    fn pointer_up(&mut self, point: Point, additive: bool) -> Result<Option<Vec<SelectionId>>> {
        self.core.pointer_up(&self.layout, point, additive)
    }

    fn pointer_leave(&mut self) -> Result<()> {
        self.core.pointer_leave()
    }

    fn cancel_gesture(&mut self) -> bool {
        self.core.cancel_gesture()
    }

    fn destroy(&mut self) {
        self.core.destroy();
    }

    fn is_destroyed(&self) -> bool {
        self.core.is_destroyed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures;
    use lv_core::{Event, FilterState, SessionConfig, Topic};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    fn table(session: &Session) -> TableView {
        let mut view = TableView::new(
            session,
            TableConfig {
                view_id: Some("table".into()),
                id_column: "sample".to_string(),
                row_height: 10.0,
                ..TableConfig::default()
            },
        )
        .unwrap();
        view.set_data(&fixtures::samples()).unwrap();
        view
    }

    fn ids(values: &[&str]) -> Vec<SelectionId> {
        values.iter().map(|v| SelectionId::from(*v)).collect()
    }

    #[test]
    fn test_columns_and_cells() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let mut view = table(&session);
        assert_eq!(view.columns(), vec!["sample", "g1", "g2", "tissue", "score"]);
        assert_eq!(view.cell(&"s2".into(), "tissue"), Some(Cell::Text("brain".to_string())));
        assert_eq!(view.cell(&"s2".into(), "sample"), Some(Cell::Text("s2".to_string())));
        assert_eq!(view.cell(&"s9".into(), "tissue"), None);
        view.destroy();
    }

    #[test]
    fn test_sort_orders_rows_with_missing_last() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let mut view = table(&session);

        view.sort_by("g1", SortDirection::Descending).unwrap();
        assert_eq!(view.rows(), ids(&["s5", "s4", "s3", "s2", "s1", "s6"]));

        view.sort_by("tissue", SortDirection::Ascending).unwrap();
        assert_eq!(view.rows(), ids(&["s2", "s5", "s4", "s1", "s3", "s6"]));

        view.sort_by("score", SortDirection::Ascending).unwrap();
        assert_eq!(view.rows()[0], SelectionId::from("s4"));
        assert_eq!(view.hit_test(Point::new(0.0, 5.0)), Some("s4".into()));
        assert_eq!(view.sort(), Some(("score", SortDirection::Ascending)));

        view.clear_sort();
        assert_eq!(view.rows()[0], SelectionId::from("s1"));
        view.destroy();
    }

    #[test]
    fn test_sort_by_unknown_column() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let mut view = table(&session);
        assert!(matches!(
            view.sort_by("nope", SortDirection::Ascending),
            Err(ViewError::MissingColumn(_))
        ));
        assert_eq!(view.sort(), None);
        view.destroy();
    }

    #[test]
    fn test_header_is_not_a_row() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let mut view = table(&session);
        assert_eq!(view.hit_test(Point::new(3.0, -4.0)), None);
        assert_eq!(view.hit_test(Point::new(3.0, 15.0)), Some("s2".into()));
        assert_eq!(view.hit_test(Point::new(3.0, 65.0)), None);
        view.destroy();
    }

    #[test]
    fn test_click_row_replaces_or_toggles() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let mut view = table(&session);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = session
            .bus()
            .on(Topic::SelectionChanged, move |e| sink.lock().push(e.clone()));

        assert_eq!(view.click_row(&"s1".into(), false), Some(ids(&["s1"])));
        assert_eq!(view.click_row(&"s3".into(), true), Some(ids(&["s1", "s3"])));
        assert_eq!(view.click_row(&"s1".into(), true), Some(ids(&["s3"])));
        assert_eq!(view.click_row(&"s9".into(), false), None);

        assert_eq!(view.highlight().selected(&"sample".into()), ids(&["s3"]));
        assert!(seen.lock().iter().all(|e| e.is_from(&"table".into())));
        assert_eq!(seen.lock().len(), 3);
        view.destroy();
    }

    #[test]
    fn test_click_row_ignores_filtered_rows() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let mut view = table(&session);
        session
            .set_filters(
                FilterState::new().with_range("g1", NumericRange::new(2.0, 4.0)),
                "panel",
            )
            .unwrap();

        assert_eq!(view.click_row(&"s1".into(), false), None);
        assert_eq!(view.click_row(&"s3".into(), false), Some(ids(&["s3"])));
        assert_eq!(session.selection().get_selected("sample"), ids(&["s3"]));
        view.destroy();
    }

    #[test]
    fn test_remote_clear_drops_highlight() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let mut view = table(&session);
        session
            .selection()
            .select("sample", ["s1"], lv_core::SelectOptions::replace("plot"));
        assert!(view.highlight().is_selected(&"sample".into(), &"s1".into()));

        let before = view.render_count();
        session.selection().clear(lv_core::ClearScope::All, "toolbar");
        assert!(view.highlight().selected.is_empty());
        assert_eq!(view.render_count(), before + 1);
        view.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drag_selects_row_range_in_display_order() {
        let session = Session::new(SessionConfig::default()).unwrap();
        let mut view = table(&session);
        let previews = Arc::new(Mutex::new(Vec::new()));
        let sink = previews.clone();
        let _sub = session.bus().on(Topic::BrushPreview, move |e| {
            if let Event::BrushPreview(p) = e {
                sink.lock().push(p.ids.clone());
            }
        });
        view.sort_by("score", SortDirection::Descending).unwrap();

        view.pointer_down(Point::new(1.0, 2.0)).unwrap();
        view.pointer_move(Point::new(1.0, 12.0)).unwrap();
        view.pointer_move(Point::new(1.0, 25.0)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        let committed = view.pointer_up(Point::new(1.0, 25.0), false).unwrap();

        assert_eq!(*previews.lock(), vec![ids(&["s5", "s3", "s1"])]);
        assert_eq!(committed, Some(ids(&["s5", "s3", "s1"])));
        view.destroy();
    }
}
