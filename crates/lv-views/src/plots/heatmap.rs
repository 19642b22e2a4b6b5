//! Matrix (heatmap) implementation
//!
//! Rows are records and columns are the configured value columns. Cell
//! `(row, column)` covers `[column * cell_width, (column + 1) * cell_width)`
//! horizontally and the matching band of `cell_height` vertically. Column
//! headers sit above the matrix (negative y) and row labels to its left
//! (negative x).

use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use lv_core::{
    Axis, BrushBounds, Filterable, NumericRange, Point, SelectionId, SelectionType, Session,
    SourceId, ViewSyncSettings,
};

use crate::data::records_from_batch;
use crate::error::{Result, ViewError};
use crate::highlight::Highlight;
use crate::view::{Geometry, ViewCore, ViewState};
use crate::{ViewAdapter, ViewKind};

/// Configuration for heatmaps
#[derive(Debug, Clone)]
pub struct HeatmapConfig {
    /// Explicit view id; generated when unset
    pub view_id: Option<SourceId>,

    /// Column holding each row's id
    pub id_column: String,

    /// Value columns shown left to right; every numeric column when empty
    pub value_columns: Vec<String>,

    /// Selection type of rows
    pub row_type: SelectionType,

    /// Selection type of columns; column ids are the column names
    pub column_type: SelectionType,

    /// Cell size
    pub cell_width: f64,
    pub cell_height: f64,

    /// Sync settings; session defaults when unset
    pub sync: Option<ViewSyncSettings>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            view_id: None,
            id_column: "id".to_string(),
            value_columns: Vec::new(),
            row_type: SelectionType::from("gene"),
            column_type: SelectionType::from("sample"),
            cell_width: 1.0,
            cell_height: 1.0,
            sync: None,
        }
    }
}

/// Config plus the resolved column list
#[derive(Debug, Clone)]
struct MatrixLayout {
    config: HeatmapConfig,
    columns: Vec<String>,
}

impl MatrixLayout {
    fn row_index(&self, y: f64) -> Option<usize> {
        if y < 0.0 {
            return None;
        }
        Some((y / self.config.cell_height).floor() as usize)
    }

    fn column_index(&self, x: f64) -> Option<usize> {
        if x < 0.0 {
            return None;
        }
        let index = (x / self.config.cell_width).floor() as usize;
        (index < self.columns.len()).then_some(index)
    }

    fn column_id(&self, index: usize) -> SelectionId {
        SelectionId::from(self.columns[index].as_str())
    }

    /// Indices of bands of `size` overlapping `range`, capped at `count`
    fn bands(range: &NumericRange, size: f64, count: usize) -> impl Iterator<Item = usize> {
        let range = *range;
        (0..count).filter(move |&i| {
            let start = i as f64 * size;
            let end = start + size;
            range.min < end && range.max >= start
        })
    }
}

impl Geometry for MatrixLayout {
    fn primary_type(&self) -> &SelectionType {
        &self.config.row_type
    }

    fn element_at(&self, state: &ViewState, point: Point) -> Option<(SelectionId, SelectionType)> {
        if point.y < 0.0 {
            let column = self.column_index(point.x)?;
            return Some((self.column_id(column), self.config.column_type.clone()));
        }
        if point.x >= 0.0 {
            self.column_index(point.x)?;
        }
        let row = self.row_index(point.y)?;
        let index = *state.visible.get(row)?;
        Some((state.records[index].id.clone(), self.config.row_type.clone()))
    }

    /// Drags starting in the header brush columns; anywhere else brushes rows
    fn brush_region(&self, origin: Point, current: Point) -> BrushBounds {
        if origin.y < 0.0 {
            BrushBounds::Interval {
                axis: Axis::X,
                range: NumericRange::new(origin.x, current.x),
            }
        } else {
            BrushBounds::Interval {
                axis: Axis::Y,
                range: NumericRange::new(origin.y, current.y),
            }
        }
    }

    fn brushed(&self, state: &ViewState, bounds: &BrushBounds) -> (SelectionType, Vec<SelectionId>) {
        match bounds {
            BrushBounds::Interval {
                axis: Axis::X,
                range,
            } => {
                let ids = Self::bands(range, self.config.cell_width, self.columns.len())
                    .map(|i| self.column_id(i))
                    .collect();
                (self.config.column_type.clone(), ids)
            }
            BrushBounds::Interval {
                axis: Axis::Y,
                range,
            }
            | BrushBounds::Rect { y: range, .. } => {
                let ids = Self::bands(range, self.config.cell_height, state.visible.len())
                    .map(|row| state.records[state.visible[row]].id.clone())
                    .collect();
                (self.config.row_type.clone(), ids)
            }
        }
    }
}

/// Matrix of rows by value columns
pub struct HeatmapView {
    core: ViewCore,
    layout: MatrixLayout,
}

impl HeatmapView {
    /// Create a new heatmap linked to `session`
    pub fn new(session: &Session, config: HeatmapConfig) -> Result<Self> {
        let mut tracked = vec![config.row_type.clone()];
        if config.column_type != config.row_type {
            tracked.push(config.column_type.clone());
        }
        let core = ViewCore::new(
            session,
            ViewKind::Matrix,
            config.view_id.clone(),
            config.sync,
            tracked,
        )?;
        Ok(Self {
            core,
            layout: MatrixLayout {
                columns: config.value_columns.clone(),
                config,
            },
        })
    }

    pub fn config(&self) -> &HeatmapConfig {
        &self.layout.config
    }

    /// Column names, left to right
    pub fn columns(&self) -> &[String] {
        &self.layout.columns
    }

    /// Row ids, top to bottom
    pub fn rows(&self) -> Vec<SelectionId> {
        self.visible_ids()
    }

    /// Row id, column id and value of the cell under `point`
    pub fn cell_at(&self, point: Point) -> Option<(SelectionId, SelectionId, Option<f64>)> {
        let column = self.layout.column_index(point.x)?;
        let row = self.layout.row_index(point.y)?;
        let state = self.core.state();
        let record = &state.records[*state.visible.get(row)?];
        let value = record.number(&self.layout.columns[column]);
        Some((record.id.clone(), self.layout.column_id(column), value))
    }

    /// Column id under `point`, whether in the header or the body
    pub fn column_at(&self, point: Point) -> Option<SelectionId> {
        self.layout
            .column_index(point.x)
            .map(|i| self.layout.column_id(i))
    }

    /// Row id under `point`, whether on a label or in the body
    pub fn row_at(&self, point: Point) -> Option<SelectionId> {
        let row = self.layout.row_index(point.y)?;
        let state = self.core.state();
        let index = *state.visible.get(row)?;
        Some(state.records[index].id.clone())
    }

    /// Value range across every visible cell
    pub fn value_range(&self) -> Option<NumericRange> {
        let state = self.core.state();
        NumericRange::extent(state.visible_records().flat_map(|record| {
            self.layout
                .columns
                .iter()
                .filter_map(move |column| record.number(column))
        }))
    }

    pub fn select_rows(&self, ids: Vec<SelectionId>, additive: bool) -> Vec<SelectionId> {
        self.core
            .select(self.layout.config.row_type.clone(), ids, additive)
    }

    pub fn select_columns(&self, ids: Vec<SelectionId>, additive: bool) -> Vec<SelectionId> {
        self.core
            .select(self.layout.config.column_type.clone(), ids, additive)
    }
}

impl ViewAdapter for HeatmapView {
    fn id(&self) -> &SourceId {
        self.core.id()
    }

    fn kind(&self) -> ViewKind {
        self.core.kind()
    }

    fn set_data(&mut self, batch: &RecordBatch) -> Result<()> {
        let columns = if self.layout.config.value_columns.is_empty() {
            batch
                .schema()
                .fields()
                .iter()
                .filter(|field| field.name() != &self.layout.config.id_column)
                .filter(|field| {
                    matches!(
                        field.data_type(),
                        DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
                    )
                })
                .map(|field| field.name().clone())
                .collect()
        } else {
            for column in &self.layout.config.value_columns {
                if batch.column_by_name(column).is_none() {
                    return Err(ViewError::MissingColumn(column.clone()));
                }
            }
            self.layout.config.value_columns.clone()
        };

        let records = records_from_batch(batch, &self.layout.config.id_column)?;
        self.layout.columns = columns;
        self.core.load(records);
        Ok(())
    }

    fn hit_test(&self, point: Point) -> Option<SelectionId> {
        self.layout
            .element_at(&self.core.state(), point)
            .map(|(id, _)| id)
    }

    fn visible_ids(&self) -> Vec<SelectionId> {
        self.core
            .state()
            .visible_records()
            .map(|record| record.id.clone())
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
