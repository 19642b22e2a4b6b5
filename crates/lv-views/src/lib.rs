//! View adapters for linked visualizations
//!
//! Every adapter turns an Arrow [`RecordBatch`] into rows, keeps its
//! highlight in step with the session and turns pointer gestures into the
//! shared hover, brush and selection protocol. Adapters never reference each
//! other; all coordination goes through the [`Session`](lv_core::Session).

mod data;
mod error;
mod highlight;
mod view;

pub mod filters;
pub mod plots;
pub mod tables;

pub use data::{distinct_categories, numeric_extent, records_from_batch, Cell, Record};
pub use error::{Result, ViewError};
pub use filters::{FieldDomain, FilterPanel, FilterPanelConfig};
pub use highlight::{Highlight, PreviewLayer, RemoteHover};
pub use plots::{HeatmapConfig, HeatmapView, ScatterPlotConfig, ScatterPlotView};
pub use tables::{SortDirection, TableConfig, TableView};

use arrow::record_batch::RecordBatch;
use lv_core::{Point, SelectionId, SourceId};

/// Kind of adapter, also used as the prefix of generated view ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    PointPlot,
    Matrix,
    Table,
    FilterPanel,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::PointPlot => "point-plot",
            ViewKind::Matrix => "matrix",
            ViewKind::Table => "table",
            ViewKind::FilterPanel => "filter-panel",
        }
    }
}

impl std::fmt::Display for ViewKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Base trait for all linked views
pub trait ViewAdapter: Send {
    /// Source id stamped on everything this view emits
    fn id(&self) -> &SourceId;

    fn kind(&self) -> ViewKind;

    /// Replace the view's rows
    fn set_data(&mut self, batch: &RecordBatch) -> Result<()>;

    /// Element under `point`, in view coordinates
    fn hit_test(&self, point: Point) -> Option<SelectionId>;

    /// Ids currently shown, in display order
    fn visible_ids(&self) -> Vec<SelectionId>;

    fn highlight(&self) -> Highlight;

    /// How many times the view redrew for new data, filters or highlights
    fn render_count(&self) -> u64;

    /// Pointer moved to `point`: hover when idle, extend the brush when dragging
    fn pointer_move(&mut self, _point: Point) -> Result<()> {
        // Default implementation does nothing
        Ok(())
    }

    /// Pointer pressed; starts a brush
    fn pointer_down(&mut self, _point: Point) -> Result<()> {
        Ok(())
    }

    /// Pointer released. Commits the brush, or acts as a click if the
    /// pointer never moved. Returns the resulting selection, if any.
    fn pointer_up(&mut self, _point: Point, _additive: bool) -> Result<Option<Vec<SelectionId>>> {
        Ok(None)
    }

    fn pointer_leave(&mut self) -> Result<()> {
        Ok(())
    }

    /// Abandon an in-progress brush. True if one was active.
    fn cancel_gesture(&mut self) -> bool {
        false
    }

    /// Release every subscription and announce the view's removal
    fn destroy(&mut self);

    fn is_destroyed(&self) -> bool;
}
