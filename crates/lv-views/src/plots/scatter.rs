//! Point plot implementation

use arrow::record_batch::RecordBatch;
use lv_core::{
    BrushBounds, Filterable, Point, SelectionId, SelectionType, Session, SourceId,
    ViewSyncSettings,
};

use crate::data::{records_from_batch, Record};
use crate::error::{Result, ViewError};
use crate::highlight::Highlight;
use crate::view::{Geometry, ViewCore, ViewState};
use crate::{ViewAdapter, ViewKind};

/// Configuration for scatter plots
#[derive(Debug, Clone)]
pub struct ScatterPlotConfig {
    /// Explicit view id; generated when unset
    pub view_id: Option<SourceId>,

    /// Column holding each point's id
    pub id_column: String,

    /// X-axis column
    pub x_column: String,

    /// Y-axis column
    pub y_column: String,

    /// Selection type of the plotted points
    pub selection_type: SelectionType,

    /// Largest distance, in data units, at which the pointer hits a point
    pub hit_radius: f64,

    /// Sync settings; session defaults when unset
    pub sync: Option<ViewSyncSettings>,
}

impl Default for ScatterPlotConfig {
    fn default() -> Self {
        Self {
            view_id: None,
            id_column: "id".to_string(),
            x_column: "x".to_string(),
            y_column: "y".to_string(),
            selection_type: SelectionType::from("sample"),
            hit_radius: 0.5,
            sync: None,
        }
    }
}

impl ScatterPlotConfig {
    fn position(&self, record: &Record) -> Option<Point> {
        Some(Point::new(
            record.number(&self.x_column)?,
            record.number(&self.y_column)?,
        ))
    }
}

impl Geometry for ScatterPlotConfig {
    fn primary_type(&self) -> &SelectionType {
        &self.selection_type
    }

    /// Nearest visible point within the hit radius
    fn element_at(&self, state: &ViewState, point: Point) -> Option<(SelectionId, SelectionType)> {
        state
            .visible_records()
            .filter_map(|record| {
                self.position(record)
                    .map(|p| (record, p.distance(point)))
            })
            .filter(|(_, distance)| *distance <= self.hit_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(record, _)| (record.id.clone(), self.selection_type.clone()))
    }

    fn brush_region(&self, origin: Point, current: Point) -> BrushBounds {
        BrushBounds::from_corners(origin, current)
    }

    fn brushed(&self, state: &ViewState, bounds: &BrushBounds) -> (SelectionType, Vec<SelectionId>) {
        let ids = state
            .visible_records()
            .filter(|record| {
                self.position(record)
                    .is_some_and(|p| bounds.contains(p))
            })
            .map(|record| record.id.clone())
            .collect();
        (self.selection_type.clone(), ids)
    }
}

/// Scatter plot of two numeric columns
pub struct ScatterPlotView {
    core: ViewCore,
    config: ScatterPlotConfig,
}

impl ScatterPlotView {
    /// Create a new scatter plot linked to `session`
    pub fn new(session: &Session, config: ScatterPlotConfig) -> Result<Self> {
        let core = ViewCore::new(
            session,
            ViewKind::PointPlot,
            config.view_id.clone(),
            config.sync,
            vec![config.selection_type.clone()],
        )?;
        Ok(Self { core, config })
    }

    pub fn config(&self) -> &ScatterPlotConfig {
        &self.config
    }

    /// Visible points that have both coordinates
    pub fn points(&self) -> Vec<(SelectionId, Point)> {
        let state = self.core.state();
        state
            .visible_records()
            .filter_map(|record| {
                self.config
                    .position(record)
                    .map(|p| (record.id.clone(), p))
            })
            .collect()
    }

    /// Select points on behalf of this plot
    pub fn select(&self, ids: Vec<SelectionId>, additive: bool) -> Vec<SelectionId> {
        self.core
            .select(self.config.selection_type.clone(), ids, additive)
    }
}

impl ViewAdapter for ScatterPlotView {
    fn id(&self) -> &SourceId {
        self.core.id()
    }

    fn kind(&self) -> ViewKind {
        self.core.kind()
    }

    fn set_data(&mut self, batch: &RecordBatch) -> Result<()> {
        for column in [&self.config.x_column, &self.config.y_column] {
            if batch.column_by_name(column).is_none() {
                return Err(ViewError::MissingColumn(column.clone()));
            }
        }
        let records = records_from_batch(batch, &self.config.id_column)?;
        self.core.load(records);
        Ok(())
    }

    fn hit_test(&self, point: Point) -> Option<SelectionId> {
        self.config
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
        self.core.pointer_move(&self.config, point)
    }

    fn pointer_down(&mut self, point: Point) -> Result<()> {
        self.core.pointer_down(point)
    }

    fn pointer_up(&mut self, point: Point, additive: bool) -> Result<Option<Vec<SelectionId>>> {
        self.core.pointer_up(&self.config, point, additive)
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
    use crate::tables::{TableConfig, TableView};
    use lv_core::{CategoryFilter, FilterState, SessionConfig, Topic};
    use std::time::Duration;

    fn session() -> Session {
        Session::new(SessionConfig::default()).unwrap()
    }

    fn plot(session: &Session, id: &str) -> ScatterPlotView {
        let mut view = ScatterPlotView::new(
            session,
            ScatterPlotConfig {
                view_id: Some(id.into()),
                id_column: "sample".to_string(),
                x_column: "g1".to_string(),
                y_column: "g2".to_string(),
                ..ScatterPlotConfig::default()
            },
        )
        .unwrap();
        view.set_data(&fixtures::samples()).unwrap();
        view
    }

    fn table(session: &Session, id: &str, sync: Option<ViewSyncSettings>) -> TableView {
        let mut view = TableView::new(
            session,
            TableConfig {
                view_id: Some(id.into()),
                id_column: "sample".to_string(),
                sync,
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
    fn test_points_skip_missing_coordinates() {
        let session = session();
        let mut view = plot(&session, "plot");
        let points = view.points();
        assert_eq!(points.len(), 5);
        assert_eq!(points[2], (SelectionId::from("s3"), Point::new(2.0, 4.0)));
        view.destroy();
    }

    #[test]
    fn test_missing_axis_column() {
        let session = session();
        let mut view = ScatterPlotView::new(
            &session,
            ScatterPlotConfig {
                id_column: "sample".to_string(),
                x_column: "g9".to_string(),
                ..ScatterPlotConfig::default()
            },
        )
        .unwrap();
        let err = view.set_data(&fixtures::samples()).unwrap_err();
        assert!(matches!(err, ViewError::MissingColumn(c) if c == "g9"));
        assert!(view.id().as_str().starts_with("point-plot"));
        view.destroy();
    }

    #[test]
    fn test_hit_test_nearest_within_radius() {
        let session = session();
        let mut view = plot(&session, "plot");
        assert_eq!(view.hit_test(Point::new(1.1, 0.9)), Some("s2".into()));
        assert_eq!(view.hit_test(Point::new(1.6, 1.0)), None);
        view.destroy();
    }

    #[test]
    fn test_selection_reaches_other_views_without_echo() {
        let session = session();
        let mut a = plot(&session, "A");
        let mut b = table(&session, "B", None);
        let (a_before, b_before) = (a.render_count(), b.render_count());

        a.select(ids(&["s1", "s2"]), false);

        assert_eq!(b.highlight().selected(&"sample".into()), ids(&["s1", "s2"]));
        assert_eq!(b.render_count(), b_before + 1);
        // Only the local redraw; the plot ignores its own event
        assert_eq!(a.render_count(), a_before + 1);
        assert_eq!(a.highlight().selected(&"sample".into()), ids(&["s1", "s2"]));

        a.destroy();
        b.destroy();
    }

    #[test]
    fn test_click_selects_and_empty_click_clears() {
        let session = session();
        let mut a = plot(&session, "A");
        let mut b = table(&session, "B", None);

        a.pointer_down(Point::new(1.0, 1.0)).unwrap();
        let selected = a.pointer_up(Point::new(1.0, 1.0), false).unwrap();
        assert_eq!(selected, Some(ids(&["s2"])));

        a.pointer_down(Point::new(2.0, 4.0)).unwrap();
        a.pointer_up(Point::new(2.0, 4.0), true).unwrap();
        assert_eq!(session.selection().get_selected("sample"), ids(&["s2", "s3"]));
        assert_eq!(b.highlight().selected(&"sample".into()), ids(&["s2", "s3"]));

        a.pointer_down(Point::new(10.0, 0.0)).unwrap();
        a.pointer_up(Point::new(10.0, 0.0), false).unwrap();
        assert!(session.selection().get_selected("sample").is_empty());
        assert!(b.highlight().selected.is_empty());
        assert!(a.highlight().selected.is_empty());

        a.destroy();
        b.destroy();
    }

    #[test]
    fn test_hover_is_mirrored_unless_disabled() {
        let session = session();
        let mut a = plot(&session, "A");
        let mut b = table(&session, "B", None);
        let no_hover = ViewSyncSettings {
            sync_hover: false,
            ..ViewSyncSettings::default()
        };
        let mut c = table(&session, "C", Some(no_hover));

        a.pointer_move(Point::new(1.0, 1.0)).unwrap();
        assert!(b.highlight().is_hovered(&"s2".into()));
        assert!(c.highlight().hovered.is_none());
        assert_eq!(session.hovered().unwrap().map(|h| h.id), Some("s2".into()));

        a.pointer_leave().unwrap();
        assert!(b.highlight().hovered.is_none());
        assert_eq!(session.hovered().unwrap(), None);

        for view in [&mut b, &mut c] {
            view.destroy();
        }
        a.destroy();
    }

    #[test]
    fn test_filters_derive_visible_rows() {
        let session = session();
        let mut a = plot(&session, "A");
        let before = a.render_count();

        let filters = FilterState::new()
            .with_category("tissue", CategoryFilter::One("liver".to_string()));
        session.set_filters(filters, "panel").unwrap();

        assert_eq!(a.visible_ids(), ids(&["s1", "s3"]));
        assert_eq!(a.render_count(), before + 1);
        assert_eq!(a.hit_test(Point::new(1.0, 1.0)), None);

        session.reset_filters("panel").unwrap();
        assert_eq!(a.visible_ids().len(), 6);
        a.destroy();
    }

    #[test]
    fn test_failing_subscriber_does_not_block_views() {
        lv_core::telemetry::try_init_tracing();
        let session = session();
        let _faulty = session.bus().on(Topic::SelectionChanged, |_| panic!("render failed"));
        let mut a = plot(&session, "A");
        let mut b = table(&session, "B", None);

        a.select(ids(&["s4"]), false);

        assert_eq!(session.selection().get_selected("sample"), ids(&["s4"]));
        assert_eq!(b.highlight().selected(&"sample".into()), ids(&["s4"]));
        a.destroy();
        b.destroy();
    }

    #[test]
    fn test_view_added_later_starts_from_session_state() {
        let session = session();
        let mut a = plot(&session, "A");
        a.select(ids(&["s5"]), false);

        let mut late = table(&session, "late", None);
        assert_eq!(late.highlight().selected(&"sample".into()), ids(&["s5"]));
        a.destroy();
        late.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_brush_previews_then_commits() {
        let session = session();
        let mut a = plot(&session, "A");
        let mut b = table(&session, "B", None);

        a.pointer_down(Point::new(-0.5, -0.5)).unwrap();
        a.pointer_move(Point::new(1.5, 1.5)).unwrap();
        a.pointer_move(Point::new(2.5, 5.0)).unwrap();
        assert!(b.highlight().preview.is_none(), "preview waits out the window");

        tokio::time::sleep(Duration::from_millis(100)).await;
        let preview = b.highlight().preview.unwrap();
        assert_eq!(preview.source, SourceId::from("A"));
        assert_eq!(preview.ids, ids(&["s1", "s2", "s3"]));
        assert!(session.selection().get_selected("sample").is_empty());

        let committed = a.pointer_up(Point::new(2.5, 5.0), false).unwrap();
        assert_eq!(committed, Some(ids(&["s1", "s2", "s3"])));
        let highlight = b.highlight();
        assert!(highlight.preview.is_none());
        assert_eq!(highlight.selected(&"sample".into()), ids(&["s1", "s2", "s3"]));

        a.destroy();
        b.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroyed_view_releases_its_preview() {
        let session = session();
        let mut a = plot(&session, "A");
        let mut b = table(&session, "B", None);

        a.pointer_down(Point::new(-0.5, -0.5)).unwrap();
        a.pointer_move(Point::new(1.5, 1.5)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(b.highlight().preview.is_some());

        a.destroy();
        assert!(b.highlight().preview.is_none());
        assert!(!session.sync().is_registered(&"A".into()));
        assert_eq!(session.bus().subscriber_count(Topic::BrushPreview), 1);
        b.destroy();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_brush_commits_nothing() {
        let session = session();
        let mut a = plot(&session, "A");
        let mut b = table(&session, "B", None);

        a.pointer_down(Point::new(-0.5, -0.5)).unwrap();
        a.pointer_move(Point::new(1.5, 1.5)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(a.cancel_gesture());

        assert!(b.highlight().preview.is_none());
        assert!(session.selection().get_selected("sample").is_empty());
        assert_eq!(a.pointer_up(Point::new(1.5, 1.5), false).unwrap(), None);
        a.destroy();
        b.destroy();
    }
}
