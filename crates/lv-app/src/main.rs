//! Headless entry point: runs a scripted session across linked views and
//! logs what each view ends up highlighting

use anyhow::{Context, Result};
use tracing::info;

use lv_core::{telemetry, Point, Session, SessionConfig};
use lv_views::{
    FilterPanel, FilterPanelConfig, ScatterPlotConfig, ScatterPlotView, SortDirection,
    TableConfig, TableView, ViewAdapter,
};

mod demo;

fn main() -> Result<()> {
    telemetry::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => SessionConfig::load(&path)?,
        None => SessionConfig::default(),
    };

    let runtime = tokio::runtime::Runtime::new().context("starting tokio runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: SessionConfig) -> Result<()> {
    let window = config.brush_preview_window();
    let session = Session::new(config)?;
    let batch = demo::sample_batch(24).context("building sample data")?;

    let mut plot = ScatterPlotView::new(
        &session,
        ScatterPlotConfig {
            view_id: Some("plot".into()),
            id_column: "sample".to_string(),
            x_column: "pc1".to_string(),
            y_column: "pc2".to_string(),
            hit_radius: 1.0,
            ..ScatterPlotConfig::default()
        },
    )?;
    let mut table = TableView::new(
        &session,
        TableConfig {
            view_id: Some("table".into()),
            id_column: "sample".to_string(),
            ..TableConfig::default()
        },
    )?;
    let mut panel = FilterPanel::new(
        &session,
        FilterPanelConfig {
            view_id: Some("filters".into()),
            id_column: "sample".to_string(),
            fields: vec!["tissue".to_string(), "depth".to_string()],
            ..FilterPanelConfig::default()
        },
    )?;

    plot.set_data(&batch)?;
    table.set_data(&batch)?;
    panel.set_data(&batch)?;

    // Hover the first point
    if let Some((_, point)) = plot.points().first().cloned() {
        plot.pointer_move(point)?;
        report("hover", &[&plot, &table]);
        plot.pointer_leave()?;
    }

    // Brush the lower-left quadrant
    plot.pointer_down(Point::new(-20.0, -20.0))?;
    plot.pointer_move(Point::new(0.0, -5.0))?;
    plot.pointer_move(Point::new(0.0, 0.0))?;
    tokio::time::sleep(window * 2).await;
    report("brush preview", &[&plot, &table]);
    let committed = plot.pointer_up(Point::new(0.0, 0.0), false)?;
    info!(count = committed.map(|ids| ids.len()).unwrap_or(0), "brush committed");
    report("brush commit", &[&plot, &table]);

    // Extend the selection from the table
    table.sort_by("depth", SortDirection::Descending)?;
    if let Some(deepest) = table.rows().first().cloned() {
        table.click_row(&deepest, true);
    }
    report("table click", &[&plot, &table]);

    // Narrow every view to one tissue
    panel.set_categories("tissue", vec!["liver".to_string()]);
    info!(matching = panel.matching_count(), "draft filter");
    panel.apply()?;
    report("filter", &[&plot, &table, &panel]);

    session.reset("app")?;
    report("reset", &[&plot, &table, &panel]);

    plot.destroy();
    table.destroy();
    panel.destroy();
    let flushed = session.shutdown();
    info!(flushed, "done");
    Ok(())
}

fn report(step: &str, views: &[&dyn ViewAdapter]) {
    for view in views {
        let highlight = view.highlight();
        info!(
            step,
            view = %view.id(),
            kind = %view.kind(),
            visible = view.visible_ids().len(),
            selected = highlight.selected.values().map(|ids| ids.len()).sum::<usize>(),
            previewed = highlight.preview.as_ref().map(|p| p.ids.len()).unwrap_or(0),
            hovered = highlight.hovered.is_some(),
            renders = view.render_count(),
            "view state"
        );
    }
}
