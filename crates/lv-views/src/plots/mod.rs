//! Plot views

mod heatmap;
mod scatter;

pub use heatmap::{HeatmapConfig, HeatmapView};
pub use scatter::{ScatterPlotConfig, ScatterPlotView};
