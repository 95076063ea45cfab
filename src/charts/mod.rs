//! EPS comparison charts
//!
//! Rendering happens on the blocking pool: the renderer rasterizes the
//! series in memory and [`ChartStore`] persists the PNG under
//! `<static_root>/graphs/`.

pub mod render;
pub mod store;

use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::db::EstimateSource;
use crate::models::EstimatePoint;

pub use render::{ChartRenderer, PlottersRenderer};
pub use store::ChartStore;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("no points to chart")]
    Empty,
    #[error("failed to load chart font: {0}")]
    Font(String),
    #[error("failed to draw chart: {0}")]
    Draw(String),
    #[error("failed to write chart: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode chart: {0}")]
    Encode(#[from] image::ImageError),
    #[error("chart task failed: {0}")]
    Task(String),
}

/// Visual style of the EPS comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartStyle {
    /// Consensus vs recent EPS as two marked lines.
    Line,
    /// Estimated vs reported EPS as grouped bars per period.
    Bar,
}

impl ChartStyle {
    /// File name suffix, `{ticker}_{suffix}.png`.
    pub fn file_suffix(&self) -> &'static str {
        match self {
            ChartStyle::Line => "eps_comparison",
            ChartStyle::Bar => "details",
        }
    }

    pub fn estimate_source(&self) -> EstimateSource {
        match self {
            ChartStyle::Line => EstimateSource::Consensus,
            ChartStyle::Bar => EstimateSource::History,
        }
    }

    /// Legend labels for the estimated and reported series.
    pub fn series_labels(&self) -> (&'static str, &'static str) {
        match self {
            ChartStyle::Line => ("Consensus EPS", "Recent EPS"),
            ChartStyle::Bar => ("Estimated EPS", "Reported EPS"),
        }
    }
}

impl FromStr for ChartStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" => Ok(ChartStyle::Line),
            "bar" | "bars" => Ok(ChartStyle::Bar),
            other => Err(format!("unknown chart style '{}'", other)),
        }
    }
}

/// Renders and persists charts for the detail page.
#[derive(Clone)]
pub struct ChartService {
    style: ChartStyle,
    renderer: Arc<dyn ChartRenderer>,
    store: ChartStore,
}

impl ChartService {
    pub fn new(style: ChartStyle, renderer: Arc<dyn ChartRenderer>, store: ChartStore) -> Self {
        Self {
            style,
            renderer,
            store,
        }
    }

    pub fn style(&self) -> ChartStyle {
        self.style
    }

    pub fn store(&self) -> &ChartStore {
        &self.store
    }

    /// Render `points` for `ticker` and return the image path relative to
    /// the static root.
    pub async fn render(&self, ticker: &str, points: Vec<EstimatePoint>) -> Result<String, ChartError> {
        if points.is_empty() {
            return Err(ChartError::Empty);
        }

        let style = self.style;
        let renderer = self.renderer.clone();
        let store = self.store.clone();
        let ticker = ticker.to_string();

        tokio::task::spawn_blocking(move || {
            let image = renderer.render(&ticker, &points, style)?;
            let path = store.write(&ticker, style, &image)?;
            debug!(ticker = %ticker, path = %path, "Chart written");
            Ok(path)
        })
        .await
        .map_err(|e| ChartError::Task(e.to_string()))?
    }
}
