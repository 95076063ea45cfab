//! On-disk chart artifacts

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use image::{ImageFormat, RgbImage};

use super::{ChartError, ChartStyle};

pub const GRAPHS_DIR: &str = "graphs";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes chart images to `<static_root>/graphs/<ticker>_<suffix>.png`.
///
/// Each write goes to a temporary sibling first and is renamed over the
/// target, so concurrent requests for the same ticker never expose a
/// partial file and the last writer wins.
#[derive(Debug, Clone)]
pub struct ChartStore {
    static_root: PathBuf,
}

impl ChartStore {
    pub fn new(static_root: impl Into<PathBuf>) -> Self {
        Self {
            static_root: static_root.into(),
        }
    }

    pub fn static_root(&self) -> &Path {
        &self.static_root
    }

    pub fn file_name(ticker: &str, style: ChartStyle) -> String {
        format!("{}_{}.png", ticker, style.file_suffix())
    }

    /// Path relative to the static root, as embedded in the detail page.
    pub fn relative_path(ticker: &str, style: ChartStyle) -> String {
        format!("{}/{}", GRAPHS_DIR, Self::file_name(ticker, style))
    }

    pub fn absolute_path(&self, ticker: &str, style: ChartStyle) -> PathBuf {
        self.static_root
            .join(GRAPHS_DIR)
            .join(Self::file_name(ticker, style))
    }

    /// Persist `image` for `ticker`, replacing any previous chart, and
    /// return the relative path.
    pub fn write(&self, ticker: &str, style: ChartStyle, image: &RgbImage) -> Result<String, ChartError> {
        let dir = self.static_root.join(GRAPHS_DIR);
        fs::create_dir_all(&dir)?;

        let target = self.absolute_path(ticker, style);
        let temp = dir.join(format!(
            ".{}.{}.{}.tmp",
            Self::file_name(ticker, style),
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let written = image
            .save_with_format(&temp, ImageFormat::Png)
            .map_err(ChartError::from)
            .and_then(|_| fs::rename(&temp, &target).map_err(ChartError::from));

        if written.is_err() {
            let _ = fs::remove_file(&temp);
        }
        written?;

        Ok(Self::relative_path(ticker, style))
    }
}
