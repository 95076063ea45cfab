//! Chart rasterization with plotters

use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use image::RgbImage;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle, FontTransform};
use tracing::{info, warn};

use super::{ChartError, ChartStyle};
use crate::models::EstimatePoint;

pub const CHART_WIDTH: u32 = 1000;
pub const CHART_HEIGHT: u32 = 600;

/// Width of one bar pair in the grouped-bar style. Each bar is offset by
/// half of it from the period end date.
pub const BAR_PAIR_WIDTH_DAYS: i64 = 90;

const FONT_FAMILY: &str = "sans-serif";

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Turns an estimate series into an RGB image.
pub trait ChartRenderer: Send + Sync {
    fn render(
        &self,
        ticker: &str,
        points: &[EstimatePoint],
        style: ChartStyle,
    ) -> Result<RgbImage, ChartError>;
}

pub struct PlottersRenderer {
    width: u32,
    height: u32,
}

impl PlottersRenderer {
    /// Create a renderer and register the label font.
    ///
    /// `font_path` wins over the well-known system locations. Without any
    /// font the renderer still builds, but drawing fails with
    /// [`ChartError::Draw`].
    pub fn new(font_path: Option<&Path>) -> Self {
        let readable = font_path
            .map(Path::to_path_buf)
            .into_iter()
            .chain(FONT_CANDIDATES.iter().map(PathBuf::from))
            .find_map(|path| std::fs::read(&path).ok().map(|bytes| (path, bytes)));

        // Only the first readable file is registered; registered bytes live
        // for the rest of the process.
        match readable {
            Some((path, bytes)) => match register_leaked_font(bytes) {
                Ok(()) => info!(font = %path.display(), "Chart font registered"),
                Err(e) => warn!(font = %path.display(), error = %e, "Chart font rejected"),
            },
            None => warn!("No chart font found; set CHART_FONT_PATH to enable chart rendering"),
        }

        Self {
            width: CHART_WIDTH,
            height: CHART_HEIGHT,
        }
    }
}

fn register_leaked_font(bytes: Vec<u8>) -> Result<(), ChartError> {
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font(FONT_FAMILY, FontStyle::Normal, bytes)
        .map_err(|_| ChartError::Font("invalid font data".to_string()))
}

impl ChartRenderer for PlottersRenderer {
    fn render(
        &self,
        ticker: &str,
        points: &[EstimatePoint],
        style: ChartStyle,
    ) -> Result<RgbImage, ChartError> {
        if points.is_empty() {
            return Err(ChartError::Empty);
        }

        let (date_pad, include_zero) = match style {
            ChartStyle::Line => (Duration::days(30), false),
            ChartStyle::Bar => (Duration::days(BAR_PAIR_WIDTH_DAYS), true),
        };
        let dates = date_bounds(points, date_pad)
            .ok_or_else(|| ChartError::Draw("period end dates outside the drawable range".to_string()))?;
        let values = value_bounds(points, include_zero)
            .ok_or_else(|| ChartError::Draw("EPS values outside the drawable range".to_string()))?;

        let mut buffer = vec![0u8; (self.width * self.height * 3) as usize];
        let size = (self.width, self.height);
        let drawn = match style {
            ChartStyle::Line => draw_lines(&mut buffer, size, ticker, points, dates, values),
            ChartStyle::Bar => draw_bars(&mut buffer, size, ticker, points, dates, values),
        };
        drawn.map_err(|e| ChartError::Draw(e.to_string()))?;

        RgbImage::from_raw(self.width, self.height, buffer)
            .ok_or_else(|| ChartError::Draw("bitmap buffer size mismatch".to_string()))
    }
}

/// Date range covering every point, padded on both sides. `None` when
/// padding would leave the calendar.
fn date_bounds(points: &[EstimatePoint], pad: Duration) -> Option<Range<NaiveDate>> {
    let first = points.iter().map(|p| p.period_end_date).min()?;
    let last = points.iter().map(|p| p.period_end_date).max()?;
    Some(first.checked_sub_signed(pad)?..last.checked_add_signed(pad)?)
}

/// Value range covering both series, padded by 10%. `None` when the padded
/// range or its width does not fit in an `f64`.
fn value_bounds(points: &[EstimatePoint], include_zero: bool) -> Option<Range<f64>> {
    let values = points.iter().flat_map(|p| [p.estimated_eps, p.reported_eps]);
    let (mut lo, mut hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if include_zero {
        lo = lo.min(0.0);
        hi = hi.max(0.0);
    }
    let span = hi - lo;
    if !span.is_finite() {
        return None;
    }
    let pad = if span > 0.0 { span * 0.1 } else { 1.0 };
    let (start, end) = (lo - pad, hi + pad);
    (end - start).is_finite().then_some(start..end)
}

fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn draw_lines(
    buffer: &mut [u8],
    size: (u32, u32),
    ticker: &str,
    points: &[EstimatePoint],
    dates: Range<NaiveDate>,
    values: Range<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (estimated_label, reported_label) = ChartStyle::Line.series_labels();
    let root = BitMapBackend::with_buffer(buffer, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(format!("EPS Estimates for {}", ticker), (FONT_FAMILY, 24))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(dates, values)?;

    chart
        .configure_mesh()
        .x_desc("Period End Date")
        .y_desc("EPS")
        .x_labels(8)
        .x_label_formatter(&format_date)
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            points.iter().map(|p| (p.period_end_date, p.estimated_eps)),
            &BLUE,
        ))?
        .label(estimated_label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));
    chart.draw_series(
        points
            .iter()
            .map(|p| Circle::new((p.period_end_date, p.estimated_eps), 4, BLUE.filled())),
    )?;

    chart
        .draw_series(LineSeries::new(
            points.iter().map(|p| (p.period_end_date, p.reported_eps)),
            &RED,
        ))?
        .label(reported_label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));
    chart.draw_series(
        points
            .iter()
            .map(|p| Cross::new((p.period_end_date, p.reported_eps), 5, RED)),
    )?;

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_bars(
    buffer: &mut [u8],
    size: (u32, u32),
    ticker: &str,
    points: &[EstimatePoint],
    dates: Range<NaiveDate>,
    values: Range<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (estimated_label, reported_label) = ChartStyle::Bar.series_labels();
    let half = Duration::days(BAR_PAIR_WIDTH_DAYS / 2);
    let estimated_color = RGBColor(31, 119, 180);
    let reported_color = RGBColor(255, 127, 14);

    let root = BitMapBackend::with_buffer(buffer, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Estimated vs Reported EPS for {}", ticker),
            (FONT_FAMILY, 24),
        )
        .margin(20)
        .x_label_area_size(90)
        .y_label_area_size(60)
        .build_cartesian_2d(dates, values)?;

    chart
        .configure_mesh()
        .x_desc("Period End Date")
        .y_desc("EPS")
        .x_labels(8)
        .x_label_style((FONT_FAMILY, 12).into_font().transform(FontTransform::Rotate90))
        .x_label_formatter(&format_date)
        .draw()?;

    chart
        .draw_series(points.iter().map(|p| {
            let x = p.period_end_date;
            Rectangle::new([(x - half, 0.0), (x, p.estimated_eps)], estimated_color.filled())
        }))?
        .label(estimated_label)
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], estimated_color.filled()));

    chart
        .draw_series(points.iter().map(|p| {
            let x = p.period_end_date;
            Rectangle::new([(x, 0.0), (x + half, p.reported_eps)], reported_color.filled())
        }))?
        .label(reported_label)
        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], reported_color.filled()));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
