//! EPS estimate series building

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::models::{EstimatePoint, EstimateRow};

/// Coerce a text cell to a finite float.
///
/// Empty, unparseable and non-finite values (`nan`, `inf`) are all treated
/// as missing.
pub fn coerce_number(raw: Option<&str>) -> Option<f64> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a period end date given as `YYYY-MM-DD` or a timestamp.
pub fn parse_period_end(raw: Option<&str>) -> Option<NaiveDate> {
    let trimmed = raw?.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|ts| ts.date())
}

fn to_point(row: &EstimateRow) -> Option<EstimatePoint> {
    let period_end_date = parse_period_end(row.period_end_date.as_deref())?;
    let estimated_eps = coerce_number(row.estimated_eps.as_deref())?;
    let reported_eps = coerce_number(row.reported_eps.as_deref())?;

    Some(EstimatePoint {
        period_end_date,
        estimated_eps,
        reported_eps,
        high: coerce_number(row.high.as_deref()),
        low: coerce_number(row.low.as_deref()),
        year_ago: coerce_number(row.year_ago.as_deref()),
    })
}

/// Turn raw estimate rows into a date-ordered series.
///
/// A row is dropped when its period end date or either required EPS value
/// cannot be coerced; the remaining points are sorted by period end date
/// with a stable sort, so the query order decides between equal dates.
pub fn build_series(rows: &[EstimateRow]) -> Vec<EstimatePoint> {
    let mut points: Vec<EstimatePoint> = rows
        .iter()
        .filter_map(|row| {
            let point = to_point(row);
            if point.is_none() {
                debug!(period_end_date = ?row.period_end_date, "Dropping estimate row with unusable values");
            }
            point
        })
        .collect();

    points.sort_by_key(|p| p.period_end_date);
    points
}
