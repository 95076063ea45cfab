use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Raw estimate row as returned by the database, every column as text.
///
/// Columns are selected as text so that numeric coercion happens in one
/// place (`reports::series`) and a bad value drops the row instead of
/// failing the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimateRow {
    pub period_end_date: Option<String>,
    pub estimated_eps: Option<String>,
    pub reported_eps: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub year_ago: Option<String>,
}

impl EstimateRow {
    /// Row carrying only the required pair.
    pub fn pair(period_end_date: &str, estimated_eps: &str, reported_eps: &str) -> Self {
        Self {
            period_end_date: Some(period_end_date.to_string()),
            estimated_eps: Some(estimated_eps.to_string()),
            reported_eps: Some(reported_eps.to_string()),
            ..Default::default()
        }
    }
}

/// A usable point of the EPS comparison series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatePoint {
    pub period_end_date: NaiveDate,
    pub estimated_eps: f64,
    pub reported_eps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_ago: Option<f64>,
}

impl EstimatePoint {
    pub fn new(period_end_date: NaiveDate, estimated_eps: f64, reported_eps: f64) -> Self {
        Self {
            period_end_date,
            estimated_eps,
            reported_eps,
            high: None,
            low: None,
            year_ago: None,
        }
    }
}
