use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// One symbol reporting inside the upcoming window.
///
/// `rank` and `growth` are the minimum non-null values seen for the symbol
/// across duplicate calendar rows; `None` when every score was null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarningsRow {
    pub symbol: String,
    pub earliest_date: NaiveDate,
    pub rank: Option<f64>,
    pub growth: Option<f64>,
}

impl EarningsRow {
    pub fn new(
        symbol: impl Into<String>,
        earliest_date: NaiveDate,
        rank: impl Into<Option<f64>>,
        growth: impl Into<Option<f64>>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            earliest_date,
            rank: rank.into(),
            growth: growth.into(),
        }
    }

    /// Group key for the dashboard, `YYYY-MM-DD`.
    pub fn date_key(&self) -> String {
        self.earliest_date.format("%Y-%m-%d").to_string()
    }
}

/// Inclusive date window for the "most anticipated" query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarningsWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl EarningsWindow {
    pub const LOOKAHEAD_DAYS: i64 = 7;

    /// `[today + 1, today + 7]`
    pub fn upcoming(today: NaiveDate) -> Self {
        Self {
            start: today + Duration::days(1),
            end: today + Duration::days(Self::LOOKAHEAD_DAYS),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Earnings rows grouped by their date key, in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateGroups {
    groups: Vec<(String, Vec<EarningsRow>)>,
}

impl DateGroups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row to the group for its date key, opening a new group at
    /// the end when the key has not been seen yet.
    pub fn push(&mut self, row: EarningsRow) {
        let key = row.date_key();
        match self.groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, rows)) => rows.push(row),
            None => self.groups.push((key, vec![row])),
        }
    }

    pub fn get(&self, key: &str) -> Option<&[EarningsRow]> {
        self.groups
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, rows)| rows.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[EarningsRow])> {
        self.groups.iter().map(|(k, rows)| (k.as_str(), rows.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|(_, rows)| rows.len()).sum()
    }
}
