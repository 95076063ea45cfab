//! Unit tests for grouping upcoming earnings by date

use chrono::{Duration, NaiveDate};
use earnings_radar::models::EarningsRow;
use earnings_radar::reports::group_by_date;
use quickcheck_macros::quickcheck;

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

#[test]
fn groups_sorted_rows_by_earliest_date() {
    // Query order: earliest date, then growth ascending
    let mut rows = vec![
        EarningsRow::new("AAPL", date("2024-06-03"), 5.0, 0.1),
        EarningsRow::new("MSFT", date("2024-06-03"), 2.0, 0.05),
        EarningsRow::new("GOOG", date("2024-06-05"), 1.0, 0.2),
    ];
    rows.sort_by(|a, b| {
        a.earliest_date
            .cmp(&b.earliest_date)
            .then(a.growth.partial_cmp(&b.growth).unwrap())
    });

    let groups = group_by_date(rows);

    let keys: Vec<&str> = groups.keys().collect();
    assert_eq!(keys, vec!["2024-06-03", "2024-06-05"]);

    let first: Vec<&str> = groups
        .get("2024-06-03")
        .unwrap()
        .iter()
        .map(|r| r.symbol.as_str())
        .collect();
    assert_eq!(first, vec!["MSFT", "AAPL"]);

    let second: Vec<&str> = groups
        .get("2024-06-05")
        .unwrap()
        .iter()
        .map(|r| r.symbol.as_str())
        .collect();
    assert_eq!(second, vec!["GOOG"]);
}

#[test]
fn empty_input_yields_empty_groups() {
    let groups = group_by_date(Vec::new());
    assert!(groups.is_empty());
    assert_eq!(groups.row_count(), 0);
}

#[test]
fn ties_keep_source_order() {
    let rows = vec![
        EarningsRow::new("ZZZ", date("2024-06-03"), 1.0, 0.5),
        EarningsRow::new("AAA", date("2024-06-03"), 1.0, 0.5),
        EarningsRow::new("MMM", date("2024-06-03"), 1.0, 0.5),
    ];
    let groups = group_by_date(rows);
    let symbols: Vec<&str> = groups
        .get("2024-06-03")
        .unwrap()
        .iter()
        .map(|r| r.symbol.as_str())
        .collect();
    assert_eq!(symbols, vec!["ZZZ", "AAA", "MMM"]);
}

/// Build rows sorted by (date, growth) from arbitrary offsets and scores.
fn sorted_rows(raw: Vec<(u8, i8)>) -> Vec<EarningsRow> {
    let base = date("2024-06-01");
    let mut rows: Vec<EarningsRow> = raw
        .into_iter()
        .enumerate()
        .map(|(i, (offset, growth))| {
            EarningsRow::new(
                format!("S{}", i),
                base + Duration::days(i64::from(offset % 7)),
                0.0,
                f64::from(growth),
            )
        })
        .collect();
    rows.sort_by(|a, b| {
        a.earliest_date
            .cmp(&b.earliest_date)
            .then(a.growth.partial_cmp(&b.growth).unwrap())
    });
    rows
}

#[quickcheck]
fn grouping_preserves_group_and_row_order(raw: Vec<(u8, i8)>) -> bool {
    let rows = sorted_rows(raw);
    let groups = group_by_date(rows.clone());

    // Flattening the groups gives back the input sequence
    let flattened: Vec<EarningsRow> = groups
        .iter()
        .flat_map(|(_, rows)| rows.iter().cloned())
        .collect();

    let keys: Vec<&str> = groups.keys().collect();
    let mut sorted_keys = keys.clone();
    sorted_keys.sort();

    flattened == rows && keys == sorted_keys
}

#[quickcheck]
fn every_row_matches_its_group_key(raw: Vec<(u8, i8)>) -> bool {
    let groups = group_by_date(sorted_rows(raw));
    let all_match = groups
        .iter()
        .all(|(key, rows)| !rows.is_empty() && rows.iter().all(|r| r.date_key() == key));
    all_match
}
