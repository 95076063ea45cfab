//! Grouping of "most anticipated" rows by earnings date

use crate::models::{DateGroups, EarningsRow};

/// Group rows by their earliest earnings date.
///
/// Rows are expected in query order (`earliest_date`, then `growth`). Group
/// order follows the first appearance of each date and rows keep their
/// relative order inside a group, so ties stay in source order.
pub fn group_by_date<I>(rows: I) -> DateGroups
where
    I: IntoIterator<Item = EarningsRow>,
{
    let mut groups = DateGroups::new();
    for row in rows {
        groups.push(row);
    }
    groups
}
