//! Data shaping between the query layer and the presentation layer.

pub mod grouping;
pub mod series;

pub use grouping::group_by_date;
pub use series::{build_series, coerce_number, parse_period_end};
