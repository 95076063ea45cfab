//! Shared data models spanning the query, report and presentation layers.

pub mod earnings;
pub mod estimate;

pub use earnings::{DateGroups, EarningsRow, EarningsWindow};
pub use estimate::{EstimatePoint, EstimateRow};
