//! Earnings calendar reporting service.
//!
//! Serves a "most anticipated" dashboard of companies reporting in the next
//! week and per-ticker EPS estimate pages with a rendered chart and an
//! optional narrative summary.

pub mod cache;
pub mod charts;
pub mod config;
pub mod core;
pub mod db;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod reports;
pub mod services;
pub mod views;
