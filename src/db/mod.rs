//! Read access to the earnings database.

pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EarningsRow, EarningsWindow, EstimateRow};

pub use postgres::PostgresEarningsStore;

/// Maximum number of rows on the "most anticipated" dashboard.
pub const MOST_ANTICIPATED_LIMIT: usize = 40;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to earnings database: {0}")]
    Connection(String),
    #[error("earnings query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
    #[error("earnings query timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Which estimate columns back the EPS comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimateSource {
    /// `eps_estimate`: consensus vs recent, plus high, low and year-ago.
    Consensus,
    /// `eps_history`: estimate vs reported.
    History,
}

#[async_trait]
pub trait EarningsStore: Send + Sync {
    /// One row per symbol reporting inside `window`, ordered by earliest
    /// date then growth (missing growth first), capped at `limit`. Null
    /// scores never hide a symbol.
    async fn most_anticipated(
        &self,
        window: EarningsWindow,
        limit: usize,
    ) -> Result<Vec<EarningsRow>, StoreError>;

    /// Estimate history for one symbol, ordered by period end date.
    async fn ticker_estimates(
        &self,
        ticker: &str,
        source: EstimateSource,
    ) -> Result<Vec<EstimateRow>, StoreError>;
}
