//! PostgreSQL-backed earnings queries

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, warn};

use super::{EarningsStore, EstimateSource, StoreError};
use crate::models::{EarningsRow, EarningsWindow, EstimateRow};

const MOST_ANTICIPATED_SQL: &str = r#"
SELECT
    ec.act_symbol,
    MIN(ec.date) AS earliest_earnings_date,
    CAST(MIN(rs."rank") AS DOUBLE PRECISION) AS "rank",
    CAST(MIN(rs.growth) AS DOUBLE PRECISION) AS growth
FROM earnings_calendar ec
JOIN rank_score rs ON ec.act_symbol = rs.act_symbol
WHERE ec.date BETWEEN $1 AND $2
GROUP BY ec.act_symbol
ORDER BY earliest_earnings_date ASC, MIN(rs.growth) ASC NULLS FIRST
LIMIT $3
"#;

const CONSENSUS_ESTIMATES_SQL: &str = r#"
SELECT
    CAST(period_end_date AS TEXT),
    CAST(consensus AS TEXT),
    CAST(recent AS TEXT),
    CAST(high AS TEXT),
    CAST(low AS TEXT),
    CAST(year_ago AS TEXT)
FROM eps_estimate
WHERE act_symbol = $1
ORDER BY period_end_date
"#;

const HISTORY_ESTIMATES_SQL: &str = r#"
SELECT
    CAST(period_end_date AS TEXT),
    CAST(estimate AS TEXT),
    CAST(reported AS TEXT)
FROM eps_history
WHERE act_symbol = $1
ORDER BY period_end_date
"#;

pub struct PostgresEarningsStore {
    client: Client,
    timeout: Duration,
}

impl PostgresEarningsStore {
    /// Connect once, without retries.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "Earnings database connection error");
            }
        });

        Ok(Self { client, timeout })
    }

    /// Connect with exponential backoff, giving up after `max_attempts`.
    pub async fn connect_with_retry(
        url: &str,
        timeout: Duration,
        max_attempts: usize,
    ) -> Result<Self, StoreError> {
        (|| Self::connect(url, timeout))
            .retry(ExponentialBuilder::default().with_max_times(max_attempts))
            .sleep(tokio::time::sleep)
            .notify(|err: &StoreError, dur: Duration| {
                warn!(error = %err, retry_in_ms = dur.as_millis() as u64, "Retrying database connection");
            })
            .await
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, tokio_postgres::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

fn earnings_row(row: &Row) -> Result<EarningsRow, tokio_postgres::Error> {
    Ok(EarningsRow {
        symbol: row.try_get(0)?,
        earliest_date: row.try_get(1)?,
        rank: row.try_get(2)?,
        growth: row.try_get(3)?,
    })
}

fn estimate_row(row: &Row, source: EstimateSource) -> Result<EstimateRow, tokio_postgres::Error> {
    let mut estimate = EstimateRow {
        period_end_date: row.try_get(0)?,
        estimated_eps: row.try_get(1)?,
        reported_eps: row.try_get(2)?,
        ..Default::default()
    };
    if source == EstimateSource::Consensus {
        estimate.high = row.try_get(3)?;
        estimate.low = row.try_get(4)?;
        estimate.year_ago = row.try_get(5)?;
    }
    Ok(estimate)
}

#[async_trait]
impl EarningsStore for PostgresEarningsStore {
    async fn most_anticipated(
        &self,
        window: EarningsWindow,
        limit: usize,
    ) -> Result<Vec<EarningsRow>, StoreError> {
        let limit = limit as i64;
        let rows = self
            .bounded(
                self.client
                    .query(MOST_ANTICIPATED_SQL, &[&window.start, &window.end, &limit]),
            )
            .await?;

        rows.iter()
            .map(|row| earnings_row(row).map_err(StoreError::from))
            .collect()
    }

    async fn ticker_estimates(
        &self,
        ticker: &str,
        source: EstimateSource,
    ) -> Result<Vec<EstimateRow>, StoreError> {
        let sql = match source {
            EstimateSource::Consensus => CONSENSUS_ESTIMATES_SQL,
            EstimateSource::History => HISTORY_ESTIMATES_SQL,
        };
        let rows = self.bounded(self.client.query(sql, &[&ticker])).await?;

        rows.iter()
            .map(|row| estimate_row(row, source).map_err(StoreError::from))
            .collect()
    }
}
