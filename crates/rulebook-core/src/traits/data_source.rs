//! Data source trait definitions.

use crate::error::DataError;
use crate::types::{Bar, Timeframe};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of historical bars.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetch historical bars.
    ///
    /// # Arguments
    /// * `symbol` - The symbol to fetch
    /// * `timeframe` - The bar timeframe
    /// * `start` - Start of the date range (inclusive)
    /// * `end` - End of the date range (inclusive)
    ///
    /// # Returns
    /// A vector of bars ordered from oldest to newest
    async fn get_historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, DataError>;

    /// Fetch the most recent bar in the source.
    async fn get_latest_bar(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<Bar>, DataError> {
        let bars = self
            .get_historical_bars(symbol, timeframe, DateTime::UNIX_EPOCH, Utc::now())
            .await?;
        Ok(bars.last().copied())
    }

    /// Get the data source name.
    fn name(&self) -> &str;
}
