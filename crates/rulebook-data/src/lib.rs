//! Historical data sources.

mod csv_source;

pub use csv_source::{parse_timestamp, CsvDataSource};

use std::path::Path;

use rulebook_core::error::DataError;
use rulebook_core::types::Bar;

/// Load every bar for `symbol` from a CSV file or a directory of
/// `<SYMBOL>.csv` files.
pub async fn load_csv(path: impl AsRef<Path>, symbol: &str) -> Result<Vec<Bar>, DataError> {
    let source = CsvDataSource::new(path)?;
    source.load_all(symbol).await
}
