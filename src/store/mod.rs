use crate::analytics::fill_duration::FillDurationSummary;
use crate::state::{BinSnapshot, Reading};
use thiserror::Error;

pub mod memory;
pub mod mock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read fleet snapshot: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse fleet snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid timestamp {value:?}: {reason}")]
    Timestamp { value: String, reason: String },
    #[error("invalid reading for bin {bin_id}: {reason}")]
    InvalidReading { bin_id: String, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Time-series store of bins and their fill readings.
pub trait ReadingSource: Send + Sync {
    /// All readings for `bin_id`, ascending by timestamp. Unknown bins yield an empty list.
    fn get_readings(&self, bin_id: &str) -> Result<Vec<Reading>, StoreError>;

    /// The current fleet.
    fn get_bins(&self) -> Result<Vec<BinSnapshot>, StoreError>;
}

/// Historical average empty-to-full duration per bin.
pub trait FillDurationSource: Send + Sync {
    /// Bins without a measured fill cycle are absent from `per_bin_hours`.
    fn average_fill_hours(&self) -> Result<FillDurationSummary, StoreError>;
}
