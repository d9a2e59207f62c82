//! Per-bin storage of fitted trend models.
//!
//! The forecasting code only consumes a valid-or-absent model and writes back
//! freshly fitted ones. Invalidation policy belongs to whoever owns the cache.

use crate::estimation::trend::TrendModel;
use thiserror::Error;

pub mod file;
pub mod memory;

pub use file::FileModelCache;
pub use memory::MemoryModelCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("model cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode trend model: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("bin id {0:?} cannot be used as a cache key")]
    InvalidKey(String),
    #[error("model cache lock poisoned")]
    Lock,
}

pub trait ModelCache: Send + Sync {
    /// Cached model for `bin_id`. Unreadable entries are reported as absent.
    fn load(&self, bin_id: &str) -> Option<TrendModel>;

    /// Stores `model`, replacing any earlier entry (last writer wins).
    fn save(&self, bin_id: &str, model: &TrendModel) -> Result<(), CacheError>;

    /// Drops the entry for `bin_id` so the next forecast refits.
    fn invalidate(&self, bin_id: &str) -> Result<(), CacheError>;
}
