use crate::analytics::fill_duration::FillDurationSummary;
use crate::state::{BinSnapshot, Reading};
use crate::store::memory::InMemoryStore;
use crate::store::{FillDurationSource, ReadingSource, StoreError};
use std::collections::HashSet;

/// Failure switches for [`MockReadingSource`].
#[derive(Debug, Clone, Default)]
pub struct MockStoreBehavior {
    pub fail_bins_listing: bool,
    pub fail_durations: bool,
    pub failing_bins: HashSet<String>,
}

impl MockStoreBehavior {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn fail_readings_for(bin_ids: &[&str]) -> Self {
        Self {
            failing_bins: bin_ids.iter().map(|id| id.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn fail_bins_listing() -> Self {
        Self {
            fail_bins_listing: true,
            ..Self::default()
        }
    }

    pub fn fail_durations() -> Self {
        Self {
            fail_durations: true,
            ..Self::default()
        }
    }
}

/// Wraps an [`InMemoryStore`] and injects store failures.
#[derive(Debug, Clone)]
pub struct MockReadingSource {
    inner: InMemoryStore,
    behavior: MockStoreBehavior,
}

impl MockReadingSource {
    pub fn new(inner: InMemoryStore, behavior: MockStoreBehavior) -> Self {
        Self { inner, behavior }
    }
}

impl ReadingSource for MockReadingSource {
    fn get_readings(&self, bin_id: &str) -> Result<Vec<Reading>, StoreError> {
        if self.behavior.failing_bins.contains(bin_id) {
            return Err(StoreError::Unavailable(format!(
                "mock readings query failed for {bin_id}"
            )));
        }
        self.inner.get_readings(bin_id)
    }

    fn get_bins(&self) -> Result<Vec<BinSnapshot>, StoreError> {
        if self.behavior.fail_bins_listing {
            return Err(StoreError::Unavailable("mock bins query failed".to_string()));
        }
        self.inner.get_bins()
    }
}

impl FillDurationSource for MockReadingSource {
    fn average_fill_hours(&self) -> Result<FillDurationSummary, StoreError> {
        if self.behavior.fail_durations {
            return Err(StoreError::Unavailable(
                "mock fill duration query failed".to_string(),
            ));
        }
        self.inner.average_fill_hours()
    }
}
