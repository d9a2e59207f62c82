use crate::analytics::fill_duration::{FillDurationSummary, average_fill_hours};
use crate::state::{BinSnapshot, Reading};
use crate::store::{FillDurationSource, ReadingSource, StoreError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;

/// Fleet snapshot held in memory, optionally loaded from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    bins: Vec<BinSnapshot>,
    readings: BTreeMap<String, Vec<Reading>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a bin, replacing any earlier entry with the same identifier.
    pub fn add_bin(&mut self, bin: BinSnapshot) {
        match self.bins.iter_mut().find(|b| b.bin_id == bin.bin_id) {
            Some(existing) => *existing = bin,
            None => self.bins.push(bin),
        }
    }

    pub fn with_bin(mut self, bin: BinSnapshot) -> Self {
        self.add_bin(bin);
        self
    }

    /// Records a reading, keeping the bin's series ordered by timestamp.
    pub fn push_reading(&mut self, reading: Reading) -> Result<(), StoreError> {
        if reading.fill_pct > 100 {
            return Err(StoreError::InvalidReading {
                bin_id: reading.bin_id,
                reason: format!("fill_pct {} exceeds 100", reading.fill_pct),
            });
        }
        let series = self.readings.entry(reading.bin_id.clone()).or_default();
        let index = series.partition_point(|r| r.timestamp <= reading.timestamp);
        series.insert(index, reading);
        Ok(())
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, StoreError> {
        let snapshot: FleetFile = serde_json::from_str(contents)?;
        let mut store = Self::new();
        for bin in snapshot.bins {
            store.add_bin(BinSnapshot {
                bin_id: bin.bin_id,
                latitude: bin.latitude,
                longitude: bin.longitude,
                current_fill_pct: bin.current_fill_pct,
            });
        }
        for reading in snapshot.readings {
            let timestamp = parse_timestamp(&reading.ts)?;
            store.push_reading(Reading {
                bin_id: reading.bin_id,
                timestamp,
                fill_pct: reading.fill_pct,
            })?;
        }
        debug!(
            bins = store.bins.len(),
            series = store.readings.len(),
            "Fleet snapshot loaded"
        );
        Ok(store)
    }

    fn latest_fill(&self, bin_id: &str) -> Option<u8> {
        self.readings
            .get(bin_id)
            .and_then(|series| series.last())
            .map(|r| r.fill_pct)
    }
}

impl ReadingSource for InMemoryStore {
    fn get_readings(&self, bin_id: &str) -> Result<Vec<Reading>, StoreError> {
        Ok(self.readings.get(bin_id).cloned().unwrap_or_default())
    }

    fn get_bins(&self) -> Result<Vec<BinSnapshot>, StoreError> {
        Ok(self
            .bins
            .iter()
            .map(|bin| BinSnapshot {
                current_fill_pct: bin
                    .current_fill_pct
                    .or_else(|| self.latest_fill(&bin.bin_id)),
                ..bin.clone()
            })
            .collect())
    }
}

impl FillDurationSource for InMemoryStore {
    fn average_fill_hours(&self) -> Result<FillDurationSummary, StoreError> {
        Ok(average_fill_hours(
            self.readings
                .iter()
                .map(|(bin_id, series)| (bin_id.as_str(), series.as_slice())),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct FleetFile {
    #[serde(default)]
    bins: Vec<BinEntry>,
    #[serde(default)]
    readings: Vec<ReadingEntry>,
}

#[derive(Debug, Deserialize)]
struct BinEntry {
    bin_id: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    current_fill_pct: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct ReadingEntry {
    bin_id: String,
    ts: String,
    fill_pct: u8,
}

fn parse_timestamp(value: &str) -> Result<SystemTime, StoreError> {
    OffsetDateTime::parse(value, &Rfc3339)
        .map(SystemTime::from)
        .map_err(|err| StoreError::Timestamp {
            value: value.to_string(),
            reason: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn reading(bin_id: &str, secs: u64, fill_pct: u8) -> Reading {
        Reading {
            bin_id: bin_id.to_string(),
            timestamp: UNIX_EPOCH + Duration::from_secs(secs),
            fill_pct,
        }
    }

    fn bin(bin_id: &str, current_fill_pct: Option<u8>) -> BinSnapshot {
        BinSnapshot {
            bin_id: bin_id.to_string(),
            latitude: Some(12.97),
            longitude: Some(77.59),
            current_fill_pct,
        }
    }

    #[test]
    fn readings_are_kept_in_timestamp_order() -> Result<(), StoreError> {
        let mut store = InMemoryStore::new();
        store.push_reading(reading("B1", 300, 30))?;
        store.push_reading(reading("B1", 100, 10))?;
        store.push_reading(reading("B1", 200, 20))?;

        let fills: Vec<u8> = store.get_readings("B1")?.iter().map(|r| r.fill_pct).collect();

        assert_eq!(fills, vec![10, 20, 30]);
        Ok(())
    }

    #[test]
    fn unknown_bin_has_no_readings() -> Result<(), StoreError> {
        let store = InMemoryStore::new();

        assert!(store.get_readings("missing")?.is_empty());
        Ok(())
    }

    #[test]
    fn fill_over_hundred_is_rejected() {
        let mut store = InMemoryStore::new();

        let result = store.push_reading(reading("B1", 0, 101));

        assert!(matches!(result, Err(StoreError::InvalidReading { .. })));
    }

    #[test]
    fn current_fill_falls_back_to_latest_reading() -> Result<(), StoreError> {
        let mut store = InMemoryStore::new()
            .with_bin(bin("B1", None))
            .with_bin(bin("B2", Some(70)))
            .with_bin(bin("B3", None));
        store.push_reading(reading("B1", 0, 10))?;
        store.push_reading(reading("B1", 60, 25))?;
        store.push_reading(reading("B2", 0, 10))?;

        let bins = store.get_bins()?;

        assert_eq!(bins[0].current_fill_pct, Some(25));
        assert_eq!(bins[1].current_fill_pct, Some(70));
        assert_eq!(bins[2].current_fill_pct, None);
        Ok(())
    }

    #[test]
    fn loads_snapshot_from_json() -> Result<(), StoreError> {
        let contents = r#"{
            "bins": [{"bin_id": "B1", "latitude": 1.5, "longitude": 2.5}],
            "readings": [
                {"bin_id": "B1", "ts": "2026-01-11T10:00:00Z", "fill_pct": 40},
                {"bin_id": "B1", "ts": "2026-01-11T08:00:00Z", "fill_pct": 20}
            ]
        }"#;

        let store = InMemoryStore::from_json_str(contents)?;
        let readings = store.get_readings("B1")?;

        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].fill_pct, 20);
        assert_eq!(
            readings[1].timestamp.duration_since(readings[0].timestamp).ok(),
            Some(Duration::from_secs(7200))
        );
        assert_eq!(store.get_bins()?[0].current_fill_pct, Some(40));
        Ok(())
    }

    #[test]
    fn bad_timestamp_is_reported() {
        let contents = r#"{"readings": [{"bin_id": "B1", "ts": "yesterday", "fill_pct": 1}]}"#;

        let result = InMemoryStore::from_json_str(contents);

        assert!(matches!(result, Err(StoreError::Timestamp { .. })));
    }

    #[test]
    fn serves_average_fill_hours() -> Result<(), StoreError> {
        let mut store = InMemoryStore::new();
        store.push_reading(reading("B1", 0, 0))?;
        store.push_reading(reading("B1", 6 * 3600, 90))?;
        store.push_reading(reading("B2", 0, 50))?;

        let summary = store.average_fill_hours()?;

        assert_eq!(summary.per_bin_hours.get("B1"), Some(&6.0));
        assert!(!summary.per_bin_hours.contains_key("B2"));
        assert_eq!(summary.overall_avg_hours, Some(6.0));
        Ok(())
    }
}
