use crate::cache::ModelCache;
use crate::estimation::score_fleet_at;
use crate::state::{BinId, HotspotCluster, UsagePattern};
use crate::store::{FillDurationSource, ReadingSource, StoreError};
use std::time::SystemTime;
use tracing::warn;

pub mod fill_duration;
pub mod hotspot;
pub mod patterns;

use hotspot::{HotspotCandidate, find_hotspots};
use patterns::classify_patterns;

/// Hotspot clusters for the current fleet. A clustering failure leaves
/// `clusters` empty and carries the reason in `error`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotspotReport {
    pub clusters: Vec<HotspotCluster>,
    pub error: Option<String>,
}

pub fn hotspots(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
) -> Result<HotspotReport, StoreError> {
    hotspots_at(source, cache, SystemTime::now())
}

pub fn hotspots_at(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
    now: SystemTime,
) -> Result<HotspotReport, StoreError> {
    let candidates: Vec<HotspotCandidate> = score_fleet_at(source, cache, now)?
        .iter()
        .map(HotspotCandidate::from)
        .collect();

    match find_hotspots(&candidates) {
        Ok(clusters) => Ok(HotspotReport {
            clusters,
            error: None,
        }),
        Err(err) => {
            warn!(error = %err, "Hotspot clustering failed");
            Ok(HotspotReport {
                clusters: Vec::new(),
                error: Some(err.to_string()),
            })
        }
    }
}

/// Usage patterns for the current fleet.
///
/// An unavailable fill-duration aggregate is treated as "no history" for every bin.
pub fn usage_patterns(
    source: &dyn ReadingSource,
    durations: &dyn FillDurationSource,
) -> Result<Vec<UsagePattern>, StoreError> {
    let avg_fill_hours = match durations.average_fill_hours() {
        Ok(summary) => summary.per_bin_hours,
        Err(err) => {
            warn!(error = %err, "Fill duration aggregate unavailable");
            Default::default()
        }
    };
    let current_fills: Vec<(BinId, Option<u8>)> = source
        .get_bins()?
        .into_iter()
        .map(|bin| (bin.bin_id, bin.current_fill_pct))
        .collect();
    Ok(classify_patterns(&avg_fill_hours, &current_fills))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryModelCache;
    use crate::state::{BinSnapshot, PatternKind, Reading};
    use crate::store::memory::InMemoryStore;
    use crate::store::mock::{MockReadingSource, MockStoreBehavior};
    use std::time::{Duration, UNIX_EPOCH};

    fn hour(h: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + h * 3600)
    }

    fn fleet() -> Result<InMemoryStore, StoreError> {
        let mut store = InMemoryStore::new();
        let layout = [
            ("B1", 12.90, 77.50, [0u8, 20, 82]),
            ("B2", 12.91, 77.51, [2, 50, 96]),
            ("B3", 13.20, 77.80, [10, 12, 14]),
        ];
        for (bin_id, lat, lon, fills) in layout {
            store.add_bin(BinSnapshot {
                bin_id: bin_id.to_string(),
                latitude: Some(lat),
                longitude: Some(lon),
                current_fill_pct: None,
            });
            for (i, fill_pct) in fills.into_iter().enumerate() {
                store.push_reading(Reading {
                    bin_id: bin_id.to_string(),
                    timestamp: hour(i as u64 * 10),
                    fill_pct,
                })?;
            }
        }
        store.add_bin(BinSnapshot {
            bin_id: "B4".to_string(),
            latitude: None,
            longitude: None,
            current_fill_pct: Some(5),
        });
        Ok(store)
    }

    #[test]
    fn hotspots_cover_scored_bins_with_coordinates() -> Result<(), StoreError> {
        let store = fleet()?;
        let cache = MemoryModelCache::new();

        let report = hotspots_at(&store, &cache, hour(20))?;

        assert_eq!(report.error, None);
        assert_eq!(report.clusters.len(), 1);
        assert_eq!(report.clusters[0].member_count(), 3);
        assert_eq!(report.clusters[0].top_examples[0], "B2");
        Ok(())
    }

    #[test]
    fn patterns_use_aggregate_and_fleet_fill() -> Result<(), StoreError> {
        let store = fleet()?;

        let patterns = usage_patterns(&store, &store)?;

        // B1 and B2 each complete one 20 h cycle; B3 and B4 have no history.
        assert_eq!(patterns[0].kind, PatternKind::CriticalPickupNeeded);
        assert_eq!(patterns[0].bin_ids, vec!["B2".to_string()]);
        assert_eq!(patterns[1].kind, PatternKind::FastFilling);
        assert_eq!(patterns[1].bin_ids, vec!["B1".to_string(), "B2".to_string()]);
        assert_eq!(patterns[2].kind, PatternKind::NewOrNoData);
        assert_eq!(patterns[2].bin_ids, vec!["B3".to_string(), "B4".to_string()]);
        Ok(())
    }

    #[test]
    fn failing_aggregate_marks_everything_as_new() -> Result<(), StoreError> {
        let source = MockReadingSource::new(fleet()?, MockStoreBehavior::fail_durations());

        let patterns = usage_patterns(&source, &source)?;

        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].kind, PatternKind::NewOrNoData);
        assert_eq!(patterns[0].bin_ids.len(), 4);
        Ok(())
    }
}
