//! Usage-pattern classification from historical fill durations.

use crate::state::{BinId, PatternKind, UsagePattern};
use std::collections::BTreeMap;

pub const VERY_FAST_HOURS: f64 = 12.0;
pub const FAST_HOURS: f64 = 24.0;
/// Durations between `FAST_HOURS` and this are deliberately left unclassified.
pub const SLOW_HOURS: f64 = 72.0;
pub const CRITICAL_FILL_PCT: u8 = 90;
pub const RARELY_USED_FILL_PCT: u8 = 10;

impl PatternKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::CriticalPickupNeeded => "Critical Pickup Needed",
            Self::VeryFastFilling => "Very Fast Filling Bins",
            Self::FastFilling => "Fast Filling Bins",
            Self::SlowFilling => "Slow Filling Bins",
            Self::RarelyUsedOrOversized => "Rarely Used / Oversized",
            Self::NewOrNoData => "New/No Data Bins",
        }
    }

    pub fn insight(self) -> &'static str {
        match self {
            Self::CriticalPickupNeeded => {
                "These bins are almost full and typically fill up quickly. Prioritize immediate collection."
            }
            Self::VeryFastFilling => {
                "Bins in high-traffic areas or undersized. Consider more frequent pickups or larger bins."
            }
            Self::FastFilling => {
                "Regularly require attention. Optimize routing to include these more often."
            }
            Self::SlowFilling => {
                "Bins in low-traffic areas. Pickup frequency can be reduced to save costs."
            }
            Self::RarelyUsedOrOversized => {
                "These bins are consistently empty despite being slow to fill. May be oversized or in very low-usage areas."
            }
            Self::NewOrNoData => {
                "These bins have no fill history or insufficient data for analysis. Monitor closely."
            }
        }
    }
}

/// Base bucket for an average empty-to-full duration, if any.
pub fn bucket(avg_hours: f64) -> Option<PatternKind> {
    if avg_hours < VERY_FAST_HOURS {
        Some(PatternKind::VeryFastFilling)
    } else if avg_hours < FAST_HOURS {
        Some(PatternKind::FastFilling)
    } else if avg_hours > SLOW_HOURS {
        Some(PatternKind::SlowFilling)
    } else {
        None
    }
}

/// Classifies bins into usage patterns.
///
/// `avg_fill_hours` holds bins with usable history; `current_fills` is the fleet
/// in listing order with each bin's current fill, if known. Only non-empty
/// groups are returned, in a fixed category order.
pub fn classify_patterns(
    avg_fill_hours: &BTreeMap<BinId, f64>,
    current_fills: &[(BinId, Option<u8>)],
) -> Vec<UsagePattern> {
    let mut groups: BTreeMap<PatternKind, Vec<BinId>> = BTreeMap::new();

    for (bin_id, avg_hours) in avg_fill_hours {
        if let Some(kind) = bucket(*avg_hours) {
            groups.entry(kind).or_default().push(bin_id.clone());
        }
    }

    // Cross-cutting flags follow fleet order.
    for (bin_id, fill) in current_fills {
        let Some(fill) = *fill else {
            continue;
        };
        let speed = avg_fill_hours.get(bin_id).copied().and_then(bucket);
        let flag = match speed {
            Some(PatternKind::FastFilling) if fill >= CRITICAL_FILL_PCT => {
                PatternKind::CriticalPickupNeeded
            }
            Some(PatternKind::SlowFilling) if fill < RARELY_USED_FILL_PCT => {
                PatternKind::RarelyUsedOrOversized
            }
            _ => continue,
        };
        groups.entry(flag).or_default().push(bin_id.clone());
    }

    let without_history: Vec<BinId> = current_fills
        .iter()
        .filter(|(bin_id, fill)| fill.is_some() && !avg_fill_hours.contains_key(bin_id))
        .map(|(bin_id, _)| bin_id.clone())
        .collect();
    if !without_history.is_empty() {
        groups.insert(PatternKind::NewOrNoData, without_history);
    }

    groups
        .into_iter()
        .map(|(kind, bin_ids)| UsagePattern {
            kind,
            bin_ids,
            insight: kind.insight(),
        })
        .collect()
}
