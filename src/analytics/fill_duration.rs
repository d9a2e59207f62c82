//! Average empty-to-full duration per bin, measured over complete fill cycles.

use crate::estimation::trend::elapsed_hours;
use crate::state::Reading;
use std::collections::BTreeMap;

/// Fill at or below this marks the start of a cycle.
pub const EMPTY_FILL_PCT: u8 = 5;
/// Fill at or above this closes an open cycle.
pub const FULL_FILL_PCT: u8 = 80;

/// Averages are reported to this many decimal places.
const HOURS_DECIMALS: i32 = 2;

/// Per-bin and fleet-wide average cycle durations, rounded to hundredths of an hour.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillDurationSummary {
    pub per_bin_hours: BTreeMap<String, f64>,
    pub overall_avg_hours: Option<f64>,
}

/// Durations in hours of each completed cycle in `readings` (ascending by timestamp).
pub fn fill_cycles(readings: &[Reading]) -> Vec<f64> {
    let mut durations = Vec::new();
    let mut start = None;

    for reading in readings {
        match start {
            None if reading.fill_pct <= EMPTY_FILL_PCT => start = Some(reading.timestamp),
            Some(origin) if reading.fill_pct >= FULL_FILL_PCT => {
                let hours = elapsed_hours(origin, reading.timestamp);
                if hours > 0.0 {
                    durations.push(hours);
                }
                start = None;
            }
            _ => {}
        }
    }

    durations
}

pub fn average_fill_hours<'a, I>(readings_by_bin: I) -> FillDurationSummary
where
    I: IntoIterator<Item = (&'a str, &'a [Reading])>,
{
    let mut summary = FillDurationSummary::default();
    let mut total_hours = 0.0;
    let mut total_cycles = 0usize;

    for (bin_id, readings) in readings_by_bin {
        let cycles = fill_cycles(readings);
        if cycles.is_empty() {
            continue;
        }
        let sum: f64 = cycles.iter().sum();
        total_hours += sum;
        total_cycles += cycles.len();
        summary
            .per_bin_hours
            .insert(bin_id.to_string(), round_hours(sum / cycles.len() as f64));
    }

    if total_cycles > 0 {
        summary.overall_avg_hours = Some(round_hours(total_hours / total_cycles as f64));
    }
    summary
}

fn round_hours(hours: f64) -> f64 {
    let factor = 10f64.powi(HOURS_DECIMALS);
    (hours * factor).round() / factor
}
