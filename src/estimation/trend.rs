//! Linear fill trend for one bin.
//!
//! Formula: fill_pct = intercept + slope * hours_since_origin

use crate::estimation::ForecastError;
use crate::state::Reading;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Slopes at or below this (percent per hour) are treated as no usable trend.
pub const MIN_TREND_PCT_PER_HOUR: f64 = 0.1;
pub const FULL_PCT: f64 = 100.0;
/// Latest fill at or above this counts as full when there is no trend.
pub const ALREADY_FULL_PCT: u8 = 98;

const SECS_PER_HOUR: f64 = 3600.0;

/// Least-squares line fitted over a bin's readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendModel {
    /// Timestamp of the earliest reading used for the fit.
    pub origin_time: SystemTime,
    /// Fill percent per hour.
    pub slope: f64,
    /// Fill percent at `origin_time`.
    pub intercept: f64,
}

/// What the trend says about the bin relative to its latest reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outlook {
    Filling { hours_left: f64 },
    AlreadyFull,
    SlowOrNoFill,
}

impl TrendModel {
    /// Ordinary least squares over `(hours since first reading, fill_pct)`.
    ///
    /// `readings` must be ascending by timestamp.
    pub fn fit(readings: &[Reading]) -> Result<Self, ForecastError> {
        let first = readings.first().ok_or(ForecastError::NoSensorData)?;
        if readings.len() < 2 {
            return Err(ForecastError::InsufficientData {
                readings: readings.len(),
            });
        }

        let origin_time = first.timestamp;
        let points: Vec<(f64, f64)> = readings
            .iter()
            .map(|r| (elapsed_hours(origin_time, r.timestamp), f64::from(r.fill_pct)))
            .collect();

        let n = points.len() as f64;
        let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

        let mut sxx = 0.0;
        let mut sxy = 0.0;
        for (x, y) in &points {
            sxx += (x - mean_x) * (x - mean_x);
            sxy += (x - mean_x) * (y - mean_y);
        }

        if sxx.is_nan() || sxx <= 0.0 {
            return Err(ForecastError::ModelFit(
                "readings do not span any time".to_string(),
            ));
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;
        if !slope.is_finite() || !intercept.is_finite() {
            return Err(ForecastError::ModelFit(format!(
                "non-finite fit (slope={slope}, intercept={intercept})"
            )));
        }

        Ok(Self {
            origin_time,
            slope,
            intercept,
        })
    }

    pub fn hours_at(&self, timestamp: SystemTime) -> f64 {
        elapsed_hours(self.origin_time, timestamp)
    }

    pub fn predict_at(&self, timestamp: SystemTime) -> f64 {
        self.intercept + self.slope * self.hours_at(timestamp)
    }

    /// Extrapolates from `latest` to the time the line reaches 100 percent.
    pub fn outlook(&self, latest: &Reading) -> Outlook {
        if self.slope > MIN_TREND_PCT_PER_HOUR {
            let last_x = self.hours_at(latest.timestamp);
            let x_full = (FULL_PCT - self.intercept) / self.slope;
            Outlook::Filling {
                hours_left: (x_full - last_x).max(0.0),
            }
        } else if latest.fill_pct >= ALREADY_FULL_PCT {
            Outlook::AlreadyFull
        } else {
            Outlook::SlowOrNoFill
        }
    }
}

/// Signed hours from `origin` to `timestamp`.
pub fn elapsed_hours(origin: SystemTime, timestamp: SystemTime) -> f64 {
    match timestamp.duration_since(origin) {
        Ok(elapsed) => elapsed.as_secs_f64() / SECS_PER_HOUR,
        Err(err) => -err.duration().as_secs_f64() / SECS_PER_HOUR,
    }
}
