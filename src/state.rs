use crate::cache::ModelCache;
use crate::store::{FillDurationSource, ReadingSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

pub type BinId = String;

/// A single fill observation for one bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub bin_id: BinId,
    pub timestamp: SystemTime,
    pub fill_pct: u8,
}

/// Fleet listing entry as reported by the reading source.
#[derive(Debug, Clone, PartialEq)]
pub struct BinSnapshot {
    pub bin_id: BinId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub current_fill_pct: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastStatus {
    NoSensorData,
    Predicting,
    AlreadyFull,
    SlowOrNoFill,
    PredictionError,
    PredictionFailed,
}

impl ForecastStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoSensorData => "no_sensor_data",
            Self::Predicting => "predicting",
            Self::AlreadyFull => "already_full",
            Self::SlowOrNoFill => "slow_or_no_fill",
            Self::PredictionError => "prediction_error",
            Self::PredictionFailed => "prediction_failed",
        }
    }
}

impl fmt::Display for ForecastStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time-to-full forecast for one bin. Recomputed on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub bin_id: BinId,
    pub current_fill: u8,
    pub hours_left: Option<f64>,
    pub eta: Option<SystemTime>,
    pub status: ForecastStatus,
    pub slope: f64,
    /// Human-readable cause for `PredictionError` and `PredictionFailed`.
    pub reason: Option<String>,
}

impl Forecast {
    pub fn no_sensor_data(bin_id: impl Into<BinId>) -> Self {
        Self {
            bin_id: bin_id.into(),
            current_fill: 0,
            hours_left: None,
            eta: None,
            status: ForecastStatus::NoSensorData,
            slope: 0.0,
            reason: None,
        }
    }

    pub fn degraded(
        bin_id: impl Into<BinId>,
        current_fill: u8,
        status: ForecastStatus,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            bin_id: bin_id.into(),
            current_fill,
            hours_left: None,
            eta: None,
            status,
            slope: 0.0,
            reason: Some(reason.into()),
        }
    }
}

/// A forecast paired with the bin's position and derived importance.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredBin {
    pub bin_id: BinId,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub forecast: Forecast,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HotspotCluster {
    pub cluster_id: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub average_importance: f64,
    pub member_bin_ids: Vec<BinId>,
    pub top_examples: Vec<BinId>,
}

impl HotspotCluster {
    pub fn member_count(&self) -> usize {
        self.member_bin_ids.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    CriticalPickupNeeded,
    VeryFastFilling,
    FastFilling,
    SlowFilling,
    RarelyUsedOrOversized,
    NewOrNoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsagePattern {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub bin_ids: Vec<BinId>,
    pub insight: &'static str,
}

/// Shared collaborators handed to every request.
pub struct AppState {
    readings: Arc<dyn ReadingSource>,
    cache: Arc<dyn ModelCache>,
    durations: Arc<dyn FillDurationSource>,
}

impl AppState {
    pub fn new(
        readings: Arc<dyn ReadingSource>,
        cache: Arc<dyn ModelCache>,
        durations: Arc<dyn FillDurationSource>,
    ) -> Self {
        Self {
            readings,
            cache,
            durations,
        }
    }

    pub fn readings(&self) -> &dyn ReadingSource {
        self.readings.as_ref()
    }

    pub fn cache(&self) -> &dyn ModelCache {
        self.cache.as_ref()
    }

    pub fn durations(&self) -> &dyn FillDurationSource {
        self.durations.as_ref()
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
