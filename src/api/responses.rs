use crate::analytics::HotspotReport;
use crate::analytics::fill_duration::FillDurationSummary;
use crate::state::{Forecast, ForecastStatus, HotspotCluster, PatternKind, UsagePattern};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ForecastResponse {
    pub bin_id: String,
    pub current_fill: u8,
    pub hours_left: Option<f64>,
    pub eta_iso: Option<String>,
    pub status: ForecastStatus,
    pub slope: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ForecastResponse {
    pub fn from_forecast(forecast: &Forecast) -> Self {
        Self {
            bin_id: forecast.bin_id.clone(),
            current_fill: forecast.current_fill,
            hours_left: forecast.hours_left.map(|h| round_to(h, 2)),
            eta_iso: forecast.eta.and_then(|eta| format_timestamp(eta).ok()),
            status: forecast.status,
            slope: round_to(forecast.slope, 3),
            error: forecast.reason.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionsResponse {
    pub predictions: Vec<ForecastResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HotspotResponse {
    pub cluster_id: usize,
    pub latitude: f64,
    pub longitude: f64,
    pub average_importance_score: f64,
    pub num_bins_in_hotspot: usize,
    pub example_bin_ids: Vec<String>,
}

impl From<&HotspotCluster> for HotspotResponse {
    fn from(cluster: &HotspotCluster) -> Self {
        Self {
            cluster_id: cluster.cluster_id,
            latitude: cluster.latitude,
            longitude: cluster.longitude,
            average_importance_score: round_to(cluster.average_importance, 2),
            num_bins_in_hotspot: cluster.member_count(),
            example_bin_ids: cluster.top_examples.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HotspotsResponse {
    pub hotspot_centers: Vec<HotspotResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&HotspotReport> for HotspotsResponse {
    fn from(report: &HotspotReport) -> Self {
        Self {
            hotspot_centers: report.clusters.iter().map(HotspotResponse::from).collect(),
            error: report.error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PatternResponse {
    #[serde(rename = "type")]
    pub kind: PatternKind,
    pub label: &'static str,
    pub bin_ids: Vec<String>,
    pub insight: &'static str,
}

impl From<&UsagePattern> for PatternResponse {
    fn from(pattern: &UsagePattern) -> Self {
        Self {
            kind: pattern.kind,
            label: pattern.kind.label(),
            bin_ids: pattern.bin_ids.clone(),
            insight: pattern.insight,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PatternsResponse {
    pub patterns: Vec<PatternResponse>,
}

#[derive(Debug, Serialize)]
pub struct FillDurationResponse {
    pub per_bin_hours: BTreeMap<String, f64>,
    pub overall_avg_hours: Option<f64>,
}

impl From<FillDurationSummary> for FillDurationResponse {
    fn from(summary: FillDurationSummary) -> Self {
        Self {
            per_bin_hours: summary.per_bin_hours,
            overall_avg_hours: summary.overall_avg_hours,
        }
    }
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub bins: usize,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    StoreUnavailable,
    InternalError,
}

#[derive(Debug)]
pub enum TimestampError {
    Format(time::error::Format),
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::Format(err) => write!(f, "timestamp format error: {err}"),
        }
    }
}

pub fn format_timestamp(timestamp: SystemTime) -> Result<String, TimestampError> {
    let datetime = OffsetDateTime::from(timestamp);
    datetime.format(&Rfc3339).map_err(TimestampError::Format)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
