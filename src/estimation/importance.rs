//! Urgency score combining current fullness, time to overflow and fill trend.

use crate::state::{Forecast, ForecastStatus};

pub const MAX_IMPORTANCE: f64 = 150.0;
/// Forecast horizon over which urgency ramps from 0 to 100.
pub const URGENCY_HORIZON_HOURS: f64 = 48.0;

const FILL_WEIGHT: f64 = 0.5;
const ALREADY_FULL_BONUS: f64 = 100.0;
const HIGH_FILL_PCT: f64 = 90.0;
const HIGH_FILL_NO_TREND_BONUS: f64 = 50.0;
const TREND_WEIGHT: f64 = 10.0;
const MAX_TREND_BONUS: f64 = 20.0;
const ACTIVE_FLOOR: f64 = 1.0;

pub fn importance_score(
    current_fill: f64,
    hours_left: Option<f64>,
    status: ForecastStatus,
    slope: f64,
) -> f64 {
    let mut score = current_fill * FILL_WEIGHT;

    match hours_left {
        _ if status == ForecastStatus::AlreadyFull => score += ALREADY_FULL_BONUS,
        Some(hours) if hours <= URGENCY_HORIZON_HOURS => {
            score += (URGENCY_HORIZON_HOURS - hours) * (100.0 / URGENCY_HORIZON_HOURS);
        }
        None if current_fill >= HIGH_FILL_PCT => score += HIGH_FILL_NO_TREND_BONUS,
        _ => {}
    }

    if slope > 0.0 {
        score += (slope * TREND_WEIGHT).min(MAX_TREND_BONUS);
    }

    // Active bins must never rank as exactly zero.
    let active = current_fill > 0.0 || slope > 0.0 || status == ForecastStatus::Predicting;
    if score < ACTIVE_FLOOR && active {
        score = ACTIVE_FLOOR;
    }

    score.clamp(0.0, MAX_IMPORTANCE)
}

pub fn score_forecast(forecast: &Forecast) -> f64 {
    importance_score(
        f64::from(forecast.current_fill),
        forecast.hours_left,
        forecast.status,
        forecast.slope,
    )
}
