use crate::cache::{CacheError, ModelCache};
use crate::state::{BinSnapshot, Forecast, ForecastStatus, Reading, ScoredBin};
use crate::store::{ReadingSource, StoreError};
use std::cmp::Ordering;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, warn};

pub mod importance;
pub mod trend;

use importance::score_forecast;
use trend::{Outlook, TrendModel};

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("no sensor data")]
    NoSensorData,
    #[error("insufficient data: {readings} reading(s), need at least 2")]
    InsufficientData { readings: usize },
    #[error("model fit failed: {0}")]
    ModelFit(String),
    #[error("model cache write failed: {0}")]
    Cache(#[from] CacheError),
}

/// Forecast for one bin as of now.
///
/// Only a failing reading source is returned as an error; anything that goes
/// wrong while fitting or extrapolating becomes a `PredictionError` record.
pub fn forecast_bin(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
    bin_id: &str,
) -> Result<Forecast, StoreError> {
    forecast_bin_at(source, cache, bin_id, SystemTime::now())
}

pub fn forecast_bin_at(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
    bin_id: &str,
    now: SystemTime,
) -> Result<Forecast, StoreError> {
    let readings = source.get_readings(bin_id)?;
    let Some(latest) = readings.last() else {
        return Ok(Forecast::no_sensor_data(bin_id));
    };

    match predict(bin_id, &readings, latest, cache, now) {
        Ok(forecast) => Ok(forecast),
        Err(err) => {
            warn!(bin_id, error = %err, "Trend prediction unavailable");
            Ok(Forecast::degraded(
                bin_id,
                latest.fill_pct,
                ForecastStatus::PredictionError,
                err.to_string(),
            ))
        }
    }
}

/// Drops the cached model for `bin_id` and forecasts from a fresh fit.
pub fn refit_bin(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
    bin_id: &str,
) -> Result<Forecast, StoreError> {
    if let Err(err) = cache.invalidate(bin_id) {
        warn!(bin_id, error = %err, "Failed to invalidate cached trend model");
    }
    forecast_bin(source, cache, bin_id)
}

fn predict(
    bin_id: &str,
    readings: &[Reading],
    latest: &Reading,
    cache: &dyn ModelCache,
    now: SystemTime,
) -> Result<Forecast, ForecastError> {
    if readings.len() < 2 {
        return Err(ForecastError::InsufficientData {
            readings: readings.len(),
        });
    }

    let model = load_or_fit(bin_id, readings, cache)?;
    let (hours_left, eta, status) = match model.outlook(latest) {
        Outlook::Filling { hours_left } => (
            Some(hours_left),
            Some(eta_after(now, hours_left)?),
            ForecastStatus::Predicting,
        ),
        Outlook::AlreadyFull => (Some(0.0), Some(now), ForecastStatus::AlreadyFull),
        Outlook::SlowOrNoFill => (None, None, ForecastStatus::SlowOrNoFill),
    };

    Ok(Forecast {
        bin_id: bin_id.to_string(),
        current_fill: latest.fill_pct,
        hours_left,
        eta,
        status,
        slope: model.slope,
        reason: None,
    })
}

fn load_or_fit(
    bin_id: &str,
    readings: &[Reading],
    cache: &dyn ModelCache,
) -> Result<TrendModel, ForecastError> {
    if let Some(model) = cache.load(bin_id) {
        return Ok(model);
    }
    debug!(bin_id, readings = readings.len(), "Fitting trend model");
    let model = TrendModel::fit(readings)?;
    cache.save(bin_id, &model)?;
    Ok(model)
}

fn eta_after(now: SystemTime, hours_left: f64) -> Result<SystemTime, ForecastError> {
    Duration::try_from_secs_f64(hours_left * 3600.0)
        .ok()
        .and_then(|offset| now.checked_add(offset))
        .ok_or_else(|| ForecastError::ModelFit(format!("eta out of range ({hours_left} h)")))
}

/// Forecasts every bin in the fleet, soonest-to-overflow first.
pub fn forecast_fleet(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
) -> Result<Vec<Forecast>, StoreError> {
    forecast_fleet_at(source, cache, SystemTime::now())
}

pub fn forecast_fleet_at(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
    now: SystemTime,
) -> Result<Vec<Forecast>, StoreError> {
    let bins = source.get_bins()?;
    let mut forecasts: Vec<Forecast> = bins
        .iter()
        .map(|bin| forecast_or_failed(source, cache, bin, now))
        .collect();
    sort_by_hours_left(&mut forecasts);
    Ok(forecasts)
}

fn forecast_or_failed(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
    bin: &BinSnapshot,
    now: SystemTime,
) -> Forecast {
    match forecast_bin_at(source, cache, &bin.bin_id, now) {
        Ok(forecast) => forecast,
        Err(err) => {
            warn!(bin_id = %bin.bin_id, error = %err, "Forecast failed");
            Forecast::degraded(
                bin.bin_id.clone(),
                bin.current_fill_pct.unwrap_or(0),
                ForecastStatus::PredictionFailed,
                err.to_string(),
            )
        }
    }
}

/// Ascending by `hours_left`; bins without one go last, in their original order.
pub fn sort_by_hours_left(forecasts: &mut [Forecast]) {
    forecasts.sort_by(|a, b| match (a.hours_left, b.hours_left) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

/// Forecast and importance for every bin whose forecast could be computed, in fleet order.
pub fn score_fleet_at(
    source: &dyn ReadingSource,
    cache: &dyn ModelCache,
    now: SystemTime,
) -> Result<Vec<ScoredBin>, StoreError> {
    let bins = source.get_bins()?;
    let mut scored = Vec::with_capacity(bins.len());
    for bin in bins {
        let forecast = match forecast_bin_at(source, cache, &bin.bin_id, now) {
            Ok(forecast) => forecast,
            Err(err) => {
                warn!(bin_id = %bin.bin_id, error = %err, "Skipping bin without forecast");
                continue;
            }
        };
        let importance = score_forecast(&forecast);
        scored.push(ScoredBin {
            bin_id: bin.bin_id,
            latitude: bin.latitude,
            longitude: bin.longitude,
            forecast,
            importance,
        });
    }
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryModelCache;
    use crate::store::memory::InMemoryStore;
    use crate::store::mock::{MockReadingSource, MockStoreBehavior};
    use std::time::UNIX_EPOCH;

    fn hour(h: f64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs_f64(1_700_000_000.0 + h * 3600.0)
    }

    fn bin(bin_id: &str) -> BinSnapshot {
        BinSnapshot {
            bin_id: bin_id.to_string(),
            latitude: Some(0.0),
            longitude: Some(0.0),
            current_fill_pct: None,
        }
    }

    fn store_with(series: &[(&str, Vec<(f64, u8)>)]) -> Result<InMemoryStore, StoreError> {
        let mut store = InMemoryStore::new();
        for (bin_id, points) in series {
            store.add_bin(bin(bin_id));
            for (h, fill_pct) in points {
                store.push_reading(Reading {
                    bin_id: bin_id.to_string(),
                    timestamp: hour(*h),
                    fill_pct: *fill_pct,
                })?;
            }
        }
        Ok(store)
    }

    #[test]
    fn steady_fill_predicts_hours_left() -> Result<(), StoreError> {
        let store = store_with(&[("B1", vec![(0.0, 10), (10.0, 30), (20.0, 50)])])?;
        let cache = MemoryModelCache::new();

        let forecast = forecast_bin_at(&store, &cache, "B1", hour(20.0))?;

        assert_eq!(forecast.status, ForecastStatus::Predicting);
        assert_eq!(forecast.current_fill, 50);
        let hours_left = forecast.hours_left.unwrap_or(f64::NAN);
        assert!((hours_left - 25.0).abs() < 1e-9);
        assert!((forecast.slope - 2.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn eta_lands_where_trend_reaches_full() -> Result<(), StoreError> {
        let store = store_with(&[("B1", vec![(0.0, 5), (3.0, 14), (7.5, 30), (12.0, 41)])])?;
        let cache = MemoryModelCache::new();

        let forecast = forecast_bin_at(&store, &cache, "B1", hour(12.0))?;
        let model = cache.load("B1").expect("model cached after fit");
        let eta = forecast.eta.expect("eta present while predicting");

        assert!((model.predict_at(eta) - 100.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn single_reading_is_prediction_error() -> Result<(), StoreError> {
        let store = store_with(&[("B2", vec![(0.0, 40)])])?;
        let cache = MemoryModelCache::new();

        let forecast = forecast_bin_at(&store, &cache, "B2", hour(1.0))?;

        assert_eq!(forecast.status, ForecastStatus::PredictionError);
        assert_eq!(forecast.current_fill, 40);
        assert_eq!(forecast.hours_left, None);
        assert_eq!(forecast.eta, None);
        assert!(forecast.reason.unwrap_or_default().starts_with("insufficient data"));
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn flat_full_bin_is_already_full() -> Result<(), StoreError> {
        let store = store_with(&[("B3", vec![(0.0, 99), (5.0, 99), (9.0, 99)])])?;
        let cache = MemoryModelCache::new();

        let forecast = forecast_bin_at(&store, &cache, "B3", hour(9.0))?;

        assert_eq!(forecast.status, ForecastStatus::AlreadyFull);
        assert_eq!(forecast.hours_left, Some(0.0));
        assert_eq!(forecast.eta, Some(hour(9.0)));
        Ok(())
    }

    #[test]
    fn flat_half_full_bin_is_slow() -> Result<(), StoreError> {
        let store = store_with(&[("B4", vec![(0.0, 50), (24.0, 51)])])?;
        let cache = MemoryModelCache::new();

        let forecast = forecast_bin_at(&store, &cache, "B4", hour(24.0))?;

        assert_eq!(forecast.status, ForecastStatus::SlowOrNoFill);
        assert_eq!(forecast.hours_left, None);
        Ok(())
    }

    #[test]
    fn bin_without_readings_has_no_sensor_data() -> Result<(), StoreError> {
        let store = store_with(&[("B5", vec![])])?;
        let cache = MemoryModelCache::new();

        let forecast = forecast_bin_at(&store, &cache, "B5", hour(0.0))?;

        assert_eq!(forecast, Forecast::no_sensor_data("B5"));
        Ok(())
    }

    #[test]
    fn cached_model_is_reused() -> Result<(), Box<dyn std::error::Error>> {
        let store = store_with(&[("B1", vec![(0.0, 10), (10.0, 30)])])?;
        let cache = MemoryModelCache::new();
        cache.save(
            "B1",
            &TrendModel {
                origin_time: hour(0.0),
                slope: 5.0,
                intercept: 0.0,
            },
        )?;

        let forecast = forecast_bin_at(&store, &cache, "B1", hour(10.0))?;

        assert_eq!(forecast.slope, 5.0);
        assert_eq!(forecast.hours_left, Some(10.0));
        Ok(())
    }

    #[test]
    fn refit_replaces_cached_model() -> Result<(), Box<dyn std::error::Error>> {
        let store = store_with(&[("B1", vec![(0.0, 10), (10.0, 30)])])?;
        let cache = MemoryModelCache::new();
        cache.save(
            "B1",
            &TrendModel {
                origin_time: hour(0.0),
                slope: 5.0,
                intercept: 0.0,
            },
        )?;

        let forecast = refit_bin(&store, &cache, "B1")?;

        assert!((forecast.slope - 2.0).abs() < 1e-9);
        assert!((cache.load("B1").map(|m| m.slope).unwrap_or_default() - 2.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn store_failure_is_returned() -> Result<(), StoreError> {
        let store = store_with(&[("B1", vec![(0.0, 10), (1.0, 20)])])?;
        let source = MockReadingSource::new(store, MockStoreBehavior::fail_readings_for(&["B1"]));
        let cache = MemoryModelCache::new();

        let result = forecast_bin_at(&source, &cache, "B1", hour(1.0));

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        Ok(())
    }

    #[test]
    fn fleet_is_sorted_with_missing_hours_last() -> Result<(), StoreError> {
        let store = store_with(&[
            ("SLOW", vec![(0.0, 20), (10.0, 20)]),
            ("FAR", vec![(0.0, 0), (10.0, 10)]),
            ("NONE", vec![]),
            ("SOON", vec![(0.0, 60), (10.0, 90)]),
        ])?;
        let cache = MemoryModelCache::new();

        let forecasts = forecast_fleet_at(&store, &cache, hour(10.0))?;
        let order: Vec<&str> = forecasts.iter().map(|f| f.bin_id.as_str()).collect();

        assert_eq!(order, vec!["SOON", "FAR", "SLOW", "NONE"]);
        Ok(())
    }

    #[test]
    fn failing_bin_degrades_without_aborting_fleet() -> Result<(), StoreError> {
        let store = store_with(&[
            ("B1", vec![(0.0, 10), (10.0, 30)]),
            ("B2", vec![(0.0, 10), (10.0, 30)]),
        ])?;
        let source = MockReadingSource::new(store, MockStoreBehavior::fail_readings_for(&["B1"]));
        let cache = MemoryModelCache::new();

        let forecasts = forecast_fleet_at(&source, &cache, hour(10.0))?;

        assert_eq!(forecasts.len(), 2);
        assert_eq!(forecasts[0].bin_id, "B2");
        assert_eq!(forecasts[0].status, ForecastStatus::Predicting);
        assert_eq!(forecasts[1].bin_id, "B1");
        assert_eq!(forecasts[1].status, ForecastStatus::PredictionFailed);
        assert_eq!(forecasts[1].current_fill, 30);
        assert!(forecasts[1].reason.is_some());
        Ok(())
    }

    #[test]
    fn fleet_listing_failure_is_returned() {
        let source =
            MockReadingSource::new(InMemoryStore::new(), MockStoreBehavior::fail_bins_listing());
        let cache = MemoryModelCache::new();

        assert!(forecast_fleet_at(&source, &cache, hour(0.0)).is_err());
    }

    #[test]
    fn scoring_skips_failed_bins() -> Result<(), StoreError> {
        let store = store_with(&[
            ("B1", vec![(0.0, 10), (10.0, 30)]),
            ("B2", vec![(0.0, 95), (10.0, 99)]),
        ])?;
        let source = MockReadingSource::new(store, MockStoreBehavior::fail_readings_for(&["B1"]));
        let cache = MemoryModelCache::new();

        let scored = score_fleet_at(&source, &cache, hour(10.0))?;

        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].bin_id, "B2");
        assert!(scored[0].importance > 0.0);
        Ok(())
    }
}
