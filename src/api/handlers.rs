use crate::analytics::{hotspots_at, usage_patterns};
use crate::api::responses::{
    ErrorCode, ErrorResponse, FillDurationResponse, ForecastResponse, HealthResponse,
    HealthStatus, HotspotsResponse, PatternResponse, PatternsResponse, PredictionsResponse,
    format_timestamp,
};
use crate::estimation::{forecast_bin_at, forecast_fleet_at, refit_bin};
use crate::state::AppState;
use crate::store::StoreError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

pub enum ApiResponse<T> {
    Success {
        status: StatusCode,
        body: T,
    },
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T> ApiResponse<T> {
    fn ok(body: T) -> Self {
        ApiResponse::Success {
            status: StatusCode::OK,
            body,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success { status, body } => (status, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

// Store and model-cache calls are synchronous and may touch the disk.
async fn run_blocking<T, F>(route: &'static str, work: F) -> ApiResponse<T>
where
    T: Send + 'static,
    F: FnOnce() -> ApiResponse<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(response) => response,
        Err(err) => {
            error!(route, error = %err, "Request task failed");
            internal_error(route)
        }
    }
}

pub async fn get_prediction(
    State(state): State<Arc<AppState>>,
    Path(bin_id): Path<String>,
) -> impl IntoResponse {
    run_blocking("/api/predict/{bin_id}", move || {
        build_prediction_response(&state, &bin_id, SystemTime::now())
    })
    .await
}

pub async fn refit_prediction(
    State(state): State<Arc<AppState>>,
    Path(bin_id): Path<String>,
) -> impl IntoResponse {
    run_blocking("/api/predict/{bin_id}/refit", move || {
        build_refit_response(&state, &bin_id)
    })
    .await
}

pub async fn get_predictions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    run_blocking("/api/predictions", move || {
        build_predictions_response(&state, SystemTime::now())
    })
    .await
}

pub async fn get_hotspots(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    run_blocking("/api/hotspots", move || {
        build_hotspots_response(&state, SystemTime::now())
    })
    .await
}

pub async fn get_patterns(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    run_blocking("/api/patterns", move || build_patterns_response(&state)).await
}

pub async fn get_fill_duration(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    run_blocking("/api/fill-duration", move || {
        build_fill_duration_response(&state)
    })
    .await
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    run_blocking("/api/health", move || {
        build_health_response(&state, SystemTime::now())
    })
    .await
}

fn build_prediction_response(
    state: &AppState,
    bin_id: &str,
    now: SystemTime,
) -> ApiResponse<ForecastResponse> {
    match forecast_bin_at(state.readings(), state.cache(), bin_id, now) {
        Ok(forecast) => ApiResponse::ok(ForecastResponse::from_forecast(&forecast)),
        Err(err) => store_error("/api/predict/{bin_id}", &err),
    }
}

fn build_refit_response(state: &AppState, bin_id: &str) -> ApiResponse<ForecastResponse> {
    match refit_bin(state.readings(), state.cache(), bin_id) {
        Ok(forecast) => ApiResponse::ok(ForecastResponse::from_forecast(&forecast)),
        Err(err) => store_error("/api/predict/{bin_id}/refit", &err),
    }
}

fn build_predictions_response(
    state: &AppState,
    now: SystemTime,
) -> ApiResponse<PredictionsResponse> {
    match forecast_fleet_at(state.readings(), state.cache(), now) {
        Ok(forecasts) => ApiResponse::ok(PredictionsResponse {
            predictions: forecasts.iter().map(ForecastResponse::from_forecast).collect(),
        }),
        Err(err) => store_error("/api/predictions", &err),
    }
}

fn build_hotspots_response(state: &AppState, now: SystemTime) -> ApiResponse<HotspotsResponse> {
    match hotspots_at(state.readings(), state.cache(), now) {
        Ok(report) => ApiResponse::ok(HotspotsResponse::from(&report)),
        Err(err) => store_error("/api/hotspots", &err),
    }
}

fn build_patterns_response(state: &AppState) -> ApiResponse<PatternsResponse> {
    match usage_patterns(state.readings(), state.durations()) {
        Ok(patterns) => ApiResponse::ok(PatternsResponse {
            patterns: patterns.iter().map(PatternResponse::from).collect(),
        }),
        Err(err) => store_error("/api/patterns", &err),
    }
}

fn build_fill_duration_response(state: &AppState) -> ApiResponse<FillDurationResponse> {
    match state.durations().average_fill_hours() {
        Ok(summary) => ApiResponse::ok(FillDurationResponse::from(summary)),
        Err(err) => store_error("/api/fill-duration", &err),
    }
}

fn build_health_response(state: &AppState, now: SystemTime) -> ApiResponse<HealthResponse> {
    let timestamp = match format_timestamp(now) {
        Ok(formatted) => formatted,
        Err(err) => {
            error!(error = %err, "Failed to format health timestamp");
            return internal_error("/api/health");
        }
    };

    match state.readings().get_bins() {
        Ok(bins) => ApiResponse::ok(HealthResponse {
            status: HealthStatus::Ok,
            bins: bins.len(),
            timestamp,
        }),
        Err(err) => {
            error!(error = %err, "Reading source unavailable for health check");
            ApiResponse::Success {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: HealthResponse {
                    status: HealthStatus::Degraded,
                    bins: 0,
                    timestamp,
                },
            }
        }
    }
}

fn store_error<T>(route: &str, err: &StoreError) -> ApiResponse<T> {
    error!(route, error = %err, "Reading source failure");
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::StoreUnavailable,
            error_message: err.to_string(),
            timestamp: now_timestamp(),
        },
    }
}

fn internal_error<T>(route: &str) -> ApiResponse<T> {
    error!(route, "Internal error while handling request");
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: now_timestamp(),
        },
    }
}

fn now_timestamp() -> String {
    format_timestamp(SystemTime::now()).unwrap_or_else(|err| {
        error!(error = %err, "Failed to format error timestamp");
        OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    })
}
