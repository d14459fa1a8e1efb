use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use sea_orm::{EntityTrait, QueryOrder};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::AppState;
use crate::entity::predictions;
use crate::error::AppResult;
use crate::forecast::ForecastSource;
use crate::routes::resolve_station;

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictResponse {
    pub station_id: Uuid,
    pub station: String,
    pub district: String,
    pub target_date: NaiveDate,
    pub predicted_level: f64,
    pub source: ForecastSource,
    /// Averaged 7-day-forward precipitation used as exogenous input (mm).
    pub avg_precipitation_mm: f64,
    pub avg_max_temp_c: f64,
}

/// Run an on-demand forecast for a station
///
/// Side effect: the result replaces the station's stored prediction for the
/// target date, exactly as the scheduled pass would.
#[utoipa::path(
    get,
    path = "/api/stations/{station_id}/predict",
    params(
        ("station_id" = String, Path, description = "Station UUID or name"),
    ),
    responses(
        (status = 200, description = "Forecast computed", body = PredictResponse),
        (status = 404, description = "Station not found"),
        (status = 422, description = "Not enough history to forecast"),
    ),
    tag = "forecasts"
)]
pub async fn predict_station(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
) -> AppResult<Json<PredictResponse>> {
    let station = resolve_station(&state.db, &station_id).await?;

    let forecast = state
        .forecaster
        .predict_station(&state.db, &state.weather, &station)
        .await?;

    Ok(Json(PredictResponse {
        station_id: station.id,
        station: station.name,
        district: station.district,
        target_date: forecast.target_date,
        predicted_level: forecast.predicted_level,
        source: forecast.source,
        avg_precipitation_mm: forecast.weather.avg_precipitation_mm,
        avg_max_temp_c: forecast.weather.avg_max_temp_c,
    }))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoredPrediction {
    pub station_id: Uuid,
    pub date: NaiveDate,
    pub predicted_level: f64,
    pub generated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// List all stored predictions
#[utoipa::path(
    get,
    path = "/api/predictions",
    responses(
        (status = 200, description = "Predictions retrieved successfully", body = Vec<StoredPrediction>),
    ),
    tag = "forecasts"
)]
pub async fn list_predictions(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<StoredPrediction>>> {
    let rows = predictions::Entity::find()
        .order_by_asc(predictions::Column::Date)
        .all(&state.db)
        .await?;

    Ok(Json(
        rows.into_iter()
            .map(|p| StoredPrediction {
                station_id: p.station_id,
                date: p.date,
                predicted_level: p.predicted_level,
                generated_at: p.generated_at.map(|t| t.to_utc()),
            })
            .collect(),
    ))
}
