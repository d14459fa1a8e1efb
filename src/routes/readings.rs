use axum::{
    extract::{Path, Query, State},
    http::header::{self, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::ReceiverStream;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::common::AppState;
use crate::entity::{predictions, water_levels};
use crate::error::{AppError, AppResult};
use crate::recharge;
use crate::routes::resolve_station;

fn default_format() -> String {
    "json".to_string()
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ReadingsQuery {
    /// Start date (inclusive). If omitted, returns from earliest data.
    pub start: Option<NaiveDate>,
    /// End date (inclusive). If omitted, returns to latest data.
    pub end: Option<NaiveDate>,
    /// Response format: json (default) or csv
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReadingPoint {
    pub date: NaiveDate,
    pub level_m_bgl: f64,
    pub recharge_pattern: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadingsResponse {
    pub station_id: Uuid,
    pub station: String,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub readings: Vec<ReadingPoint>,
}

/// Get historical water levels for a station
///
/// Chronological series, as JSON or streamed CSV.
#[utoipa::path(
    get,
    path = "/api/stations/{station_id}/readings",
    params(
        ("station_id" = String, Path, description = "Station UUID or name"),
        ReadingsQuery
    ),
    responses(
        (status = 200, description = "Readings retrieved successfully", body = ReadingsResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 404, description = "Station not found"),
    ),
    tag = "readings"
)]
pub async fn get_station_readings(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Query(query): Query<ReadingsQuery>,
) -> AppResult<Response> {
    let station = resolve_station(&state.db, &station_id).await?;

    if let (Some(start), Some(end)) = (query.start, query.end)
        && end < start
    {
        return Err(AppError::BadRequest(
            "end date must not be before start date".to_string(),
        ));
    }

    let mut db_query =
        water_levels::Entity::find().filter(water_levels::Column::StationId.eq(station.id));
    if let Some(start) = query.start {
        db_query = db_query.filter(water_levels::Column::Date.gte(start));
    }
    if let Some(end) = query.end {
        db_query = db_query.filter(water_levels::Column::Date.lte(end));
    }

    let rows = db_query
        .order_by_asc(water_levels::Column::Date)
        .all(&state.db)
        .await?;

    let readings: Vec<ReadingPoint> = rows
        .into_iter()
        .map(|r| ReadingPoint {
            date: r.date,
            level_m_bgl: r.level_m_bgl,
            recharge_pattern: r.recharge_pattern,
        })
        .collect();

    if query.format.eq_ignore_ascii_case("csv") {
        return build_csv_response(&readings);
    }

    Ok(Json(ReadingsResponse {
        station_id: station.id,
        station: station.name,
        start: readings.first().map(|r| r.date),
        end: readings.last().map(|r| r.date),
        readings,
    })
    .into_response())
}

fn build_csv_response(readings: &[ReadingPoint]) -> AppResult<Response> {
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, std::io::Error>>(100);
    let readings = readings.to_vec();

    tokio::spawn(async move {
        let _ = tx
            .send(Ok("date,level_m_bgl,recharge_pattern\n".to_string()))
            .await;

        for point in &readings {
            let row = format!(
                "{},{},{}\n",
                point.date,
                point.level_m_bgl,
                point.recharge_pattern.as_deref().unwrap_or("")
            );
            if tx.send(Ok(row)).await.is_err() {
                break;
            }
        }
    });

    let stream = ReceiverStream::new(rx);
    let body = axum::body::Body::from_stream(stream);

    Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"))
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TrendsQuery {
    /// Trailing window in days (default: 365)
    pub days: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub level_m_bgl: f64,
    /// Storage change since the previous observation (m of water, Sy-scaled).
    pub recharge_estimate: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PredictionPoint {
    pub date: NaiveDate,
    pub predicted_level: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrendsResponse {
    pub station_id: Uuid,
    pub station: String,
    pub days: i64,
    pub levels: Vec<TrendPoint>,
    pub predictions: Vec<PredictionPoint>,
}

/// Get a station's trailing level trend with per-step recharge estimates
///
/// Includes stored predictions so the trend can be plotted past the last
/// observation.
#[utoipa::path(
    get,
    path = "/api/stations/{station_id}/trends",
    params(
        ("station_id" = String, Path, description = "Station UUID or name"),
        TrendsQuery
    ),
    responses(
        (status = 200, description = "Trends retrieved successfully", body = TrendsResponse),
        (status = 404, description = "Station not found"),
    ),
    tag = "readings"
)]
pub async fn get_station_trends(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Query(query): Query<TrendsQuery>,
) -> AppResult<Json<TrendsResponse>> {
    let station = resolve_station(&state.db, &station_id).await?;
    let days = query.days.unwrap_or(365).max(1);
    let cutoff = chrono::Utc::now().date_naive() - chrono::Duration::days(days);

    let rows = water_levels::Entity::find()
        .filter(water_levels::Column::StationId.eq(station.id))
        .filter(water_levels::Column::Date.gte(cutoff))
        .order_by_asc(water_levels::Column::Date)
        .all(&state.db)
        .await?;

    let mut levels = Vec::with_capacity(rows.len());
    let mut previous: Option<f64> = None;
    for row in rows {
        levels.push(TrendPoint {
            date: row.date,
            level_m_bgl: row.level_m_bgl,
            recharge_estimate: recharge::estimate_windowed(
                row.level_m_bgl,
                previous,
                state.config.specific_yield,
            ),
        });
        previous = Some(row.level_m_bgl);
    }

    let prediction_rows = predictions::Entity::find()
        .filter(predictions::Column::StationId.eq(station.id))
        .order_by_asc(predictions::Column::Date)
        .all(&state.db)
        .await?;

    Ok(Json(TrendsResponse {
        station_id: station.id,
        station: station.name,
        days,
        levels,
        predictions: prediction_rows
            .into_iter()
            .map(|p| PredictionPoint {
                date: p.date,
                predicted_level: p.predicted_level,
            })
            .collect(),
    }))
}
