use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::common::AppState;
use crate::entity::{live_readings, water_levels};
use crate::error::{AppError, AppResult};
use crate::recharge;
use crate::routes::resolve_station;

#[derive(Debug, Deserialize, IntoParams)]
pub struct LiveQuery {
    /// Trailing window in hours (default: 24)
    pub hours: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LiveReadingResponse {
    pub timestamp: DateTime<Utc>,
    pub level_m_bgl: f64,
    pub recharge_rate: f64,
    pub battery_pct: f64,
    pub device_status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LiveResponse {
    pub station_id: Uuid,
    pub station: String,
    pub hours: i64,
    pub readings: Vec<LiveReadingResponse>,
}

/// Recent live telemetry for a station, oldest first
#[utoipa::path(
    get,
    path = "/api/stations/{station_id}/live",
    params(
        ("station_id" = String, Path, description = "Station UUID or name"),
        LiveQuery
    ),
    responses(
        (status = 200, description = "Live readings retrieved", body = LiveResponse),
        (status = 404, description = "Station not found"),
    ),
    tag = "live"
)]
pub async fn get_station_live(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Query(query): Query<LiveQuery>,
) -> AppResult<Json<LiveResponse>> {
    let station = resolve_station(&state.db, &station_id).await?;
    let hours = query.hours.unwrap_or(24).max(1);
    let cutoff = Utc::now() - Duration::hours(hours);

    let rows = live_readings::Entity::find()
        .filter(live_readings::Column::StationId.eq(station.id))
        .filter(live_readings::Column::Timestamp.gte(cutoff))
        .order_by_asc(live_readings::Column::Timestamp)
        .all(&state.db)
        .await?;

    Ok(Json(LiveResponse {
        station_id: station.id,
        station: station.name,
        hours,
        readings: rows
            .into_iter()
            .map(|r| LiveReadingResponse {
                timestamp: r.timestamp.to_utc(),
                level_m_bgl: r.level_m_bgl,
                recharge_rate: r.recharge_rate,
                battery_pct: r.battery_pct,
                device_status: r.device_status,
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct RechargeQuery {
    /// Lookback window in days (default: RECHARGE_WINDOW_DAYS)
    pub window_days: Option<i64>,
    /// Aquifer specific yield override (default: SPECIFIC_YIELD)
    pub specific_yield: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RechargeResponse {
    pub station_id: Uuid,
    pub station: String,
    pub window_days: i64,
    pub specific_yield: f64,
    pub level_now: f64,
    pub level_baseline: Option<f64>,
    pub baseline_date: Option<NaiveDate>,
    /// Net storage change over the window (m of water, positive = recharge).
    pub recharge_m: f64,
}

/// Windowed recharge estimate for a station
///
/// Compares the current level (freshest live reading, falling back to the
/// latest historical observation) against the level at the start of the
/// lookback window.
#[utoipa::path(
    get,
    path = "/api/stations/{station_id}/recharge",
    params(
        ("station_id" = String, Path, description = "Station UUID or name"),
        RechargeQuery
    ),
    responses(
        (status = 200, description = "Recharge estimate computed", body = RechargeResponse),
        (status = 400, description = "Invalid parameters"),
        (status = 404, description = "Station not found"),
        (status = 422, description = "No observations to estimate from"),
    ),
    tag = "live"
)]
pub async fn get_station_recharge(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Query(query): Query<RechargeQuery>,
) -> AppResult<Json<RechargeResponse>> {
    let station = resolve_station(&state.db, &station_id).await?;

    let window_days = query.window_days.unwrap_or(state.config.recharge_window_days);
    if window_days < 1 {
        return Err(AppError::BadRequest(
            "window_days must be at least 1".to_string(),
        ));
    }
    let specific_yield = query.specific_yield.unwrap_or(state.config.specific_yield);
    if !(specific_yield > 0.0 && specific_yield <= 1.0) {
        return Err(AppError::BadRequest(
            "specific_yield must be in (0, 1]".to_string(),
        ));
    }

    let live = live_readings::Entity::find()
        .filter(live_readings::Column::StationId.eq(station.id))
        .order_by_desc(live_readings::Column::Timestamp)
        .one(&state.db)
        .await?;

    let latest_historical = water_levels::Entity::find()
        .filter(water_levels::Column::StationId.eq(station.id))
        .order_by_desc(water_levels::Column::Date)
        .one(&state.db)
        .await?;

    let level_now = match (&live, &latest_historical) {
        (Some(reading), _) => reading.level_m_bgl,
        (None, Some(row)) => row.level_m_bgl,
        (None, None) => {
            return Err(AppError::InsufficientData(format!(
                "station '{}' has no observations",
                station.name
            )))
        }
    };

    let cutoff = Utc::now().date_naive() - Duration::days(window_days);
    let baseline = water_levels::Entity::find()
        .filter(water_levels::Column::StationId.eq(station.id))
        .filter(water_levels::Column::Date.lte(cutoff))
        .order_by_desc(water_levels::Column::Date)
        .one(&state.db)
        .await?;

    let recharge_m =
        recharge::estimate_windowed(level_now, baseline.as_ref().map(|b| b.level_m_bgl), specific_yield);

    Ok(Json(RechargeResponse {
        station_id: station.id,
        station: station.name,
        window_days,
        specific_yield,
        level_now,
        level_baseline: baseline.as_ref().map(|b| b.level_m_bgl),
        baseline_date: baseline.map(|b| b.date),
        recharge_m,
    }))
}
