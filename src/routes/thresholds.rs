use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::alerting::{thresholds, Role, ThresholdBands, ThresholdSource};
use crate::common::AppState;
use crate::entity::alert_thresholds;
use crate::error::AppResult;
use crate::routes::resolve_station;

#[derive(Debug, Deserialize, IntoParams)]
pub struct ThresholdsQuery {
    /// Role whose bands to resolve
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThresholdsResponse {
    pub station_id: Uuid,
    pub role: Role,
    pub source: ThresholdSource,
    pub bands: ThresholdBands,
}

/// Get the effective alert bands for a station and role
///
/// Resolution order: station-specific row, global role row, built-in
/// defaults. The response says which one applied.
#[utoipa::path(
    get,
    path = "/api/stations/{station_id}/thresholds",
    params(
        ("station_id" = String, Path, description = "Station UUID or name"),
        ThresholdsQuery
    ),
    responses(
        (status = 200, description = "Thresholds resolved successfully", body = ThresholdsResponse),
        (status = 404, description = "Station not found"),
    ),
    tag = "thresholds"
)]
pub async fn get_station_thresholds(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Query(query): Query<ThresholdsQuery>,
) -> AppResult<Json<ThresholdsResponse>> {
    let station = resolve_station(&state.db, &station_id).await?;
    let (bands, source) = thresholds::resolve(&state.db, station.id, query.role).await?;

    Ok(Json(ThresholdsResponse {
        station_id: station.id,
        role: query.role,
        source,
        bands,
    }))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ThresholdUpsertRequest {
    /// Station UUID or name; omit for the role's global row
    pub station_id: Option<String>,
    pub role: Role,
    pub normal_min: f64,
    pub warning_min: f64,
    pub critical_min: f64,
    pub emergency_floor: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ThresholdUpsertResponse {
    pub id: Uuid,
    pub station_id: Option<Uuid>,
    pub role: Role,
    pub bands: ThresholdBands,
    pub created: bool,
}

/// Create or update an alert band row
///
/// The cut points are validated before anything is written: each band must be
/// non-empty (`normal_min > warning_min > critical_min >= emergency_floor`).
#[utoipa::path(
    put,
    path = "/api/thresholds",
    request_body = ThresholdUpsertRequest,
    responses(
        (status = 200, description = "Thresholds stored", body = ThresholdUpsertResponse),
        (status = 400, description = "Invalid cut point ordering"),
        (status = 404, description = "Station not found"),
    ),
    tag = "thresholds"
)]
pub async fn put_thresholds(
    State(state): State<AppState>,
    Json(request): Json<ThresholdUpsertRequest>,
) -> AppResult<Json<ThresholdUpsertResponse>> {
    let bands = ThresholdBands {
        normal_min: request.normal_min,
        warning_min: request.warning_min,
        critical_min: request.critical_min,
        emergency_floor: request.emergency_floor,
    };
    bands.validate()?;

    let station_id = match &request.station_id {
        Some(id_or_name) => Some(resolve_station(&state.db, id_or_name).await?.id),
        None => None,
    };

    let mut existing_query =
        alert_thresholds::Entity::find().filter(alert_thresholds::Column::Role.eq(request.role.as_str()));
    existing_query = match station_id {
        Some(id) => existing_query.filter(alert_thresholds::Column::StationId.eq(id)),
        None => existing_query.filter(alert_thresholds::Column::StationId.is_null()),
    };

    let (id, created) = match existing_query.one(&state.db).await? {
        Some(existing) => {
            let mut active: alert_thresholds::ActiveModel = existing.into();
            active.normal_min = Set(bands.normal_min);
            active.warning_min = Set(bands.warning_min);
            active.critical_min = Set(bands.critical_min);
            active.emergency_floor = Set(bands.emergency_floor);
            let updated = alert_thresholds::Entity::update(active)
                .exec(&state.db)
                .await?;
            (updated.id, false)
        }
        None => {
            let row = alert_thresholds::ActiveModel {
                id: Set(Uuid::new_v4()),
                station_id: Set(station_id),
                role: Set(request.role.as_str().to_string()),
                normal_min: Set(bands.normal_min),
                warning_min: Set(bands.warning_min),
                critical_min: Set(bands.critical_min),
                emergency_floor: Set(bands.emergency_floor),
                created_at: Set(Some(Utc::now().into())),
            };
            let inserted = alert_thresholds::Entity::insert(row)
                .exec_with_returning(&state.db)
                .await?;
            (inserted.id, true)
        }
    };

    tracing::info!(
        role = %request.role,
        station_id = ?station_id,
        created,
        "Stored alert thresholds"
    );

    Ok(Json(ThresholdUpsertResponse {
        id,
        station_id,
        role: request.role,
        bands,
        created,
    }))
}
