use axum::{
    extract::{Path, Query, State},
    Json,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::alerting::{self, AlertLevel, Classification, Role};
use crate::common::AppState;
use crate::entity::{alerts, stations};
use crate::error::{AppError, AppResult};
use crate::routes::resolve_station;

#[derive(Debug, Deserialize, IntoParams)]
pub struct AlertQuery {
    /// Role whose thresholds apply (default: policymaker)
    pub role: Option<Role>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationAlertResponse {
    #[serde(flatten)]
    pub classification: Classification,
    /// The open alert record, absent when the station is normal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<alerts::Model>,
}

/// Classify a station now and reconcile its alert record
///
/// A normal classification resolves any open alert; an abnormal one raises
/// an alert if none is open. The observation is the freshest live reading,
/// falling back to the stored prediction.
#[utoipa::path(
    get,
    path = "/api/stations/{station_id}/alert",
    params(
        ("station_id" = String, Path, description = "Station UUID or name"),
        AlertQuery
    ),
    responses(
        (status = 200, description = "Classification computed", body = StationAlertResponse),
        (status = 404, description = "Station not found"),
        (status = 422, description = "No observation to classify"),
    ),
    tag = "alerts"
)]
pub async fn get_station_alert(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
    Query(query): Query<AlertQuery>,
) -> AppResult<Json<StationAlertResponse>> {
    let station = resolve_station(&state.db, &station_id).await?;
    let role = query.role.unwrap_or(Role::Policymaker);

    let classification = alerting::classify_station(&state.db, &state.config, &station, role).await?;
    let alert = alerting::ensure_alert(&state.db, &classification).await?;

    Ok(Json(StationAlertResponse {
        classification,
        alert,
    }))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AlertsQuery {
    /// Role whose thresholds apply (default: policymaker)
    pub role: Option<Role>,
    /// Only include stations currently in this band (normal, warning, ...)
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AlertsOverviewEntry {
    pub station: String,
    #[serde(flatten)]
    pub classification: Classification,
}

/// Current alert class for every station
///
/// Read-only: classifies each station on the fly without touching alert
/// records. Stations with no observation at all are omitted.
#[utoipa::path(
    get,
    path = "/api/alerts",
    params(AlertsQuery),
    responses(
        (status = 200, description = "Classifications retrieved", body = Vec<AlertsOverviewEntry>),
        (status = 400, description = "Unknown status filter"),
    ),
    tag = "alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> AppResult<Json<Vec<AlertsOverviewEntry>>> {
    let role = query.role.unwrap_or(Role::Policymaker);
    let status_filter = query
        .status
        .as_deref()
        .map(AlertLevel::from_str)
        .transpose()?;

    let stations_list = stations::Entity::find()
        .order_by_asc(stations::Column::Name)
        .all(&state.db)
        .await?;

    let mut entries = Vec::new();
    for station in stations_list {
        let classification =
            match alerting::classify_station(&state.db, &state.config, &station, role).await {
                Ok(c) => c,
                Err(AppError::InsufficientData(_)) => continue,
                Err(e) => return Err(e),
            };

        if let Some(filter) = status_filter
            && classification.alert_level != filter
        {
            continue;
        }

        entries.push(AlertsOverviewEntry {
            station: station.name,
            classification,
        });
    }

    Ok(Json(entries))
}

/// Full alert history for a station, newest first
#[utoipa::path(
    get,
    path = "/api/alerts/{id}/history",
    params(
        ("id" = String, Path, description = "Station UUID or name"),
    ),
    responses(
        (status = 200, description = "Alert history retrieved", body = Vec<alerts::Model>),
        (status = 404, description = "Station not found"),
    ),
    tag = "alerts"
)]
pub async fn get_alert_history(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
) -> AppResult<Json<Vec<alerts::Model>>> {
    let station = resolve_station(&state.db, &station_id).await?;

    let history = alerts::Entity::find()
        .filter(alerts::Column::StationId.eq(station.id))
        .order_by_desc(alerts::Column::Timestamp)
        .all(&state.db)
        .await?;

    Ok(Json(history))
}

/// Mark an alert as resolved
#[utoipa::path(
    post,
    path = "/api/alerts/{id}/resolve",
    params(
        ("id" = Uuid, Path, description = "Alert UUID"),
    ),
    responses(
        (status = 200, description = "Alert resolved", body = alerts::Model),
        (status = 404, description = "Alert not found"),
    ),
    tag = "alerts"
)]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(alert_id): Path<Uuid>,
) -> AppResult<Json<alerts::Model>> {
    let alert = alerts::Entity::find_by_id(alert_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Alert '{alert_id}' not found")))?;

    if alert.resolved {
        return Ok(Json(alert));
    }

    let mut active: alerts::ActiveModel = alert.into();
    active.resolved = Set(true);
    let updated = alerts::Entity::update(active).exec(&state.db).await?;

    tracing::info!(alert_id = %updated.id, "Alert resolved by request");
    Ok(Json(updated))
}
