use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use sea_orm::{
    sea_query::Expr, ColumnTrait, Condition, ConnectionTrait, EntityTrait, FromQueryResult,
    QueryFilter, QueryOrder, Statement,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::alerting::Role;
use crate::common::AppState;
use crate::entity::{alerts, predictions, stations, water_levels};
use crate::error::AppResult;
use crate::routes::resolve_station;

/// Latest historical observation per station, fetched in one pass.
#[derive(Debug, FromQueryResult)]
struct LatestLevelRow {
    station_id: Uuid,
    date: NaiveDate,
    level_m_bgl: f64,
    recharge_pattern: Option<String>,
}

/// Current prediction per station, newest target date wins.
#[derive(Debug, FromQueryResult)]
struct LatestPredictionRow {
    station_id: Uuid,
    date: NaiveDate,
    predicted_level: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationResponse {
    pub id: Uuid,
    pub name: String,
    pub state: String,
    pub district: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
    pub latest_level: Option<f64>,
    pub latest_level_date: Option<NaiveDate>,
    pub recharge_pattern: Option<String>,
    /// Stakeholder roles and up see the stored prediction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicted_level: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_date: Option<NaiveDate>,
    /// Policymakers and planners additionally see the open alert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_message: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct StationsQuery {
    /// Filter by state name (case-insensitive)
    pub state: Option<String>,
    /// Filter by district name (case-insensitive)
    pub district: Option<String>,
    /// Viewer role controlling response detail (default: farmer)
    pub role: Option<Role>,
}

/// List monitoring stations
///
/// The listing reads stored predictions and alert records; it never runs the
/// forecaster. Response detail depends on the viewer role: farmers get the
/// observational basics, stakeholders add the current prediction, and
/// policymakers/planners additionally see open alerts.
#[utoipa::path(
    get,
    path = "/api/stations",
    params(StationsQuery),
    responses(
        (status = 200, description = "Stations retrieved successfully", body = Vec<StationResponse>),
    ),
    tag = "stations"
)]
pub async fn list_stations(
    State(state): State<AppState>,
    Query(query): Query<StationsQuery>,
) -> AppResult<Json<Vec<StationResponse>>> {
    let role = query.role.unwrap_or(Role::Farmer);

    let stations_list = stations::Entity::find()
        .filter(listing_filter(
            query.state.as_deref(),
            query.district.as_deref(),
        ))
        .order_by_asc(stations::Column::Name)
        .all(&state.db)
        .await?;

    let latest_levels = load_latest_levels(&state).await?;

    let predictions = if sees_predictions(role) {
        load_latest_predictions(&state).await?
    } else {
        HashMap::new()
    };

    let open_alerts = if sees_alerts(role) {
        load_open_alerts(&state).await?
    } else {
        HashMap::new()
    };

    let response: Vec<StationResponse> = stations_list
        .into_iter()
        .map(|s| {
            let latest = latest_levels.get(&s.id);
            let prediction = predictions.get(&s.id);
            let alert = open_alerts.get(&s.id);

            StationResponse {
                id: s.id,
                name: s.name,
                state: s.state,
                district: s.district,
                city: s.city,
                latitude: s.latitude,
                longitude: s.longitude,
                latest_level: latest.map(|l| l.level_m_bgl),
                latest_level_date: latest.map(|l| l.date),
                recharge_pattern: latest.and_then(|l| l.recharge_pattern.clone()),
                predicted_level: prediction.map(|p| p.predicted_level),
                prediction_date: prediction.map(|p| p.date),
                alert_level: alert.map(|a| a.level.clone()),
                alert_message: alert.map(|a| a.message.clone()),
            }
        })
        .collect();

    Ok(Json(response))
}

/// Get one station's detail
///
/// Always returns the full view: latest observation, stored prediction, and
/// any open alert.
#[utoipa::path(
    get,
    path = "/api/stations/{station_id}",
    params(
        ("station_id" = String, Path, description = "Station UUID or name"),
    ),
    responses(
        (status = 200, description = "Station retrieved successfully", body = StationResponse),
        (status = 404, description = "Station not found"),
    ),
    tag = "stations"
)]
pub async fn get_station(
    State(state): State<AppState>,
    Path(station_id): Path<String>,
) -> AppResult<Json<StationResponse>> {
    let s = resolve_station(&state.db, &station_id).await?;

    let latest = water_levels::Entity::find()
        .filter(water_levels::Column::StationId.eq(s.id))
        .order_by_desc(water_levels::Column::Date)
        .one(&state.db)
        .await?;

    let prediction = predictions::Entity::find()
        .filter(predictions::Column::StationId.eq(s.id))
        .order_by_desc(predictions::Column::Date)
        .one(&state.db)
        .await?;

    let alert = alerts::Entity::find()
        .filter(alerts::Column::StationId.eq(s.id))
        .filter(alerts::Column::Resolved.eq(false))
        .one(&state.db)
        .await?;

    Ok(Json(StationResponse {
        id: s.id,
        name: s.name,
        state: s.state,
        district: s.district,
        city: s.city,
        latitude: s.latitude,
        longitude: s.longitude,
        latest_level: latest.as_ref().map(|l| l.level_m_bgl),
        latest_level_date: latest.as_ref().map(|l| l.date),
        recharge_pattern: latest.and_then(|l| l.recharge_pattern),
        predicted_level: prediction.as_ref().map(|p| p.predicted_level),
        prediction_date: prediction.as_ref().map(|p| p.date),
        alert_level: alert.as_ref().map(|a| a.level.clone()),
        alert_message: alert.map(|a| a.message),
    }))
}

/// Case-insensitive state/district filter, comparing via LOWER() on both
/// sides so the expression-index on LOWER(district) stays usable.
fn listing_filter(state_name: Option<&str>, district: Option<&str>) -> Condition {
    let mut cond = Condition::all();
    if let Some(s) = state_name {
        cond = cond.add(Expr::cust_with_values("LOWER(state) = LOWER($1)", [s]));
    }
    if let Some(d) = district {
        cond = cond.add(Expr::cust_with_values("LOWER(district) = LOWER($1)", [d]));
    }
    cond
}

fn sees_predictions(role: Role) -> bool {
    !matches!(role, Role::Farmer)
}

fn sees_alerts(role: Role) -> bool {
    matches!(role, Role::Policymaker | Role::Planner)
}

async fn load_latest_levels(state: &AppState) -> AppResult<HashMap<Uuid, LatestLevelRow>> {
    let rows = state
        .db
        .query_all(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT DISTINCT ON (station_id) station_id, date, level_m_bgl, recharge_pattern \
             FROM water_levels ORDER BY station_id, date DESC"
                .to_string(),
        ))
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| LatestLevelRow::from_query_result(&row, "").ok())
        .map(|r| (r.station_id, r))
        .collect())
}

async fn load_latest_predictions(
    state: &AppState,
) -> AppResult<HashMap<Uuid, LatestPredictionRow>> {
    let rows = state
        .db
        .query_all(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT DISTINCT ON (station_id) station_id, date, predicted_level \
             FROM predictions ORDER BY station_id, date DESC"
                .to_string(),
        ))
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| LatestPredictionRow::from_query_result(&row, "").ok())
        .map(|r| (r.station_id, r))
        .collect())
}

async fn load_open_alerts(state: &AppState) -> AppResult<HashMap<Uuid, alerts::Model>> {
    let rows = alerts::Entity::find()
        .filter(alerts::Column::Resolved.eq(false))
        .all(&state.db)
        .await?;

    Ok(rows.into_iter().map(|a| (a.station_id, a)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, QueryTrait};

    fn filter_sql(state_name: Option<&str>, district: Option<&str>) -> String {
        stations::Entity::find()
            .filter(listing_filter(state_name, district))
            .build(DatabaseBackend::Postgres)
            .to_string()
    }

    #[test]
    fn listing_filter_lowercases_both_sides() {
        let sql = filter_sql(Some("Karnataka"), None);
        assert!(
            sql.contains("LOWER(state) = LOWER('Karnataka')"),
            "got: {sql}"
        );

        let sql = filter_sql(None, Some("Bengaluru Urban"));
        assert!(
            sql.contains("LOWER(district) = LOWER('Bengaluru Urban')"),
            "got: {sql}"
        );
    }

    #[test]
    fn listing_filter_passes_input_verbatim() {
        // A mixed-case value must reach the query untouched; lowercasing
        // happens in SQL where a stored 'Karnataka' row can still match.
        let sql = filter_sql(Some("KARNATAKA"), Some("Mysuru"));
        assert!(sql.contains("'KARNATAKA'"), "got: {sql}");
        assert!(sql.contains("'Mysuru'"), "got: {sql}");
        assert!(!sql.contains("'karnataka'"), "got: {sql}");
    }

    #[test]
    fn listing_filter_without_params_is_unfiltered() {
        let sql = filter_sql(None, None);
        assert!(!sql.contains("LOWER"), "got: {sql}");
    }
}
