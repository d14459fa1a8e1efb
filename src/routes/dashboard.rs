use axum::{
    extract::{Path, Query, State},
    Json,
};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    QuerySelect, Statement,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::alerting::{advisory_message, thresholds, AlertLevel, Role};
use crate::common::AppState;
use crate::entity::{alerts, stations, water_levels};
use crate::error::{AppError, AppResult};

/// Readings behind the farmer trend sparkline.
const FARMER_TREND_READINGS: u64 = 7;
/// Readings behind the planner scenario baseline.
const PLANNER_BASELINE_READINGS: u64 = 30;
/// Length of the planner availability outlook.
const PLANNER_OUTLOOK_DAYS: usize = 30;

#[derive(Debug, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Viewer latitude, required for the farmer dashboard
    pub lat: Option<f64>,
    /// Viewer longitude, required for the farmer dashboard
    pub lon: Option<f64>,
    /// Planner scenario: normal (default), drought, heavy_rainfall
    pub scenario: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum DashboardResponse {
    Farmer(FarmerDashboard),
    Policymaker(PolicymakerDashboard),
    Planner(PlannerDashboard),
    Stakeholder(StakeholderDashboard),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FarmerDashboard {
    pub role: Role,
    pub station_id: Uuid,
    pub station: String,
    pub current_level: Option<f64>,
    /// Last readings, oldest first.
    pub trend: Vec<f64>,
    pub advice: String,
    pub crop_insights: Vec<String>,
    pub avg_precipitation_mm: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_level: Option<AlertLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PolicymakerDashboard {
    pub role: Role,
    pub regional_trends: Vec<RegionalTrend>,
    pub alert_summary: Vec<AlertCount>,
    pub stations_status: Vec<StationStatus>,
}

#[derive(Debug, Serialize, ToSchema, FromQueryResult)]
pub struct RegionalTrend {
    pub state: String,
    pub avg_level: Option<f64>,
    pub min_level: Option<f64>,
    pub max_level: Option<f64>,
    pub station_count: i64,
}

#[derive(Debug, Serialize, ToSchema, FromQueryResult)]
pub struct AlertCount {
    pub state: String,
    pub level: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationStatus {
    pub station_id: Uuid,
    pub station: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Open alert band, null when the station has no unresolved alert.
    pub status: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlannerDashboard {
    pub role: Role,
    pub scenario: String,
    pub scenario_description: String,
    /// Recent observed levels, oldest first.
    pub historical_trend: Vec<f64>,
    pub simulated_trend: Vec<f64>,
    pub availability_forecast: Vec<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StakeholderDashboard {
    pub role: Role,
    pub stations: Vec<StationRollup>,
    pub monthly_alerts: Vec<MonthlyAlertCount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationRollup {
    pub station_id: Uuid,
    pub station: String,
    pub avg_level: Option<f64>,
    pub open_alert: Option<String>,
}

#[derive(Debug, Serialize, ToSchema, FromQueryResult)]
pub struct MonthlyAlertCount {
    /// Calendar month, `YYYY-MM`.
    pub month: String,
    pub level: String,
    pub count: i64,
}

/// Role-tailored dashboard aggregates
///
/// Farmers get the station nearest to `lat`/`lon` with irrigation advice;
/// policymakers get per-state rollups and a station status map; planners get
/// scenario-adjusted availability; stakeholders get per-station averages and
/// a monthly alert histogram.
#[utoipa::path(
    get,
    path = "/api/dashboard/{role}",
    params(
        ("role" = String, Path, description = "farmer, stakeholder, policymaker or planner"),
        DashboardQuery
    ),
    responses(
        (status = 200, description = "Dashboard data computed", body = DashboardResponse),
        (status = 400, description = "Unknown role, scenario, or missing coordinates"),
        (status = 404, description = "No stations registered"),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Path(role): Path<String>,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<DashboardResponse>> {
    let role = Role::from_str(&role)?;

    let response = match role {
        Role::Farmer => DashboardResponse::Farmer(farmer_dashboard(&state, &query).await?),
        Role::Policymaker => DashboardResponse::Policymaker(policymaker_dashboard(&state).await?),
        Role::Planner => DashboardResponse::Planner(planner_dashboard(&state, &query).await?),
        Role::Stakeholder => {
            DashboardResponse::Stakeholder(stakeholder_dashboard(&state).await?)
        }
    };

    Ok(Json(response))
}

async fn farmer_dashboard(state: &AppState, query: &DashboardQuery) -> AppResult<FarmerDashboard> {
    let (Some(lat), Some(lon)) = (query.lat, query.lon) else {
        return Err(AppError::BadRequest(
            "lat and lon are required for the farmer dashboard".to_string(),
        ));
    };

    let stations_list = stations::Entity::find().all(&state.db).await?;
    let Some(station) = nearest_station(&stations_list, lat, lon) else {
        return Err(AppError::NotFound("No stations registered".to_string()));
    };

    let recent = water_levels::Entity::find()
        .filter(water_levels::Column::StationId.eq(station.id))
        .order_by_desc(water_levels::Column::Date)
        .limit(FARMER_TREND_READINGS)
        .all(&state.db)
        .await?;

    let current_level = recent.first().map(|r| r.level_m_bgl);
    let trend: Vec<f64> = recent.iter().rev().map(|r| r.level_m_bgl).collect();

    let weather = state
        .weather
        .forecast_summary(station.latitude, station.longitude)
        .await;

    let (advice, crop_insights) = irrigation_advice(current_level, weather.avg_precipitation_mm);

    let (alert_level, alert_message) = match current_level {
        Some(level) => {
            let (bands, _) = thresholds::resolve(&state.db, station.id, Role::Farmer).await?;
            let class = bands.classify(level);
            if class == AlertLevel::Normal {
                (None, None)
            } else {
                (
                    Some(class),
                    Some(advisory_message(Role::Farmer, class, &station.name)),
                )
            }
        }
        None => (None, None),
    };

    Ok(FarmerDashboard {
        role: Role::Farmer,
        station_id: station.id,
        station: station.name.clone(),
        current_level,
        trend,
        advice: advice.to_string(),
        crop_insights: crop_insights.iter().map(|s| s.to_string()).collect(),
        avg_precipitation_mm: round2(weather.avg_precipitation_mm),
        alert_level,
        alert_message,
    })
}

async fn policymaker_dashboard(state: &AppState) -> AppResult<PolicymakerDashboard> {
    let regional_trends = query_rows::<RegionalTrend>(
        state,
        "SELECT s.state, AVG(wl.level_m_bgl) AS avg_level, MIN(wl.level_m_bgl) AS min_level, \
                MAX(wl.level_m_bgl) AS max_level, COUNT(DISTINCT s.id) AS station_count \
         FROM stations s JOIN water_levels wl ON wl.station_id = s.id \
         GROUP BY s.state ORDER BY s.state",
    )
    .await?;

    let alert_summary = query_rows::<AlertCount>(
        state,
        "SELECT s.state, a.level, COUNT(*) AS count \
         FROM alerts a JOIN stations s ON s.id = a.station_id \
         GROUP BY s.state, a.level ORDER BY s.state, a.level",
    )
    .await?;

    let stations_list = stations::Entity::find()
        .order_by_asc(stations::Column::Name)
        .all(&state.db)
        .await?;
    let open_alerts = load_open_alert_levels(state).await?;

    let stations_status = stations_list
        .into_iter()
        .map(|s| StationStatus {
            status: open_alerts.get(&s.id).cloned(),
            station_id: s.id,
            station: s.name,
            latitude: s.latitude,
            longitude: s.longitude,
        })
        .collect();

    Ok(PolicymakerDashboard {
        role: Role::Policymaker,
        regional_trends,
        alert_summary,
        stations_status,
    })
}

async fn planner_dashboard(state: &AppState, query: &DashboardQuery) -> AppResult<PlannerDashboard> {
    let scenario = Scenario::from_str(query.scenario.as_deref().unwrap_or("normal"))?;

    let recent = water_levels::Entity::find()
        .order_by_desc(water_levels::Column::Date)
        .limit(PLANNER_BASELINE_READINGS)
        .all(&state.db)
        .await?;

    let historical_trend: Vec<f64> = recent.iter().rev().map(|r| r.level_m_bgl).collect();
    let simulated_trend = scenario.simulate(&historical_trend);
    let availability_forecast = availability_forecast(&simulated_trend, PLANNER_OUTLOOK_DAYS);

    Ok(PlannerDashboard {
        role: Role::Planner,
        scenario: scenario.as_str().to_string(),
        scenario_description: scenario.description().to_string(),
        historical_trend,
        simulated_trend,
        availability_forecast,
    })
}

async fn stakeholder_dashboard(state: &AppState) -> AppResult<StakeholderDashboard> {
    #[derive(FromQueryResult)]
    struct RollupRow {
        station_id: Uuid,
        name: String,
        avg_level: Option<f64>,
    }

    let rollups = query_rows::<RollupRow>(
        state,
        "SELECT s.id AS station_id, s.name, AVG(wl.level_m_bgl) AS avg_level \
         FROM stations s LEFT JOIN water_levels wl ON wl.station_id = s.id \
         GROUP BY s.id, s.name ORDER BY s.name",
    )
    .await?;

    let open_alerts = load_open_alert_levels(state).await?;

    let stations = rollups
        .into_iter()
        .map(|r| StationRollup {
            open_alert: open_alerts.get(&r.station_id).cloned(),
            station_id: r.station_id,
            station: r.name,
            avg_level: r.avg_level.map(round2),
        })
        .collect();

    let monthly_alerts = query_rows::<MonthlyAlertCount>(
        state,
        "SELECT to_char(a.timestamp, 'YYYY-MM') AS month, a.level, COUNT(*) AS count \
         FROM alerts a WHERE a.timestamp >= now() - interval '12 months' \
         GROUP BY month, a.level ORDER BY month DESC, a.level",
    )
    .await?;

    Ok(StakeholderDashboard {
        role: Role::Stakeholder,
        stations,
        monthly_alerts,
    })
}

async fn query_rows<T: FromQueryResult>(state: &AppState, sql: &str) -> AppResult<Vec<T>> {
    let rows = state
        .db
        .query_all(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            sql.to_string(),
        ))
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| T::from_query_result(&row, "").ok())
        .collect())
}

async fn load_open_alert_levels(state: &AppState) -> AppResult<HashMap<Uuid, String>> {
    let rows = alerts::Entity::find()
        .filter(alerts::Column::Resolved.eq(false))
        .all(&state.db)
        .await?;

    Ok(rows.into_iter().map(|a| (a.station_id, a.level)).collect())
}

/// Station closest to the viewer by Manhattan distance over raw coordinates.
/// Coarse, but stations are sparse enough that a proper geodesic adds nothing.
fn nearest_station(stations_list: &[stations::Model], lat: f64, lon: f64) -> Option<&stations::Model> {
    stations_list.iter().min_by(|a, b| {
        let da = (lat - a.latitude).abs() + (lon - a.longitude).abs();
        let db = (lat - b.latitude).abs() + (lon - b.longitude).abs();
        da.total_cmp(&db)
    })
}

/// Irrigation guidance from the current level and forecast precipitation.
fn irrigation_advice(
    current_level: Option<f64>,
    avg_precipitation_mm: f64,
) -> (&'static str, &'static [&'static str]) {
    match current_level {
        Some(level) if level > 15.0 && avg_precipitation_mm > 15.0 => (
            "Irrigate every 2-3 days, 20-30 litres per plant",
            &[
                "Rice: high water requirement, monitor closely",
                "Wheat: moderate water, good for current levels",
            ],
        ),
        Some(level) if level > 10.0 => (
            "Irrigate every 4-5 days, 15-25 litres per plant",
            &[
                "Maize: moderate water, suitable",
                "Sugarcane: high water, reduce frequency",
            ],
        ),
        _ => (
            "Delay irrigation 1-2 weeks; use drip irrigation, 10-15 litres per plant",
            &[
                "Pulses: low water, ideal",
                "Vegetables: moderate water, careful monitoring needed",
            ],
        ),
    }
}

/// Rainfall scenarios the planner dashboard can project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Normal,
    Drought,
    HeavyRainfall,
}

impl Scenario {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scenario::Normal => "normal",
            Scenario::Drought => "drought",
            Scenario::HeavyRainfall => "heavy_rainfall",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Scenario::Normal => "Normal rainfall scenario",
            Scenario::Drought => "Drought scenario: stored levels reduced by 10%",
            Scenario::HeavyRainfall => "Heavy rainfall scenario: stored levels raised by 15%",
        }
    }

    fn factor(self) -> f64 {
        match self {
            Scenario::Normal => 1.0,
            Scenario::Drought => 0.9,
            Scenario::HeavyRainfall => 1.15,
        }
    }

    /// Scale a baseline series by the scenario factor.
    #[must_use]
    pub fn simulate(self, baseline: &[f64]) -> Vec<f64> {
        baseline.iter().map(|v| round2(v * self.factor())).collect()
    }
}

impl FromStr for Scenario {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Scenario::Normal),
            "drought" => Ok(Scenario::Drought),
            "heavy_rainfall" => Ok(Scenario::HeavyRainfall),
            other => Err(AppError::BadRequest(format!(
                "Unknown scenario '{other}', expected one of: normal, drought, heavy_rainfall"
            ))),
        }
    }
}

/// Gentle recovery ramp from the last simulated level, one value per day.
/// Empty when there is no baseline to project from.
fn availability_forecast(simulated: &[f64], days: usize) -> Vec<f64> {
    let Some(&last) = simulated.last() else {
        return Vec::new();
    };
    (0..days).map(|i| round2(last + i as f64 * 0.1)).collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station_at(name: &str, lat: f64, lon: f64) -> stations::Model {
        stations::Model {
            id: Uuid::new_v4(),
            name: name.to_string(),
            state: "Karnataka".to_string(),
            district: "Bengaluru Urban".to_string(),
            city: "Bengaluru".to_string(),
            latitude: lat,
            longitude: lon,
            created_at: None,
        }
    }

    #[test]
    fn nearest_station_picks_smallest_manhattan_distance() {
        let list = vec![
            station_at("Far", 20.0, 80.0),
            station_at("Near", 12.9, 77.6),
            station_at("Mid", 15.0, 78.0),
        ];
        let nearest = nearest_station(&list, 13.0, 77.5).unwrap();
        assert_eq!(nearest.name, "Near");
    }

    #[test]
    fn nearest_station_on_empty_list_is_none() {
        assert!(nearest_station(&[], 13.0, 77.5).is_none());
    }

    #[test]
    fn irrigation_advice_tiers_follow_level_and_rain() {
        let (wet, _) = irrigation_advice(Some(16.0), 20.0);
        assert!(wet.contains("2-3 days"));

        // High level but dry forecast falls to the middle tier.
        let (dry, _) = irrigation_advice(Some(16.0), 5.0);
        assert!(dry.contains("4-5 days"));

        let (low, _) = irrigation_advice(Some(8.0), 20.0);
        assert!(low.contains("Delay irrigation"));

        let (unknown, _) = irrigation_advice(None, 20.0);
        assert!(unknown.contains("Delay irrigation"));
    }

    #[test]
    fn scenarios_scale_the_baseline() {
        let base = [10.0, 20.0];
        assert_eq!(Scenario::Normal.simulate(&base), vec![10.0, 20.0]);
        assert_eq!(Scenario::Drought.simulate(&base), vec![9.0, 18.0]);
        assert_eq!(Scenario::HeavyRainfall.simulate(&base), vec![11.5, 23.0]);
    }

    #[test]
    fn scenario_parsing_rejects_unknown_names() {
        assert_eq!(Scenario::from_str("DROUGHT").unwrap(), Scenario::Drought);
        assert!(Scenario::from_str("monsoon").is_err());
    }

    #[test]
    fn availability_forecast_ramps_from_the_last_level() {
        let forecast = availability_forecast(&[14.0, 15.0], 3);
        assert_eq!(forecast, vec![15.0, 15.1, 15.2]);
        assert!(availability_forecast(&[], 3).is_empty());
    }
}
