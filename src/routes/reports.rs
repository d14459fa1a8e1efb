use axum::{extract::State, Json};
use chrono::NaiveDate;
use sea_orm::{ConnectionTrait, FromQueryResult, Statement};
use serde::Serialize;
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::AppState;
use crate::error::AppResult;
use crate::recharge;

/// Readings considered for the per-station recharge rollup.
const RECHARGE_WINDOW_READINGS: i64 = 12;

#[derive(Debug, FromQueryResult)]
struct AverageRow {
    station_id: Uuid,
    name: String,
    avg_level: Option<f64>,
}

#[derive(Debug, FromQueryResult)]
struct PredictionRow {
    station_id: Uuid,
    date: NaiveDate,
    predicted_level: f64,
}

#[derive(Debug, FromQueryResult)]
struct RechargeWindowRow {
    station_id: Uuid,
    latest_level: Option<f64>,
    baseline_level: Option<f64>,
    window_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StationSummary {
    pub station_id: Uuid,
    pub station: String,
    /// All-time mean observed level, null for stations without history.
    pub avg_level: Option<f64>,
    pub predicted_level: Option<f64>,
    pub prediction_date: Option<NaiveDate>,
    /// Windowed recharge over the last readings (m of water), null when
    /// fewer than two observations exist.
    pub recharge_estimate_m: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportsSummaryResponse {
    pub stations: Vec<StationSummary>,
}

/// Per-station reporting rollup
///
/// One row per station: all-time average level, current stored prediction,
/// and a recharge estimate over the last twelve readings. Reads persisted
/// predictions only.
#[utoipa::path(
    get,
    path = "/api/reports/summary",
    responses(
        (status = 200, description = "Summary computed", body = ReportsSummaryResponse),
    ),
    tag = "reports"
)]
pub async fn reports_summary(
    State(state): State<AppState>,
) -> AppResult<Json<ReportsSummaryResponse>> {
    let averages = load_averages(&state).await?;
    let predictions = load_latest_predictions(&state).await?;
    let windows = load_recharge_windows(&state).await?;

    let stations = averages
        .into_iter()
        .map(|row| {
            let prediction = predictions.get(&row.station_id);
            let recharge_estimate_m = windows
                .get(&row.station_id)
                .and_then(|w| recharge_from_window(w, state.config.specific_yield));

            StationSummary {
                station_id: row.station_id,
                station: row.name,
                avg_level: row.avg_level.map(round2),
                predicted_level: prediction.map(|p| p.predicted_level),
                prediction_date: prediction.map(|p| p.date),
                recharge_estimate_m,
            }
        })
        .collect();

    Ok(Json(ReportsSummaryResponse { stations }))
}

/// Recharge over the rollup window, or `None` when the window is too thin
/// to hold a distinct latest/baseline pair.
fn recharge_from_window(window: &RechargeWindowRow, specific_yield: f64) -> Option<f64> {
    if window.window_count < 2 {
        return None;
    }
    let latest = window.latest_level?;
    Some(round2(recharge::estimate_windowed(
        latest,
        window.baseline_level,
        specific_yield,
    )))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

async fn load_averages(state: &AppState) -> AppResult<Vec<AverageRow>> {
    let rows = state
        .db
        .query_all(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT s.id AS station_id, s.name, AVG(wl.level_m_bgl) AS avg_level \
             FROM stations s LEFT JOIN water_levels wl ON wl.station_id = s.id \
             GROUP BY s.id, s.name ORDER BY s.name"
                .to_string(),
        ))
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| AverageRow::from_query_result(&row, "").ok())
        .collect())
}

async fn load_latest_predictions(state: &AppState) -> AppResult<HashMap<Uuid, PredictionRow>> {
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
        .filter_map(|row| PredictionRow::from_query_result(&row, "").ok())
        .map(|r| (r.station_id, r))
        .collect())
}

async fn load_recharge_windows(state: &AppState) -> AppResult<HashMap<Uuid, RechargeWindowRow>> {
    let sql = format!(
        "SELECT station_id, \
                MAX(level_m_bgl) FILTER (WHERE rn = 1) AS latest_level, \
                MAX(level_m_bgl) FILTER (WHERE rn = last_rn) AS baseline_level, \
                COUNT(*) AS window_count \
         FROM ( \
             SELECT station_id, level_m_bgl, \
                    ROW_NUMBER() OVER (PARTITION BY station_id ORDER BY date DESC) AS rn, \
                    LEAST(COUNT(*) OVER (PARTITION BY station_id), {RECHARGE_WINDOW_READINGS}) AS last_rn \
             FROM water_levels \
         ) ranked \
         WHERE rn <= last_rn \
         GROUP BY station_id"
    );

    let rows = state
        .db
        .query_all(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            sql,
        ))
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|row| RechargeWindowRow::from_query_result(&row, "").ok())
        .map(|r| (r.station_id, r))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(latest: Option<f64>, baseline: Option<f64>, count: i64) -> RechargeWindowRow {
        RechargeWindowRow {
            station_id: Uuid::new_v4(),
            latest_level: latest,
            baseline_level: baseline,
            window_count: count,
        }
    }

    #[test]
    fn rollup_recharge_uses_latest_minus_baseline() {
        // Sy 0.1, level rose 14.0 -> 16.5 across the window.
        let w = window(Some(16.5), Some(14.0), 12);
        assert_eq!(recharge_from_window(&w, 0.1), Some(0.25));
    }

    #[test]
    fn single_reading_yields_no_rollup_estimate() {
        let w = window(Some(16.5), Some(16.5), 1);
        assert_eq!(recharge_from_window(&w, 0.1), None);
    }

    #[test]
    fn declining_window_reports_negative_recharge() {
        let w = window(Some(12.0), Some(15.0), 6);
        assert_eq!(recharge_from_window(&w, 0.1), Some(-0.3));
    }
}
