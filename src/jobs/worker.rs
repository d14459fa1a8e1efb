use chrono::{Duration, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::alerting::{self, Role};
use crate::common::AppState;
use crate::entity::{live_readings, stations};
use crate::error::{AppError, AppResult};
use crate::telemetry::TelemetrySource;

/// One forecast pass: re-predict every station, then reconcile its alert
/// record against the fresh classification.
///
/// Per-station failures are logged and skipped so one broken station cannot
/// starve the rest of the batch.
pub async fn refresh_predictions(state: &AppState) -> AppResult<()> {
    let started = std::time::Instant::now();
    let stations = stations::Entity::find().all(&state.db).await?;

    let role: Role = state
        .config
        .forecast_alert_role
        .parse()
        .unwrap_or_else(|_| {
            tracing::warn!(
                configured = %state.config.forecast_alert_role,
                "Unknown forecast alert role, using policymaker"
            );
            Role::Policymaker
        });

    let mut predicted = 0usize;
    let mut skipped = 0usize;
    let mut alerts_open = 0usize;

    for station in &stations {
        match state
            .forecaster
            .predict_station(&state.db, &state.weather, station)
            .await
        {
            Ok(_) => predicted += 1,
            Err(AppError::InsufficientData(reason)) => {
                tracing::debug!(station = %station.name, %reason, "Skipping forecast");
                skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(station = %station.name, error = %e, "Forecast failed");
                skipped += 1;
                continue;
            }
        }

        match alerting::classify_station(&state.db, &state.config, station, role).await {
            Ok(classification) => {
                match alerting::ensure_alert(&state.db, &classification).await {
                    Ok(Some(_)) => alerts_open += 1,
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(station = %station.name, error = %e, "Alert reconciliation failed");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(station = %station.name, error = %e, "Classification failed");
            }
        }
    }

    tracing::info!(
        stations = stations.len(),
        predicted,
        skipped,
        alerts_open,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Forecast pass complete"
    );
    Ok(())
}

/// One telemetry pass: sample every station through the source, insert the
/// drafts, then prune readings past the retention horizon.
pub async fn ingest_telemetry<S: TelemetrySource + Sync>(
    state: &AppState,
    source: &S,
) -> AppResult<()> {
    let stations = stations::Entity::find().all(&state.db).await?;
    let mut inserted = 0usize;

    for station in &stations {
        let draft = match source.sample(&state.db, &state.config, station).await {
            Ok(Some(draft)) => draft,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(station = %station.name, error = %e, "Telemetry sample failed");
                continue;
            }
        };

        let row = live_readings::ActiveModel {
            id: Set(Uuid::new_v4()),
            station_id: Set(draft.station_id),
            timestamp: Set(draft.timestamp.into()),
            level_m_bgl: Set(draft.level_m_bgl),
            recharge_rate: Set(draft.recharge_rate),
            battery_pct: Set(draft.battery_pct),
            device_status: Set(draft.device_status),
        };
        live_readings::Entity::insert(row).exec(&state.db).await?;
        inserted += 1;
    }

    let pruned = prune_live_readings(state).await?;
    tracing::info!(
        stations = stations.len(),
        inserted,
        pruned,
        "Telemetry pass complete"
    );
    Ok(())
}

/// Delete live readings older than the retention horizon.
pub async fn prune_live_readings(state: &AppState) -> AppResult<u64> {
    let cutoff = Utc::now() - Duration::hours(state.config.telemetry_retention_hours);
    let result = live_readings::Entity::delete_many()
        .filter(live_readings::Column::Timestamp.lt(cutoff))
        .exec(&state.db)
        .await?;
    Ok(result.rows_affected)
}
