use std::time::Duration;
use tokio::time::MissedTickBehavior;

use crate::common::AppState;
use crate::jobs::worker;
use crate::telemetry::TelemetrySource;

/// Periodic forecast-and-alert loop. The first tick fires immediately so a
/// fresh deployment has predictions without waiting out an interval. Passes
/// run back to back, never concurrently; a pass longer than the interval
/// simply delays the next one.
pub async fn run_forecast_sync(state: AppState) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(state.config.forecast_interval_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_seconds = state.config.forecast_interval_seconds,
        "Forecast scheduler started"
    );

    loop {
        interval.tick().await;
        if let Err(e) = worker::refresh_predictions(&state).await {
            tracing::error!(error = %e, "Forecast pass failed");
        }
    }
}

/// Periodic telemetry sampling loop, same single-flight discipline as the
/// forecast scheduler.
pub async fn run_telemetry_sync<S: TelemetrySource + Sync>(state: AppState, source: S) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(state.config.telemetry_interval_seconds));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tracing::info!(
        interval_seconds = state.config.telemetry_interval_seconds,
        "Telemetry scheduler started"
    );

    loop {
        interval.tick().await;
        if let Err(e) = worker::ingest_telemetry(&state, &source).await {
            tracing::error!(error = %e, "Telemetry pass failed");
        }
    }
}
