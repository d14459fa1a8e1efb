use chrono::Utc;
use rand::Rng;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::config::Config;
use crate::entity::{live_readings, stations, water_levels};
use crate::error::AppResult;
use crate::recharge;
use crate::telemetry::{LiveReadingDraft, TelemetrySource};

/// Maximum random walk step between consecutive simulated levels, in metres.
const LEVEL_JITTER_M: f64 = 0.15;

/// Maximum battery drain per sample, in percentage points.
const BATTERY_DRAIN_MAX_PCT: f64 = 0.05;

/// Battery charge at which the device reports a degraded status.
const LOW_BATTERY_PCT: f64 = 15.0;

/// Elapsed time assumed for the very first recharge estimate of a station,
/// when no prior live reading exists to measure against.
const DEFAULT_ELAPSED_HOURS: f64 = 1.0;

/// Synthetic datalogger: random-walks each station's level off its last
/// observation so the live feed stays consistent with the historical record.
#[derive(Debug, Default)]
pub struct SimulatedTelemetry;

impl SimulatedTelemetry {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl TelemetrySource for SimulatedTelemetry {
    async fn sample(
        &self,
        db: &DatabaseConnection,
        config: &Config,
        station: &stations::Model,
    ) -> AppResult<Option<LiveReadingDraft>> {
        let now = Utc::now();

        let previous = live_readings::Entity::find()
            .filter(live_readings::Column::StationId.eq(station.id))
            .order_by_desc(live_readings::Column::Timestamp)
            .one(db)
            .await?;

        // Walk off the last live level; seed from the historical record for
        // a station's first sample. No data at all means nothing plausible
        // to emit.
        let baseline = match &previous {
            Some(reading) => reading.level_m_bgl,
            None => {
                let latest = water_levels::Entity::find()
                    .filter(water_levels::Column::StationId.eq(station.id))
                    .order_by_desc(water_levels::Column::Date)
                    .one(db)
                    .await?;
                match latest {
                    Some(row) => row.level_m_bgl,
                    None => {
                        tracing::debug!(
                            station = %station.name,
                            "No history to seed simulated telemetry, skipping"
                        );
                        return Ok(None);
                    }
                }
            }
        };

        let mut rng = rand::rng();
        let level = perturb_level(baseline, rng.random::<f64>());

        let (previous_level, elapsed_hours, previous_battery) = match &previous {
            Some(reading) => (
                Some(reading.level_m_bgl),
                (now - reading.timestamp.to_utc()).num_seconds() as f64 / 3600.0,
                reading.battery_pct,
            ),
            None => (None, DEFAULT_ELAPSED_HOURS, 100.0),
        };

        let recharge_rate =
            recharge::estimate(level, previous_level, elapsed_hours, config.specific_yield);
        let battery_pct = drain_battery(previous_battery, rng.random::<f64>());

        Ok(Some(LiveReadingDraft {
            station_id: station.id,
            timestamp: now,
            level_m_bgl: level,
            recharge_rate,
            battery_pct,
            device_status: device_status(battery_pct).to_string(),
        }))
    }
}

/// Symmetric random-walk step: `unit` in [0, 1) maps to a delta in
/// (-LEVEL_JITTER_M, +LEVEL_JITTER_M]. Levels never go below zero.
fn perturb_level(baseline: f64, unit: f64) -> f64 {
    let delta = (unit * 2.0 - 1.0) * LEVEL_JITTER_M;
    (baseline + delta).max(0.0)
}

/// Monotone battery decay, floored at zero.
fn drain_battery(previous_pct: f64, unit: f64) -> f64 {
    (previous_pct - unit * BATTERY_DRAIN_MAX_PCT).max(0.0)
}

fn device_status(battery_pct: f64) -> &'static str {
    if battery_pct < LOW_BATTERY_PCT {
        "low_battery"
    } else {
        "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perturbation_stays_within_jitter_bounds() {
        for unit in [0.0, 0.25, 0.5, 0.75, 0.999_999] {
            let level = perturb_level(20.0, unit);
            assert!((level - 20.0).abs() <= LEVEL_JITTER_M + 1e-12, "unit={unit}");
        }
    }

    #[test]
    fn perturbation_never_goes_negative() {
        assert_eq!(perturb_level(0.05, 0.0), 0.0);
    }

    #[test]
    fn midpoint_unit_leaves_level_unchanged() {
        assert!((perturb_level(12.0, 0.5) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn battery_decays_monotonically_and_floors_at_zero() {
        let after = drain_battery(100.0, 1.0);
        assert!(after < 100.0);
        assert!(after >= 100.0 - BATTERY_DRAIN_MAX_PCT);
        assert_eq!(drain_battery(0.01, 1.0), 0.0);
    }

    #[test]
    fn low_battery_flips_device_status() {
        assert_eq!(device_status(80.0), "ok");
        assert_eq!(device_status(15.0), "ok");
        assert_eq!(device_status(14.9), "low_battery");
    }
}
