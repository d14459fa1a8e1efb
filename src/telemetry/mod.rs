pub mod simulator;

use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::config::Config;
use crate::entity::stations;
use crate::error::AppResult;

pub use simulator::SimulatedTelemetry;

/// A live reading ready for insertion, before an id is assigned.
#[derive(Debug, Clone)]
pub struct LiveReadingDraft {
    pub station_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub level_m_bgl: f64,
    pub recharge_rate: f64,
    pub battery_pct: f64,
    pub device_status: String,
}

/// Producer of live readings for one station per sampling tick.
///
/// The built-in [`SimulatedTelemetry`] stands in for field hardware; a real
/// datalogger gateway plugs in behind the same trait. Returning `Ok(None)`
/// skips the station for this tick without failing the batch.
pub trait TelemetrySource {
    fn sample(
        &self,
        db: &DatabaseConnection,
        config: &Config,
        station: &stations::Model,
    ) -> impl Future<Output = AppResult<Option<LiveReadingDraft>>> + Send;
}
