use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::Config;
use crate::forecast::Forecaster;
use crate::weather::WeatherClient;

/// Shared application state, cloned into every handler and background job.
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub weather: Arc<WeatherClient>,
    pub forecaster: Arc<Forecaster>,
}

impl AppState {
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        config: Arc<Config>,
        weather: Arc<WeatherClient>,
        forecaster: Arc<Forecaster>,
    ) -> Self {
        Self {
            db,
            config,
            weather,
            forecaster,
        }
    }
}
