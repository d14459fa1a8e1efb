use std::env;

#[derive(Debug, Clone)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Weather API (Open-Meteo)
    pub weather_base_url: String,
    pub weather_timeout_seconds: u64,
    pub weather_cache_ttl_seconds: u64,

    // Forecasting
    pub models_dir: String,
    pub forecast_interval_seconds: u64,
    pub forecast_alert_role: String,

    // Telemetry
    pub telemetry_interval_seconds: u64,
    pub telemetry_retention_hours: i64,
    pub live_freshness_seconds: i64,

    // Recharge estimation
    pub specific_yield: f64,
    pub recharge_window_days: i64,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Rate limiting
    pub disable_rate_limiting: bool,
    pub rate_limit_metadata_per_second: u64,
    pub rate_limit_metadata_burst: u32,
    pub rate_limit_data_per_second: u64,
    pub rate_limit_data_burst: u32,

    // Application metadata
    pub deployment: Deployment,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,

            // Weather API
            weather_base_url: env::var("WEATHER_BASE_URL")
                .unwrap_or_else(|_| "https://api.open-meteo.com/v1".to_string()),
            weather_timeout_seconds: env::var("WEATHER_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            weather_cache_ttl_seconds: env::var("WEATHER_CACHE_TTL_SECONDS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .unwrap_or(600),

            // Forecasting
            models_dir: env::var("MODELS_DIR").unwrap_or_else(|_| "models".to_string()),
            forecast_interval_seconds: env::var("FORECAST_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .unwrap_or(900),
            forecast_alert_role: env::var("FORECAST_ALERT_ROLE")
                .unwrap_or_else(|_| "policymaker".to_string()),

            // Telemetry
            telemetry_interval_seconds: env::var("TELEMETRY_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap_or(300),
            telemetry_retention_hours: env::var("TELEMETRY_RETENTION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .unwrap_or(24),
            live_freshness_seconds: env::var("LIVE_FRESHNESS_SECONDS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),

            // Recharge estimation
            specific_yield: env::var("SPECIFIC_YIELD")
                .unwrap_or_else(|_| "0.1".to_string())
                .parse()
                .unwrap_or(0.1),
            recharge_window_days: env::var("RECHARGE_WINDOW_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),

            // API settings
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),

            // Rate limiting
            disable_rate_limiting: env::var("DISABLE_RATE_LIMITING")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            rate_limit_metadata_per_second: env::var("RATE_LIMIT_METADATA_PER_SECOND")
                .unwrap_or_else(|_| "1".to_string())
                .parse()
                .unwrap_or(1),
            rate_limit_metadata_burst: env::var("RATE_LIMIT_METADATA_BURST")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            rate_limit_data_per_second: env::var("RATE_LIMIT_DATA_PER_SECOND")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            rate_limit_data_burst: env::var("RATE_LIMIT_DATA_BURST")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
