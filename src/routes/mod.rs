pub mod alerts;
pub mod dashboard;
pub mod forecasts;
pub mod health;
pub mod live;
mod rate_limit;
pub mod readings;
pub mod reports;
pub mod stations;
pub mod thresholds;

use axum::{
    routing::{get, post, put},
    Router,
};
use sea_orm::{sea_query::Expr, Condition, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use uuid::Uuid;

use rate_limit::FallbackIpKeyExtractor;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;
use crate::entity::stations as stations_entity;
use crate::error::{AppError, AppResult};

/// Resolve a station by UUID or name (case-insensitive)
pub async fn resolve_station(
    db: &DatabaseConnection,
    id_or_name: &str,
) -> AppResult<stations_entity::Model> {
    // Try UUID first
    if let Ok(uuid) = id_or_name.parse::<Uuid>() {
        return stations_entity::Entity::find_by_id(uuid)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Station '{id_or_name}' not found")));
    }

    // Fall back to case-insensitive name lookup using LOWER()
    stations_entity::Entity::find()
        .filter(
            Condition::all().add(Expr::cust_with_values("LOWER(name) = LOWER($1)", [id_or_name])),
        )
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Station '{id_or_name}' not found")))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        stations::list_stations,
        stations::get_station,
        thresholds::get_station_thresholds,
        thresholds::put_thresholds,
        readings::get_station_readings,
        readings::get_station_trends,
        forecasts::predict_station,
        forecasts::list_predictions,
        alerts::get_station_alert,
        alerts::list_alerts,
        alerts::get_alert_history,
        alerts::resolve_alert,
        live::get_station_live,
        live::get_station_recharge,
        dashboard::get_dashboard,
        reports::reports_summary,
    ),
    components(
        schemas(
            stations::StationResponse,
            thresholds::ThresholdsResponse,
            thresholds::ThresholdUpsertRequest,
            thresholds::ThresholdUpsertResponse,
            readings::ReadingsResponse,
            readings::ReadingPoint,
            readings::TrendsResponse,
            readings::TrendPoint,
            readings::PredictionPoint,
            forecasts::PredictResponse,
            forecasts::StoredPrediction,
            alerts::StationAlertResponse,
            alerts::AlertsOverviewEntry,
            live::LiveResponse,
            live::LiveReadingResponse,
            live::RechargeResponse,
            dashboard::DashboardResponse,
            dashboard::FarmerDashboard,
            dashboard::PolicymakerDashboard,
            dashboard::PlannerDashboard,
            dashboard::StakeholderDashboard,
            dashboard::RegionalTrend,
            dashboard::AlertCount,
            dashboard::StationStatus,
            dashboard::StationRollup,
            dashboard::MonthlyAlertCount,
            reports::ReportsSummaryResponse,
            reports::StationSummary,
            crate::alerting::Classification,
            crate::alerting::Role,
            crate::alerting::AlertLevel,
            crate::alerting::ThresholdBands,
            crate::alerting::ThresholdSource,
            crate::alerting::ObservationKind,
            crate::forecast::ForecastSource,
            crate::entity::alerts::Model,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "stations", description = "Monitoring station metadata"),
        (name = "thresholds", description = "Per-role alert bands"),
        (name = "readings", description = "Historical water levels and trends"),
        (name = "forecasts", description = "Water level predictions"),
        (name = "alerts", description = "Alert classification and records"),
        (name = "live", description = "Live telemetry and recharge estimates"),
        (name = "dashboard", description = "Role-tailored aggregate views"),
        (name = "reports", description = "Cross-station reporting rollups"),
    ),
    info(
        title = "Aquifer DB API",
        description = "Groundwater monitoring, forecasting and alerting API",
        version = "0.1.0"
    )
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
    } else {
        tracing::info!(
            metadata_rate = %format!("{}/s burst {}", config.rate_limit_metadata_per_second, config.rate_limit_metadata_burst),
            data_rate = %format!("{}/s burst {}", config.rate_limit_data_per_second, config.rate_limit_data_burst),
            "Rate limiting configured"
        );
    }

    // Base routes without rate limiting
    let metadata_routes_base = Router::new()
        .route("/stations", get(stations::list_stations))
        .route("/stations/{station_id}", get(stations::get_station))
        .route(
            "/stations/{station_id}/thresholds",
            get(thresholds::get_station_thresholds),
        )
        .route("/thresholds", put(thresholds::put_thresholds));

    let data_routes_base = Router::new()
        .route(
            "/stations/{station_id}/readings",
            get(readings::get_station_readings),
        )
        .route(
            "/stations/{station_id}/trends",
            get(readings::get_station_trends),
        )
        .route(
            "/stations/{station_id}/predict",
            get(forecasts::predict_station),
        )
        .route(
            "/stations/{station_id}/alert",
            get(alerts::get_station_alert),
        )
        .route("/stations/{station_id}/live", get(live::get_station_live))
        .route(
            "/stations/{station_id}/recharge",
            get(live::get_station_recharge),
        )
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/{id}/history", get(alerts::get_alert_history))
        .route("/alerts/{id}/resolve", post(alerts::resolve_alert))
        .route("/predictions", get(forecasts::list_predictions))
        .route("/dashboard/{role}", get(dashboard::get_dashboard))
        .route("/reports/summary", get(reports::reports_summary));

    // Combine API routes, conditionally applying rate limiting
    let api_routes = if config.disable_rate_limiting {
        Router::new()
            .merge(metadata_routes_base)
            .merge(data_routes_base)
    } else {
        let metadata_limiter = GovernorConfigBuilder::default()
            .key_extractor(FallbackIpKeyExtractor)
            .per_second(config.rate_limit_metadata_per_second)
            .burst_size(config.rate_limit_metadata_burst)
            .finish()
            .expect("Failed to create metadata rate limiter");

        let data_limiter = GovernorConfigBuilder::default()
            .key_extractor(FallbackIpKeyExtractor)
            .per_second(config.rate_limit_data_per_second)
            .burst_size(config.rate_limit_data_burst)
            .finish()
            .expect("Failed to create data rate limiter");

        Router::new()
            .merge(metadata_routes_base.layer(GovernorLayer {
                config: Arc::new(metadata_limiter),
            }))
            .merge(data_routes_base.layer(GovernorLayer {
                config: Arc::new(data_limiter),
            }))
    }
    .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB body limit

    // Health check routes (NO rate limiting)
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    // Combine all routes
    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
