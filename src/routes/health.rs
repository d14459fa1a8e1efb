use axum::http::StatusCode;

/// Liveness probe
///
/// Returns 200 OK while the service is up. Not rate-limited, so orchestrator
/// probes never trip the governor.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "health"
)]
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
