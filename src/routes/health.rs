use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: ServiceHealth,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub database: &'static str,
    pub redis: &'static str,
}

/// Overall status and HTTP code from the individual checks.
///
/// The database is critical; Redis only degrades the service.
fn overall(db_ok: bool, redis_ok: bool) -> (&'static str, StatusCode) {
    match (db_ok, redis_ok) {
        (true, true) => ("healthy", StatusCode::OK),
        (true, false) => ("degraded", StatusCode::OK),
        (false, _) => ("unhealthy", StatusCode::SERVICE_UNAVAILABLE),
    }
}

fn label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// GET /health (public)
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (db_ok, redis_result) = tokio::join!(db::health_check(&state.db), state.cache.health_check());
    let redis_ok = redis_result.is_ok();

    let (status, code) = overall(db_ok, redis_ok);
    if code != StatusCode::OK {
        tracing::error!("Health check failed: database unreachable");
    }

    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            services: ServiceHealth {
                database: label(db_ok),
                redis: label(redis_ok),
            },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_outage_is_unavailable() {
        assert_eq!(overall(false, true), ("unhealthy", StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(overall(false, false).1, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn redis_outage_only_degrades() {
        assert_eq!(overall(true, false), ("degraded", StatusCode::OK));
        assert_eq!(overall(true, true), ("healthy", StatusCode::OK));
    }
}
