//! Root-level liveness probe.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// `ok` when the database answers, `degraded` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    pub import: ImportLimits,
}

/// Import tuning the running instance was started with.
#[derive(Debug, Serialize)]
pub struct ImportLimits {
    pub max_workers: usize,
    pub batch_size: usize,
    pub max_upload_bytes: usize,
}

/// GET /health
///
/// Answers 503 while the database is unreachable.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let db_healthy = match roster_db::health_check(&state.pool).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };

    let (status_code, status) = if db_healthy {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    let config = &state.config;
    let report = HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        import: ImportLimits {
            max_workers: config.import_max_workers,
            batch_size: config.import_batch_size,
            max_upload_bytes: config.max_upload_bytes,
        },
    };
    (status_code, Json(report))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
