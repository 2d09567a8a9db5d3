//! Liveness probe

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use listings_api_types::ApiEnvelope;
use serde::Serialize;
use tracing::warn;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub database: &'static str,
    pub cache: &'static str,
    pub cache_reachable: bool,
}

/// `503` when the database is down. An unreachable cache only degrades the
/// report since reads fall through to the store.
pub async fn health(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let database = match &state.db {
        Some(db) => {
            db.health_check().await.map_err(|err| {
                ApiError::unavailable("Database unavailable", Some(err.to_string()))
            })?;
            "postgres"
        }
        None => "memory",
    };

    let cache_reachable = match state.cache.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "cache store unreachable during health check");
            false
        }
    };

    Ok(Json(ApiEnvelope::ok(HealthReport {
        status: if cache_reachable { "ok" } else { "degraded" },
        database,
        cache: state.cache.backend(),
        cache_reachable,
    })))
}
