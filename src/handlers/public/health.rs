use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;
use crate::lifecycle::LifecycleState;

/// GET /v1/health - Liveness of the process and the shared connection
///
/// 200 only while the lifecycle is `serving` and the database answers a ping;
/// 503 otherwise, so load balancers stop routing during shutdown.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let lifecycle = state.lifecycle.current();
    let database = state.privileges.ping().await;

    match (lifecycle, database) {
        (LifecycleState::Serving, Ok(())) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "lifecycle": lifecycle,
                    "database": "ok"
                }
            })),
        ),
        (lifecycle, database) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "service unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "lifecycle": lifecycle,
                    "database": match database {
                        Ok(()) => "ok".to_string(),
                        Err(e) => e.to_string(),
                    }
                }
            })),
        ),
    }
}
