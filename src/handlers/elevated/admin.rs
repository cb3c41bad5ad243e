use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::Identity;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /v1/admin/overview - Administrator landing data
///
/// Only reachable after the administrator gate has seen a row for the caller.
pub async fn overview(State(state): State<AppState>, identity: Identity) -> ApiResult<Value> {
    let record = state.privileges.get_admin(identity.id).await?;

    Ok(ApiResponse::success(json!({
        "user": identity,
        "admin_since": record.created_at,
        "lifecycle": state.lifecycle.current(),
    })))
}
