use axum::http::{header, HeaderValue};
use serde_json::{json, Value};

use crate::auth::Identity;
use crate::middleware::{ApiResponse, ApiResult};

/// Expires the credential cookie immediately
const CLEAR_CREDENTIAL: &str = "jwt=; Path=/; Max-Age=0; HttpOnly";

/// GET /v1/status - Echo the authenticated identity
///
/// ```json
/// { "success": true, "data": { "id": 7, "email": "bob@example.com", "username": "bob" } }
/// ```
pub async fn status(identity: Identity) -> ApiResult<Identity> {
    Ok(ApiResponse::success(identity))
}

/// GET /v1/logout - Clear the `jwt` cookie
pub async fn logout(identity: Identity) -> ApiResult<Value> {
    tracing::info!(user_id = identity.id, "user logged out");
    Ok(ApiResponse::success(json!({ "message": "Logged out" }))
        .header(header::SET_COOKIE, HeaderValue::from_static(CLEAR_CREDENTIAL)))
}
