use axum::extract::State;

use crate::app::AppState;
use crate::auth::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{PrivilegeService, ToggleOutcome};

/// POST /v1/supreme-leader/make-break - Toggle the caller's administrator row
///
/// Body: `{"secret_key": "..."}`, checked by the supreme secret gate before
/// this handler runs.
///
/// - not admin → 201 `"New Admin Added"`
/// - admin → 200 `"Removed Existing User"`
pub async fn make_break(
    State(state): State<AppState>,
    identity: Identity,
) -> ApiResult<&'static str> {
    let service = PrivilegeService::new(state.privileges.clone());

    match service.toggle_admin(identity.id).await? {
        ToggleOutcome::Granted => Ok(ApiResponse::created("New Admin Added")),
        ToggleOutcome::Revoked => Ok(ApiResponse::success("Removed Existing User")),
    }
}
