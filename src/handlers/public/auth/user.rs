use axum::{body::Bytes, extract::State};

use super::{decode_json, signed_in};
use crate::app::AppState;
use crate::database::UserRecord;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{Registration, UserService};

/// POST /v1/register - Create an account and sign it in
///
/// ```json
/// { "email": "bob@example.com", "username": "bob", "password": "..." }
/// ```
///
/// 201 with the new user and a `jwt` cookie. 409 when the email or username
/// is taken.
pub async fn register(State(state): State<AppState>, body: Bytes) -> ApiResult<UserRecord> {
    let registration: Registration = decode_json(&body)?;
    let service = UserService::new(state.users.clone(), state.config.security.bcrypt_cost);

    let user = service.register(registration).await?;
    signed_in(&state.verifier, user, ApiResponse::created)
}
