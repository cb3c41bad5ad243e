use axum::{body::Bytes, extract::State};

use super::{decode_json, signed_in};
use crate::app::AppState;
use crate::database::UserRecord;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{Login, UserService};

/// POST /v1/login - Exchange a username and password for a `jwt` cookie
///
/// ```json
/// { "username": "bob", "password": "..." }
/// ```
///
/// Unknown users and wrong passwords both get 401 `invalid credentials`.
pub async fn login(State(state): State<AppState>, body: Bytes) -> ApiResult<UserRecord> {
    let login: Login = decode_json(&body)?;
    let service = UserService::new(state.users.clone(), state.config.security.bcrypt_cost);

    let user = service.authenticate(login).await?;
    signed_in(&state.verifier, user, ApiResponse::success)
}
