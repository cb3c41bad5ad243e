// handlers/public/auth/mod.rs - Account handlers that hand out the `jwt` cookie
//
// register → create the account, then sign it in
// login    → check the password, then sign it in
pub mod session;
pub mod user;

pub use session::login;
pub use user::register;

use axum::{
    body::Bytes,
    http::{header, HeaderValue},
};
use serde::de::DeserializeOwned;

use crate::auth::{CredentialVerifier, Identity};
use crate::database::UserRecord;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

fn decode_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid json: {}", e)))
}

/// Issue a credential for `user` and attach it as the `jwt` cookie
fn signed_in(
    verifier: &CredentialVerifier,
    user: UserRecord,
    response: impl FnOnce(UserRecord) -> ApiResponse<UserRecord>,
) -> Result<ApiResponse<UserRecord>, ApiError> {
    let token = verifier.issue(&Identity {
        id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
    })?;
    let cookie = format!(
        "jwt={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        token,
        verifier.ttl().num_seconds()
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|_| ApiError::internal_server_error("Failed to issue credential"))?;

    Ok(response(user).header(header::SET_COOKIE, cookie))
}
