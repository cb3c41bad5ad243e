use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{identity, CredentialVerifier, Identity};
use crate::error::ApiError;

/// Cookie carrying the signed credential
pub const CREDENTIAL_COOKIE: &str = "jwt";

/// Credential verification middleware.
///
/// Verifies the `jwt` cookie and attaches the resulting identity to the
/// request. Any failure ends the request with 401; nothing downstream runs.
pub async fn authenticate(
    State(verifier): State<Arc<CredentialVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = credential_cookie(request.headers());
    let claims = verifier.verify(token.as_deref())?;

    identity::attach(request.extensions_mut(), Identity::from(claims)).map_err(|e| {
        tracing::error!("{}", e);
        ApiError::internal_server_error("Identity already established")
    })?;

    Ok(next.run(request).await)
}

/// Value of the credential cookie across every `Cookie` header
fn credential_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CREDENTIAL_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
}
