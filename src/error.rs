// HTTP API Error Types
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};

use crate::auth::CredentialError;
use crate::database::StoreError;
use crate::gate::GateDenial;
use crate::middleware::rate_limit::AdmissionError;
use crate::services::AccountError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized (credential missing, invalid or expired)
    Unauthorized(String),

    // 401 Unauthorized (credential fine, privilege missing)
    InsufficientPrivilege(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 418 I'm a teapot (supreme leader secret mismatch)
    ImATeapot(String),

    // 422 Unprocessable Entity (body could not be decoded)
    UnprocessableEntity(String),

    // 429 Too Many Requests
    TooManyRequests {
        message: String,
        retry_after_secs: u64,
    },

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::InsufficientPrivilege(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::ImATeapot(_) => 418,
            ApiError::UnprocessableEntity(_) => 422,
            ApiError::TooManyRequests { .. } => 429,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::InsufficientPrivilege(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::ImATeapot(msg) => msg,
            ApiError::UnprocessableEntity(msg) => msg,
            ApiError::TooManyRequests { message, .. } => message,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        match self {
            ApiError::TooManyRequests {
                message,
                retry_after_secs,
            } => json!({
                "error": true,
                "message": message,
                "code": self.error_code(),
                "retry_after_secs": retry_after_secs
            }),
            _ => json!({
                "error": true,
                "message": self.message(),
                "code": self.error_code()
            }),
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::InsufficientPrivilege(_) => "INSUFFICIENT_PRIVILEGE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::ImATeapot(_) => "INVALID_SECRET",
            ApiError::UnprocessableEntity(_) => "INVALID_JSON",
            ApiError::TooManyRequests { .. } => "TOO_MANY_REQUESTS",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn insufficient_privilege(message: impl Into<String>) -> Self {
        ApiError::InsufficientPrivilege(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn teapot(message: impl Into<String>) -> Self {
        ApiError::ImATeapot(message.into())
    }

    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        ApiError::UnprocessableEntity(message.into())
    }

    pub fn too_many_requests(message: impl Into<String>, retry_after_secs: u64) -> Self {
        ApiError::TooManyRequests {
            message: message.into(),
            retry_after_secs,
        }
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert domain error types to ApiError
impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::MissingCredential => {
                ApiError::unauthorized("Missing or invalid JWT cookie")
            }
            CredentialError::InvalidCredential(_) => ApiError::unauthorized("Invalid JWT token"),
            CredentialError::ExpiredCredential => ApiError::unauthorized("Expired JWT token"),
            CredentialError::Signing(msg) => {
                tracing::error!("Credential signing error: {}", msg);
                ApiError::internal_server_error("Failed to issue credential")
            }
        }
    }
}

impl From<GateDenial> for ApiError {
    fn from(denial: GateDenial) -> Self {
        let reason = denial.to_string();
        match denial {
            GateDenial::Unauthenticated => ApiError::unauthorized(reason),
            GateDenial::InsufficientPrivilege => ApiError::insufficient_privilege(reason),
            GateDenial::PrivilegeLookupFailed => ApiError::service_unavailable(reason),
            GateDenial::InvalidSecret => ApiError::teapot(reason),
            GateDenial::MalformedSecretBody(_) => ApiError::unprocessable_entity(reason),
        }
    }
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        match err {
            AdmissionError::RateLimited { retry_after } => {
                // Round up so clients never retry inside the window
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                ApiError::too_many_requests(err.to_string(), secs.max(1))
            }
            AdmissionError::UnknownOrigin => ApiError::bad_request(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::not_found("Record not found"),
            StoreError::Conflict(msg) => ApiError::conflict(msg),
            StoreError::Closed => ApiError::service_unavailable("Database is shutting down"),
            StoreError::Unavailable(msg) => {
                tracing::error!("Database unavailable: {}", msg);
                ApiError::service_unavailable("Database temporarily unavailable")
            }
            StoreError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::MissingField(_) | AccountError::PasswordTooLong => {
                ApiError::bad_request(err.to_string())
            }
            AccountError::InvalidCredentials => ApiError::unauthorized(err.to_string()),
            AccountError::Hashing(msg) => {
                tracing::error!("Password hashing error: {}", msg);
                ApiError::internal_server_error("Failed to process password")
            }
            AccountError::Store(store) => store.into(),
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.to_json())).into_response();
        if let ApiError::TooManyRequests {
            retry_after_secs, ..
        } = &self
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn credential_and_privilege_denials_share_status_but_not_code() {
        let credential: ApiError = CredentialError::ExpiredCredential.into();
        let privilege: ApiError = GateDenial::InsufficientPrivilege.into();
        assert_eq!(credential.status_code(), 401);
        assert_eq!(privilege.status_code(), 401);
        assert_ne!(credential.error_code(), privilege.error_code());
    }

    #[test]
    fn secret_mismatch_is_a_teapot() {
        let err: ApiError = GateDenial::InvalidSecret.into();
        assert_eq!(err.status_code(), 418);
    }

    #[test]
    fn account_errors_map_to_client_statuses() {
        let missing: ApiError = AccountError::MissingField("email").into();
        assert_eq!(missing.status_code(), 400);
        assert_eq!(missing.message(), "email is required");

        let login: ApiError = AccountError::InvalidCredentials.into();
        assert_eq!(login.status_code(), 401);

        let taken: ApiError = AccountError::Store(StoreError::Conflict("taken".into())).into();
        assert_eq!(taken.status_code(), 409);
    }

    #[test]
    fn retry_after_rounds_up() {
        let err: ApiError = AdmissionError::RateLimited {
            retry_after: Duration::from_millis(1500),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
