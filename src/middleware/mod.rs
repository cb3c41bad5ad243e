pub mod auth;
pub mod rate_limit;
pub mod response;

pub use auth::{authenticate, CREDENTIAL_COOKIE};
pub use rate_limit::{admit_request, AdmissionError, AdmissionFilter};
pub use response::{ApiResponse, ApiResult};
