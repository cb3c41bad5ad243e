// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Rate admission still applies; nothing here reads an identity.
pub mod auth;
pub mod health;

pub use auth::{login, register};
pub use health::health;
