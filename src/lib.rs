pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod observability;
pub mod services;

pub use app::{build_router, AppState};
pub use error::ApiError;
