pub mod privilege_service;
pub mod user_service;

pub use privilege_service::{PrivilegeService, ToggleOutcome};
pub use user_service::{AccountError, Login, Registration, UserService};
