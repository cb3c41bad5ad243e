// handlers/elevated/mod.rs - Elevated handlers (privilege gates required)
//
// admin   → authenticated + administrator
// supreme → authenticated + supreme leader secret
pub mod admin;
pub mod supreme;

pub use admin::overview;
pub use supreme::make_break;
