// handlers/protected/mod.rs - Protected handlers (JWT cookie required)
//
// Routed behind `authenticate` and `GateChain::authenticated()`; every handler
// here can take `Identity` as an extractor.
pub mod session;

pub use session::{logout, status};
