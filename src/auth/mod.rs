//! Credential verification and request identity.
//!
//! `credential` signs and verifies the `jwt` cookie payload; `identity` carries
//! the verified principal through the request's extensions.

pub mod credential;
pub mod identity;

pub use credential::{ClaimSet, CredentialError, CredentialVerifier};
pub use identity::Identity;
