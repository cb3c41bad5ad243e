use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Extensions},
};
use serde::Serialize;
use thiserror::Error;

use super::credential::ClaimSet;
use crate::error::ApiError;

/// Authenticated principal for the lifetime of one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub username: String,
}

impl From<ClaimSet> for Identity {
    fn from(claims: ClaimSet) -> Self {
        Self {
            id: claims.id,
            email: claims.email,
            username: claims.username,
        }
    }
}

/// Private extension key. Only this module can insert or read it, so no
/// other layer can plant or shadow an identity.
#[derive(Clone)]
struct VerifiedIdentity(Identity);

#[derive(Debug, Error)]
#[error("identity already established for this request")]
pub struct AlreadyAttached;

/// Store the verified identity on the request. Refuses to overwrite.
pub fn attach(extensions: &mut Extensions, identity: Identity) -> Result<(), AlreadyAttached> {
    if extensions.get::<VerifiedIdentity>().is_some() {
        return Err(AlreadyAttached);
    }
    extensions.insert(VerifiedIdentity(identity));
    Ok(())
}

/// The identity attached to this request, if any
pub fn retrieve(extensions: &Extensions) -> Option<&Identity> {
    extensions.get::<VerifiedIdentity>().map(|v| &v.0)
}

/// Handlers take `Identity` as an extractor; a request that never passed
/// credential verification is rejected instead of seeing a default value.
#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        retrieve(&parts.extensions)
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
