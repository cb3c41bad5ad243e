//! Authorization gate chain.
//!
//! A route's chain is an ordered list of gates evaluated after credential
//! verification. Every gate must pass; the first denial becomes the response
//! and later gates never run.

pub mod admin;
pub mod supreme;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::Extensions,
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::warn;

use crate::auth::{identity, Identity};
use crate::error::ApiError;

pub use admin::AdministratorGate;
pub use supreme::SupremeSecretGate;

/// Default cap on buffered bodies for gates that read them
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateDenial {
    #[error("authentication required")]
    Unauthenticated,

    #[error("administrator privilege required")]
    InsufficientPrivilege,

    #[error("privilege lookup failed")]
    PrivilegeLookupFailed,

    #[error("invalid supreme leader secret")]
    InvalidSecret,

    #[error("invalid json: {0}")]
    MalformedSecretBody(String),
}

/// What a gate can see of the request
pub struct GateScope<'a> {
    extensions: &'a Extensions,
    body: &'a Bytes,
}

impl<'a> GateScope<'a> {
    pub fn new(extensions: &'a Extensions, body: &'a Bytes) -> Self {
        Self { extensions, body }
    }

    pub fn identity(&self) -> Option<&'a Identity> {
        identity::retrieve(self.extensions)
    }

    /// Empty unless some gate in the chain reads the body
    pub fn body(&self) -> &'a Bytes {
        self.body
    }
}

#[async_trait]
pub trait Gate: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the chain must buffer the body before this gate runs
    fn reads_body(&self) -> bool {
        false
    }

    async fn check(&self, scope: &GateScope<'_>) -> Result<(), GateDenial>;
}

/// Passes when credential verification attached an identity
pub struct AuthenticatedGate;

#[async_trait]
impl Gate for AuthenticatedGate {
    fn name(&self) -> &'static str {
        "authenticated"
    }

    async fn check(&self, scope: &GateScope<'_>) -> Result<(), GateDenial> {
        scope
            .identity()
            .map(|_| ())
            .ok_or(GateDenial::Unauthenticated)
    }
}

#[derive(Clone)]
pub struct GateChain {
    gates: Vec<Arc<dyn Gate>>,
    body_limit: usize,
}

impl GateChain {
    /// Every chain starts with the authenticated gate
    pub fn authenticated() -> Self {
        Self {
            gates: vec![Arc::new(AuthenticatedGate)],
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    pub fn then<G: Gate + 'static>(mut self, gate: G) -> Self {
        self.gates.push(Arc::new(gate));
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn reads_body(&self) -> bool {
        self.gates.iter().any(|g| g.reads_body())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.gates.iter().map(|g| g.name()).collect()
    }

    /// Sequential AND over the gates, stopping at the first denial
    pub async fn evaluate(&self, scope: &GateScope<'_>) -> Result<(), GateDenial> {
        for gate in &self.gates {
            if let Err(denial) = gate.check(scope).await {
                warn!(
                    gate = gate.name(),
                    user_id = scope.identity().map(|i| i.id),
                    reason = %denial,
                    "gate denied request"
                );
                return Err(denial);
            }
        }
        Ok(())
    }
}

/// Middleware running a route's gate chain
pub async fn enforce(State(chain): State<GateChain>, request: Request, next: Next) -> Response {
    if !chain.reads_body() {
        let empty = Bytes::new();
        let scope = GateScope::new(request.extensions(), &empty);
        if let Err(denial) = chain.evaluate(&scope).await {
            return ApiError::from(denial).into_response();
        }
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, chain.body_limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return ApiError::unprocessable_entity(format!("invalid json: {}", err))
                .into_response()
        }
    };

    let scope = GateScope::new(&parts.extensions, &bytes);
    if let Err(denial) = chain.evaluate(&scope).await {
        return ApiError::from(denial).into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
