use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{Gate, GateDenial, GateScope};

#[derive(Debug, Deserialize)]
struct SecretBody {
    secret_key: String,
}

/// Passes when the JSON body carries the configured supreme leader secret
pub struct SupremeSecretGate {
    digest: [u8; 32],
}

impl SupremeSecretGate {
    pub fn new(secret: &str) -> Self {
        Self {
            digest: Sha256::digest(secret.as_bytes()).into(),
        }
    }

    /// Digests are fixed length, so only their contents drive the comparison
    fn matches(&self, supplied: &str) -> bool {
        let supplied: [u8; 32] = Sha256::digest(supplied.as_bytes()).into();
        supplied.as_slice().ct_eq(self.digest.as_slice()).into()
    }
}

#[async_trait]
impl Gate for SupremeSecretGate {
    fn name(&self) -> &'static str {
        "supreme_secret"
    }

    fn reads_body(&self) -> bool {
        true
    }

    async fn check(&self, scope: &GateScope<'_>) -> Result<(), GateDenial> {
        scope.identity().ok_or(GateDenial::Unauthenticated)?;

        let body: SecretBody = serde_json::from_slice(scope.body())
            .map_err(|e| GateDenial::MalformedSecretBody(e.to_string()))?;

        if self.matches(&body.secret_key) {
            Ok(())
        } else {
            Err(GateDenial::InvalidSecret)
        }
    }
}
