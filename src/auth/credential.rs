use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

use super::identity::Identity;

/// Verified payload of a `jwt` credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSet {
    #[serde(deserialize_with = "integral_i64")]
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(default, deserialize_with = "integral_i64")]
    pub iat: i64,
    #[serde(deserialize_with = "integral_i64")]
    pub exp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("no credential presented")]
    MissingCredential,

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("credential expired")]
    ExpiredCredential,

    #[error("credential signing failed: {0}")]
    Signing(String),
}

/// Signs and verifies HS256 credentials with a process-configured secret
pub struct CredentialVerifier {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl CredentialVerifier {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a credential for `identity`, valid for the configured ttl
    pub fn issue(&self, identity: &Identity) -> Result<String, CredentialError> {
        let now = Utc::now();
        let claims = ClaimSet {
            id: identity.id,
            email: identity.email.clone(),
            username: identity.username.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign an arbitrary claim set
    pub fn sign(&self, claims: &ClaimSet) -> Result<String, CredentialError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| CredentialError::Signing(e.to_string()))
    }

    /// Verify a presented credential and return its claims.
    ///
    /// Expiry is checked before the signature, so a stale token reports
    /// `ExpiredCredential` whether or not its signature is still good.
    pub fn verify(&self, token: Option<&str>) -> Result<ClaimSet, CredentialError> {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Err(CredentialError::MissingCredential),
        };

        let exp = peek_expiry(token)?;
        if exp < Utc::now().timestamp() {
            return Err(CredentialError::ExpiredCredential);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        decode::<ClaimSet>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => CredentialError::ExpiredCredential,
                _ => CredentialError::InvalidCredential(e.to_string()),
            })
    }
}

/// Read `exp` without trusting the token. Only used to classify rejections.
fn peek_expiry(token: &str) -> Result<i64, CredentialError> {
    #[derive(Deserialize)]
    struct Expiry {
        #[serde(deserialize_with = "integral_i64")]
        exp: i64,
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Expiry>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims.exp)
        .map_err(|e| CredentialError::InvalidCredential(e.to_string()))
}

/// Accept JSON integers, or floats with no fractional part that fit in i64.
/// Strings, booleans and fractional values are rejected.
fn integral_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(n) = number.as_i64() {
        return Ok(n);
    }
    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
        _ => Err(de::Error::custom(format!(
            "expected an integral number, got {}",
            number
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "unit-test-secret";

    fn verifier() -> CredentialVerifier {
        CredentialVerifier::new(SECRET, Duration::hours(1))
    }

    fn alice() -> Identity {
        Identity {
            id: 42,
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
        }
    }

    fn sign_raw(secret: &str, payload: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        Utc::now().timestamp() + 3600
    }

    #[test]
    fn issued_credentials_round_trip() {
        let v = verifier();
        let token = v.issue(&alice()).unwrap();
        let claims = v.verify(Some(&token)).unwrap();
        assert_eq!(Identity::from(claims), alice());
    }

    #[test]
    fn absent_or_blank_token_is_missing() {
        let v = verifier();
        assert_eq!(v.verify(None), Err(CredentialError::MissingCredential));
        assert_eq!(v.verify(Some("   ")), Err(CredentialError::MissingCredential));
    }

    #[test]
    fn garbage_is_invalid() {
        let result = verifier().verify(Some("not.a.jwt"));
        assert!(matches!(result, Err(CredentialError::InvalidCredential(_))));
    }

    #[test]
    fn wrong_signature_is_invalid() {
        let token = sign_raw(
            "another-secret",
            json!({"id": 1, "email": "a@b.c", "username": "a", "exp": future_exp()}),
        );
        let result = verifier().verify(Some(&token));
        assert!(matches!(result, Err(CredentialError::InvalidCredential(_))));
    }

    #[test]
    fn expired_is_reported_regardless_of_signature() {
        let past = Utc::now().timestamp() - 120;
        let payload = json!({"id": 1, "email": "a@b.c", "username": "a", "exp": past});

        let good = sign_raw(SECRET, payload.clone());
        let forged = sign_raw("another-secret", payload);

        let v = verifier();
        assert_eq!(v.verify(Some(&good)), Err(CredentialError::ExpiredCredential));
        assert_eq!(v.verify(Some(&forged)), Err(CredentialError::ExpiredCredential));
    }

    #[test]
    fn missing_claim_fields_are_invalid() {
        let v = verifier();
        for payload in [
            json!({"email": "a@b.c", "username": "a", "exp": future_exp()}),
            json!({"id": 1, "username": "a", "exp": future_exp()}),
            json!({"id": 1, "email": "a@b.c", "exp": future_exp()}),
            json!({"id": 1, "email": "a@b.c", "username": "a"}),
        ] {
            let token = sign_raw(SECRET, payload.clone());
            assert!(
                matches!(v.verify(Some(&token)), Err(CredentialError::InvalidCredential(_))),
                "payload should be rejected: {}",
                payload
            );
        }
    }

    #[test]
    fn wrongly_typed_claims_are_invalid() {
        let v = verifier();
        for payload in [
            json!({"id": "7", "email": "a@b.c", "username": "a", "exp": future_exp()}),
            json!({"id": 7.5, "email": "a@b.c", "username": "a", "exp": future_exp()}),
            json!({"id": true, "email": "a@b.c", "username": "a", "exp": future_exp()}),
            json!({"id": 7, "email": 12, "username": "a", "exp": future_exp()}),
            json!({"id": 7, "email": "a@b.c", "username": null, "exp": future_exp()}),
        ] {
            let token = sign_raw(SECRET, payload.clone());
            assert!(
                matches!(v.verify(Some(&token)), Err(CredentialError::InvalidCredential(_))),
                "payload should be rejected: {}",
                payload
            );
        }
    }

    #[test]
    fn integral_float_id_coerces() {
        let token = sign_raw(
            SECRET,
            json!({"id": 7.0, "email": "a@b.c", "username": "a", "exp": future_exp()}),
        );
        let claims = verifier().verify(Some(&token)).unwrap();
        assert_eq!(claims.id, 7);
    }
}
