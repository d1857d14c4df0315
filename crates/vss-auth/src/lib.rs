#![forbid(unsafe_code)]

//! **vss-auth** – capability-token verification for the VSS signal server.
//!
//! Defines the wire claim set and the two traits used across the workspace –
//! [`CapabilityToken`] and [`TokenValidator`] – plus RS256 (default) and
//! HS256 implementations. Both share the same claim shape: a subject and an
//! ordered map of path-glob → rights (`"r"`/`"w"`/`"rw"`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vss_types::{Channel, Claims as DecodedClaims, PermissionGrant};

/// Wire claim set embedded in every capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject – the authenticated user or agent identifier.
    pub sub: String,
    /// Path-glob → rights map, e.g. `{"Vehicle.Cabin.*": "rw"}`.
    pub permissions: HashMap<String, String>,
    /// Issued-at timestamp (seconds since Unix epoch).
    pub iat: i64,
    /// Absolute expiry timestamp (seconds since Unix epoch).
    pub exp: i64,
    /// Unique token identifier (UUIDv4) for replay protection.
    pub jti: String,
}

impl Claims {
    /// Lower the wire claim set into the crate-agnostic shape `vss-access`
    /// and `vss-kernel` consume.
    pub fn into_decoded(self) -> DecodedClaims {
        let permissions = self
            .permissions
            .into_iter()
            .map(|(pattern, rights)| PermissionGrant {
                can_read: rights.contains('r'),
                can_write: rights.contains('w'),
                pattern,
            })
            .collect();
        DecodedClaims {
            subject: self.sub,
            permissions,
            issued_at: self.iat,
            expires_at: self.exp,
        }
    }
}

/// Whether `channel`'s token is still within its validity window as of
/// `now_ms`. A channel with no recorded expiry (anonymous, or internal
/// startup privilege) never expires. Exposed for a persistent-connection
/// transport to recheck a long-lived channel between token verifications;
/// the line-oriented driver in `apps/vss-server` re-validates the raw
/// token on every request instead, which subsumes this check.
pub fn is_still_valid(channel: &Channel, now_ms: i64) -> bool {
    match channel.token_expiry_ms {
        Some(exp) => now_ms < exp,
        None => true,
    }
}

/// Minimal in-crate error type.
#[derive(Debug)]
pub struct Error {
    msg: String,
}

impl Error {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.msg.fmt(f)
    }
}

impl std::error::Error for Error {}

/// Crate result helper.
pub type Result<T> = std::result::Result<T, Error>;

//─────────────────────────────
//  Trait definitions
//─────────────────────────────

/// Abstract behaviour common to all capability token formats.
#[async_trait]
pub trait CapabilityToken: Sized + Send + Sync {
    /// Mint a new token from raw `claims` using the provided signing key.
    async fn mint(claims: &Claims, key: &[u8]) -> Result<Self>;

    /// Return the serialized wire representation (JWT string).
    fn as_str(&self) -> &str;
}

/// Verifier trait used by `vss-kernel` before executing a command.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    /// Verify authenticity and expiry, returning the decoded claim set.
    async fn validate(&self, raw: &str) -> Result<DecodedClaims>;

    /// Swap the verification key at runtime without rebuilding the
    /// validator, so a key rollover doesn't require dropping live
    /// connections.
    fn update_key(&self, new_key: &[u8]) -> Result<()>;
}

//─────────────────────────────
//  RS256 JWT implementation (default)
//─────────────────────────────

pub mod rs256 {
    use super::{Claims, DecodedClaims, Error, Result, TokenValidator};
    use async_trait::async_trait;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use std::sync::RwLock;

    /// RS256 JWT validator. Holds the current public key behind a
    /// `RwLock` so [`update_key`](TokenValidator::update_key) can swap it in
    /// place while other threads are mid-verification.
    pub struct JwtRs256Validator {
        key: RwLock<DecodingKey>,
        validation: Validation,
    }

    impl JwtRs256Validator {
        /// Build a validator from a PEM-encoded RSA public key.
        pub fn from_pem(public_key_pem: &[u8]) -> Result<Self> {
            let key = DecodingKey::from_rsa_pem(public_key_pem)
                .map_err(|e| Error::new(e.to_string()))?;
            let mut validation = Validation::new(Algorithm::RS256);
            validation.validate_exp = true;
            Ok(Self {
                key: RwLock::new(key),
                validation,
            })
        }
    }

    #[async_trait]
    impl TokenValidator for JwtRs256Validator {
        async fn validate(&self, raw: &str) -> Result<DecodedClaims> {
            let key = self.key.read().expect("key lock poisoned");
            let data = decode::<Claims>(raw, &key, &self.validation)
                .map_err(|e| Error::new(e.to_string()))?;
            Ok(data.claims.into_decoded())
        }

        fn update_key(&self, new_key_pem: &[u8]) -> Result<()> {
            let new_key =
                DecodingKey::from_rsa_pem(new_key_pem).map_err(|e| Error::new(e.to_string()))?;
            *self.key.write().expect("key lock poisoned") = new_key;
            Ok(())
        }
    }
}

//─────────────────────────────
//  HS256 JWT implementation (secondary)
//─────────────────────────────

pub mod hs256 {
    use super::{Claims, CapabilityToken, DecodedClaims, Error, Result, TokenValidator};
    use async_trait::async_trait;
    use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
    use std::sync::RwLock;
    use std::time::{SystemTime, UNIX_EPOCH};
    use std::collections::HashMap;
    use uuid::Uuid;

    /// Concrete HS256 capability token implementation, kept for deployments
    /// without an RSA key pair on hand.
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct JwtHs256Token {
        token: String,
    }

    impl JwtHs256Token {
        pub fn as_str(&self) -> &str {
            &self.token
        }
    }

    #[async_trait]
    impl CapabilityToken for JwtHs256Token {
        async fn mint(claims: &Claims, key: &[u8]) -> Result<Self> {
            let header = Header::new(Algorithm::HS256);
            let jwt = encode(&header, claims, &EncodingKey::from_secret(key))
                .map_err(|e| Error::new(e.to_string()))?;
            Ok(Self { token: jwt })
        }

        fn as_str(&self) -> &str {
            &self.token
        }
    }

    /// Build a claim set with the current timestamp and a fresh `jti`.
    pub fn build_claims(
        subject: &str,
        permissions: HashMap<String, String>,
        ttl_secs: i64,
    ) -> Result<Claims> {
        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| Error::new(e.to_string()))?
            .as_secs() as i64;
        Ok(Claims {
            sub: subject.to_owned(),
            permissions,
            iat: issued_at,
            exp: issued_at + ttl_secs,
            jti: Uuid::new_v4().to_string(),
        })
    }

    /// HS256 JWT validator with the same runtime key-swap support as
    /// [`super::rs256::JwtRs256Validator`].
    pub struct JwtHs256Validator {
        secret: RwLock<Vec<u8>>,
        validation: Validation,
    }

    impl JwtHs256Validator {
        pub fn new(secret: impl Into<Vec<u8>>) -> Self {
            let mut validation = Validation::new(Algorithm::HS256);
            validation.validate_exp = true;
            Self {
                secret: RwLock::new(secret.into()),
                validation,
            }
        }
    }

    #[async_trait]
    impl TokenValidator for JwtHs256Validator {
        async fn validate(&self, raw: &str) -> Result<DecodedClaims> {
            let secret = self.secret.read().expect("secret lock poisoned");
            let data = decode::<Claims>(raw, &DecodingKey::from_secret(&secret), &self.validation)
                .map_err(|e| Error::new(e.to_string()))?;
            Ok(data.claims.into_decoded())
        }

        fn update_key(&self, new_secret: &[u8]) -> Result<()> {
            *self.secret.write().expect("secret lock poisoned") = new_secret.to_vec();
            Ok(())
        }
    }
}

pub use rs256::JwtRs256Validator;
pub use hs256::{JwtHs256Token, JwtHs256Validator};

#[cfg(test)]
mod tests {
    use super::*;
    use hs256::{build_claims, JwtHs256Token, JwtHs256Validator};
    use std::collections::HashMap;

    #[tokio::test]
    async fn hs256_round_trip_decodes_permissions() {
        let mut perms = HashMap::new();
        perms.insert("Vehicle.Cabin.*".to_owned(), "rw".to_owned());
        let claims = build_claims("driver-1", perms, 3600).unwrap();
        let token = JwtHs256Token::mint(&claims, b"test-secret").await.unwrap();

        let validator = JwtHs256Validator::new(b"test-secret".to_vec());
        let decoded = validator.validate(token.as_str()).await.unwrap();

        assert_eq!(decoded.subject, "driver-1");
        assert_eq!(decoded.permissions.len(), 1);
        assert!(decoded.permissions[0].can_read);
        assert!(decoded.permissions[0].can_write);
    }

    #[test]
    fn channel_with_no_expiry_never_expires() {
        let channel = vss_types::Channel::anonymous();
        assert!(is_still_valid(&channel, i64::MAX));
    }

    #[test]
    fn channel_past_its_expiry_is_invalid() {
        let mut channel = vss_types::Channel::anonymous();
        channel.token_expiry_ms = Some(1_000);
        assert!(is_still_valid(&channel, 999));
        assert!(!is_still_valid(&channel, 1_000));
    }

    #[tokio::test]
    async fn hs256_rejects_after_key_rotation() {
        let claims = build_claims("driver-1", HashMap::new(), 3600).unwrap();
        let token = JwtHs256Token::mint(&claims, b"old-secret").await.unwrap();

        let validator = JwtHs256Validator::new(b"old-secret".to_vec());
        assert!(validator.validate(token.as_str()).await.is_ok());

        validator.update_key(b"new-secret").unwrap();
        assert!(validator.validate(token.as_str()).await.is_err());
    }
}
