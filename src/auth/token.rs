//! Bearer token issuing and verification.
//!
//! Access and refresh tokens are HS256 JWTs carrying the user id as `sub`
//! and a random `jti`, so two tokens issued within the same second differ.
//! The two classes are signed with distinct secrets, so a leaked
//! access-signing key cannot mint refresh tokens and vice versa.
//! Verification is pure: it never consults the credential store.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ulid::Ulid;
use uuid::Uuid;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 120;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("invalid subject")]
    Subject,
    #[error("failed to sign token")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Which secret a token is signed and verified with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signing secrets and lifetimes for both token classes.
#[derive(Clone, Debug)]
pub struct TokenConfig {
    access_secret: SecretString,
    refresh_secret: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl TokenConfig {
    #[must_use]
    pub fn new(access_secret: SecretString, refresh_secret: SecretString) -> Self {
        Self {
            access_secret,
            refresh_secret,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    fn secret(&self, kind: TokenKind) -> &SecretString {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TokenIssuer {
    config: TokenConfig,
}

impl TokenIssuer {
    #[must_use]
    pub fn new(config: TokenConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Short-lived credential presented on every protected request.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue_access(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(user_id, TokenKind::Access, self.config.access_ttl_seconds)
    }

    /// Long-lived credential exchanged for new access tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue_refresh(&self, user_id: Uuid) -> Result<String, TokenError> {
        self.issue(user_id, TokenKind::Refresh, self.config.refresh_ttl_seconds)
    }

    /// Check signature, structure and expiry; returns the embedded user id.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Expired`] past `exp`, [`TokenError::Invalid`] on a
    /// bad signature or malformed token, [`TokenError::Subject`] when `sub`
    /// is not a user id.
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Uuid, TokenError> {
        let key = DecodingKey::from_secret(self.config.secret(kind).expose_secret().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &key, &validation).map_err(|err| {
            if matches!(err.kind(), ErrorKind::ExpiredSignature) {
                TokenError::Expired
            } else {
                TokenError::Invalid(err)
            }
        })?;

        Uuid::parse_str(&data.claims.sub).map_err(|_| TokenError::Subject)
    }

    fn issue(&self, user_id: Uuid, kind: TokenKind, ttl_seconds: i64) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Ulid::new().to_string(),
            iat: now,
            exp: now + ttl_seconds,
        };
        let key = EncodingKey::from_secret(self.config.secret(kind).expose_secret().as_bytes());
        encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(TokenError::Signing)
    }
}
