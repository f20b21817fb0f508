//! JWT signing and verification for the dual-token scheme.
//!
//! Access and refresh tokens are signed under two independent secrets with
//! independent expiry windows, so a leaked access secret cannot be used to
//! forge refresh tokens. A token signed under one secret fails signature
//! verification under the other; no type claim is needed.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Claims carried by both token kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (account UUID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Default access token duration: 5 minutes
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 5 * 60;

/// Default refresh token duration: 2 weeks
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 14 * 24 * 60 * 60;

/// One signing key pair plus its expiry window.
#[derive(Clone)]
struct TokenKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl TokenKey {
    fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }
}

/// A freshly signed token with its validity window.
#[derive(Debug, Clone)]
pub struct SignedToken {
    /// The JWT token string
    pub token: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Expiration timestamp (Unix seconds)
    pub expires_at: u64,
    /// Token duration in seconds
    pub duration: u64,
}

/// Configuration for JWT operations. Holds both key pairs; constructed once
/// at startup and shared behind an `Arc`.
#[derive(Clone)]
pub struct JwtConfig {
    access: TokenKey,
    refresh: TokenKey,
}

impl JwtConfig {
    /// Create a JWT configuration with the given secrets and expiry windows.
    pub fn new(
        access_secret: &[u8],
        access_ttl_secs: u64,
        refresh_secret: &[u8],
        refresh_ttl_secs: u64,
    ) -> Self {
        Self {
            access: TokenKey::new(access_secret, access_ttl_secs),
            refresh: TokenKey::new(refresh_secret, refresh_ttl_secs),
        }
    }

    /// Create a configuration with the default expiry windows.
    pub fn with_default_ttls(access_secret: &[u8], refresh_secret: &[u8]) -> Self {
        Self::new(
            access_secret,
            DEFAULT_ACCESS_TTL_SECS,
            refresh_secret,
            DEFAULT_REFRESH_TTL_SECS,
        )
    }

    /// Access token duration in seconds.
    pub fn access_ttl(&self) -> u64 {
        self.access.ttl_secs
    }

    /// Refresh token duration in seconds.
    pub fn refresh_ttl(&self) -> u64 {
        self.refresh.ttl_secs
    }

    /// Sign a short-lived access token for the given subject.
    pub fn sign_access(&self, subject: &str) -> Result<SignedToken, JwtError> {
        Self::sign(&self.access, subject)
    }

    /// Sign a long-lived refresh token for the given subject.
    pub fn sign_refresh(&self, subject: &str) -> Result<SignedToken, JwtError> {
        Self::sign(&self.refresh, subject)
    }

    /// Verify an access token and return its claims.
    pub fn verify_access(&self, token: &str) -> Result<Claims, JwtError> {
        Self::verify(&self.access, token)
    }

    /// Verify a refresh token and return its claims.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        Self::verify(&self.refresh, token)
    }

    fn sign(key: &TokenKey, subject: &str) -> Result<SignedToken, JwtError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| JwtError::TimeError)?
            .as_secs();

        let exp = now + key.ttl_secs;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp,
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &key.encoding)
            .map_err(JwtError::Encoding)?;

        Ok(SignedToken {
            token,
            issued_at: now,
            expires_at: exp,
            duration: key.ttl_secs,
        })
    }

    fn verify(key: &TokenKey, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        // The library checks the signature before any claim validation, so a
        // tampered token reports Invalid even if its exp is also in the past.
        let token_data = jsonwebtoken::decode::<Claims>(token, &key.decoding, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid,
            })?;

        Ok(token_data.claims)
    }
}

/// Errors that can occur during JWT operations.
#[derive(Debug)]
pub enum JwtError {
    /// Error encoding the token
    Encoding(jsonwebtoken::errors::Error),
    /// Bad signature or malformed token
    Invalid,
    /// Valid signature, past expiry
    Expired,
    /// System time error
    TimeError,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::Encoding(e) => write!(f, "Failed to encode token: {}", e),
            JwtError::Invalid => write!(f, "Invalid token"),
            JwtError::Expired => write!(f, "Token expired"),
            JwtError::TimeError => write!(f, "System time error"),
        }
    }
}

impl std::error::Error for JwtError {}
