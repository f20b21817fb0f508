//! Session lifecycle: credential verification, token issuance, refresh
//! rotation, and logout.
//!
//! Dual-token system: short-lived access tokens are stateless and never
//! checked against storage; long-lived refresh tokens are only valid while
//! they exactly match the account's single refresh-token slot. Issuing a new
//! pair for an account supersedes whatever the slot held before.

use std::sync::Arc;

use crate::db::{Account, Database};
use crate::jwt::{JwtConfig, JwtError};
use crate::password;

/// A freshly issued access/refresh pair. Only the refresh token leaves a
/// durable trace (the account's slot); the pair itself is response-only.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token duration in seconds (cookie Max-Age)
    pub access_ttl: u64,
    /// Refresh token duration in seconds (cookie Max-Age)
    pub refresh_ttl: u64,
}

/// Session operations over the account store and token codec.
#[derive(Clone)]
pub struct Sessions {
    db: Database,
    jwt: Arc<JwtConfig>,
}

impl Sessions {
    pub fn new(db: Database, jwt: Arc<JwtConfig>) -> Self {
        Self { db, jwt }
    }

    /// Authenticate a login attempt. The identifier matches against username
    /// or email. Empty fields are rejected before any lookup.
    pub async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
    ) -> Result<Account, SessionError> {
        if identifier.trim().is_empty() || password.is_empty() {
            return Err(SessionError::MissingCredentials);
        }

        let account = self
            .db
            .accounts()
            .find_by_identifier(identifier.trim())
            .await?
            .ok_or(SessionError::UnknownAccount)?;

        if !password::verify_password(password, &account.password_hash) {
            return Err(SessionError::WrongPassword);
        }

        Ok(account)
    }

    /// Mint a fresh access/refresh pair and persist the refresh token into
    /// the account's slot, replacing any prior value. A store failure
    /// propagates before the pair is returned; there is no partial issuance.
    pub async fn issue_tokens(&self, account: &Account) -> Result<TokenPair, SessionError> {
        let access = self.jwt.sign_access(&account.uuid)?;
        let refresh = self.jwt.sign_refresh(&account.uuid)?;

        self.db
            .accounts()
            .store_refresh_token(account.id, &refresh.token)
            .await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_ttl: access.duration,
            refresh_ttl: refresh.duration,
        })
    }

    /// Exchange a refresh token for a new pair, rotating the slot.
    ///
    /// The presented token must verify under the refresh secret AND exactly
    /// match the account's slot. The slot update is a compare-and-set, so of
    /// N concurrent calls presenting the same token exactly one wins; the
    /// rest fail with `TokenReused`.
    pub async fn refresh(&self, presented: &str) -> Result<(Account, TokenPair), SessionError> {
        if presented.is_empty() {
            return Err(SessionError::MissingToken);
        }

        let claims = self.jwt.verify_refresh(presented)?;

        let account = self
            .db
            .accounts()
            .get_by_uuid(&claims.sub)
            .await?
            .ok_or(SessionError::Unauthorized)?;

        match account.refresh_token.as_deref() {
            // No open session (logged out)
            None => return Err(SessionError::Unauthorized),
            // Cryptographically valid but superseded: replay of a stale token
            Some(current) if current != presented => return Err(SessionError::TokenReused),
            Some(_) => {}
        }

        let access = self.jwt.sign_access(&account.uuid)?;
        let refresh = self.jwt.sign_refresh(&account.uuid)?;

        let swapped = self
            .db
            .accounts()
            .swap_refresh_token(account.id, presented, &refresh.token)
            .await?;
        if !swapped {
            // Another call rotated the slot between our read and the write
            return Err(SessionError::TokenReused);
        }

        Ok((
            account,
            TokenPair {
                access_token: access.token,
                refresh_token: refresh.token,
                access_ttl: access.duration,
                refresh_ttl: refresh.duration,
            },
        ))
    }

    /// Close the account's session by clearing the refresh-token slot.
    /// Idempotent. Already-issued access tokens stay valid until expiry.
    pub async fn logout(&self, account_id: i64) -> Result<(), SessionError> {
        self.db.accounts().clear_refresh_token(account_id).await?;
        Ok(())
    }
}

/// Typed failures of the session core.
#[derive(Debug)]
pub enum SessionError {
    /// Empty identifier or password on login
    MissingCredentials,
    /// No account matches the login identifier
    UnknownAccount,
    /// Password verification failed
    WrongPassword,
    /// No token presented where one is required
    MissingToken,
    /// Bad signature or malformed token
    TokenInvalid,
    /// Valid signature, past expiry
    TokenExpired,
    /// Valid, unexpired refresh token that no longer matches the slot
    TokenReused,
    /// Token subject has no account, or no session is open
    Unauthorized,
    /// Persistence layer failure
    Store(sqlx::Error),
}

impl From<JwtError> for SessionError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::Expired => SessionError::TokenExpired,
            JwtError::Invalid => SessionError::TokenInvalid,
            // Encoding/time failures are internal, not a property of the
            // presented credential
            JwtError::Encoding(_) | JwtError::TimeError => SessionError::Unauthorized,
        }
    }
}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Store(e)
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::MissingCredentials => write!(f, "Missing credentials"),
            SessionError::UnknownAccount => write!(f, "Unknown account"),
            SessionError::WrongPassword => write!(f, "Wrong password"),
            SessionError::MissingToken => write!(f, "Missing token"),
            SessionError::TokenInvalid => write!(f, "Invalid token"),
            SessionError::TokenExpired => write!(f, "Token expired"),
            SessionError::TokenReused => write!(f, "Refresh token has been superseded"),
            SessionError::Unauthorized => write!(f, "Unauthorized"),
            SessionError::Store(e) => write!(f, "Store failure: {}", e),
        }
    }
}

impl std::error::Error for SessionError {}
