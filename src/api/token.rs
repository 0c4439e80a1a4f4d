//! Signed admin session tokens.
//!
//! Login issues an HS256 token carrying the admin id and email; every admin
//! endpoint verifies signature and expiry on each request. There is no
//! server-side session table: a token is valid until its `exp` passes.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Shortest signing secret accepted at startup. There is no fallback secret;
/// the CLI refuses to start with anything shorter.
pub const MIN_SECRET_BYTES: usize = 32;

pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 7;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminClaims {
    /// Admin id (UUID) as a string.
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed token")]
    Malformed,
}

/// Issues and verifies admin session tokens with a shared secret.
pub struct TokenCodec {
    secret: SecretString,
    ttl_seconds: i64,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: SecretString, ttl_days: i64) -> Self {
        Self {
            secret,
            ttl_seconds: ttl_days.max(1) * SECONDS_PER_DAY,
        }
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Issue a signed token for an authenticated admin.
    ///
    /// # Errors
    /// Returns an error if claim encoding or signing fails.
    pub fn issue(&self, admin_id: Uuid, email: &str) -> anyhow::Result<String> {
        let now = Utc::now().timestamp();
        let claims = AdminClaims {
            sub: admin_id.to_string(),
            email: email.to_string(),
            iat: now,
            exp: now + self.ttl_seconds,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.expose_secret().as_bytes()),
        )?;
        Ok(token)
    }

    /// Verify signature and expiry against the current clock.
    ///
    /// # Errors
    /// Returns `Expired`, `InvalidSignature`, or `Malformed`; callers must
    /// treat all three the same way (reject) and only log the variant.
    pub fn verify(&self, token: &str) -> Result<AdminClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verify signature and expiry against an explicit clock.
    ///
    /// The signature check always runs first; expiry is then compared against
    /// `now_unix_seconds` so TTL behavior stays testable without sleeping.
    ///
    /// # Errors
    /// Same contract as [`Self::verify`].
    pub fn verify_at(
        &self,
        token: &str,
        now_unix_seconds: i64,
    ) -> Result<AdminClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the supplied clock.
        validation.validate_exp = false;

        let data = decode::<AdminClaims>(
            token,
            &DecodingKey::from_secret(self.secret.expose_secret().as_bytes()),
            &validation,
        )
        .map_err(|err| classify(&err))?;

        if data.claims.exp <= now_unix_seconds {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

/// Decode claims without checking the signature.
///
/// The console uses this to read identity and expiry out of a stored token
/// for display and routing. It proves nothing; the API re-verifies every
/// request.
///
/// # Errors
/// Returns `Malformed` when the token is not three base64url segments of
/// valid claim JSON.
pub fn decode_unverified(token: &str) -> Result<AdminClaims, TokenError> {
    let mut parts = token.split('.');
    let _header = parts.next().ok_or(TokenError::Malformed)?;
    let payload = parts.next().ok_or(TokenError::Malformed)?;
    let _signature = parts.next().ok_or(TokenError::Malformed)?;
    if parts.next().is_some() {
        return Err(TokenError::Malformed);
    }

    let bytes = Base64UrlUnpadded::decode_vec(payload).map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

fn classify(err: &jsonwebtoken::errors::Error) -> TokenError {
    match err.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        ErrorKind::InvalidSignature => TokenError::InvalidSignature,
        _ => TokenError::Malformed,
    }
}
