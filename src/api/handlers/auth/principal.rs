//! Admin identity extraction from bearer tokens.
//!
//! Tokens are self-contained; gating a request is a signature and expiry
//! check against the shared codec, with no database lookup and no shared
//! mutable state. Every admin endpoint calls [`require_admin`] first and
//! receives an explicit [`AdminIdentity`], never a raw claims bag.

use crate::api::{config::AppState, token::TokenError};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use tracing::debug;
use uuid::Uuid;

/// Verified admin context for the current request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminIdentity {
    pub id: Uuid,
    pub email: String,
}

/// Resolve the `Authorization: Bearer <token>` header into an admin identity.
///
/// All failure modes collapse to `401`; the verification detail is logged and
/// never surfaced to the caller.
///
/// # Errors
/// Returns `StatusCode::UNAUTHORIZED` when the header is missing, ill-shaped,
/// or the token does not verify.
pub fn require_admin(headers: &HeaderMap, state: &AppState) -> Result<AdminIdentity, StatusCode> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };
    verify_bearer(&token, state)
}

/// Like [`require_admin`], but an absent header means an anonymous caller.
///
/// Public list endpoints use this to widen their result for admins. A header
/// that is present but does not verify is still a `401` rather than a silent
/// downgrade, so an expired console session surfaces instead of shrinking the
/// list.
///
/// # Errors
/// Returns `StatusCode::UNAUTHORIZED` only when a token was supplied and
/// failed verification.
pub fn maybe_admin(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Option<AdminIdentity>, StatusCode> {
    match extract_bearer_token(headers) {
        None => Ok(None),
        Some(token) => verify_bearer(&token, state).map(Some),
    }
}

fn verify_bearer(token: &str, state: &AppState) -> Result<AdminIdentity, StatusCode> {
    let claims = state.codec().verify(token).map_err(|err| {
        match err {
            TokenError::Expired => debug!("rejected expired admin token"),
            TokenError::InvalidSignature => debug!("rejected admin token with bad signature"),
            TokenError::Malformed => debug!("rejected malformed admin token"),
        }
        StatusCode::UNAUTHORIZED
    })?;

    // The subject is written by issue(); a non-UUID here means the token was
    // signed by us but tampered structurally, treat it like any bad token.
    let id = claims.sub.parse::<Uuid>().map_err(|_| {
        debug!("admin token subject is not a UUID");
        StatusCode::UNAUTHORIZED
    })?;

    Ok(AdminIdentity {
        id,
        email: claims.email,
    })
}

/// Pull the token out of `Authorization: Bearer <token>`.
pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{config::AppConfig, media::LocalMediaStore};
    use anyhow::Result;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use std::sync::Arc;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn state() -> AppState {
        let config = AppConfig::new("chantier@gbexo.net".to_string());
        let media = Arc::new(LocalMediaStore::new(
            std::env::temp_dir(),
            "http://localhost:8080".to_string(),
        ));
        AppState::new(config, SecretString::from(SECRET.to_string()), media)
    }

    fn bearer(token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}"))?);
        Ok(headers)
    }

    #[test]
    fn missing_header_is_unauthorized() {
        let result = require_admin(&HeaderMap::new(), &state());
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn non_bearer_header_is_unauthorized() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        let result = require_admin(&headers, &state());
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
        Ok(())
    }

    #[test]
    fn valid_token_yields_identity() -> Result<()> {
        let state = state();
        let admin_id = Uuid::new_v4();
        let token = state.codec().issue(admin_id, "chantier@gbexo.net")?;

        let identity = require_admin(&bearer(&token)?, &state)
            .map_err(|status| anyhow::anyhow!("unexpected status: {status}"))?;
        assert_eq!(identity.id, admin_id);
        assert_eq!(identity.email, "chantier@gbexo.net");
        Ok(())
    }

    #[test]
    fn corrupted_token_is_unauthorized() -> Result<()> {
        let state = state();
        let token = state.codec().issue(Uuid::new_v4(), "chantier@gbexo.net")?;
        let corrupted = format!("{token}x");

        let result = require_admin(&bearer(&corrupted)?, &state);
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
        Ok(())
    }

    #[test]
    fn maybe_admin_allows_anonymous() {
        let result = maybe_admin(&HeaderMap::new(), &state());
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn maybe_admin_rejects_invalid_token() -> Result<()> {
        let result = maybe_admin(&bearer("not-a-token")?, &state());
        assert_eq!(result, Err(StatusCode::UNAUTHORIZED));
        Ok(())
    }

    #[test]
    fn extract_bearer_token_trims_and_rejects_empty() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(extract_bearer_token(&headers).is_none());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc "));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc"));
        Ok(())
    }
}
