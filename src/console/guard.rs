//! Route guard for the console.
//!
//! The guard only inspects the stored token structurally and reads its
//! embedded expiry. It never checks the signature; the API middleware does
//! that on every request, and the client is redirected the moment a 401
//! comes back.

use crate::api::token::{AdminClaims, decode_unverified};
use crate::console::session::SessionStore;
use chrono::Utc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Session not inspected yet; the console shows nothing gated.
    Loading,
    /// A structurally valid, unexpired token exists.
    Authenticated(AdminClaims),
    Unauthenticated,
}

/// Resolve the guard from the session store against the current clock.
#[must_use]
pub fn resolve(store: &SessionStore) -> GuardState {
    resolve_at(store.token(), Utc::now().timestamp())
}

/// Clock-injected resolution so expiry transitions are testable.
#[must_use]
pub fn resolve_at(token: Option<&str>, now_unix_seconds: i64) -> GuardState {
    let Some(token) = token else {
        return GuardState::Unauthenticated;
    };

    match decode_unverified(token) {
        Ok(claims) if claims.exp > now_unix_seconds => GuardState::Authenticated(claims),
        _ => GuardState::Unauthenticated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::token::TokenCodec;
    use secrecy::SecretString;
    use uuid::Uuid;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            7,
        )
    }

    #[test]
    fn no_token_is_unauthenticated() {
        assert_eq!(resolve_at(None, 0), GuardState::Unauthenticated);
    }

    #[test]
    fn garbage_token_is_unauthenticated() {
        assert_eq!(
            resolve_at(Some("not-a-token"), 0),
            GuardState::Unauthenticated
        );
    }

    #[test]
    fn fresh_token_is_authenticated() -> anyhow::Result<()> {
        let admin_id = Uuid::new_v4();
        let token = codec().issue(admin_id, "admin@gbexo.net")?;

        match resolve_at(Some(&token), Utc::now().timestamp()) {
            GuardState::Authenticated(claims) => {
                assert_eq!(claims.sub, admin_id.to_string());
                assert_eq!(claims.email, "admin@gbexo.net");
            }
            state => panic!("expected authenticated, got {state:?}"),
        }
        Ok(())
    }

    #[test]
    fn expired_token_is_unauthenticated() -> anyhow::Result<()> {
        let token = codec().issue(Uuid::new_v4(), "admin@gbexo.net")?;
        let decoded = decode_unverified(&token)?;

        assert_eq!(
            resolve_at(Some(&token), decoded.exp + 1),
            GuardState::Unauthenticated
        );
        Ok(())
    }

    #[test]
    fn tampered_token_still_resolves_structurally() -> anyhow::Result<()> {
        // The guard is advisory: a broken signature still decodes. Only the
        // server rejects it.
        let token = codec().issue(Uuid::new_v4(), "admin@gbexo.net")?;
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[2] = "AAAAAAAA";
        let tampered = parts.join(".");

        assert!(matches!(
            resolve_at(Some(&tampered), Utc::now().timestamp()),
            GuardState::Authenticated(_)
        ));
        Ok(())
    }
}
