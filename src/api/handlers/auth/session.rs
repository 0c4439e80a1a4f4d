//! Session endpoints for the admin console.
//!
//! Tokens are not tracked server-side, so logout cannot revoke anything; it
//! exists so the console has a definite point at which to forget its copy.
//! A stolen token stays valid until its expiry.

use crate::api::config::AppState;
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use super::principal::require_admin;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LogoutResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out; the client discards its token", body = LogoutResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "auth"
)]
pub async fn logout(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    match require_admin(&headers, &state) {
        Ok(_identity) => (
            StatusCode::OK,
            Json(LogoutResponse {
                message: "Logged out.".to_string(),
            }),
        )
            .into_response(),
        Err(status) => status.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Identity embedded in the presented token", body = MeResponse),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "auth"
)]
pub async fn me(headers: HeaderMap, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    match require_admin(&headers, &state) {
        Ok(identity) => (
            StatusCode::OK,
            Json(MeResponse {
                id: identity.id.to_string(),
                email: identity.email,
            }),
        )
            .into_response(),
        Err(status) => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{config::AppConfig, media::LocalMediaStore};
    use anyhow::Result;
    use axum::http::{HeaderValue, header::AUTHORIZATION};
    use secrecy::SecretString;
    use uuid::Uuid;

    fn state() -> Arc<AppState> {
        let config = AppConfig::new("chantier@gbexo.net".to_string());
        let media = Arc::new(LocalMediaStore::new(
            std::env::temp_dir(),
            "http://localhost:8080".to_string(),
        ));
        Arc::new(AppState::new(
            config,
            SecretString::from("0123456789abcdef0123456789abcdef".to_string()),
            media,
        ))
    }

    #[tokio::test]
    async fn logout_with_valid_token_succeeds() -> Result<()> {
        let state = state();
        let token = state.codec().issue(Uuid::new_v4(), "chantier@gbexo.net")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let response = logout(headers, Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn logout_without_token_is_401_not_a_crash() {
        // A second logout after the client cleared its store lands here.
        let response = logout(HeaderMap::new(), Extension(state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn me_echoes_token_identity() -> Result<()> {
        let state = state();
        let admin_id = Uuid::new_v4();
        let token = state.codec().issue(admin_id, "chantier@gbexo.net")?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let response = me(headers, Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        Ok(())
    }
}
