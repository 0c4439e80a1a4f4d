//! Credential exchange: email and password in, signed token out.

use crate::api::config::AppState;
use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Instrument, debug, error, info_span, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

/// Single message for unknown email and wrong password; the response never
/// reveals which check failed.
const INVALID_CREDENTIALS: &str = "Invalid email or password.";

#[derive(ToSchema, Deserialize, Debug)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AdminSummary {
    pub id: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
    pub admin: AdminSummary,
}

#[derive(Debug)]
struct AdminRow {
    id: Uuid,
    email: String,
    password_hash: String,
}

type LoginResult = Result<(StatusCode, Json<LoginResponse>), (StatusCode, String)>;

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted, token issued", body = LoginResponse),
        (status = 400, description = "Missing email or password", body = String),
        (status = 401, description = "Invalid email or password", body = String),
        (status = 500, description = "Credential store or signing failure", body = String)
    ),
    tag = "auth"
)]
#[instrument(skip(pool, state, payload))]
pub async fn login(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> LoginResult {
    validate_fields(&payload)?;

    let email = payload.email.trim().to_lowercase();
    let Some(admin) = fetch_admin(&pool, &email).await? else {
        debug!("login attempt for unknown email");
        return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()));
    };

    if !verify_password(payload.password, admin.password_hash.clone()).await? {
        debug!("login attempt with wrong password");
        return Err((StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS.to_string()));
    }

    let token = state.codec().issue(admin.id, &admin.email).map_err(|err| {
        error!("Failed to issue admin token: {err:#}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to issue token".to_string(),
        )
    })?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            token,
            admin: AdminSummary {
                id: admin.id.to_string(),
                email: admin.email,
            },
        }),
    ))
}

/// Reject the request before any lookup when a field is absent or blank.
fn validate_fields(payload: &LoginRequest) -> Result<(), (StatusCode, String)> {
    let mut missing = Vec::new();
    if payload.email.trim().is_empty() {
        missing.push("email");
    }
    if payload.password.is_empty() {
        missing.push("password");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err((
            StatusCode::BAD_REQUEST,
            format!("Missing required fields: {}", missing.join(", ")),
        ))
    }
}

async fn fetch_admin(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AdminRow>, (StatusCode, String)> {
    let query = "SELECT id, email, password_hash FROM admins WHERE email = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(|err| {
            error!("Failed to look up admin: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login is unavailable".to_string(),
            )
        })?;

    Ok(row.map(|row| AdminRow {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
    }))
}

/// bcrypt comparison on the blocking pool; the cost factor makes this too
/// slow for the async executor.
async fn verify_password(password: String, hash: String) -> Result<bool, (StatusCode, String)> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|err| {
            error!("Password verification task failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login is unavailable".to_string(),
            )
        })?
        .map_err(|err| {
            error!("Failed to verify password hash: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login is unavailable".to_string(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
    use std::time::Duration;

    fn unreachable_pool() -> PgPool {
        let options = PgConnectOptions::new()
            .host("127.0.0.1")
            .port(1)
            .username("invalid")
            .database("invalid")
            .ssl_mode(PgSslMode::Disable);
        PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy_with(options)
    }

    #[test]
    fn validate_fields_lists_missing() {
        let payload = LoginRequest {
            email: String::new(),
            password: String::new(),
        };
        let result = validate_fields(&payload);
        assert!(matches!(
            result,
            Err((StatusCode::BAD_REQUEST, msg)) if msg == "Missing required fields: email, password"
        ));
    }

    #[test]
    fn validate_fields_rejects_blank_email() {
        let payload = LoginRequest {
            email: "   ".to_string(),
            password: "Admin1234!".to_string(),
        };
        let result = validate_fields(&payload);
        assert!(matches!(
            result,
            Err((StatusCode::BAD_REQUEST, msg)) if msg == "Missing required fields: email"
        ));
    }

    #[test]
    fn validate_fields_accepts_complete_payload() {
        let payload = LoginRequest {
            email: "admin@example.com".to_string(),
            password: "Admin1234!".to_string(),
        };
        assert!(validate_fields(&payload).is_ok());
    }

    #[tokio::test]
    async fn fetch_admin_returns_500_on_db_failure() {
        let pool = unreachable_pool();
        let result = fetch_admin(&pool, "admin@example.com").await;
        assert!(matches!(
            result,
            Err((StatusCode::INTERNAL_SERVER_ERROR, _))
        ));
    }

    #[tokio::test]
    async fn verify_password_accepts_matching_hash() -> Result<()> {
        let hash = bcrypt::hash("Admin1234!", 4)?;
        assert!(
            verify_password("Admin1234!".to_string(), hash)
                .await
                .map_err(|(status, msg)| anyhow::anyhow!("{status}: {msg}"))?
        );
        Ok(())
    }

    #[tokio::test]
    async fn verify_password_rejects_wrong_password() -> Result<()> {
        let hash = bcrypt::hash("Admin1234!", 4)?;
        assert!(
            !verify_password("wrong".to_string(), hash)
                .await
                .map_err(|(status, msg)| anyhow::anyhow!("{status}: {msg}"))?
        );
        Ok(())
    }

    #[test]
    fn login_response_shape() -> Result<(), serde_json::Error> {
        let response = LoginResponse {
            token: "signed".to_string(),
            admin: AdminSummary {
                id: "3f1e...".to_string(),
                email: "admin@example.com".to_string(),
            },
        };
        let value = serde_json::to_value(response)?;
        assert_eq!(value["token"], "signed");
        assert_eq!(value["admin"]["email"], "admin@example.com");
        Ok(())
    }
}
