//! Quote requests: public submission, admin triage.
//!
//! A submission inserts the request and its admin notification in one
//! transaction, so the outbox row exists exactly when the request does.

use crate::api::{
    config::AppState,
    email::{TEMPLATE_QUOTE_REQUEST, enqueue_notification},
};
use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Instrument, error, info_span};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{auth::principal::require_admin, storage::StorageError, valid_email};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    New,
    Processing,
    Closed,
}

impl QuoteStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Processing => "processing",
            Self::Closed => "closed",
        }
    }
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct SubmitQuoteRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    pub project_type: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct QuoteResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub project_type: Option<String>,
    pub message: String,
    pub status: String,
    pub created_at: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateQuoteStatusRequest {
    pub status: QuoteStatus,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SubmittedResponse {
    pub id: String,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/quotes",
    request_body = SubmitQuoteRequest,
    responses(
        (status = 201, description = "Quote request received", body = SubmittedResponse),
        (status = 400, description = "Missing or invalid fields", body = String)
    ),
    tag = "quotes"
)]
pub async fn submit_quote(
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<SubmitQuoteRequest>,
) -> impl IntoResponse {
    let name = payload.name.trim();
    let email = payload.email.trim();
    let message = payload.message.trim();
    if name.is_empty() || email.is_empty() || message.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Name, email, and message are required.",
        )
            .into_response();
    }
    if !valid_email(email) {
        return (StatusCode::BAD_REQUEST, "Invalid email address.").into_response();
    }

    match insert_quote_with_notification(&pool, state.config().notify_email(), &payload).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(SubmittedResponse {
                id: id.to_string(),
                message: "Your quote request has been received.".to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to store quote request: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/quotes",
    responses(
        (status = 200, description = "All quote requests, newest first", body = [QuoteResponse]),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "quotes"
)]
pub async fn list_quotes(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match fetch_quotes(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list quote requests: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/quotes/{id}",
    params(("id" = String, Path, description = "Quote request id")),
    responses(
        (status = 200, description = "Quote request detail", body = QuoteResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Quote request not found")
    ),
    tag = "quotes"
)]
pub async fn get_quote(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match fetch_quote(&pool, id).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to get quote request: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/api/quotes/{id}",
    request_body = UpdateQuoteStatusRequest,
    params(("id" = String, Path, description = "Quote request id")),
    responses(
        (status = 200, description = "Status updated", body = QuoteResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Quote request not found")
    ),
    tag = "quotes"
)]
pub async fn update_quote_status(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<UpdateQuoteStatusRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match update_status_row(&pool, id, payload.status).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/quotes/{id}",
    params(("id" = String, Path, description = "Quote request id")),
    responses(
        (status = 204, description = "Quote request deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Quote request not found")
    ),
    tag = "quotes"
)]
pub async fn delete_quote(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match delete_quote_row(&pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn row_to_response(row: &sqlx::postgres::PgRow) -> QuoteResponse {
    QuoteResponse {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        project_type: row.get("project_type"),
        message: row.get("message"),
        status: row.get("status"),
        created_at: row.get("created_at"),
    }
}

const COLUMNS: &str = r#"
    id::text AS id,
    name,
    email,
    phone,
    project_type,
    message,
    status,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

async fn insert_quote_with_notification(
    pool: &PgPool,
    notify_email: &str,
    payload: &SubmitQuoteRequest,
) -> Result<Uuid, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let query = r"
        INSERT INTO quote_requests (name, email, phone, project_type, message, status)
        VALUES ($1, $2, $3, $4, $5, 'new')
        RETURNING id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(payload.name.trim())
        .bind(payload.email.trim())
        .bind(payload.phone.as_deref())
        .bind(payload.project_type.as_deref())
        .bind(payload.message.trim())
        .fetch_one(&mut *tx)
        .instrument(span)
        .await?;
    let id: Uuid = row.get("id");

    let notification = json!({
        "quote_id": id.to_string(),
        "name": payload.name.trim(),
        "email": payload.email.trim(),
        "project_type": payload.project_type,
    });
    enqueue_notification(
        &mut tx,
        notify_email,
        TEMPLATE_QUOTE_REQUEST,
        &notification.to_string(),
    )
    .await?;

    tx.commit().await?;
    Ok(id)
}

async fn fetch_quotes(pool: &PgPool) -> Result<Vec<QuoteResponse>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM quote_requests ORDER BY created_at DESC");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query).fetch_all(pool).instrument(span).await?;
    Ok(rows.iter().map(row_to_response).collect())
}

async fn fetch_quote(pool: &PgPool, id: Uuid) -> Result<Option<QuoteResponse>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM quote_requests WHERE id = $1 LIMIT 1");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(row_to_response))
}

async fn update_status_row(
    pool: &PgPool,
    id: Uuid,
    status: QuoteStatus,
) -> Result<QuoteResponse, StorageError> {
    let query = format!(
        "UPDATE quote_requests SET status = $1 WHERE id = $2 RETURNING {COLUMNS}"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(status.as_str())
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    row.as_ref().map(row_to_response).ok_or(StorageError::NotFound)
}

async fn delete_quote_row(pool: &PgPool, id: Uuid) -> Result<(), StorageError> {
    let query = "DELETE FROM quote_requests WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn status_round_trips_through_json() -> Result<(), serde_json::Error> {
        let status: QuoteStatus = serde_json::from_str(r#""processing""#)?;
        assert_eq!(status, QuoteStatus::Processing);
        assert_eq!(status.as_str(), "processing");
        Ok(())
    }

    #[tokio::test]
    async fn insert_quote_fails_without_db() {
        let payload = SubmitQuoteRequest {
            name: "Client".to_string(),
            email: "client@example.com".to_string(),
            phone: None,
            project_type: Some("renovation".to_string()),
            message: "Devis pour une extension.".to_string(),
        };
        let result =
            insert_quote_with_notification(&unreachable_pool(), "chantier@gbexo.net", &payload)
                .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn fetch_quotes_fails_without_db() {
        assert!(fetch_quotes(&unreachable_pool()).await.is_err());
    }
}
