//! Contact messages: public submission, admin inbox.

use crate::api::{
    config::AppState,
    email::{TEMPLATE_CONTACT_MESSAGE, enqueue_notification},
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

#[derive(ToSchema, Deserialize, Debug)]
pub struct SubmitContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub phone: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ContactMessageResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub message: String,
    pub read: bool,
    pub created_at: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SubmittedResponse {
    pub id: String,
    pub message: String,
}

#[utoipa::path(
    post,
    path = "/api/contact",
    request_body = SubmitContactRequest,
    responses(
        (status = 201, description = "Contact message received", body = SubmittedResponse),
        (status = 400, description = "Missing or invalid fields", body = String)
    ),
    tag = "contact"
)]
pub async fn submit_contact(
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<SubmitContactRequest>,
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

    match insert_contact_with_notification(&pool, state.config().notify_email(), &payload).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(SubmittedResponse {
                id: id.to_string(),
                message: "Your message has been received.".to_string(),
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to store contact message: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/contact",
    responses(
        (status = 200, description = "All contact messages, newest first", body = [ContactMessageResponse]),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "contact"
)]
pub async fn list_contact_messages(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match fetch_contact_messages(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list contact messages: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    patch,
    path = "/api/contact/{id}/read",
    params(("id" = String, Path, description = "Contact message id")),
    responses(
        (status = 200, description = "Message marked read", body = ContactMessageResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Contact message not found")
    ),
    tag = "contact"
)]
pub async fn mark_contact_read(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match mark_read_row(&pool, id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/contact/{id}",
    params(("id" = String, Path, description = "Contact message id")),
    responses(
        (status = 204, description = "Contact message deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Contact message not found")
    ),
    tag = "contact"
)]
pub async fn delete_contact_message(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match delete_contact_row(&pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn row_to_response(row: &sqlx::postgres::PgRow) -> ContactMessageResponse {
    ContactMessageResponse {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        message: row.get("message"),
        read: row.get("read"),
        created_at: row.get("created_at"),
    }
}

const COLUMNS: &str = r#"
    id::text AS id,
    name,
    email,
    phone,
    message,
    read,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

async fn insert_contact_with_notification(
    pool: &PgPool,
    notify_email: &str,
    payload: &SubmitContactRequest,
) -> Result<Uuid, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let query = r"
        INSERT INTO contact_messages (name, email, phone, message, read)
        VALUES ($1, $2, $3, $4, FALSE)
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
        .bind(payload.message.trim())
        .fetch_one(&mut *tx)
        .instrument(span)
        .await?;
    let id: Uuid = row.get("id");

    let notification = json!({
        "contact_id": id.to_string(),
        "name": payload.name.trim(),
        "email": payload.email.trim(),
    });
    enqueue_notification(
        &mut tx,
        notify_email,
        TEMPLATE_CONTACT_MESSAGE,
        &notification.to_string(),
    )
    .await?;

    tx.commit().await?;
    Ok(id)
}

async fn fetch_contact_messages(pool: &PgPool) -> Result<Vec<ContactMessageResponse>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM contact_messages ORDER BY created_at DESC");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query).fetch_all(pool).instrument(span).await?;
    Ok(rows.iter().map(row_to_response).collect())
}

async fn mark_read_row(pool: &PgPool, id: Uuid) -> Result<ContactMessageResponse, StorageError> {
    let query = format!(
        "UPDATE contact_messages SET read = TRUE WHERE id = $1 RETURNING {COLUMNS}"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    row.as_ref().map(row_to_response).ok_or(StorageError::NotFound)
}

async fn delete_contact_row(pool: &PgPool, id: Uuid) -> Result<(), StorageError> {
    let query = "DELETE FROM contact_messages WHERE id = $1";
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

    #[tokio::test]
    async fn insert_contact_fails_without_db() {
        let payload = SubmitContactRequest {
            name: "Visiteur".to_string(),
            email: "visiteur@example.com".to_string(),
            phone: Some("+229 97 00 00 00".to_string()),
            message: "Bonjour, j'ai une question.".to_string(),
        };
        let result =
            insert_contact_with_notification(&unreachable_pool(), "contact@gbexo.net", &payload)
                .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn mark_read_row_fails_without_db() {
        let result = mark_read_row(&unreachable_pool(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }
}
