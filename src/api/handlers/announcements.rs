//! Site announcements with an optional media attachment.
//!
//! The console uploads the attachment through `/api/uploads` first and then
//! persists the returned URL and key here. Deleting an announcement removes
//! the row before the media object; a leftover object is logged, never fatal.

use crate::api::config::AppState;
use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::{Instrument, error, info_span, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    auth::principal::{maybe_admin, require_admin},
    storage::StorageError,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AnnouncementResponse {
    pub id: String,
    pub title: String,
    pub body: String,
    pub media_url: Option<String>,
    pub published: bool,
    pub created_at: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateAnnouncementRequest {
    pub title: String,
    pub body: String,
    pub media_url: Option<String>,
    pub media_key: Option<String>,
    #[serde(default)]
    pub published: bool,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateAnnouncementRequest {
    pub title: Option<String>,
    pub body: Option<String>,
    pub published: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/announcements",
    responses(
        (status = 200, description = "Published announcements; all with a valid admin token", body = [AnnouncementResponse]),
        (status = 401, description = "A token was supplied but did not verify")
    ),
    tag = "announcements"
)]
pub async fn list_announcements(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let admin = match maybe_admin(&headers, &state) {
        Ok(admin) => admin,
        Err(status) => return status.into_response(),
    };

    match fetch_announcements(&pool, admin.is_some()).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list announcements: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/announcements",
    request_body = CreateAnnouncementRequest,
    responses(
        (status = 201, description = "Announcement created", body = AnnouncementResponse),
        (status = 400, description = "Invalid input", body = String),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "announcements"
)]
pub async fn create_announcement(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let title = payload.title.trim();
    if title.is_empty() || payload.body.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Title and body are required.").into_response();
    }

    match insert_announcement(&pool, title, payload.body.trim(), &payload).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/announcements/{id}",
    request_body = UpdateAnnouncementRequest,
    params(("id" = String, Path, description = "Announcement id")),
    responses(
        (status = 200, description = "Announcement updated", body = AnnouncementResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Announcement not found")
    ),
    tag = "announcements"
)]
pub async fn update_announcement(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<UpdateAnnouncementRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match update_announcement_row(&pool, id, &payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/announcements/{id}",
    params(("id" = String, Path, description = "Announcement id")),
    responses(
        (status = 204, description = "Announcement and its media deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Announcement not found")
    ),
    tag = "announcements"
)]
pub async fn delete_announcement(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let media_key = match delete_announcement_row(&pool, id).await {
        Ok(media_key) => media_key,
        Err(err) => return err.into_response(),
    };

    // The row is gone; a dangling media object is the acceptable failure mode.
    if let Some(key) = media_key {
        if let Err(err) = state.media().delete(&key).await {
            warn!(key = %key, "failed to delete announcement media: {err:#}");
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

fn row_to_response(row: &sqlx::postgres::PgRow) -> AnnouncementResponse {
    AnnouncementResponse {
        id: row.get("id"),
        title: row.get("title"),
        body: row.get("body"),
        media_url: row.get("media_url"),
        published: row.get("published"),
        created_at: row.get("created_at"),
    }
}

const COLUMNS: &str = r#"
    id::text AS id,
    title,
    body,
    media_url,
    published,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

async fn fetch_announcements(
    pool: &PgPool,
    include_unpublished: bool,
) -> Result<Vec<AnnouncementResponse>, sqlx::Error> {
    let query = format!(
        "SELECT {COLUMNS} FROM announcements WHERE published OR $1 ORDER BY created_at DESC"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(include_unpublished)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(row_to_response).collect())
}

async fn insert_announcement(
    pool: &PgPool,
    title: &str,
    body: &str,
    payload: &CreateAnnouncementRequest,
) -> Result<AnnouncementResponse, StorageError> {
    let query = format!(
        "INSERT INTO announcements (title, body, media_url, media_key, published)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COLUMNS}"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(title)
        .bind(body)
        .bind(payload.media_url.as_deref())
        .bind(payload.media_key.as_deref())
        .bind(payload.published)
        .fetch_one(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    Ok(row_to_response(&row))
}

async fn update_announcement_row(
    pool: &PgPool,
    id: Uuid,
    payload: &UpdateAnnouncementRequest,
) -> Result<AnnouncementResponse, StorageError> {
    let query = format!(
        r"
        UPDATE announcements
        SET
            title = COALESCE($1, title),
            body = COALESCE($2, body),
            published = COALESCE($3, published)
        WHERE id = $4
        RETURNING {COLUMNS}
        "
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(payload.title.as_deref().map(str::trim))
        .bind(payload.body.as_deref().map(str::trim))
        .bind(payload.published)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    row.as_ref().map(row_to_response).ok_or(StorageError::NotFound)
}

/// Delete the row and return the media key that was attached to it, if any.
async fn delete_announcement_row(pool: &PgPool, id: Uuid) -> Result<Option<String>, StorageError> {
    let query = "DELETE FROM announcements WHERE id = $1 RETURNING media_key";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    match row {
        Some(row) => Ok(row.get("media_key")),
        None => Err(StorageError::NotFound),
    }
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
    async fn fetch_announcements_fails_without_db() {
        assert!(fetch_announcements(&unreachable_pool(), false).await.is_err());
    }

    #[tokio::test]
    async fn delete_announcement_row_fails_without_db() {
        let result = delete_announcement_row(&unreachable_pool(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }

    #[test]
    fn response_omits_media_key() -> Result<(), serde_json::Error> {
        // The deletion key is server-side bookkeeping, not part of the API shape.
        let response = AnnouncementResponse {
            id: "x".to_string(),
            title: "Fermeture annuelle".to_string(),
            body: "Le dépôt sera fermé en août.".to_string(),
            media_url: None,
            published: true,
            created_at: "2026-08-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(response)?;
        assert!(value.get("media_key").is_none());
        Ok(())
    }
}
