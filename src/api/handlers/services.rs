//! Company service catalog (masonry, roofing, renovation, ...).

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
use tracing::{Instrument, error, info_span};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{auth::principal::require_admin, storage::StorageError};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ServiceResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    pub position: i32,
    pub created_at: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateServiceRequest {
    pub title: String,
    pub description: String,
    pub icon: Option<String>,
    #[serde(default)]
    pub position: i32,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateServiceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub position: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/services",
    responses(
        (status = 200, description = "All services, ordered for display", body = [ServiceResponse])
    ),
    tag = "services"
)]
pub async fn list_services(pool: Extension<PgPool>) -> impl IntoResponse {
    match fetch_services(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list services: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/services",
    request_body = CreateServiceRequest,
    responses(
        (status = 201, description = "Service created", body = ServiceResponse),
        (status = 400, description = "Invalid input", body = String),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "services"
)]
pub async fn create_service(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<CreateServiceRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let title = payload.title.trim();
    if title.is_empty() || payload.description.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Title and description are required.").into_response();
    }

    match insert_service(&pool, title, payload.description.trim(), &payload).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/services/{id}",
    request_body = UpdateServiceRequest,
    params(("id" = String, Path, description = "Service id")),
    responses(
        (status = 200, description = "Service updated", body = ServiceResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Service not found")
    ),
    tag = "services"
)]
pub async fn update_service(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<UpdateServiceRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match update_service_row(&pool, id, &payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/services/{id}",
    params(("id" = String, Path, description = "Service id")),
    responses(
        (status = 204, description = "Service deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Service not found")
    ),
    tag = "services"
)]
pub async fn delete_service(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match delete_service_row(&pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn row_to_response(row: &sqlx::postgres::PgRow) -> ServiceResponse {
    ServiceResponse {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        icon: row.get("icon"),
        position: row.get("position"),
        created_at: row.get("created_at"),
    }
}

async fn fetch_services(pool: &PgPool) -> Result<Vec<ServiceResponse>, sqlx::Error> {
    let query = r#"
        SELECT
            id::text AS id,
            title,
            description,
            icon,
            position,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM services
        ORDER BY position ASC, created_at ASC
    "#;
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;
    Ok(rows.iter().map(row_to_response).collect())
}

async fn insert_service(
    pool: &PgPool,
    title: &str,
    description: &str,
    payload: &CreateServiceRequest,
) -> Result<ServiceResponse, StorageError> {
    let query = r#"
        INSERT INTO services (title, description, icon, position)
        VALUES ($1, $2, $3, $4)
        RETURNING
            id::text AS id,
            title,
            description,
            icon,
            position,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(title)
        .bind(description)
        .bind(payload.icon.as_deref())
        .bind(payload.position)
        .fetch_one(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    Ok(row_to_response(&row))
}

async fn update_service_row(
    pool: &PgPool,
    id: Uuid,
    payload: &UpdateServiceRequest,
) -> Result<ServiceResponse, StorageError> {
    let query = r#"
        UPDATE services
        SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            icon = COALESCE($3, icon),
            position = COALESCE($4, position)
        WHERE id = $5
        RETURNING
            id::text AS id,
            title,
            description,
            icon,
            position,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(payload.title.as_deref().map(str::trim))
        .bind(payload.description.as_deref().map(str::trim))
        .bind(payload.icon.as_deref())
        .bind(payload.position)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    row.as_ref().map(row_to_response).ok_or(StorageError::NotFound)
}

async fn delete_service_row(pool: &PgPool, id: Uuid) -> Result<(), StorageError> {
    let query = "DELETE FROM services WHERE id = $1";
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
    async fn fetch_services_fails_without_db() {
        let result = fetch_services(&unreachable_pool()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn delete_service_row_fails_without_db() {
        let result = delete_service_row(&unreachable_pool(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }

    #[test]
    fn create_request_defaults_position() -> Result<(), serde_json::Error> {
        let payload: CreateServiceRequest = serde_json::from_str(
            r#"{"title":"Gros oeuvre","description":"Fondations et structures."}"#,
        )?;
        assert_eq!(payload.position, 0);
        assert!(payload.icon.is_none());
        Ok(())
    }
}
