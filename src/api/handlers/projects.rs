//! Project portfolio with per-project image galleries.
//!
//! Gallery rows live in `project_images` and carry both the public URL and the
//! media-store key. Row deletion always happens before object deletion, inside
//! one transaction for the rows, so the database never references media that
//! the store already dropped.

use crate::api::config::AppState;
use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::{Instrument, error, info_span, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{auth::principal::require_admin, storage::StorageError};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProjectImageResponse {
    pub url: String,
    pub position: i32,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ProjectResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub year: Option<i32>,
    pub images: Vec<ProjectImageResponse>,
    pub created_at: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct ProjectImageInput {
    pub url: String,
    pub key: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub year: Option<i32>,
    #[serde(default)]
    pub images: Vec<ProjectImageInput>,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub year: Option<i32>,
    /// When present, replaces the whole gallery; the previous media objects
    /// are deleted after the transaction commits.
    pub images: Option<Vec<ProjectImageInput>>,
}

#[utoipa::path(
    get,
    path = "/api/projects",
    responses(
        (status = 200, description = "All projects with their galleries, newest first", body = [ProjectResponse])
    ),
    tag = "projects"
)]
pub async fn list_projects(pool: Extension<PgPool>) -> impl IntoResponse {
    match fetch_projects(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list projects: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project detail with gallery", body = ProjectResponse),
        (status = 404, description = "Project not found")
    ),
    tag = "projects"
)]
pub async fn get_project(Path(id): Path<Uuid>, pool: Extension<PgPool>) -> impl IntoResponse {
    match fetch_project(&pool, id).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to get project: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Invalid input", body = String),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "projects"
)]
pub async fn create_project(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<CreateProjectRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let title = payload.title.trim();
    if title.is_empty() || payload.description.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Title and description are required.").into_response();
    }

    match insert_project(&pool, title, payload.description.trim(), &payload).await {
        Ok(id) => match fetch_project(&pool, id).await {
            Ok(Some(response)) => (StatusCode::CREATED, Json(response)).into_response(),
            Ok(None) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            Err(err) => {
                error!("Failed to load created project: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        },
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/projects/{id}",
    request_body = UpdateProjectRequest,
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 200, description = "Project updated", body = ProjectResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Project not found")
    ),
    tag = "projects"
)]
pub async fn update_project(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<UpdateProjectRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let replaced_keys = match update_project_row(&pool, id, &payload).await {
        Ok(keys) => keys,
        Err(err) => return err.into_response(),
    };

    delete_media_objects(&state, &replaced_keys).await;

    match fetch_project(&pool, id).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to load updated project: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/projects/{id}",
    params(("id" = String, Path, description = "Project id")),
    responses(
        (status = 204, description = "Project, gallery rows, and media deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Project not found")
    ),
    tag = "projects"
)]
pub async fn delete_project(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let keys = match delete_project_rows(&pool, id).await {
        Ok(keys) => keys,
        Err(err) => return err.into_response(),
    };

    delete_media_objects(&state, &keys).await;

    StatusCode::NO_CONTENT.into_response()
}

/// Best-effort cleanup once the rows are already gone.
async fn delete_media_objects(state: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(err) = state.media().delete(key).await {
            warn!(key = %key, "failed to delete project media: {err:#}");
        }
    }
}

const COLUMNS: &str = r#"
    id,
    id::text AS id_text,
    title,
    description,
    category,
    location,
    year,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

struct ProjectRow {
    id: Uuid,
    response: ProjectResponse,
}

fn row_to_project(row: &sqlx::postgres::PgRow) -> ProjectRow {
    ProjectRow {
        id: row.get("id"),
        response: ProjectResponse {
            id: row.get("id_text"),
            title: row.get("title"),
            description: row.get("description"),
            category: row.get("category"),
            location: row.get("location"),
            year: row.get("year"),
            images: Vec::new(),
            created_at: row.get("created_at"),
        },
    }
}

async fn fetch_projects(pool: &PgPool) -> Result<Vec<ProjectResponse>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM projects ORDER BY created_at DESC");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query).fetch_all(pool).instrument(span).await?;
    let mut projects: Vec<ProjectRow> = rows.iter().map(row_to_project).collect();

    let query = r"
        SELECT project_id, url, position
        FROM project_images
        ORDER BY project_id, position ASC
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let image_rows = sqlx::query(query).fetch_all(pool).instrument(span).await?;
    for row in &image_rows {
        let project_id: Uuid = row.get("project_id");
        if let Some(project) = projects.iter_mut().find(|p| p.id == project_id) {
            project.response.images.push(ProjectImageResponse {
                url: row.get("url"),
                position: row.get("position"),
            });
        }
    }

    Ok(projects.into_iter().map(|p| p.response).collect())
}

async fn fetch_project(pool: &PgPool, id: Uuid) -> Result<Option<ProjectResponse>, sqlx::Error> {
    let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1 LIMIT 1");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let Some(row) = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await?
    else {
        return Ok(None);
    };
    let mut project = row_to_project(&row);

    let query = "SELECT url, position FROM project_images WHERE project_id = $1 ORDER BY position ASC";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let image_rows = sqlx::query(query)
        .bind(id)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    project.response.images = image_rows
        .iter()
        .map(|row| ProjectImageResponse {
            url: row.get("url"),
            position: row.get("position"),
        })
        .collect();

    Ok(Some(project.response))
}

async fn insert_project(
    pool: &PgPool,
    title: &str,
    description: &str,
    payload: &CreateProjectRequest,
) -> Result<Uuid, StorageError> {
    let mut tx = pool.begin().await.map_err(StorageError::Database)?;

    let query = r"
        INSERT INTO projects (title, description, category, location, year)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(title)
        .bind(description)
        .bind(payload.category.as_deref())
        .bind(payload.location.as_deref())
        .bind(payload.year)
        .fetch_one(&mut *tx)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    let id: Uuid = row.get("id");

    insert_images(&mut tx, id, &payload.images).await?;

    tx.commit().await.map_err(StorageError::Database)?;
    Ok(id)
}

async fn insert_images(
    tx: &mut Transaction<'_, Postgres>,
    project_id: Uuid,
    images: &[ProjectImageInput],
) -> Result<(), StorageError> {
    let query = r"
        INSERT INTO project_images (project_id, url, key, position)
        VALUES ($1, $2, $3, $4)
    ";
    for (position, image) in images.iter().enumerate() {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let position = i32::try_from(position).unwrap_or(i32::MAX);
        sqlx::query(query)
            .bind(project_id)
            .bind(&image.url)
            .bind(&image.key)
            .bind(position)
            .execute(&mut **tx)
            .instrument(span)
            .await
            .map_err(StorageError::Database)?;
    }
    Ok(())
}

/// Apply the update and return the keys of any replaced gallery images.
async fn update_project_row(
    pool: &PgPool,
    id: Uuid,
    payload: &UpdateProjectRequest,
) -> Result<Vec<String>, StorageError> {
    let mut tx = pool.begin().await.map_err(StorageError::Database)?;

    let query = r"
        UPDATE projects
        SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            category = COALESCE($3, category),
            location = COALESCE($4, location),
            year = COALESCE($5, year)
        WHERE id = $6
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(payload.title.as_deref().map(str::trim))
        .bind(payload.description.as_deref().map(str::trim))
        .bind(payload.category.as_deref())
        .bind(payload.location.as_deref())
        .bind(payload.year)
        .bind(id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    if result.rows_affected() == 0 {
        return Err(StorageError::NotFound);
    }

    let mut replaced_keys = Vec::new();
    if let Some(images) = &payload.images {
        replaced_keys = delete_image_rows(&mut tx, id).await?;
        insert_images(&mut tx, id, images).await?;
    }

    tx.commit().await.map_err(StorageError::Database)?;
    Ok(replaced_keys)
}

async fn delete_image_rows(
    tx: &mut Transaction<'_, Postgres>,
    project_id: Uuid,
) -> Result<Vec<String>, StorageError> {
    let query = "DELETE FROM project_images WHERE project_id = $1 RETURNING key";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(project_id)
        .fetch_all(&mut **tx)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    Ok(rows.iter().map(|row| row.get("key")).collect())
}

/// Delete the gallery rows and the project row together and return the
/// orphaned media keys.
async fn delete_project_rows(pool: &PgPool, id: Uuid) -> Result<Vec<String>, StorageError> {
    let mut tx = pool.begin().await.map_err(StorageError::Database)?;

    let keys = delete_image_rows(&mut tx, id).await?;

    let query = "DELETE FROM projects WHERE id = $1";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    if result.rows_affected() == 0 {
        // Rolls back the image deletion as well.
        return Err(StorageError::NotFound);
    }

    tx.commit().await.map_err(StorageError::Database)?;
    Ok(keys)
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
    async fn fetch_projects_fails_without_db() {
        assert!(fetch_projects(&unreachable_pool()).await.is_err());
    }

    #[tokio::test]
    async fn delete_project_rows_fails_without_db() {
        let result = delete_project_rows(&unreachable_pool(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }

    #[test]
    fn create_request_defaults_to_empty_gallery() -> Result<(), serde_json::Error> {
        let payload: CreateProjectRequest = serde_json::from_str(
            r#"{"title":"Immeuble R+3","description":"Gros œuvre et finitions."}"#,
        )?;
        assert!(payload.images.is_empty());
        Ok(())
    }

    #[test]
    fn image_keys_stay_out_of_responses() -> Result<(), serde_json::Error> {
        let response = ProjectResponse {
            id: "x".to_string(),
            title: "Villa".to_string(),
            description: "Construction neuve.".to_string(),
            category: None,
            location: Some("Cotonou".to_string()),
            year: Some(2025),
            images: vec![ProjectImageResponse {
                url: "/media/01H-villa.jpg".to_string(),
                position: 0,
            }],
            created_at: "2026-01-01T00:00:00Z".to_string(),
        };
        let value = serde_json::to_value(response)?;
        assert!(value["images"][0].get("key").is_none());
        Ok(())
    }
}
