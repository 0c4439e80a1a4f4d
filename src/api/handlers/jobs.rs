//! Job postings; only active ones are public.

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

use super::{
    auth::principal::{maybe_admin, require_admin},
    storage::StorageError,
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct JobPostingResponse {
    pub id: String,
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub contract_type: Option<String>,
    pub active: bool,
    pub created_at: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateJobPostingRequest {
    pub title: String,
    pub description: String,
    pub location: Option<String>,
    pub contract_type: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateJobPostingRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub contract_type: Option<String>,
    pub active: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/jobs",
    responses(
        (status = 200, description = "Active postings; all postings with a valid admin token", body = [JobPostingResponse]),
        (status = 401, description = "A token was supplied but did not verify")
    ),
    tag = "jobs"
)]
pub async fn list_jobs(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let admin = match maybe_admin(&headers, &state) {
        Ok(admin) => admin,
        Err(status) => return status.into_response(),
    };

    match fetch_jobs(&pool, admin.is_some()).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list job postings: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(("id" = String, Path, description = "Job posting id")),
    responses(
        (status = 200, description = "Job posting detail", body = JobPostingResponse),
        (status = 404, description = "Job posting not found or inactive")
    ),
    tag = "jobs"
)]
pub async fn get_job(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    let admin = match maybe_admin(&headers, &state) {
        Ok(admin) => admin,
        Err(status) => return status.into_response(),
    };

    match fetch_job(&pool, id, admin.is_some()).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to get job posting: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/jobs",
    request_body = CreateJobPostingRequest,
    responses(
        (status = 201, description = "Job posting created", body = JobPostingResponse),
        (status = 400, description = "Invalid input", body = String),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "jobs"
)]
pub async fn create_job(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<CreateJobPostingRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let title = payload.title.trim();
    if title.is_empty() || payload.description.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Title and description are required.").into_response();
    }

    match insert_job(&pool, title, payload.description.trim(), &payload).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/jobs/{id}",
    request_body = UpdateJobPostingRequest,
    params(("id" = String, Path, description = "Job posting id")),
    responses(
        (status = 200, description = "Job posting updated", body = JobPostingResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job posting not found")
    ),
    tag = "jobs"
)]
pub async fn update_job(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<UpdateJobPostingRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match update_job_row(&pool, id, &payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/jobs/{id}",
    params(("id" = String, Path, description = "Job posting id")),
    responses(
        (status = 204, description = "Job posting deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Job posting not found")
    ),
    tag = "jobs"
)]
pub async fn delete_job(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match delete_job_row(&pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn row_to_response(row: &sqlx::postgres::PgRow) -> JobPostingResponse {
    JobPostingResponse {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        location: row.get("location"),
        contract_type: row.get("contract_type"),
        active: row.get("active"),
        created_at: row.get("created_at"),
    }
}

const COLUMNS: &str = r#"
    id::text AS id,
    title,
    description,
    location,
    contract_type,
    active,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

async fn fetch_jobs(
    pool: &PgPool,
    include_inactive: bool,
) -> Result<Vec<JobPostingResponse>, sqlx::Error> {
    let query = format!(
        "SELECT {COLUMNS} FROM job_postings WHERE active OR $1 ORDER BY created_at DESC"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(include_inactive)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(row_to_response).collect())
}

async fn fetch_job(
    pool: &PgPool,
    id: Uuid,
    include_inactive: bool,
) -> Result<Option<JobPostingResponse>, sqlx::Error> {
    let query = format!(
        "SELECT {COLUMNS} FROM job_postings WHERE id = $1 AND (active OR $2) LIMIT 1"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(id)
        .bind(include_inactive)
        .fetch_optional(pool)
        .instrument(span)
        .await?;
    Ok(row.as_ref().map(row_to_response))
}

async fn insert_job(
    pool: &PgPool,
    title: &str,
    description: &str,
    payload: &CreateJobPostingRequest,
) -> Result<JobPostingResponse, StorageError> {
    let query = format!(
        "INSERT INTO job_postings (title, description, location, contract_type, active)
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
        .bind(description)
        .bind(payload.location.as_deref())
        .bind(payload.contract_type.as_deref())
        .bind(payload.active)
        .fetch_one(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    Ok(row_to_response(&row))
}

async fn update_job_row(
    pool: &PgPool,
    id: Uuid,
    payload: &UpdateJobPostingRequest,
) -> Result<JobPostingResponse, StorageError> {
    let query = format!(
        r"
        UPDATE job_postings
        SET
            title = COALESCE($1, title),
            description = COALESCE($2, description),
            location = COALESCE($3, location),
            contract_type = COALESCE($4, contract_type),
            active = COALESCE($5, active)
        WHERE id = $6
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
        .bind(payload.description.as_deref().map(str::trim))
        .bind(payload.location.as_deref())
        .bind(payload.contract_type.as_deref())
        .bind(payload.active)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    row.as_ref().map(row_to_response).ok_or(StorageError::NotFound)
}

async fn delete_job_row(pool: &PgPool, id: Uuid) -> Result<(), StorageError> {
    let query = "DELETE FROM job_postings WHERE id = $1";
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
    async fn fetch_jobs_fails_without_db() {
        assert!(fetch_jobs(&unreachable_pool(), true).await.is_err());
    }

    #[test]
    fn create_request_is_active_by_default() -> Result<(), serde_json::Error> {
        let payload: CreateJobPostingRequest = serde_json::from_str(
            r#"{"title":"Chef de chantier","description":"CDI, secteur Dakar."}"#,
        )?;
        assert!(payload.active);
        Ok(())
    }
}
