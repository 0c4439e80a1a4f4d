//! Team member directory shown on the public site.

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
pub struct TeamMemberResponse {
    pub id: String,
    pub name: String,
    pub role: String,
    pub photo_url: Option<String>,
    pub position: i32,
    pub created_at: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateTeamMemberRequest {
    pub name: String,
    pub role: String,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub position: i32,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateTeamMemberRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub photo_url: Option<String>,
    pub position: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/team",
    responses(
        (status = 200, description = "Team members in display order", body = [TeamMemberResponse])
    ),
    tag = "team"
)]
pub async fn list_team(pool: Extension<PgPool>) -> impl IntoResponse {
    match fetch_team(&pool).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list team members: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/team",
    request_body = CreateTeamMemberRequest,
    responses(
        (status = 201, description = "Team member created", body = TeamMemberResponse),
        (status = 400, description = "Invalid input", body = String),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "team"
)]
pub async fn create_team_member(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<CreateTeamMemberRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let name = payload.name.trim();
    let role = payload.role.trim();
    if name.is_empty() || role.is_empty() {
        return (StatusCode::BAD_REQUEST, "Name and role are required.").into_response();
    }

    match insert_team_member(&pool, name, role, &payload).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/team/{id}",
    request_body = UpdateTeamMemberRequest,
    params(("id" = String, Path, description = "Team member id")),
    responses(
        (status = 200, description = "Team member updated", body = TeamMemberResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Team member not found")
    ),
    tag = "team"
)]
pub async fn update_team_member(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<UpdateTeamMemberRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match update_team_member_row(&pool, id, &payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/team/{id}",
    params(("id" = String, Path, description = "Team member id")),
    responses(
        (status = 204, description = "Team member deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Team member not found")
    ),
    tag = "team"
)]
pub async fn delete_team_member(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match delete_team_member_row(&pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn row_to_response(row: &sqlx::postgres::PgRow) -> TeamMemberResponse {
    TeamMemberResponse {
        id: row.get("id"),
        name: row.get("name"),
        role: row.get("role"),
        photo_url: row.get("photo_url"),
        position: row.get("position"),
        created_at: row.get("created_at"),
    }
}

const RETURNING: &str = r#"
    RETURNING
        id::text AS id,
        name,
        role,
        photo_url,
        position,
        to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
"#;

async fn fetch_team(pool: &PgPool) -> Result<Vec<TeamMemberResponse>, sqlx::Error> {
    let query = r#"
        SELECT
            id::text AS id,
            name,
            role,
            photo_url,
            position,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM team_members
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

async fn insert_team_member(
    pool: &PgPool,
    name: &str,
    role: &str,
    payload: &CreateTeamMemberRequest,
) -> Result<TeamMemberResponse, StorageError> {
    let query = format!(
        "INSERT INTO team_members (name, role, photo_url, position) VALUES ($1, $2, $3, $4) {RETURNING}"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(name)
        .bind(role)
        .bind(payload.photo_url.as_deref())
        .bind(payload.position)
        .fetch_one(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    Ok(row_to_response(&row))
}

async fn update_team_member_row(
    pool: &PgPool,
    id: Uuid,
    payload: &UpdateTeamMemberRequest,
) -> Result<TeamMemberResponse, StorageError> {
    let query = format!(
        r"
        UPDATE team_members
        SET
            name = COALESCE($1, name),
            role = COALESCE($2, role),
            photo_url = COALESCE($3, photo_url),
            position = COALESCE($4, position)
        WHERE id = $5
        {RETURNING}
        "
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(payload.name.as_deref().map(str::trim))
        .bind(payload.role.as_deref().map(str::trim))
        .bind(payload.photo_url.as_deref())
        .bind(payload.position)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    row.as_ref().map(row_to_response).ok_or(StorageError::NotFound)
}

async fn delete_team_member_row(pool: &PgPool, id: Uuid) -> Result<(), StorageError> {
    let query = "DELETE FROM team_members WHERE id = $1";
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
    async fn fetch_team_fails_without_db() {
        assert!(fetch_team(&unreachable_pool()).await.is_err());
    }

    #[tokio::test]
    async fn update_team_member_row_fails_without_db() {
        let payload = UpdateTeamMemberRequest {
            name: Some("A. Garba".to_string()),
            role: None,
            photo_url: None,
            position: None,
        };
        let result = update_team_member_row(&unreachable_pool(), Uuid::new_v4(), &payload).await;
        assert!(matches!(result, Err(StorageError::Database(_))));
    }
}
