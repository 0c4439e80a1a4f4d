//! Client testimonials; only published entries are public.

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
pub struct TestimonialResponse {
    pub id: String,
    pub author: String,
    pub company: Option<String>,
    pub quote: String,
    pub published: bool,
    pub created_at: String,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct CreateTestimonialRequest {
    pub author: String,
    pub company: Option<String>,
    pub quote: String,
    #[serde(default)]
    pub published: bool,
}

#[derive(ToSchema, Deserialize, Debug)]
pub struct UpdateTestimonialRequest {
    pub author: Option<String>,
    pub company: Option<String>,
    pub quote: Option<String>,
    pub published: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/testimonials",
    responses(
        (status = 200, description = "Published testimonials; the full list with a valid admin token", body = [TestimonialResponse]),
        (status = 401, description = "A token was supplied but did not verify")
    ),
    tag = "testimonials"
)]
pub async fn list_testimonials(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    // An invalid supplied token is rejected rather than downgraded, so an
    // expired console session is visible to the back-office.
    let admin = match maybe_admin(&headers, &state) {
        Ok(admin) => admin,
        Err(status) => return status.into_response(),
    };

    match fetch_testimonials(&pool, admin.is_some()).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(err) => {
            error!("Failed to list testimonials: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/testimonials",
    request_body = CreateTestimonialRequest,
    responses(
        (status = 201, description = "Testimonial created", body = TestimonialResponse),
        (status = 400, description = "Invalid input", body = String),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "testimonials"
)]
pub async fn create_testimonial(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<CreateTestimonialRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let author = payload.author.trim();
    let quote = payload.quote.trim();
    if author.is_empty() || quote.is_empty() {
        return (StatusCode::BAD_REQUEST, "Author and quote are required.").into_response();
    }

    match insert_testimonial(&pool, author, quote, &payload).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    put,
    path = "/api/testimonials/{id}",
    request_body = UpdateTestimonialRequest,
    params(("id" = String, Path, description = "Testimonial id")),
    responses(
        (status = 200, description = "Testimonial updated", body = TestimonialResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Testimonial not found")
    ),
    tag = "testimonials"
)]
pub async fn update_testimonial(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
    Json(payload): Json<UpdateTestimonialRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match update_testimonial_row(&pool, id, &payload).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    delete,
    path = "/api/testimonials/{id}",
    params(("id" = String, Path, description = "Testimonial id")),
    responses(
        (status = 204, description = "Testimonial deleted"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "Testimonial not found")
    ),
    tag = "testimonials"
)]
pub async fn delete_testimonial(
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    match delete_testimonial_row(&pool, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

fn row_to_response(row: &sqlx::postgres::PgRow) -> TestimonialResponse {
    TestimonialResponse {
        id: row.get("id"),
        author: row.get("author"),
        company: row.get("company"),
        quote: row.get("quote"),
        published: row.get("published"),
        created_at: row.get("created_at"),
    }
}

async fn fetch_testimonials(
    pool: &PgPool,
    include_unpublished: bool,
) -> Result<Vec<TestimonialResponse>, sqlx::Error> {
    let query = r#"
        SELECT
            id::text AS id,
            author,
            company,
            quote,
            published,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
        FROM testimonials
        WHERE published OR $1
        ORDER BY created_at DESC
    "#;
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let rows = sqlx::query(query)
        .bind(include_unpublished)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(row_to_response).collect())
}

async fn insert_testimonial(
    pool: &PgPool,
    author: &str,
    quote: &str,
    payload: &CreateTestimonialRequest,
) -> Result<TestimonialResponse, StorageError> {
    let query = r#"
        INSERT INTO testimonials (author, company, quote, published)
        VALUES ($1, $2, $3, $4)
        RETURNING
            id::text AS id,
            author,
            company,
            quote,
            published,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(author)
        .bind(payload.company.as_deref())
        .bind(quote)
        .bind(payload.published)
        .fetch_one(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    Ok(row_to_response(&row))
}

async fn update_testimonial_row(
    pool: &PgPool,
    id: Uuid,
    payload: &UpdateTestimonialRequest,
) -> Result<TestimonialResponse, StorageError> {
    let query = r#"
        UPDATE testimonials
        SET
            author = COALESCE($1, author),
            company = COALESCE($2, company),
            quote = COALESCE($3, quote),
            published = COALESCE($4, published)
        WHERE id = $5
        RETURNING
            id::text AS id,
            author,
            company,
            quote,
            published,
            to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at
    "#;
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(payload.author.as_deref().map(str::trim))
        .bind(payload.company.as_deref())
        .bind(payload.quote.as_deref().map(str::trim))
        .bind(payload.published)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .map_err(StorageError::Database)?;
    row.as_ref().map(row_to_response).ok_or(StorageError::NotFound)
}

async fn delete_testimonial_row(pool: &PgPool, id: Uuid) -> Result<(), StorageError> {
    let query = "DELETE FROM testimonials WHERE id = $1";
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
    async fn fetch_testimonials_fails_without_db() {
        assert!(fetch_testimonials(&unreachable_pool(), false).await.is_err());
    }

    #[test]
    fn create_request_defaults_to_unpublished() -> Result<(), serde_json::Error> {
        let payload: CreateTestimonialRequest =
            serde_json::from_str(r#"{"author":"M. Diallo","quote":"Travail soigné."}"#)?;
        assert!(!payload.published);
        Ok(())
    }
}
