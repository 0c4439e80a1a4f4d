//! Media uploads for the back-office.

use crate::api::config::AppState;
use axum::{
    Json,
    extract::{Extension, Multipart},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

use super::auth::principal::require_admin;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UploadResponse {
    pub url: String,
    pub key: String,
}

#[utoipa::path(
    post,
    path = "/api/uploads",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = UploadResponse),
        (status = 400, description = "No file part or file too large", body = String),
        (status = 401, description = "Missing or invalid token")
    ),
    tag = "uploads"
)]
pub async fn upload(
    headers: HeaderMap,
    state: Extension<Arc<AppState>>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    if let Err(status) = require_admin(&headers, &state) {
        return status.into_response();
    }

    let field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("file") => break field,
            Ok(Some(_)) => {}
            Ok(None) => {
                return (StatusCode::BAD_REQUEST, "Missing multipart field: file").into_response();
            }
            Err(err) => {
                return (StatusCode::BAD_REQUEST, format!("Invalid multipart body: {err}"))
                    .into_response();
            }
        }
    };

    let filename = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = match field.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("Failed to read upload: {err}"))
                .into_response();
        }
    };
    if bytes.len() > MAX_UPLOAD_BYTES {
        return (StatusCode::BAD_REQUEST, "File exceeds the 10 MiB upload limit.").into_response();
    }

    match state.media().store(&filename, &content_type, bytes.to_vec()).await {
        Ok(stored) => (
            StatusCode::CREATED,
            Json(UploadResponse {
                url: stored.url,
                key: stored.key,
            }),
        )
            .into_response(),
        Err(err) => {
            error!("Failed to store upload: {err:#}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_has_url_and_key() -> Result<(), serde_json::Error> {
        let response = UploadResponse {
            url: "http://localhost:8080/media/01H-plan.pdf".to_string(),
            key: "01H-plan.pdf".to_string(),
        };
        let value = serde_json::to_value(response)?;
        assert!(value.get("url").is_some());
        assert!(value.get("key").is_some());
        Ok(())
    }
}
