//! Company photo endpoints
//!
//! - GET /api/v1/companies/photos - List own photo URLs
//! - POST /api/v1/companies/photos - Upload (multipart, `photos` fields)
//! - DELETE /api/v1/companies/photos - Remove by public URL

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{json_body, Empty};
use crate::api::middleware::{ApiError, AppState, AuthenticatedCompany};
use crate::services::PhotoUpload;

/// Multipart field name carrying photos
const PHOTO_FIELD: &str = "photos";

/// Photos accepted in one upload request
const MAX_PHOTOS_PER_REQUEST: usize = 10;

#[derive(Debug, Serialize)]
pub struct PhotoUrlsResponse {
    #[serde(rename = "photoURLS")]
    pub photo_urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletePhotosRequest {
    #[serde(rename = "publicURLS")]
    pub public_urls: Vec<String>,
}

/// Photo routes. The body limit leaves room for a full batch plus
/// multipart framing.
pub fn router(max_file_size: u64) -> Router<AppState> {
    let body_limit = (max_file_size as usize)
        .saturating_mul(MAX_PHOTOS_PER_REQUEST)
        .saturating_add(64 * 1024);

    Router::new()
        .route(
            "/photos",
            get(list_photos).post(upload_photos).delete(delete_photos),
        )
        .layer(DefaultBodyLimit::max(body_limit))
}

/// GET /api/v1/companies/photos
async fn list_photos(
    State(state): State<AppState>,
    auth: AuthenticatedCompany,
) -> Result<Json<PhotoUrlsResponse>, ApiError> {
    let photo_urls = state
        .photo_service
        .list(auth.company.id)
        .await
        .map_err(|e| state.error_handler.photo(e))?;

    Ok(Json(PhotoUrlsResponse { photo_urls }))
}

/// POST /api/v1/companies/photos
async fn upload_photos(
    State(state): State<AppState>,
    auth: AuthenticatedCompany,
    mut multipart: Multipart,
) -> Result<Json<PhotoUrlsResponse>, ApiError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }
        if uploads.len() == MAX_PHOTOS_PER_REQUEST {
            return Err(ApiError::validation_error(format!(
                "At most {} photos per request",
                MAX_PHOTOS_PER_REQUEST
            )));
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        uploads.push(PhotoUpload {
            content_type,
            data: data.to_vec(),
        });
    }

    let photo_urls = state
        .photo_service
        .upload(auth.company.id, uploads)
        .await
        .map_err(|e| state.error_handler.photo(e))?;

    Ok(Json(PhotoUrlsResponse { photo_urls }))
}

/// DELETE /api/v1/companies/photos
async fn delete_photos(
    State(state): State<AppState>,
    auth: AuthenticatedCompany,
    payload: Result<Json<DeletePhotosRequest>, JsonRejection>,
) -> Result<Json<Empty>, ApiError> {
    let body = json_body(payload)?;

    state
        .photo_service
        .delete(auth.company.id, &body.public_urls)
        .await
        .map_err(|e| state.error_handler.photo(e))?;

    Ok(Json(Empty::default()))
}
