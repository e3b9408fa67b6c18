//! Video handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::response::Response;
use axum::Json;
use tracing::info;
use validator::Validate;

use pkgif_models::{CreateVideoRequest, VideoRecord};

use crate::error::{ApiError, ApiResult};
use crate::handlers::artifact::serve_artifact;
use crate::state::AppState;

/// `POST /video`: resolve an id or URL and optionally start caching it.
pub async fn create_video(
    State(state): State<AppState>,
    payload: Result<Json<CreateVideoRequest>, JsonRejection>,
) -> ApiResult<Json<VideoRecord>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate()?;

    let record = state.service.resolve_video(&request.video_url, request.save).await?;
    info!(video_id = %record.id, save = request.save, status = %record.cache_state, "Video resolved");
    Ok(Json(record))
}

/// `GET /video/{id}`
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<VideoRecord>> {
    let record = state.service.get_video(&video_id).await?;
    Ok(Json(record))
}

/// `GET /video/{id}/preview`: low-resolution derivative, derived on first request.
pub async fn video_preview(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    let path = state.service.video_preview(&video_id).await?;
    serve_artifact(&path, request).await
}
