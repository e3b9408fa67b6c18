//! Clip handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use tracing::info;
use validator::Validate;

use pkgif_models::{ClipUpdate, ClipView, CreateClipRequest, RenderKind, UpdateClipRequest};

use crate::error::{ApiError, ApiResult};
use crate::handlers::artifact::serve_artifact;
use crate::state::AppState;

/// `POST /clip`: register a clip; its source starts caching in the background.
pub async fn create_clip(
    State(state): State<AppState>,
    payload: Result<Json<CreateClipRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ClipView>)> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate()?;

    let view = state
        .service
        .create_clip(&request.video_id, request.clip_start, request.clip_end, Vec::new())
        .await?;
    info!(clip_id = %view.clip.id, video_id = %view.clip.video_id, "Clip created");
    Ok((StatusCode::CREATED, Json(view)))
}

/// `GET /clip`
pub async fn list_clips(State(state): State<AppState>) -> Json<Vec<ClipView>> {
    Json(state.service.list_clips())
}

/// `GET /clip/{id}`
pub async fn get_clip(
    State(state): State<AppState>,
    Path(clip_id): Path<String>,
) -> ApiResult<Json<ClipView>> {
    Ok(Json(state.service.get_clip(&clip_id)?))
}

/// `PUT /clip/{id}`: replace captions, and the range when given.
pub async fn update_clip(
    State(state): State<AppState>,
    Path(clip_id): Path<String>,
    payload: Result<Json<UpdateClipRequest>, JsonRejection>,
) -> ApiResult<Json<ClipView>> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    request.validate()?;

    let view = state.service.update_clip(&clip_id, ClipUpdate::from(request))?;
    info!(clip_id = %view.clip.id, captions = view.clip.captions.len(), stale = view.stale, "Clip updated");
    Ok(Json(view))
}

/// `GET /clip/{id}/preview`
pub async fn clip_preview(
    State(state): State<AppState>,
    Path(clip_id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    render_and_serve(&state, &clip_id, RenderKind::Preview, request).await
}

/// `GET /clip/{id}/render`
pub async fn clip_render(
    State(state): State<AppState>,
    Path(clip_id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    render_and_serve(&state, &clip_id, RenderKind::Full, request).await
}

async fn render_and_serve(
    state: &AppState,
    clip_id: &str,
    kind: RenderKind,
    request: Request,
) -> ApiResult<Response> {
    let path = state.service.render_clip(clip_id, kind).await?;
    serve_artifact(&path, request).await
}
