//! Fixed demo clip, re-rendered on every request.

use axum::extract::{Request, State};
use axum::response::Response;

use pkgif_models::RenderKind;

use crate::error::ApiResult;
use crate::handlers::artifact::serve_artifact;
use crate::state::AppState;

/// `GET /test/preview`
pub async fn demo_preview(State(state): State<AppState>, request: Request) -> ApiResult<Response> {
    let path = state.service.render_demo(RenderKind::Preview).await?;
    serve_artifact(&path, request).await
}

/// `GET /test/render`
pub async fn demo_render(State(state): State<AppState>, request: Request) -> ApiResult<Response> {
    let path = state.service.render_demo(RenderKind::Full).await?;
    serve_artifact(&path, request).await
}
