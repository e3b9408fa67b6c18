//! Serving rendered files from the artifact root.

use std::path::Path;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{ApiError, ApiResult};

/// Stream a file back with `Cache-Control: no-store`.
///
/// Renders are overwritten in place whenever their clip changes, so clients
/// must never reuse an earlier response for the same URL.
pub async fn serve_artifact(path: &Path, request: Request) -> ApiResult<Response> {
    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to serve {}: {}", path.display(), e)))?;

    let mut response = response.map(Body::new);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}
