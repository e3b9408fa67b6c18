//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    clip_preview, clip_render, create_clip, create_video, demo_preview, demo_render, get_clip,
    get_video, health, list_clips, ready, update_clip, video_preview,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, ClientRateLimiter};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let video_routes = Router::new()
        .route("/video", post(create_video))
        .route("/video/:video_id", get(get_video))
        .route("/video/:video_id/preview", get(video_preview));

    let clip_routes = Router::new()
        .route("/clip", get(list_clips).post(create_clip))
        .route("/clip/:clip_id", get(get_clip).put(update_clip))
        .route("/clip/:clip_id/preview", get(clip_preview))
        .route("/clip/:clip_id/render", get(clip_render));

    let demo_routes = if state.config.demo_routes {
        Router::new()
            .route("/test/preview", get(demo_preview))
            .route("/test/render", get(demo_render))
    } else {
        Router::new()
    };

    let rate_limiter = ClientRateLimiter::new(state.config.rate_limit_rps);

    let api_routes = Router::new()
        .merge(video_routes)
        .merge(clip_routes)
        .merge(demo_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
