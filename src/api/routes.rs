use axum::{
    http::Uri,
    middleware,
    routing::{any, get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::storage::RecordStore;

use super::handlers::{health_check, result_card, submit_telemetry, AppState};
use super::middleware::no_cache;
use super::speedtest::{empty, garbage, get_ip};
use super::static_files::serve_static;

pub fn create_router<S: RecordStore + 'static>(
    state: AppState<S>,
    static_dir: Option<PathBuf>,
    enable_cors: bool,
) -> Router {
    let state = Arc::new(state);

    let router = Router::new()
        .route("/results/telemetry", post(submit_telemetry::<S>))
        .route("/telemetry", post(submit_telemetry::<S>))
        .route("/results", get(result_card::<S>))
        .route("/results/", get(result_card::<S>))
        .route("/getIP", get(get_ip::<S>))
        .route("/empty", any(empty))
        .route("/garbage", get(garbage::<S>))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(no_cache))
        .with_state(state)
        .fallback(move |uri: Uri| serve_static(uri, static_dir.clone()));

    if enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
