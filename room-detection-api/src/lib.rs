//! HTTP service exposing Mask R-CNN room detection for blueprint images.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod model;

pub use config::ServiceConfig;
pub use context::ServiceContext;
pub use error::{ApiError, ErrorResponse};
pub use model::{Device, OnnxMaskRcnn, SegmentationModel};

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|s| match s.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                warn!("Ignoring invalid CORS origin '{}'", s);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(origins)
    }
}

/// Build the router with all routes and middleware.
///
/// Exposed so integration tests can drive the app without binding a socket.
pub fn create_app(ctx: Arc<ServiceContext>, config: &ServiceConfig) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/detect", post(handlers::detect_rooms_handler))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
