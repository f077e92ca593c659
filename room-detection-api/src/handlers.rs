use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::extract::{Json, Multipart, Query, State};
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use room_postprocess::{build_detection_result, DetectionResult, DEFAULT_OVERLAP_THRESHOLD, DEFAULT_SCORE_THRESHOLD};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::ServiceContext;
use crate::error::ApiError;

/// Multipart field carrying the blueprint image
pub const UPLOAD_FIELD: &str = "file";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub device: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DetectParams {
    /// Minimum model score for a detection to be reported
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// IoU above which the lower-confidence room is dropped
    #[serde(default = "default_overlap_threshold")]
    pub overlap_threshold: f64,
}

fn default_threshold() -> f64 {
    DEFAULT_SCORE_THRESHOLD
}

fn default_overlap_threshold() -> f64 {
    DEFAULT_OVERLAP_THRESHOLD
}

/// Any finite value is accepted: a threshold above 1 reports no rooms and an
/// overlap threshold above 1 keeps every room
fn validate_threshold(name: &str, value: f64) -> Result<(), ApiError> {
    if !value.is_finite() {
        return Err(ApiError::InvalidThreshold(format!(
            "{} must be a finite number, got {}",
            name, value
        )));
    }
    Ok(())
}

pub async fn health_check(State(ctx): State<Arc<ServiceContext>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model_loaded: ctx.model_loaded(),
        device: ctx.device().to_string(),
    })
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::InvalidMultipart(e.body_text())
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(multipart_error)?;
            return Ok(bytes.to_vec());
        }
    }

    Err(ApiError::MissingFile)
}

/// Decode an uploaded image into RGB, rotated into its display orientation
/// when the file carries EXIF orientation
pub fn decode_upload(bytes: &[u8]) -> Result<RgbImage, ApiError> {
    let invalid = |e: image::ImageError| ApiError::InvalidImage(e.to_string());

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ApiError::InvalidImage(e.to_string()))?
        .into_decoder()
        .map_err(invalid)?;
    let orientation = decoder.orientation().map_err(invalid)?;

    let mut img = DynamicImage::from_decoder(decoder).map_err(invalid)?;
    img.apply_orientation(orientation);

    Ok(img.to_rgb8())
}

/// Detect rooms in an uploaded blueprint image.
///
/// Boxes are returned both in pixels and normalized to 0-1000. Extractor
/// rejections are deferred so that a missing model always answers 503.
pub async fn detect_rooms_handler(
    State(ctx): State<Arc<ServiceContext>>,
    params: Result<Query<DetectParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResult>, ApiError> {
    let model = ctx
        .model()
        .ok_or_else(|| ApiError::ModelNotLoaded(ctx.model_path().display().to_string()))?;

    let Query(params) = params.map_err(|e| ApiError::InvalidQuery(e.body_text()))?;
    validate_threshold("threshold", params.threshold)?;
    validate_threshold("overlap_threshold", params.overlap_threshold)?;

    let mut multipart = multipart.map_err(|e| ApiError::InvalidMultipart(e.body_text()))?;
    let bytes = read_upload(&mut multipart).await?;
    info!("Received detection request, image size: {} bytes", bytes.len());

    let img = decode_upload(&bytes)?;
    let (width, height) = img.dimensions();
    info!("Image decoded: {}x{}", width, height);

    let start_time = Instant::now();

    let result = tokio::task::spawn_blocking(move || -> anyhow::Result<DetectionResult> {
        let detections = model.predict(&img)?;
        Ok(build_detection_result(
            &detections,
            width,
            height,
            params.threshold,
            params.overlap_threshold,
        ))
    })
    .await
    .map_err(|e| ApiError::InferenceFailed(format!("inference task failed: {}", e)))?
    .map_err(|e| ApiError::InferenceFailed(format!("{:#}", e)))?;

    info!(
        "Detected {} rooms in {}ms (threshold: {}, overlap_threshold: {})",
        result.total_rooms,
        start_time.elapsed().as_millis(),
        params.threshold,
        params.overlap_threshold
    );

    Ok(Json(result))
}
