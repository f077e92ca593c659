//! Post-processing for instance-segmentation output on blueprint images.
//!
//! Turns raw Mask R-CNN detections (pixel boxes, scores, probability masks)
//! into deduplicated rooms with polygons and boxes normalized to a 0-1000
//! coordinate space.

use image::{ImageBuffer, Luma};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod geometry;
pub mod normalize;
pub mod polygon;
pub mod suppression;

pub use geometry::{compute_iou, BoundingBox};
pub use normalize::{normalize_bbox, to_normalized, to_pixel, NORMALIZED_SIZE};
pub use polygon::{mask_to_polygon, MASK_THRESHOLD};
pub use suppression::{remove_overlapping, Scored};

/// Default minimum model score for a detection to become a room candidate
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.7;

/// Default IoU above which the lower-confidence room is dropped
pub const DEFAULT_OVERLAP_THRESHOLD: f64 = 0.3;

/// Per-pixel foreground probability at image resolution
pub type ProbabilityMask = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Raw model output for a single candidate region
#[derive(Debug, Clone)]
pub struct Detection {
    /// Box in pixel space
    pub bbox: BoundingBox,
    /// Model confidence (0.0-1.0)
    pub score: f32,
    pub mask: ProbabilityMask,
}

/// Post-processed room as served to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    /// [x_min, y_min, x_max, y_max] normalized to 0-1000
    pub bounding_box: [f64; 4],
    pub bbox_pixels: BoundingBox,
    /// Simplified mask contour in pixel coordinates
    pub vertices: Vec<[i32; 2]>,
    pub confidence: f64,
    pub name_hint: Option<String>,
}

impl Scored for Room {
    fn confidence(&self) -> f64 {
        self.confidence
    }

    fn bbox(&self) -> &BoundingBox {
        &self.bbox_pixels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub image_size: ImageSize,
    pub total_rooms: usize,
    pub rooms: Vec<Room>,
}

/// Format a 1-based room identifier, e.g. `room_007`
pub fn room_id(index: usize) -> String {
    format!("room_{:03}", index)
}

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Build a room candidate from a single detection.
///
/// The returned room carries a provisional ID derived from `index`; final
/// IDs are assigned after overlap suppression.
pub fn detection_to_room(detection: &Detection, index: usize, size: ImageSize) -> Room {
    let vertices = mask_to_polygon(&detection.mask)
        .into_iter()
        .map(|p| [p.x, p.y])
        .collect();

    Room {
        id: room_id(index + 1),
        bounding_box: normalize_bbox(&detection.bbox, size.width, size.height),
        bbox_pixels: detection.bbox,
        vertices,
        confidence: round_to(detection.score as f64, 3),
        name_hint: None,
    }
}

/// Reassign sequential, gap-free IDs in output order
pub fn reassign_ids(rooms: &mut [Room]) {
    for (idx, room) in rooms.iter_mut().enumerate() {
        room.id = room_id(idx + 1);
    }
}

/// Run the full post-processing pipeline over one image's detections.
///
/// Detections scoring below `score_threshold` are dropped, the rest become
/// room candidates, overlapping candidates are suppressed at
/// `overlap_threshold` IoU and the survivors are renumbered.
pub fn build_detection_result(
    detections: &[Detection],
    width: u32,
    height: u32,
    score_threshold: f64,
    overlap_threshold: f64,
) -> DetectionResult {
    let size = ImageSize { width, height };

    let candidates: Vec<Room> = detections
        .iter()
        .filter(|d| d.score as f64 >= score_threshold)
        .enumerate()
        .map(|(idx, d)| detection_to_room(d, idx, size))
        .collect();

    let candidate_count = candidates.len();
    let mut rooms = remove_overlapping(candidates, overlap_threshold);
    reassign_ids(&mut rooms);

    debug!(
        "Post-processed {} detections: {} above threshold, {} kept after suppression",
        detections.len(),
        candidate_count,
        rooms.len()
    );

    DetectionResult {
        image_size: size,
        total_rooms: rooms.len(),
        rooms,
    }
}
