use crate::geometry::BoundingBox;
use crate::round_to;

/// Standard normalized coordinate space (0-1000 on both axes)
pub const NORMALIZED_SIZE: f64 = 1000.0;

/// Map a pixel coordinate into normalized space along an axis of `dimension` pixels
pub fn to_normalized(pixel: f64, dimension: u32) -> f64 {
    pixel / dimension as f64 * NORMALIZED_SIZE
}

/// Inverse of [`to_normalized`]
pub fn to_pixel(normalized: f64, dimension: u32) -> f64 {
    normalized * dimension as f64 / NORMALIZED_SIZE
}

/// Normalize a pixel box to `[x_min, y_min, x_max, y_max]` in 0-1000,
/// rounded to one decimal place.
pub fn normalize_bbox(bbox: &BoundingBox, width: u32, height: u32) -> [f64; 4] {
    [
        round_to(to_normalized(bbox.x1, width), 1),
        round_to(to_normalized(bbox.y1, height), 1),
        round_to(to_normalized(bbox.x2, width), 1),
        round_to(to_normalized(bbox.y2, height), 1),
    ]
}
