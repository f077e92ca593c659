use geo::{Area, LineString, Polygon};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;

use crate::ProbabilityMask;

/// Mask probability above which a pixel belongs to the room
pub const MASK_THRESHOLD: f32 = 0.5;

/// Douglas-Peucker tolerance as a fraction of the contour perimeter
pub const SIMPLIFY_EPSILON_RATIO: f64 = 0.02;

pub fn threshold_mask(mask: &ProbabilityMask, threshold: f32) -> GrayImage {
    let mut binary = GrayImage::new(mask.width(), mask.height());
    for (x, y, pixel) in mask.enumerate_pixels() {
        let val = if pixel[0] > threshold { 255 } else { 0 };
        binary.put_pixel(x, y, Luma([val]));
    }
    binary
}

/// Shoelace area of a closed contour
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    let ring: LineString<f64> = points
        .iter()
        .map(|p| (p.x as f64, p.y as f64))
        .collect::<Vec<_>>()
        .into();
    Polygon::new(ring, vec![]).unsigned_area()
}

/// Outer contour with the largest area; the first one wins on ties
pub fn largest_outer_contour(contours: Vec<Contour<i32>>) -> Option<Vec<Point<i32>>> {
    let mut best: Option<(f64, Vec<Point<i32>>)> = None;

    for contour in contours {
        if contour.border_type != BorderType::Outer {
            continue;
        }
        let area = contour_area(&contour.points);
        let larger = best.as_ref().map_or(true, |(best_area, _)| area > *best_area);
        if larger {
            best = Some((area, contour.points));
        }
    }

    best.map(|(_, points)| points)
}

/// Douglas-Peucker simplification of a closed contour with a tolerance of
/// 2% of its perimeter
pub fn simplify_contour(points: &[Point<i32>]) -> Vec<Point<i32>> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let epsilon = SIMPLIFY_EPSILON_RATIO * arc_length(points, true);
    if epsilon <= 0.0 {
        return points.to_vec();
    }

    approximate_polygon_dp(points, epsilon, true)
}

/// Extract a simplified polygon from a probability mask.
///
/// Returns an empty vector when no pixel exceeds [`MASK_THRESHOLD`].
pub fn mask_to_polygon(mask: &ProbabilityMask) -> Vec<Point<i32>> {
    let binary = threshold_mask(mask, MASK_THRESHOLD);
    let contours = find_contours::<i32>(&binary);

    match largest_outer_contour(contours) {
        Some(contour) => simplify_contour(&contour),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    fn mask_from_fn(width: u32, height: u32, inside: impl Fn(u32, u32) -> bool) -> ProbabilityMask {
        ImageBuffer::from_fn(width, height, |x, y| {
            if inside(x, y) {
                Luma([0.9])
            } else {
                Luma([0.1])
            }
        })
    }

    fn extent(points: &[Point<i32>]) -> (i32, i32, i32, i32) {
        let min_x = points.iter().map(|p| p.x).min().unwrap();
        let min_y = points.iter().map(|p| p.y).min().unwrap();
        let max_x = points.iter().map(|p| p.x).max().unwrap();
        let max_y = points.iter().map(|p| p.y).max().unwrap();
        (min_x, min_y, max_x, max_y)
    }

    #[test]
    fn test_threshold_is_strict() {
        let mask: ProbabilityMask = ImageBuffer::from_fn(3, 1, |x, _| match x {
            0 => Luma([0.5]),
            1 => Luma([0.51]),
            _ => Luma([0.0]),
        });
        let binary = threshold_mask(&mask, MASK_THRESHOLD);
        assert_eq!(binary.get_pixel(0, 0)[0], 0);
        assert_eq!(binary.get_pixel(1, 0)[0], 255);
        assert_eq!(binary.get_pixel(2, 0)[0], 0);
    }

    #[test]
    fn test_contour_area_square() {
        let square = vec![
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert!((contour_area(&square) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_mask_yields_no_polygon() {
        let mask = mask_from_fn(32, 32, |_, _| false);
        assert!(mask_to_polygon(&mask).is_empty());
    }

    #[test]
    fn test_rectangle_simplifies_to_corners() {
        let mask = mask_from_fn(100, 80, |x, y| (10..=69).contains(&x) && (20..=59).contains(&y));
        let polygon = mask_to_polygon(&mask);

        assert_eq!(polygon.len(), 4, "got {:?}", polygon);
        assert_eq!(extent(&polygon), (10, 20, 69, 59));

        for corner in [(10, 20), (69, 20), (69, 59), (10, 59)] {
            assert!(
                polygon.iter().any(|p| (p.x - corner.0).abs() <= 1 && (p.y - corner.1).abs() <= 1),
                "missing corner {:?} in {:?}",
                corner,
                polygon
            );
        }
    }

    #[test]
    fn test_keeps_largest_component() {
        let mask = mask_from_fn(120, 60, |x, y| {
            let small = (5..=14).contains(&x) && (5..=14).contains(&y);
            let large = (40..=109).contains(&x) && (10..=49).contains(&y);
            small || large
        });
        let polygon = mask_to_polygon(&mask);

        assert_eq!(extent(&polygon), (40, 10, 109, 49));
    }

    #[test]
    fn test_hole_does_not_replace_outer_boundary() {
        // Ring-shaped room: outer 60x60 with a 20x20 hole
        let mask = mask_from_fn(80, 80, |x, y| {
            let outer = (10..=69).contains(&x) && (10..=69).contains(&y);
            let hole = (30..=49).contains(&x) && (30..=49).contains(&y);
            outer && !hole
        });
        let polygon = mask_to_polygon(&mask);

        assert_eq!(extent(&polygon), (10, 10, 69, 69));
    }

    #[test]
    fn test_single_pixel_mask() {
        let mask = mask_from_fn(10, 10, |x, y| x == 4 && y == 6);
        let polygon = mask_to_polygon(&mask);
        assert_eq!(polygon, vec![Point::new(4, 6)]);
    }

    #[test]
    fn test_l_shape_keeps_concave_corner() {
        let mask = mask_from_fn(100, 100, |x, y| {
            let top = (10..=89).contains(&x) && (10..=49).contains(&y);
            let left = (10..=49).contains(&x) && (10..=89).contains(&y);
            top || left
        });
        let polygon = mask_to_polygon(&mask);

        assert!(polygon.len() >= 6, "got {:?}", polygon);
        assert!(polygon
            .iter()
            .any(|p| (p.x - 49).abs() <= 1 && (p.y - 49).abs() <= 1));
    }
}
