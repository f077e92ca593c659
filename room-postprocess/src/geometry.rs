use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel space, corners (x1, y1) top-left and (x2, y2) bottom-right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Signed area; negative for inverted boxes
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Overlapping region, or `None` when the boxes only touch or are disjoint
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some(BoundingBox { x1, y1, x2, y2 })
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(b: [f64; 4]) -> Self {
        BoundingBox::new(b[0], b[1], b[2], b[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// Intersection-over-Union of two boxes.
///
/// Returns 0.0 when the boxes do not overlap or the union area is not positive.
pub fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f64 {
    let Some(inter) = a.intersection(b) else {
        return 0.0;
    };

    let intersection = inter.area();
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical() {
        let b = BoundingBox::new(10.0, 20.0, 110.0, 70.0);
        assert_eq!(compute_iou(&b, &b), 1.0);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(compute_iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_touching_edges() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(10.0, 0.0, 20.0, 10.0);
        assert_eq!(compute_iou(&a, &b), 0.0);
        assert!(a.intersection(&b).is_none());
    }

    #[test]
    fn test_iou_partial_overlap() {
        // Two 10x10 boxes sharing a 5x10 strip: 50 / (100 + 100 - 50)
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 15.0, 10.0);
        let iou = compute_iou(&a, &b);
        assert!((iou - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(iou, compute_iou(&b, &a));
    }

    #[test]
    fn test_iou_contained() {
        let outer = BoundingBox::new(0.0, 0.0, 100.0, 100.0);
        let inner = BoundingBox::new(25.0, 25.0, 75.0, 75.0);
        assert!((compute_iou(&outer, &inner) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_iou_inverted_box() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let inverted = BoundingBox::new(10.0, 10.0, -50.0, -50.0);
        let b = BoundingBox::new(2.0, 2.0, 4.0, 4.0);
        assert_eq!(compute_iou(&inverted, &b), 0.0);
        assert!(compute_iou(&a, &b) > 0.0);
    }

    #[test]
    fn test_array_conversion() {
        let b: BoundingBox = [1.0, 2.0, 3.0, 4.0].into();
        assert_eq!(b.width(), 2.0);
        assert_eq!(b.height(), 2.0);
        let arr: [f64; 4] = b.into();
        assert_eq!(arr, [1.0, 2.0, 3.0, 4.0]);
    }
}
