use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use crate::geometry::{compute_iou, BoundingBox};

/// A candidate that can take part in overlap suppression
pub trait Scored {
    fn confidence(&self) -> f64;
    fn bbox(&self) -> &BoundingBox;
}

/// Greedy non-max suppression over pixel boxes.
///
/// Candidates are visited in descending confidence order (the sort is
/// stable, so equal confidences keep their input order). A candidate is
/// kept only if its IoU with every already kept candidate is at most
/// `iou_threshold`. The result is in descending confidence order.
pub fn remove_overlapping<T: Scored>(mut candidates: Vec<T>, iou_threshold: f64) -> Vec<T> {
    if candidates.is_empty() {
        return candidates;
    }

    candidates.sort_by_key(|c| Reverse(OrderedFloat(c.confidence())));

    let mut kept: Vec<T> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|k| compute_iou(candidate.bbox(), k.bbox()) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Candidate {
        name: &'static str,
        score: f64,
        bbox: BoundingBox,
    }

    impl Scored for Candidate {
        fn confidence(&self) -> f64 {
            self.score
        }

        fn bbox(&self) -> &BoundingBox {
            &self.bbox
        }
    }

    fn candidate(name: &'static str, score: f64, bbox: [f64; 4]) -> Candidate {
        Candidate {
            name,
            score,
            bbox: bbox.into(),
        }
    }

    fn names(items: &[Candidate]) -> Vec<&'static str> {
        items.iter().map(|c| c.name).collect()
    }

    #[test]
    fn test_empty_input() {
        let kept: Vec<Candidate> = remove_overlapping(vec![], 0.3);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_keeps_highest_confidence_of_overlapping_pair() {
        let rooms = vec![
            candidate("low", 0.75, [0.0, 0.0, 100.0, 100.0]),
            candidate("high", 0.95, [5.0, 5.0, 105.0, 105.0]),
        ];

        let kept = remove_overlapping(rooms, 0.3);
        assert_eq!(names(&kept), vec!["high"]);
    }

    #[test]
    fn test_non_overlapping_sorted_by_confidence() {
        let rooms = vec![
            candidate("a", 0.8, [0.0, 0.0, 10.0, 10.0]),
            candidate("b", 0.9, [20.0, 0.0, 30.0, 10.0]),
            candidate("c", 0.85, [40.0, 0.0, 50.0, 10.0]),
        ];

        let kept = remove_overlapping(rooms, 0.3);
        assert_eq!(names(&kept), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_threshold_is_strict() {
        // IoU of exactly 1/3: kept at threshold 1/3, dropped just below it
        let rooms = vec![
            candidate("first", 0.9, [0.0, 0.0, 10.0, 10.0]),
            candidate("second", 0.8, [5.0, 0.0, 15.0, 10.0]),
        ];
        let iou = compute_iou(&rooms[0].bbox, &rooms[1].bbox);

        let kept = remove_overlapping(rooms.clone(), iou);
        assert_eq!(kept.len(), 2);

        let kept = remove_overlapping(rooms, iou - 1e-9);
        assert_eq!(names(&kept), vec!["first"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let rooms = vec![
            candidate("first", 0.9, [0.0, 0.0, 10.0, 10.0]),
            candidate("second", 0.9, [1.0, 1.0, 11.0, 11.0]),
            candidate("third", 0.9, [100.0, 100.0, 110.0, 110.0]),
        ];

        let kept = remove_overlapping(rooms, 0.3);
        assert_eq!(names(&kept), vec!["first", "third"]);
    }

    #[test]
    fn test_suppressed_candidate_does_not_suppress_others() {
        // b overlaps a and c, a and c are disjoint; b is dropped by a, so c survives
        let rooms = vec![
            candidate("a", 0.9, [0.0, 0.0, 10.0, 10.0]),
            candidate("b", 0.8, [3.0, 0.0, 13.0, 10.0]),
            candidate("c", 0.7, [11.0, 0.0, 21.0, 10.0]),
        ];

        let kept = remove_overlapping(rooms, 0.3);
        assert_eq!(names(&kept), vec!["a", "c"]);
    }

    #[test]
    fn test_zero_threshold_drops_any_overlap() {
        let rooms = vec![
            candidate("a", 0.9, [0.0, 0.0, 10.0, 10.0]),
            candidate("b", 0.8, [9.0, 9.0, 20.0, 20.0]),
            candidate("c", 0.7, [10.0, 0.0, 20.0, 5.0]),
        ];

        let kept = remove_overlapping(rooms, 0.0);
        assert_eq!(names(&kept), vec!["a", "c"]);
    }
}
