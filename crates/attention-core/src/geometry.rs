//! Per-frame geometric features
//!
//! Pure functions over a landmark set. None of them fail: a missing anchor or a
//! degenerate distance yields the neutral value from [`crate::config`].

use crate::config::{LandmarkIndices, MIN_DISTANCE, NEUTRAL_RATIO};
use crate::head_pose;
use crate::types::{GazePoint, LandmarkFrame, Point3, RawFeatures};

fn gather<const N: usize>(points: &[Point3], indices: &[usize; N]) -> Option<[Point3; N]> {
    let mut out = [Point3::default(); N];
    for (slot, &idx) in out.iter_mut().zip(indices.iter()) {
        *slot = *points.get(idx)?;
    }
    Some(out)
}

/// Eye aspect ratio over six contour points ordered
/// corner, upper, upper, corner, lower, lower.
///
/// EAR = (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)
pub fn eye_aspect_ratio(p: &[Point3; 6]) -> f64 {
    let horizontal = p[0].distance_2d(&p[3]);
    if horizontal < MIN_DISTANCE {
        return NEUTRAL_RATIO;
    }
    (p[1].distance_2d(&p[5]) + p[2].distance_2d(&p[4])) / (2.0 * horizontal)
}

pub fn eye_aspect_ratio_at(points: &[Point3], indices: &[usize; 6]) -> f64 {
    gather(points, indices)
        .map(|p| eye_aspect_ratio(&p))
        .unwrap_or(NEUTRAL_RATIO)
}

/// Mean EAR of both eyes.
pub fn binocular_ear(points: &[Point3], idx: &LandmarkIndices) -> f64 {
    (eye_aspect_ratio_at(points, &idx.left_eye) + eye_aspect_ratio_at(points, &idx.right_eye))
        / 2.0
}

/// Mouth aspect ratio: vertical lip gap over mouth width.
pub fn mouth_aspect_ratio(top: &Point3, bottom: &Point3, left: &Point3, right: &Point3) -> f64 {
    let horizontal = left.distance_2d(right);
    if horizontal < MIN_DISTANCE {
        return NEUTRAL_RATIO;
    }
    top.distance_2d(bottom) / horizontal
}

pub fn mouth_aspect_ratio_at(points: &[Point3], idx: &LandmarkIndices) -> f64 {
    gather(
        points,
        &[idx.mouth_top, idx.mouth_bottom, idx.mouth_left, idx.mouth_right],
    )
    .map(|[top, bottom, left, right]| mouth_aspect_ratio(&top, &bottom, &left, &right))
    .unwrap_or(NEUTRAL_RATIO)
}

/// Bounding-box height over width of an eye contour.
pub fn eye_opening(contour: &[Point3]) -> f64 {
    if contour.is_empty() {
        return NEUTRAL_RATIO;
    }
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in contour {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    let width = max_x - min_x;
    if width < MIN_DISTANCE {
        return NEUTRAL_RATIO;
    }
    (max_y - min_y) / width
}

pub fn binocular_eye_opening(points: &[Point3], idx: &LandmarkIndices) -> f64 {
    let side = |indices: &[usize; 6]| {
        gather(points, indices)
            .map(|p| eye_opening(&p))
            .unwrap_or(NEUTRAL_RATIO)
    };
    (side(&idx.left_eye) + side(&idx.right_eye)) / 2.0
}

/// Midpoint of both iris centres normalised by the frame size, clamped to the unit square.
pub fn gaze_position(points: &[Point3], idx: &LandmarkIndices, width: f64, height: f64) -> GazePoint {
    let (Some(left), Some(right)) = (points.get(idx.iris_left), points.get(idx.iris_right)) else {
        return GazePoint::default();
    };
    if width <= 0.0 || height <= 0.0 {
        return GazePoint::default();
    }
    GazePoint {
        x: ((left.x + right.x) / 2.0 / width).clamp(0.0, 1.0),
        y: ((left.y + right.y) / 2.0 / height).clamp(0.0, 1.0),
    }
}

/// All unsmoothed features of one frame.
pub fn extract(frame: &LandmarkFrame, idx: &LandmarkIndices) -> RawFeatures {
    let points = &frame.points;
    RawFeatures {
        ear: binocular_ear(points, idx),
        mar: mouth_aspect_ratio_at(points, idx),
        eye_opening: binocular_eye_opening(points, idx),
        pose: head_pose::estimate(points, idx, frame.width, frame.height),
        gaze: gaze_position(points, idx, frame.width, frame.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eye(width: f64, open: f64) -> [Point3; 6] {
        // corner, upper, upper, corner, lower, lower
        [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(width / 3.0, -open, 0.0),
            Point3::new(2.0 * width / 3.0, -open, 0.0),
            Point3::new(width, 0.0, 0.0),
            Point3::new(2.0 * width / 3.0, open, 0.0),
            Point3::new(width / 3.0, open, 0.0),
        ]
    }

    #[test]
    fn ear_matches_closed_form() {
        // verticals are 2*open each, horizontal is width
        let ear = eye_aspect_ratio(&eye(30.0, 4.5));
        assert!((ear - 0.3).abs() < 1e-12);
    }

    #[test]
    fn degenerate_eye_falls_back() {
        let collapsed = [Point3::new(5.0, 5.0, 0.0); 6];
        assert_eq!(eye_aspect_ratio(&collapsed), NEUTRAL_RATIO);
        assert_eq!(eye_opening(&collapsed), NEUTRAL_RATIO);
        assert_eq!(eye_opening(&[]), NEUTRAL_RATIO);
    }

    #[test]
    fn missing_points_fall_back() {
        let idx = LandmarkIndices::default();
        let points = vec![Point3::default(); 10];
        assert_eq!(binocular_ear(&points, &idx), NEUTRAL_RATIO);
        assert_eq!(mouth_aspect_ratio_at(&points, &idx), NEUTRAL_RATIO);
        assert_eq!(binocular_eye_opening(&points, &idx), NEUTRAL_RATIO);
        assert_eq!(gaze_position(&points, &idx, 640.0, 480.0), GazePoint::default());
    }

    #[test]
    fn ratios_are_invariant_under_reflection_and_scale() {
        let base = eye(30.0, 4.0);
        let mirrored = base.map(|p| Point3::new(-p.x, p.y, p.z));
        let scaled = base.map(|p| Point3::new(p.x * 3.5, p.y * 3.5, p.z));
        let ear = eye_aspect_ratio(&base);
        assert!((eye_aspect_ratio(&mirrored) - ear).abs() < 1e-12);
        assert!((eye_aspect_ratio(&scaled) - ear).abs() < 1e-12);
        assert!((eye_opening(&mirrored) - eye_opening(&base)).abs() < 1e-12);
        assert!((eye_opening(&scaled) - eye_opening(&base)).abs() < 1e-12);
    }

    #[test]
    fn mar_is_gap_over_width() {
        let mar = mouth_aspect_ratio(
            &Point3::new(20.0, -8.0, 0.0),
            &Point3::new(20.0, 8.0, 0.0),
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(40.0, 0.0, 0.0),
        );
        assert!((mar - 0.4).abs() < 1e-12);
        let zero_width = mouth_aspect_ratio(
            &Point3::new(0.0, -8.0, 0.0),
            &Point3::new(0.0, 8.0, 0.0),
            &Point3::default(),
            &Point3::default(),
        );
        assert_eq!(zero_width, NEUTRAL_RATIO);
    }

    #[test]
    fn gaze_is_normalised_iris_midpoint() {
        let idx = LandmarkIndices::default();
        let mut points = vec![Point3::default(); 478];
        points[idx.iris_left] = Point3::new(300.0, 200.0, 0.0);
        points[idx.iris_right] = Point3::new(340.0, 280.0, 0.0);
        let gaze = gaze_position(&points, &idx, 640.0, 480.0);
        assert!((gaze.x - 0.5).abs() < 1e-12);
        assert!((gaze.y - 0.5).abs() < 1e-12);
    }
}
