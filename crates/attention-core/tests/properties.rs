use std::sync::Arc;

use proptest::prelude::*;

use attention_core::config::AttentionConfig;
use attention_core::geometry::{eye_aspect_ratio, eye_opening, mouth_aspect_ratio};
use attention_core::types::{EarThresholds, LandmarkFrame, MetricSnapshot, Point3};
use attention_core::{classify, AttentionTracker};

fn point() -> impl Strategy<Value = Point3> {
    (0.0_f64..640.0, 0.0_f64..480.0, -50.0_f64..50.0).prop_map(|(x, y, z)| Point3::new(x, y, z))
}

fn snapshot() -> impl Strategy<Value = MetricSnapshot> {
    (
        (0.0_f64..0.5, 0.0_f64..1.0, 0.0_f64..120.0, -90.0_f64..90.0, -90.0_f64..90.0),
        (0.0_f64..1.0, 0.0_f64..400.0, 0.0_f64..0.6, 0.0_f64..1.5, any::<bool>()),
    )
        .prop_map(
            |((ear, perclos, blink_rate, yaw, pitch), (gaze_focus, gaze_dispersion, eye_opening, mar, is_yawn))| {
                MetricSnapshot {
                    timestamp: 0.0,
                    ear,
                    ear_raw: ear,
                    ear_baseline: None,
                    calibrated: false,
                    mar,
                    eye_opening,
                    yaw,
                    pitch,
                    roll: 0.0,
                    gaze_x: 0.5,
                    gaze_y: 0.5,
                    perclos,
                    blink_rate,
                    gaze_focus,
                    gaze_dispersion,
                    is_blink: false,
                    is_yawn,
                    total_blinks: 0,
                    total_yawns: 0,
                    ear_thresholds: EarThresholds {
                        concentrated: 0.24,
                        low: 0.19,
                        severe: 0.16,
                    },
                    fallback: false,
                }
            },
        )
}

proptest! {
    #[test]
    fn pt_scores_stay_in_range(snap in snapshot()) {
        let cfg = AttentionConfig::default();
        let result = classify(&snap, &cfg);
        prop_assert!((0.0..=100.0).contains(&result.score));
        for detail in result.details.values() {
            prop_assert!((0.0..=100.0).contains(&detail.score));
        }
        prop_assert_eq!(result.details.len(), 9);
        if result.looking_away {
            prop_assert!(result.score <= 55.0);
        }
    }

    #[test]
    fn pt_ratios_reflect_and_scale(
        eye in prop::array::uniform6(point()),
        scale in 0.1_f64..10.0,
    ) {
        let mirrored = eye.map(|p| Point3::new(-p.x, p.y, p.z));
        let scaled = eye.map(|p| Point3::new(p.x * scale, p.y * scale, p.z));
        let base = eye_aspect_ratio(&eye);
        prop_assert!((eye_aspect_ratio(&mirrored) - base).abs() < 1e-9);
        let horizontal = eye[0].distance_2d(&eye[3]);
        if horizontal >= 1e-6 && horizontal * scale >= 1e-6 {
            prop_assert!((eye_aspect_ratio(&scaled) - base).abs() < 1e-6 * base.max(1.0));
        }
        prop_assert!((eye_opening(&mirrored) - eye_opening(&eye)).abs() < 1e-9);

        let mar = mouth_aspect_ratio(&eye[0], &eye[1], &eye[2], &eye[3]);
        let mar_mirrored = mouth_aspect_ratio(&mirrored[0], &mirrored[1], &mirrored[2], &mirrored[3]);
        prop_assert!((mar - mar_mirrored).abs() < 1e-9);
    }

    #[test]
    fn pt_tracker_is_total_on_arbitrary_frames(
        frames in prop::collection::vec(prop::collection::vec(point(), 478), 1..8),
    ) {
        let mut tracker = AttentionTracker::new(Arc::new(AttentionConfig::default()));
        for (i, points) in frames.into_iter().enumerate() {
            let outcome = tracker.observe(&LandmarkFrame::new(points, 640.0, 480.0, i as f64 / 30.0));
            let s = &outcome.snapshot;
            prop_assert!((0.0..=1.0).contains(&s.perclos));
            prop_assert!((0.0..=1.0).contains(&s.gaze_focus));
            prop_assert!(s.gaze_dispersion >= 0.0);
            prop_assert!(s.blink_rate >= 0.0);
            prop_assert!(s.yaw.is_finite() && s.pitch.is_finite() && s.roll.is_finite());
            prop_assert!((0.0..=100.0).contains(&outcome.result.score));
        }
    }
}
