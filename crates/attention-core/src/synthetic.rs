//! Synthetic landmark frames for tests
//!
//! Builds a 478-point face whose pose anchors are an exact projection of the head
//! model, with eye and mouth contours sized so that EAR, eye opening and MAR equal
//! the requested values.

use crate::config::LandmarkIndices;
use crate::head_pose::project_model;
use crate::types::{HeadPose, LandmarkFrame, Point3};

const MESH_SIZE: usize = 478;
const EYE_WIDTH: f64 = 30.0;
const MOUTH_HALF_WIDTH: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct FaceBuilder {
    indices: LandmarkIndices,
    width: f64,
    height: f64,
    distance: f64,
    ear: f64,
    mar: f64,
    pose: HeadPose,
    gaze_offset: (f64, f64),
}

impl Default for FaceBuilder {
    fn default() -> Self {
        Self {
            indices: LandmarkIndices::default(),
            width: 640.0,
            height: 480.0,
            distance: 2880.0,
            ear: 0.30,
            mar: 0.30,
            pose: HeadPose::default(),
            gaze_offset: (0.0, 0.0),
        }
    }
}

impl FaceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ear(mut self, ear: f64) -> Self {
        self.ear = ear;
        self
    }

    pub fn mar(mut self, mar: f64) -> Self {
        self.mar = mar;
        self
    }

    pub fn yaw(mut self, degrees: f64) -> Self {
        self.pose.yaw = degrees;
        self
    }

    pub fn pitch(mut self, degrees: f64) -> Self {
        self.pose.pitch = degrees;
        self
    }

    pub fn pose(mut self, pose: HeadPose) -> Self {
        self.pose = pose;
        self
    }

    /// Shifts both irises by a pixel offset.
    pub fn gaze_offset(mut self, dx: f64, dy: f64) -> Self {
        self.gaze_offset = (dx, dy);
        self
    }

    pub fn points(&self) -> Vec<Point3> {
        let idx = &self.indices;
        let [nose, eye_r, eye_l, mouth_r, mouth_l, chin] =
            project_model(self.pose, self.distance, self.width, self.height);

        let at = |(u, v): (f64, f64)| Point3::new(u, v, 0.0);
        let mut points = vec![at(nose); MESH_SIZE];

        points[idx.nose] = at(nose);
        points[idx.chin] = at(chin);
        points[idx.pose_mouth_right] = at(mouth_r);
        points[idx.pose_mouth_left] = at(mouth_l);

        let lid = self.ear * EYE_WIDTH / 2.0;

        // right eye runs inward (+x) from its outer corner
        let (ru, rv) = eye_r;
        let [c0, up1, up2, c1, lo1, lo2] = idx.right_eye;
        points[c0] = at((ru, rv));
        points[up1] = at((ru + EYE_WIDTH / 3.0, rv - lid));
        points[up2] = at((ru + 2.0 * EYE_WIDTH / 3.0, rv - lid));
        points[c1] = at((ru + EYE_WIDTH, rv));
        points[lo1] = at((ru + 2.0 * EYE_WIDTH / 3.0, rv + lid));
        points[lo2] = at((ru + EYE_WIDTH / 3.0, rv + lid));

        // left eye runs inward (-x) from its outer corner
        let (lu, lv) = eye_l;
        let [c0, up1, up2, c1, lo1, lo2] = idx.left_eye;
        points[c0] = at((lu - EYE_WIDTH, lv));
        points[up1] = at((lu - 2.0 * EYE_WIDTH / 3.0, lv - lid));
        points[up2] = at((lu - EYE_WIDTH / 3.0, lv - lid));
        points[c1] = at((lu, lv));
        points[lo1] = at((lu - EYE_WIDTH / 3.0, lv + lid));
        points[lo2] = at((lu - 2.0 * EYE_WIDTH / 3.0, lv + lid));

        let (dx, dy) = self.gaze_offset;
        points[idx.iris_right] = at((ru + EYE_WIDTH / 2.0 + dx, rv + dy));
        points[idx.iris_left] = at((lu - EYE_WIDTH / 2.0 + dx, lv + dy));

        let mouth_y = (mouth_r.1 + mouth_l.1) / 2.0;
        let mouth_x = nose.0;
        let gap = self.mar * MOUTH_HALF_WIDTH;
        points[idx.mouth_left] = at((mouth_x - MOUTH_HALF_WIDTH, mouth_y));
        points[idx.mouth_right] = at((mouth_x + MOUTH_HALF_WIDTH, mouth_y));
        points[idx.mouth_top] = at((mouth_x, mouth_y - gap));
        points[idx.mouth_bottom] = at((mouth_x, mouth_y + gap));

        points
    }

    pub fn frame(&self, timestamp: f64) -> LandmarkFrame {
        LandmarkFrame::new(self.points(), self.width, self.height, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry;

    #[test]
    fn builder_hits_requested_ratios() {
        let idx = LandmarkIndices::default();
        let frame = FaceBuilder::new().ear(0.22).mar(0.6).frame(0.0);
        assert!((geometry::binocular_ear(&frame.points, &idx) - 0.22).abs() < 1e-9);
        assert!((geometry::binocular_eye_opening(&frame.points, &idx) - 0.22).abs() < 1e-9);
        assert!((geometry::mouth_aspect_ratio_at(&frame.points, &idx) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn frontal_gaze_is_horizontally_centred() {
        let idx = LandmarkIndices::default();
        let frame = FaceBuilder::new().frame(0.0);
        let gaze = geometry::gaze_position(&frame.points, &idx, frame.width, frame.height);
        assert!((gaze.x - 0.5).abs() < 1e-9);
    }
}
