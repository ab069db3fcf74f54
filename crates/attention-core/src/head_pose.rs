//! Head pose from six facial anchors
//!
//! Solves the perspective-n-point problem for a rigid canonical face model under a
//! pinhole camera (focal length = frame width, principal point = frame centre, no
//! distortion). Parameters are a Rodrigues rotation vector and a translation, refined
//! with Levenberg-Marquardt over the reprojection error using a numeric Jacobian.
//!
//! The model is expressed in camera axes (x right, y down, z away from the camera),
//! so a face looking straight into the lens solves to the identity rotation. Angles are
//! decomposed as `R = Rx(pitch) * Ry(yaw) * Rz(roll)`.

use nalgebra::{Matrix6, Rotation3, SMatrix, SVector, Vector3, Vector6};

use crate::config::LandmarkIndices;
use crate::types::{HeadPose, Point3};

/// Canonical anchor positions in model units, ordered
/// nose, right eye corner, left eye corner, right mouth corner, left mouth corner, chin.
pub const FACE_MODEL: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [-225.0, -170.0, 135.0],
    [225.0, -170.0, 135.0],
    [-150.0, 150.0, 125.0],
    [150.0, 150.0, 125.0],
    [0.0, 330.0, 65.0],
];

/// Horizontal distance between the two eye corners of [`FACE_MODEL`].
const MODEL_EYE_SPAN: f64 = 450.0;

const MAX_ITERATIONS: usize = 100;
const INITIAL_DAMPING: f64 = 1e-3;
const MAX_DAMPING: f64 = 1e12;
const STEP_TOLERANCE: f64 = 1e-10;
const COST_TOLERANCE: f64 = 1e-14;
const RELATIVE_DECREASE: f64 = 1e-10;
/// Reject solutions whose RMS reprojection error exceeds this share of the eye span.
const MAX_RESIDUAL_RATIO: f64 = 0.25;
const MIN_EYE_SPAN_PX: f64 = 1.0;
const GIMBAL_EPS: f64 = 1e-6;

type Residuals = SVector<f64, 12>;
type Jacobian = SMatrix<f64, 12, 6>;

#[derive(Debug, Clone, Copy)]
struct Camera {
    focal: f64,
    cx: f64,
    cy: f64,
}

impl Camera {
    fn project(&self, p: &Vector3<f64>) -> Option<(f64, f64)> {
        if p.z <= 0.0 {
            return None;
        }
        Some((
            self.focal * p.x / p.z + self.cx,
            self.focal * p.y / p.z + self.cy,
        ))
    }
}

struct Problem {
    model: [Vector3<f64>; 6],
    image: [(f64, f64); 6],
    camera: Camera,
}

impl Problem {
    fn residuals(&self, params: &Vector6<f64>) -> Option<Residuals> {
        let rotation = Rotation3::new(Vector3::new(params[0], params[1], params[2]));
        let translation = Vector3::new(params[3], params[4], params[5]);
        let mut r = Residuals::zeros();
        for (i, (m, &(u, v))) in self.model.iter().zip(self.image.iter()).enumerate() {
            let (pu, pv) = self.camera.project(&(rotation.transform_vector(m) + translation))?;
            r[2 * i] = pu - u;
            r[2 * i + 1] = pv - v;
        }
        Some(r)
    }

    fn jacobian(&self, params: &Vector6<f64>) -> Option<Jacobian> {
        let mut jac = Jacobian::zeros();
        for j in 0..6 {
            let h = 1e-6 * params[j].abs().max(1.0);
            let mut plus = *params;
            let mut minus = *params;
            plus[j] += h;
            minus[j] -= h;
            let column = (self.residuals(&plus)? - self.residuals(&minus)?) / (2.0 * h);
            jac.set_column(j, &column);
        }
        Some(jac)
    }

    fn initial_guess(&self) -> Option<Vector6<f64>> {
        let (nose_u, nose_v) = self.image[0];
        let (ru, rv) = self.image[1];
        let (lu, lv) = self.image[2];
        let span = ((lu - ru).powi(2) + (lv - rv).powi(2)).sqrt();
        if span < MIN_EYE_SPAN_PX {
            return None;
        }
        let tz = self.camera.focal * MODEL_EYE_SPAN / span;
        let tx = (nose_u - self.camera.cx) * tz / self.camera.focal;
        let ty = (nose_v - self.camera.cy) * tz / self.camera.focal;
        Some(Vector6::new(0.0, 0.0, 0.0, tx, ty, tz))
    }

    /// Levenberg-Marquardt with Marquardt diagonal scaling.
    fn solve(&self) -> Option<Vector6<f64>> {
        let mut params = self.initial_guess()?;
        let mut residuals = self.residuals(&params)?;
        let mut cost = residuals.norm_squared();
        let mut damping = INITIAL_DAMPING;

        for _ in 0..MAX_ITERATIONS {
            if cost <= COST_TOLERANCE {
                return Some(params);
            }
            let jac = self.jacobian(&params)?;
            let jtj: Matrix6<f64> = jac.transpose() * jac;
            let gradient: Vector6<f64> = jac.transpose() * residuals;

            let mut improved = false;
            while damping <= MAX_DAMPING {
                let mut augmented = jtj;
                for k in 0..6 {
                    augmented[(k, k)] += damping * jtj[(k, k)].max(1e-12);
                }
                let Some(step) = augmented.cholesky().map(|c| c.solve(&(-gradient))) else {
                    damping *= 10.0;
                    continue;
                };
                let candidate = params + step;
                let candidate_cost = self
                    .residuals(&candidate)
                    .map(|r| (r.norm_squared(), r));

                match candidate_cost {
                    Some((c, r)) if c.is_finite() && c < cost => {
                        let converged = step.norm() <= STEP_TOLERANCE * (params.norm() + STEP_TOLERANCE)
                            || (cost - c) <= RELATIVE_DECREASE * cost;
                        params = candidate;
                        residuals = r;
                        cost = c;
                        damping = (damping / 10.0).max(1e-12);
                        improved = true;
                        if converged {
                            return Some(params);
                        }
                        break;
                    }
                    _ => damping *= 10.0,
                }
            }

            if !improved {
                // no downhill step at any damping: stationary point
                return Some(params);
            }
        }
        None
    }
}

/// Decomposes a rotation into (pitch, yaw, roll) degrees for `R = Rx * Ry * Rz`.
pub fn euler_angles(rotation: &Rotation3<f64>) -> HeadPose {
    let m = rotation.matrix();
    let sin_yaw = m[(0, 2)].clamp(-1.0, 1.0);
    let yaw = sin_yaw.asin();
    let (pitch, roll) = if sin_yaw.abs() < 1.0 - GIMBAL_EPS {
        (
            (-m[(1, 2)]).atan2(m[(2, 2)]),
            (-m[(0, 1)]).atan2(m[(0, 0)]),
        )
    } else {
        (m[(2, 1)].atan2(m[(1, 1)]), 0.0)
    };
    HeadPose {
        pitch: pitch.to_degrees(),
        yaw: yaw.to_degrees(),
        roll: roll.to_degrees(),
    }
}

/// Estimates the head pose, or `None` when the anchors are missing or the solver fails.
pub fn estimate(points: &[Point3], idx: &LandmarkIndices, width: f64, height: f64) -> Option<HeadPose> {
    if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
        return None;
    }
    let anchors = [
        idx.nose,
        idx.pose_eye_right,
        idx.pose_eye_left,
        idx.pose_mouth_right,
        idx.pose_mouth_left,
        idx.chin,
    ];
    let mut image = [(0.0, 0.0); 6];
    for (slot, &i) in image.iter_mut().zip(anchors.iter()) {
        let p = points.get(i)?;
        if !(p.x.is_finite() && p.y.is_finite()) {
            return None;
        }
        *slot = (p.x, p.y);
    }

    let problem = Problem {
        model: FACE_MODEL.map(|[x, y, z]| Vector3::new(x, y, z)),
        image,
        camera: Camera {
            focal: width,
            cx: width / 2.0,
            cy: height / 2.0,
        },
    };

    let Some(params) = problem.solve() else {
        tracing::debug!("head pose solver did not converge");
        return None;
    };
    if params.iter().any(|v| !v.is_finite()) || params[5] <= 0.0 {
        return None;
    }

    let residuals = problem.residuals(&params)?;
    let rms = (residuals.norm_squared() / 6.0).sqrt();
    let (ru, rv) = image[1];
    let (lu, lv) = image[2];
    let span = ((lu - ru).powi(2) + (lv - rv).powi(2)).sqrt();
    if rms > MAX_RESIDUAL_RATIO * span {
        tracing::debug!(rms, span, "head pose rejected, landmarks inconsistent with face model");
        return None;
    }

    let rotation = Rotation3::new(Vector3::new(params[0], params[1], params[2]));
    Some(euler_angles(&rotation))
}

/// Projects the canonical model for a known pose; used to synthesise test faces.
#[cfg(any(test, feature = "synthetic"))]
pub(crate) fn project_model(pose: HeadPose, distance: f64, width: f64, height: f64) -> [(f64, f64); 6] {
    let rotation = Rotation3::from_axis_angle(&Vector3::x_axis(), pose.pitch.to_radians())
        * Rotation3::from_axis_angle(&Vector3::y_axis(), pose.yaw.to_radians())
        * Rotation3::from_axis_angle(&Vector3::z_axis(), pose.roll.to_radians());
    let camera = Camera {
        focal: width,
        cx: width / 2.0,
        cy: height / 2.0,
    };
    let translation = Vector3::new(0.0, 0.0, distance);
    FACE_MODEL.map(|[x, y, z]| {
        camera
            .project(&(rotation.transform_vector(&Vector3::new(x, y, z)) + translation))
            .unwrap_or((camera.cx, camera.cy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points_for(pose: HeadPose) -> (Vec<Point3>, LandmarkIndices) {
        let idx = LandmarkIndices::default();
        let projected = project_model(pose, 2880.0, 640.0, 480.0);
        let mut points = vec![Point3::default(); 478];
        let anchors = [
            idx.nose,
            idx.pose_eye_right,
            idx.pose_eye_left,
            idx.pose_mouth_right,
            idx.pose_mouth_left,
            idx.chin,
        ];
        for (&i, (u, v)) in anchors.iter().zip(projected) {
            points[i] = Point3::new(u, v, 0.0);
        }
        (points, idx)
    }

    #[test]
    fn frontal_face_solves_to_zero() {
        let (points, idx) = points_for(HeadPose::default());
        let pose = estimate(&points, &idx, 640.0, 480.0).expect("pose");
        assert!(pose.yaw.abs() < 0.1, "{pose:?}");
        assert!(pose.pitch.abs() < 0.1, "{pose:?}");
        assert!(pose.roll.abs() < 0.1, "{pose:?}");
    }

    #[test]
    fn recovers_known_yaw_and_pitch() {
        let truth = HeadPose {
            pitch: -10.0,
            yaw: 25.0,
            roll: 5.0,
        };
        let (points, idx) = points_for(truth);
        let pose = estimate(&points, &idx, 640.0, 480.0).expect("pose");
        assert!((pose.yaw - truth.yaw).abs() < 0.5, "{pose:?}");
        assert!((pose.pitch - truth.pitch).abs() < 0.5, "{pose:?}");
        assert!((pose.roll - truth.roll).abs() < 0.5, "{pose:?}");
    }

    #[test]
    fn euler_round_trip() {
        let (pitch, yaw, roll) = (0.3_f64, -0.4_f64, 0.2_f64);
        let r = Rotation3::from_axis_angle(&Vector3::x_axis(), pitch)
            * Rotation3::from_axis_angle(&Vector3::y_axis(), yaw)
            * Rotation3::from_axis_angle(&Vector3::z_axis(), roll);
        let pose = euler_angles(&r);
        assert!((pose.pitch - pitch.to_degrees()).abs() < 1e-9);
        assert!((pose.yaw - yaw.to_degrees()).abs() < 1e-9);
        assert!((pose.roll - roll.to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn collapsed_or_missing_anchors_fail() {
        let idx = LandmarkIndices::default();
        let collapsed = vec![Point3::new(100.0, 100.0, 0.0); 478];
        assert!(estimate(&collapsed, &idx, 640.0, 480.0).is_none());
        assert!(estimate(&collapsed[..10], &idx, 640.0, 480.0).is_none());
    }

    #[test]
    fn non_positive_frame_fails() {
        let (points, idx) = points_for(HeadPose::default());
        assert!(estimate(&points, &idx, 0.0, 480.0).is_none());
        assert!(estimate(&points, &idx, 640.0, -1.0).is_none());
    }
}
