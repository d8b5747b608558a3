//! Eye aspect ratio.
//!
//! For one eye with contour points `p0..p5`:
//!
//! ```text
//! EAR = (|p1 - p5| + |p2 - p4|) / (2 * |p0 - p3|)
//! ```
//!
//! The ratio stays roughly constant while the eye is open and drops towards
//! zero as the lids close. A face's ratio is the mean over both eyes.

use crate::types::{FaceLandmarks, Point};

/// Eye aspect ratio of a single six-point contour, or `None` if the eye has
/// zero width.
pub fn eye_aspect_ratio(eye: &[Point; 6]) -> Option<f64> {
    let vertical_a = eye[1].distance(eye[5]);
    let vertical_b = eye[2].distance(eye[4]);
    let horizontal = eye[0].distance(eye[3]);
    if horizontal <= f64::EPSILON {
        return None;
    }
    Some((vertical_a + vertical_b) / (2.0 * horizontal))
}

/// Mean eye aspect ratio of both eyes.
pub fn face_ratio(face: &FaceLandmarks) -> Option<f64> {
    let left = eye_aspect_ratio(&face.left_eye)?;
    let right = eye_aspect_ratio(&face.right_eye)?;
    Some((left + right) / 2.0)
}

const EYE_WIDTH: f64 = 30.0;
const LEFT_EYE_ORIGIN: Point = Point::new(100.0, 120.0);
const RIGHT_EYE_ORIGIN: Point = Point::new(170.0, 120.0);

fn synthetic_eye(origin: Point, ratio: f64) -> [Point; 6] {
    let half = ratio.max(0.0) * EYE_WIDTH / 2.0;
    let third = EYE_WIDTH / 3.0;
    let at = |dx: f64, dy: f64| Point::new(origin.x + dx, origin.y + dy);
    [
        at(0.0, 0.0),
        at(third, -half),
        at(2.0 * third, -half),
        at(EYE_WIDTH, 0.0),
        at(2.0 * third, half),
        at(third, half),
    ]
}

impl FaceLandmarks {
    /// A face whose eyes both have aspect ratio `ratio` (negative clamps to 0).
    pub fn with_ratio(ratio: f64) -> Self {
        Self {
            left_eye: synthetic_eye(LEFT_EYE_ORIGIN, ratio),
            right_eye: synthetic_eye(RIGHT_EYE_ORIGIN, ratio),
        }
    }

    pub fn ratio(&self) -> Option<f64> {
        face_ratio(self)
    }
}
