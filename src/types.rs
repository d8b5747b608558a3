//! Core data types for blink-input
//!
//! # Main Types
//!
//! - [`Frame`] - One unit of sensor data stamped with its sequence number
//! - [`FaceLandmarks`] - The two six-point eye contours of one detected face
//! - [`Measurement`] - Per-frame openness ratio
//! - [`Detection`] - What the detector reports for one frame, measured or not
//! - [`InputAction`] - A classified `{event, effect}` pair for the effectors
//!
//! Frames and measurements travel between elements inside an `Arc`, so a
//! broadcast to several consumers shares one allocation and nobody can
//! mutate what another consumer sees.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A 2D image-space coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Eye contours of one face, in 68-point model order:
/// `p0` outer corner, `p1`/`p2` upper lid, `p3` inner corner, `p4`/`p5` lower lid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    pub left_eye: [Point; 6],
    pub right_eye: [Point; 6],
}

/// What a frame carries.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    /// 8-bit luma, row-major, `width * height` bytes.
    Pixels(Vec<u8>),
    /// Faces already located upstream (recorded or synthesized sessions).
    Landmarks(Vec<FaceLandmarks>),
}

/// One frame as produced by a source.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Assigned by the source, strictly increasing from 0.
    pub seq: u64,
    /// Offset from the moment the source was opened.
    pub captured_at: Duration,
    pub width: u32,
    pub height: u32,
    pub payload: FramePayload,
}

impl Frame {
    pub fn from_landmarks(faces: Vec<FaceLandmarks>) -> Self {
        Self {
            seq: 0,
            captured_at: Duration::ZERO,
            width: 0,
            height: 0,
            payload: FramePayload::Landmarks(faces),
        }
    }
}

/// The openness ratio of the single face found in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub frame: Arc<Frame>,
    pub landmarks: FaceLandmarks,
    pub ratio: f64,
}

impl Measurement {
    #[inline]
    pub fn seq(&self) -> u64 {
        self.frame.seq
    }
}

/// The detector's verdict on one frame.
///
/// A frame without exactly one usable face still yields a `Missing` entry
/// holding its sequence number, so order-restoring stages can step over it
/// instead of waiting for a measurement that will never come.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Measured(Arc<Measurement>),
    Missing(u64),
}

impl Detection {
    pub fn seq(&self) -> u64 {
        match self {
            Detection::Measured(m) => m.seq(),
            Detection::Missing(seq) => *seq,
        }
    }

    pub fn measurement(&self) -> Option<&Arc<Measurement>> {
        match self {
            Detection::Measured(m) => Some(m),
            Detection::Missing(_) => None,
        }
    }
}

/// Discrete input decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputEvent {
    #[default]
    None,
    /// Short intentional blink.
    Skip,
    /// Long blink, released after the hold acknowledgment.
    Enter,
}

/// Audible feedback, orthogonal to [`InputEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Effect {
    #[default]
    None,
    /// Hold acknowledgment, fired while the eyes are still closed.
    Tap,
    /// Release acknowledgment.
    Click,
}

/// One item emitted by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct InputAction {
    pub event: InputEvent,
    pub effect: Effect,
}

impl InputAction {
    pub const TAP: InputAction = InputAction {
        event: InputEvent::None,
        effect: Effect::Tap,
    };
    pub const SKIP: InputAction = InputAction {
        event: InputEvent::Skip,
        effect: Effect::Click,
    };
    pub const ENTER: InputAction = InputAction {
        event: InputEvent::Enter,
        effect: Effect::Click,
    };
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEvent::None => write!(f, "none"),
            InputEvent::Skip => write!(f, "skip"),
            InputEvent::Enter => write!(f, "enter"),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Effect::None => write!(f, "none"),
            Effect::Tap => write!(f, "tap"),
            Effect::Click => write!(f, "click"),
        }
    }
}

impl fmt::Display for InputAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{event: {}, effect: {}}}", self.event, self.effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        assert_eq!(Point::new(0.0, 0.0).distance(Point::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn test_tap_never_carries_an_event() {
        assert_eq!(InputAction::TAP.event, InputEvent::None);
        assert_eq!(InputAction::SKIP.effect, Effect::Click);
        assert_eq!(InputAction::ENTER.effect, Effect::Click);
    }

    #[test]
    fn test_landmarks_json_shape() {
        let eye = [Point::new(1.0, 2.0); 6];
        let face = FaceLandmarks {
            left_eye: eye,
            right_eye: eye,
        };
        let json = serde_json::to_string(&face).unwrap();
        assert!(json.starts_with("{\"left_eye\":[{\"x\":1.0,\"y\":2.0}"));
        let back: FaceLandmarks = serde_json::from_str(&json).unwrap();
        assert_eq!(back, face);
    }

    #[test]
    fn test_detection_seq() {
        let mut frame = Frame::from_landmarks(Vec::new());
        frame.seq = 9;
        let measured = Detection::Measured(Arc::new(Measurement {
            frame: Arc::new(frame),
            landmarks: FaceLandmarks::with_ratio(0.3),
            ratio: 0.3,
        }));
        assert_eq!(measured.seq(), 9);
        assert!(measured.measurement().is_some());
        assert_eq!(Detection::Missing(4).seq(), 4);
        assert!(Detection::Missing(4).measurement().is_none());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(InputAction::SKIP.to_string(), "{event: skip, effect: click}");
    }
}
