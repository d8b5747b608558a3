//! Blink domain logic: eye geometry and the debounce classifier.
//!
//! Everything here is pure and single-threaded; the pipeline elements in
//! [`crate::pipeline::nodes`] wrap these types.

pub mod classifier;
pub mod geometry;

pub use classifier::{BlinkClassifier, ClassifierState, FrameThresholds};
pub use geometry::{eye_aspect_ratio, face_ratio};
