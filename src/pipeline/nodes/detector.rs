//! BlinkDetector node: frame in, eye openness measurement out.
//!
//! The expensive part, locating facial landmarks, sits behind
//! [`LandmarkDetector`]. This stage is the one that gets replicated, so each
//! replica owns its own detector and loads it in `prepare`, on the replica's
//! own thread.
//!
//! Every frame yields exactly one [`Detection`]. Frames without a usable face
//! are counted as filtered and forwarded as [`Detection::Missing`], which only
//! the resequencer acts on.

use crate::blink::geometry::face_ratio;
use crate::pipeline::element::{Element, ElementContext};
use crate::pipeline::error::{ElementError, ElementResult};
use crate::types::{Detection, FaceLandmarks, Frame, FramePayload, Measurement};
use std::sync::Arc;

/// Locates the eye contours of every face in a frame.
#[cfg_attr(test, mockall::automock)]
pub trait LandmarkDetector: Send {
    /// Load the model. Called once per replica before the first frame.
    fn load(&mut self) -> ElementResult<()> {
        Ok(())
    }

    fn detect(&mut self, frame: &Frame) -> ElementResult<Vec<FaceLandmarks>>;
}

/// Uses the landmarks already embedded in recorded or synthetic frames.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordedLandmarks;

impl LandmarkDetector for RecordedLandmarks {
    fn detect(&mut self, frame: &Frame) -> ElementResult<Vec<FaceLandmarks>> {
        match &frame.payload {
            FramePayload::Landmarks(faces) => Ok(faces.clone()),
            FramePayload::Pixels(_) => Err(ElementError::collaborator(
                "pixel frame received but no landmark model is linked",
            )),
        }
    }
}

pub struct BlinkDetector {
    detector: Box<dyn LandmarkDetector>,
    no_face: u64,
    many_faces: u64,
}

impl BlinkDetector {
    pub fn new(detector: Box<dyn LandmarkDetector>) -> Self {
        Self {
            detector,
            no_face: 0,
            many_faces: 0,
        }
    }
}

impl Element for BlinkDetector {
    type Input = Arc<Frame>;
    type Output = Detection;

    fn prepare(&mut self) -> ElementResult<()> {
        self.detector.load()
    }

    fn consume(
        &mut self,
        frame: Arc<Frame>,
        ctx: &mut ElementContext<'_, Detection>,
    ) -> ElementResult<()> {
        let faces = self.detector.detect(&frame)?;

        // Exactly one subject; anything else is ambiguous.
        let [face] = faces.as_slice() else {
            if faces.is_empty() {
                self.no_face += 1;
            } else {
                self.many_faces += 1;
            }
            tracing::trace!("{}: frame {} has {} face(s)", ctx.name(), frame.seq, faces.len());
            ctx.emit(Detection::Missing(frame.seq));
            ctx.mark_filtered();
            return Ok(());
        };

        let Some(ratio) = face_ratio(face) else {
            tracing::trace!("{}: frame {} has a degenerate eye", ctx.name(), frame.seq);
            ctx.emit(Detection::Missing(frame.seq));
            ctx.mark_filtered();
            return Ok(());
        };

        ctx.emit(Detection::Measured(Arc::new(Measurement {
            landmarks: *face,
            frame,
            ratio,
        })));
        Ok(())
    }

    fn cleanup(&mut self) -> ElementResult<()> {
        if self.no_face + self.many_faces > 0 {
            tracing::debug!(
                "Detector skipped {} frame(s) without a face and {} with several",
                self.no_face,
                self.many_faces
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(detector: &mut BlinkDetector, frame: Frame) -> ElementResult<Vec<Detection>> {
        let mut out = Vec::new();
        let mut ctx = ElementContext::new("blink_detector#0", 0, &mut out);
        detector.consume(Arc::new(frame), &mut ctx)?;
        Ok(out)
    }

    fn measured(out: &[Detection]) -> Vec<&Arc<Measurement>> {
        out.iter().filter_map(Detection::measurement).collect()
    }

    #[test]
    fn test_single_face_yields_measurement() {
        let mut detector = BlinkDetector::new(Box::new(RecordedLandmarks));
        let mut frame = Frame::from_landmarks(vec![FaceLandmarks::with_ratio(0.2)]);
        frame.seq = 7;

        let out = run(&mut detector, frame).unwrap();
        let measured = measured(&out);
        assert_eq!(measured.len(), 1);
        assert_eq!(measured[0].seq(), 7);
        assert!((measured[0].ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_or_many_faces_leave_a_placeholder() {
        let mut detector = BlinkDetector::new(Box::new(RecordedLandmarks));
        let mut empty = Frame::from_landmarks(Vec::new());
        empty.seq = 3;
        assert_eq!(run(&mut detector, empty).unwrap(), vec![Detection::Missing(3)]);

        let mut two = Frame::from_landmarks(vec![FaceLandmarks::with_ratio(0.3); 2]);
        two.seq = 4;
        assert_eq!(run(&mut detector, two).unwrap(), vec![Detection::Missing(4)]);
    }

    #[test]
    fn test_placeholder_counts_as_filtered() {
        let mut detector = BlinkDetector::new(Box::new(RecordedLandmarks));
        let mut out = Vec::new();
        let mut ctx = ElementContext::new("blink_detector#0", 0, &mut out);
        detector
            .consume(Arc::new(Frame::from_landmarks(Vec::new())), &mut ctx)
            .unwrap();
        assert!(ctx.is_filtered());
    }

    #[test]
    fn test_pixels_without_model_is_collaborator_failure() {
        let mut detector = BlinkDetector::new(Box::new(RecordedLandmarks));
        let mut frame = Frame::from_landmarks(Vec::new());
        frame.payload = FramePayload::Pixels(vec![0; 16]);
        assert!(matches!(
            run(&mut detector, frame),
            Err(ElementError::Collaborator(_))
        ));
    }

    #[test]
    fn test_model_loaded_in_prepare() {
        let mut model = MockLandmarkDetector::new();
        model.expect_load().times(1).returning(|| Ok(()));
        model
            .expect_detect()
            .times(1)
            .returning(|_| Ok(vec![FaceLandmarks::with_ratio(0.4)]));

        let mut detector = BlinkDetector::new(Box::new(model));
        detector.prepare().unwrap();
        let out = run(&mut detector, Frame::from_landmarks(Vec::new())).unwrap();
        assert_eq!(measured(&out).len(), 1);
    }

    #[test]
    fn test_model_load_failure_fails_prepare() {
        let mut model = MockLandmarkDetector::new();
        model
            .expect_load()
            .returning(|| Err(ElementError::resource("model file missing")));
        let mut detector = BlinkDetector::new(Box::new(model));
        assert!(detector.prepare().is_err());
    }
}
