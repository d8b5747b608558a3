//! CameraSource node: pulls frames from a [`FrameSource`] and stamps them.

use crate::pipeline::element::{Element, ElementContext};
use crate::pipeline::error::{ElementError, ElementResult};
use crate::types::Frame;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Anything that yields frames at a known rate.
#[cfg_attr(test, mockall::automock)]
pub trait FrameSource: Send {
    /// Frames per second. Known before the source is opened.
    fn fps(&self) -> f64;

    /// Acquire the underlying device or file. Called once, on the source's
    /// own thread.
    fn open(&mut self) -> ElementResult<()>;

    /// Next frame. `Ok(None)` ends the stream; `Err` means no frame this
    /// time and the source stays usable.
    fn read(&mut self) -> ElementResult<Option<Frame>>;

    fn close(&mut self) -> ElementResult<()> {
        Ok(())
    }
}

/// Source element: one [`FrameSource`], sequence-stamped frames out.
pub struct CameraSource {
    source: Box<dyn FrameSource>,
    realtime: bool,
    next_seq: u64,
    opened_at: Option<Instant>,
    next_due: Option<Instant>,
}

impl CameraSource {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            realtime: false,
            next_seq: 0,
            opened_at: None,
            next_due: None,
        }
    }

    /// Pace output at the source's frame rate.
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn fps(&self) -> f64 {
        self.source.fps()
    }

    fn frame_interval(&self) -> Option<Duration> {
        if !self.realtime {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / self.source.fps()).ok()
    }

    /// Wait until the next frame is due. Returns `false` if stopped meanwhile.
    fn pace<O>(&mut self, ctx: &ElementContext<'_, O>) -> bool {
        let Some(interval) = self.frame_interval() else {
            return true;
        };
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now && ctx.sleep(due - now) {
            return false;
        }
        // Fall behind rather than burst when a read was slow.
        self.next_due = Some(due.max(now) + interval);
        true
    }
}

impl Element for CameraSource {
    type Input = ();
    type Output = Arc<Frame>;

    fn prepare(&mut self) -> ElementResult<()> {
        self.source.open()?;
        self.opened_at = Some(Instant::now());
        tracing::info!("Camera opened at {:.1} fps", self.source.fps());
        Ok(())
    }

    fn consume(&mut self, _: (), ctx: &mut ElementContext<'_, Arc<Frame>>) -> ElementResult<()> {
        if !self.pace(&*ctx) {
            return Ok(());
        }
        let Some(mut frame) = self.source.read()? else {
            tracing::info!("Camera reached end of stream after {} frame(s)", self.next_seq);
            return Err(ElementError::Exhausted);
        };

        frame.seq = self.next_seq;
        self.next_seq += 1;
        if frame.captured_at.is_zero() {
            frame.captured_at = self.opened_at.map(|t| t.elapsed()).unwrap_or_default();
        }
        ctx.emit(Arc::new(frame));
        Ok(())
    }

    fn cleanup(&mut self) -> ElementResult<()> {
        self.source.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channel::StopSignal;
    use crate::types::FaceLandmarks;

    fn landmark_frame() -> Frame {
        Frame::from_landmarks(vec![FaceLandmarks::with_ratio(0.3)])
    }

    fn run(camera: &mut CameraSource) -> ElementResult<Vec<Arc<Frame>>> {
        let mut out = Vec::new();
        let mut ctx = ElementContext::new("camera", 0, &mut out);
        camera.consume((), &mut ctx)?;
        Ok(out)
    }

    #[test]
    fn test_frames_get_sequential_seq() {
        let mut source = MockFrameSource::new();
        source.expect_fps().return_const(30.0);
        source.expect_open().times(1).returning(|| Ok(()));
        let mut remaining = 3;
        source.expect_read().returning(move || {
            if remaining == 0 {
                return Ok(None);
            }
            remaining -= 1;
            Ok(Some(landmark_frame()))
        });

        let mut camera = CameraSource::new(Box::new(source));
        camera.prepare().unwrap();
        let seqs: Vec<u64> = (0..3).map(|_| run(&mut camera).unwrap()[0].seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert!(matches!(run(&mut camera), Err(ElementError::Exhausted)));
    }

    #[test]
    fn test_read_failure_emits_nothing() {
        let mut source = MockFrameSource::new();
        source.expect_fps().return_const(30.0);
        source
            .expect_read()
            .times(1)
            .returning(|| Err(ElementError::collaborator("frame grab error")));

        let mut camera = CameraSource::new(Box::new(source));
        assert!(matches!(
            run(&mut camera),
            Err(ElementError::Collaborator(_))
        ));
    }

    #[test]
    fn test_open_failure_fails_prepare() {
        let mut source = MockFrameSource::new();
        source.expect_fps().return_const(30.0);
        source
            .expect_open()
            .returning(|| Err(ElementError::resource("no camera")));

        let mut camera = CameraSource::new(Box::new(source));
        assert!(matches!(camera.prepare(), Err(ElementError::Resource(_))));
    }

    #[test]
    fn test_realtime_paces_frames() {
        let mut source = MockFrameSource::new();
        source.expect_fps().return_const(100.0);
        source.expect_open().returning(|| Ok(()));
        source.expect_read().returning(|| Ok(Some(landmark_frame())));

        let mut camera = CameraSource::new(Box::new(source)).realtime(true);
        camera.prepare().unwrap();
        let start = Instant::now();
        for _ in 0..4 {
            run(&mut camera).unwrap();
        }
        // First frame is immediate, the next three wait ~10 ms each.
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_stop_cuts_frame_wait_short() {
        let mut source = MockFrameSource::new();
        source.expect_fps().return_const(1.0);
        source.expect_open().returning(|| Ok(()));
        source
            .expect_read()
            .times(1)
            .returning(|| Ok(Some(landmark_frame())));

        let mut camera = CameraSource::new(Box::new(source)).realtime(true);
        camera.prepare().unwrap();
        let stop = StopSignal::new();
        let mut out = Vec::new();
        camera
            .consume((), &mut ElementContext::new("camera", 0, &mut out).with_stop(&stop))
            .unwrap();
        assert_eq!(out.len(), 1);

        let stopper = {
            let stop = stop.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                stop.trigger();
            })
        };
        let start = Instant::now();
        camera
            .consume((), &mut ElementContext::new("camera", 0, &mut out).with_stop(&stop))
            .unwrap();
        stopper.join().unwrap();

        // Woken well before the one-second frame interval, without reading.
        assert!(start.elapsed() < Duration::from_millis(500));
        assert_eq!(out.len(), 1);
    }
}
