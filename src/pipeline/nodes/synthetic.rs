//! Scripted frame source.
//!
//! A blink script is a whitespace-separated list of tokens:
//!
//! - `open:N` / `closed:N`: N frames with a clearly open or closed eye
//! - `none:N`: N frames with no detectable face
//! - `R:N`: N frames with eye aspect ratio `R`
//! - `R`: one frame with ratio `R`
//!
//! e.g. `"open:30 closed:12 open:30"` is one 400 ms blink at 30 fps.

use crate::error::{AppError, Result};
use crate::pipeline::error::ElementResult;
use crate::pipeline::nodes::camera::FrameSource;
use crate::types::{FaceLandmarks, Frame};
use std::time::Duration;

pub const OPEN_RATIO: f64 = 0.35;
pub const CLOSED_RATIO: f64 = 0.12;

/// What one scripted frame shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScriptedFrame {
    Face(f64),
    NoFace,
}

/// Parse a blink script into one entry per frame.
pub fn parse_pattern(pattern: &str) -> Result<Vec<ScriptedFrame>> {
    let mut frames = Vec::new();
    for token in pattern.split_whitespace() {
        let (what, count) = match token.split_once(':') {
            Some((what, count)) => {
                let count: usize = count.parse().map_err(|_| {
                    AppError::Trace(format!("bad frame count in blink script token '{}'", token))
                })?;
                (what, count)
            }
            None => (token, 1),
        };
        let frame = match what {
            "open" => ScriptedFrame::Face(OPEN_RATIO),
            "closed" => ScriptedFrame::Face(CLOSED_RATIO),
            "none" => ScriptedFrame::NoFace,
            ratio => match ratio.parse::<f64>() {
                Ok(r) if r.is_finite() && r >= 0.0 => ScriptedFrame::Face(r),
                _ => {
                    return Err(AppError::Trace(format!(
                        "unknown blink script token '{}'",
                        token
                    )))
                }
            },
        };
        frames.extend(std::iter::repeat(frame).take(count));
    }
    Ok(frames)
}

/// Plays a parsed blink script as landmark frames.
pub struct SyntheticCamera {
    script: Vec<ScriptedFrame>,
    fps: f64,
    cursor: usize,
}

impl SyntheticCamera {
    pub fn new(script: Vec<ScriptedFrame>, fps: f64) -> Self {
        Self {
            script,
            fps,
            cursor: 0,
        }
    }

    pub fn from_pattern(pattern: &str, fps: f64) -> Result<Self> {
        Ok(Self::new(parse_pattern(pattern)?, fps))
    }

    /// Script that is one ratio per frame.
    pub fn from_ratios(ratios: impl IntoIterator<Item = f64>, fps: f64) -> Self {
        Self::new(ratios.into_iter().map(ScriptedFrame::Face).collect(), fps)
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

impl FrameSource for SyntheticCamera {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn open(&mut self) -> ElementResult<()> {
        self.cursor = 0;
        tracing::debug!("Synthetic camera: {} scripted frame(s)", self.script.len());
        Ok(())
    }

    fn read(&mut self) -> ElementResult<Option<Frame>> {
        let Some(&entry) = self.script.get(self.cursor) else {
            return Ok(None);
        };
        let index = self.cursor;
        self.cursor += 1;

        let faces = match entry {
            ScriptedFrame::Face(ratio) => vec![FaceLandmarks::with_ratio(ratio)],
            ScriptedFrame::NoFace => Vec::new(),
        };
        let mut frame = Frame::from_landmarks(faces);
        frame.captured_at = Duration::from_secs_f64(index as f64 / self.fps.max(f64::EPSILON));
        frame.width = 320;
        frame.height = 240;
        Ok(Some(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FramePayload;

    #[test]
    fn test_parse_pattern() {
        let frames = parse_pattern("open:2 closed:1 none 0.2:2").unwrap();
        assert_eq!(
            frames,
            vec![
                ScriptedFrame::Face(OPEN_RATIO),
                ScriptedFrame::Face(OPEN_RATIO),
                ScriptedFrame::Face(CLOSED_RATIO),
                ScriptedFrame::NoFace,
                ScriptedFrame::Face(0.2),
                ScriptedFrame::Face(0.2),
            ]
        );
        assert!(parse_pattern("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_pattern_rejects_garbage() {
        assert!(parse_pattern("open:x").is_err());
        assert!(parse_pattern("blink:3").is_err());
        assert!(parse_pattern("-0.5").is_err());
    }

    #[test]
    fn test_camera_plays_script_then_ends() {
        let mut camera = SyntheticCamera::from_pattern("0.25 none", 10.0).unwrap();
        camera.open().unwrap();

        let first = camera.read().unwrap().unwrap();
        let FramePayload::Landmarks(faces) = &first.payload else {
            panic!("expected landmarks");
        };
        assert!((faces[0].ratio().unwrap() - 0.25).abs() < 1e-9);

        let second = camera.read().unwrap().unwrap();
        assert_eq!(second.payload, FramePayload::Landmarks(Vec::new()));
        assert_eq!(second.captured_at, Duration::from_millis(100));

        assert!(camera.read().unwrap().is_none());
    }
}
