//! Recorded landmark trace source.
//!
//! One JSON object per line, one line per frame:
//!
//! ```text
//! {"faces":[{"left_eye":[{"x":..,"y":..},..],"right_eye":[..]}]}
//! {"t":0.033,"faces":[]}
//! ```
//!
//! `t` (seconds since the start of the recording) is optional.

use crate::pipeline::error::{ElementError, ElementResult};
use crate::pipeline::nodes::camera::FrameSource;
use crate::types::{FaceLandmarks, Frame};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::time::Duration;

/// One line of a landmark trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<f64>,
    #[serde(default)]
    pub faces: Vec<FaceLandmarks>,
}

impl TraceRecord {
    pub fn into_frame(self) -> Frame {
        let mut frame = Frame::from_landmarks(self.faces);
        if let Some(t) = self.t.filter(|t| t.is_finite() && *t >= 0.0) {
            frame.captured_at = Duration::from_secs_f64(t);
        }
        frame
    }
}

/// Replays a JSON-lines landmark trace.
pub struct TraceCamera {
    path: PathBuf,
    fps: f64,
    looping: bool,
    reader: Option<BufReader<File>>,
    line_no: usize,
    frames_this_pass: usize,
    line: String,
}

impl TraceCamera {
    pub fn new(path: impl Into<PathBuf>, fps: f64) -> Self {
        Self {
            path: path.into(),
            fps,
            looping: false,
            reader: None,
            line_no: 0,
            frames_this_pass: 0,
            line: String::new(),
        }
    }

    /// Restart from the top at end of file.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn rewind(&mut self) -> ElementResult<()> {
        let file = File::open(&self.path).map_err(|e| {
            ElementError::resource(format!("cannot open trace {:?}: {}", self.path, e))
        })?;
        self.reader = Some(BufReader::new(file));
        self.line_no = 0;
        self.frames_this_pass = 0;
        Ok(())
    }
}

impl FrameSource for TraceCamera {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn open(&mut self) -> ElementResult<()> {
        self.rewind()?;
        tracing::info!("Replaying landmark trace {:?}", self.path);
        Ok(())
    }

    fn read(&mut self) -> ElementResult<Option<Frame>> {
        loop {
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            self.line.clear();
            let n = reader.read_line(&mut self.line)?;
            if n == 0 {
                if self.looping && self.frames_this_pass > 0 {
                    tracing::debug!("Trace {:?} looped", self.path);
                    self.rewind()?;
                    continue;
                }
                self.reader = None;
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            let record: TraceRecord = serde_json::from_str(line).map_err(|e| {
                ElementError::collaborator(format!("trace line {}: {}", self.line_no, e))
            })?;
            self.frames_this_pass += 1;
            return Ok(Some(record.into_frame()));
        }
    }

    fn close(&mut self) -> ElementResult<()> {
        self.reader = None;
        Ok(())
    }
}
