//! Test data builders for configs and landmark traces

use blink_input::config::{AppConfig, SourceKind};
use blink_input::pipeline::nodes::TraceRecord;
use blink_input::types::FaceLandmarks;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Builder for non-realtime test configurations
pub struct ConfigBuilder {
    config: AppConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.source.realtime = false;
        config.plot.report_every = 0;
        Self { config }
    }

    pub fn pattern(mut self, pattern: &str) -> Self {
        self.config.source.kind = SourceKind::Synthetic;
        self.config.source.pattern = pattern.to_string();
        self
    }

    pub fn trace(mut self, path: &Path) -> Self {
        self.config.source.kind = SourceKind::Trace;
        self.config.source.path = Some(path.to_path_buf());
        self
    }

    pub fn replicas(mut self, replicas: u16) -> Self {
        self.config.pipeline.detector_replicas = replicas;
        self
    }

    pub fn fps(mut self, fps: f64) -> Self {
        self.config.source.fps = fps;
        self
    }

    pub fn recorder(mut self, path: PathBuf) -> Self {
        self.config.recorder.path = Some(path);
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One trace line per entry; `None` is a frame without a face.
pub fn write_trace(path: &Path, frames: &[Option<f64>]) {
    let mut file = std::fs::File::create(path).unwrap();
    write_records(&mut file, frames);
}

/// Append an optional raw line, then one trace line per frame.
pub fn append_trace(path: &Path, frames: &[Option<f64>], raw: Option<&str>) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    if let Some(raw) = raw {
        writeln!(file, "{}", raw).unwrap();
    }
    write_records(&mut file, frames);
}

fn write_records(out: &mut impl Write, frames: &[Option<f64>]) {
    for (i, frame) in frames.iter().enumerate() {
        let record = TraceRecord {
            t: Some(i as f64 / 30.0),
            faces: frame.map(FaceLandmarks::with_ratio).into_iter().collect(),
        };
        writeln!(out, "{}", serde_json::to_string(&record).unwrap()).unwrap();
    }
}

/// `open` open frames, `closed` closed frames, `open` open frames.
pub fn blink(open: usize, closed: usize) -> Vec<Option<f64>> {
    let mut frames = vec![Some(0.35); open];
    frames.extend(std::iter::repeat(Some(0.1)).take(closed));
    frames.extend(std::iter::repeat(Some(0.35)).take(open));
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new().pattern("open:3").replicas(2).build();

        assert_eq!(config.source.kind, SourceKind::Synthetic);
        assert_eq!(config.pipeline.detector_replicas, 2);
        assert!(!config.source.realtime);
        assert!(config.validate().is_ok());
    }
}
