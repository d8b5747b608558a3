//! RecorderSink node: writes every measurement to a CSV file.
//!
//! Columns: `seq,timestamp_s,ratio,closed`. The file is created in
//! `prepare` and flushed in `cleanup`. Frames without a measurement get no row.

use crate::pipeline::element::{Element, ElementContext};
use crate::pipeline::error::{ElementError, ElementResult};
use crate::types::Detection;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct RecorderSinkNode {
    path: PathBuf,
    threshold: f64,
    writer: Option<BufWriter<File>>,
    rows_written: u64,
}

impl RecorderSinkNode {
    pub fn new(path: impl Into<PathBuf>, threshold: f64) -> Self {
        Self {
            path: path.into(),
            threshold,
            writer: None,
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}

impl Element for RecorderSinkNode {
    type Input = Detection;
    type Output = ();

    fn prepare(&mut self) -> ElementResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&self.path).map_err(|e| {
            ElementError::resource(format!("cannot create {:?}: {}", self.path, e))
        })?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "seq,timestamp_s,ratio,closed")?;
        self.writer = Some(writer);
        tracing::info!("Recording measurements to {:?}", self.path);
        Ok(())
    }

    fn consume(
        &mut self,
        detection: Detection,
        _ctx: &mut ElementContext<'_, ()>,
    ) -> ElementResult<()> {
        let (Some(writer), Some(m)) = (self.writer.as_mut(), detection.measurement()) else {
            return Ok(());
        };
        writeln!(
            writer,
            "{},{:.6},{:.6},{}",
            m.seq(),
            m.frame.captured_at.as_secs_f64(),
            m.ratio,
            u8::from(m.ratio < self.threshold)
        )
        .map_err(|e| ElementError::collaborator(format!("recorder write failed: {}", e)))?;
        self.rows_written += 1;
        Ok(())
    }

    fn cleanup(&mut self) -> ElementResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
            tracing::info!("Recorded {} measurement(s) to {:?}", self.rows_written, self.path);
        }
        Ok(())
    }
}
