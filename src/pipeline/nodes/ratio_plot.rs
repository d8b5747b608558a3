//! RatioPlot node: rolling window of openness ratios with periodic summaries.
//!
//! The window starts full of threshold values so the first summaries are
//! not skewed by an empty buffer.

use crate::config::PlotConfig;
use crate::pipeline::element::{Element, ElementContext};
use crate::pipeline::error::ElementResult;
use crate::types::Detection;
use std::collections::VecDeque;

/// Statistics over the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSummary {
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    /// Samples below the open threshold.
    pub closed: usize,
    pub len: usize,
}

pub struct RatioPlot {
    threshold: f64,
    capacity: usize,
    report_every: u64,
    window: VecDeque<f64>,
    count: u64,
    last_summary: Option<WindowSummary>,
}

impl RatioPlot {
    pub fn new(config: &PlotConfig, fps: f64, threshold: f64) -> Self {
        let capacity = ((config.window_secs * fps).round() as usize).max(1);
        Self {
            threshold,
            capacity,
            report_every: config.report_every,
            window: VecDeque::new(),
            count: 0,
            last_summary: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, ratio: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(ratio);
    }

    pub fn summary(&self) -> Option<WindowSummary> {
        if self.window.is_empty() {
            return None;
        }
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        let mut closed = 0;
        for &r in &self.window {
            min = min.min(r);
            max = max.max(r);
            sum += r;
            if r < self.threshold {
                closed += 1;
            }
        }
        Some(WindowSummary {
            min,
            mean: sum / self.window.len() as f64,
            max,
            closed,
            len: self.window.len(),
        })
    }

    pub fn last_summary(&self) -> Option<WindowSummary> {
        self.last_summary
    }
}

impl Element for RatioPlot {
    type Input = Detection;
    type Output = ();

    fn prepare(&mut self) -> ElementResult<()> {
        self.window = std::iter::repeat(self.threshold).take(self.capacity).collect();
        self.count = 0;
        Ok(())
    }

    fn consume(
        &mut self,
        detection: Detection,
        _ctx: &mut ElementContext<'_, ()>,
    ) -> ElementResult<()> {
        let Some(m) = detection.measurement() else {
            return Ok(());
        };
        self.push(m.ratio);
        self.count += 1;

        if self.report_every > 0 && self.count % self.report_every == 0 {
            if let Some(s) = self.summary() {
                tracing::info!(
                    "EAR over last {} frames: min {:.3} mean {:.3} max {:.3}, {} closed",
                    s.len,
                    s.min,
                    s.mean,
                    s.max,
                    s.closed
                );
                self.last_summary = Some(s);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FaceLandmarks, Frame, Measurement};
    use std::sync::Arc;

    fn measurement(ratio: f64) -> Detection {
        Detection::Measured(Arc::new(Measurement {
            frame: Arc::new(Frame::from_landmarks(Vec::new())),
            landmarks: FaceLandmarks::with_ratio(ratio),
            ratio,
        }))
    }

    #[test]
    fn test_window_prefilled_with_threshold() {
        let config = PlotConfig {
            window_secs: 1.0,
            report_every: 0,
        };
        let mut plot = RatioPlot::new(&config, 30.0, 0.3);
        plot.prepare().unwrap();
        assert_eq!(plot.capacity(), 30);
        let s = plot.summary().unwrap();
        assert_eq!((s.len, s.closed), (30, 0));
        assert!((s.mean - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_summary() {
        let config = PlotConfig {
            window_secs: 1.0,
            report_every: 4,
        };
        let mut plot = RatioPlot::new(&config, 4.0, 0.3);
        plot.prepare().unwrap();
        let mut out = Vec::new();
        let mut ctx = ElementContext::new("ratio_plot", 0, &mut out);
        for r in [0.1, 0.2, 0.4, 0.35] {
            plot.consume(measurement(r), &mut ctx).unwrap();
            plot.consume(Detection::Missing(0), &mut ctx).unwrap();
        }
        let s = plot.last_summary().unwrap();
        assert_eq!(s.len, 4);
        assert_eq!(s.closed, 2);
        assert_eq!(s.min, 0.1);
        assert_eq!(s.max, 0.4);
    }
}
