//! EventFilter node: runs the blink classifier over the measurement stream.
//!
//! Must be fed in capture order: either from a single-replica stage or from
//! a [`Resequencer`](super::Resequencer).

use crate::blink::BlinkClassifier;
use crate::config::ClassifierConfig;
use crate::pipeline::element::{Element, ElementContext};
use crate::pipeline::error::ElementResult;
use crate::types::{InputAction, Measurement};
use std::sync::Arc;

pub struct EventFilter {
    classifier: BlinkClassifier,
    last_seq: Option<u64>,
    emitted: u64,
}

impl EventFilter {
    pub fn new(config: &ClassifierConfig, fps: f64) -> Self {
        Self::from_classifier(BlinkClassifier::new(
            config.open_threshold,
            config.frame_thresholds(fps),
        ))
    }

    pub fn from_classifier(classifier: BlinkClassifier) -> Self {
        Self {
            classifier,
            last_seq: None,
            emitted: 0,
        }
    }

    pub fn classifier(&self) -> &BlinkClassifier {
        &self.classifier
    }
}

impl Element for EventFilter {
    type Input = Arc<Measurement>;
    type Output = InputAction;

    fn prepare(&mut self) -> ElementResult<()> {
        let t = self.classifier.thresholds();
        tracing::info!(
            "Blink thresholds: open < {}, tap after {} frame(s), debounce {} frame(s)",
            self.classifier.open_threshold(),
            t.tap,
            t.debounce
        );
        Ok(())
    }

    fn consume(
        &mut self,
        measurement: Arc<Measurement>,
        ctx: &mut ElementContext<'_, InputAction>,
    ) -> ElementResult<()> {
        let seq = measurement.seq();
        if let Some(last) = self.last_seq {
            if seq <= last {
                tracing::warn!("{}: out-of-order measurement {} after {}", ctx.name(), seq, last);
                return Ok(());
            }
        }
        self.last_seq = Some(seq);

        if let Some(action) = self.classifier.step(measurement.ratio) {
            let state = self.classifier.state();
            tracing::debug!(
                "Frame {}: {} (closed {}, hold fired {})",
                seq,
                action,
                state.closed_frames,
                state.timeout_fired
            );
            self.emitted += 1;
            ctx.emit(action);
        }
        Ok(())
    }

    fn cleanup(&mut self) -> ElementResult<()> {
        tracing::debug!("Event filter emitted {} action(s)", self.emitted);
        Ok(())
    }
}
