//! Debounce state machine turning an openness ratio stream into input events.
//!
//! A frame counts as *closed* when its ratio is below the open threshold.
//! Each run of consecutive closed frames is one episode, classified by its
//! length `d` in frames:
//!
//! | `d`                            | while closed              | on reopening        |
//! |--------------------------------|---------------------------|---------------------|
//! | `d <= debounce`                | nothing                   | nothing (noise)     |
//! | `debounce < d <= tap`          | nothing                   | `{Skip, Click}`     |
//! | `d > tap`                      | `{None, Tap}` once        | `{Enter, Click}`    |
//!
//! The classifier must see measurements strictly in capture order.

use crate::types::InputAction;

/// Hold and debounce durations converted to frame counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameThresholds {
    /// Closed frames after which the hold acknowledgment fires.
    pub tap: u32,
    /// Closed frames at or below which an episode is noise.
    pub debounce: u32,
}

impl FrameThresholds {
    /// `round(ms * fps / 1000)` for both durations, ties to even.
    pub fn from_fps(tap_ms: u32, debounce_ms: u32, fps: f64) -> Self {
        Self {
            tap: ms_to_frames(tap_ms, fps),
            debounce: ms_to_frames(debounce_ms, fps),
        }
    }
}

fn ms_to_frames(ms: u32, fps: f64) -> u32 {
    if !fps.is_finite() || fps <= 0.0 {
        return 0;
    }
    let frames = (f64::from(ms) * fps / 1000.0).round_ties_even();
    frames.clamp(0.0, f64::from(u32::MAX)) as u32
}

/// The classifier's only mutable state. Both fields reset together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassifierState {
    pub closed_frames: u32,
    pub timeout_fired: bool,
}

impl ClassifierState {
    #[inline]
    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone)]
pub struct BlinkClassifier {
    open_threshold: f64,
    thresholds: FrameThresholds,
    state: ClassifierState,
}

impl BlinkClassifier {
    pub fn new(open_threshold: f64, thresholds: FrameThresholds) -> Self {
        Self {
            open_threshold,
            thresholds,
            state: ClassifierState::default(),
        }
    }

    /// Build from millisecond durations and the upstream frame rate.
    pub fn from_fps(open_threshold: f64, tap_ms: u32, debounce_ms: u32, fps: f64) -> Self {
        Self::new(
            open_threshold,
            FrameThresholds::from_fps(tap_ms, debounce_ms, fps),
        )
    }

    pub fn thresholds(&self) -> FrameThresholds {
        self.thresholds
    }

    pub fn open_threshold(&self) -> f64 {
        self.open_threshold
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    /// Feed one ratio; returns the action to emit, if any.
    pub fn step(&mut self, ratio: f64) -> Option<InputAction> {
        // NaN compares false, so it counts as open.
        let closed = ratio < self.open_threshold;
        let state = &mut self.state;

        match (state.closed_frames, closed) {
            (0, true) => {
                state.closed_frames = 1;
                None
            }
            (_, true) => {
                state.closed_frames = state.closed_frames.saturating_add(1);
                if state.closed_frames > self.thresholds.tap && !state.timeout_fired {
                    state.timeout_fired = true;
                    Some(InputAction::TAP)
                } else {
                    None
                }
            }
            (0, false) => None,
            (closed_frames, false) => {
                let action = if closed_frames <= self.thresholds.debounce {
                    None
                } else if state.timeout_fired {
                    Some(InputAction::ENTER)
                } else {
                    Some(InputAction::SKIP)
                };
                state.reset();
                action
            }
        }
    }
}
