//! Built-in pipeline node implementations.

pub mod camera;
pub mod detector;
pub mod effects;
pub mod event_filter;
pub mod ratio_plot;
pub mod recorder_sink;
pub mod resequencer;
pub mod synthetic;
pub mod trace;

pub use camera::{CameraSource, FrameSource};
pub use detector::{BlinkDetector, LandmarkDetector, RecordedLandmarks};
pub use effects::{Announcer, Beeper, CommandEffector, Effector};
pub use event_filter::EventFilter;
pub use ratio_plot::{RatioPlot, WindowSummary};
pub use recorder_sink::RecorderSinkNode;
pub use resequencer::{ReorderBuffer, ReorderStats, Resequencer, Sequenced};
pub use synthetic::{parse_pattern, ScriptedFrame, SyntheticCamera};
pub use trace::{TraceCamera, TraceRecord};
