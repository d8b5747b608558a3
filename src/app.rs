//! Reference topology assembly.
//!
//! ```text
//! camera ──► blink_detector x R ──► blink_plot
//!                              ├──► recorder            (optional)
//!                              └──► resequencer ──► input_event_filter ──► beeper
//!                                                                     └──► announcer
//! ```
//!
//! Only the detector is replicated. Everything after it that cares about
//! order sits behind the single-instance resequencer, which also strips the
//! placeholders the detector sends for frames it could not measure.

use crate::config::{AppConfig, SourceKind};
use crate::error::{AppError, Result, ResultExt};
use crate::pipeline::nodes::{
    Announcer, Beeper, BlinkDetector, CameraSource, CommandEffector, Effector, EventFilter,
    FrameSource, LandmarkDetector, RatioPlot, RecordedLandmarks, RecorderSinkNode, Resequencer,
    SyntheticCamera, TraceCamera,
};
use crate::pipeline::{Pipeline, PipelineResult, Stage};
use crate::types::Detection;

pub const CAMERA: &str = "camera";
pub const DETECTOR: &str = "blink_detector";
pub const PLOT: &str = "blink_plot";
pub const RECORDER: &str = "recorder";
pub const RESEQUENCER: &str = "resequencer";
pub const EVENT_FILTER: &str = "input_event_filter";
pub const BEEPER: &str = "beeper";
pub const ANNOUNCER: &str = "announcer";

/// Builds one landmark detector per replica.
pub type DetectorFactory = Box<dyn FnMut(u16) -> Box<dyn LandmarkDetector>>;

/// The external pieces the topology plugs together.
pub struct Collaborators {
    pub source: Box<dyn FrameSource>,
    pub detector: DetectorFactory,
    pub beeper: Box<dyn Effector>,
    pub announcer: Box<dyn Effector>,
}

impl Collaborators {
    /// Sources, detector and effectors as configured.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let source: Box<dyn FrameSource> = match config.source.kind {
            SourceKind::Synthetic => Box::new(
                SyntheticCamera::from_pattern(&config.source.pattern, config.source.fps)
                    .context("Invalid source.pattern")?,
            ),
            SourceKind::Trace => {
                let path = config.source.path.clone().ok_or_else(|| {
                    AppError::Config("source.path is required for a trace source".to_string())
                })?;
                Box::new(
                    TraceCamera::new(path, config.source.fps).looping(config.source.loop_trace),
                )
            }
        };

        Ok(Self {
            source,
            detector: Box::new(|_| Box::new(RecordedLandmarks)),
            beeper: Box::new(CommandEffector::from_config(&config.effects)),
            announcer: Box::new(CommandEffector::from_config(&config.effects)),
        })
    }
}

/// Declare and link every stage of the reference topology.
///
/// Returns the unstarted pipeline and the frame rate the classifier was
/// configured with.
pub fn build_pipeline(
    config: &AppConfig,
    collaborators: Collaborators,
) -> PipelineResult<(Pipeline, f64)> {
    let Collaborators {
        source,
        mut detector,
        beeper,
        announcer,
    } = collaborators;

    let fps = source.fps();
    let capacity = config.pipeline.channel_capacity;
    let threshold = config.classifier.open_threshold;

    let camera_source = CameraSource::new(source).realtime(config.source.realtime);
    let mut camera = Stage::source(CAMERA, camera_source);
    let mut detectors = Stage::transform(
        DETECTOR,
        config.pipeline.detector_replicas,
        capacity,
        |replica| BlinkDetector::new(detector(replica)),
    );
    let plot = Stage::single_sink(PLOT, capacity, RatioPlot::new(&config.plot, fps, threshold));
    let recorder = config.recorder.path.as_ref().map(|path| {
        Stage::single_sink(RECORDER, capacity, RecorderSinkNode::new(path, threshold))
    });
    let mut resequencer = Stage::single_transform(
        RESEQUENCER,
        capacity,
        Resequencer::<Detection>::new(config.pipeline.effective_reorder_window()),
    );
    let mut filter = Stage::single_transform(
        EVENT_FILTER,
        capacity,
        EventFilter::new(&config.classifier, fps),
    );

    let beeper = Stage::single_sink(BEEPER, capacity, Beeper::new(beeper));
    let announcer = Stage::single_sink(ANNOUNCER, capacity, Announcer::new(announcer));

    camera.link(&detectors)?;
    detectors.link(&plot)?.link(&resequencer)?;
    if let Some(recorder) = &recorder {
        detectors.link(recorder)?;
    }
    resequencer.link(&filter)?;
    filter.link(&beeper)?.link(&announcer)?;

    let mut pipeline = Pipeline::new().with_stop_timeout(config.pipeline.stop_timeout());
    pipeline
        .add(camera)?
        .add(detectors)?
        .add(plot)?
        .add(resequencer)?
        .add(filter)?
        .add(beeper)?
        .add(announcer)?;
    if let Some(recorder) = recorder {
        pipeline.add(recorder)?;
    }

    Ok((pipeline, fps))
}
