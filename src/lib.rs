//! # blink-input: blink-driven assistive input
//!
//! Turns a stream of camera frames into two discrete input events. A medium
//! blink is `Skip`; holding the eyes closed is `Enter`, with an audible tap
//! when the hold is recognised.
//!
//! ## Architecture
//!
//! - **Pipeline**: typed elements, one OS thread per instance, connected by
//!   bounded crossbeam channels that all observe a shared stop signal
//! - **Worker pool**: a stage declared with N replicas; consumers of a
//!   pooled stage see every item exactly once
//! - **Blink**: eye aspect ratio geometry and the debounce classifier
//! - **Nodes**: camera, detector, resequencer, event filter, ratio plot,
//!   recorder and the effector sinks
//!
//! ## Configuration
//!
//! A TOML file under the platform config directory (see [`config`]):
//!
//! - **Linux**: `~/.config/blink-input/config.toml`
//! - **macOS**: `~/Library/Application Support/blink-input/config.toml`
//! - **Windows**: `%APPDATA%\blink-input\config.toml`
//!
//! ## Example
//!
//! ```no_run
//! use blink_input::{app, AppConfig};
//!
//! fn main() -> blink_input::Result<()> {
//!     let config = AppConfig::default();
//!     let collaborators = app::Collaborators::from_config(&config)?;
//!     let (pipeline, _fps) = app::build_pipeline(&config, collaborators)?;
//!
//!     let mut handle = pipeline.start()?;
//!     handle.wait();
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod blink;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use blink::{BlinkClassifier, FrameThresholds};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use pipeline::{Element, Pipeline, PipelineError, PipelineHandle, Stage, StopHandle};
pub use types::{Detection, Effect, Frame, InputAction, InputEvent, Measurement};
