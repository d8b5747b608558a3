//! Configuration module for blink-input
//!
//! Configuration is a single TOML file. Every section is
//! `#[serde(default)]`, so a partial file only overrides what it names.
//!
//! # Config Location
//!
//! Unless `--config` is given, the binary looks in the platform config
//! directory:
//! - **Linux**: `~/.config/blink-input/config.toml`
//! - **macOS**: `~/Library/Application Support/blink-input/config.toml`
//! - **Windows**: `%APPDATA%\blink-input\config.toml`
//!
//! # Example
//!
//! ```toml
//! [pipeline]
//! detector_replicas = 4
//!
//! [classifier]
//! tap_ms = 600
//! debounce_ms = 300
//!
//! [source]
//! kind = "trace"
//! path = "session.jsonl"
//! ```

use crate::blink::FrameThresholds;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "blink-input";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Ratio below which an eye counts as closed
pub const DEFAULT_OPEN_THRESHOLD: f64 = 0.3;

/// Closed time after which a hold is acknowledged
pub const DEFAULT_TAP_MS: u32 = 600;

/// Closed time at or below which a blink is noise
pub const DEFAULT_DEBOUNCE_MS: u32 = 300;

/// Default frame rate for sources that do not report one
pub const DEFAULT_FPS: f64 = 30.0;

/// Slowest source rate accepted; one frame interval must stay short of the
/// stop timeout.
pub const MIN_FPS: f64 = 1.0;

// ==================== Config Directory ====================

/// Get the application config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== Sections ====================

/// Pipeline sizing and shutdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of every inter-stage channel
    pub channel_capacity: usize,

    /// Parallel instances of the landmark detector
    pub detector_replicas: u16,

    /// Pending items the resequencer holds before skipping a gap.
    /// 0 derives it from replicas and capacity.
    pub reorder_window: usize,

    /// How long `stop` waits for cleanups, 0 = forever
    pub stop_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: crate::pipeline::DEFAULT_CHANNEL_CAPACITY,
            detector_replicas: 4,
            reorder_window: 0,
            stop_timeout_ms: 2000,
        }
    }
}

impl PipelineConfig {
    pub fn stop_timeout(&self) -> Option<Duration> {
        (self.stop_timeout_ms > 0).then(|| Duration::from_millis(self.stop_timeout_ms))
    }

    /// Enough room for every item that can be in flight between the detector
    /// replicas and the resequencer.
    pub fn effective_reorder_window(&self) -> usize {
        if self.reorder_window > 0 {
            self.reorder_window
        } else {
            (self.detector_replicas as usize) * 2 + self.channel_capacity
        }
    }
}

/// Debounce classifier thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub open_threshold: f64,
    pub tap_ms: u32,
    pub debounce_ms: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            open_threshold: DEFAULT_OPEN_THRESHOLD,
            tap_ms: DEFAULT_TAP_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

impl ClassifierConfig {
    pub fn frame_thresholds(&self, fps: f64) -> FrameThresholds {
        FrameThresholds::from_fps(self.tap_ms, self.debounce_ms, fps)
    }
}

/// Kind of frame source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Scripted blink pattern
    #[default]
    Synthetic,
    /// Recorded JSON-lines landmark trace
    Trace,
}

/// Frame source settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,
    pub fps: f64,

    /// Trace file, required when `kind = "trace"`
    pub path: Option<PathBuf>,

    /// Blink script for the synthetic camera
    pub pattern: String,

    /// Pace frames at `fps` instead of as fast as possible
    pub realtime: bool,

    /// Restart the trace at end of file
    pub loop_trace: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            fps: DEFAULT_FPS,
            path: None,
            pattern: "open:30 closed:5 open:30 closed:12 open:30 closed:24 open:30".to_string(),
            realtime: true,
            loop_trace: false,
        }
    }
}

/// Ratio plot settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    /// Rolling window length
    pub window_secs: f64,

    /// Log a summary every N frames, 0 = never
    pub report_every: u64,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            window_secs: 10.0,
            report_every: 100,
        }
    }
}

/// Measurement recorder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RecorderConfig {
    /// CSV output; no recorder stage when unset
    pub path: Option<PathBuf>,
}

/// Audible and spoken feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Audio player invoked as `<player> <file>`, e.g. `aplay -q`
    pub player_command: Option<String>,
    pub tap_sound: Option<PathBuf>,
    pub click_sound: Option<PathBuf>,

    /// Speech synthesizer invoked as `<command> <word>`, e.g. `espeak -v es`
    pub speech_command: Option<String>,
    pub skip_word: String,
    pub enter_word: String,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            player_command: None,
            tap_sound: None,
            click_sound: None,
            speech_command: None,
            skip_word: "si".to_string(),
            enter_word: "no".to_string(),
        }
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub plot: PlotConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,

    #[serde(default)]
    pub effects: EffectsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Load a config file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        tracing::debug!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.channel_capacity == 0 {
            return Err(AppError::Config(
                "pipeline.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.pipeline.detector_replicas == 0 {
            return Err(AppError::Config(
                "pipeline.detector_replicas must be at least 1".to_string(),
            ));
        }
        if !(self.source.fps.is_finite() && self.source.fps >= MIN_FPS) {
            return Err(AppError::Config(format!(
                "source.fps must be at least {}, got {}",
                MIN_FPS, self.source.fps
            )));
        }
        let c = &self.classifier;
        if !(c.open_threshold.is_finite() && c.open_threshold > 0.0) {
            return Err(AppError::Config(format!(
                "classifier.open_threshold must be positive, got {}",
                c.open_threshold
            )));
        }
        if c.debounce_ms > c.tap_ms {
            return Err(AppError::Config(format!(
                "classifier.debounce_ms ({}) must not exceed tap_ms ({})",
                c.debounce_ms, c.tap_ms
            )));
        }
        if self.source.kind == SourceKind::Trace && self.source.path.is_none() {
            return Err(AppError::Config(
                "source.path is required for a trace source".to_string(),
            ));
        }
        if !(self.plot.window_secs.is_finite() && self.plot.window_secs > 0.0) {
            return Err(AppError::Config(
                "plot.window_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
