//! Error handling for blink-input
//!
//! Pipeline-internal errors live in [`crate::pipeline::error`]; this module
//! defines the crate-level error that configuration loading, trace parsing
//! and the binary deal in.

use crate::pipeline::PipelineError;
use thiserror::Error;

/// Main error type for blink-input operations
#[derive(Error, Debug)]
pub enum AppError {
    /// Errors related to configuration loading/saving/validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised while building or running the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed landmark trace or blink script
    #[error("Trace error: {0}")]
    Trace(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AppError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Trace(err.to_string())
    }
}

/// Result type alias for blink-input operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ElementError;

    #[test]
    fn test_error_display() {
        let err = AppError::Config("fps must be positive".to_string());
        assert_eq!(err.to_string(), "Configuration error: fps must be positive");
    }

    #[test]
    fn test_error_with_context() {
        let err = AppError::Trace("bad line".to_string());
        let with_ctx = err.with_context("Failed to open trace");
        assert!(with_ctx.to_string().contains("Failed to open trace"));
        assert!(with_ctx.to_string().contains("bad line"));
    }

    #[test]
    fn test_context_on_io_result() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result.context("Reading config").unwrap_err();
        assert!(matches!(err, AppError::WithContext { .. }));
    }

    #[test]
    fn test_pipeline_error_converts() {
        let err = AppError::from(PipelineError::StartupFailure {
            element: "camera".to_string(),
            source: ElementError::resource("no device"),
        });
        assert!(matches!(err, AppError::Pipeline(_)));
        assert!(err.to_string().contains("camera"));
    }
}
