//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use std::time::Duration;

/// Upper bound for a test pipeline to drain on its own
pub fn test_timeout() -> Duration {
    Duration::from_secs(10)
}
