//! Error types for driver operations.

use thiserror::Error;

/// Errors reported by an acquisition driver.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    /// Status code reported by the device driver library
    #[error("Device error ({code}): {message}")]
    Device {
        /// Negative status code
        code: i32,
        /// Extended error text from the library
        message: String,
    },

    /// Physical channel is already part of this task or reserved elsewhere
    #[error("Physical channel '{channel}' is already in use")]
    ChannelInUse {
        /// Physical channel identifier
        channel: String,
    },

    /// Parameter rejected by the driver (bounds, rate, sensor values)
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// What was rejected
        message: String,
    },

    /// Read issued before the task was started
    #[error("Task is not running")]
    NotRunning,

    /// Operation requires a sample clock that has not been configured
    #[error("Sample clock not configured")]
    TimingNotConfigured,

    /// Read did not complete
    #[error("Read failed: {message}")]
    ReadFailed {
        /// Failure detail
        message: String,
    },

    /// Backend not compiled into this build
    #[error("Driver '{driver}' is not available. Rebuild with --features {feature}")]
    Unavailable {
        /// Backend name
        driver: &'static str,
        /// Cargo feature that enables it
        feature: &'static str,
    },
}

impl DriverError {
    /// Shorthand for [`DriverError::InvalidConfig`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Check if the device rejected a channel because it is busy.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::ChannelInUse { .. })
    }
}
