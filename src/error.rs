//! Custom error types for the relay.
//!
//! This module defines the primary error type, `DaqError`, used by every stage of the
//! relay. Using the `thiserror` crate, it provides one consistent taxonomy for the
//! failures that can occur between reading the device configuration and publishing
//! a batch.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**, **`MissingSection`**: the device configuration file could not be
//!   opened or parsed, or lacks a required section.
//! - **`MissingKey`**, **`ValueConversion`**, **`InvalidValue`**: a section is present
//!   but one of its attributes is absent, non-numeric, or out of range.
//! - **`MappingSyntax`**: the header-mapping rule string cannot be parsed.
//! - **`Hardware`**: wraps [`DriverError`] from the acquisition driver (device not
//!   present, channel busy, read failure).
//! - **`Publish`**: wraps [`PublishError`]. The acquisition loop never propagates these;
//!   the variant exists for adapter construction failures at startup.
//! - **`Settings`**: runtime settings could not be loaded or failed validation.
//! - **`Worker`**: the blocking read worker could not be joined.
//!
//! Every startup-phase error is fatal. Inside the acquisition loop only `Hardware` and
//! `Worker` terminate the loop.

use thiserror::Error;

use crate::driver::DriverError;
use crate::publisher::PublishError;

/// Convenience alias for results using the relay error type.
pub type Result<T> = std::result::Result<T, DaqError>;

#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Failed to load device configuration '{path}': {message}")]
    Config { path: String, message: String },

    #[error("No configuration section starting with '{prefix}' found")]
    MissingSection { prefix: String },

    #[error("Section '{section}' is missing required key '{key}'")]
    MissingKey { section: String, key: String },

    #[error("Section '{section}': cannot convert {key} = '{value}' to a number")]
    ValueConversion {
        section: String,
        key: String,
        value: String,
    },

    #[error("Section '{section}': invalid {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        reason: String,
    },

    #[error("Header mapping syntax error at offset {offset}: {message}")]
    MappingSyntax { offset: usize, message: String },

    #[error("Hardware error: {0}")]
    Hardware(#[from] DriverError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Acquisition worker failed: {0}")]
    Worker(String),
}

impl DaqError {
    /// True for the numeric-conversion failures of bound, rate and sensor fields.
    pub fn is_value_conversion(&self) -> bool {
        matches!(self, Self::ValueConversion { .. })
    }

    /// True for failures reported by the acquisition driver.
    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware(_))
    }
}

impl From<figment::Error> for DaqError {
    fn from(err: figment::Error) -> Self {
        Self::Settings(err.to_string())
    }
}

impl From<tokio::task::JoinError> for DaqError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaqError::ValueConversion {
            section: "DAQmxChannel_0".into(),
            key: "AI.Min".into(),
            value: "ten".into(),
        };
        let text = err.to_string();
        assert!(text.contains("DAQmxChannel_0"));
        assert!(text.contains("AI.Min"));
        assert!(text.contains("ten"));
        assert!(err.is_value_conversion());
    }

    #[test]
    fn test_driver_error_is_hardware() {
        let err: DaqError = DriverError::NotRunning.into();
        assert!(err.is_hardware());
        assert!(!err.is_value_conversion());
    }
}
