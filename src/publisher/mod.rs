//! Publisher adapters: fire-and-forget delivery of outbound messages.
//!
//! [`Publisher::publish`] must return without waiting for the transport. A
//! returned error means the message was dropped; the acquisition loop logs it
//! and carries on.

mod channel;
mod mqtt;
mod stdout;

pub use channel::{ChannelPublisher, PublishedMessage};
pub use mqtt::MqttPublisher;
pub use stdout::StdoutPublisher;

use serde_json::Value;
use thiserror::Error;

/// Errors reported by a publisher adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    /// Outbound queue is full; the message was dropped
    #[error("Outbound queue full, dropped message for topic '{topic}'")]
    QueueFull {
        /// Topic of the dropped message
        topic: String,
    },

    /// The transport has shut down
    #[error("Publisher closed")]
    Closed,

    /// Message could not be encoded
    #[error("Failed to serialize message: {0}")]
    Serialize(String),

    /// Transport-specific failure
    #[error("Publisher client error: {0}")]
    Client(String),
}

impl From<serde_json::Error> for PublishError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

/// Best-effort, non-blocking message sink.
pub trait Publisher: Send + Sync {
    /// Hand `message` to the transport for `topic`.
    fn publish(&self, topic: &str, message: &Value) -> Result<(), PublishError>;
}
