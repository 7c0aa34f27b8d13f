use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::{PublishError, Publisher};

/// A message delivered through a [`ChannelPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    /// Destination topic
    pub topic: String,
    /// JSON payload
    pub message: Value,
}

/// Forwards messages into a bounded in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<PublishedMessage>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiving end of its channel.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PublishedMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Publisher for ChannelPublisher {
    fn publish(&self, topic: &str, message: &Value) -> Result<(), PublishError> {
        self.tx
            .try_send(PublishedMessage {
                topic: topic.to_string(),
                message: message.clone(),
            })
            .map_err(|e| match e {
                TrySendError::Full(_) => PublishError::QueueFull {
                    topic: topic.to_string(),
                },
                TrySendError::Closed(_) => PublishError::Closed,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_forwards_topic_and_payload() {
        let (publisher, mut rx) = ChannelPublisher::new(4);
        publisher.publish("daq/raw", &json!({"data_len": 1})).unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.topic, "daq/raw");
        assert_eq!(received.message["data_len"], 1);
    }

    #[test]
    fn test_full_and_closed() {
        let (publisher, rx) = ChannelPublisher::new(1);
        publisher.publish("t", &json!(1)).unwrap();
        assert_eq!(
            publisher.publish("t", &json!(2)).unwrap_err(),
            PublishError::QueueFull { topic: "t".into() }
        );

        drop(rx);
        assert_eq!(publisher.publish("t", &json!(3)).unwrap_err(), PublishError::Closed);
    }
}
