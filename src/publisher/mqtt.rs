use std::time::Duration;

use rumqttc::{AsyncClient, ClientError, Event, MqttOptions, Packet, QoS};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{PublishError, Publisher};
use crate::config::MqttSettings;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Publishes JSON payloads to an MQTT broker.
///
/// Messages are queued on the client's bounded request channel; a background
/// task drives the connection and reconnects after failures. When the queue is
/// full the message is dropped.
#[derive(Debug)]
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
    event_loop: JoinHandle<()>,
}

impl MqttPublisher {
    /// Create the client and spawn its event loop. Must be called inside a
    /// tokio runtime. The connection is established lazily in the background.
    pub fn connect(settings: &MqttSettings) -> Result<Self, PublishError> {
        let qos = qos_from_u8(settings.qos)?;
        let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
        options.set_keep_alive(Duration::from_secs(settings.keep_alive_secs.max(5)));

        let (client, mut eventloop) = AsyncClient::new(options, settings.queue_capacity.max(1));
        let host = settings.host.clone();
        let port = settings.port;

        let event_loop = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(%host, port, "Connected to MQTT broker");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(%host, port, error = %e, "MQTT connection error, retrying");
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        debug!(
            host = %settings.host,
            port = settings.port,
            client_id = %settings.client_id,
            "MQTT publisher created"
        );
        Ok(Self {
            client,
            qos,
            event_loop,
        })
    }
}

impl Publisher for MqttPublisher {
    fn publish(&self, topic: &str, message: &Value) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(message)?;
        self.client
            .try_publish(topic, self.qos, false, payload)
            .map_err(|e| match e {
                ClientError::TryRequest(_) => PublishError::QueueFull {
                    topic: topic.to_string(),
                },
                ClientError::Request(_) => PublishError::Closed,
            })
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

fn qos_from_u8(qos: u8) -> Result<QoS, PublishError> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(PublishError::Client(format!("invalid qos {}", other))),
    }
}
