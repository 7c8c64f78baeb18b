//! MQTT status telemetry.
//!
//! Publishes channel-status snapshots as JSON. The control core only hands
//! over plain [`ChannelReport`] values; everything transport-specific stays
//! in here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::MqttSettings;
use crate::error::Result;
use crate::status::ChannelReport;

#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    device: &'a str,
    at: DateTime<Utc>,
    channels: &'a [ChannelReport],
}

/// A connected MQTT publisher.
pub struct Publisher {
    client: paho_mqtt::Client,
    topic: String,
}

impl Publisher {
    /// Connect to the configured broker.
    pub fn connect(settings: &MqttSettings) -> Result<Self> {
        let uri = format!("tcp://{}:{}", settings.host, settings.port);
        let create_opts = paho_mqtt::CreateOptionsBuilder::new()
            .server_uri(uri.as_str())
            .client_id("hvps-ctrl")
            .finalize();
        let client = paho_mqtt::Client::new(create_opts)?;

        let conn_opts = paho_mqtt::ConnectOptionsBuilder::new()
            .keep_alive_interval(std::time::Duration::from_secs(20))
            .clean_session(true)
            .finalize();
        client.connect(conn_opts)?;

        info!(broker = %uri, topic = %settings.topic, "connected to MQTT broker");
        Ok(Self {
            client,
            topic: settings.topic.clone(),
        })
    }

    /// Publish one status snapshot for a device.
    pub fn publish_snapshot(&self, device: &str, channels: &[ChannelReport]) -> Result<()> {
        let snapshot = Snapshot {
            device,
            at: Utc::now(),
            channels,
        };
        let payload = serde_json::to_string(&snapshot)?;
        let message = paho_mqtt::Message::new(self.topic.as_str(), payload, 0);
        self.client.publish(message)?;
        Ok(())
    }

    pub fn disconnect(self) {
        let _ = self.client.disconnect(None);
    }
}
