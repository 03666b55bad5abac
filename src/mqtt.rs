use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tokio::time::Duration;
use tracing::{debug, warn};

use crate::config::MqttConfig;
use crate::poller::ReadingSink;
use crate::reading::Reading;

/// Publishes each reading to the broker as JSON, one status topic per
/// battery.
pub struct MqttSink {
    client: AsyncClient,
    base_topic: String,
}

impl MqttSink {
    /// Connect to the broker and keep its event loop running on a background
    /// task. The loop keeps polling after errors, which is what drives
    /// rumqttc's reconnect, so a broker outage shows up here only as warn
    /// logs.
    pub fn start(config: &MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_s));
        let (client, mut event_loop) = AsyncClient::new(options, 10);

        tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(event) => debug!("mqtt event: {event:?}"),
                    Err(err) => {
                        warn!("mqtt connection error: {err}");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self {
            client,
            base_topic: config.base_topic.clone(),
        }
    }
}

#[async_trait]
impl ReadingSink for MqttSink {
    async fn publish(
        &self,
        reading: &Reading,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_vec(reading)?;
        let topic = status_topic(&self.base_topic, &reading.battery_id);
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload)
            .await?;
        Ok(())
    }
}

fn status_topic(base_topic: &str, battery_id: &str) -> String {
    format!("{}/{battery_id}/status", base_topic.trim_end_matches('/'))
}

#[test]
fn test_status_topic_shape() {
    assert_eq!(status_topic("bms", "BATT1"), "bms/BATT1/status");
    assert_eq!(status_topic("site/bms/", "BATT2"), "site/bms/BATT2/status");
}
