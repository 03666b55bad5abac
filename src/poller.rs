use std::sync::Arc;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

use crate::battery_client::BatteryClient;
use crate::config::{Config, ConfigError};
use crate::reading::Reading;
use crate::store::ReadingStore;
use crate::transport::Transport;

/// Destination for captured readings.
///
/// Delivery is best effort: the poller logs a failed publish and carries on,
/// so a slow or absent broker never stalls acquisition.
#[async_trait]
pub trait ReadingSink: Send + Sync {
    async fn publish(
        &self,
        reading: &Reading,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Drives the endless poll loop over the configured batteries.
///
/// Each round visits every battery once, in configuration order, with one
/// session in flight at a time. A successful cycle updates the store and is
/// published; a failed cycle is logged and simply leaves that battery's
/// entry untouched until the next round.
pub struct Poller {
    clients: Vec<BatteryClient>,
    sink: Arc<dyn ReadingSink>,
    store: ReadingStore,
    device_pause: Duration,
    refresh_interval: Duration,
}

impl Poller {
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ReadingSink>,
        config: &Config,
    ) -> Result<Self, ConfigError> {
        let request = config.poll.request()?;
        let clients = config
            .devices
            .iter()
            .map(|device| {
                BatteryClient::new(
                    transport.clone(),
                    device.clone(),
                    request.clone(),
                    config.poll.collection_window(),
                )
            })
            .collect();

        Ok(Self {
            clients,
            sink,
            store: ReadingStore::new(),
            device_pause: config.poll.device_pause(),
            refresh_interval: config.poll.refresh_interval(),
        })
    }

    /// The latest reading per battery, for status readers and tests.
    pub fn store(&self) -> &ReadingStore {
        &self.store
    }

    /// Poll every battery once, in configured order, pausing between them.
    pub async fn run_round(&mut self) {
        for client in &self.clients {
            match client.fetch_reading().await {
                Ok(reading) => {
                    info!(
                        battery = %reading.battery_id,
                        voltage = reading.voltage,
                        current = reading.current,
                        capacity_percent = reading.capacity_percent,
                        "reading captured"
                    );
                    if let Err(err) = self.sink.publish(&reading).await {
                        warn!(battery = %reading.battery_id, "publish failed: {err}");
                    }
                    self.store.insert(reading);
                }
                Err(err) => {
                    warn!(battery = %client.device().label, "cycle failed: {err}");
                }
            }

            // Let the radio settle before addressing the next battery.
            sleep(self.device_pause).await;
        }
    }

    /// Run rounds until the process is torn down.
    pub async fn run(mut self) {
        info!(batteries = self.clients.len(), "poll loop started");
        loop {
            self.run_round().await;
            sleep(self.refresh_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::transport::mock::MockTransport;

    const ADDR_1: &str = "A4:C1:37:23:D0:5E";
    const ADDR_2: &str = "A4:C1:37:33:D0:72";

    #[derive(Default)]
    struct MockSink {
        published: Mutex<Vec<Reading>>,
        fail: bool,
    }

    impl MockSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn published_ids(&self) -> Vec<String> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.battery_id.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ReadingSink for MockSink {
        async fn publish(
            &self,
            reading: &Reading,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            if self.fail {
                return Err("broker gone".into());
            }
            self.published.lock().unwrap().push(reading.clone());
            Ok(())
        }
    }

    fn config_for(devices: &[(&str, &str)]) -> Config {
        let devices = devices
            .iter()
            .map(|(address, label)| {
                format!("[[devices]]\naddress = \"{address}\"\nlabel = \"{label}\"\n")
            })
            .collect::<String>();
        toml::from_str(&devices).unwrap()
    }

    fn reference_frame() -> Vec<u8> {
        vec![
            0xdd, 0x03, 0x00, 0x10, 0x0c, 0x80, 0xff, 0xce, 0x03, 0xe8, 0x07, 0xd0, 0x32, 0x00,
            0x2a, 0x02,
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_battery_gets_no_entry_and_no_publish() {
        let frame = reference_frame();
        let transport = Arc::new(
            MockTransport::new()
                .with_chunks(ADDR_1, vec![frame])
                .with_chunks(ADDR_2, vec![]),
        );
        let sink = Arc::new(MockSink::default());
        let config = config_for(&[(ADDR_1, "BATT1"), (ADDR_2, "BATT2")]);

        let mut poller = Poller::new(transport, sink.clone(), &config).unwrap();
        poller.run_round().await;

        assert!(poller.store().get("BATT1").is_some());
        assert!(poller.store().get("BATT2").is_none());
        assert_eq!(sink.published_ids(), vec!["BATT1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_visits_batteries_in_configured_order() {
        let frame = reference_frame();
        let transport = Arc::new(
            MockTransport::new()
                .with_chunks(ADDR_1, vec![frame[..7].to_vec(), frame[7..].to_vec()])
                .with_chunks(ADDR_2, vec![frame.clone()]),
        );
        let sink = Arc::new(MockSink::default());
        let config = config_for(&[(ADDR_1, "BATT1"), (ADDR_2, "BATT2")]);

        let mut poller = Poller::new(transport.clone(), sink.clone(), &config).unwrap();
        poller.run_round().await;

        let events = transport.events();
        let open_1 = events.iter().position(|e| e == &format!("open {ADDR_1}"));
        let close_1 = events.iter().position(|e| e == &format!("close {ADDR_1}"));
        let open_2 = events.iter().position(|e| e == &format!("open {ADDR_2}"));
        // The first battery's session fully closes before the second opens.
        assert!(open_1.unwrap() < close_1.unwrap());
        assert!(close_1.unwrap() < open_2.unwrap());
        assert_eq!(sink.published_ids(), vec!["BATT1", "BATT2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_battery_does_not_block_the_rest() {
        let transport = Arc::new(
            MockTransport::new()
                .refusing_connect(ADDR_1)
                .with_chunks(ADDR_2, vec![reference_frame()]),
        );
        let sink = Arc::new(MockSink::default());
        let config = config_for(&[(ADDR_1, "BATT1"), (ADDR_2, "BATT2")]);

        let mut poller = Poller::new(transport, sink.clone(), &config).unwrap();
        poller.run_round().await;

        assert!(poller.store().get("BATT1").is_none());
        assert!(poller.store().get("BATT2").is_some());
        assert_eq!(sink.published_ids(), vec!["BATT2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_failure_still_updates_the_store() {
        let transport =
            Arc::new(MockTransport::new().with_chunks(ADDR_1, vec![reference_frame()]));
        let sink = Arc::new(MockSink::failing());
        let config = config_for(&[(ADDR_1, "BATT1")]);

        let mut poller = Poller::new(transport, sink, &config).unwrap();
        poller.run_round().await;

        assert_eq!(poller.store().get("BATT1").unwrap().voltage, 32.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_round_replaces_the_previous_reading() {
        let transport =
            Arc::new(MockTransport::new().with_chunks(ADDR_1, vec![reference_frame()]));
        let sink = Arc::new(MockSink::default());
        let config = config_for(&[(ADDR_1, "BATT1")]);

        let mut poller = Poller::new(transport, sink.clone(), &config).unwrap();
        poller.run_round().await;
        let first = poller.store().get("BATT1").unwrap().timestamp;
        poller.run_round().await;

        assert_eq!(poller.store().len(), 1);
        assert!(poller.store().get("BATT1").unwrap().timestamp >= first);
        assert_eq!(sink.published_ids(), vec!["BATT1", "BATT1"]);
    }
}
