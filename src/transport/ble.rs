//! Bluetooth Low Energy transport over [`bluest`].
//!
//! The BMS exposes a GATT service with a notify characteristic for responses
//! and a write characteristic for requests. Sessions are found by scanning
//! for that service and matching the advertised device id against the
//! configured address.

use anyhow::anyhow;
use async_trait::async_trait;
use bluest::{Adapter, Characteristic, Device, Uuid};
use futures_util::StreamExt;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::{NotifyStream, Transport, TransportSession};

const BMS_SERVICE_ID: &str = "0000ff00-0000-1000-8000-00805f9b34fb";
const BMS_NOTIFY_CHARACTERISTIC_ID: &str = "0000ff01-0000-1000-8000-00805f9b34fb";
const BMS_WRITE_CHARACTERISTIC_ID: &str = "0000ff02-0000-1000-8000-00805f9b34fb";

/// How long to scan for a device before giving up on the cycle.
const DISCOVER_TIMEOUT_S: u64 = 6;

/// The system Bluetooth adapter, shared across all sessions.
pub struct BleTransport {
    adapter: Adapter,
}

impl BleTransport {
    /// Grab the default adapter and wait for it to become available.
    pub async fn new() -> anyhow::Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or(anyhow!("Default adapter not found"))?;
        adapter.wait_available().await?;
        Ok(Self { adapter })
    }

    async fn discover_device(&self, address: &str) -> anyhow::Result<Device> {
        let required_services = [bms_service_id()];
        let wanted = canonical_id(address);
        let mut adapter_events = self.adapter.scan(&required_services).await?;
        while let Some(found) = adapter_events.next().await {
            // Platform device ids render the address with platform-specific
            // punctuation, so compare the hex content only.
            let id = canonical_id(&format!("{:?}", found.device.id()));
            if id.contains(&wanted) {
                return Ok(found.device);
            }
        }

        Err(anyhow!("Device {address} not found"))
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn open(&self, address: &str) -> anyhow::Result<Box<dyn TransportSession>> {
        let device = timeout(
            Duration::from_secs(DISCOVER_TIMEOUT_S),
            self.discover_device(address),
        )
        .await
        .map_err(|_| anyhow!("Device {address} not found"))??;

        self.adapter.connect_device(&device).await?;

        let service = device
            .discover_services_with_uuid(bms_service_id())
            .await?
            .first()
            .ok_or(anyhow!("The device does not expose the BMS service."))?
            .clone();
        let notify = service
            .discover_characteristics_with_uuid(bms_notify_characteristic_id())
            .await?
            .first()
            .ok_or(anyhow!(
                "The device does not expose the BMS notify characteristic."
            ))?
            .clone();
        let write = service
            .discover_characteristics_with_uuid(bms_write_characteristic_id())
            .await?
            .first()
            .ok_or(anyhow!(
                "The device does not expose the BMS write characteristic."
            ))?
            .clone();

        Ok(Box::new(BleSession {
            adapter: self.adapter.clone(),
            device,
            notify,
            write,
        }))
    }
}

struct BleSession {
    adapter: Adapter,
    device: Device,
    notify: Characteristic,
    write: Characteristic,
}

#[async_trait]
impl TransportSession for BleSession {
    async fn subscribe(&mut self) -> anyhow::Result<NotifyStream> {
        let characteristic: &'static Characteristic = Box::leak(Box::new(self.notify.clone()));
        let reader = characteristic.notify().await?;
        let chunks = reader.filter_map(|read_result| async move {
            match read_result {
                Ok(data) => Some(data),
                Err(err) => {
                    debug!("notification error: {err}");
                    None
                }
            }
        });
        Ok(Box::pin(chunks))
    }

    async fn write_command(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        self.write.write(payload).await?;
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.adapter.disconnect_device(&self.device).await?;
        Ok(())
    }
}

/// Lowercased hex content of a device id, with separators stripped.
fn canonical_id(id: &str) -> String {
    id.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

fn bms_service_id() -> Uuid {
    Uuid::parse_str(BMS_SERVICE_ID).unwrap()
}

fn bms_notify_characteristic_id() -> Uuid {
    Uuid::parse_str(BMS_NOTIFY_CHARACTERISTIC_ID).unwrap()
}

fn bms_write_characteristic_id() -> Uuid {
    Uuid::parse_str(BMS_WRITE_CHARACTERISTIC_ID).unwrap()
}

#[test]
fn test_canonical_id_strips_platform_punctuation() {
    assert_eq!(canonical_id("A4:C1:37:23:D0:5E"), "a4c13723d05e");
    assert!(canonical_id("DeviceId(\"hci0/dev_A4_C1_37_23_D0_5E\")").contains("a4c13723d05e"));
}
