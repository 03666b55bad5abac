//! Poll JBD-style LiFePO4 Battery Management Systems over Bluetooth Low Energy
//! and publish each reading to MQTT.
//!
//! The BMS has a BLE interface exposing a vendor request-response protocol on
//! a pair of GATT characteristics: requests are written to one, the response
//! frame arrives as a series of notifications on the other. Each poll cycle
//! opens a transient session, sends the "read basic info" request, collects
//! notifications for a fixed window, disconnects and decodes what arrived.
//!
//! Per battery and cycle the following data is captured:
//!
//! - Pack voltage (V)
//! - Pack current (A, signed) and derived power (W)
//! - Remaining and design capacity (Ah) and derived charge percentage
//! - Charge cycle count
//!
//! Batteries are polled one at a time, in configured order, forever. A
//! battery whose cycle fails (unreachable, write rejected, truncated
//! response) is skipped until the next round and never holds up the others.
//!
//! # Example
//!
//! ```no_run
//! # use std::sync::Arc;
//! #
//! # #[tokio::main]
//! # pub async fn main() -> anyhow::Result<()> {
//!     let config = bmsbridge::Config::load("bmsbridge.toml")?;
//!     let sink = Arc::new(bmsbridge::MqttSink::start(&config.mqtt));
//!     let transport = Arc::new(bmsbridge::BleTransport::new().await?);
//!     let poller = bmsbridge::Poller::new(transport, sink, &config)?;
//!     poller.run().await;
//! #     Ok(())
//! # }
//! ```

mod accumulator;
mod battery_client;
pub mod config;
mod message;
mod mqtt;
mod poller;
mod reading;
mod store;
pub mod transport;

pub use battery_client::{BatteryClient, CycleError};
pub use config::Config;
pub use message::{BasicInfoMessage, DecodeError, MIN_FRAME_LEN};
pub use mqtt::MqttSink;
pub use poller::{Poller, ReadingSink};
pub use reading::Reading;
pub use store::ReadingStore;
pub use transport::ble::BleTransport;
pub use transport::{Transport, TransportSession};
