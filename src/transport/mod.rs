//! The seam between acquisition logic and the BLE stack.
//!
//! A [`Transport`] opens one timed session per device address; a
//! [`TransportSession`] exposes the two channels a cycle needs: a
//! notification stream and a command write. Production code runs on the
//! [`ble::BleTransport`] implementation; tests script a mock.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

pub mod ble;
#[cfg(test)]
pub(crate) mod mock;

/// Raw notification chunks as the device delivers them. Dropping the stream
/// unregisters the underlying subscription.
pub type NotifyStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// A link layer that can open one session per device address.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a bounded-duration session to the device at `address`.
    async fn open(&self, address: &str) -> anyhow::Result<Box<dyn TransportSession>>;
}

/// One open link to a device, torn down after a single acquisition cycle.
#[async_trait]
pub trait TransportSession: Send {
    /// Register for notification chunks. The subscription lives exactly as
    /// long as the returned stream.
    async fn subscribe(&mut self) -> anyhow::Result<NotifyStream>;

    /// Write one request payload to the command channel.
    async fn write_command(&mut self, payload: &[u8]) -> anyhow::Result<()>;

    /// Release the link.
    async fn close(&mut self) -> anyhow::Result<()>;
}
