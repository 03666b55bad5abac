use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::accumulator::NotifyAccumulator;
use crate::config::DeviceConfig;
use crate::message::{BasicInfoMessage, DecodeError};
use crate::reading::Reading;
use crate::transport::{Transport, TransportSession};

/// Why one acquisition cycle produced no reading.
///
/// Every variant stays inside the cycle that raised it: the poller logs the
/// reason and moves on to the next battery, so a failing device can be
/// observed without ever blocking the rest of the fleet.
#[derive(Debug, Error)]
pub enum CycleError {
    /// The transport could not open a session to the device.
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: anyhow::Error,
    },
    /// Arming notifications or writing the request failed mid-session.
    #[error("command to {address} failed: {source}")]
    Command {
        address: String,
        #[source]
        source: anyhow::Error,
    },
    /// The collected bytes did not form a usable frame.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Reads the basic pack state of one configured battery.
///
/// Each [`fetch_reading`](Self::fetch_reading) call runs a complete transient
/// session: connect, arm notifications, send the request, wait out the
/// collection window, disconnect, decode. Nothing is cached between calls,
/// so a battery that was unreachable in one round gets a clean attempt in
/// the next.
pub struct BatteryClient {
    transport: Arc<dyn Transport>,
    device: DeviceConfig,
    request: Vec<u8>,
    collection_window: Duration,
}

impl BatteryClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        device: DeviceConfig,
        request: Vec<u8>,
        collection_window: Duration,
    ) -> Self {
        Self {
            transport,
            device,
            request,
            collection_window,
        }
    }

    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    /// Run one acquisition cycle against the battery.
    pub async fn fetch_reading(&self) -> Result<Reading, CycleError> {
        let mut session =
            self.transport
                .open(&self.device.address)
                .await
                .map_err(|source| CycleError::Connect {
                    address: self.device.address.clone(),
                    source,
                })?;

        let collected = self.collect_frame(session.as_mut()).await;

        // The session is torn down before the frame is looked at, on the
        // success and failure paths alike.
        if let Err(err) = session.close().await {
            debug!(address = %self.device.address, "disconnect failed: {err:#}");
        }

        let frame = collected?;
        let msg = BasicInfoMessage::decode(&frame)?;
        Ok(Reading::capture(&self.device, &msg))
    }

    /// Arm notifications, send the request and collect chunks until the
    /// collection window closes.
    ///
    /// The window is a flat delay: it is not extended while chunks are still
    /// trickling in and not cut short when the frame looks complete. The
    /// decoder's length check is the only arbiter of completeness.
    async fn collect_frame(
        &self,
        session: &mut dyn TransportSession,
    ) -> Result<Vec<u8>, CycleError> {
        let mut chunks = session
            .subscribe()
            .await
            .map_err(|source| self.command_error(source))?;

        debug!(address = %self.device.address, "tx: {}", hex::encode(&self.request));
        session
            .write_command(&self.request)
            .await
            .map_err(|source| self.command_error(source))?;

        let mut accumulator = NotifyAccumulator::new();
        let window = sleep(self.collection_window);
        tokio::pin!(window);
        let mut live = true;
        loop {
            tokio::select! {
                _ = &mut window => break,
                chunk = chunks.next(), if live => match chunk {
                    Some(data) => {
                        debug!(address = %self.device.address, "rx notification: {}", hex::encode(&data));
                        accumulator.push(&data);
                    }
                    // The subscription ended early; wait the window out
                    // anyway and let the decoder judge what arrived.
                    None => live = false,
                },
            }
        }
        debug!(address = %self.device.address, "collected {} bytes", accumulator.len());

        // Dropping the stream unregisters the subscription before the
        // buffer is read.
        drop(chunks);
        Ok(accumulator.into_frame())
    }

    fn command_error(&self, source: anyhow::Error) -> CycleError {
        CycleError::Command {
            address: self.device.address.clone(),
            source,
        }
    }
}
