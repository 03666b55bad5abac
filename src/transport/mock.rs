//! Scripted transport for session and poller tests.
//!
//! Each address gets a canned chunk sequence or a scripted refusal, and every
//! lifecycle step is appended to a shared event log so tests can assert
//! ordering, e.g. that one session closes before the next one opens.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::stream;

use super::{NotifyStream, Transport, TransportSession};

#[derive(Debug, Default, Clone)]
struct Script {
    chunks: Vec<Vec<u8>>,
    refuse_connect: bool,
    refuse_write: bool,
}

#[derive(Default)]
pub(crate) struct MockTransport {
    scripts: HashMap<String, Script>,
    events: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver these chunks, in order, to any session opened on `address`.
    pub fn with_chunks(mut self, address: &str, chunks: Vec<Vec<u8>>) -> Self {
        self.scripts.entry(address.into()).or_default().chunks = chunks;
        self
    }

    /// Refuse to open a session on `address`.
    pub fn refusing_connect(mut self, address: &str) -> Self {
        self.scripts.entry(address.into()).or_default().refuse_connect = true;
        self
    }

    /// Open sessions on `address` but fail the command write.
    pub fn refusing_write(mut self, address: &str) -> Self {
        self.scripts.entry(address.into()).or_default().refuse_write = true;
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(&self, address: &str) -> anyhow::Result<Box<dyn TransportSession>> {
        let script = self.scripts.get(address).cloned().unwrap_or_default();
        if script.refuse_connect {
            self.events
                .lock()
                .unwrap()
                .push(format!("refuse {address}"));
            anyhow::bail!("device {address} unreachable");
        }
        self.events.lock().unwrap().push(format!("open {address}"));
        Ok(Box::new(MockSession {
            address: address.to_string(),
            script,
            events: self.events.clone(),
        }))
    }
}

struct MockSession {
    address: String,
    script: Script,
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TransportSession for MockSession {
    async fn subscribe(&mut self) -> anyhow::Result<NotifyStream> {
        self.events
            .lock()
            .unwrap()
            .push(format!("subscribe {}", self.address));
        Ok(Box::pin(stream::iter(self.script.chunks.clone())))
    }

    async fn write_command(&mut self, payload: &[u8]) -> anyhow::Result<()> {
        if self.script.refuse_write {
            anyhow::bail!("write to {} rejected", self.address);
        }
        self.events
            .lock()
            .unwrap()
            .push(format!("write {} {}", self.address, hex::encode(payload)));
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("close {}", self.address));
        Ok(())
    }
}
