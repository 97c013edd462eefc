//! Coordinator notifications
//!
//! The relay announces itself to an external coordinator with small
//! key/value records: once at startup as a liveness probe, and once per
//! ingest open when the frame dimensions are first known. Delivery is best
//! effort: failures are logged and never retried, and a publish never blocks
//! its caller for longer than the configured timeout.

use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::media::Dimensions;

/// Key/value record sent to the coordinator
pub type Record = BTreeMap<String, String>;

/// Outbound sink for discovery records
pub trait Notifier: Send + Sync + 'static {
    /// Publish a record. Must not fail the caller and must return promptly.
    fn publish(&self, record: &Record) -> impl Future<Output = ()> + Send;
}

/// Record sent once at startup
pub fn startup_record(session_id: &str) -> Record {
    let mut record = Record::new();
    record.insert("type".into(), "startup".into());
    record.insert("session-id".into(), session_id.into());
    record.insert("pid".into(), std::process::id().to_string());
    record
}

/// Record sent on the first frame of each ingest open
pub fn dimensions_record(session_id: &str, dimensions: Dimensions) -> Record {
    let mut record = Record::new();
    record.insert("type".into(), "dimensions".into());
    record.insert("width".into(), dimensions.width.to_string());
    record.insert("height".into(), dimensions.height.to_string());
    record.insert("session-id".into(), session_id.into());
    record
}

/// Notifier that drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    async fn publish(&self, record: &Record) {
        tracing::trace!(?record, "Coordinator disabled, record dropped");
    }
}

/// Sends each record as one JSON datagram to the coordinator
#[derive(Debug, Clone)]
pub struct UdpNotifier {
    target: SocketAddr,
    timeout: Duration,
}

impl UdpNotifier {
    pub fn new(target: SocketAddr, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    async fn send(&self, payload: &[u8]) -> std::io::Result<()> {
        let local: SocketAddr = if self.target.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.send_to(payload, self.target).await?;
        Ok(())
    }
}

impl Notifier for UdpNotifier {
    async fn publish(&self, record: &Record) {
        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode coordinator record");
                return;
            }
        };

        match tokio::time::timeout(self.timeout, self.send(&payload)).await {
            Ok(Ok(())) => {
                tracing::debug!(target_addr = %self.target, ?record, "Published coordinator record");
            }
            Ok(Err(e)) => {
                tracing::warn!(target_addr = %self.target, error = %e, "Coordinator publish failed");
            }
            Err(_) => {
                tracing::warn!(
                    target_addr = %self.target,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Coordinator publish timed out"
                );
            }
        }
    }
}
