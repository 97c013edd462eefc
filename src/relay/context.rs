//! Relay context
//!
//! State shared by every relay component, created once per process and
//! passed around behind an `Arc`.

use std::sync::Arc;

use crate::registry::FrameStore;
use crate::server::config::{RelayConfig, MIN_TICK_INTERVAL};
use crate::stats::RelayStats;

/// Shared relay state
#[derive(Debug)]
pub struct RelayContext {
    pub config: RelayConfig,
    pub store: FrameStore,
    pub stats: RelayStats,
}

impl RelayContext {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            store: FrameStore::new(),
            stats: RelayStats::new(),
        }
    }

    /// Spawn a task logging the status snapshot every `stats_interval`
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_stats_reporter(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let ctx = Arc::clone(self);
        let interval = ctx.config.stats_interval.max(MIN_TICK_INTERVAL);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let snap = ctx.stats.snapshot();
                let stored = ctx.store.len().await;
                tracing::info!(
                    recv = snap.recv,
                    dumped = snap.dumped,
                    sent = snap.sent,
                    wait_cnt = snap.wait_cnt,
                    dummy_active = snap.dummy_active,
                    socket_connected = snap.socket_connected,
                    stored,
                    "Relay status"
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stats_reporter_survives_zero_interval() {
        let config = RelayConfig {
            stats_interval: Duration::ZERO,
            ..Default::default()
        };
        let ctx = Arc::new(RelayContext::new(config));

        let reporter = ctx.spawn_stats_reporter();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reporter.is_finished());

        reporter.abort();
    }
}
