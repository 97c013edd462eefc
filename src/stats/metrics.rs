//! Relay counters and flags
//!
//! Mutated by the producer, the sink, the writer and the viewer session;
//! read through [`RelayStats::snapshot`] by the status query.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::media::Dimensions;

/// Point-in-time copy of the relay statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Frames demuxed and announced by the producer
    pub recv: u64,
    /// Frames removed without being sent (sink drain and writer coalescing)
    pub dumped: u64,
    /// Frames sent to a viewer
    pub sent: u64,
    /// Handoff poll intervals spent waiting for the sink to stop
    pub wait_cnt: u64,
    /// Whether the sink consumer is draining the queue
    pub dummy_active: bool,
    /// Whether a viewer is connected
    pub socket_connected: bool,
    /// Last dimensions reported by the producer
    pub width: u32,
    pub height: u32,
}

impl StatsSnapshot {
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "recv: {}", self.recv)?;
        writeln!(f, "dumped: {}", self.dumped)?;
        writeln!(f, "sent: {}", self.sent)?;
        writeln!(f, "dummyActive: {}", yes_no(self.dummy_active))?;
        writeln!(f, "socketConnected: {}", yes_no(self.socket_connected))?;
        writeln!(f, "waitCnt: {}", self.wait_cnt)?;
        write!(f, "dimensions: {}x{}", self.width, self.height)
    }
}

/// Process-wide relay statistics behind one lock
#[derive(Debug)]
pub struct RelayStats {
    inner: Mutex<StatsSnapshot>,
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayStats {
    /// The sink starts out active
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StatsSnapshot {
                dummy_active: true,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatsSnapshot> {
        // Counters stay meaningful even if a holder panicked
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_received(&self) {
        self.lock().recv += 1;
    }

    pub fn record_dumped(&self) {
        self.lock().dumped += 1;
    }

    pub fn record_sent(&self) {
        self.lock().sent += 1;
    }

    pub fn record_wait(&self) {
        self.lock().wait_cnt += 1;
    }

    pub fn set_sink_active(&self, active: bool) {
        self.lock().dummy_active = active;
    }

    pub fn set_viewer_connected(&self, connected: bool) {
        self.lock().socket_connected = connected;
    }

    pub fn set_dimensions(&self, dimensions: Dimensions) {
        let mut stats = self.lock();
        stats.width = dimensions.width;
        stats.height = dimensions.height;
    }

    pub fn dimensions(&self) -> Dimensions {
        self.lock().dimensions()
    }

    pub fn sink_active(&self) -> bool {
        self.lock().dummy_active
    }

    /// Status query
    pub fn snapshot(&self) -> StatsSnapshot {
        self.lock().clone()
    }
}
