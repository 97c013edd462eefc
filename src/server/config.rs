//! Relay configuration

use std::net::SocketAddr;
use std::time::Duration;

/// Default viewer port
pub const DEFAULT_PORT: u16 = 8000;

/// Capacity of the frame-ready queue; the producer blocks when it is full
pub const DEFAULT_FRAME_QUEUE_CAPACITY: usize = 10;

/// Capacity of the sink and writer control queues
pub const DEFAULT_CONTROL_QUEUE_CAPACITY: usize = 2;

/// Shortest accepted period for the stats reporter and the handoff poll
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address the viewer listener binds to
    pub bind_addr: SocketAddr,

    /// Frame-ready queue capacity
    pub frame_queue_capacity: usize,

    /// Sink/writer control queue capacity
    pub control_queue_capacity: usize,

    /// Delay before retrying after the ingest source failed to open or broke
    pub open_retry_delay: Duration,

    /// Delay before reopening after a normal end-of-stream
    pub reopen_delay: Duration,

    /// Interval at which the handoff counts a wait while the sink stops
    pub handoff_poll_interval: Duration,

    /// Upper bound on a single coordinator publish
    pub notify_timeout: Duration,

    /// Enable TCP_NODELAY on viewer sockets
    pub tcp_nodelay: bool,

    /// Stats report interval
    pub stats_interval: Duration,

    /// Session identifier included in coordinator records
    pub session_id: String,

    /// Real dimensions are divided by this for the welcome's virtual size
    pub virtual_scale: u32,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            frame_queue_capacity: DEFAULT_FRAME_QUEUE_CAPACITY,
            control_queue_capacity: DEFAULT_CONTROL_QUEUE_CAPACITY,
            open_retry_delay: Duration::from_secs(1),
            reopen_delay: Duration::from_secs(2),
            handoff_poll_interval: Duration::from_secs(1),
            notify_timeout: Duration::from_millis(500),
            tcp_nodelay: true, // Frames are latency sensitive
            stats_interval: Duration::from_secs(5),
            session_id: String::new(),
            virtual_scale: 2,
        }
    }
}

impl RelayConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the frame-ready queue capacity (at least 1)
    pub fn frame_queue_capacity(mut self, capacity: usize) -> Self {
        self.frame_queue_capacity = capacity.max(1);
        self
    }

    /// Set the control queue capacity (at least 1)
    pub fn control_queue_capacity(mut self, capacity: usize) -> Self {
        self.control_queue_capacity = capacity.max(1);
        self
    }

    /// Set the retry delay after an open failure or broken stream
    pub fn open_retry_delay(mut self, delay: Duration) -> Self {
        self.open_retry_delay = delay;
        self
    }

    /// Set the reopen delay after a normal end-of-stream
    pub fn reopen_delay(mut self, delay: Duration) -> Self {
        self.reopen_delay = delay;
        self
    }

    /// Set the handoff poll interval (at least [`MIN_TICK_INTERVAL`])
    pub fn handoff_poll_interval(mut self, interval: Duration) -> Self {
        self.handoff_poll_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Set the coordinator publish timeout
    pub fn notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Set the session identifier
    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = id.into();
        self
    }

    /// Set the stats report interval (at least [`MIN_TICK_INTERVAL`])
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Set the virtual dimension scale (at least 1)
    pub fn virtual_scale(mut self, scale: u32) -> Self {
        self.virtual_scale = scale.max(1);
        self
    }
}
