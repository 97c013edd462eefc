//! Viewer-facing server
//!
//! Accepts WebSocket viewers, greets them, and switches the relay between
//! idle draining and live delivery.

pub mod config;
pub mod handoff;
pub mod listener;
pub mod viewer;
pub mod welcome;

pub use config::RelayConfig;
pub use handoff::HandoffController;
pub use listener::RelayServer;
pub use welcome::{Quirks, Welcome};
