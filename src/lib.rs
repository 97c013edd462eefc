//! MJPEG screen mirror relay
//!
//! Reads a device screen capture encoded as back-to-back JPEG frames, cuts it
//! into exact frame buffers, and relays the newest frame to a single
//! WebSocket viewer. While no viewer is attached a background consumer keeps
//! draining, so the producer never stalls and nothing accumulates.
//!
//! ```text
//!   ingest ──► FrameDemuxer ──► Producer ──► FrameStore + FrameReady queue
//!                                   │                    │
//!                                   ▼                    ▼
//!                               Notifier        Sink xor Writer ──► viewer
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mirrorfeed::ingest::FileSource;
//! use mirrorfeed::notify::NoopNotifier;
//! use mirrorfeed::{Pipeline, RelayConfig, RelayContext, RelayServer};
//!
//! #[tokio::main]
//! async fn main() -> mirrorfeed::Result<()> {
//!     let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
//!     let pipeline = Pipeline::start(ctx.clone(), FileSource::new("/tmp/screen.mjpeg"), NoopNotifier).await;
//!
//!     let server = RelayServer::new(ctx, pipeline.sink().clone());
//!     server.run().await
//! }
//! ```

pub mod error;
pub mod ingest;
pub mod media;
pub mod notify;
pub mod registry;
pub mod relay;
pub mod server;
pub mod stats;

pub use error::{DemuxError, Error, Result};
pub use relay::{Pipeline, RelayContext};
pub use server::{RelayConfig, RelayServer};
pub use stats::StatsSnapshot;
