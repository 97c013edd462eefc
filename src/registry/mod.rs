//! Frame registry shared by the producer and the consumers
//!
//! The producer stores each demuxed frame here and announces it on the
//! frame-ready queue. Whichever consumer currently owns the queue reads the
//! announcement and removes the frame, either discarding it (sink) or sending
//! it to the viewer (writer).
//!
//! ```text
//!    [Producer] ── put ──► FrameStore ◄── get/remove ── [Sink | Writer]
//!        │                                                   ▲
//!        └──────────── FrameReady (bounded queue) ───────────┘
//! ```
//!
//! `bytes::Bytes` is reference counted, so reading a frame out of the store
//! to send it never copies the image data.

pub mod frame;
pub mod store;

pub use frame::{FrameId, FrameReady, StoredFrame};
pub use store::FrameStore;
