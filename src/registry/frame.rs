//! Stored frame types
//!
//! This module defines the key used to address a frame in the store, the
//! frame itself, and the small event announcing that a frame is ready.

use bytes::Bytes;

use crate::media::Dimensions;

/// Identifier of a produced frame
///
/// `seq` restarts at 1 every time the ingest source is opened; `epoch`
/// counts the opens, so ids stay unique across reopen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId {
    /// Ingest open attempt this frame came from
    pub epoch: u64,
    /// Position of the frame within that open, starting at 1
    pub seq: u64,
}

impl FrameId {
    pub fn new(epoch: u64, seq: u64) -> Self {
        Self { epoch, seq }
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.epoch, self.seq)
    }
}

/// A frame held in the store until its consumer removes it
///
/// Cheap to clone: `Bytes` is reference counted.
#[derive(Debug, Clone)]
pub struct StoredFrame {
    pub id: FrameId,
    /// Exact JPEG bytes as demuxed from the ingest stream
    pub data: Bytes,
    pub dimensions: Dimensions,
}

impl StoredFrame {
    pub fn new(id: FrameId, data: Bytes, dimensions: Dimensions) -> Self {
        Self {
            id,
            data,
            dimensions,
        }
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Event published on the frame-ready queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReady {
    pub id: FrameId,
    /// Text message sent to the viewer ahead of the frame bytes
    pub description: String,
}

impl FrameReady {
    pub fn new(id: FrameId, dimensions: Dimensions, size: usize) -> Self {
        Self {
            id,
            description: describe(dimensions, size),
        }
    }

    pub fn for_frame(frame: &StoredFrame) -> Self {
        Self::new(frame.id, frame.dimensions, frame.size())
    }
}

/// `"Width: W, Height: H, Size: N\n"`
pub fn describe(dimensions: Dimensions, size: usize) -> String {
    format!(
        "Width: {}, Height: {}, Size: {}\n",
        dimensions.width, dimensions.height, size
    )
}
