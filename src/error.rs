//! Error types
//!
//! `Error` is the crate-level error returned by the relay, the server and the
//! binary. `DemuxError` covers everything that can go wrong while cutting a
//! single JPEG frame out of the ingest stream; any of them ends the current
//! open attempt of the ingest source.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error on the ingest source or a socket
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The ingest stream did not contain a well-formed JPEG frame
    #[error("demux error: {0}")]
    Demux(#[from] DemuxError),

    /// WebSocket protocol or transport error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Writing to the viewer connection failed
    #[error("viewer write failed: {0}")]
    ViewerWrite(String),

    /// JSON serialization failed
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// A consumer task went away while it owned the frame queue
    #[error("frame queue lost: {0}")]
    ConsumerLost(&'static str),

    /// An internal control channel was closed
    #[error("channel closed")]
    ChannelClosed,
}

/// Malformed or truncated JPEG/JFIF stream
#[derive(Debug, Error)]
pub enum DemuxError {
    /// First two bytes were not the start-of-image marker
    #[error("start-of-image marker incorrect: {0:#06x}")]
    BadStartOfImage(u16),

    /// Second marker was not APP0
    #[error("APP0 marker incorrect: {0:#06x}")]
    BadApp0(u16),

    /// APP0 segment did not carry the JFIF identifier
    #[error("JFIF identifier incorrect: {0:#010x}")]
    BadIdentifier(u32),

    /// APP0 length too small to hold the fixed JFIF fields
    #[error("APP0 length too small: {0}")]
    BadApp0Length(u16),

    /// A segment declared a length below the size of its own length field
    #[error("segment {marker:#06x} has invalid length {length}")]
    BadSegmentLength { marker: u16, length: u16 },

    /// Expected a marker but the high byte was not 0xFF
    #[error("expected marker, found {0:#06x}")]
    NotAMarker(u16),

    /// Stream ended before end-of-image
    #[error("stream ended mid-frame")]
    Truncated,

    /// Read failure on the underlying stream
    #[error("read failed: {0}")]
    Io(io::Error),
}

impl From<io::Error> for DemuxError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DemuxError::Truncated
        } else {
            DemuxError::Io(err)
        }
    }
}
