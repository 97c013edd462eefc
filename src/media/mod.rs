//! Media handling
//!
//! This module provides:
//! - JPEG/JFIF segment walking to cut frames out of an MJPEG byte stream
//! - Frame dimension extraction from the start-of-frame segment

pub mod jpeg;

pub use jpeg::{Dimensions, FrameDemuxer, JpegFrame, Marker};
