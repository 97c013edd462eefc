//! JPEG/JFIF frame demultiplexing
//!
//! An MJPEG stream is a plain concatenation of JFIF images. There is no outer
//! container, so frame boundaries are found by walking the JPEG segment
//! structure itself:
//!
//! ```text
//! +------+------+--------+--------+-----+-----------------------------+
//! | SOI  | APP0 | Length | "JFIF" | ... | X/Y density, X/Y thumbnail  |   fixed 20-byte header
//! +------+------+--------+--------+-----+-----------------------------+
//! | Marker (2) | Length L (2) | L-2 payload bytes |                      DQT, SOF, DHT, COM, APPn ...
//! +------------+--------------+-------------------+
//! | SOS (2) | Length L (2) | L-2 header bytes | entropy-coded data ... 0xFF 0xD9 |
//! +---------+--------------+------------------+----------------------------------+
//! ```
//!
//! The entropy-coded data after SOS has no declared length. Inside it every
//! 0xFF data byte is stuffed with a following 0x00 and restart markers are
//! 0xFFD0..=0xFFD7, so the first 0xFF 0xD9 pair is the end-of-image marker.
//!
//! Segments outside the ones the relay cares about are copied through with
//! their declared length; standalone markers (RSTn, TEM) are copied as-is.
//! A malformed header is fatal for the stream: there is no resynchronization.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::DemuxError;

/// Size of the fixed SOI + APP0/JFIF header read at the start of every frame
pub const JFIF_HEADER_SIZE: usize = 20;

/// `"JFIF"` identifier inside the APP0 segment
pub const JFIF_IDENTIFIER: u32 = 0x4A46_4946;

/// APP0 length covering the fixed JFIF fields (no thumbnail)
const APP0_FIXED_LENGTH: u16 = 16;

const SOI: u16 = 0xFFD8;
const EOI: u16 = 0xFFD9;
const APP0: u16 = 0xFFE0;

/// Initial output buffer capacity; grows to the largest frame seen
const INITIAL_FRAME_CAPACITY: usize = 64 * 1024;

/// JPEG marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// Start of image (0xFFD8)
    StartOfImage,
    /// End of image (0xFFD9)
    EndOfImage,
    /// JFIF application segment (0xFFE0)
    App0,
    /// Start of frame, baseline or otherwise (0xFFC0..=0xFFCF minus DHT/JPG/DAC)
    StartOfFrame(u16),
    /// Huffman table (0xFFC4)
    HuffmanTable,
    /// Quantization table (0xFFDB)
    QuantizationTable,
    /// Start of scan (0xFFDA)
    StartOfScan,
    /// Comment (0xFFFE)
    Comment,
    /// Restart marker RST0..RST7 (0xFFD0..=0xFFD7)
    Restart(u8),
    /// Temporary private use (0xFF01)
    Temporary,
    /// Any other marker; carries a length-prefixed payload
    Other(u16),
}

impl Marker {
    /// Classify a 2-byte big-endian marker value.
    ///
    /// Returns `None` when the high byte is not 0xFF.
    pub fn from_u16(value: u16) -> Option<Self> {
        if value >> 8 != 0xFF {
            return None;
        }

        let marker = match value {
            SOI => Marker::StartOfImage,
            EOI => Marker::EndOfImage,
            APP0 => Marker::App0,
            0xFFC4 => Marker::HuffmanTable,
            0xFFC8 | 0xFFCC => Marker::Other(value),
            0xFFC0..=0xFFCF => Marker::StartOfFrame(value),
            0xFFDB => Marker::QuantizationTable,
            0xFFDA => Marker::StartOfScan,
            0xFFFE => Marker::Comment,
            0xFFD0..=0xFFD7 => Marker::Restart((value & 0x07) as u8),
            0xFF01 => Marker::Temporary,
            _ => Marker::Other(value),
        };
        Some(marker)
    }

    /// Markers that are not followed by a length field
    pub fn is_standalone(&self) -> bool {
        matches!(
            self,
            Marker::StartOfImage | Marker::EndOfImage | Marker::Restart(_) | Marker::Temporary
        )
    }
}

/// Image dimensions read from a start-of-frame segment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse the payload of a start-of-frame segment (after the length field)
    ///
    /// ```text
    /// precision (1) | height (2) | width (2) | components (1) | ...
    /// ```
    pub fn from_frame_header(payload: &[u8]) -> Option<Self> {
        if payload.len() < 5 {
            return None;
        }

        let mut payload = payload;
        payload.advance(1);
        let height = payload.get_u16();
        let width = payload.get_u16();
        Some(Self::new(u32::from(width), u32::from(height)))
    }

    /// Whether both dimensions are known
    pub fn is_known(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One complete JPEG image cut out of the stream
#[derive(Debug, Clone)]
pub struct JpegFrame {
    /// Exact frame bytes from SOI through EOI
    pub data: Bytes,
    /// Dimensions from the start-of-frame segment, if the frame had one
    pub dimensions: Option<Dimensions>,
}

impl JpegFrame {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Splits an MJPEG byte stream into individual JPEG frames
pub struct FrameDemuxer<R> {
    reader: R,
    frames: u64,
    capacity_hint: usize,
}

impl<R> FrameDemuxer<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Wrap a buffered reader positioned at the start of a frame
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            frames: 0,
            capacity_hint: INITIAL_FRAME_CAPACITY,
        }
    }

    /// Number of frames produced so far
    pub fn frames_read(&self) -> u64 {
        self.frames
    }

    /// Read the next complete frame.
    ///
    /// Returns `Ok(None)` if the stream ends cleanly between frames. Any error
    /// leaves the reader at an unknown position; the caller must discard it.
    pub async fn scan(&mut self) -> Result<Option<JpegFrame>, DemuxError> {
        if self.reader.fill_buf().await?.is_empty() {
            return Ok(None);
        }

        let mut out = BytesMut::with_capacity(self.capacity_hint);
        self.read_jfif_header(&mut out).await?;

        let mut dimensions = None;
        loop {
            let value = self.reader.read_u16().await?;
            let marker = Marker::from_u16(value).ok_or(DemuxError::NotAMarker(value))?;
            out.put_u16(value);

            match marker {
                Marker::EndOfImage => break,
                Marker::StartOfScan => {
                    self.copy_segment(value, &mut out).await?;
                    self.copy_entropy_coded(&mut out).await?;
                    break;
                }
                m if m.is_standalone() => {}
                Marker::StartOfFrame(_) => {
                    let payload = self.copy_segment(value, &mut out).await?;
                    dimensions = Dimensions::from_frame_header(&out[payload..]);
                }
                Marker::Other(_) => {
                    tracing::trace!(marker = value, "Copying unrecognized segment");
                    self.copy_segment(value, &mut out).await?;
                }
                _ => {
                    self.copy_segment(value, &mut out).await?;
                }
            }
        }

        self.frames += 1;
        self.capacity_hint = self.capacity_hint.max(out.len());

        Ok(Some(JpegFrame {
            data: out.freeze(),
            dimensions,
        }))
    }

    async fn read_jfif_header(&mut self, out: &mut BytesMut) -> Result<(), DemuxError> {
        let mut header = [0u8; JFIF_HEADER_SIZE];
        self.reader.read_exact(&mut header).await?;

        let mut fields = &header[..];
        let soi = fields.get_u16();
        if soi != SOI {
            return Err(DemuxError::BadStartOfImage(soi));
        }
        let app0 = fields.get_u16();
        if app0 != APP0 {
            return Err(DemuxError::BadApp0(app0));
        }
        let length = fields.get_u16();
        let identifier = fields.get_u32();
        if identifier != JFIF_IDENTIFIER {
            return Err(DemuxError::BadIdentifier(identifier));
        }
        if length < APP0_FIXED_LENGTH {
            return Err(DemuxError::BadApp0Length(length));
        }

        out.put_slice(&header);

        // Embedded thumbnail
        self.copy_exact(usize::from(length - APP0_FIXED_LENGTH), out)
            .await
    }

    /// Copy a length field and its payload. Returns the payload offset in `out`.
    async fn copy_segment(&mut self, marker: u16, out: &mut BytesMut) -> Result<usize, DemuxError> {
        let length = self.reader.read_u16().await?;
        if length < 2 {
            return Err(DemuxError::BadSegmentLength { marker, length });
        }
        out.put_u16(length);

        let payload = out.len();
        self.copy_exact(usize::from(length - 2), out).await?;
        Ok(payload)
    }

    async fn copy_exact(&mut self, n: usize, out: &mut BytesMut) -> Result<(), DemuxError> {
        if n == 0 {
            return Ok(());
        }
        let start = out.len();
        out.resize(start + n, 0);
        self.reader.read_exact(&mut out[start..]).await?;
        Ok(())
    }

    /// Copy entropy-coded bytes up to and including the 0xFF 0xD9 pair
    async fn copy_entropy_coded(&mut self, out: &mut BytesMut) -> Result<(), DemuxError> {
        let mut prev = 0u8;
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                return Err(DemuxError::Truncated);
            }

            let mut consumed = chunk.len();
            let mut done = false;
            for (i, &byte) in chunk.iter().enumerate() {
                if prev == 0xFF && byte == 0xD9 {
                    consumed = i + 1;
                    done = true;
                    break;
                }
                prev = byte;
            }

            out.extend_from_slice(&chunk[..consumed]);
            self.reader.consume(consumed);

            if done {
                return Ok(());
            }
        }
    }
}
