//! Ingest producer
//!
//! Opens the ingest source, cuts it into frames, stores each frame and
//! announces it on the frame-ready queue. A full queue blocks the producer;
//! that is the only rate limit in the relay.

use std::sync::Arc;

use tokio::io::BufReader;

use crate::error::DemuxError;
use crate::ingest::{IngestReader, IngestSource};
use crate::media::{Dimensions, FrameDemuxer};
use crate::notify::{dimensions_record, Notifier};
use crate::registry::{FrameId, FrameReady, StoredFrame};

use super::context::RelayContext;
use super::control::FrameSender;

/// How one open of the ingest source ended
#[derive(Debug)]
enum StreamEnd {
    /// Clean end-of-stream between frames
    Eof,
    /// Malformed or truncated frame, or a read error
    Broken(DemuxError),
    /// Every frame-ready receiver is gone
    Closed,
}

/// Drives the ingest source for the process lifetime
pub struct Producer<S, N> {
    ctx: Arc<RelayContext>,
    source: S,
    notifier: N,
    frames: FrameSender,
    epoch: u64,
}

impl<S, N> Producer<S, N>
where
    S: IngestSource,
    N: Notifier,
{
    pub fn new(ctx: Arc<RelayContext>, source: S, notifier: N, frames: FrameSender) -> Self {
        Self {
            ctx,
            source,
            notifier,
            frames,
            epoch: 0,
        }
    }

    /// Run until the frame-ready queue is closed.
    ///
    /// Open failures and broken streams are retried after
    /// `open_retry_delay`; a clean end-of-stream after `reopen_delay`.
    pub async fn run(mut self) {
        let source = self.source.describe();

        loop {
            let reader = match self.source.open().await {
                Ok(reader) => reader,
                Err(e) => {
                    tracing::warn!(
                        source = %source,
                        error = %e,
                        retry_ms = self.ctx.config.open_retry_delay.as_millis() as u64,
                        "Failed to open ingest source"
                    );
                    tokio::time::sleep(self.ctx.config.open_retry_delay).await;
                    if self.frames.is_closed() {
                        return;
                    }
                    continue;
                }
            };

            self.epoch += 1;
            tracing::info!(source = %source, epoch = self.epoch, "Receiving incoming video");

            let delay = match self.pump(reader).await {
                StreamEnd::Eof => {
                    tracing::info!(source = %source, epoch = self.epoch, "Ingest stream ended, reopening");
                    self.ctx.config.reopen_delay
                }
                StreamEnd::Broken(e) => {
                    tracing::warn!(
                        source = %source,
                        epoch = self.epoch,
                        error = %e,
                        "Ingest stream broken, reopening"
                    );
                    self.ctx.config.open_retry_delay
                }
                StreamEnd::Closed => {
                    tracing::info!("Frame queue closed, producer exiting");
                    return;
                }
            };

            tokio::time::sleep(delay).await;
            if self.frames.is_closed() {
                return;
            }
        }
    }

    /// Demux one open of the ingest source until it ends
    async fn pump(&mut self, reader: IngestReader) -> StreamEnd {
        let mut demuxer = FrameDemuxer::new(BufReader::new(reader));
        let mut seq = 0u64;
        let mut announced = false;

        loop {
            let frame = match demuxer.scan().await {
                Ok(Some(frame)) => frame,
                Ok(None) => return StreamEnd::Eof,
                Err(e) => return StreamEnd::Broken(e),
            };

            seq += 1;
            let id = FrameId::new(self.epoch, seq);
            let dimensions = frame.dimensions.unwrap_or_default();
            let stored = StoredFrame::new(id, frame.data, dimensions);
            let ready = FrameReady::for_frame(&stored);

            self.ctx.store.put(stored).await;

            if !announced && dimensions.is_known() {
                self.announce(dimensions).await;
                announced = true;
            }

            if self.frames.send(ready).await.is_err() {
                self.ctx.store.remove(id).await;
                return StreamEnd::Closed;
            }
            self.ctx.stats.record_received();

            tracing::trace!(frame = %id, "Frame enqueued");
        }
    }

    /// First frame with known dimensions in this open
    async fn announce(&self, dimensions: Dimensions) {
        self.ctx.stats.set_dimensions(dimensions);
        tracing::info!(
            epoch = self.epoch,
            width = dimensions.width,
            height = dimensions.height,
            "Stream dimensions discovered"
        );

        let record = dimensions_record(&self.ctx.config.session_id, dimensions);
        self.notifier.publish(&record).await;
    }
}
