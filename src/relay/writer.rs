//! Per-viewer writer
//!
//! Takes over the frame queue from the sink while a viewer is connected.
//! Backlog is coalesced so the viewer always gets the newest frame: every
//! event already queued behind the one just received is discarded and only
//! the last one is sent.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Sink, SinkExt};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::Message;

use crate::error::{Error, Result};
use crate::registry::{FrameId, FrameReady};

use super::context::RelayContext;
use super::control::{FrameQueue, WriterControl};

/// The single outbound write path of a viewer connection
///
/// Shared by the writer and the echo loop so their messages never
/// interleave mid-frame.
pub struct Outbound<S> {
    sink: Arc<Mutex<S>>,
}

impl<S> Clone for Outbound<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<S> Outbound<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
{
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Send one message
    pub async fn send(&self, message: Message) -> Result<()> {
        self.sink
            .lock()
            .await
            .send(message)
            .await
            .map_err(|e| Error::ViewerWrite(e.to_string()))
    }

    /// Send a frame's text description and its bytes back to back
    pub async fn send_frame(&self, description: &str, data: Bytes) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::text(description.to_owned()))
            .await
            .map_err(|e| Error::ViewerWrite(e.to_string()))?;
        sink.send(Message::binary(data))
            .await
            .map_err(|e| Error::ViewerWrite(e.to_string()))
    }
}

/// What a writer gives back when it exits
pub struct WriterExit {
    /// The frame queue, to be handed back to the sink
    pub queue: FrameQueue,
    /// Why the writer stopped: `Ok` on a stop request, `Err` on a failed send
    pub result: Result<()>,
}

enum WriterEvent {
    Control(Option<WriterControl>),
    Frame(Option<FrameReady>),
}

/// Sends the newest frame to one viewer
pub struct Writer<S> {
    ctx: Arc<RelayContext>,
    queue: FrameQueue,
    control: mpsc::Receiver<WriterControl>,
    outbound: Outbound<S>,
}

impl<S> Writer<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
{
    pub fn new(
        ctx: Arc<RelayContext>,
        queue: FrameQueue,
        control: mpsc::Receiver<WriterControl>,
        outbound: Outbound<S>,
    ) -> Self {
        Self {
            ctx,
            queue,
            control,
            outbound,
        }
    }

    /// Run until stopped or a send fails; always returns the queue
    pub async fn run(mut self) -> WriterExit {
        let result = self.serve().await;
        WriterExit {
            queue: self.queue,
            result,
        }
    }

    async fn serve(&mut self) -> Result<()> {
        loop {
            let event = tokio::select! {
                biased;
                control = self.control.recv() => WriterEvent::Control(control),
                ready = self.queue.recv() => WriterEvent::Frame(ready),
            };

            match event {
                WriterEvent::Control(Some(WriterControl::Stop)) | WriterEvent::Control(None) => {
                    tracing::debug!("Writer stopping");
                    return Ok(());
                }
                WriterEvent::Frame(None) => {
                    tracing::debug!("Frame queue closed, writer exiting");
                    return Ok(());
                }
                WriterEvent::Frame(Some(ready)) => {
                    let latest = self.coalesce(ready).await;
                    self.transmit(latest).await?;
                }
            }
        }
    }

    /// Skip to the newest already-queued event, discarding the rest
    async fn coalesce(&mut self, mut latest: FrameReady) -> FrameReady {
        while let Ok(next) = self.queue.try_recv() {
            self.discard(latest.id).await;
            latest = next;
        }
        latest
    }

    async fn discard(&self, id: FrameId) {
        if self.ctx.store.remove(id).await.is_none() {
            tracing::warn!(frame = %id, "Coalesced frame missing from store");
        }
        self.ctx.stats.record_dumped();
        tracing::trace!(frame = %id, "Frame coalesced");
    }

    async fn transmit(&self, ready: FrameReady) -> Result<()> {
        let Some(frame) = self.ctx.store.get(ready.id).await else {
            tracing::warn!(frame = %ready.id, "Announced frame missing from store");
            return Ok(());
        };

        let sent = self.outbound.send_frame(&ready.description, frame.data).await;
        self.ctx.store.remove(ready.id).await;
        sent?;

        self.ctx.stats.record_sent();
        tracing::trace!(frame = %ready.id, "Frame sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Dimensions;
    use crate::registry::StoredFrame;
    use crate::relay::control::frame_queue;
    use crate::server::config::RelayConfig;
    use futures::channel::mpsc as fmpsc;
    use futures::StreamExt;

    async fn produce(ctx: &RelayContext, tx: &mpsc::Sender<FrameReady>, seq: u64) {
        let frame = StoredFrame::new(
            FrameId::new(1, seq),
            Bytes::from(vec![seq as u8; 3]),
            Dimensions::new(750, 1334),
        );
        let ready = FrameReady::for_frame(&frame);
        ctx.store.put(frame).await;
        tx.send(ready).await.unwrap();
    }

    #[tokio::test]
    async fn test_writer_coalesces_backlog() {
        let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
        let (tx, queue) = frame_queue(10);
        for seq in 4..=10 {
            produce(&ctx, &tx, seq).await;
        }

        let (sink, mut viewer) = fmpsc::unbounded::<Message>();
        let (stop_tx, stop_rx) = mpsc::channel(2);
        let writer = Writer::new(ctx.clone(), queue, stop_rx, Outbound::new(sink));
        let task = tokio::spawn(writer.run());

        let text = viewer.next().await.unwrap();
        assert_eq!(text, Message::text("Width: 750, Height: 1334, Size: 3\n".to_string()));
        let binary = viewer.next().await.unwrap();
        assert_eq!(binary, Message::binary(vec![10u8; 3]));

        stop_tx.send(WriterControl::Stop).await.unwrap();
        let exit = task.await.unwrap();
        assert!(exit.result.is_ok());

        let snap = ctx.stats.snapshot();
        assert_eq!(snap.sent, 1);
        assert_eq!(snap.dumped, 6);
        assert!(ctx.store.is_empty().await);

        // Nothing else was sent
        drop(exit);
        assert!(viewer.next().await.is_none());
    }

    #[tokio::test]
    async fn test_writer_stop_returns_queue() {
        let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
        let (tx, queue) = frame_queue(10);
        let (sink, _viewer) = fmpsc::unbounded::<Message>();
        let (stop_tx, stop_rx) = mpsc::channel(2);

        stop_tx.send(WriterControl::Stop).await.unwrap();
        let exit = Writer::new(ctx.clone(), queue, stop_rx, Outbound::new(sink))
            .run()
            .await;
        assert!(exit.result.is_ok());

        // The returned queue is the live one
        let mut queue = exit.queue;
        produce(&ctx, &tx, 1).await;
        assert_eq!(queue.recv().await.unwrap().id, FrameId::new(1, 1));
        assert_eq!(ctx.stats.snapshot().sent, 0);
    }

    #[tokio::test]
    async fn test_writer_send_failure_removes_frame() {
        let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
        let (tx, queue) = frame_queue(10);
        let (sink, viewer) = fmpsc::unbounded::<Message>();
        drop(viewer);

        let (_stop_tx, stop_rx) = mpsc::channel(2);
        produce(&ctx, &tx, 1).await;

        let exit = Writer::new(ctx.clone(), queue, stop_rx, Outbound::new(sink))
            .run()
            .await;
        assert!(matches!(exit.result, Err(Error::ViewerWrite(_))));
        assert!(ctx.store.is_empty().await);
        assert_eq!(ctx.stats.snapshot().sent, 0);
    }
}
