//! Sink consumer
//!
//! Drains and discards frames while no viewer is attached, so the producer
//! never stalls on a full queue and the store never grows. It gives up the
//! frame queue on request and waits to be handed it back.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::registry::FrameReady;

use super::context::RelayContext;
use super::control::{FrameQueue, SinkControl};

enum SinkEvent {
    Control(Option<SinkControl>),
    Frame(Option<FrameReady>),
}

/// Background consumer active whenever no writer is
pub struct SinkConsumer {
    ctx: Arc<RelayContext>,
    control: mpsc::Receiver<SinkControl>,
}

/// Handle for sending control events to the sink
#[derive(Debug, Clone)]
pub struct SinkHandle {
    control: mpsc::Sender<SinkControl>,
}

impl SinkConsumer {
    /// Create the consumer and its control handle
    pub fn new(ctx: Arc<RelayContext>) -> (Self, SinkHandle) {
        let (tx, rx) = mpsc::channel(ctx.config.control_queue_capacity);
        (Self { ctx, control: rx }, SinkHandle { control: tx })
    }

    /// Drain `queue` until stopped; runs until the queue or the control
    /// channel is closed.
    pub async fn run(mut self, queue: FrameQueue) {
        let mut queue = Some(queue);
        self.ctx.stats.set_sink_active(true);

        loop {
            let Some(mut frames) = queue.take() else {
                // Parked: the queue belongs to a writer
                match self.control.recv().await {
                    Some(SinkControl::Start(frames)) => {
                        self.ctx.stats.set_sink_active(true);
                        tracing::debug!("Sink consumer resumed");
                        queue = Some(frames);
                    }
                    Some(SinkControl::Stop { .. }) => {
                        tracing::warn!("Stop requested while sink already stopped");
                    }
                    None => return,
                }
                continue;
            };

            let event = tokio::select! {
                biased;
                control = self.control.recv() => SinkEvent::Control(control),
                ready = frames.recv() => SinkEvent::Frame(ready),
            };

            match event {
                SinkEvent::Frame(Some(ready)) => {
                    self.dump(ready).await;
                    queue = Some(frames);
                }
                SinkEvent::Frame(None) => {
                    tracing::debug!("Frame queue closed, sink exiting");
                    return;
                }
                SinkEvent::Control(Some(SinkControl::Stop { ack })) => {
                    self.ctx.stats.set_sink_active(false);
                    match ack.send(frames) {
                        Ok(()) => tracing::debug!("Sink consumer stopped"),
                        Err(frames) => {
                            tracing::warn!("Stop requester went away, sink resuming");
                            self.ctx.stats.set_sink_active(true);
                            queue = Some(frames);
                        }
                    }
                }
                SinkEvent::Control(Some(SinkControl::Start(_))) => {
                    // Only one frame queue exists and this sink holds it
                    tracing::warn!("Start requested while sink already active");
                    queue = Some(frames);
                }
                SinkEvent::Control(None) => {
                    tracing::debug!("Sink control channel closed, sink exiting");
                    return;
                }
            }
        }
    }

    async fn dump(&self, ready: FrameReady) {
        if self.ctx.store.remove(ready.id).await.is_none() {
            tracing::warn!(frame = %ready.id, "Announced frame missing from store");
        }
        self.ctx.stats.record_dumped();
        tracing::trace!(frame = %ready.id, "Frame dumped");
    }
}

impl SinkHandle {
    /// Ask the sink to stop. The returned receiver yields the frame queue
    /// once the sink has stopped touching the store.
    pub async fn stop(&self) -> Result<oneshot::Receiver<FrameQueue>> {
        let (ack, rx) = oneshot::channel();
        self.control
            .send(SinkControl::Stop { ack })
            .await
            .map_err(|_| Error::ChannelClosed)?;
        Ok(rx)
    }

    /// Hand the frame queue back to the sink
    pub async fn start(&self, queue: FrameQueue) -> Result<()> {
        self.control
            .send(SinkControl::Start(queue))
            .await
            .map_err(|_| Error::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::Dimensions;
    use crate::registry::{FrameId, StoredFrame};
    use crate::relay::control::frame_queue;
    use crate::server::config::RelayConfig;
    use bytes::Bytes;
    use std::time::Duration;

    async fn produce(ctx: &RelayContext, tx: &mpsc::Sender<FrameReady>, seq: u64) {
        let frame = StoredFrame::new(
            FrameId::new(1, seq),
            Bytes::from_static(b"jpeg"),
            Dimensions::new(1, 1),
        );
        let ready = FrameReady::for_frame(&frame);
        ctx.store.put(frame).await;
        tx.send(ready).await.unwrap();
    }

    async fn wait_for<F: Fn(&RelayContext) -> bool>(ctx: &RelayContext, cond: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond(ctx) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_sink_drains_frames() {
        let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
        let (tx, queue) = frame_queue(10);
        let (sink, _handle) = SinkConsumer::new(ctx.clone());
        let task = tokio::spawn(sink.run(queue));

        for seq in 1..=5 {
            produce(&ctx, &tx, seq).await;
        }

        wait_for(&ctx, |ctx| ctx.stats.snapshot().dumped == 5).await;
        assert!(ctx.store.is_empty().await);

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_hands_back_queue_and_start_resumes() {
        let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
        let (tx, queue) = frame_queue(10);
        let (sink, handle) = SinkConsumer::new(ctx.clone());
        let _task = tokio::spawn(sink.run(queue));

        let mut queue = handle.stop().await.unwrap().await.unwrap();
        assert!(!ctx.stats.sink_active());

        // While stopped the sink must not touch the store
        produce(&ctx, &tx, 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ctx.store.len().await, 1);
        assert_eq!(ctx.stats.snapshot().dumped, 0);

        let ready = queue.try_recv().unwrap();
        assert_eq!(ready.id, FrameId::new(1, 1));
        ctx.store.remove(ready.id).await;

        handle.start(queue).await.unwrap();
        produce(&ctx, &tx, 2).await;
        wait_for(&ctx, |ctx| ctx.stats.snapshot().dumped == 1).await;
        assert!(ctx.stats.sink_active());
        assert!(ctx.store.is_empty().await);
    }

    #[tokio::test]
    async fn test_sink_exits_when_control_closed() {
        let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
        let (_tx, queue) = frame_queue(10);
        let (sink, handle) = SinkConsumer::new(ctx);
        let task = tokio::spawn(sink.run(queue));

        drop(handle);
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
