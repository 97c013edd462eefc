//! Handoff between the sink consumer and a viewer's writer
//!
//! ```text
//! Session                      Sink
//!   |------ Stop { ack } ------->|
//!   |        (waitCnt += 1       |  finishes current frame,
//!   |         per interval)      |  clears dummyActive
//!   |<------ ack(FrameQueue) ----|
//!   |   ... writer owns queue ...|  (parked)
//!   |------ Start(FrameQueue) -->|
//!   |                            |  sets dummyActive, drains again
//! ```
//!
//! The acknowledgement carries the queue itself, so a writer cannot exist
//! before the sink has let go of it.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::relay::{FrameQueue, RelayContext, SinkHandle};
use crate::server::config::MIN_TICK_INTERVAL;

/// Moves the frame queue between the sink and a writer
#[derive(Debug, Clone)]
pub struct HandoffController {
    ctx: Arc<RelayContext>,
    sink: SinkHandle,
}

impl HandoffController {
    pub fn new(ctx: Arc<RelayContext>, sink: SinkHandle) -> Self {
        Self { ctx, sink }
    }

    /// Stop the sink and take the frame queue
    ///
    /// Waits until the sink confirms; every `handoff_poll_interval` spent
    /// waiting is counted in `waitCnt`.
    pub async fn acquire(&self) -> Result<FrameQueue> {
        let mut ack = self.sink.stop().await?;
        let interval = self.ctx.config.handoff_poll_interval.max(MIN_TICK_INTERVAL);

        loop {
            match tokio::time::timeout(interval, &mut ack).await {
                Ok(Ok(queue)) => {
                    tracing::debug!("Sink confirmed stop, frame queue acquired");
                    return Ok(queue);
                }
                Ok(Err(_)) => {
                    return Err(Error::ConsumerLost("sink refused to hand over the frame queue"));
                }
                Err(_) => {
                    self.ctx.stats.record_wait();
                    tracing::debug!("Waiting for sink consumer to stop");
                }
            }
        }
    }

    /// Give the frame queue back to the sink
    pub async fn release(&self, queue: FrameQueue) -> Result<()> {
        self.sink.start(queue).await?;
        tracing::debug!("Frame queue returned to sink");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{frame_queue, SinkConsumer};
    use crate::server::config::RelayConfig;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
        let (_tx, queue) = frame_queue(10);
        let (sink, handle) = SinkConsumer::new(ctx.clone());
        let _task = tokio::spawn(sink.run(queue));

        let handoff = HandoffController::new(ctx.clone(), handle);
        let queue = handoff.acquire().await.unwrap();
        assert!(!ctx.stats.sink_active());

        handoff.release(queue).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while !ctx.stats.sink_active() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_acquire_counts_waits() {
        let config = RelayConfig::default().handoff_poll_interval(std::time::Duration::from_millis(10));
        let ctx = Arc::new(RelayContext::new(config));
        let (_tx, queue) = frame_queue(10);
        let (sink, handle) = SinkConsumer::new(ctx.clone());
        let handoff = HandoffController::new(ctx.clone(), handle);

        // Sink not running yet: the stop sits in its control queue
        let acquire = tokio::spawn(async move { handoff.acquire().await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let _task = tokio::spawn(sink.run(queue));

        let queue = acquire.await.unwrap();
        assert!(queue.is_ok());
        assert!(ctx.stats.snapshot().wait_cnt >= 1);
    }

    #[tokio::test]
    async fn test_acquire_fails_when_sink_gone() {
        let ctx = Arc::new(RelayContext::new(RelayConfig::default()));
        let (sink, handle) = SinkConsumer::new(ctx.clone());
        drop(sink);

        let handoff = HandoffController::new(ctx, handle);
        assert!(matches!(handoff.acquire().await, Err(Error::ChannelClosed)));
    }
}
