//! Queues connecting the relay components
//!
//! The frame-ready queue has exactly one receiver, [`FrameQueue`]. Whoever
//! holds it is the only component allowed to remove frames from the store.
//! Handing the receiver over is how the sink and a writer take turns.

use tokio::sync::{mpsc, oneshot};

use crate::registry::FrameReady;

/// Receiving end of the frame-ready queue
pub type FrameQueue = mpsc::Receiver<FrameReady>;

/// Producer end of the frame-ready queue
pub type FrameSender = mpsc::Sender<FrameReady>;

/// Create the bounded frame-ready queue
pub fn frame_queue(capacity: usize) -> (FrameSender, FrameQueue) {
    mpsc::channel(capacity)
}

/// Control events for the sink consumer
#[derive(Debug)]
pub enum SinkControl {
    /// Stop draining and hand the frame queue back through `ack`
    Stop { ack: oneshot::Sender<FrameQueue> },
    /// Resume draining with the given queue
    Start(FrameQueue),
}

/// Control events for a writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterControl {
    Stop,
}
