//! Producer/consumer relay
//!
//! ```text
//!                     RelayContext { store, stats, config }
//!                                   │
//!   [Producer] ──► FrameReady queue (bounded) ──► owner: [Sink] xor [Writer]
//!       │                                              ▲          │
//!       └── Notifier (dimensions)        SinkControl ──┘          └──► viewer
//! ```
//!
//! The frame-ready queue has a single receiver. The sink owns it while no
//! viewer is attached; a viewer session asks the sink to stop, receives the
//! receiver through a one-shot acknowledgement, lends it to its writer, and
//! hands it back to the sink on disconnect. Owning the receiver is the right
//! to remove frames from the store, so two consumers can never remove the
//! same frame.

pub mod context;
pub mod control;
pub mod producer;
pub mod sink;
pub mod writer;

pub use context::RelayContext;
pub use control::{frame_queue, FrameQueue, SinkControl, WriterControl};
pub use producer::Producer;
pub use sink::{SinkConsumer, SinkHandle};
pub use writer::{Outbound, Writer, WriterExit};

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::ingest::IngestSource;
use crate::notify::{startup_record, Notifier};

/// The long-lived half of the relay: one producer and the sink consumer
pub struct Pipeline {
    sink: SinkHandle,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl Pipeline {
    /// Publish the startup probe, then spawn the producer and the sink
    pub async fn start<S, N>(ctx: Arc<RelayContext>, source: S, notifier: N) -> Self
    where
        S: IngestSource,
        N: Notifier,
    {
        notifier
            .publish(&startup_record(&ctx.config.session_id))
            .await;

        let (frames, queue) = frame_queue(ctx.config.frame_queue_capacity);
        let (sink, handle) = SinkConsumer::new(Arc::clone(&ctx));

        let consumer = tokio::spawn(sink.run(queue));
        let producer = tokio::spawn(Producer::new(ctx, source, notifier, frames).run());

        Self {
            sink: handle,
            producer,
            consumer,
        }
    }

    /// Control handle of the sink consumer
    pub fn sink(&self) -> &SinkHandle {
        &self.sink
    }

    /// Stop the producer and the sink
    pub fn abort(&self) {
        self.producer.abort();
        self.consumer.abort();
    }
}
