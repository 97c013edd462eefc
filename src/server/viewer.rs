//! Viewer session
//!
//! One session per connected viewer: welcome, take the frame queue from the
//! sink, run a writer, then hand the queue back. Inbound messages are echoed
//! from the welcome onwards, including while the sink is still stopping.
//! Any failure ends this session only.

use std::fmt::Display;
use std::sync::Arc;

use futures::{Sink, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::error::{Error, Result};
use crate::relay::{Outbound, RelayContext, Writer, WriterControl, WriterExit};
use crate::server::handoff::HandoffController;
use crate::server::welcome::Welcome;

enum SessionEnd {
    Inbound(Result<()>),
    Writer(std::result::Result<WriterExit, JoinError>),
}

/// Run a viewer session to completion
pub async fn serve_viewer<S, R>(
    ctx: Arc<RelayContext>,
    handoff: &HandoffController,
    outbound: Outbound<S>,
    inbound: R,
) -> Result<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    R: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    ctx.stats.set_viewer_connected(true);
    let result = run_session(&ctx, handoff, outbound, inbound).await;
    ctx.stats.set_viewer_connected(false);
    result
}

async fn run_session<S, R>(
    ctx: &Arc<RelayContext>,
    handoff: &HandoffController,
    outbound: Outbound<S>,
    mut inbound: R,
) -> Result<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
    R: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    let welcome = Welcome::new(ctx.stats.dimensions(), ctx.config.virtual_scale);
    outbound.send(Message::text(welcome.to_json()?)).await?;
    tracing::debug!(
        width = welcome.real_width,
        height = welcome.real_height,
        "Welcome sent"
    );

    let writer_outbound = outbound.clone();
    let echo = echo(&outbound, &mut inbound);
    tokio::pin!(echo);

    let acquire = handoff.acquire();
    tokio::pin!(acquire);

    let queue = tokio::select! {
        queue = &mut acquire => queue?,
        result = &mut echo => {
            // The sink may already have sent the queue, so the handoff has
            // to complete before the queue can go back
            tracing::debug!("Viewer left during handoff");
            let queue = acquire.await?;
            handoff.release(queue).await?;
            return result;
        }
    };

    let (stop_tx, stop_rx) = mpsc::channel(ctx.config.control_queue_capacity);
    let writer = Writer::new(Arc::clone(ctx), queue, stop_rx, writer_outbound);
    let mut writer = tokio::spawn(writer.run());

    let end = tokio::select! {
        result = &mut echo => SessionEnd::Inbound(result),
        exit = &mut writer => SessionEnd::Writer(exit),
    };

    let (exit, inbound_result) = match end {
        SessionEnd::Inbound(result) => {
            // Cooperative: a send in progress completes first
            if stop_tx.send(WriterControl::Stop).await.is_err() {
                tracing::debug!("Writer already gone");
            }
            (writer.await, result)
        }
        SessionEnd::Writer(exit) => (exit, Ok(())),
    };

    let exit = exit.map_err(|e| {
        tracing::error!(error = %e, "Writer task failed, frame queue lost");
        Error::ConsumerLost("writer task failed")
    })?;

    handoff.release(exit.queue).await?;
    inbound_result.and(exit.result)
}

/// Echo text and binary messages back until the viewer closes
async fn echo<S, R>(outbound: &Outbound<S>, inbound: &mut R) -> Result<()>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
    R: Stream<Item = std::result::Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = inbound.next().await {
        match message? {
            message @ (Message::Text(_) | Message::Binary(_)) => {
                outbound.send(message).await?;
            }
            Message::Close(_) => {
                tracing::debug!("Viewer sent close");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}
