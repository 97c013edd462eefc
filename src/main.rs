//! mirrorfeed: relay an MJPEG screen capture to a WebSocket viewer
//!
//! Run with: mirrorfeed <PORT> <INGEST> [--bind ADDR] [--coordinator ADDR] [--session-id ID]
//!
//! `INGEST` is a file or named pipe carrying back-to-back JPEG frames. It is
//! reopened whenever it ends or breaks. Viewers connect with any WebSocket
//! client to `ws://<bind>:<port>/`.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use mirrorfeed::ingest::FileSource;
use mirrorfeed::notify::{Notifier, NoopNotifier, UdpNotifier};
use mirrorfeed::{Pipeline, RelayConfig, RelayContext, RelayServer};

#[derive(Debug, Parser)]
#[command(name = "mirrorfeed", version, about = "MJPEG screen mirror relay")]
struct Args {
    /// Port the viewer listener binds to
    port: u16,

    /// MJPEG ingest file or named pipe
    ingest: PathBuf,

    /// Address the viewer listener binds to
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Coordinator address receiving startup and dimension records
    #[arg(long)]
    coordinator: Option<SocketAddr>,

    /// Session identifier included in coordinator records
    #[arg(long, default_value = "")]
    session_id: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mirrorfeed=info")),
        )
        .init();

    let config = RelayConfig::with_addr(SocketAddr::new(args.bind, args.port))
        .session_id(args.session_id.clone());
    let source = FileSource::new(&args.ingest);

    match args.coordinator {
        Some(target) => {
            let notifier = UdpNotifier::new(target, config.notify_timeout);
            tracing::info!(coordinator = %notifier.target(), "Coordinator notifications enabled");
            run(config, source, notifier).await?;
        }
        None => run(config, source, NoopNotifier).await?,
    }

    Ok(())
}

async fn run<N: Notifier>(config: RelayConfig, source: FileSource, notifier: N) -> mirrorfeed::Result<()> {
    let ctx = Arc::new(RelayContext::new(config));
    tracing::info!(ingest = %source.path().display(), "Starting relay");

    let pipeline = Pipeline::start(Arc::clone(&ctx), source, notifier).await;
    let reporter = ctx.spawn_stats_reporter();

    let server = RelayServer::new(Arc::clone(&ctx), pipeline.sink().clone());
    let result = server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await;

    reporter.abort();
    pipeline.abort();
    tracing::info!(status = %server.status(), "Relay stopped");
    result
}
