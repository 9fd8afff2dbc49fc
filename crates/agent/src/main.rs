//! `printdeck-agent` -- headless print-farm mirror.
//!
//! Connects to a print server, keeps a live mirror of its printers, queues
//! and job timing, and logs every change. Stops on Ctrl-C.
//!
//! # Environment variables
//!
//! | Variable                     | Required | Default     | Description                         |
//! |------------------------------|----------|-------------|-------------------------------------|
//! | `PRINTDECK_SERVER_IP`        | no       | `127.0.0.1` | Print server IPv4 address           |
//! | `PRINTDECK_SERVER_PORT`      | no       | `8000`      | Print server port                   |
//! | `PRINTDECK_TICK_MS`          | no       | `1000`      | Milliseconds between time projections |
//! | `PRINTDECK_NAIVE_TIMESTAMPS` | no       | `local`     | `local` or `utc` for offset-less timestamps |
//! | `RUST_LOG`                   | no       | see below   | Tracing filter                      |

use std::sync::Arc;

use printdeck_agent::config::AgentConfig;
use printdeck_events::{EventBus, EventLogger};
use printdeck_mirror::MirrorService;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "printdeck_agent=info,printdeck_mirror=info,printdeck_link=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AgentConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        endpoint = %config.endpoint,
        tick_ms = config.tick_interval.as_millis() as u64,
        naive_zone = ?config.naive_zone,
        "Starting printdeck-agent",
    );

    let bus = Arc::new(EventBus::default());
    let logger = tokio::spawn(EventLogger::run(bus.subscribe()));

    let service = MirrorService::start(config.mirror(), Arc::clone(&bus)).await;

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    tracing::info!("Shutting down");
    service.shutdown().await;
    logger.abort();
    tracing::info!("printdeck-agent stopped");
}
