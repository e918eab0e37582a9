//! SDN load-balancing controller.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                  CONTROLLER                       │
//!   switch agent          │  ┌────────┐   ┌──────────┐   ┌────────────────┐  │
//!   ──────────────────────┼─▶│  net   │──▶│ dispatch │──▶│  event loop    │  │
//!   SwitchEvent (JSON)    │  │listener│   │  table   │   │                │  │
//!                         │  └────────┘   └──────────┘   └──┬─────────┬───┘  │
//!                         │                                 │         │      │
//!                         │              ┌──────────────────▼┐   ┌────▼────┐ │
//!                         │              │ classifier        │   │ session │ │
//!                         │              │ load_balancer     │   │registry │ │
//!                         │              │ flow builder      │   └─────────┘ │
//!                         │              └────────┬──────────┘               │
//!   ControllerMessage     │  ┌────────┐   ┌───────▼──────────┐               │
//!   ◀─────────────────────┼──│ writer │◀──│ rule installer / │               │
//!                         │  │  task  │   │ fallback flood   │               │
//!                         │  └────────┘   └──────────────────┘               │
//!                         │                                                  │
//!                         │  config (+ watcher)  observability  lifecycle    │
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use sdn_balancer::config::{load_config, ConfigWatcher, ControllerConfig};
use sdn_balancer::controller::Controller;
use sdn_balancer::lifecycle::{wait_for_signal, Shutdown, Signal};
use sdn_balancer::net::SwitchListener;
use sdn_balancer::observability::{init_logging, init_metrics};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "sdn-balancer")]
#[command(about = "Weighted round-robin SDN load-balancing controller", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ControllerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!("sdn-balancer v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let controller = Arc::new(Controller::new(&config.balancer)?);

    let watcher = cli.config.as_deref().map(ConfigWatcher::new);
    let (watcher, mut updates) = match watcher {
        Some((watcher, updates)) => (Some(watcher), Some(updates)),
        None => (None, None),
    };
    // Held for the lifetime of the process; dropping it stops file events.
    let _file_watch = match &watcher {
        Some(watcher) => match watcher.run() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Config file watching disabled");
                None
            }
        },
        None => None,
    };

    let listener = SwitchListener::bind(&config.listener).await?;
    let shutdown = Shutdown::new();
    let server = tokio::spawn(listener.serve(
        Arc::clone(&controller),
        shutdown.subscribe(),
        DRAIN_TIMEOUT,
    ));

    loop {
        tokio::select! {
            signal = wait_for_signal() => match signal? {
                Signal::Shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                Signal::Reload => match &watcher {
                    Some(watcher) => {
                        tracing::info!("SIGHUP received, reloading configuration");
                        watcher.reload_now();
                    }
                    None => tracing::warn!("SIGHUP ignored: no configuration file"),
                },
            },
            Some(update) = recv_update(&mut updates) => {
                if let Err(e) = controller.reconfigure(&update.balancer) {
                    tracing::error!(error = %e, "Rejected reloaded configuration");
                }
            }
        }
    }

    shutdown.trigger();
    server.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn recv_update(
    updates: &mut Option<tokio::sync::mpsc::UnboundedReceiver<ControllerConfig>>,
) -> Option<ControllerConfig> {
    match updates {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
