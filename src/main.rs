//! remote-guard daemon.
//!
//! ```text
//!   config file ──▶ loader ──▶ GuardRegistry ──▶ ConnectionGuard (per remote)
//!        │                          ▲                 │
//!        └── watcher ── reload ─────┘                 ├──▶ HyperTransport ──▶ remote
//!                                                     └──▶ probe (while blocked)
//!
//!   admin API ──▶ registry statuses / manual checks
//!   Prometheus exporter ◀── status gauges and counters
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use remote_guard::admin::setup_admin_router;
use remote_guard::client::GuardRegistry;
use remote_guard::config::loader::load_config;
use remote_guard::config::watcher::ConfigWatcher;
use remote_guard::lifecycle::{signals, Shutdown};
use remote_guard::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "remote-guard")]
#[command(about = "Remote connection health guard for repository proxies", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "remote-guard.toml")]
    config: PathBuf,

    /// Do not reload the configuration when the file changes.
    #[arg(long)]
    no_watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        remotes = config.remotes.len(),
        "remote-guard starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let registry = Arc::new(GuardRegistry::with_hyper_transport());
    registry.apply(&config.remotes);

    let shutdown = Shutdown::new();

    // Reload remotes on config change.
    let (watcher, mut updates) = ConfigWatcher::new(&args.config);
    let _watcher = if args.no_watch { None } else { Some(watcher.run()?) };
    let reload_registry = registry.clone();
    let mut reload_shutdown = shutdown.subscribe();
    let reload_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(new_config) => {
                        reload_registry.apply(&new_config.remotes);
                        tracing::info!("Configuration reloaded; admin and observability changes need a restart");
                    }
                    None => break,
                },
                _ = reload_shutdown.recv() => break,
            }
        }
    });

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");

        let router = setup_admin_router(registry.clone(), &config.admin);
        let mut admin_shutdown = shutdown.subscribe();
        Some(tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin server failed");
            }
        }))
    } else {
        None
    };

    signals::wait_for_shutdown().await;
    tracing::info!("Shutting down");
    shutdown.trigger();

    if let Some(task) = admin_task {
        let _ = task.await;
    }
    let _ = reload_task.await;
    registry.close_all();

    tracing::info!("Shutdown complete");
    Ok(())
}
