//! vplay-gw - Rust implementation
//!
//! Gateway mirroring a Video Playback device's button state into variables
//! and feedbacks for control surfaces.

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vplay_gw::api::{self, ApiState};
use vplay_gw::config::{AppConfig, ConfigWatcher};
use vplay_gw::drivers::ConnectionStatus;
use vplay_gw::sync::PollOutcome;
use vplay_gw::{cli, Gateway};

/// vplay-gw - mirror a Video Playback device into variables and feedbacks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Start the interactive REPL
    #[arg(long)]
    repl: bool,

    /// Override the API port from the config file
    #[arg(long)]
    api_port: Option<u16>,

    /// Poll once, print the published variables and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("Starting vplay-gw v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    if args.once {
        let config = AppConfig::load(&args.config).await?;
        return run_once(&config).await;
    }

    let (config_watcher, initial_config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let gateway = Arc::new(Gateway::new(&initial_config)?);

    run_app(gateway, &initial_config, &args, config_watcher, shutdown_signal()).await?;

    info!("vplay-gw shutdown complete");
    Ok(())
}

/// One poll, variables to stdout
async fn run_once(config: &AppConfig) -> Result<()> {
    let gateway = Gateway::new(config)?;
    match gateway.poll_now().await {
        PollOutcome::Applied(report) => {
            info!("✅ Polled {} button(s)", report.buttons);
            for (id, value) in gateway.surface().variables(None) {
                println!("{} = {}", id.yellow(), value);
            }
            Ok(())
        },
        outcome => anyhow::bail!(
            "Poll of {} did not apply ({:?}, connection: {})",
            gateway.device_url(),
            outcome,
            gateway.connection_status()
        ),
    }
}

async fn run_app(
    gateway: Arc<Gateway>,
    config: &AppConfig,
    args: &Args,
    mut config_watcher: ConfigWatcher,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    // Connection status changes → main loop
    let (status_tx, mut status_rx) = mpsc::unbounded_channel::<ConnectionStatus>();
    gateway.status().subscribe(Arc::new(move |status| {
        let _ = status_tx.send(status);
    }));

    if config.api.enabled {
        let port = args.api_port.unwrap_or(config.api.port);
        let state = Arc::new(ApiState {
            gateway: gateway.clone(),
        });
        tokio::spawn(async move {
            if let Err(e) = api::start_server(state, port).await {
                error!("API server stopped: {:#}", e);
            }
        });
    }

    gateway.start();

    // REPL runs on a blocking thread; its exit ends the app
    let (repl_done_tx, mut repl_done_rx) = mpsc::channel::<()>(1);
    if args.repl {
        let repl_gateway = gateway.clone();
        let runtime = tokio::runtime::Handle::current();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = cli::run_repl(repl_gateway, runtime) {
                error!("REPL error: {}", e);
            }
            let _ = repl_done_tx.blocking_send(());
        });
    } else {
        drop(repl_done_tx);
    }

    info!("✅ Ready");

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(new_config) = config_watcher.next_config() => {
                info!("Applying reloaded configuration...");
                if let Err(e) = gateway.update_config(new_config) {
                    warn!("⚠️  Failed to apply config (keeping old config): {:#}", e);
                }
            }

            Some(status) = status_rx.recv() => {
                match &status {
                    ConnectionStatus::Ok => info!("✅ Playback device connected"),
                    ConnectionStatus::Warning(msg) => warn!("⚠️  Playback device: {}", msg),
                    ConnectionStatus::ConnectionFailure(msg) => {
                        warn!("🔌 Playback device unreachable: {}", msg)
                    }
                    ConnectionStatus::Disconnected => info!("Playback device disconnected"),
                }
            }

            Some(()) = repl_done_rx.recv() => {
                info!("REPL closed, stopping");
                break;
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    info!("Shutting down...");
    gateway.shutdown();

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
