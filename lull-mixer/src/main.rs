//! Lull Mixer (lull-mixer) - Main entry point
//!
//! Runs the ambient-sound mixing engine behind an HTTP/SSE control interface.
//! There is no decoder: sounds render through the in-memory backend.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use lull_common::config::resolve_config_file;
use lull_common::SubscriptionTier;
use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lull_mixer::api::{self, AppContext};
use lull_mixer::config::{TomlConfig, APP_NAME, CONFIG_ENV_VAR};
use lull_mixer::playback::{ChannelRegistry, MixSession, RegistryConfig, SimulatedBackend, SimulatedFocusHost};
use lull_mixer::SharedState;

/// Command-line arguments for lull-mixer
#[derive(Parser, Debug)]
#[command(name = "lull-mixer")]
#[command(about = "Ambient sound mixing engine")]
#[command(version)]
struct Args {
    /// Configuration file (overrides LULL_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "LULL_PORT")]
    port: Option<u16>,

    /// Log filter when RUST_LOG is unset (overrides the config file)
    #[arg(long)]
    log_level: Option<String>,

    /// Initial subscription tier
    #[arg(long, default_value_t = SubscriptionTier::Free)]
    tier: SubscriptionTier,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_file = resolve_config_file(args.config.as_deref(), CONFIG_ENV_VAR, APP_NAME);
    let config = TomlConfig::load(config_file.as_ref()).context("Failed to load configuration")?;

    // Initialize tracing
    let level = args.log_level.clone().unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("lull_mixer={level},lull_common={level},tower_http={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &config_file {
        Some(file) => info!("Configuration: {}", file.path.display()),
        None => warn!("No configuration directory available, using defaults"),
    }

    let port = args.port.unwrap_or(config.port);
    info!("Starting Lull Mixer on port {} (tier {})", port, args.tier);

    let state = Arc::new(SharedState::new());
    let (tier_tx, tier_rx) = watch::channel(args.tier);

    let backend = Arc::new(SimulatedBackend::new().with_prepare_delay(config.prepare_delay()));
    let focus_host = Arc::new(SimulatedFocusHost::new());
    let registry_config = RegistryConfig {
        fade: config.fade_settings(),
        duck_factor: config.focus.duck_factor,
        policy: Arc::new(config.mix_limit_policy()),
    };

    let (mixer, registry_task) =
        ChannelRegistry::spawn(registry_config, backend, focus_host, tier_rx.clone(), state.clone());
    info!("Channel registry initialized");

    let session = Arc::new(MixSession::new(mixer.clone(), tier_rx, state.clone()));

    let ctx = AppContext {
        state,
        session,
        tier_tx: Arc::new(tier_tx),
        port,
    };

    api::run(ctx, shutdown_signal()).await.context("Server error")?;

    mixer.release().await.context("Failed to release mixer")?;
    registry_task.await.context("Registry task failed")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
