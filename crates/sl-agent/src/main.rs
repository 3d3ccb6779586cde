//! Screenlink Agent Daemon
//!
//! Connects this machine to a screenlink coordinator: starts the local
//! screen-share server, opens the reverse tunnel when enabled, registers,
//! and heartbeats until stopped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sl_agent::lifecycle::AgentLifecycle;
use sl_agent::probe::HostProbe;
use sl_agent::registration::RegistrationClient;
use sl_agent::tunnel::ssh::SshDialer;
use sl_agent::{service, setup, share};
use sl_core::config;
use sl_core::pidfile::PidFileGuard;
use sl_core::traits::ScreenShareProvider;

#[derive(Parser)]
#[command(name = "sl-agent")]
#[command(about = "screenlink agent - connects this machine to a coordinator")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run the interactive first-run setup
    #[arg(long)]
    setup: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Install the agent as a system service
    #[arg(long)]
    install_service: bool,

    /// Remove the installed system service
    #[arg(long)]
    remove_service: bool,

    /// Start the installed system service
    #[arg(long)]
    start_service: bool,

    /// Stop the installed system service
    #[arg(long)]
    stop_service: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| args.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    if args.setup {
        return setup::run_setup(&config_path);
    }
    if args.install_service {
        return service::install(&config_path).await;
    }
    if args.remove_service {
        return service::remove().await;
    }
    if args.start_service {
        return service::start().await;
    }
    if args.stop_service {
        return service::stop().await;
    }

    tracing::info!("Screenlink agent starting...");

    let config = config::load_config(&config_path);

    let _pid_guard = PidFileGuard::acquire_default(std::process::id())
        .context("Another agent instance appears to be running")?;

    let share: Arc<dyn ScreenShareProvider> = if config.auto_start_vnc {
        share::select_provider().context("No screen-share provider for this platform")?
    } else {
        Arc::new(share::DisabledProvider)
    };

    let client = Arc::new(RegistrationClient::new(config.server_url.clone()));
    let mut lifecycle = AgentLifecycle::new(
        config,
        Arc::new(HostProbe),
        share,
        client,
        Arc::new(SshDialer::new()),
    );

    // Flip the token on ctrl-c; the lifecycle handles the rest
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Stop signal received");
                shutdown.cancel();
            }
        });
    }

    lifecycle
        .run_until(shutdown)
        .await
        .context("Agent startup failed")?;

    Ok(())
}
