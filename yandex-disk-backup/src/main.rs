//! Yandex Disk Backup - Main entry point
//!
//! Serves the backup agent over HTTP, or checks the configuration with
//! `--check`.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use yandex_disk_backup::{
    api, daemon::shutdown::ShutdownCoordinator, utils, AgentError, Config, YandexDiskAgent,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the token against Yandex Disk and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("failed to load configuration")?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    // Initialize start time for uptime tracking
    api::health::init_start_time();

    tracing::info!(
        "Starting yandex-disk-backup v{} (entry: {}, folder: {})",
        env!("CARGO_PKG_VERSION"),
        config.disk.unique_id(),
        config.disk.backup_folder
    );

    let agent = Arc::new(YandexDiskAgent::new(config.disk.clone()));

    if args.check {
        let result = agent.validate().await;
        agent.close().await;
        result.context("configuration check failed")?;
        tracing::info!("Configuration check passed");
        return Ok(());
    }

    match agent.validate().await {
        Ok(_) => {}
        Err(e @ AgentError::Authentication(_)) => {
            return Err(e).context("refusing to start with an invalid token");
        }
        Err(e) => tracing::warn!("Yandex Disk not reachable at startup: {}", e),
    }

    // Determine address
    let port = args.port.unwrap_or(config.agent.port);
    let ip: IpAddr = config
        .agent
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.agent.bind))?;
    let addr = SocketAddr::new(ip, port);

    let state = api::AppState::new(agent.clone(), Arc::new(config));
    let app = api::create_router(state);

    let shutdown_coordinator = ShutdownCoordinator::new();
    let signals = {
        let coordinator = shutdown_coordinator.clone();
        tokio::spawn(async move { coordinator.wait_for_signal().await })
    };

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Health endpoint: http://{}/health", addr);
    tracing::info!("Backups endpoint: http://{}/backups", addr);

    // Spawn server task
    let graceful = {
        let coordinator = shutdown_coordinator.clone();
        async move { coordinator.triggered().await }
    };
    let server = axum::serve(listener, app).with_graceful_shutdown(graceful);
    let mut server_handle = tokio::spawn(async move { server.await });

    tokio::select! {
        _ = shutdown_coordinator.triggered() => {}
        result = &mut server_handle => {
            signals.abort();
            agent.close().await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e).context("server error"),
                Err(e) => Err(e).context("server task panicked"),
            };
        }
    }

    // Ends in-flight transfers so open responses can finish
    agent.close().await;

    // Wait for server to finish (with timeout)
    match tokio::time::timeout(std::time::Duration::from_secs(5), server_handle).await {
        Ok(Ok(Ok(()))) => tracing::info!("Server shutdown complete"),
        Ok(Ok(Err(e))) => tracing::error!("Server error during shutdown: {}", e),
        Ok(Err(e)) => tracing::error!("Server task panicked: {}", e),
        Err(_) => tracing::warn!("Server shutdown timeout, forcing exit"),
    }

    signals.abort();
    Ok(())
}
