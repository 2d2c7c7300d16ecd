//! UPSF Shard Manager
//!
//! Keeps every shard in the UPSF mapped to an available service gateway
//! user plane, following static bindings from the policy file and spreading
//! the rest by load. Optionally registers predefined shards.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use upsf_shard_manager::{
    backoff::BackoffPolicy, config::Config, grpc_client::UpsfGrpcClient, policy::load_policy,
    Controller, SubscriptionPump,
};

/// Pending triggers buffered between the subscription and the controller.
const TRIGGER_QUEUE_DEPTH: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    // Initialize tracing (prefer RUST_LOG, fallback to LOGLEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_filter().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting UPSF shard manager");
    info!(
        upsf = %config.upsf_endpoint(),
        config_file = %config.config_file.display(),
        auto_register = config.auto_register,
        "Configuration loaded"
    );

    let policy = load_policy(&config.config_file)
        .with_context(|| format!("failed to load policy from {}", config.config_file.display()))?;
    info!(
        bindings = policy.bindings().count(),
        templates = policy.templates().len(),
        "Policy loaded"
    );

    let client = Arc::new(UpsfGrpcClient::connect_lazy(
        &config.upsf_endpoint(),
        config.rpc_timeout(),
    )?);

    // Create shutdown channel for graceful shutdown
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE_DEPTH);

    let pump = SubscriptionPump::new(client.clone(), trigger_tx, BackoffPolicy::default());
    let pump_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            pump.run(shutdown_rx).await;
        }
    });

    let controller = Controller::new(client, Arc::new(policy), config.controller_config());
    let controller_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            controller.run(trigger_rx, shutdown_rx).await;
        }
    });

    wait_for_signal().await?;

    // Signal shutdown to all workers
    let _ = shutdown_tx.send(true);

    // The controller finishes its current pass before stopping
    info!("Waiting for workers to shut down...");
    let shutdown_timeout = Duration::from_secs(10);

    match tokio::time::timeout(shutdown_timeout, controller_handle).await {
        Ok(Err(e)) => error!(error = %e, "Controller task panicked"),
        Err(_) => warn!("Controller did not shut down in time"),
        Ok(Ok(())) => {}
    }

    if tokio::time::timeout(shutdown_timeout, pump_handle).await.is_err() {
        warn!("Subscription pump did not shut down in time");
    }

    info!("Shard manager shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn wait_for_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.context("failed to listen for Ctrl+C")?,
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    info!("Received shutdown signal");
    Ok(())
}
