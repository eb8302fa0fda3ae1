mod capture;
mod cli;
mod kubernetes;
mod manager;
mod registry;
mod runner;
mod types;
mod utils;

use clap::Parser;
use kube::{Client, config};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use capture::TcpdumpSpawner;
use cli::Cli;
use kubernetes::{node_pod_events, watch_pods};
use manager::CaptureManager;
use runner::supervise;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let kube_config = config::Config::infer()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load cluster config: {}", e))?;
    let client = Client::try_from(kube_config)
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    let manager = CaptureManager::new(cli.capture_settings(), Arc::new(TcpdumpSpawner));
    let policy = cli.restart_policy();
    let prune_on_resync = cli.prune_on_resync;
    let node_name = cli.node_name.clone();

    info!(
        "Starting packet capture controller on node {} (annotation: {}, dir: {})",
        node_name,
        cli.annotation,
        cli.capture_dir.display()
    );

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => error!("Failed to listen for shutdown signals: {}", e),
        }
        signal_token.cancel();
    });

    let manager_ref = &manager;
    let shutdown_ref = &shutdown;
    let run_watch = move || {
        let events = node_pod_events(client.clone(), &node_name);
        watch_pods(events, manager_ref, prune_on_resync, shutdown_ref)
    };

    let restarts = supervise(&policy, &shutdown, run_watch).await;
    if !shutdown.is_cancelled() {
        warn!("Pod watch stopped after {} reconnects", restarts);
    }

    info!(
        "Stopping {} active captures",
        manager.registry().len().await
    );
    manager.stop_all().await;
    Ok(())
}

async fn shutdown_signal() -> anyhow::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
