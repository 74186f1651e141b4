//! Drover Runner
//!
//! A persistent worker that executes deployment jobs for one organization.
//!
//! Architecture:
//! - Configuration: flags and environment variables, validated at startup
//! - Reporting: batched pipelines carrying status records to the orchestrator
//! - Commands: idempotent steps resolved from the tags a job carries
//! - Effectors: git, shell builds, containers, and the cloud provider
//! - Scheduler: job polling and the worker/forwarder pools
//! - Shutdown: signal handling and pipeline drainage
//!
//! The runner keeps one control channel open to the orchestrator, polls it
//! for pending jobs, runs each job's commands in order, and reports every
//! outcome back through the report pipelines.

mod commands;
mod config;
mod context;
mod effectors;
mod reporting;
mod scheduler;
mod service;
mod shutdown;

#[cfg(test)]
mod testing;

use anyhow::{Context as _, Result};
use clap::Parser;
use drover_client::{ChannelConfig, ControlChannel, ControlPlane, Credentials, TlsMaterial};
use drover_core::domain::runner::RunnerIdentity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{Registry, Toolkit};
use crate::config::{Config, RunnerArgs, TlsPaths};
use crate::effectors::{DockerCli, GitCli, LocalCloud, ShellBuild};
use crate::reporting::ReportPipelines;
use crate::scheduler::Dispatcher;
use crate::service::JobRunner;
use crate::shutdown::ShutdownCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drover_runner=info,drover_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Drover Runner");

    // Load configuration
    let config = load_config(RunnerArgs::parse())?;
    info!(
        "Loaded configuration: organization={}, mode={}, target={}, orchestrator_url={}",
        config.organization_id, config.mode, config.target_cloud, config.orchestrator_url
    );

    let identity = Arc::new(RunnerIdentity::for_host(
        config.service.clone(),
        config.region.clone(),
        config.cloud_account_id.clone(),
        config.mode,
        config.target_cloud,
    ));
    info!("Runner instance {}", identity.instance_id);

    // Open the control channel
    let mut channel_config = ChannelConfig::new(
        config.orchestrator_url.clone(),
        Credentials::new(config.organization_id.clone(), config.token.clone()),
    )
    .with_ping_interval(config.ping_interval);
    if let Some(paths) = &config.tls {
        channel_config = channel_config.with_tls(load_tls(paths)?);
    }

    let channel = Arc::new(
        ControlChannel::new(channel_config).context("Failed to create control channel")?,
    );
    channel.connect();
    wait_for_channel(&channel).await;

    let plane: Arc<dyn ControlPlane> = channel.clone();
    let reports = Arc::new(ReportPipelines::start(Arc::clone(&plane)));

    // Initialize effectors
    let cloud = LocalCloud::open(&config.local_cloud_dir).with_context(|| {
        format!(
            "Failed to open local cloud state at {}",
            config.local_cloud_dir.display()
        )
    })?;

    let containers = DockerCli::new();
    match containers.check_available().await {
        Ok(version) => info!("Container tool available: {}", version),
        Err(e) => warn!("Container tool unavailable, image builds will fail: {}", e),
    }

    let toolkit = Toolkit {
        plane: Arc::clone(&plane),
        reports: Arc::clone(&reports),
        source: Arc::new(GitCli),
        builder: Arc::new(ShellBuild),
        containers: Arc::new(containers),
        cloud: Arc::new(cloud),
    };

    let registered = Registry::init();
    info!("Registered {} command(s)", registered);

    let runner = JobRunner::new(
        Registry::new(toolkit),
        Arc::clone(&plane),
        Arc::clone(&reports),
        config.workspace_root.clone(),
        config.heartbeat_interval,
    );

    // Start the dispatcher
    let coordinator = ShutdownCoordinator::new();
    coordinator
        .install_signal_handlers()
        .context("Failed to install signal handlers")?;

    let dispatcher = Dispatcher::new(
        identity,
        plane,
        Arc::new(runner),
        Arc::clone(&reports),
        coordinator.token(),
    )
    .with_poll_interval(config.poll_interval)
    .with_pools(config.workers, config.forwarders);

    info!("Runner initialized successfully");
    let handle = tokio::spawn(dispatcher.run());

    coordinator.run(handle, &reports, &channel).await;
    Ok(())
}

/// Resolves and validates the configuration; any problem is fatal
fn load_config(args: RunnerArgs) -> Result<Config> {
    let config = Config::from_args(args).context("Invalid configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_tls(paths: &TlsPaths) -> Result<TlsMaterial> {
    let read = |path: &std::path::Path| {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
    };

    Ok(TlsMaterial {
        cert_pem: read(paths.cert.as_path())?,
        key_pem: read(paths.key.as_path())?,
        ca_pem: paths.ca.as_deref().map(read).transpose()?,
    })
}

/// Waits for the first successful probe, logging with exponential backoff
///
/// The orchestrator may not be ready yet when the runner starts (common in
/// container environments). Stops waiting after `MAX_WAITS` attempts; the
/// dispatcher and pipelines work through a disconnected channel.
async fn wait_for_channel(channel: &ControlChannel) {
    const INITIAL_DELAY_MS: u64 = 500;
    const MAX_DELAY_MS: u64 = 30_000;
    const MAX_WAITS: u32 = 10;

    let mut attempt = 0;
    let mut delay_ms = INITIAL_DELAY_MS;

    while !channel
        .wait_until_connected(Duration::from_millis(delay_ms))
        .await
    {
        attempt += 1;
        if attempt >= MAX_WAITS {
            warn!(
                "Orchestrator still unreachable after {} attempt(s), starting anyway",
                attempt
            );
            return;
        }

        warn!(
            "Waiting for orchestrator at {} (attempt {}/{}), state: {:?}",
            channel.base_url(),
            attempt,
            MAX_WAITS,
            channel.state()
        );

        // Exponential backoff with cap
        delay_ms = (delay_ms * 2).min(MAX_DELAY_MS);
    }

    if attempt > 0 {
        info!("Connected to orchestrator after {} attempt(s)", attempt + 1);
    } else {
        info!("Connected to orchestrator");
    }
}
