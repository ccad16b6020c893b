//! The `prism serve` command: admission server plus worker pool.

use anyhow::Context;
use clap::Args;
use prism_core::{server, AdmissionState, Config, Profile, WorkerPool};

/// Arguments for the `serve` command.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to listen on (overrides server.bind)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Number of workers (overrides pool.workers)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Number of requests that may wait for a worker (overrides pool.queue_capacity)
    #[arg(short, long)]
    pub queue_capacity: Option<usize>,

    /// Default profile for requests that don't name one (overrides convert.profile)
    #[arg(short, long)]
    pub profile: Option<Profile>,
}

impl ServeArgs {
    /// Apply command-line overrides and re-validate.
    pub fn apply(&self, mut config: Config) -> anyhow::Result<Config> {
        if let Some(bind) = &self.bind {
            config.server.bind = bind.clone();
        }
        if let Some(workers) = self.workers {
            config.pool.workers = workers;
        }
        if let Some(capacity) = self.queue_capacity {
            config.pool.queue_capacity = capacity;
        }
        if let Some(profile) = self.profile {
            config.convert.profile = profile;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Execute the serve command.
pub async fn execute(config: Config, args: ServeArgs) -> anyhow::Result<()> {
    let config = args.apply(config)?;

    let (submitter, pool) = WorkerPool::from_config(&config)?;
    let state = AdmissionState::new(submitter, config.hostname())
        .with_default_profile(config.convert.profile)
        .with_default_destination(config.storage.default_destination_bucket.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    tracing::info!(
        "Prism v{} on {} ({} workers, queue capacity {}, default profile {})",
        prism_core::VERSION,
        state.hostname(),
        config.pool.workers,
        config.pool.queue_capacity,
        config.convert.profile
    );

    server::serve(listener, state, shutdown_signal()).await?;

    tracing::info!("Draining queued requests");
    pool.join().await;
    Ok(())
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
