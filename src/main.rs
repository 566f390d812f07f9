//! rankgate service binary.
//!
//! Reads configuration from the environment, builds one policy per
//! source at startup (resilience state is process-wide, shared by all
//! requests), and serves the HTTP surface until stopped.

use std::sync::Arc;

use rankgate::config::ServerConfig;
use rankgate::server::{run_server, AppState};
use rankgate::sources::demo_sources;
use rankgate_core::{Controller, SourcePolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env()
        .map_err(|e| anyhow::anyhow!("configuration error: {e}"))?;
    tracing::info!(
        port = config.port,
        budget_ms = config.controller.budget.as_millis() as u64,
        default_k = config.default_k,
        "rankgate starting"
    );

    let policies: Vec<Arc<SourcePolicy>> = demo_sources()
        .into_iter()
        .map(|source| Arc::new(SourcePolicy::new(source, config.policy.clone())))
        .collect();
    for policy in &policies {
        tracing::info!(source = policy.name(), "source configured");
    }

    let controller = Controller::new(policies, config.controller.clone())
        .map_err(|e| anyhow::anyhow!("controller construction failed: {e}"))?;

    let state = AppState {
        controller: Arc::new(controller),
        default_k: config.default_k,
    };

    run_server(state, config.port).await.map_err(|e| {
        tracing::error!(error = %e, "rankgate exited with error");
        e
    })?;

    tracing::info!("rankgate shut down cleanly");
    Ok(())
}
