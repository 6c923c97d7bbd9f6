//! # proofcast
//!
//! Push hub binary: loads settings, wires the remote verifier into the
//! server and runs until Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use proofcast_core::Verifier;
use proofcast_logging::{LoggingConfig, init_logging};
use proofcast_server::{ProofcastServer, ServerConfig, wait_for_signal};
use proofcast_settings::ProofcastSettings;
use proofcast_verifier::RemoteVerifier;

/// Time allowed for in-flight work after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Proofcast push hub.
#[derive(Parser, Debug)]
#[command(name = "proofcast", about = "WebSocket push hub for identity proof workflows")]
struct Cli {
    /// Settings file (JSON). Missing file means defaults.
    #[arg(long, default_value = "proofcast.json")]
    config: PathBuf,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Externally reachable base URL used in callback links (overrides settings).
    #[arg(long)]
    public_url: Option<String>,

    /// Verifier endpoint (overrides settings).
    #[arg(long)]
    verifier_url: Option<String>,

    /// Refuse workflow starts for sessions without a live connection.
    #[arg(long)]
    require_live_connection: bool,
}

impl Cli {
    /// Apply command-line overrides on top of file and env settings.
    fn apply(&self, settings: &mut ProofcastSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(url) = &self.public_url {
            settings.server.public_url.clone_from(url);
        }
        if let Some(url) = &self.verifier_url {
            settings.verifier.url.clone_from(url);
        }
        if self.require_live_connection {
            settings.workflow.require_live_connection = true;
        }
    }
}

fn load(cli: &Cli) -> Result<ProofcastSettings> {
    let mut settings = proofcast_settings::load_settings_from_path(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config.display()))?;
    cli.apply(&mut settings);
    settings.validate().context("Invalid settings")?;
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load(&cli)?;

    let logging = LoggingConfig::from_settings(&settings.logging).context("Invalid log level")?;
    init_logging(&logging).context("Failed to initialize logging")?;

    let metrics = proofcast_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let verifier: Arc<dyn Verifier> = Arc::new(
        RemoteVerifier::from_settings(&settings.verifier)
            .context("Failed to build verifier client")?,
    );
    tracing::info!(endpoint = %settings.verifier.url, "verifier configured");

    let config = ServerConfig::from_settings(&settings);
    let mut server = ProofcastServer::new(config, verifier).with_metrics(metrics);

    let (addr, tasks) = server.listen().await.context("Failed to bind server")?;
    tracing::info!(
        public_url = %settings.server.public_url,
        "Proofcast listening on http://{addr}"
    );

    wait_for_signal().await;

    tracing::info!("Shutting down...");
    server
        .shutdown()
        .graceful_shutdown(tasks, Some(SHUTDOWN_TIMEOUT))
        .await;

    tracing::info!("Shutdown complete");
    Ok(())
}
