//! Prometheus exporter for GitHub Copilot usage metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use copilot_metrics_exporter::http;
use copilot_metrics_exporter::{
    CollectionMode, ExporterConfig, FeatureSet, HttpServer, SnapshotRefresher, UsageCollector,
};

/// Prometheus exporter for GitHub Copilot usage metrics.
#[derive(Parser, Debug)]
#[command(name = "copilot-metrics-exporter")]
#[command(about = "Export GitHub Copilot usage metrics as Prometheus gauges")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// GitHub token used as bearer credential.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Organization login.
    #[arg(long, env = "GITHUB_ORG")]
    org: Option<String>,

    /// Team slug within the organization.
    #[arg(long, env = "GITHUB_TEAM")]
    team: Option<String>,

    /// Enterprise slug (takes precedence over organization and team).
    #[arg(long, env = "GITHUB_ENTERPRISE")]
    enterprise: Option<String>,

    /// REST API base URL.
    #[arg(long, env = "GITHUB_API_URL")]
    api_url: Option<String>,

    /// HTTP listen port (overrides config).
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// HTTP listen address (overrides config and port).
    #[arg(long)]
    listen: Option<String>,

    /// Exported feature set.
    #[arg(long, env = "COPILOT_FEATURE_SET", value_enum)]
    feature_set: Option<FeatureSet>,

    /// Collection mode.
    #[arg(long, env = "COPILOT_MODE", value_enum)]
    mode: Option<CollectionMode>,

    /// Snapshot refresh interval in cached mode (seconds).
    #[arg(long, env = "REFRESH_INTERVAL_SECS")]
    refresh_interval: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Layer CLI flags and environment variables over the loaded config.
    fn apply(self, config: &mut ExporterConfig) {
        if let Some(token) = self.token {
            config.github.token = token;
        }
        if let Some(org) = self.org {
            config.github.organization = org;
        }
        if let Some(team) = self.team {
            config.github.team = team;
        }
        if let Some(enterprise) = self.enterprise {
            config.github.enterprise = enterprise;
        }
        if let Some(api_url) = self.api_url {
            config.github.api_url = api_url;
        }
        if let Some(port) = self.port {
            config.prometheus.set_port(port);
        }
        if let Some(listen) = self.listen {
            config.prometheus.listen = listen;
        }
        if let Some(feature_set) = self.feature_set {
            config.collection.feature_set = feature_set;
        }
        if let Some(mode) = self.mode {
            config.collection.mode = mode;
        }
        if let Some(secs) = self.refresh_interval {
            config.collection.refresh_interval_secs = secs;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };
    args.apply(&mut config);
    config.validate()?;

    copilot_metrics_common::init_tracing(&config.logging)?;

    info!("Starting GitHub Copilot Metrics Exporter");

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let collector = Arc::new(UsageCollector::from_config(&config)?);

    let listen_addr: SocketAddr = config
        .prometheus
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    // Bind before spawning anything so a taken port is fatal.
    let listener = http::bind(listen_addr).await?;

    let http_server = HttpServer::new(
        collector.clone(),
        listen_addr,
        config.prometheus.path.clone(),
    );

    // Start snapshot refresher in cached mode
    let refresh_task = match config.collection.mode {
        CollectionMode::Cached => {
            let refresher = SnapshotRefresher::new(
                collector.clone(),
                Duration::from_secs(config.collection.refresh_interval_secs),
            );
            Some(tokio::spawn(refresher.run(shutdown_rx.clone())))
        }
        CollectionMode::OnDemand => None,
    };

    // Start HTTP server
    let http_shutdown = shutdown_rx.clone();
    let mut http_task =
        tokio::spawn(async move { http_server.serve(listener, http_shutdown).await });

    // Wait for shutdown signal, or for the server to stop on its own
    let server_exit = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            None
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
            None
        }
        result = &mut http_task => Some(result),
    };

    // Signal shutdown
    shutdown_tx.send(true)?;

    // Wait for tasks to complete
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        if server_exit.is_none() {
            if let Ok(Err(e)) = http_task.await {
                error!("HTTP server error: {}", e);
            }
        }
        if let Some(task) = refresh_task {
            let _ = task.await;
        }
    })
    .await;

    // Print final stats
    let stats = collector.stats();
    info!(
        scrapes = stats.scrapes,
        fetches_succeeded = stats.fetches_succeeded,
        fetches_failed = stats.fetches_failed,
        last_observations = stats.last_observations,
        "Final statistics"
    );

    match server_exit {
        Some(Ok(Ok(()))) => Err(anyhow::anyhow!("HTTP server stopped unexpectedly")),
        Some(Ok(Err(e))) => Err(e),
        Some(Err(e)) => Err(anyhow::anyhow!("HTTP server task failed: {}", e)),
        None => {
            info!("Exporter stopped");
            Ok(())
        }
    }
}

/// Resolve when SIGTERM is received. Never resolves off Unix.
async fn terminate() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                return;
            }
            Err(e) => warn!(error = %e, "Failed to install SIGTERM handler"),
        }
    }

    std::future::pending::<()>().await;
}
