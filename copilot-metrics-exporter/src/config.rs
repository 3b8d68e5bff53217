//! Configuration for the Copilot metrics exporter.

use copilot_metrics_common::{LoggingConfig, load_config, parse_config};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::descriptor::FeatureSet;
use crate::fetcher::Target;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] copilot_metrics_common::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Upstream API settings.
    #[serde(default)]
    pub github: GithubConfig,

    /// Prometheus exporter settings.
    #[serde(default)]
    pub prometheus: PrometheusConfig,

    /// Collection mode and feature set.
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Upstream API credentials and target selection.
#[derive(Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Personal access or app token sent as a bearer token.
    #[serde(default)]
    pub token: String,

    /// Organization login.
    #[serde(default)]
    pub organization: String,

    /// Team slug within the organization.
    #[serde(default)]
    pub team: String,

    /// Enterprise slug. Takes precedence over organization and team.
    #[serde(default)]
    pub enterprise: String,

    /// REST API base URL (default: "https://api.github.com").
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            organization: String::new(),
            team: String::new(),
            enterprise: String::new(),
            api_url: default_api_url(),
        }
    }
}

impl std::fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = if self.token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("GithubConfig")
            .field("token", &token)
            .field("organization", &self.organization)
            .field("team", &self.team)
            .field("enterprise", &self.enterprise)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl GithubConfig {
    /// The metrics target selected by the configured names.
    pub fn target(&self) -> Option<Target> {
        Target::select(&self.organization, &self.team, &self.enterprise)
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Address to listen on (default: "0.0.0.0:8082").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

/// Default port of the metrics listener.
pub const DEFAULT_PORT: u16 = 8082;

fn default_listen() -> String {
    format!("0.0.0.0:{DEFAULT_PORT}")
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

impl PrometheusConfig {
    /// Replace the port of the listen address, keeping its host.
    pub fn set_port(&mut self, port: u16) {
        let host = self
            .listen
            .rsplit_once(':')
            .map_or("0.0.0.0", |(host, _)| host);
        self.listen = format!("{host}:{port}");
    }
}

/// How collections are served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    /// Every scrape fetches from upstream.
    #[default]
    #[value(alias = "on_demand")]
    OnDemand,
    /// A background task refreshes a snapshot that scrapes read.
    Cached,
}

/// Collection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Which part of the usage document is exported.
    #[serde(default)]
    pub feature_set: FeatureSet,

    /// On-demand or cached serving.
    #[serde(default)]
    pub mode: CollectionMode,

    /// Snapshot refresh period in cached mode (seconds).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

fn default_refresh_interval() -> u64 {
    3600 // 1 hour
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            feature_set: FeatureSet::default(),
            mode: CollectionMode::default(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    ///
    /// The file is not validated here; overrides may still fill in credentials.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Ok(load_config(path)?)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(parse_config(content)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github.token.is_empty() {
            return Err(ConfigError::Validation(
                "GITHUB_TOKEN environment variable is required".to_string(),
            ));
        }

        if self.github.organization.is_empty() && self.github.enterprise.is_empty() {
            return Err(ConfigError::Validation(
                "Either GITHUB_ORG or GITHUB_ENTERPRISE environment variable is required"
                    .to_string(),
            ));
        }

        if self.github.target().is_none() {
            return Err(ConfigError::Validation(
                "A team requires an organization".to_string(),
            ));
        }

        let api_url = &self.github.api_url;
        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigError::Validation(format!(
                "Invalid API URL: {}",
                self.github.api_url
            )));
        }

        if self.collection.refresh_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "refresh_interval_secs must be > 0".to_string(),
            ));
        }

        // Validate listen address format
        if self
            .prometheus
            .listen
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.prometheus.listen
            )));
        }

        // Validate path starts with /
        if !self.prometheus.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if matches!(self.prometheus.path.as_str(), "/" | "/health" | "/ready") {
            return Err(ConfigError::Validation(format!(
                "Metrics path {} is reserved",
                self.prometheus.path
            )));
        }

        Ok(())
    }
}
