//! Upstream client for the Copilot metrics REST API.

use std::time::Duration;

use copilot_metrics_common::{UsageDocument, decode_usage};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::debug;

use crate::config::GithubConfig;

/// Total time budget for one metrics request.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Pinned REST API version.
pub const API_VERSION: &str = "2022-11-28";

const API_VERSION_HEADER: &str = "x-github-api-version";
const ACCEPT_GITHUB_JSON: &str = "application/vnd.github+json";

/// Errors that abort a collection cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connection, TLS or timeout failure.
    #[error("Error making request to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status.
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was not a usage document.
    #[error("Error decoding response: {0}")]
    Decode(#[from] copilot_metrics_common::Error),
}

/// What the metrics are fetched for.
///
/// Enterprise wins over team, team wins over organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Enterprise(String),
    Team { org: String, team: String },
    Organization(String),
}

impl Target {
    /// Pick the target from the configured selectors.
    ///
    /// Returns `None` when neither an enterprise nor an organization is set.
    /// A team without an organization selects nothing.
    pub fn select(org: &str, team: &str, enterprise: &str) -> Option<Self> {
        if !enterprise.is_empty() {
            Some(Target::Enterprise(enterprise.to_string()))
        } else if org.is_empty() {
            None
        } else if !team.is_empty() {
            Some(Target::Team {
                org: org.to_string(),
                team: team.to_string(),
            })
        } else {
            Some(Target::Organization(org.to_string()))
        }
    }

    /// Request path relative to the API base URL.
    pub fn path(&self) -> String {
        match self {
            Target::Enterprise(enterprise) => format!("/enterprises/{enterprise}/copilot/metrics"),
            Target::Team { org, team } => format!("/orgs/{org}/team/{team}/copilot/metrics"),
            Target::Organization(org) => format!("/orgs/{org}/copilot/metrics"),
        }
    }

    /// Value of the `org` label: the enterprise name, else the organization.
    ///
    /// The team never appears in labels.
    pub fn org_label(&self) -> &str {
        match self {
            Target::Enterprise(enterprise) => enterprise,
            Target::Team { org, .. } | Target::Organization(org) => org,
        }
    }
}

/// Issues single-attempt metrics requests.
pub struct Fetcher {
    client: reqwest::Client,
    url: String,
    token: String,
}

impl Fetcher {
    /// Create a fetcher for the given target.
    pub fn new(github: &GithubConfig, target: &Target) -> Result<Self, FetchError> {
        Self::with_timeout(github, target, FETCH_TIMEOUT)
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(
        github: &GithubConfig,
        target: &Target,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_GITHUB_JSON));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            )),
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            url: format!("{}{}", github.api_url.trim_end_matches('/'), target.path()),
            token: github.token.clone(),
        })
    }

    /// The full request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode one usage document. Never retries.
    pub async fn fetch(&self) -> Result<UsageDocument, FetchError> {
        debug!(url = %self.url, "Fetching Copilot metrics");

        let transport = |source| FetchError::Transport {
            url: self.url.clone(),
            source,
        };

        let response = self
            .client
            .get(&self.url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let document = decode_usage(&body)?;
        debug!(days = document.len(), bytes = body.len(), "Fetched Copilot metrics");
        Ok(document)
    }
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}
