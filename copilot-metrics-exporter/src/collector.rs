//! Pull-protocol adapter: describe the catalogue, collect on demand.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use tracing::{debug, error, info};

use crate::config::{CollectionMode, ExporterConfig};
use crate::descriptor::{DescriptorRegistry, MetricDescriptor};
use crate::export::{Exporter, Observation};
use crate::fetcher::{FetchError, Fetcher, Target};

/// The observations produced by one successful fetch.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Observations in emission order.
    pub observations: Vec<Observation>,
    /// Number of usage records the observations came from.
    pub days: usize,
}

impl Snapshot {
    /// A snapshot with no observations, served when a cycle fails.
    pub fn empty() -> Self {
        Self {
            observations: Vec::new(),
            days: 0,
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Whether the snapshot holds no observations.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// Collector statistics.
#[derive(Debug, Clone, Default)]
pub struct CollectorStats {
    /// Collect calls served.
    pub scrapes: u64,
    /// Upstream fetches that produced a snapshot.
    pub fetches_succeeded: u64,
    /// Upstream fetches that failed.
    pub fetches_failed: u64,
    /// Observations in the last successful snapshot.
    pub last_observations: usize,
}

/// Fetches usage documents and turns them into observations.
///
/// In [`CollectionMode::OnDemand`] every collect call runs its own
/// fetch-then-export cycle. In [`CollectionMode::Cached`] collect calls read
/// the snapshot last published by [`UsageCollector::refresh`].
pub struct UsageCollector {
    registry: Arc<DescriptorRegistry>,
    exporter: Exporter,
    fetcher: Fetcher,
    mode: CollectionMode,
    /// Written only by `refresh`.
    snapshot: ArcSwapOption<Snapshot>,
    stats: RwLock<CollectorStats>,
}

impl UsageCollector {
    /// Create a collector for the given target.
    pub fn new(
        registry: Arc<DescriptorRegistry>,
        fetcher: Fetcher,
        target: &Target,
        mode: CollectionMode,
    ) -> Self {
        let exporter = Exporter::new(registry.clone(), target.org_label());

        Self {
            registry,
            exporter,
            fetcher,
            mode,
            snapshot: ArcSwapOption::empty(),
            stats: RwLock::new(CollectorStats::default()),
        }
    }

    /// Create a collector from a validated configuration.
    pub fn from_config(config: &ExporterConfig) -> anyhow::Result<Self> {
        let target = config
            .github
            .target()
            .ok_or_else(|| anyhow::anyhow!("No organization or enterprise configured"))?;
        let registry = Arc::new(DescriptorRegistry::new(config.collection.feature_set));
        let fetcher = Fetcher::new(&config.github, &target)?;

        info!(
            url = %fetcher.url(),
            org = %target.org_label(),
            feature_set = config.collection.feature_set.as_str(),
            mode = ?config.collection.mode,
            descriptors = registry.len(),
            "Collector configured"
        );

        Ok(Self::new(registry, fetcher, &target, config.collection.mode))
    }

    /// Enumerate the descriptor catalogue.
    pub fn describe(&self) -> &'static [MetricDescriptor] {
        self.registry.describe()
    }

    /// The configured collection mode.
    pub fn mode(&self) -> CollectionMode {
        self.mode
    }

    /// Collect observations for one scrape.
    ///
    /// A failed cycle yields an empty snapshot; partial results are never
    /// returned.
    pub async fn collect(&self) -> Arc<Snapshot> {
        self.stats.write().scrapes += 1;

        match self.mode {
            CollectionMode::OnDemand => match self.fetch_and_export().await {
                Ok(snapshot) => Arc::new(snapshot),
                Err(_) => Arc::new(Snapshot::empty()),
            },
            CollectionMode::Cached => self
                .snapshot
                .load_full()
                .unwrap_or_else(|| Arc::new(Snapshot::empty())),
        }
    }

    /// Fetch, export and publish a new snapshot.
    ///
    /// On failure the previously published snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, FetchError> {
        let snapshot = self.fetch_and_export().await?;
        let observations = snapshot.len();

        self.snapshot.store(Some(Arc::new(snapshot)));

        info!(observations, "Published new metrics snapshot");
        Ok(observations)
    }

    /// The last published snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.load_full()
    }

    /// Whether scrapes can be answered with data.
    pub fn is_ready(&self) -> bool {
        match self.mode {
            CollectionMode::OnDemand => true,
            CollectionMode::Cached => self.snapshot.load().is_some(),
        }
    }

    /// Get collector statistics.
    pub fn stats(&self) -> CollectorStats {
        self.stats.read().clone()
    }

    async fn fetch_and_export(&self) -> Result<Snapshot, FetchError> {
        let document = match self.fetcher.fetch().await {
            Ok(document) => document,
            Err(e) => {
                self.stats.write().fetches_failed += 1;
                error!(error = %e, "Error fetching metrics");
                return Err(e);
            }
        };

        let observations = self.exporter.export(&document);
        debug!(
            days = document.len(),
            observations = observations.len(),
            "Exported Copilot metrics"
        );

        {
            let mut stats = self.stats.write();
            stats.fetches_succeeded += 1;
            stats.last_observations = observations.len();
        }

        Ok(Snapshot {
            observations,
            days: document.len(),
        })
    }
}

/// Create a shareable collector handle.
pub type SharedCollector = Arc<UsageCollector>;
