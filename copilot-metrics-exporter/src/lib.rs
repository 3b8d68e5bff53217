//! Prometheus exporter for GitHub Copilot usage metrics.
//!
//! This crate fetches the per-day Copilot usage document from the GitHub REST
//! API and exposes it as gauges via an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   GitHub API    │────>│    Collector    │────>│   HTTP Server   │
//! │(copilot/metrics)│     │ (fetch, export) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! In on-demand mode every scrape runs its own fetch. In cached mode a
//! [`refresh::SnapshotRefresher`] republishes a snapshot that scrapes read.
//!
//! # Usage
//!
//! ```bash
//! GITHUB_TOKEN=... GITHUB_ORG=acme copilot-metrics-exporter
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod collector;
pub mod config;
pub mod descriptor;
pub mod export;
pub mod exposition;
pub mod fetcher;
pub mod http;
pub mod refresh;

pub use collector::{SharedCollector, Snapshot, UsageCollector};
pub use config::{CollectionMode, ExporterConfig};
pub use descriptor::{DescriptorRegistry, FeatureSet, MetricDescriptor, MetricId};
pub use export::{Exporter, Observation};
pub use fetcher::{FetchError, Fetcher, Target};
pub use http::HttpServer;
pub use refresh::SnapshotRefresher;
