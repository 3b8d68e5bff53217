//! Copilot Metrics Common Library
//!
//! Shared types and utilities for the Copilot metrics exporter:
//!
//! - [`usage`] - Upstream usage document model (`UsageRecord`, `BreakdownEntry`, feature sections)
//! - [`config`] - Configuration loading (JSON5 format) and logging settings
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod usage;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use usage::{
    BreakdownEntry, Dimension, DotcomChat, DotcomPullRequests, FeatureSection, IdeChat,
    IdeCodeCompletions, RepositoryEntry, UsageDocument, UsageRecord,
};

/// Decode a usage document from the raw JSON body of a metrics response.
pub fn decode_usage(bytes: &[u8]) -> Result<UsageDocument> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// `RUST_LOG` takes precedence over the configured level when set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    tracing::debug!(level = %config.level, format = ?config.format, "Tracing initialized");
    Ok(())
}
