/*!
common/src/lib.rs

Shared configuration types for feeddiff.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for an optional TOML config file
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Browser-like user agent sent with every feed request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)";

/// Response header set by the proxy to say whether it served a cached copy.
pub const DEFAULT_CACHE_HEADER: &str = "X-Rssjumper-Cache";

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;
pub const DEFAULT_SAMPLE_DIFFS: usize = 5;
pub const DEFAULT_CONTEXT_RADIUS: usize = 15;

/// Fetching configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchConfig {
    pub timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
    /// Skip TLS certificate and hostname verification. Diagnostic use only.
    pub insecure_tls: Option<bool>,
    /// Name of the proxy's cache status header
    pub cache_header: Option<String>,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    pub fn insecure_tls(&self) -> bool {
        self.insecure_tls.unwrap_or(false)
    }

    pub fn cache_header(&self) -> &str {
        self.cache_header.as_deref().unwrap_or(DEFAULT_CACHE_HEADER)
    }
}

/// Report layout configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// How many differing positions are shown in detail
    pub sample_diffs: Option<usize>,
    /// Characters of context shown on each side of a differing position
    pub context_radius: Option<usize>,
}

impl ReportConfig {
    pub fn sample_diffs(&self) -> usize {
        self.sample_diffs.unwrap_or(DEFAULT_SAMPLE_DIFFS)
    }

    pub fn context_radius(&self) -> usize {
        self.context_radius.unwrap_or(DEFAULT_CONTEXT_RADIUS)
    }
}

/// Top-level application configuration (deserialized from a TOML file).
/// Every section is optional; a missing file means all defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

impl Config {
    /// Load configuration from an optional TOML file.
    /// Without a path no file is read and every value is a default.
    ///
    /// Example:
    ///   let cfg = Config::load(Some(Path::new("feeddiff.toml"))).await?;
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Config::default());
        };

        let data = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }
}
