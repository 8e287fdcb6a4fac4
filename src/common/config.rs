//! Configuration file handling

use serde::Deserialize;
use std::path::Path;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Service endpoint settings
    #[serde(default)]
    pub target: TargetConfig,

    /// Scenario run settings
    #[serde(default)]
    pub run: RunConfig,
}

/// Wire protocol spoken by the service under test
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// gRPC over HTTP/2; the manifest must name a `.proto` file
    #[default]
    Grpc,
    /// Connect unary calls with JSON bodies over HTTP/1.1
    Connect,
}

/// Where and how to reach the service under test
#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    /// Base URL of the service (scheme, host and port)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub protocol: Protocol,

    /// Per-call timeout enforced by the invoker
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            protocol: Protocol::default(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:13009".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Scenario run settings
#[derive(Debug, Deserialize, Default)]
pub struct RunConfig {
    /// Deadline for a whole scenario run, in seconds
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    /// Stop after the first case that does not pass
    #[serde(default)]
    pub fail_fast: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
