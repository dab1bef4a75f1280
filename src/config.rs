//! Configuration system
//!
//! Centralized configuration with environment variable support, an optional
//! TOML file, runtime defaults and validation. The environment variables
//! match the names the operator tooling already uses (`MORPHEUS_URL`,
//! `MORPHEUS_TOKEN`, `PRICE_PREFIX`, `GCP_REGION`, ...).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target system (Morpheus) connection
    pub target: TargetConfig,

    /// Billing catalog (GCP) connection and scope
    pub gcp: GcpConfig,

    /// HTTP retry/backoff and pagination pacing
    pub client: ClientConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Paths configuration
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: String,
    pub token: String,
    /// Prefix every generated code is namespaced under.
    pub prefix: String,
    /// Accept self-signed certificates on the target system.
    pub insecure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    pub billing_url: String,
    /// OAuth access token; empty means unauthenticated catalog access.
    pub access_token: String,
    pub region: String,
    /// Billing services to fetch, matched by display-name containment.
    pub services: Vec<String>,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub max_attempts: u32,
    pub timeout_secs: u64,
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target: TargetConfig {
                url: "https://localhost".to_string(),
                token: String::new(),
                prefix: "IOH-CP".to_string(),
                insecure: false,
            },
            gcp: GcpConfig {
                billing_url: "https://cloudbilling.googleapis.com".to_string(),
                access_token: String::new(),
                region: "asia-southeast2".to_string(),
                services: vec!["Compute Engine".to_string(), "Kubernetes Engine".to_string()],
                currency: "USD".to_string(),
            },
            client: ClientConfig {
                max_attempts: 3,
                timeout_secs: 60,
                page_delay_ms: 100,
            },
            logging: LoggingConfig {
                level: "ERROR".to_string(),
                format: "pretty".to_string(),
                output: "console".to_string(),
            },
            paths: PathsConfig {
                data_dir: PathBuf::from("."),
                log_dir: PathBuf::from("logs"),
            },
        }
    }
}

impl Config {
    /// Load configuration from file (if present), environment and defaults.
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        let config_paths = [
            PathBuf::from("gcp-price-sync.toml"),
            PathBuf::from(".gcp-price-sync.toml"),
            dirs::config_dir()
                .map(|d| d.join("gcp-price-sync").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Target system
        if let Ok(val) = env::var("MORPHEUS_URL") {
            self.target.url = val;
        }
        if let Ok(val) = env::var("MORPHEUS_TOKEN") {
            self.target.token = val;
        }
        if let Ok(val) = env::var("PRICE_PREFIX") {
            self.target.prefix = val;
        }
        if let Ok(val) = env::var("MORPHEUS_INSECURE") {
            self.target.insecure = val.parse().context("Invalid MORPHEUS_INSECURE")?;
        }

        // Billing catalog
        if let Ok(val) = env::var("GCP_BILLING_URL") {
            self.gcp.billing_url = val;
        }
        if let Ok(val) = env::var("GCP_ACCESS_TOKEN") {
            self.gcp.access_token = val;
        }
        if let Ok(val) = env::var("GCP_REGION") {
            self.gcp.region = val;
        }
        if let Ok(val) = env::var("GCP_SERVICES") {
            self.gcp.services = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Client behavior
        if let Ok(val) = env::var("PRICE_SYNC_MAX_ATTEMPTS") {
            self.client.max_attempts = val.parse().context("Invalid PRICE_SYNC_MAX_ATTEMPTS")?;
        }
        if let Ok(val) = env::var("PRICE_SYNC_TIMEOUT_SECS") {
            self.client.timeout_secs = val.parse().context("Invalid PRICE_SYNC_TIMEOUT_SECS")?;
        }
        if let Ok(val) = env::var("PRICE_SYNC_PAGE_DELAY_MS") {
            self.client.page_delay_ms = val.parse().context("Invalid PRICE_SYNC_PAGE_DELAY_MS")?;
        }

        // Logging
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Paths
        if let Ok(val) = env::var("PRICE_SYNC_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("PRICE_SYNC_LOG_DIR") {
            self.paths.log_dir = PathBuf::from(val);
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.client.max_attempts == 0 {
            return Err(anyhow::anyhow!("max_attempts must be greater than 0"));
        }
        if self.client.timeout_secs == 0 {
            return Err(anyhow::anyhow!("timeout_secs must be greater than 0"));
        }
        if self.gcp.region.is_empty() {
            return Err(anyhow::anyhow!("GCP region cannot be empty"));
        }
        if self.target.prefix.trim().is_empty() {
            return Err(anyhow::anyhow!("price prefix cannot be empty"));
        }

        // The file appender needs its directory; console logging does not.
        if self.logging.output != "console" && !self.paths.log_dir.exists() {
            fs::create_dir_all(&self.paths.log_dir).context("Failed to create log directory")?;
        }

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration instance
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| Config::load().expect("Failed to load configuration"))
}
