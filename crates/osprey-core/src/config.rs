//! Configuration management for Osprey.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/osprey/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where target records are persisted
    pub storage: StorageConfig,
    /// Collector behaviour (timeouts, retries, probe concurrency)
    pub scanning: ScanningConfig,
    /// Profile enrichment settings
    pub enrichment: EnrichmentConfig,
    /// RDAP endpoints for domain and network lookups
    pub rdap: RdapConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file, falling back to defaults if it
    /// does not exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            tracing::debug!("Loading config from {}", path.display());
            let contents = fs::read_to_string(path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `OSPREY_DATA_DIR`: Override the target records directory
    /// - `OSPREY_TIMEOUT_SECS`: Override the collector request timeout
    /// - `OSPREY_ENRICHMENT_ENABLED`: Override profile enrichment (true/false)
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Apply `OSPREY_*` environment overrides on top of the current values.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("OSPREY_DATA_DIR") {
            if !val.is_empty() {
                tracing::debug!("Override storage.data_dir from env: {}", val);
                self.storage.data_dir = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("OSPREY_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.scanning.request_timeout_secs = secs;
                tracing::debug!("Override scanning.request_timeout_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("OSPREY_ENRICHMENT_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.enrichment.enabled = enabled;
                tracing::debug!("Override enrichment.enabled from env: {}", enabled);
            }
        }
    }

    /// Reject values that would make collectors or the scan worker misbehave.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scanning.request_timeout_secs == 0 {
            return Err(invalid("scanning.request_timeout_secs", "must be greater than zero"));
        }
        if self.scanning.concurrent_probes == 0 {
            return Err(invalid("scanning.concurrent_probes", "must be greater than zero"));
        }
        if self.scanning.max_retries == 0 {
            return Err(invalid("scanning.max_retries", "must be at least one attempt"));
        }
        if self.enrichment.timeout_secs == 0 {
            return Err(invalid("enrichment.timeout_secs", "must be greater than zero"));
        }
        for (field, value) in [
            ("rdap.domain_endpoint", &self.rdap.domain_endpoint),
            ("rdap.ip_endpoint", &self.rdap.ip_endpoint),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(invalid(field, "must be an http(s) URL"));
            }
        }
        Ok(())
    }

    /// Save configuration to the default location.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file.
    pub fn save_to(&self, config_path: &Path) -> ConfigResult<()> {
        let config_dir = config_path
            .parent()
            .ok_or_else(|| invalid("config_path", "no parent directory"))?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Directory holding one sub-directory per target.
    ///
    /// Uses `storage.data_dir` when set, otherwise `<XDG data dir>/targets`.
    pub fn targets_dir(&self) -> ConfigResult<PathBuf> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::data_dir()?.join("targets")),
        }
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/osprey/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/osprey`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(project_dirs()?.data_dir().to_path_buf())
    }
}

fn project_dirs() -> ConfigResult<ProjectDirs> {
    ProjectDirs::from("com", "osprey", "osprey").ok_or(ConfigError::NoConfigDir)
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for target records; `None` means the XDG data directory
    pub data_dir: Option<PathBuf>,
}

/// Collector behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// User agent string sent by HTTP collectors
    pub user_agent: String,
    /// How many account probes may be in flight at once
    pub concurrent_probes: usize,
    /// Attempts per single-shot lookup (1 = no retry)
    pub max_retries: u32,
    /// Base delay between lookup attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Optional TOML file with account site definitions
    pub sites_file: Option<PathBuf>,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
            concurrent_probes: 20,
            max_retries: 3,
            retry_delay_ms: 2000,
            sites_file: None,
        }
    }
}

/// Profile enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Whether discovered accounts are enriched with profile details
    pub enabled: bool,
    /// Timeout for fetching a profile page, in seconds
    pub timeout_secs: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 10,
        }
    }
}

/// RDAP endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RdapConfig {
    /// Base URL for domain queries; the domain is appended
    pub domain_endpoint: String,
    /// Base URL for IP queries; the address is appended
    pub ip_endpoint: String,
}

impl Default for RdapConfig {
    fn default() -> Self {
        Self {
            domain_endpoint: "https://rdap.org/domain/".to_string(),
            ip_endpoint: "https://rdap.org/ip/".to_string(),
        }
    }
}
