//! Configuration module for the netdiag engine

use crate::network::PlatformFamily;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration passed into the orchestrator and its services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagConfig {
    /// Echo requests sent by a single ping
    pub ping_count: u32,

    /// Echo requests sent to each host of a batch ping
    pub batch_ping_count: u32,

    /// Echo requests sent while building a report
    pub report_ping_count: u32,

    /// Upper bound for a whole ping run in milliseconds
    pub ping_timeout_ms: u64,

    /// Upper bound for a whole traceroute run in milliseconds
    pub trace_timeout_ms: u64,

    /// Timeout for each connection attempt in milliseconds
    pub port_timeout_ms: u64,

    /// Maximum simultaneous connection attempts
    pub scan_concurrency: usize,

    /// Overall deadline for a report, if any
    pub deadline_ms: Option<u64>,

    /// Directory reports are written into
    pub report_dir: PathBuf,

    /// Output dialect of the host tools; the build host's family if unset
    pub platform: Option<PlatformFamily>,

    pub include_dns: bool,
    pub include_ping: bool,
    pub include_ports: bool,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            ping_count: 4,
            batch_ping_count: 2,
            report_ping_count: 4,
            ping_timeout_ms: 30_000,
            trace_timeout_ms: 60_000,
            port_timeout_ms: 1_000,
            scan_concurrency: 100,
            deadline_ms: None,
            report_dir: PathBuf::from("."),
            platform: None,
            include_dns: true,
            include_ping: true,
            include_ports: true,
        }
    }
}

impl DiagConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-port connect timeout
    pub fn with_port_timeout(mut self, timeout_ms: u64) -> Self {
        self.port_timeout_ms = timeout_ms;
        self
    }

    /// Set the scanner pool size
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.scan_concurrency = concurrency;
        self
    }

    /// Set the ping run timeout
    pub fn with_ping_timeout(mut self, timeout_ms: u64) -> Self {
        self.ping_timeout_ms = timeout_ms;
        self
    }

    /// Set the traceroute run timeout
    pub fn with_trace_timeout(mut self, timeout_ms: u64) -> Self {
        self.trace_timeout_ms = timeout_ms;
        self
    }

    /// Set the overall report deadline
    pub fn with_deadline(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = Some(deadline_ms);
        self
    }

    /// Set the directory reports are saved into
    pub fn with_report_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.report_dir = dir.into();
        self
    }

    /// Force a platform output dialect
    pub fn with_platform(mut self, platform: PlatformFamily) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Select which report stages run
    pub fn with_stages(mut self, dns: bool, ping: bool, ports: bool) -> Self {
        self.include_dns = dns;
        self.include_ping = ping;
        self.include_ports = ports;
        self
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn trace_timeout(&self) -> Duration {
        Duration::from_millis(self.trace_timeout_ms)
    }

    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Effective platform family
    pub fn platform(&self) -> PlatformFamily {
        self.platform.unwrap_or_else(PlatformFamily::current)
    }

    /// Load configuration from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            crate::DiagError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: DiagConfig = toml::from_str(&content)
            .map_err(|e| crate::DiagError::ConfigError(format!("Failed to parse TOML: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `~/.netdiag.toml`, falling back to defaults
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let config_path = home_dir.join(".netdiag.toml");

        if config_path.exists() {
            match Self::from_toml_file(&config_path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", config_path.display());
                    return config;
                }
                Err(e) => log::warn!("Ignoring {}: {}", config_path.display(), e),
            }
        }

        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.ping_count == 0 || self.batch_ping_count == 0 || self.report_ping_count == 0 {
            return Err(crate::DiagError::ConfigError(
                "Echo request counts must be greater than 0".to_string(),
            ));
        }

        if self.ping_timeout_ms == 0 || self.trace_timeout_ms == 0 || self.port_timeout_ms == 0 {
            return Err(crate::DiagError::ConfigError(
                "Timeouts must be greater than 0".to_string(),
            ));
        }

        if self.scan_concurrency == 0 {
            return Err(crate::DiagError::ConfigError(
                "Scan concurrency must be greater than 0".to_string(),
            ));
        }

        if self.deadline_ms == Some(0) {
            return Err(crate::DiagError::ConfigError(
                "Report deadline must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
