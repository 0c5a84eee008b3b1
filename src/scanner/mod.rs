//! Scanner module containing the port scan request and result types

pub mod engine;

use crate::top_ports::service_hint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

pub use engine::PortScanner;

/// State of one scanned port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    pub port: u16,
    pub open: bool,
    /// Label from the well-known ports table, if any
    #[serde(rename = "service")]
    pub service_hint: Option<String>,
}

impl PortState {
    pub fn new(port: u16, open: bool) -> Self {
        Self {
            port,
            open,
            service_hint: service_hint(port).map(str::to_string),
        }
    }

    pub fn service_label(&self) -> &str {
        self.service_hint.as_deref().unwrap_or("Unknown")
    }
}

/// Validated scan input: a non-empty ascending set of ports in 1..=65535
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    target: String,
    ports: BTreeSet<u16>,
    per_port_timeout: Duration,
}

impl ScanRequest {
    pub fn new<I>(target: &str, ports: I, per_port_timeout: Duration) -> crate::Result<Self>
    where
        I: IntoIterator<Item = u16>,
    {
        let target = crate::network::validate_target(target)?.to_string();
        let ports: BTreeSet<u16> = ports.into_iter().collect();

        if ports.is_empty() {
            return Err(crate::DiagError::PortRangeError(
                "No ports specified".to_string(),
            ));
        }

        if ports.contains(&0) {
            return Err(crate::DiagError::PortRangeError(
                "Port 0 is not scannable; ports must be within 1-65535".to_string(),
            ));
        }

        if per_port_timeout.is_zero() {
            return Err(crate::DiagError::ConfigError(
                "Per-port timeout must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            target,
            ports,
            per_port_timeout,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn ports(&self) -> &BTreeSet<u16> {
        &self.ports
    }

    pub fn per_port_timeout(&self) -> Duration {
        self.per_port_timeout
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// Completed-port count published while a scan runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub completed: usize,
    pub total: usize,
}

impl ScanProgress {
    /// Get completion percentage
    pub fn percentage(&self) -> f64 {
        if self.total > 0 {
            (self.completed as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Port scan section of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PortScanOutcome {
    Completed { results: Vec<PortState> },
    Timeout,
    Error { error: String },
}

impl PortScanOutcome {
    pub fn results(&self) -> Option<&[PortState]> {
        match self {
            PortScanOutcome::Completed { results } => Some(results),
            _ => None,
        }
    }

    pub fn open_ports(&self) -> Vec<u16> {
        self.results()
            .map(|r| r.iter().filter(|p| p.open).map(|p| p.port).collect())
            .unwrap_or_default()
    }
}
