//! Error handling for the netdiag engine
//!
//! Sub-component failures are folded into result data (a resolution status,
//! a probe outcome, a closed port) before they reach the orchestrator. The
//! enums here name those failures so the folding is explicit, and
//! [`DiagError`] covers the few paths that do return `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Name-resolution failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("name not found: {0}")]
    NotFound(String),

    #[error("resolver unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Failures of an external echo-request or hop-discovery run
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("no response before the deadline")]
    Timeout,

    #[error("host did not respond")]
    Unreachable,

    #[error("failed to invoke {program}: {reason}")]
    InvocationFailure { program: String, reason: String },
}

/// Scan failures. Connection failures are folded into `open = false`; an
/// incomplete pool is reported so lost ports are never mistaken for closed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScanError {
    #[error("connection to port {port} failed: {reason}")]
    ConnectionFailure { port: u16, reason: String },

    #[error("scan workers failed before checking ports {ports:?}")]
    Incomplete { ports: Vec<u16> },
}

/// Report persistence failures
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write report to {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read report from {path}: {source}")]
    ReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed report: {0}")]
    Format(#[from] serde_json::Error),
}

/// Main error type for the engine
#[derive(Debug, Error)]
pub enum DiagError {
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Port range error: {0}")]
    PortRangeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Timeout error")]
    TimeoutError,
}

impl From<std::num::ParseIntError> for DiagError {
    fn from(e: std::num::ParseIntError) -> Self {
        DiagError::PortRangeError(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for DiagError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        DiagError::TimeoutError
    }
}
