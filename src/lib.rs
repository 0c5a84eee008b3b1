//! netdiag - network diagnostics for a single host
//!
//! Resolves a target, probes its reachability with the host's ping tool,
//! traces the route to it and connect-scans its TCP ports, then gathers
//! everything into one timestamped report.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod network;
pub mod output;
pub mod probe;
pub mod scanner;
pub mod top_ports;
pub mod utils;

// Re-export commonly used types
pub use config::DiagConfig;
pub use diagnostics::{DiagnosticReport, Diagnostician};
pub use error::{DiagError, PersistenceError, ProbeError, ResolutionError, ScanError};
pub use network::{PlatformFamily, ResolutionResult, ResolutionStatus, Resolver};
pub use output::ReportStore;
pub use probe::{BatchProbeSummary, ProbeOutcome, ProbeRecord, Prober, RouteTracer, TraceOutcome};
pub use scanner::{PortScanOutcome, PortScanner, PortState, ScanProgress, ScanRequest};
pub use top_ports::{service_hint, well_known_ports};

pub type Result<T> = std::result::Result<T, DiagError>;
