//! Diagnostic orchestrator: one target in, one immutable report out

use crate::config::DiagConfig;
use crate::network::{validate_target, ResolutionResult, Resolver};
use crate::probe::{BatchProbeSummary, ProbeOutcome, ProbeRecord, Prober, RouteTracer, TraceOutcome};
use crate::scanner::{PortScanOutcome, PortScanner, PortState, ScanRequest};
use crate::top_ports::well_known_ports;
use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Per-stage results of a report; `None` means the stage was not run.
///
/// Reading accepts a section that is absent, `null`, or a bare
/// `{"error": ...}` object in place of its normal shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticTests {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_section"
    )]
    dns: Option<ResolutionResult>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_section"
    )]
    ping: Option<ProbeOutcome>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_section"
    )]
    ports: Option<PortScanOutcome>,
}

/// A report section that can stand in for a failure known only by its message
trait FailedSection: Sized {
    fn from_failure(section: &Value, message: String) -> Self;
}

impl FailedSection for ResolutionResult {
    fn from_failure(section: &Value, message: String) -> Self {
        let target = section.get("target").and_then(Value::as_str).unwrap_or_default();
        ResolutionResult::error(target, message)
    }
}

impl FailedSection for ProbeOutcome {
    fn from_failure(_: &Value, message: String) -> Self {
        ProbeOutcome::Error { message }
    }
}

impl FailedSection for PortScanOutcome {
    fn from_failure(_: &Value, error: String) -> Self {
        PortScanOutcome::Error { error }
    }
}

fn lenient_section<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FailedSection,
{
    let section = Value::deserialize(deserializer)?;
    if section.is_null() {
        return Ok(None);
    }

    match T::deserialize(&section) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => match section.get("error") {
            Some(error) => {
                let message = match error.as_str() {
                    Some(text) => text.to_string(),
                    None => error.to_string(),
                };
                Ok(Some(T::from_failure(&section, message)))
            }
            None => Err(D::Error::custom(e)),
        },
    }
}

/// Snapshot of one diagnosis.
///
/// Only [`Diagnostician`] builds reports and no setter exists; a new
/// diagnosis always produces a new report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    target: String,
    timestamp: DateTime<Utc>,
    tests: DiagnosticTests,
}

impl DiagnosticReport {
    pub(crate) fn new(
        target: String,
        timestamp: DateTime<Utc>,
        resolution: Option<ResolutionResult>,
        probe: Option<ProbeOutcome>,
        ports: Option<PortScanOutcome>,
    ) -> Self {
        Self {
            target,
            timestamp,
            tests: DiagnosticTests {
                dns: resolution,
                ping: probe,
                ports,
            },
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn resolution(&self) -> Option<&ResolutionResult> {
        self.tests.dns.as_ref()
    }

    pub fn probe(&self) -> Option<&ProbeOutcome> {
        self.tests.ping.as_ref()
    }

    pub fn ports(&self) -> Option<&PortScanOutcome> {
        self.tests.ports.as_ref()
    }

    /// Open ports found by the scan stage, if it completed
    pub fn open_ports(&self) -> Vec<u16> {
        self.ports().map(PortScanOutcome::open_ports).unwrap_or_default()
    }
}

/// Composes resolver, prober, tracer and scanner under one configuration
#[derive(Clone)]
pub struct Diagnostician {
    config: DiagConfig,
    resolver: Resolver,
    prober: Prober,
    tracer: RouteTracer,
    scanner: PortScanner,
}

impl Diagnostician {
    /// Build the services described by `config`
    pub fn new(config: DiagConfig) -> crate::Result<Self> {
        config.validate()?;
        let platform = config.platform();
        let resolver = Resolver::new();
        let scanner = PortScanner::new(config.port_timeout(), config.scan_concurrency)
            .with_resolver(resolver.clone());

        Ok(Self {
            resolver,
            prober: Prober::new(platform),
            tracer: RouteTracer::new(platform),
            scanner,
            config,
        })
    }

    /// Assemble from explicitly constructed services.
    ///
    /// The scanner is rebound to `resolver` so every stage sees the same names.
    pub fn with_services(
        config: DiagConfig,
        resolver: Resolver,
        prober: Prober,
        tracer: RouteTracer,
        scanner: PortScanner,
    ) -> crate::Result<Self> {
        config.validate()?;
        let scanner = scanner.with_resolver(resolver.clone());
        Ok(Self {
            config,
            resolver,
            prober,
            tracer,
            scanner,
        })
    }

    pub fn config(&self) -> &DiagConfig {
        &self.config
    }

    pub async fn resolve(&self, target: &str) -> ResolutionResult {
        self.resolver.resolve(target).await
    }

    /// Single ping with the configured count and timeout
    pub async fn probe(&self, target: &str) -> ProbeRecord {
        self.prober
            .probe_record(target, self.config.ping_count, self.config.ping_timeout())
            .await
    }

    /// Ping several hosts in order with the batch count
    pub async fn probe_batch<S: AsRef<str>>(&self, targets: &[S]) -> BatchProbeSummary {
        self.prober
            .probe_batch(
                targets,
                self.config.batch_ping_count,
                self.config.ping_timeout(),
            )
            .await
    }

    pub async fn trace(&self, target: &str) -> TraceOutcome {
        self.tracer.trace(target, self.config.trace_timeout()).await
    }

    /// Scan a caller-supplied port set with the configured pool
    pub async fn scan(&self, target: &str, ports: Vec<u16>) -> crate::Result<Vec<PortState>> {
        self.scanner
            .scan(
                target,
                ports,
                self.config.port_timeout(),
                self.config.scan_concurrency,
            )
            .await
    }

    pub async fn scan_well_known(&self, target: &str) -> Vec<PortState> {
        self.scanner.scan_well_known(target).await
    }

    /// Run every enabled stage against `target`.
    ///
    /// Fails only for a target that cannot be handed to any stage. Applies
    /// `deadline_ms` from the configuration when set.
    pub async fn diagnose(&self, target: &str) -> crate::Result<DiagnosticReport> {
        let target = validate_target(target)?;
        Ok(self.run_stages(target, self.config.deadline()).await)
    }

    /// Like [`Diagnostician::diagnose`], abandoning stages still running at
    /// `deadline` and recording them as timed out
    pub async fn diagnose_with_deadline(
        &self,
        target: &str,
        deadline: Duration,
    ) -> crate::Result<DiagnosticReport> {
        let target = validate_target(target)?;
        Ok(self.run_stages(target, Some(deadline)).await)
    }

    async fn run_stages(&self, target: &str, deadline: Option<Duration>) -> DiagnosticReport {
        let timestamp = Utc::now();
        let deadline = deadline.map(|d| Instant::now() + d);

        log::info!("Generating diagnostics report for {}", target);

        let dns = async {
            if !self.config.include_dns {
                return None;
            }
            Some(
                within(deadline, self.resolver.resolve(target))
                    .await
                    .unwrap_or_else(|| ResolutionResult::timeout(target)),
            )
        };

        let ping = async {
            if !self.config.include_ping {
                return None;
            }
            let probe = self.prober.probe(
                target,
                self.config.report_ping_count,
                self.config.ping_timeout(),
            );
            Some(within(deadline, probe).await.unwrap_or(ProbeOutcome::Timeout))
        };

        let ports = async {
            if !self.config.include_ports {
                return None;
            }
            Some(
                within(deadline, self.scan_stage(target))
                    .await
                    .unwrap_or(PortScanOutcome::Timeout),
            )
        };

        let (dns, ping, ports) = tokio::join!(dns, ping, ports);

        log::info!("Report for {} complete", target);
        DiagnosticReport::new(target.to_string(), timestamp, dns, ping, ports)
    }

    async fn scan_stage(&self, target: &str) -> PortScanOutcome {
        let request = match ScanRequest::new(target, well_known_ports(), self.config.port_timeout())
        {
            Ok(request) => request,
            Err(e) => return PortScanOutcome::Error {
                error: e.to_string(),
            },
        };

        match self
            .scanner
            .try_scan(&request, self.config.scan_concurrency)
            .await
        {
            Ok(results) => PortScanOutcome::Completed { results },
            Err(e) => PortScanOutcome::Error {
                error: e.to_string(),
            },
        }
    }
}

/// Await `fut`, giving up at `deadline`; `None` when the deadline won
async fn within<F: std::future::Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}
