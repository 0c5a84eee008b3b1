//! Output formatting and report persistence

use crate::diagnostics::DiagnosticReport;
use crate::error::PersistenceError;
use crate::network::{ResolutionResult, ResolutionStatus};
use crate::probe::{BatchProbeSummary, ProbeOutcome, ProbeRecord, TraceOutcome};
use crate::scanner::{PortScanOutcome, PortState};
use chrono::{DateTime, Local, Utc};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub colored: bool,
    pub show_closed: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            colored: true,
            show_closed: false,
        }
    }
}

/// Renders results for the terminal
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn format(&self) -> OutputFormat {
        self.config.format
    }

    pub fn render_probe(&self, record: &ProbeRecord) -> String {
        if self.config.format == OutputFormat::Json {
            return to_json(record);
        }

        let mut out = String::new();
        if let Some(raw) = &record.raw_output {
            out.push_str(raw.trim_end());
            out.push_str("\n\n");
        }
        let _ = writeln!(out, "{}: {}", record.target, self.probe_line(&record.outcome));
        out
    }

    pub fn render_trace(&self, target: &str, outcome: &TraceOutcome) -> String {
        if self.config.format == OutputFormat::Json {
            return to_json(outcome);
        }

        match outcome {
            TraceOutcome::Completed { raw_output } => {
                format!("{}\n", raw_output.trim_end())
            }
            TraceOutcome::Timeout => format!(
                "{}\n",
                self.paint(&format!("Traceroute to {} timed out", target), Tone::Warn)
            ),
            TraceOutcome::Error { message } => format!(
                "{}\n",
                self.paint(&format!("Traceroute to {} failed: {}", target, message), Tone::Bad)
            ),
        }
    }

    pub fn render_resolution(&self, result: &ResolutionResult) -> String {
        if self.config.format == OutputFormat::Json {
            return to_json(result);
        }

        let mut out = String::new();
        let _ = writeln!(out, "Target:     {}", result.target);
        match result.status {
            ResolutionStatus::Success => {
                let address = result
                    .resolved_address
                    .map(|a| a.to_string())
                    .unwrap_or_default();
                let _ = writeln!(out, "IP Address: {}", self.paint(&address, Tone::Good));
                let _ = writeln!(
                    out,
                    "Hostname:   {}",
                    result.resolved_hostname.as_deref().unwrap_or("Unknown")
                );
            }
            ResolutionStatus::NotFound => {
                let _ = writeln!(out, "{}", self.paint("Host not found", Tone::Bad));
            }
            ResolutionStatus::Timeout => {
                let _ = writeln!(out, "{}", self.paint("Lookup timed out", Tone::Warn));
            }
            ResolutionStatus::Error => {
                let message = result.error.as_deref().unwrap_or("unknown failure");
                let _ = writeln!(out, "{}", self.paint(&format!("Error: {}", message), Tone::Bad));
            }
        }
        out
    }

    pub fn render_ports(&self, target: &str, ports: &[PortState]) -> String {
        if self.config.format == OutputFormat::Json {
            return to_json(&ports);
        }

        let mut out = String::new();
        let _ = writeln!(out, "Port scan of {}", target);
        for state in ports {
            if state.open {
                let line = format!("  {:>5}/tcp  open    {}", state.port, state.service_label());
                let _ = writeln!(out, "{}", self.paint(&line, Tone::Good));
            } else if self.config.show_closed {
                let line = format!("  {:>5}/tcp  closed  {}", state.port, state.service_label());
                let _ = writeln!(out, "{}", self.paint(&line, Tone::Dim));
            }
        }

        let open = ports.iter().filter(|p| p.open).count();
        let _ = writeln!(out, "{} of {} ports open", open, ports.len());
        out
    }

    pub fn render_batch(&self, summary: &BatchProbeSummary) -> String {
        if self.config.format == OutputFormat::Json {
            return to_json(summary);
        }

        let mut out = String::new();
        for record in &summary.results {
            let _ = writeln!(out, "  {:<30} {}", record.target, self.probe_line(&record.outcome));
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "Reachable:   {}", summary.reachable);
        let _ = writeln!(out, "Unreachable: {}", summary.unreachable);
        out
    }

    pub fn render_report(&self, report: &DiagnosticReport) -> String {
        if self.config.format == OutputFormat::Json {
            return to_json(report);
        }

        let mut out = String::new();
        let _ = writeln!(out, "Diagnostics for {}", self.paint(report.target(), Tone::Strong));
        let _ = writeln!(
            out,
            "Generated {}",
            report
                .timestamp()
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(out);

        if let Some(dns) = report.resolution() {
            let _ = writeln!(out, "[DNS]");
            out.push_str(&self.render_resolution(dns));
            let _ = writeln!(out);
        }

        if let Some(ping) = report.probe() {
            let _ = writeln!(out, "[Ping]");
            let _ = writeln!(out, "{}", self.probe_line(ping));
            let _ = writeln!(out);
        }

        if let Some(ports) = report.ports() {
            let _ = writeln!(out, "[Ports]");
            match ports {
                PortScanOutcome::Completed { results } => {
                    out.push_str(&self.render_ports(report.target(), results))
                }
                PortScanOutcome::Timeout => {
                    let _ = writeln!(out, "{}", self.paint("Scan timed out", Tone::Warn));
                }
                PortScanOutcome::Error { error } => {
                    let _ = writeln!(out, "{}", self.paint(&format!("Error: {}", error), Tone::Bad));
                }
            }
        }
        out
    }

    fn probe_line(&self, outcome: &ProbeOutcome) -> String {
        match outcome {
            ProbeOutcome::Reachable {
                packet_loss_percent,
                avg_latency_ms,
            } => {
                let loss = packet_loss_percent
                    .map(|l| format!("{}%", l))
                    .unwrap_or_else(|| "Unknown".to_string());
                let latency = avg_latency_ms
                    .map(|l| format!("{}ms", l))
                    .unwrap_or_else(|| "Unknown".to_string());
                format!(
                    "{} (loss {}, avg {})",
                    self.paint("reachable", Tone::Good),
                    loss,
                    latency
                )
            }
            ProbeOutcome::Unreachable => self.paint("unreachable", Tone::Bad).to_string(),
            ProbeOutcome::Timeout => self.paint("timeout", Tone::Warn).to_string(),
            ProbeOutcome::Error { message } => {
                self.paint(&format!("error: {}", message), Tone::Bad).to_string()
            }
        }
    }

    fn paint(&self, text: &str, tone: Tone) -> ColoredString {
        if !self.config.colored {
            return text.normal();
        }
        match tone {
            Tone::Good => text.green(),
            Tone::Warn => text.yellow(),
            Tone::Bad => text.red(),
            Tone::Dim => text.bright_black(),
            Tone::Strong => text.bold(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Good,
    Warn,
    Bad,
    Dim,
    Strong,
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    match serde_json::to_string_pretty(value) {
        Ok(json) => format!("{}\n", json),
        Err(e) => format!("{{\"error\": \"{}\"}}\n", e),
    }
}

/// Reads and writes reports as pretty-printed JSON files
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `network_report_<target>_<YYYYmmdd_HHMMSS>.json` for a report
    pub fn file_name(report: &DiagnosticReport) -> String {
        report_file_name(report.target(), report.timestamp())
    }

    /// Write `report` into the store directory, returning the file path
    pub fn save(&self, report: &DiagnosticReport) -> Result<PathBuf, PersistenceError> {
        let path = self.dir.join(Self::file_name(report));
        self.save_to(report, &path)?;
        Ok(path)
    }

    pub fn save_to(&self, report: &DiagnosticReport, path: &Path) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(report)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::WriteFailure {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, json).map_err(|source| PersistenceError::WriteFailure {
            path: path.to_path_buf(),
            source,
        })?;

        log::info!("Report saved to {}", path.display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<DiagnosticReport, PersistenceError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| PersistenceError::ReadFailure {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn report_file_name(target: &str, timestamp: DateTime<Utc>) -> String {
    let safe: String = target
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "network_report_{}_{}.json",
        safe,
        timestamp.format("%Y%m%d_%H%M%S")
    )
}
