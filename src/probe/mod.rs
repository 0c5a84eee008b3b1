//! Reachability prober built on the host's echo-request tool

pub mod grammar;
pub mod trace;

use crate::error::ProbeError;
use crate::network::{validate_target, CommandRunner, PlatformFamily, SystemRunner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use grammar::{OutputGrammar, PingSummary};
pub use trace::{RouteTracer, TraceOutcome};

/// Classified result of one echo-request run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// `None` marks a statistic the summary did not contain
    Reachable {
        packet_loss_percent: Option<f64>,
        avg_latency_ms: Option<f64>,
    },
    Unreachable,
    Timeout,
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProbeOutcome::Reachable { .. } => "reachable",
            ProbeOutcome::Unreachable => "unreachable",
            ProbeOutcome::Timeout => "timeout",
            ProbeOutcome::Error { .. } => "error",
        }
    }
}

impl From<ProbeError> for ProbeOutcome {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::Timeout => ProbeOutcome::Timeout,
            ProbeError::Unreachable => ProbeOutcome::Unreachable,
            ProbeError::InvocationFailure { .. } => ProbeOutcome::Error {
                message: e.to_string(),
            },
        }
    }
}

impl From<PingSummary> for ProbeOutcome {
    fn from(summary: PingSummary) -> Self {
        ProbeOutcome::Reachable {
            packet_loss_percent: summary.packet_loss_percent,
            avg_latency_ms: summary.avg_latency_ms,
        }
    }
}

/// One probe together with the tool's printed output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub target: String,
    pub outcome: ProbeOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
}

/// Per-target outcomes of a batch, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchProbeSummary {
    pub results: Vec<ProbeRecord>,
    pub reachable: usize,
    pub unreachable: usize,
}

impl BatchProbeSummary {
    pub fn from_records(results: Vec<ProbeRecord>) -> Self {
        let reachable = results.iter().filter(|r| r.outcome.is_reachable()).count();
        let unreachable = results.len() - reachable;
        Self {
            results,
            reachable,
            unreachable,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }
}

/// Stateless reachability prober
#[derive(Clone)]
pub struct Prober {
    runner: Arc<dyn CommandRunner>,
    platform: PlatformFamily,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new(PlatformFamily::current())
    }
}

impl Prober {
    pub fn new(platform: PlatformFamily) -> Self {
        Self::with_runner(Arc::new(SystemRunner), platform)
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>, platform: PlatformFamily) -> Self {
        Self { runner, platform }
    }

    pub fn platform(&self) -> PlatformFamily {
        self.platform
    }

    /// Send `count` echo requests, waiting at most `timeout` for the whole run
    pub async fn probe(&self, target: &str, count: u32, timeout: Duration) -> ProbeOutcome {
        self.probe_record(target, count, timeout).await.outcome
    }

    /// Like [`Prober::probe`], keeping whatever the tool printed
    pub async fn probe_record(&self, target: &str, count: u32, timeout: Duration) -> ProbeRecord {
        let target = match validate_target(target) {
            Ok(t) => t.to_string(),
            Err(e) => {
                return ProbeRecord {
                    target: target.to_string(),
                    outcome: ProbeOutcome::Error {
                        message: e.to_string(),
                    },
                    raw_output: None,
                }
            }
        };

        if count == 0 {
            return ProbeRecord {
                target,
                outcome: ProbeOutcome::Error {
                    message: "Echo request count must be at least 1".to_string(),
                },
                raw_output: None,
            };
        }

        let (program, count_flag) = self.platform.ping_command();
        let args = vec![
            count_flag.to_string(),
            count.to_string(),
            target.clone(),
        ];

        log::debug!("Pinging {} ({} requests, {:?} budget)", target, count, timeout);

        let run = tokio::time::timeout(timeout, self.runner.run(program, &args)).await;

        let (outcome, raw_output): (ProbeOutcome, Option<String>) = match run {
            Err(_) => (ProbeError::Timeout.into(), None),
            Ok(Err(e)) => (
                ProbeError::InvocationFailure {
                    program: program.to_string(),
                    reason: e.to_string(),
                }
                .into(),
                None,
            ),
            Ok(Ok(output)) if output.success => {
                let summary = OutputGrammar::for_platform(self.platform).parse(&output.stdout);
                (ProbeOutcome::from(summary), Some(output.stdout))
            }
            Ok(Ok(output)) => (ProbeError::Unreachable.into(), Some(output.stdout)),
        };

        log::info!("{} is {}", target, outcome.label());

        ProbeRecord {
            target,
            outcome,
            raw_output,
        }
    }

    /// Probe each target in order; one failure never stops the batch
    pub async fn probe_batch<S: AsRef<str>>(
        &self,
        targets: &[S],
        count: u32,
        timeout: Duration,
    ) -> BatchProbeSummary {
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            results.push(self.probe_record(target.as_ref(), count, timeout).await);
        }

        let summary = BatchProbeSummary::from_records(results);
        log::info!(
            "Batch ping: {}/{} hosts reachable",
            summary.reachable,
            summary.total()
        );
        summary
    }
}
