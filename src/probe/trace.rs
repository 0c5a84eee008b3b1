//! Route tracer: one run of the host's hop-discovery tool

use crate::error::ProbeError;
use crate::network::{validate_target, CommandRunner, PlatformFamily, SystemRunner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Result of a traceroute run; hops are not parsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TraceOutcome {
    Completed { raw_output: String },
    Timeout,
    Error {
        #[serde(rename = "error")]
        message: String,
    },
}

impl From<ProbeError> for TraceOutcome {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::Timeout => TraceOutcome::Timeout,
            other => TraceOutcome::Error {
                message: other.to_string(),
            },
        }
    }
}

#[derive(Clone)]
pub struct RouteTracer {
    runner: Arc<dyn CommandRunner>,
    platform: PlatformFamily,
}

impl Default for RouteTracer {
    fn default() -> Self {
        Self::new(PlatformFamily::current())
    }
}

impl RouteTracer {
    pub fn new(platform: PlatformFamily) -> Self {
        Self::with_runner(Arc::new(SystemRunner), platform)
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>, platform: PlatformFamily) -> Self {
        Self { runner, platform }
    }

    pub async fn trace(&self, target: &str, timeout: Duration) -> TraceOutcome {
        let target = match validate_target(target) {
            Ok(t) => t,
            Err(e) => {
                return TraceOutcome::Error {
                    message: e.to_string(),
                }
            }
        };

        let program = self.platform.trace_command();
        let args = vec![target.to_string()];

        log::info!("Tracing route to {} ({:?} budget)", target, timeout);

        match tokio::time::timeout(timeout, self.runner.run(program, &args)).await {
            Err(_) => ProbeError::Timeout.into(),
            Ok(Err(e)) => ProbeError::InvocationFailure {
                program: program.to_string(),
                reason: e.to_string(),
            }
            .into(),
            Ok(Ok(output)) => {
                // Nothing on stdout usually means the tool rejected the target
                let raw_output = if output.stdout.trim().is_empty() {
                    output.stderr
                } else {
                    output.stdout
                };
                TraceOutcome::Completed { raw_output }
            }
        }
    }
}
