//! Network module: name resolution, external host tools and TCP connects

pub mod process;
pub mod resolver;
pub mod socket;

use serde::{Deserialize, Serialize};

pub use process::{CommandOutput, CommandRunner, SystemRunner};
pub use resolver::{NameService, ResolutionResult, ResolutionStatus, Resolver, SystemNameService};
pub use socket::TcpConnectScanner;

/// Operating-system family whose host tools are invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    Windows,
    Unix,
}

impl PlatformFamily {
    /// Family of the build host
    pub fn current() -> Self {
        if cfg!(windows) {
            PlatformFamily::Windows
        } else {
            PlatformFamily::Unix
        }
    }

    /// Echo-request program and its count flag
    pub fn ping_command(&self) -> (&'static str, &'static str) {
        match self {
            PlatformFamily::Windows => ("ping", "-n"),
            PlatformFamily::Unix => ("ping", "-c"),
        }
    }

    /// Hop-discovery program
    pub fn trace_command(&self) -> &'static str {
        match self {
            PlatformFamily::Windows => "tracert",
            PlatformFamily::Unix => "traceroute",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlatformFamily::Windows => "windows",
            PlatformFamily::Unix => "unix",
        }
    }
}

impl std::fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Check that a target can be handed to an external tool as a single argument.
///
/// Resolution decides whether the host exists; this only rejects input that
/// is empty, spans several arguments, or would be parsed as an option.
pub fn validate_target(target: &str) -> crate::Result<&str> {
    let trimmed = target.trim();

    if trimmed.is_empty() {
        return Err(crate::DiagError::InvalidTarget(
            "Target cannot be empty".to_string(),
        ));
    }

    if trimmed.starts_with('-') {
        return Err(crate::DiagError::InvalidTarget(format!(
            "Target may not start with '-': {}",
            trimmed
        )));
    }

    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(crate::DiagError::InvalidTarget(format!(
            "Target contains whitespace or control characters: {:?}",
            trimmed
        )));
    }

    Ok(trimmed)
}
