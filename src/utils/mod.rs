//! Logging setup and command-line input parsing

use crate::DiagError;

/// Logging utilities
pub struct Logger;

impl Logger {
    /// Initialize logger with specified level; `RUST_LOG` still applies per module
    pub fn init(level: log::LevelFilter) {
        let _ = env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .format_timestamp_secs()
            .try_init();
    }

    /// Level for the CLI verbosity flag
    pub fn level_for(verbose: bool) -> log::LevelFilter {
        if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        }
    }
}

/// Parse a port list such as `80`, `20-100`, `22,80,443` or any mix.
///
/// The result is ascending without duplicates. Port 0, reversed ranges and
/// an empty list are errors.
pub fn parse_port_spec(port_spec: &str) -> crate::Result<Vec<u16>> {
    let mut ports = Vec::new();

    for part in port_spec.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if let Some((start, end)) = part.split_once('-') {
            let start: u16 = start.trim().parse().map_err(|e| {
                DiagError::PortRangeError(format!("Invalid start port '{}': {}", start, e))
            })?;
            let end: u16 = end.trim().parse().map_err(|e| {
                DiagError::PortRangeError(format!("Invalid end port '{}': {}", end, e))
            })?;

            if start == 0 || end == 0 {
                return Err(DiagError::PortRangeError("Port 0 is not valid".to_string()));
            }
            if start > end {
                return Err(DiagError::PortRangeError(format!(
                    "Start port {} cannot be greater than end port {}",
                    start, end
                )));
            }
            ports.extend(start..=end);
        } else {
            let port: u16 = part.parse().map_err(|e| {
                DiagError::PortRangeError(format!("Invalid port '{}': {}", part, e))
            })?;
            if port == 0 {
                return Err(DiagError::PortRangeError("Port 0 is not valid".to_string()));
            }
            ports.push(port);
        }
    }

    if ports.is_empty() {
        return Err(DiagError::PortRangeError("No ports specified".to_string()));
    }

    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

/// Split a comma-separated host list, dropping blank entries
pub fn parse_host_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}
