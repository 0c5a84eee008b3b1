//! Forward and reverse name resolution through the OS resolver

use crate::error::ResolutionError;
use dns_lookup::LookupErrorKind;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Outcome class of a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Success,
    NotFound,
    Error,
    /// Abandoned by an orchestrator deadline
    Timeout,
}

/// Result of resolving one target.
///
/// `Success` always carries an address. The hostname is a single canonical
/// name from the reverse lookup and may be absent even on success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub target: String,
    #[serde(rename = "hostname")]
    pub resolved_hostname: Option<String>,
    #[serde(rename = "ip_address")]
    pub resolved_address: Option<IpAddr>,
    pub status: ResolutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolutionResult {
    pub fn success(target: &str, address: IpAddr, hostname: Option<String>) -> Self {
        Self {
            target: target.to_string(),
            resolved_hostname: hostname,
            resolved_address: Some(address),
            status: ResolutionStatus::Success,
            error: None,
        }
    }

    pub fn not_found(target: &str) -> Self {
        Self {
            target: target.to_string(),
            resolved_hostname: None,
            resolved_address: None,
            status: ResolutionStatus::NotFound,
            error: None,
        }
    }

    pub fn error(target: &str, message: impl Into<String>) -> Self {
        Self {
            target: target.to_string(),
            resolved_hostname: None,
            resolved_address: None,
            status: ResolutionStatus::Error,
            error: Some(message.into()),
        }
    }

    pub fn timeout(target: &str) -> Self {
        Self {
            target: target.to_string(),
            resolved_hostname: None,
            resolved_address: None,
            status: ResolutionStatus::Timeout,
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResolutionStatus::Success
    }
}

/// Blocking name-service backend
pub trait NameService: Send + Sync {
    /// Name to addresses
    fn forward(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError>;

    /// Address to canonical name
    fn reverse(&self, addr: IpAddr) -> Result<String, ResolutionError>;
}

/// Backend using `getaddrinfo`/`getnameinfo`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNameService;

impl NameService for SystemNameService {
    fn forward(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError> {
        let entries = dns_lookup::getaddrinfo(Some(name), None, None).map_err(|e| {
            let kind = e.kind();
            let message = format!("{} ({:?})", std::io::Error::from(e), kind);
            match kind {
                LookupErrorKind::NoName | LookupErrorKind::NoData => {
                    ResolutionError::NotFound(message)
                }
                _ => ResolutionError::ServiceUnavailable(message),
            }
        })?;

        let mut addrs: Vec<IpAddr> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ResolutionError::ServiceUnavailable(e.to_string()))?;
            let ip = entry.sockaddr.ip();
            if !addrs.contains(&ip) {
                addrs.push(ip);
            }
        }

        if addrs.is_empty() {
            return Err(ResolutionError::NotFound(format!("no addresses for {}", name)));
        }
        Ok(addrs)
    }

    fn reverse(&self, addr: IpAddr) -> Result<String, ResolutionError> {
        dns_lookup::lookup_addr(&addr).map_err(|e| ResolutionError::NotFound(e.to_string()))
    }
}

/// Stateless resolver service
#[derive(Clone)]
pub struct Resolver {
    backend: Arc<dyn NameService>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::with_backend(Arc::new(SystemNameService))
    }

    pub fn with_backend(backend: Arc<dyn NameService>) -> Self {
        Self { backend }
    }

    /// Resolve a target; every failure is reported in the returned status.
    pub async fn resolve(&self, target: &str) -> ResolutionResult {
        let target = target.trim().to_string();
        if target.is_empty() {
            return ResolutionResult::error(&target, "Target cannot be empty");
        }

        let backend = Arc::clone(&self.backend);
        let lookup_target = target.clone();
        match tokio::task::spawn_blocking(move || resolve_with(backend.as_ref(), &lookup_target))
            .await
        {
            Ok(result) => result,
            Err(e) => ResolutionResult::error(&target, format!("resolver task failed: {}", e)),
        }
    }

    /// Forward lookup only, for callers that need an address to connect to.
    ///
    /// Literal addresses never reach the backend.
    pub async fn lookup(&self, target: &str) -> Result<IpAddr, ResolutionError> {
        let target = target.trim().to_string();
        if let Ok(addr) = target.parse::<IpAddr>() {
            return Ok(addr);
        }

        let backend = Arc::clone(&self.backend);
        let lookup_target = target.clone();
        let addrs = tokio::task::spawn_blocking(move || backend.forward(&lookup_target))
            .await
            .map_err(|e| ResolutionError::ServiceUnavailable(format!("resolver task failed: {}", e)))??;

        preferred_address(&addrs)
            .ok_or_else(|| ResolutionError::NotFound(format!("no addresses for {}", target)))
    }
}

/// First IPv4 address like gethostbyname, otherwise whatever came first
fn preferred_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .copied()
        .find(IpAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
}

/// Resolution steps against a blocking backend
pub fn resolve_with(backend: &dyn NameService, target: &str) -> ResolutionResult {
    let forward_error = match backend.forward(target) {
        Ok(addrs) => match preferred_address(&addrs) {
            Some(address) => {
                let hostname = match backend.reverse(address) {
                    Ok(name) => Some(name),
                    Err(e) => {
                        log::debug!("Reverse lookup for {} failed: {}", address, e);
                        None
                    }
                };
                log::debug!("Resolved {} to {}", target, address);
                return ResolutionResult::success(target, address, hostname);
            }
            None => ResolutionError::NotFound(format!("no addresses for {}", target)),
        },
        Err(e) => e,
    };

    log::debug!("Forward lookup for {} failed: {}", target, forward_error);

    if let Ok(literal) = target.parse::<IpAddr>() {
        if let Ok(name) = backend.reverse(literal) {
            return ResolutionResult::success(target, literal, Some(name));
        }
    }

    match forward_error {
        ResolutionError::NotFound(_) => ResolutionResult::not_found(target),
        ResolutionError::ServiceUnavailable(message) => ResolutionResult::error(target, message),
    }
}
