//! TCP connect attempts

use crate::error::ScanError;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;

/// TCP connect scanner for a single host address
#[derive(Debug, Clone, Copy)]
pub struct TcpConnectScanner {
    timeout: Duration,
}

impl TcpConnectScanner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Attempt a full TCP handshake on one port.
    ///
    /// Refusal, timeout and every other network error are reported the same
    /// way; a connect-scan cannot tell closed from filtered.
    pub async fn connect(&self, target: IpAddr, port: u16) -> Result<(), ScanError> {
        let addr = SocketAddr::new(target, port);

        match tokio::time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(ScanError::ConnectionFailure {
                port,
                reason: e.to_string(),
            }),
            Err(_) => Err(ScanError::ConnectionFailure {
                port,
                reason: format!("no answer within {:?}", self.timeout),
            }),
        }
    }

    /// Connect attempt folded into an open/closed flag
    pub async fn scan_port(&self, target: IpAddr, port: u16) -> bool {
        match self.connect(target, port).await {
            Ok(()) => true,
            Err(e) => {
                log::trace!("{}: {}", target, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, TcpListener};

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[tokio::test]
    async fn test_listening_port_is_open() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let scanner = TcpConnectScanner::new(Duration::from_millis(500));
        assert!(scanner.scan_port(LOCALHOST, port).await);
    }

    #[tokio::test]
    async fn test_closed_port_reports_connection_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let scanner = TcpConnectScanner::new(Duration::from_millis(500));
        let err = scanner.connect(LOCALHOST, port).await.unwrap_err();
        assert!(matches!(err, ScanError::ConnectionFailure { port: p, .. } if p == port));
    }
}
