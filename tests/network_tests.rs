//! Tests against the real host: loopback sockets, resolver and ping tool

use netdiag::network::TcpConnectScanner;
use netdiag::{PlatformFamily, ProbeOutcome, Prober, ResolutionStatus, Resolver, ScanError};
use std::net::{IpAddr, Ipv4Addr, TcpListener};
use std::time::{Duration, Instant};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

#[tokio::test]
async fn test_tcp_connect_scanner() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let open_port = listener.local_addr().unwrap().port();
    let scanner = TcpConnectScanner::new(Duration::from_millis(1000));

    let start = Instant::now();
    assert!(scanner.scan_port(LOCALHOST, open_port).await);
    assert!(start.elapsed() < Duration::from_secs(2));

    drop(listener);
    match scanner.connect(LOCALHOST, open_port).await {
        Err(ScanError::ConnectionFailure { port, .. }) => assert_eq!(port, open_port),
        Ok(()) => panic!("port {} should be closed once the listener is gone", open_port),
        Err(other) => panic!("unexpected scan error: {}", other),
    }
}

#[tokio::test]
async fn test_resolver_localhost_name() {
    let result = Resolver::new().resolve("localhost").await;

    match result.status {
        ResolutionStatus::Success => {
            let addr = result.resolved_address.unwrap();
            assert!(addr.is_loopback(), "localhost resolved to {}", addr);
        }
        other => println!("localhost not resolvable here ({:?}) - skipping test", other),
    }
}

#[tokio::test]
async fn test_resolver_reserved_name_not_found() {
    let result = Resolver::new().resolve("no-such-host.invalid").await;
    assert_ne!(result.status, ResolutionStatus::Success);
    assert!(result.resolved_address.is_none());
}

#[tokio::test]
async fn test_ping_loopback() {
    let prober = Prober::new(PlatformFamily::current());
    let outcome = prober
        .probe("127.0.0.1", 2, Duration::from_secs(15))
        .await;

    match outcome {
        ProbeOutcome::Reachable {
            packet_loss_percent,
            ..
        } => assert_eq!(packet_loss_percent, Some(0.0)),
        ProbeOutcome::Error { message } => {
            println!("ping not available ({}) - skipping test", message)
        }
        other => println!("ping not permitted here ({:?}) - skipping test", other),
    }
}

#[tokio::test]
async fn test_ping_empty_target_never_spawns() {
    let prober = Prober::new(PlatformFamily::current());
    let start = Instant::now();
    let outcome = prober.probe("", 4, Duration::from_secs(30)).await;

    assert!(matches!(outcome, ProbeOutcome::Error { .. }));
    assert!(start.elapsed() < Duration::from_secs(1));
}
