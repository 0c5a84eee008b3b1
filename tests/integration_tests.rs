//! End-to-end tests of the orchestrator with scripted host tools and names

use async_trait::async_trait;
use netdiag::network::{CommandOutput, CommandRunner, NameService};
use netdiag::{
    DiagConfig, Diagnostician, PlatformFamily, PortScanOutcome, PortScanner, ProbeOutcome, Prober,
    ReportStore, ResolutionError, ResolutionStatus, Resolver, RouteTracer, TraceOutcome,
};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

const LINUX_OK: &str = "\
PING 10.0.0.7 (10.0.0.7) 56(84) bytes of data.
64 bytes from 10.0.0.7: icmp_seq=1 ttl=64 time=0.210 ms
64 bytes from 10.0.0.7: icmp_seq=2 ttl=64 time=0.190 ms

--- 10.0.0.7 ping statistics ---
2 packets transmitted, 2 received, 0% packet loss, time 1001ms
rtt min/avg/max/mdev = 0.190/0.200/0.210/0.010 ms
";

/// Answers every run from a table keyed by the last argument (the target)
#[derive(Default)]
struct ScriptedTools {
    replies: HashMap<String, CommandOutput>,
    hang: bool,
}

impl ScriptedTools {
    fn reply(mut self, target: &str, stdout: &str, success: bool) -> Self {
        self.replies.insert(
            target.to_string(),
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                success,
                exit_code: Some(if success { 0 } else { 1 }),
            },
        );
        self
    }

    fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CommandRunner for ScriptedTools {
    async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        if self.hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let target = args.last().cloned().unwrap_or_default();
        self.replies.get(&target).cloned().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not scripted for {}", program, target),
            )
        })
    }
}

#[derive(Default)]
struct StaticNames {
    hosts: HashMap<String, IpAddr>,
    delay: Option<Duration>,
}

impl NameService for StaticNames {
    fn forward(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.hosts
            .get(name)
            .map(|addr| vec![*addr])
            .ok_or_else(|| ResolutionError::NotFound(name.to_string()))
    }

    fn reverse(&self, addr: IpAddr) -> Result<String, ResolutionError> {
        self.hosts
            .iter()
            .find(|(_, a)| **a == addr)
            .map(|(name, _)| format!("{}.lan", name))
            .ok_or_else(|| ResolutionError::NotFound(addr.to_string()))
    }
}

fn names(pairs: &[(&str, &str)]) -> StaticNames {
    StaticNames {
        hosts: pairs
            .iter()
            .map(|(n, a)| (n.to_string(), a.parse().unwrap()))
            .collect(),
        delay: None,
    }
}

fn diagnostician(
    config: DiagConfig,
    names: StaticNames,
    tools: ScriptedTools,
) -> Diagnostician {
    let tools: Arc<dyn CommandRunner> = Arc::new(tools);
    let scanner = PortScanner::new(config.port_timeout(), config.scan_concurrency);
    Diagnostician::with_services(
        config,
        Resolver::with_backend(Arc::new(names)),
        Prober::with_runner(Arc::clone(&tools), PlatformFamily::Unix),
        RouteTracer::with_runner(tools, PlatformFamily::Unix),
        scanner,
    )
    .unwrap()
}

fn fast_config() -> DiagConfig {
    DiagConfig::default()
        .with_port_timeout(200)
        .with_platform(PlatformFamily::Unix)
}

#[tokio::test]
async fn test_reachable_host_full_report() {
    let diag = diagnostician(
        fast_config().with_stages(true, true, false),
        names(&[("gateway", "10.0.0.7")]),
        ScriptedTools::default().reply("gateway", LINUX_OK, true),
    );

    let report = diag.diagnose("gateway").await.unwrap();
    assert_eq!(report.target(), "gateway");

    let dns = report.resolution().unwrap();
    assert_eq!(dns.status, ResolutionStatus::Success);
    assert_eq!(dns.resolved_address, Some("10.0.0.7".parse().unwrap()));
    assert_eq!(dns.resolved_hostname.as_deref(), Some("gateway.lan"));

    assert_eq!(
        report.probe(),
        Some(&ProbeOutcome::Reachable {
            packet_loss_percent: Some(0.0),
            avg_latency_ms: Some(0.2),
        })
    );
    assert!(report.ports().is_none());
}

#[tokio::test]
async fn test_unknown_host_gives_partial_report() {
    let diag = diagnostician(
        fast_config(),
        StaticNames::default(),
        ScriptedTools::default().reply("no-such-host.invalid", "", false),
    );

    let report = diag.diagnose("no-such-host.invalid").await.unwrap();

    assert_eq!(report.resolution().unwrap().status, ResolutionStatus::NotFound);
    assert_eq!(report.probe(), Some(&ProbeOutcome::Unreachable));
    assert!(matches!(report.ports(), Some(PortScanOutcome::Error { .. })));
    assert!(report.open_ports().is_empty());
}

#[tokio::test]
async fn test_deadline_marks_pending_stages_timed_out() {
    let slow_names = StaticNames {
        delay: Some(Duration::from_millis(500)),
        ..names(&[("slow", "10.0.0.9")])
    };
    let diag = diagnostician(
        fast_config().with_stages(true, true, false),
        slow_names,
        ScriptedTools::hanging(),
    );

    let started = std::time::Instant::now();
    let report = diag
        .diagnose_with_deadline("slow", Duration::from_millis(50))
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_millis(450));
    assert_eq!(report.resolution().unwrap().status, ResolutionStatus::Timeout);
    assert_eq!(report.probe(), Some(&ProbeOutcome::Timeout));
}

#[tokio::test]
async fn test_configured_deadline_applies_to_diagnose() {
    let diag = diagnostician(
        fast_config().with_stages(false, true, false).with_deadline(50),
        StaticNames::default(),
        ScriptedTools::hanging(),
    );

    let report = diag.diagnose("10.0.0.1").await.unwrap();
    assert!(report.resolution().is_none());
    assert_eq!(report.probe(), Some(&ProbeOutcome::Timeout));
}

#[tokio::test]
async fn test_empty_target_is_rejected() {
    let diag = diagnostician(fast_config(), StaticNames::default(), ScriptedTools::default());
    assert!(matches!(
        diag.diagnose("").await,
        Err(netdiag::DiagError::InvalidTarget(_))
    ));
}

#[tokio::test]
async fn test_batch_keeps_order_and_counts() {
    let diag = diagnostician(
        fast_config(),
        StaticNames::default(),
        ScriptedTools::default()
            .reply("up-1", LINUX_OK, true)
            .reply("down", "", false)
            .reply("up-2", LINUX_OK, true),
    );

    let summary = diag
        .probe_batch(&["up-1", "down", "missing-tool", "up-2"])
        .await;

    let targets: Vec<&str> = summary.results.iter().map(|r| r.target.as_str()).collect();
    assert_eq!(targets, vec!["up-1", "down", "missing-tool", "up-2"]);
    assert_eq!(summary.reachable, 2);
    assert_eq!(summary.unreachable, 2);
    assert!(matches!(
        summary.results[2].outcome,
        ProbeOutcome::Error { .. }
    ));
}

#[tokio::test]
async fn test_trace_passes_raw_output_through() {
    let hops = "traceroute to gw (10.0.0.7), 30 hops max\n 1  gw (10.0.0.7)  0.3 ms\n";
    let diag = diagnostician(
        fast_config(),
        StaticNames::default(),
        ScriptedTools::default().reply("gw", hops, true),
    );

    assert_eq!(
        diag.trace("gw").await,
        TraceOutcome::Completed {
            raw_output: hops.to_string()
        }
    );
}

#[tokio::test]
async fn test_report_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let diag = diagnostician(
        fast_config()
            .with_stages(true, true, false)
            .with_report_dir(dir.path()),
        names(&[("gateway", "10.0.0.7")]),
        ScriptedTools::default().reply("gateway", LINUX_OK, true),
    );

    let report = diag.diagnose("gateway").await.unwrap();
    let store = ReportStore::new(diag.config().report_dir.clone());
    let path = store.save(&report).unwrap();

    let name = path.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("network_report_gateway_"));
    assert!(name.ends_with(".json"));
    assert_eq!(path.parent().unwrap(), dir.path());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["tests"]["dns"]["ip_address"], "10.0.0.7");
    assert_eq!(json["tests"]["ping"]["status"], "reachable");
    assert!(json["tests"].get("ports").is_none());

    let loaded = store.load(&path).unwrap();
    assert_eq!(loaded, report);
}

#[tokio::test]
async fn test_load_missing_report_is_read_failure() {
    let dir = tempfile::tempdir().unwrap();
    let store = ReportStore::new(dir.path());
    assert!(matches!(
        store.load(dir.path().join("absent.json")),
        Err(netdiag::PersistenceError::ReadFailure { .. })
    ));
}

#[test]
fn test_load_tolerates_missing_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(
        &path,
        r#"{"target":"h","timestamp":"2024-03-09T14:05:07Z","tests":{"ping":{"status":"timeout"}}}"#,
    )
    .unwrap();

    let report = ReportStore::new(dir.path()).load(&path).unwrap();
    assert!(report.resolution().is_none());
    assert_eq!(report.probe(), Some(&ProbeOutcome::Timeout));
}

#[tokio::test]
async fn test_scan_stage_uses_configured_names() {
    let diag = diagnostician(
        fast_config().with_stages(false, false, true),
        names(&[("loopback-alias", "127.0.0.1")]),
        ScriptedTools::default(),
    );

    let report = diag.diagnose("loopback-alias").await.unwrap();
    match report.ports() {
        Some(PortScanOutcome::Completed { results }) => {
            assert_eq!(results.len(), netdiag::well_known_ports().len());
        }
        other => panic!("scan did not complete against the alias: {:?}", other),
    }
}

#[test]
fn test_load_accepts_error_only_sections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("failed.json");
    std::fs::write(
        &path,
        r#"{"target":"h","timestamp":"2024-03-09T14:05:07Z",
            "tests":{"dns":{"error":"x"},"ping":{"error":"x"},"ports":{"error":"x"}}}"#,
    )
    .unwrap();

    let report = ReportStore::new(dir.path()).load(&path).unwrap();
    let dns = report.resolution().unwrap();
    assert_eq!(dns.status, ResolutionStatus::Error);
    assert_eq!(dns.error.as_deref(), Some("x"));
    assert_eq!(
        report.probe(),
        Some(&ProbeOutcome::Error {
            message: "x".to_string()
        })
    );
    assert_eq!(
        report.ports(),
        Some(&PortScanOutcome::Error {
            error: "x".to_string()
        })
    );
}
