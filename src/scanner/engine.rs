//! Port scanner: TCP connect attempts spread over a bounded worker pool

use crate::error::ScanError;
use crate::network::{Resolver, TcpConnectScanner};
use crate::scanner::{PortState, ScanProgress, ScanRequest};
use crate::top_ports::well_known_ports;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Connect-scan service.
///
/// Holds only the defaults used by [`PortScanner::scan_well_known`], the
/// resolver used to find the target address and an optional progress
/// subscriber; every scan is independent.
#[derive(Clone)]
pub struct PortScanner {
    per_port_timeout: Duration,
    concurrency: usize,
    resolver: Resolver,
    progress: Option<mpsc::UnboundedSender<ScanProgress>>,
}

impl PortScanner {
    pub fn new(per_port_timeout: Duration, concurrency: usize) -> Self {
        Self {
            per_port_timeout,
            concurrency: concurrency.max(1),
            resolver: Resolver::new(),
            progress: None,
        }
    }

    /// Resolve scan targets through `resolver` instead of the OS default
    pub fn with_resolver(mut self, resolver: Resolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Publish completed-port counts on `sender` while scans run
    pub fn with_progress(mut self, sender: mpsc::UnboundedSender<ScanProgress>) -> Self {
        self.progress = Some(sender);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn per_port_timeout(&self) -> Duration {
        self.per_port_timeout
    }

    /// Scan `ports` on `target`, one ascending entry per distinct port.
    ///
    /// Only malformed input (no ports, port 0, empty target) is an error; an
    /// unresolvable host yields every port closed.
    pub async fn scan<I>(
        &self,
        target: &str,
        ports: I,
        per_port_timeout: Duration,
        concurrency: usize,
    ) -> crate::Result<Vec<PortState>>
    where
        I: IntoIterator<Item = u16>,
    {
        let request = ScanRequest::new(target, ports, per_port_timeout)?;
        Ok(self.scan_request(&request, concurrency).await)
    }

    /// Scan the well-known ports table with this scanner's defaults
    pub async fn scan_well_known(&self, target: &str) -> Vec<PortState> {
        match ScanRequest::new(target, well_known_ports(), self.per_port_timeout) {
            Ok(request) => self.scan_request(&request, self.concurrency).await,
            Err(e) => {
                log::warn!("Not scanning {:?}: {}", target, e);
                closed(well_known_ports())
            }
        }
    }

    /// Scan a validated request; resolution failure folds into closed ports
    pub async fn scan_request(&self, request: &ScanRequest, concurrency: usize) -> Vec<PortState> {
        match self.try_scan(request, concurrency).await {
            Ok(results) => results,
            Err(e) => {
                log::warn!("Scan of {} could not start: {}", request.target(), e);
                closed(request.ports().iter().copied())
            }
        }
    }

    /// Scan a validated request, failing if the target has no address or
    /// if any port was left unchecked
    pub async fn try_scan(
        &self,
        request: &ScanRequest,
        concurrency: usize,
    ) -> crate::Result<Vec<PortState>> {
        let addr = self.resolver.lookup(request.target()).await?;
        let ports: Arc<Vec<u16>> = Arc::new(request.ports().iter().copied().collect());
        let workers = concurrency.clamp(1, ports.len());

        log::info!(
            "Scanning {} ports on {} ({}) with {} workers",
            ports.len(),
            request.target(),
            addr,
            workers
        );
        let start_time = Instant::now();

        let slots = self
            .run_pool(addr, Arc::clone(&ports), request.per_port_timeout(), workers)
            .await?;

        let results: Vec<PortState> = ports
            .iter()
            .zip(slots)
            .map(|(&port, open)| PortState::new(port, open))
            .collect();

        log::info!(
            "Scan of {} completed in {:.2}s - {}/{} ports open",
            request.target(),
            start_time.elapsed().as_secs_f64(),
            results.iter().filter(|p| p.open).count(),
            results.len()
        );

        Ok(results)
    }

    /// Run `workers` tasks pulling port indices from a shared cursor.
    ///
    /// Each index is claimed by exactly one worker, so every slot of the
    /// returned vector is written once. Dropping the future aborts the pool.
    async fn run_pool(
        &self,
        addr: IpAddr,
        ports: Arc<Vec<u16>>,
        per_port_timeout: Duration,
        workers: usize,
    ) -> Result<Vec<bool>, ScanError> {
        let total = ports.len();
        let cursor = Arc::new(AtomicUsize::new(0));
        let completed = Arc::new(AtomicUsize::new(0));
        let connector = TcpConnectScanner::new(per_port_timeout);

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let ports = Arc::clone(&ports);
            let cursor = Arc::clone(&cursor);
            let completed = Arc::clone(&completed);
            let progress = self.progress.clone();

            pool.spawn(async move {
                let mut found = Vec::new();
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(&port) = ports.get(index) else {
                        break;
                    };

                    let open = connector.scan_port(addr, port).await;
                    if open {
                        log::debug!("{}:{} is open", addr, port);
                    }
                    found.push((index, open));

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    if let Some(sender) = &progress {
                        let _ = sender.send(ScanProgress {
                            completed: done,
                            total,
                        });
                    }
                }
                found
            });
        }

        let mut batches = Vec::with_capacity(workers);
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(found) => batches.push(found),
                Err(e) => log::error!("Scan worker failed: {}", e),
            }
        }
        fill_slots(&ports, batches)
    }
}

/// Place worker results by index; any slot nobody filled fails the scan
fn fill_slots(ports: &[u16], batches: Vec<Vec<(usize, bool)>>) -> Result<Vec<bool>, ScanError> {
    let mut slots: Vec<Option<bool>> = vec![None; ports.len()];
    for (index, open) in batches.into_iter().flatten() {
        slots[index] = Some(open);
    }

    let missing: Vec<u16> = slots
        .iter()
        .zip(ports)
        .filter(|(slot, _)| slot.is_none())
        .map(|(_, &port)| port)
        .collect();
    if !missing.is_empty() {
        return Err(ScanError::Incomplete { ports: missing });
    }

    Ok(slots.into_iter().map(|slot| slot.unwrap_or(false)).collect())
}

fn closed<I: IntoIterator<Item = u16>>(ports: I) -> Vec<PortState> {
    ports.into_iter().map(|port| PortState::new(port, false)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::network::NameService;
    use std::net::TcpListener;

    fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn test_results_ordered_and_complete() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let open_port = listener.local_addr().unwrap().port();
        let closed_port = free_port();

        let scanner = PortScanner::new(Duration::from_millis(500), 4);
        let results = scanner
            .scan(
                "127.0.0.1",
                [open_port, closed_port],
                Duration::from_millis(500),
                4,
            )
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results[0].port < results[1].port);
        for state in &results {
            assert_eq!(state.open, state.port == open_port);
        }
    }

    #[tokio::test]
    async fn test_progress_reaches_total() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let scanner = PortScanner::new(Duration::from_millis(200), 2).with_progress(tx);
        let ports = [free_port(), free_port(), free_port()];

        let results = scanner
            .scan("127.0.0.1", ports, Duration::from_millis(200), 2)
            .await
            .unwrap();
        drop(scanner);

        let mut last = None;
        while let Some(progress) = rx.recv().await {
            last = Some(progress);
        }
        let last = last.unwrap();
        assert_eq!(last.total, results.len());
        assert!(last.is_done());
    }

    #[tokio::test]
    async fn test_unresolvable_target() {
        let scanner = PortScanner::new(Duration::from_millis(200), 2);
        let request =
            ScanRequest::new("no-such-host.invalid", [80, 81], Duration::from_millis(200)).unwrap();

        assert!(scanner.try_scan(&request, 2).await.is_err());

        let folded = scanner.scan_request(&request, 2).await;
        assert_eq!(folded.len(), 2);
        assert!(folded.iter().all(|p| !p.open));
    }

    struct Unavailable;

    impl NameService for Unavailable {
        fn forward(&self, name: &str) -> Result<Vec<IpAddr>, ResolutionError> {
            Err(ResolutionError::ServiceUnavailable(format!("no server for {}", name)))
        }

        fn reverse(&self, addr: IpAddr) -> Result<String, ResolutionError> {
            Err(ResolutionError::NotFound(addr.to_string()))
        }
    }

    #[tokio::test]
    async fn test_injected_resolver_failure_class_kept() {
        let scanner = PortScanner::new(Duration::from_millis(200), 2)
            .with_resolver(Resolver::with_backend(Arc::new(Unavailable)));
        let request = ScanRequest::new("intranet", [80], Duration::from_millis(200)).unwrap();

        assert!(matches!(
            scanner.try_scan(&request, 2).await,
            Err(crate::DiagError::Resolution(
                ResolutionError::ServiceUnavailable(_)
            ))
        ));
    }

    #[test]
    fn test_unfilled_slots_fail_the_scan() {
        let ports = [22, 80, 443, 8080];
        let batches = vec![vec![(0, true), (2, false)], vec![(3, false)]];

        assert_eq!(
            fill_slots(&ports, batches),
            Err(ScanError::Incomplete { ports: vec![80] })
        );
        assert_eq!(
            fill_slots(&ports[..2], vec![vec![(1, false), (0, true)]]),
            Ok(vec![true, false])
        );
    }

    #[tokio::test]
    async fn test_invalid_input_is_error() {
        let scanner = PortScanner::new(Duration::from_millis(200), 2);
        assert!(scanner
            .scan("127.0.0.1", Vec::new(), Duration::from_millis(200), 2)
            .await
            .is_err());
    }
}
