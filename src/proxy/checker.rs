//! Concurrent proxy validation
//!
//! Every candidate becomes one spawned task. A semaphore bounds how many of
//! them are probing at once, and each task reports exactly one
//! [`ValidationResult`] on a completion channel read by a single consumer.

use crate::proxy::aggregator::{CandidateSet, ValidationScope};
use crate::proxy::models::{Address, Candidate, ProtocolKind, ValidationResult};
use crate::proxy::probe::{NetworkProbe, Probe, ProbeError};
use futures::FutureExt;
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info};

/// Default timeout for proxy checks in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 7;

/// Default number of concurrent checks
pub const DEFAULT_CONCURRENCY: NonZeroUsize = match NonZeroUsize::new(150) {
    Some(n) => n,
    None => unreachable!(),
};

/// Default URL to test HTTP proxies against
const DEFAULT_TEST_URL: &str = "http://httpbin.org/ip";

/// Default host SOCKS proxies are asked to connect to
const DEFAULT_SOCKS_TARGET_HOST: &str = "www.google.com";

const DEFAULT_SOCKS_TARGET_PORT: u16 = 443;

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each proxy check
    pub timeout: Duration,
    /// Number of concurrent checks
    pub concurrency: NonZeroUsize,
    /// URL to test HTTP proxies against
    pub test_url: String,
    /// Downstream host for the SOCKS CONNECT
    pub socks_target_host: String,
    pub socks_target_port: u16,
    /// Which candidates get validated
    pub scope: ValidationScope,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            test_url: DEFAULT_TEST_URL.to_string(),
            socks_target_host: DEFAULT_SOCKS_TARGET_HOST.to_string(),
            socks_target_port: DEFAULT_SOCKS_TARGET_PORT,
            scope: ValidationScope::default(),
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_concurrency(mut self, concurrency: NonZeroUsize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }

    pub fn with_socks_target(mut self, host: String, port: u16) -> Self {
        self.socks_target_host = host;
        self.socks_target_port = port;
        self
    }

    pub fn with_scope(mut self, scope: ValidationScope) -> Self {
        self.scope = scope;
        self
    }

    /// Network probe matching this configuration
    pub fn network_probe(&self) -> NetworkProbe {
        NetworkProbe::new(
            self.timeout,
            self.test_url.clone(),
            self.socks_target_host.clone(),
            self.socks_target_port,
        )
    }
}

/// Validation results partitioned by probed protocol
#[derive(Debug, Default, Clone)]
pub struct ValidationReport {
    results: BTreeMap<ProtocolKind, Vec<ValidationResult>>,
    total: usize,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result in completion order
    pub fn record(&mut self, result: ValidationResult) {
        self.total += 1;
        self.results.entry(result.protocol).or_default().push(result);
    }

    /// Sort every partition by address
    pub fn finalize(mut self) -> Self {
        for results in self.results.values_mut() {
            results.sort_by(|a, b| a.address.cmp(&b.address));
        }
        self
    }

    /// All results recorded for `protocol`
    pub fn results(&self, protocol: ProtocolKind) -> &[ValidationResult] {
        self.results.get(&protocol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Addresses that passed the `protocol` probe, in recorded order
    pub fn valid(&self, protocol: ProtocolKind) -> Vec<&Address> {
        self.results(protocol)
            .iter()
            .filter(|r| r.is_valid())
            .map(|r| &r.address)
            .collect()
    }

    pub fn valid_count(&self, protocol: ProtocolKind) -> usize {
        self.results(protocol).iter().filter(|r| r.is_valid()).count()
    }

    /// Number of results recorded
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.values().flatten()
    }
}

/// Proxy checker running probes across a bounded pool
pub struct ProxyChecker<P = NetworkProbe> {
    config: CheckerConfig,
    probe: Arc<P>,
}

impl ProxyChecker<NetworkProbe> {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Self {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Self {
        let probe = config.network_probe();
        Self::with_probe(config, probe)
    }
}

impl<P: Probe + 'static> ProxyChecker<P> {
    /// Create a checker that uses `probe` instead of the network
    pub fn with_probe(config: CheckerConfig, probe: P) -> Self {
        Self {
            config,
            probe: Arc::new(probe),
        }
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Probe one candidate; never fails, errors become an invalid verdict
    pub async fn check_candidate(&self, candidate: Candidate) -> ValidationResult {
        run_probe(self.probe.as_ref(), candidate, self.config.timeout).await
    }

    /// Start probing every candidate and stream results as they complete
    ///
    /// The receiver yields exactly one result per candidate and closes once
    /// all tasks have finished. Must be called inside a tokio runtime.
    pub fn check_stream(&self, candidates: Vec<Candidate>) -> mpsc::Receiver<ValidationResult> {
        let concurrency = self.config.concurrency.get();
        let (tx, rx) = mpsc::channel(concurrency);
        let semaphore = Arc::new(Semaphore::new(concurrency));

        info!(
            candidates = candidates.len(),
            concurrency,
            timeout = ?self.config.timeout,
            "starting validation"
        );

        for candidate in candidates {
            let tx = tx.clone();
            let semaphore = Arc::clone(&semaphore);
            let probe = Arc::clone(&self.probe);
            let timeout = self.config.timeout;

            tokio::spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => run_probe(probe.as_ref(), candidate, timeout).await,
                    Err(_) => ValidationResult::invalid(candidate, "worker pool closed".to_string()),
                };
                // the consumer may have gone away; the verdict is simply dropped then
                let _ = tx.send(result).await;
            });
        }

        rx
    }

    /// Probe every candidate and collect the sorted report
    pub async fn check_candidates(&self, candidates: Vec<Candidate>) -> ValidationReport {
        self.check_candidates_with(candidates, |_| {}).await
    }

    /// Like [`check_candidates`](Self::check_candidates), calling `on_result`
    /// for every result in completion order
    pub async fn check_candidates_with<F>(
        &self,
        candidates: Vec<Candidate>,
        mut on_result: F,
    ) -> ValidationReport
    where
        F: FnMut(&ValidationResult),
    {
        let started = Instant::now();
        let mut rx = self.check_stream(candidates);
        let mut report = ValidationReport::new();

        while let Some(result) = rx.recv().await {
            on_result(&result);
            report.record(result);
        }

        let report = report.finalize();
        info!(
            checked = report.len(),
            http = report.valid_count(ProtocolKind::Http),
            socks4 = report.valid_count(ProtocolKind::Socks4),
            socks5 = report.valid_count(ProtocolKind::Socks5),
            elapsed = ?started.elapsed(),
            "validation finished"
        );
        report
    }

    /// Validate a frozen candidate set using the configured scope
    pub async fn validate(&self, candidates: &CandidateSet) -> ValidationReport {
        self.check_candidates(candidates.plan(self.config.scope))
            .await
    }
}

impl Default for ProxyChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// The task boundary: timeouts, errors and panics all become `Invalid`
async fn run_probe<P>(probe: &P, candidate: Candidate, timeout: Duration) -> ValidationResult
where
    P: Probe + ?Sized,
{
    let start = Instant::now();
    let outcome = AssertUnwindSafe(tokio::time::timeout(timeout, probe.probe(&candidate)))
        .catch_unwind()
        .await;

    let result = match outcome {
        Ok(Ok(Ok(()))) => {
            let elapsed = start.elapsed().as_millis() as u64;
            ValidationResult::valid(candidate, elapsed)
        }
        Ok(Ok(Err(e))) => ValidationResult::invalid(candidate, e.to_string()),
        Ok(Err(_)) => ValidationResult::invalid(candidate, ProbeError::Timeout(timeout).to_string()),
        Err(_) => ValidationResult::invalid(candidate, "probe panicked".to_string()),
    };

    debug!(
        address = %result.address,
        protocol = %result.protocol,
        verdict = ?result.verdict,
        reason = result.reason.as_deref().unwrap_or(""),
        "probe finished"
    );
    result
}
