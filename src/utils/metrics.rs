use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency samples kept for percentiles; older samples are dropped
const LATENCY_WINDOW: usize = 1024;

/// Pipeline stages timed by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ocr,
    Detection,
    Translation,
}

/// Metrics collector for the application.
///
/// Tracks upstream calls, pipeline outcomes and stage durations.
/// Thread-safe and can be shared across the application.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct CallCounters {
    success: AtomicUsize,
    failed: AtomicUsize,
}

#[derive(Default)]
struct StageTotals {
    total_ms: AtomicU64,
    count: AtomicU64,
}

impl StageTotals {
    fn record(&self, ms: u64) {
        self.total_ms.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    fn avg_ms(&self) -> u64 {
        let count = self.count.load(Ordering::Relaxed);
        if count == 0 {
            return 0;
        }
        self.total_ms.load(Ordering::Relaxed) / count
    }
}

struct MetricsInner {
    // Upstream calls, keyed by service ("ocr", "detect", "translate")
    upstream_calls: DashMap<&'static str, CallCounters>,
    upstream_latency_ms: RwLock<VecDeque<u64>>,
    ocr_polls: AtomicUsize,

    // Pipeline outcomes
    pipelines_succeeded: AtomicUsize,
    pipeline_failures: DashMap<&'static str, AtomicUsize>,

    // Stage durations
    ocr_duration: StageTotals,
    detection_duration: StageTotals,
    translation_duration: StageTotals,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                upstream_calls: DashMap::new(),
                upstream_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                ocr_polls: AtomicUsize::new(0),
                pipelines_succeeded: AtomicUsize::new(0),
                pipeline_failures: DashMap::new(),
                ocr_duration: StageTotals::default(),
                detection_duration: StageTotals::default(),
                translation_duration: StageTotals::default(),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Upstream Metrics
    pub fn record_upstream_call(&self, service: &'static str, success: bool, duration: Duration) {
        let counters = self.inner.upstream_calls.entry(service).or_default();
        if success {
            counters.success.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        drop(counters);

        let mut latency = self.inner.upstream_latency_ms.write();
        if latency.len() == LATENCY_WINDOW {
            latency.pop_front();
        }
        latency.push_back(duration.as_millis() as u64);
    }

    pub fn record_ocr_poll(&self) {
        self.inner.ocr_polls.fetch_add(1, Ordering::Relaxed);
    }

    // Pipeline Metrics
    pub fn record_pipeline_success(&self) {
        self.inner.pipelines_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_pipeline_failure(&self, kind: &'static str) {
        self.inner
            .pipeline_failures
            .entry(kind)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stage_duration(&self, stage: Stage, duration: Duration) {
        let totals = match stage {
            Stage::Ocr => &self.inner.ocr_duration,
            Stage::Detection => &self.inner.detection_duration,
            Stage::Translation => &self.inner.translation_duration,
        };
        totals.record(duration.as_millis() as u64);
    }

    // Endpoint Metrics
    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut latency: Vec<u64> = self.inner.upstream_latency_ms.read().iter().copied().collect();
        latency.sort_unstable();
        let upstream_latency_avg_ms = avg(&latency);
        let upstream_latency_p50_ms = percentile(&latency, 0.5);
        let upstream_latency_p95_ms = percentile(&latency, 0.95);

        let upstream_calls = self
            .inner
            .upstream_calls
            .iter()
            .map(|entry| {
                (
                    entry.key().to_string(),
                    CallStats {
                        success: entry.success.load(Ordering::Relaxed),
                        failed: entry.failed.load(Ordering::Relaxed),
                    },
                )
            })
            .collect();

        let pipelines_failed = self
            .inner
            .pipeline_failures
            .iter()
            .map(|entry| (entry.key().to_string(), entry.load(Ordering::Relaxed)))
            .collect();

        let endpoint_requests = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            upstream_calls,
            upstream_latency_avg_ms,
            upstream_latency_p50_ms,
            upstream_latency_p95_ms,
            ocr_polls_total: self.inner.ocr_polls.load(Ordering::Relaxed),
            pipelines_succeeded: self.inner.pipelines_succeeded.load(Ordering::Relaxed),
            pipelines_failed,
            ocr_avg_ms: self.inner.ocr_duration.avg_ms(),
            detection_avg_ms: self.inner.detection_duration.avg_ms(),
            translation_avg_ms: self.inner.translation_duration.avg_ms(),
            endpoint_requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = String::new();

        out.push_str("# HELP upstream_calls_total Calls made to upstream services\n");
        out.push_str("# TYPE upstream_calls_total counter\n");
        for (service, stats) in &snapshot.upstream_calls {
            let _ = writeln!(
                out,
                "upstream_calls_total{{service=\"{}\",outcome=\"success\"}} {}",
                service, stats.success
            );
            let _ = writeln!(
                out,
                "upstream_calls_total{{service=\"{}\",outcome=\"failed\"}} {}",
                service, stats.failed
            );
        }

        let _ = write!(
            out,
            r#"
# HELP upstream_latency_avg_ms Average upstream latency in milliseconds
# TYPE upstream_latency_avg_ms gauge
upstream_latency_avg_ms {}

# HELP ocr_polls_total Status reads issued for OCR jobs
# TYPE ocr_polls_total counter
ocr_polls_total {}

# HELP pipelines_succeeded_total Pipelines that returned a translation
# TYPE pipelines_succeeded_total counter
pipelines_succeeded_total {}

# HELP stage_avg_duration_ms Average stage duration in milliseconds
# TYPE stage_avg_duration_ms gauge
stage_avg_duration_ms{{stage="ocr"}} {}
stage_avg_duration_ms{{stage="detection"}} {}
stage_avg_duration_ms{{stage="translation"}} {}

# HELP pipelines_failed_total Pipelines that ended in an error
# TYPE pipelines_failed_total counter
"#,
            snapshot.upstream_latency_avg_ms,
            snapshot.ocr_polls_total,
            snapshot.pipelines_succeeded,
            snapshot.ocr_avg_ms,
            snapshot.detection_avg_ms,
            snapshot.translation_avg_ms,
        );
        for (kind, count) in &snapshot.pipelines_failed {
            let _ = writeln!(out, "pipelines_failed_total{{kind=\"{}\"}} {}", kind, count);
        }

        let _ = write!(
            out,
            r#"
# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {}
"#,
            snapshot.uptime_seconds
        );

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStats {
    pub success: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub upstream_calls: BTreeMap<String, CallStats>,
    pub upstream_latency_avg_ms: u64,
    pub upstream_latency_p50_ms: u64,
    pub upstream_latency_p95_ms: u64,
    pub ocr_polls_total: usize,
    pub pipelines_succeeded: usize,
    pub pipelines_failed: BTreeMap<String, usize>,
    pub ocr_avg_ms: u64,
    pub detection_avg_ms: u64,
    pub translation_avg_ms: u64,
    pub endpoint_requests: BTreeMap<String, usize>,
    pub uptime_seconds: u64,
}

impl MetricsSnapshot {
    /// Upstream calls made for one service, successful or not
    pub fn calls_to(&self, service: &str) -> usize {
        self.upstream_calls
            .get(service)
            .map(|stats| stats.success + stats.failed)
            .unwrap_or(0)
    }
}

// Expects `sorted` in ascending order
fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
