//! Metrics collection
//!
//! Prometheus-compatible counters for the coordination loops, the write
//! path and replication, plus per-endpoint latency histograms.

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 11] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // stored as microseconds
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Cumulative `(le, count)` pairs, ending with `+Inf`
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, v: u64) {
        self.value.store(v, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Endpoint metrics
#[derive(Debug, Default)]
pub struct EndpointMetrics {
    pub requests_total: Counter,
    pub requests_error: Counter,
    pub latency: Histogram,
}

/// Metrics registry, one per node
#[derive(Debug)]
pub struct MetricsRegistry {
    endpoints: Mutex<HashMap<String, Arc<EndpointMetrics>>>,

    // Liveness
    pub probes_ok: Counter,
    pub probes_failed: Counter,
    pub alive_peers: Gauge,

    // Leadership
    pub leader_changes: Counter,
    pub current_leader: Gauge,
    pub is_leader: Gauge,

    // Write path
    pub writes_accepted: Counter,
    pub writes_redirected: Counter,
    pub writes_no_leader: Counter,

    // Replication
    pub replications_sent: Counter,
    pub replications_failed: Counter,
    pub replications_applied: Counter,

    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            endpoints: Mutex::new(HashMap::new()),
            probes_ok: Counter::new(),
            probes_failed: Counter::new(),
            alive_peers: Gauge::new(),
            leader_changes: Counter::new(),
            current_leader: Gauge::new(),
            is_leader: Gauge::new(),
            writes_accepted: Counter::new(),
            writes_redirected: Counter::new(),
            writes_no_leader: Counter::new(),
            replications_sent: Counter::new(),
            replications_failed: Counter::new(),
            replications_applied: Counter::new(),
            start_time: Instant::now(),
        }
    }

    /// Get or create metrics for an endpoint
    pub fn endpoint(&self, path: &str) -> Arc<EndpointMetrics> {
        let mut endpoints = self
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        endpoints
            .entry(path.to_string())
            .or_default()
            .clone()
    }

    pub fn record_request(&self, path: &str, duration: Duration, success: bool) {
        let endpoint = self.endpoint(path);
        endpoint.requests_total.inc();
        endpoint.latency.observe(duration.as_secs_f64() * 1000.0);
        if !success {
            endpoint.requests_error.inc();
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Render in the Prometheus text exposition format
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let counters = [
            ("beaconkv_probes_ok_total", "Successful liveness probes", &self.probes_ok),
            ("beaconkv_probes_failed_total", "Failed liveness probes", &self.probes_failed),
            ("beaconkv_leader_changes_total", "Observed leadership changes", &self.leader_changes),
            ("beaconkv_writes_accepted_total", "Client writes applied as leader", &self.writes_accepted),
            ("beaconkv_writes_redirected_total", "Client writes redirected to the leader", &self.writes_redirected),
            ("beaconkv_writes_no_leader_total", "Client writes rejected with no known leader", &self.writes_no_leader),
            ("beaconkv_replications_sent_total", "Replication messages dispatched", &self.replications_sent),
            ("beaconkv_replications_failed_total", "Replication deliveries that failed", &self.replications_failed),
            ("beaconkv_replications_applied_total", "Inbound replicated writes applied", &self.replications_applied),
        ];
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }

        let gauges = [
            ("beaconkv_alive_peers", "Peers currently within the staleness threshold", self.alive_peers.get()),
            ("beaconkv_current_leader", "Believed leader id (0 when unknown)", self.current_leader.get()),
            ("beaconkv_is_leader", "1 when this node believes it is leader", self.is_leader.get()),
            ("beaconkv_uptime_seconds", "Server uptime in seconds", self.uptime_seconds()),
        ];
        for (name, help, value) in gauges {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} gauge", name);
            let _ = writeln!(out, "{} {}", name, value);
        }

        let endpoints = self
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut paths: Vec<_> = endpoints.keys().cloned().collect();
        paths.sort();

        out.push_str("# HELP beaconkv_endpoint_requests_total Requests per endpoint\n");
        out.push_str("# TYPE beaconkv_endpoint_requests_total counter\n");
        for path in &paths {
            let _ = writeln!(
                out,
                "beaconkv_endpoint_requests_total{{path=\"{}\"}} {}",
                path,
                endpoints[path].requests_total.get()
            );
        }

        out.push_str("# HELP beaconkv_endpoint_errors_total Errors per endpoint\n");
        out.push_str("# TYPE beaconkv_endpoint_errors_total counter\n");
        for path in &paths {
            let _ = writeln!(
                out,
                "beaconkv_endpoint_errors_total{{path=\"{}\"}} {}",
                path,
                endpoints[path].requests_error.get()
            );
        }

        out.push_str("# HELP beaconkv_request_duration_ms Request duration in milliseconds\n");
        out.push_str("# TYPE beaconkv_request_duration_ms histogram\n");
        for path in &paths {
            let metrics = &endpoints[path];
            for (le, count) in metrics.latency.get_buckets() {
                let le = if le.is_infinite() {
                    "+Inf".to_string()
                } else {
                    le.to_string()
                };
                let _ = writeln!(
                    out,
                    "beaconkv_request_duration_ms_bucket{{path=\"{}\",le=\"{}\"}} {}",
                    path, le, count
                );
            }
            let _ = writeln!(
                out,
                "beaconkv_request_duration_ms_sum{{path=\"{}\"}} {}",
                path,
                metrics.latency.sum()
            );
            let _ = writeln!(
                out,
                "beaconkv_request_duration_ms_count{{path=\"{}\"}} {}",
                path,
                metrics.latency.count()
            );
        }

        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
