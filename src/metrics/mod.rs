use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::info;

/// Metrics for the exchange core: submission and trade counters plus latency
/// of the two consumer-side operations. Atomics mirror the `metrics` registry
/// so in-process readers (the reporter, tests) work without a recorder
/// installed.
#[derive(Debug)]
pub struct EngineMetrics {
    execute_latency: LatencyTracker,
    cancel_latency: LatencyTracker,

    orders_submitted: AtomicU64,
    orders_rejected: AtomicU64,
    orders_canceled: AtomicU64,
    trades_executed: AtomicU64,

    total_volume: AtomicU64,
    total_notional: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        describe_counter!("exchange_orders_total", "Order submissions by outcome");
        describe_counter!("exchange_trades_total", "Fills generated by matching");
        describe_counter!("exchange_volume_total", "Units traded");
        describe_counter!("exchange_notional_total", "Cents traded");
        describe_gauge!("exchange_queue_depth", "Submissions waiting in the pipeline");
        describe_histogram!(
            "exchange_operation_duration_seconds",
            "Duration of consumer-side operations"
        );

        Self {
            execute_latency: LatencyTracker::new("execute"),
            cancel_latency: LatencyTracker::new("cancel"),
            orders_submitted: AtomicU64::new(0),
            orders_rejected: AtomicU64::new(0),
            orders_canceled: AtomicU64::new(0),
            trades_executed: AtomicU64::new(0),
            total_volume: AtomicU64::new(0),
            total_notional: AtomicU64::new(0),
        }
    }

    pub fn time_execute<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.execute_latency.time(f)
    }

    pub fn time_cancel<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.cancel_latency.time(f)
    }

    pub fn increment_orders_submitted(&self) {
        self.orders_submitted.fetch_add(1, Ordering::Relaxed);
        counter!("exchange_orders_total", "outcome" => "accepted").increment(1);
    }

    pub fn increment_orders_rejected(&self) {
        self.orders_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("exchange_orders_total", "outcome" => "rejected").increment(1);
    }

    pub fn increment_orders_canceled(&self) {
        self.orders_canceled.fetch_add(1, Ordering::Relaxed);
        counter!("exchange_orders_total", "outcome" => "canceled").increment(1);
    }

    pub fn increment_trades_executed(&self, volume: u64, notional: u64) {
        self.trades_executed.fetch_add(1, Ordering::Relaxed);
        self.total_volume.fetch_add(volume, Ordering::Relaxed);
        self.total_notional.fetch_add(notional, Ordering::Relaxed);

        counter!("exchange_trades_total").increment(1);
        counter!("exchange_volume_total").increment(volume);
        counter!("exchange_notional_total").increment(notional);
    }

    pub fn set_queue_depth(&self, depth: usize) {
        gauge!("exchange_queue_depth").set(depth as f64);
    }

    pub fn orders_submitted(&self) -> u64 {
        self.orders_submitted.load(Ordering::Relaxed)
    }

    pub fn orders_rejected(&self) -> u64 {
        self.orders_rejected.load(Ordering::Relaxed)
    }

    pub fn orders_canceled(&self) -> u64 {
        self.orders_canceled.load(Ordering::Relaxed)
    }

    pub fn trades_executed(&self) -> u64 {
        self.trades_executed.load(Ordering::Relaxed)
    }

    pub fn total_volume(&self) -> u64 {
        self.total_volume.load(Ordering::Relaxed)
    }

    pub fn total_notional(&self) -> u64 {
        self.total_notional.load(Ordering::Relaxed)
    }

    pub fn execute_latency(&self) -> OperationLatencyStats {
        self.execute_latency.stats()
    }

    pub fn cancel_latency(&self) -> OperationLatencyStats {
        self.cancel_latency.stats()
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency tracker for one operation.
#[derive(Debug)]
struct LatencyTracker {
    operation: &'static str,
    samples: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl LatencyTracker {
    fn new(operation: &'static str) -> Self {
        Self {
            operation,
            samples: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }

    fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(start.elapsed());
        result
    }

    fn record(&self, duration: Duration) {
        let nanos = duration.as_nanos() as u64;
        self.samples.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);

        histogram!("exchange_operation_duration_seconds", "operation" => self.operation)
            .record(duration.as_secs_f64());
    }

    fn stats(&self) -> OperationLatencyStats {
        let samples = self.samples.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        let min = self.min_nanos.load(Ordering::Relaxed);

        OperationLatencyStats {
            operation: self.operation,
            samples,
            avg_nanos: if samples > 0 { total / samples } else { 0 },
            min_nanos: if min == u64::MAX { 0 } else { min },
            max_nanos: self.max_nanos.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OperationLatencyStats {
    pub operation: &'static str,
    pub samples: u64,
    pub avg_nanos: u64,
    pub min_nanos: u64,
    pub max_nanos: u64,
}

impl OperationLatencyStats {
    pub fn avg_micros(&self) -> f64 {
        self.avg_nanos as f64 / 1_000.0
    }
}

/// Background reporter that logs a one-line summary on an interval.
pub struct MetricsReporter {
    metrics: Arc<EngineMetrics>,
    interval: Duration,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<EngineMetrics>, interval: Duration) -> Self {
        Self { metrics, interval }
    }

    pub async fn run(&self) {
        let mut interval = interval(self.interval);

        loop {
            interval.tick().await;

            let execute = self.metrics.execute_latency();
            info!(
                "Exchange Metrics - Orders: +{} !{} x{} | Trades: {} ({} units, {} cents) | execute avg {:.2}us",
                self.metrics.orders_submitted(),
                self.metrics.orders_rejected(),
                self.metrics.orders_canceled(),
                self.metrics.trades_executed(),
                self.metrics.total_volume(),
                self.metrics.total_notional(),
                execute.avg_micros(),
            );
        }
    }
}
