//! Prometheus metrics for the alert configuration stores
//!
//! Tracks per-operation outcomes and latency, plus compare-and-swap
//! conflicts, which are an expected control-flow signal worth watching on
//! their own.

use prometheus::{CounterVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use crate::Result;

/// Metrics collector for an alert configuration store
#[derive(Clone)]
pub struct StoreMetrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Operations by name and outcome
    pub operations_total: CounterVec,
    /// Operation duration
    pub operation_duration_seconds: HistogramVec,
    /// Compare-and-swap updates rejected because the tip moved
    pub cas_conflicts_total: IntCounter,
}

impl StoreMetrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let operations_total = CounterVec::new(
            Opts::new(
                "amconfig_operations_total",
                "Total number of alert configuration store operations",
            ),
            &["operation", "status"],
        )?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "amconfig_operation_duration_seconds",
                "Alert configuration store operation duration in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["operation"],
        )?;

        let cas_conflicts_total = IntCounter::new(
            "amconfig_cas_conflicts_total",
            "Total number of compare-and-swap updates rejected with a stale hash",
        )?;

        registry.register(Box::new(operations_total.clone()))?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;
        registry.register(Box::new(cas_conflicts_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            operations_total,
            operation_duration_seconds,
            cas_conflicts_total,
        })
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Gather all metric families
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Record the outcome of one store operation
    pub fn record<T>(&self, operation: &str, started: Instant, result: &Result<T>) {
        let status = match result {
            Ok(_) => "ok",
            Err(e) if e.is_not_found() => "not_found",
            Err(e) if e.is_conflict() => "conflict",
            Err(_) => "error",
        };

        if let Err(e) = result
            && e.is_conflict()
        {
            self.cas_conflicts_total.inc();
        }

        self.operations_total
            .with_label_values(&[operation, status])
            .inc();
        self.operation_duration_seconds
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
    }
}
