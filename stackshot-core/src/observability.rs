/*!
Observability for backup and restore runs.

- Structured logging setup for embedders and tests
- Prometheus counters for API calls and transferred resources (`metrics` feature)
*/

#[cfg(feature = "metrics")]
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
#[cfg(feature = "metrics")]
use std::sync::OnceLock;
use tracing::subscriber::set_global_default;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry as TracingRegistry};

use crate::{Result, StackshotError};

/// Which way resources are moving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backup,
    Restore,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Backup => "backup",
            Direction::Restore => "restore",
        }
    }
}

#[cfg(feature = "metrics")]
static METRICS: OnceLock<StackshotMetrics> = OnceLock::new();

/// Metrics collection for Stackshot runs
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct StackshotMetrics {
    pub api_calls_total: IntCounterVec,
    pub api_errors_total: IntCounterVec,
    pub resources_total: IntCounterVec,
    registry: Registry,
}

#[cfg(feature = "metrics")]
impl StackshotMetrics {
    fn new() -> Result<Self> {
        let registry = Registry::new();

        let api_calls_total = IntCounterVec::new(
            Opts::new("stackshot_api_calls_total", "Emulator API calls issued"),
            &["operation"],
        )
        .map_err(|e| StackshotError::storage(format!("Failed to create api_calls_total: {e}")))?;

        let api_errors_total = IntCounterVec::new(
            Opts::new("stackshot_api_errors_total", "Emulator API calls that failed"),
            &["operation"],
        )
        .map_err(|e| StackshotError::storage(format!("Failed to create api_errors_total: {e}")))?;

        let resources_total = IntCounterVec::new(
            Opts::new(
                "stackshot_resources_total",
                "Resources captured or recreated, by kind",
            ),
            &["kind", "direction"],
        )
        .map_err(|e| StackshotError::storage(format!("Failed to create resources_total: {e}")))?;

        for collector in [&api_calls_total, &api_errors_total, &resources_total] {
            registry
                .register(Box::new(collector.clone()))
                .map_err(|e| StackshotError::storage(format!("Failed to register metric: {e}")))?;
        }

        Ok(Self {
            api_calls_total,
            api_errors_total,
            resources_total,
            registry,
        })
    }

    /// Get or initialize the global metrics instance
    pub fn global() -> &'static StackshotMetrics {
        METRICS.get_or_init(|| Self::new().expect("Failed to initialize Stackshot metrics"))
    }

    /// Gather metrics in Prometheus text format
    pub fn gather_metrics(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| StackshotError::storage(format!("Failed to encode metrics: {e}")))?;

        String::from_utf8(buffer)
            .map_err(|e| StackshotError::storage(format!("Failed to convert metrics to string: {e}")))
    }
}

/// Count one emulator API call
pub fn record_api_call(operation: &str, success: bool) {
    #[cfg(feature = "metrics")]
    {
        let metrics = StackshotMetrics::global();
        metrics.api_calls_total.with_label_values(&[operation]).inc();
        if !success {
            metrics.api_errors_total.with_label_values(&[operation]).inc();
        }
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (operation, success);
}

/// Count resources of `kind` moved in `direction`
pub fn record_resources(kind: &str, direction: Direction, count: usize) {
    #[cfg(feature = "metrics")]
    StackshotMetrics::global()
        .resources_total
        .with_label_values(&[kind, direction.as_str()])
        .inc_by(count as u64);
    #[cfg(not(feature = "metrics"))]
    let _ = (kind, direction, count);
}

/// Install a global tracing subscriber
///
/// `RUST_LOG` is honored; without it the crate logs at `info`. With `json`
/// set, events are emitted as one JSON object per line.
pub fn init_observability(json: bool) -> Result<()> {
    #[cfg(feature = "metrics")]
    StackshotMetrics::global();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if json {
        let subscriber = TracingRegistry::default().with(filter).with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_current_span(false),
        );
        set_global_default(subscriber)
    } else {
        let subscriber = TracingRegistry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false));
        set_global_default(subscriber)
    };

    result.map_err(|e| {
        StackshotError::storage(format!("Failed to set global tracing subscriber: {e}"))
    })?;

    tracing::debug!("Stackshot observability initialized");
    Ok(())
}

/// Initialize observability with plain-text output
pub fn init_default_observability() -> Result<()> {
    init_observability(false)
}
