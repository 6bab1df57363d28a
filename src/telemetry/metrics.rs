//! Derivation metrics
//!
//! Recorded through the `metrics` facade; without an installed recorder the
//! calls are no-ops.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Ticks accepted into minute aggregation
    TicksRead,
    /// Malformed rows dropped
    RowsSkipped,
    /// Malformed tick files skipped
    FilesSkipped,
    /// Bars written to bar files
    BarsWritten,
    /// Bars whose high/low do not bracket open and close
    InconsistentBars,
}

impl CounterMetric {
    pub fn name(&self) -> &'static str {
        match self {
            CounterMetric::TicksRead => "bars_ticks_read_total",
            CounterMetric::RowsSkipped => "bars_rows_skipped_total",
            CounterMetric::FilesSkipped => "bars_files_skipped_total",
            CounterMetric::BarsWritten => "bars_written_total",
            CounterMetric::InconsistentBars => "bars_inconsistent_total",
        }
    }
}

/// Increment a counter, labeled by stream or timeframe
pub fn increment(metric: CounterMetric, label: &'static str, value: u64) {
    if value == 0 {
        return;
    }
    metrics::counter!(metric.name(), "kind" => label).increment(value);
}

/// Record the wall time of one derivation
pub fn record_derive_duration(timeframe: &'static str, outcome: &'static str, duration: Duration) {
    metrics::histogram!(
        "bars_derive_duration_seconds",
        "timeframe" => timeframe,
        "outcome" => outcome
    )
    .record(duration.as_secs_f64());
}

/// Install the Prometheus recorder and serve `/metrics` on `port`
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics exporter: {}", e))?;

    metrics::describe_counter!(
        CounterMetric::TicksRead.name(),
        "Ticks accepted into minute aggregation"
    );
    metrics::describe_counter!(CounterMetric::RowsSkipped.name(), "Malformed tick rows dropped");
    metrics::describe_counter!(
        CounterMetric::FilesSkipped.name(),
        "Malformed tick files skipped"
    );
    metrics::describe_counter!(CounterMetric::BarsWritten.name(), "Bars written");
    metrics::describe_counter!(
        CounterMetric::InconsistentBars.name(),
        "Bars violating OHLC ordering"
    );
    metrics::describe_histogram!(
        "bars_derive_duration_seconds",
        metrics::Unit::Seconds,
        "Wall time of one derivation"
    );

    tracing::info!(%addr, "Prometheus metrics listener started");
    Ok(())
}
