//! Logging and metrics setup.
//!
//! Logs go through `tracing`, to the console and optionally to a rotating
//! JSON file; metrics go through the `metrics` facade backed by
//! a Prometheus recorder. Every endpoint, metadata query and object-store
//! operation reports a counter labelled with its outcome plus a duration
//! histogram.

use crate::config::{LogFileConfig, LogFormat};
use anyhow::{Context, Result, anyhow};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::{
    future::Future,
    net::SocketAddr,
    sync::OnceLock,
    time::{Duration, Instant},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_rolling_file::{RollingConditionBase, RollingFileAppender};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

// -- Metric names -------------------------------------------------------------

/// Endpoint invocations (counter). Labels: api, outcome.
pub const API_CALLS_TOTAL: &str = "webapp_api_calls_total";

/// Endpoint latency in seconds (histogram). Labels: api.
pub const API_DURATION_SECONDS: &str = "webapp_api_duration_seconds";

/// Metadata store queries (counter). Labels: query, outcome.
pub const DB_QUERIES_TOTAL: &str = "webapp_db_queries_total";

/// Metadata store query latency in seconds (histogram). Labels: query.
pub const DB_QUERY_DURATION_SECONDS: &str = "webapp_db_query_duration_seconds";

/// Object store operations (counter). Labels: operation, outcome.
pub const OBJECT_STORE_OPS_TOTAL: &str = "webapp_object_store_ops_total";

/// Object store latency in seconds (histogram). Labels: operation.
pub const OBJECT_STORE_OP_DURATION_SECONDS: &str = "webapp_object_store_op_duration_seconds";

// -- Tracing ------------------------------------------------------------------

/// Keeps the background log-file writer alive. Dropping it flushes the file.
pub struct LogGuard(Option<WorkerGuard>);

/// Install the global `tracing` subscriber. `RUST_LOG` wins over the `info`
/// default.
///
/// The console sink uses `format`. When `log_file` is set, JSON lines also go
/// to a size-rotated file through a non-blocking writer.
pub fn init_tracing(
    format: LogFormat,
    log_file: Option<&LogFileConfig>,
    console: bool,
) -> Result<LogGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if console {
        layers.push(match format {
            LogFormat::Json => fmt::layer().json().with_current_span(false).boxed(),
            LogFormat::Pretty => fmt::layer().boxed(),
        });
    }

    let mut guard = None;
    if let Some(cfg) = log_file {
        let (writer, worker) = tracing_appender::non_blocking(rolling_file_writer(cfg)?);
        layers.push(
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_ansi(false)
                .with_writer(writer)
                .boxed(),
        );
        guard = Some(worker);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|err| anyhow!("installing tracing subscriber: {err}"))?;

    Ok(LogGuard(guard))
}

/// Open the size-rotated log file, creating its directory if needed.
pub fn rolling_file_writer(
    cfg: &LogFileConfig,
) -> Result<RollingFileAppender<RollingConditionBase>> {
    if let Some(parent) = cfg.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
    }

    RollingFileAppender::new(
        &cfg.path,
        RollingConditionBase::new().max_size(cfg.max_size_mb * 1024 * 1024),
        cfg.max_files,
    )
    .with_context(|| format!("opening log file {}", cfg.path.display()))
}

// -- Metrics recorder ---------------------------------------------------------

static PROMETHEUS_HANDLE: OnceLock<Result<PrometheusHandle, String>> = OnceLock::new();

/// Install the global recorder, serving Prometheus text on `listen` when given.
///
/// Without a listener the recorder still collects in-process; see
/// [`prometheus_handle`].
pub fn init_metrics(listen: Option<SocketAddr>) -> Result<()> {
    match listen {
        Some(addr) => {
            PrometheusBuilder::new()
                .with_http_listener(addr)
                .install()
                .with_context(|| format!("installing Prometheus exporter on {addr}"))?;
            tracing::info!(%addr, "serving Prometheus metrics");
        }
        None => {
            prometheus_handle()?;
        }
    }
    describe_metrics();
    Ok(())
}

/// In-process recorder handle. Idempotent, so tests may call it freely.
pub fn prometheus_handle() -> Result<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .map_err(|err| err.to_string())
        })
        .as_ref()
        .map_err(|err| anyhow!("installing Prometheus recorder: {err}"))
}

fn describe_metrics() {
    describe_counter!(API_CALLS_TOTAL, "Endpoint invocations by outcome");
    describe_histogram!(API_DURATION_SECONDS, "Endpoint latency in seconds");
    describe_counter!(DB_QUERIES_TOTAL, "Metadata store queries by outcome");
    describe_histogram!(DB_QUERY_DURATION_SECONDS, "Metadata store latency in seconds");
    describe_counter!(OBJECT_STORE_OPS_TOTAL, "Object store operations by outcome");
    describe_histogram!(
        OBJECT_STORE_OP_DURATION_SECONDS,
        "Object store latency in seconds"
    );
}

// -- Recording helpers --------------------------------------------------------

/// Record one endpoint invocation, including rejected ones.
pub fn record_api_call(api: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!(API_CALLS_TOTAL, "api" => api, "outcome" => outcome).increment(1);
    histogram!(API_DURATION_SECONDS, "api" => api).record(elapsed.as_secs_f64());
}

/// Await a metadata query and record its outcome and latency.
pub async fn track_db_query<T, E, F>(query: &'static str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = fut.await;
    let elapsed = start.elapsed();
    counter!(DB_QUERIES_TOTAL, "query" => query, "outcome" => outcome_of(&result)).increment(1);
    histogram!(DB_QUERY_DURATION_SECONDS, "query" => query).record(elapsed.as_secs_f64());
    result
}

/// Await an object-store operation and record its outcome and latency.
pub async fn track_object_store_op<T, E, F>(operation: &'static str, fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = fut.await;
    let elapsed = start.elapsed();
    counter!(OBJECT_STORE_OPS_TOTAL, "operation" => operation, "outcome" => outcome_of(&result))
        .increment(1);
    histogram!(OBJECT_STORE_OP_DURATION_SECONDS, "operation" => operation)
        .record(elapsed.as_secs_f64());
    result
}

fn outcome_of<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}

/// Milliseconds for log fields.
pub fn millis(elapsed: Duration) -> u64 {
    elapsed.as_millis().try_into().unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracked_operations_show_up_in_exposition() {
        let handle = prometheus_handle().unwrap();

        let ok: Result<u8, ()> = track_db_query("unit_probe", async { Ok(1) }).await;
        assert_eq!(ok, Ok(1));
        let err: Result<(), &str> =
            track_object_store_op("unit_probe_put", async { Err("down") }).await;
        assert!(err.is_err());
        record_api_call("unit_probe_api", "invalid_method", Duration::from_millis(3));

        let rendered = handle.render();
        assert!(rendered.contains(r#"query="unit_probe",outcome="success""#)
            || rendered.contains(r#"outcome="success",query="unit_probe""#));
        assert!(rendered.contains("unit_probe_put"));
        assert!(rendered.contains("unit_probe_api"));
    }

    #[test]
    fn log_file_directory_is_created() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let cfg = LogFileConfig {
            path: dir.path().join("logs").join("file-service.log"),
            max_size_mb: 5,
            max_files: 5,
        };

        let mut writer = rolling_file_writer(&cfg).unwrap();
        writer.write_all(b"{\"msg\":\"hello\"}\n").unwrap();
        writer.flush().unwrap();

        let written = std::fs::read_to_string(&cfg.path).unwrap();
        assert!(written.contains("hello"));
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(1500)), 1500);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
