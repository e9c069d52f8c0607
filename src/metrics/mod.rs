/// Prometheus metrics for the ingest service.
///
/// Covers HTTP traffic and the pipeline counters (`messages.sent`,
/// `messages.send_failed`, `messages.consumed`, `messages.consume_failed`).
/// Channel-level metrics live in [`crate::messaging`] and are registered in
/// the default registry; [`gather_metrics`] exposes both.
///
/// # Example
/// ```no_run
/// use message_ingest::metrics::{init_metrics, PrometheusCounter};
/// use message_ingest::ingest::Counter;
///
/// init_metrics().unwrap();
/// PrometheusCounter::new().increment("messages.sent");
/// ```

mod middleware;

pub use middleware::{MetricsLayer, MetricsService};

use crate::ingest::Counter;
use lazy_static::lazy_static;
use prometheus::{CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry};

lazy_static! {
    /// Registry for the service's own metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Pipeline events by counter name
    ///
    /// Labels: name
    pub static ref PIPELINE_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("pipeline_events_total", "Pipeline events by counter name")
            .namespace("message_ingest"),
        &["name"]
    ).expect("Failed to create PIPELINE_EVENTS_TOTAL metric");

    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace("message_ingest"),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace("message_ingest")
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    pub static ref HTTP_CONNECTIONS_ACTIVE: Gauge = Gauge::with_opts(
        Opts::new("http_connections_active", "Requests currently in flight")
            .namespace("message_ingest")
    ).expect("Failed to create HTTP_CONNECTIONS_ACTIVE metric");

    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace("message_ingest"),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Register the service metrics. Safe to call more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    register(Box::new(PIPELINE_EVENTS_TOTAL.clone()))?;
    register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))?;
    register(Box::new(HTTP_CONNECTIONS_ACTIVE.clone()))?;
    register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    crate::messaging::init_channel_metrics();

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> Result<(), prometheus::Error> {
    match PROMETHEUS_REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Text exposition of the service registry followed by the channel metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut metric_families = PROMETHEUS_REGISTRY.gather();
    metric_families.extend(prometheus::gather());
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

/// [`Counter`] backed by [`PIPELINE_EVENTS_TOTAL`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusCounter;

impl PrometheusCounter {
    pub fn new() -> Self {
        Self
    }
}

impl Counter for PrometheusCounter {
    fn increment(&self, name: &str) {
        PIPELINE_EVENTS_TOTAL.with_label_values(&[name]).inc();
    }
}
