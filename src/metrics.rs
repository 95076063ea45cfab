//! Prometheus metrics for the HTTP service

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

pub struct Metrics {
    registry: Registry,
    pub http_requests_total: IntCounter,
    pub http_request_duration_seconds: Histogram,
    pub http_requests_in_flight: IntGauge,
    pub database_connected: Gauge,
    pub dashboard_cache_hits_total: IntCounter,
    pub dashboard_cache_misses_total: IntCounter,
    pub charts_rendered_total: IntCounter,
    /// Labelled by failure cause (`timeout`, `quota`, ...).
    pub summary_failures_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total =
            IntCounter::new("http_requests_total", "Total number of HTTP requests")?;
        let http_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ))?;
        let http_requests_in_flight = IntGauge::new(
            "http_requests_in_flight",
            "Number of HTTP requests currently being served",
        )?;
        let database_connected = Gauge::new(
            "database_connected",
            "Whether the earnings database is connected (1) or not (0)",
        )?;
        let dashboard_cache_hits_total = IntCounter::new(
            "dashboard_cache_hits_total",
            "Dashboard responses served from cache",
        )?;
        let dashboard_cache_misses_total = IntCounter::new(
            "dashboard_cache_misses_total",
            "Dashboard responses rebuilt from the database",
        )?;
        let charts_rendered_total =
            IntCounter::new("charts_rendered_total", "EPS charts rendered to disk")?;
        let summary_failures_total = IntCounterVec::new(
            Opts::new(
                "summary_failures_total",
                "Narrative summary requests that fell back to the placeholder",
            ),
            &["cause"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_in_flight.clone()))?;
        registry.register(Box::new(database_connected.clone()))?;
        registry.register(Box::new(dashboard_cache_hits_total.clone()))?;
        registry.register(Box::new(dashboard_cache_misses_total.clone()))?;
        registry.register(Box::new(charts_rendered_total.clone()))?;
        registry.register(Box::new(summary_failures_total.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            http_requests_in_flight,
            database_connected,
            dashboard_cache_hits_total,
            dashboard_cache_misses_total,
            charts_rendered_total,
            summary_failures_total,
        })
    }

    /// Render all metrics in the Prometheus text format.
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
