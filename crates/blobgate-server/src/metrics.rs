//! Prometheus metrics registry, served by the HTTP sidecar's `/metrics`
//! endpoint. One process-wide registry, reachable via [`Metrics::global`].

use std::sync::OnceLock;

use prometheus::{Encoder, HistogramVec, IntCounterVec, IntGauge, Registry, TextEncoder};

static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Process-wide counters and histograms. Construction registers every metric
/// with its own `Registry`; `render()` encodes the current snapshot in the
/// Prometheus text exposition format.
pub struct Metrics {
    registry: Registry,
    pub requests_total: IntCounterVec,
    pub request_duration_seconds: HistogramVec,
    pub router_outcomes_total: IntCounterVec,
    pub in_flight_operations: IntGauge,
    pub replica_transport_errors_total: IntCounterVec,
}

impl Metrics {
    fn new() -> Self {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            prometheus::Opts::new("blobgate_requests_total", "Requests handled, by method and status"),
            &["method", "status"],
        )
        .expect("metric names and labels are valid");
        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "blobgate_request_duration_seconds",
                "End-to-end request latency, by method",
            ),
            &["method"],
        )
        .expect("metric names and labels are valid");
        let router_outcomes_total = IntCounterVec::new(
            prometheus::Opts::new(
                "blobgate_router_outcomes_total",
                "Router-level outcomes, by resolved error code (or \"Success\")",
            ),
            &["code"],
        )
        .expect("metric names and labels are valid");
        let in_flight_operations = IntGauge::new(
            "blobgate_in_flight_operations",
            "Router operations currently in flight",
        )
        .expect("metric name is valid");
        let replica_transport_errors_total = IntCounterVec::new(
            prometheus::Opts::new(
                "blobgate_replica_transport_errors_total",
                "Transport-level failures reaching a replica, by datanode",
            ),
            &["datanode"],
        )
        .expect("metric names and labels are valid");

        registry.register(Box::new(requests_total.clone())).expect("unique metric name");
        registry
            .register(Box::new(request_duration_seconds.clone()))
            .expect("unique metric name");
        registry
            .register(Box::new(router_outcomes_total.clone()))
            .expect("unique metric name");
        registry
            .register(Box::new(in_flight_operations.clone()))
            .expect("unique metric name");
        registry
            .register(Box::new(replica_transport_errors_total.clone()))
            .expect("unique metric name");

        Self {
            registry,
            requests_total,
            request_duration_seconds,
            router_outcomes_total,
            in_flight_operations,
            replica_transport_errors_total,
        }
    }

    /// The process-wide registry, lazily constructed on first use.
    pub fn global() -> &'static Metrics {
        METRICS.get_or_init(Metrics::new)
    }

    /// Renders the current snapshot in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf).expect("prometheus text encoding never fails");
        String::from_utf8(buf).expect("prometheus text encoder always emits utf-8")
    }
}
