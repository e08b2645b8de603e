use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;
use tracing::{error, info};

/// Metric name prefix for all rally metrics
const PREFIX: &str = "rally";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Auth
    pub static ref AUTH_LOGIN_ATTEMPTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_auth_login_attempts_total"), "Total login attempts"),
        &["status"]
    ).expect("Failed to create auth_login_attempts_total metric");

    pub static ref AUTH_LOGIN_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_auth_login_duration_seconds"),
            "Login request duration in seconds"
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0])
    ).expect("Failed to create auth_login_duration_seconds metric");

    // Events
    pub static ref RSVPS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_rsvps_total"), "RSVP submissions by outcome"),
        &["outcome"]
    ).expect("Failed to create rsvps_total metric");

    pub static ref CHECK_INS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_check_ins_total"), "Check-in attempts by outcome"),
        &["outcome"]
    ).expect("Failed to create check_ins_total metric");

    pub static ref SUBSCRIPTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_subscriptions_total"), "Newsletter sign-ups by outcome"),
        &["outcome"]
    ).expect("Failed to create subscriptions_total metric");

    // Analytics
    pub static ref PAGE_VIEWS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_page_views_total"), "Page view beacons received"),
        &["device_type"]
    ).expect("Failed to create page_views_total metric");

    pub static ref FORM_EVENTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_form_events_total"), "Form funnel events received"),
        &["event_type"]
    ).expect("Failed to create form_events_total metric");

    pub static ref ANALYTICS_ROWS_PRUNED_TOTAL: prometheus::Counter = prometheus::Counter::new(
        format!("{PREFIX}_analytics_rows_pruned_total"),
        "Analytics rows deleted by retention"
    ).expect("Failed to create analytics_rows_pruned_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Already registered errors are ignored, tests init more than once.
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_ATTEMPTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(AUTH_LOGIN_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(RSVPS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CHECK_INS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(SUBSCRIPTIONS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PAGE_VIEWS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FORM_EVENTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ANALYTICS_ROWS_PRUNED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    info!("Metrics system initialized successfully");
}

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_login_attempt(status: &str, duration: Duration) {
    AUTH_LOGIN_ATTEMPTS_TOTAL.with_label_values(&[status]).inc();
    AUTH_LOGIN_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn record_rsvp(outcome: &str) {
    RSVPS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_check_in(outcome: &str) {
    CHECK_INS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_subscription(outcome: &str) {
    SUBSCRIPTIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn record_page_view(device_type: &str) {
    PAGE_VIEWS_TOTAL.with_label_values(&[device_type]).inc();
}

pub fn record_form_event(event_type: &str) {
    FORM_EVENTS_TOTAL.with_label_values(&[event_type]).inc();
}

pub fn record_analytics_pruned(rows: usize) {
    ANALYTICS_ROWS_PRUNED_TOTAL.inc_by(rows as f64);
}

pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            let rss_kb = status
                .lines()
                .find(|line| line.starts_with("VmRSS:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<f64>().ok());
            if let Some(kb) = rss_kb {
                PROCESS_MEMORY_BYTES.set(kb * 1024.0);
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}
