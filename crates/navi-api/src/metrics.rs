//! Prometheus metrics for the API server.
//!
//! Pipeline metrics are emitted by `navi_pipeline::metrics` into the same
//! global recorder, so `/metrics` renders both.

use std::time::Instant;

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder.
///
/// Called once from the binary; a second install panics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "navi_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "navi_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "navi_http_requests_in_flight";

    pub const WS_CONNECTIONS_TOTAL: &str = "navi_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "navi_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "navi_ws_messages_sent_total";
}

/// Label used for requests that matched no route.
const UNMATCHED_ROUTE: &str = "unmatched";

/// Record one finished HTTP request under its route template.
pub fn record_http_request(method: &str, route: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_ws_connection(endpoint: &str) {
    counter!(names::WS_CONNECTIONS_TOTAL, "endpoint" => endpoint.to_string()).increment(1);
}

pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

pub fn record_ws_message_sent(endpoint: &str, message_type: &str) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("type", message_type.to_string()),
    ];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Route template of a request, so per-session paths share one label.
fn route_label(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

/// Count and time every HTTP request.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let route = route_label(&request);
    let start = Instant::now();

    let in_flight = gauge!(names::HTTP_REQUESTS_IN_FLIGHT);
    in_flight.increment(1.0);
    let response = next.run(request).await;
    in_flight.decrement(1.0);

    record_http_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmatched_requests_share_a_label() {
        let request = Request::builder()
            .uri("/cv/summary/ws/abc")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), UNMATCHED_ROUTE);
    }
}
