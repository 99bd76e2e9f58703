use axum::body::Body;
use axum::extract::{MatchedPath, RawPathParams};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Records `http_requests_total` and `http_request_duration_seconds`,
/// labelled by the matched route template so path parameters such as a
/// peer identity don't explode label cardinality. The store side a request
/// addressed is its own label.
pub async fn metrics_middleware(
    matched_path: Option<MatchedPath>,
    params: Option<RawPathParams>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let side = params.as_ref().map_or("none", |p| side_label(p.iter()));

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    let labels = [
        ("method", method),
        ("path", path),
        ("side", side.to_string()),
        ("status", status),
    ];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration);

    response
}

/// Only the two known sides become label values.
fn side_label<'a>(mut params: impl Iterator<Item = (&'a str, &'a str)>) -> &'static str {
    match params.find(|(name, _)| *name == "side").map(|(_, value)| value) {
        Some("visitor") => "visitor",
        Some("operator") => "operator",
        _ => "none",
    }
}

pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}
