//! Gateway service that routes requests to the registered services.
//!
//! Health-check endpoints (`/_localstack/health`, `/_health`, `/health`) are
//! intercepted at the gateway level and report every registered service.
//! Requests no service claims get a `404`.

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use hyper::body::Incoming;
use hyper::service::Service;

use crate::service::{GatewayBody, ServiceRouter, gateway_body_from_string};

/// Gateway that dispatches each request to the first matching service.
#[derive(Clone)]
pub struct GatewayService {
    services: Arc<Vec<Box<dyn ServiceRouter>>>,
}

impl GatewayService {
    /// Create a gateway over `services`, tried in order.
    pub fn new(services: Vec<Box<dyn ServiceRouter>>) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    /// Names of the registered services, in routing order.
    pub fn service_names(&self) -> Vec<&'static str> {
        self.services.iter().map(|s| s.name()).collect()
    }
}

impl fmt::Debug for GatewayService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayService")
            .field("services", &self.service_names())
            .finish()
    }
}

impl Service<http::Request<Incoming>> for GatewayService {
    type Response = http::Response<GatewayBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        if is_health_check(req.method(), req.uri().path()) {
            let response = health_check_response(&self.service_names());
            return Box::pin(async { Ok(response) });
        }

        match self.services.iter().find(|s| s.matches(&req)) {
            Some(router) => router.call(req),
            None => {
                tracing::debug!(method = %req.method(), path = %req.uri().path(), "no service matched request");
                Box::pin(async { Ok(not_found_response()) })
            }
        }
    }
}

/// Check if the request is a health check probe.
fn is_health_check(method: &http::Method, path: &str) -> bool {
    *method == http::Method::GET
        && (path == "/_localstack/health" || path == "/_health" || path == "/health")
}

fn json_response(status: http::StatusCode, body: String) -> http::Response<GatewayBody> {
    let mut response = http::Response::new(gateway_body_from_string(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

/// Produce a combined health check response for all services.
fn health_check_response(names: &[&'static str]) -> http::Response<GatewayBody> {
    let services: serde_json::Map<String, serde_json::Value> = names
        .iter()
        .map(|name| ((*name).to_owned(), serde_json::Value::from("running")))
        .collect();
    let body = serde_json::json!({
        "services": services,
        "version": env!("CARGO_PKG_VERSION"),
    });
    json_response(http::StatusCode::OK, body.to_string())
}

fn not_found_response() -> http::Response<GatewayBody> {
    let body = serde_json::json!({ "message": "No service matched the request" });
    json_response(http::StatusCode::NOT_FOUND, body.to_string())
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn test_should_detect_health_check_paths() {
        assert!(is_health_check(&http::Method::GET, "/_localstack/health"));
        assert!(is_health_check(&http::Method::GET, "/_health"));
        assert!(is_health_check(&http::Method::GET, "/health"));
        assert!(!is_health_check(&http::Method::POST, "/_health"));
        assert!(!is_health_check(&http::Method::GET, "/"));
    }

    #[test]
    fn test_should_report_every_service_as_running() {
        let resp = health_check_response(&["cloudformation"]);
        assert_eq!(resp.status(), http::StatusCode::OK);
        assert_eq!(
            resp.headers()
                .get("Content-Type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json"),
        );
        let bytes = tokio_test::block_on(resp.into_body().collect())
            .unwrap()
            .to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["services"]["cloudformation"], "running");
    }

    #[test]
    fn test_should_answer_unmatched_request_with_not_found() {
        let resp = not_found_response();
        assert_eq!(resp.status(), http::StatusCode::NOT_FOUND);
    }
}
