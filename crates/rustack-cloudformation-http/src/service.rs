//! CloudFormation HTTP service implementing the hyper `Service` trait.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;

use rustack_cloudformation_model::error::CloudFormationError;
use rustack_core::{AccountId, AwsRegion};

use crate::body::CloudFormationResponseBody;
use crate::dispatch::{CloudFormationHandler, RequestContext, dispatch_operation};
use crate::request::QueryParams;
use crate::response::{CONTENT_TYPE, error_to_response};
use crate::router::resolve_operation;

/// Configuration for the CloudFormation HTTP service.
#[derive(Debug, Clone, Default)]
pub struct CloudFormationHttpConfig {
    /// Region used when the request carries no SigV4 credential scope.
    pub default_region: AwsRegion,
    /// Account every request is attributed to.
    pub default_account: AccountId,
}

impl CloudFormationHttpConfig {
    /// Resolve the target region from request headers.
    #[must_use]
    pub fn region_for(&self, headers: &http::HeaderMap) -> AwsRegion {
        headers
            .get(http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(AwsRegion::from_authorization)
            .unwrap_or_else(|| self.default_region.clone())
    }
}

/// Hyper `Service` implementation for CloudFormation.
///
/// Wraps a [`CloudFormationHandler`] implementation and routes incoming
/// `awsQuery` requests to the operation named by their `Action` parameter.
#[derive(Debug)]
pub struct CloudFormationHttpService<H: CloudFormationHandler> {
    handler: Arc<H>,
    config: Arc<CloudFormationHttpConfig>,
}

impl<H: CloudFormationHandler> CloudFormationHttpService<H> {
    /// Create a new `CloudFormationHttpService`.
    pub fn new(handler: Arc<H>, config: CloudFormationHttpConfig) -> Self {
        Self {
            handler,
            config: Arc::new(config),
        }
    }
}

impl<H: CloudFormationHandler> Clone for CloudFormationHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: CloudFormationHandler> hyper::service::Service<http::Request<Incoming>>
    for CloudFormationHttpService<H>
{
    type Response = http::Response<CloudFormationResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<Incoming>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let config = Arc::clone(&self.config);
        let request_id = uuid::Uuid::new_v4().to_string();

        Box::pin(async move {
            let (parts, incoming) = req.into_parts();
            let response = match collect_body(incoming).await {
                Ok(body) => {
                    process_request(&parts, &body, handler.as_ref(), &config, &request_id).await
                }
                Err(err) => error_to_response(&err, &request_id),
            };
            Ok(add_common_headers(response, &request_id))
        })
    }
}

/// Process a single CloudFormation request through the full pipeline.
///
/// Split from [`hyper::service::Service::call`] so it can be driven with a
/// buffered body.
pub async fn process_request<H: CloudFormationHandler>(
    parts: &http::request::Parts,
    body: &[u8],
    handler: &H,
    config: &CloudFormationHttpConfig,
    request_id: &str,
) -> http::Response<CloudFormationResponseBody> {
    // 1. awsQuery is POST only.
    if parts.method != http::Method::POST {
        let err = CloudFormationError::validation(format!(
            "CloudFormation requires POST method, got {}",
            parts.method,
        ));
        return error_to_response(&err, request_id);
    }

    // 2. Decode form parameters; query string values fill in gaps.
    let mut params = QueryParams::parse(body);
    if let Some(query) = parts.uri.query() {
        params.merge_query(query);
    }

    // 3. Route on the Action parameter.
    let op = match resolve_operation(&params) {
        Ok(op) => op,
        Err(err) => return error_to_response(&err, request_id),
    };

    let ctx = RequestContext {
        region: config.region_for(&parts.headers),
        account: config.default_account.clone(),
        request_id: request_id.to_owned(),
    };

    // 4. Dispatch to handler.
    match dispatch_operation(handler, op, params, ctx).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(operation = %op, code = %err.code, message = %err.message, "CloudFormation operation failed");
            error_to_response(&err, request_id)
        }
    }
}

/// Collect the incoming body into a single `Bytes` buffer.
async fn collect_body(incoming: Incoming) -> Result<Bytes, CloudFormationError> {
    incoming
        .collect()
        .await
        .map(http_body_util::Collected::to_bytes)
        .map_err(|e| {
            CloudFormationError::internal_error(format!("Failed to read request body: {e}"))
        })
}

/// Add common response headers to every CloudFormation response.
fn add_common_headers(
    mut response: http::Response<CloudFormationResponseBody>,
    request_id: &str,
) -> http::Response<CloudFormationResponseBody> {
    let headers = response.headers_mut();

    if let Ok(hv) = http::HeaderValue::from_str(request_id) {
        headers.entry("x-amzn-requestid").or_insert(hv);
    }

    headers
        .entry("content-type")
        .or_insert(http::HeaderValue::from_static(CONTENT_TYPE));

    headers.insert("server", http::HeaderValue::from_static("Rustack"));
    headers.insert(
        "access-control-allow-origin",
        http::HeaderValue::from_static("*"),
    );

    response
}
