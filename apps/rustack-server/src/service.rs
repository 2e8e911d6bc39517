//! Service router abstraction for the gateway.
//!
//! Each service implements [`ServiceRouter`] to declare which requests it
//! claims and how it handles them. The gateway holds a list of routers and
//! dispatches to the first match.
//!
//! [`GatewayBody`] is a type-erased HTTP response body shared by all services.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::pin::Pin;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;

/// Type-erased response body used by the gateway.
pub type GatewayBody = BoxBody<Bytes, io::Error>;

/// Boxed future returned by [`ServiceRouter::call`].
pub type RouterFuture =
    Pin<Box<dyn Future<Output = Result<http::Response<GatewayBody>, Infallible>> + Send>>;

/// Create a [`GatewayBody`] from a string.
pub fn gateway_body_from_string(s: impl Into<String>) -> GatewayBody {
    Full::new(Bytes::from(s.into()))
        .map_err(|never: Infallible| match never {})
        .boxed()
}

/// A routable service registered with the gateway.
pub trait ServiceRouter: Send + Sync {
    /// Service name for health reporting (e.g. `"cloudformation"`).
    fn name(&self) -> &'static str;

    /// Returns `true` if this router should handle the given request.
    fn matches(&self, req: &http::Request<Incoming>) -> bool;

    /// Handle the request, producing a response with a type-erased body.
    fn call(&self, req: http::Request<Incoming>) -> RouterFuture;
}

/// The service named in a SigV4 `Authorization` credential scope
/// (`Credential=AKID/date/region/service/aws4_request`).
fn credential_scope_service(authorization: &str) -> Option<&str> {
    let scope = authorization.split("Credential=").nth(1)?;
    let scope = scope.split([',', ' ']).next()?;
    scope.split('/').nth(3)
}

/// Whether a request is addressed to CloudFormation.
///
/// Signed requests are claimed when their credential scope names
/// `cloudformation`. Unsigned requests are claimed when they carry a form
/// body, the `awsQuery` encoding.
pub fn is_cloudformation_request(headers: &http::HeaderMap) -> bool {
    if let Some(authorization) = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        return credential_scope_service(authorization) == Some("cloudformation");
    }
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

// ---------------------------------------------------------------------------
// CloudFormation
// ---------------------------------------------------------------------------

#[cfg(feature = "cloudformation")]
mod cloudformation_router {
    use http_body_util::BodyExt;
    use hyper::body::Incoming;
    use hyper::service::Service;
    use rustack_cloudformation_http::dispatch::CloudFormationHandler;
    use rustack_cloudformation_http::service::CloudFormationHttpService;

    use super::{RouterFuture, ServiceRouter, is_cloudformation_request};

    /// Routes `awsQuery` requests to the CloudFormation service.
    pub struct CloudFormationServiceRouter<H: CloudFormationHandler> {
        inner: CloudFormationHttpService<H>,
    }

    impl<H: CloudFormationHandler> CloudFormationServiceRouter<H> {
        /// Wrap a [`CloudFormationHttpService`] in a router.
        pub fn new(inner: CloudFormationHttpService<H>) -> Self {
            Self { inner }
        }
    }

    impl<H: CloudFormationHandler> ServiceRouter for CloudFormationServiceRouter<H> {
        fn name(&self) -> &'static str {
            "cloudformation"
        }

        fn matches(&self, req: &http::Request<Incoming>) -> bool {
            is_cloudformation_request(req.headers())
        }

        fn call(&self, req: http::Request<Incoming>) -> RouterFuture {
            let svc = self.inner.clone();
            Box::pin(async move {
                let resp = svc.call(req).await;
                Ok(resp.unwrap_or_else(|e| match e {}).map(BodyExt::boxed))
            })
        }
    }
}

#[cfg(feature = "cloudformation")]
pub use cloudformation_router::CloudFormationServiceRouter;
