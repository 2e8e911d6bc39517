//! CloudFormation handler trait and operation dispatch.

use std::future::Future;
use std::pin::Pin;

use rustack_cloudformation_model::error::CloudFormationError;
use rustack_cloudformation_model::operations::CloudFormationOperation;
use rustack_core::{AccountId, AwsRegion};

use crate::body::CloudFormationResponseBody;
use crate::request::QueryParams;

/// Per-request context resolved by the HTTP layer.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Region the request targets, taken from the SigV4 credential scope.
    pub region: AwsRegion,
    /// Account the request is attributed to.
    pub account: AccountId,
    /// Request id echoed in `ResponseMetadata` and `x-amzn-requestid`.
    pub request_id: String,
}

/// Boxed future returned by [`CloudFormationHandler::handle_operation`].
pub type HandlerFuture = Pin<
    Box<
        dyn Future<Output = Result<http::Response<CloudFormationResponseBody>, CloudFormationError>>
            + Send,
    >,
>;

/// Trait that the CloudFormation business logic provider must implement.
///
/// The handler receives the resolved operation together with the decoded
/// form parameters and returns a complete HTTP response. This is the
/// boundary between the transport layer and the stack engine.
pub trait CloudFormationHandler: Send + Sync + 'static {
    /// Handle a CloudFormation operation and produce an HTTP response.
    fn handle_operation(
        &self,
        op: CloudFormationOperation,
        params: QueryParams,
        ctx: RequestContext,
    ) -> HandlerFuture;
}

/// Dispatch a CloudFormation operation to the handler.
pub async fn dispatch_operation<H: CloudFormationHandler>(
    handler: &H,
    op: CloudFormationOperation,
    params: QueryParams,
    ctx: RequestContext,
) -> Result<http::Response<CloudFormationResponseBody>, CloudFormationError> {
    tracing::debug!(operation = %op, region = %ctx.region, "dispatching CloudFormation operation");
    handler.handle_operation(op, params, ctx).await
}

/// Default handler that returns an error for all operations.
#[derive(Debug, Clone, Default)]
pub struct NotImplementedHandler;

impl CloudFormationHandler for NotImplementedHandler {
    fn handle_operation(
        &self,
        op: CloudFormationOperation,
        _params: QueryParams,
        _ctx: RequestContext,
    ) -> HandlerFuture {
        Box::pin(async move { Err(CloudFormationError::unknown_operation(op.as_str())) })
    }
}
