//! CloudFormation handler implementation bridging HTTP to business logic.

use std::sync::Arc;

use rustack_cloudformation_http::body::CloudFormationResponseBody;
use rustack_cloudformation_http::dispatch::{CloudFormationHandler, HandlerFuture, RequestContext};
use rustack_cloudformation_http::request::{FromQueryParams, QueryParams};
use rustack_cloudformation_http::response::result_response;
use rustack_cloudformation_model::error::CloudFormationError;
use rustack_cloudformation_model::operations::CloudFormationOperation;

use crate::provider::RustackCloudFormation;

/// Handler that bridges the HTTP layer to the CloudFormation provider.
#[derive(Debug)]
pub struct RustackCloudFormationHandler {
    provider: Arc<RustackCloudFormation>,
}

impl RustackCloudFormationHandler {
    /// Create a new handler wrapping a provider.
    #[must_use]
    pub fn new(provider: Arc<RustackCloudFormation>) -> Self {
        Self { provider }
    }
}

impl CloudFormationHandler for RustackCloudFormationHandler {
    fn handle_operation(
        &self,
        op: CloudFormationOperation,
        params: QueryParams,
        ctx: RequestContext,
    ) -> HandlerFuture {
        let provider = Arc::clone(&self.provider);
        Box::pin(async move { dispatch(provider.as_ref(), op, &params, &ctx) })
    }
}

/// Decode the operation input, run the matching provider method, and render
/// its result document.
fn dispatch(
    provider: &RustackCloudFormation,
    op: CloudFormationOperation,
    params: &QueryParams,
    ctx: &RequestContext,
) -> Result<http::Response<CloudFormationResponseBody>, CloudFormationError> {
    let action = op.as_str();
    let request_id = ctx.request_id.as_str();

    match op {
        CloudFormationOperation::CreateStack => {
            let output = provider.handle_create_stack(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::UpdateStack => {
            let output = provider.handle_update_stack(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::DeleteStack => {
            let output = provider.handle_delete_stack(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::DescribeStacks => {
            let output = provider.handle_describe_stacks(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::ListStacks => {
            let output = provider.handle_list_stacks(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::GetTemplate => {
            let output = provider.handle_get_template(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::DescribeStackResource => {
            let output = provider.handle_describe_stack_resource(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::DescribeStackResources => {
            let output = provider.handle_describe_stack_resources(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::ListStackResources => {
            let output = provider.handle_list_stack_resources(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::DescribeStackEvents => {
            let output = provider.handle_describe_stack_events(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::CreateChangeSet => {
            let output = provider.handle_create_change_set(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::ExecuteChangeSet => {
            let output = provider.handle_execute_change_set(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::DescribeChangeSet => {
            let output = provider.handle_describe_change_set(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::DeleteChangeSet => {
            let output = provider.handle_delete_change_set(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::ListChangeSets => {
            let output = provider.handle_list_change_sets(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::ListExports => {
            let output = provider.handle_list_exports(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
        CloudFormationOperation::ValidateTemplate => {
            let output = provider.handle_validate_template(ctx, decode(params)?)?;
            result_response(action, &output, request_id)
        }
    }
}

fn decode<T: FromQueryParams>(params: &QueryParams) -> Result<T, CloudFormationError> {
    T::from_params(params)
}
