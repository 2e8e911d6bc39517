//! CloudFormation request router.
//!
//! CloudFormation uses the `awsQuery` protocol: every request is `POST /`
//! with the operation named by the `Action` form parameter:
//!
//! ```text
//! Action=CreateStack&Version=2010-05-15&StackName=web&TemplateBody=...
//! ```

use rustack_cloudformation_model::error::CloudFormationError;
use rustack_cloudformation_model::operations::CloudFormationOperation;

use crate::request::QueryParams;

/// Resolve a CloudFormation operation from decoded request parameters.
pub fn resolve_operation(
    params: &QueryParams,
) -> Result<CloudFormationOperation, CloudFormationError> {
    let action = params
        .get_non_empty("Action")
        .ok_or_else(CloudFormationError::missing_action)?;

    CloudFormationOperation::from_name(&action)
        .ok_or_else(|| CloudFormationError::unknown_operation(&action))
}
