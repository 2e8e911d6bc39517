//! Conversions from internal errors into CloudFormation errors.

use rustack_cloudformation_model::error::CloudFormationError;

use crate::engine::EngineError;
use crate::template::TemplateError;

/// Convert an engine error into a CloudFormation validation error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
pub fn engine_error_to_cloudformation(e: EngineError) -> CloudFormationError {
    CloudFormationError::validation(e.to_string()).with_source(e)
}

/// Convert a template error into a CloudFormation validation error.
///
/// Takes `e` by value because this is used as a closure argument to `.map_err()`.
#[must_use]
pub fn template_error_to_cloudformation(e: TemplateError) -> CloudFormationError {
    CloudFormationError::validation(format!("Template format error: {e}")).with_source(e)
}
