//! CloudFormation error types.
//!
//! CloudFormation errors are rendered as an `awsQuery` XML `<ErrorResponse>`
//! carrying a short `Code`, a `Message`, and a fault `Type` (`Sender` for
//! client errors, `Receiver` for server errors).

use std::fmt;

/// Well-known CloudFormation error codes.
///
/// Several variants share a wire code: AWS reports a missing stack or a
/// missing resource as a plain `ValidationError`, but the provider still
/// needs to tell those cases apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CloudFormationErrorCode {
    /// Malformed request, mutually exclusive filters, or a failed provisioning step.
    #[default]
    ValidationError,
    /// The addressed stack does not exist.
    StackNotFound,
    /// The addressed resource does not exist in the stack.
    ResourceNotFound,
    /// The addressed change set does not exist.
    ChangeSetNotFound,
    /// A resource with the same identity already exists.
    AlreadyExists,
    /// The request carried no `Action`.
    MissingAction,
    /// The `Action` is not supported.
    InvalidAction,
    /// Internal server error.
    InternalFailure,
}

impl CloudFormationErrorCode {
    /// Returns the wire error code string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError | Self::StackNotFound | Self::ResourceNotFound => {
                "ValidationError"
            }
            Self::ChangeSetNotFound => "ChangeSetNotFound",
            Self::AlreadyExists => "AlreadyExistsException",
            Self::MissingAction => "MissingAction",
            Self::InvalidAction => "InvalidAction",
            Self::InternalFailure => "InternalFailure",
        }
    }

    /// Returns the default HTTP status code for this error.
    #[must_use]
    pub fn default_status_code(&self) -> http::StatusCode {
        match self {
            Self::ChangeSetNotFound | Self::InvalidAction => http::StatusCode::NOT_FOUND,
            Self::InternalFailure => http::StatusCode::INTERNAL_SERVER_ERROR,
            _ => http::StatusCode::BAD_REQUEST,
        }
    }

    /// Returns the `awsQuery` fault type.
    #[must_use]
    pub fn fault(&self) -> &'static str {
        match self {
            Self::InternalFailure => "Receiver",
            _ => "Sender",
        }
    }

    /// Whether this code denotes an absent stack, resource, or change set.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::StackNotFound | Self::ResourceNotFound | Self::ChangeSetNotFound
        )
    }
}

impl fmt::Display for CloudFormationErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A CloudFormation error response.
#[derive(Debug)]
pub struct CloudFormationError {
    /// The error code.
    pub code: CloudFormationErrorCode,
    /// A human-readable error message.
    pub message: String,
    /// The HTTP status code.
    pub status_code: http::StatusCode,
    /// The underlying source error, if any.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for CloudFormationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CloudFormationError({}): {}", self.code, self.message)
    }
}

impl std::error::Error for CloudFormationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl CloudFormationError {
    /// Create a new error from a code, using the code as the message.
    #[must_use]
    pub fn new(code: CloudFormationErrorCode) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: code.as_str().to_owned(),
            code,
            source: None,
        }
    }

    /// Create a new error with a custom message.
    #[must_use]
    pub fn with_message(code: CloudFormationErrorCode, message: impl Into<String>) -> Self {
        Self {
            status_code: code.default_status_code(),
            message: message.into(),
            code,
            source: None,
        }
    }

    /// Set the source error.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Override the HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status: http::StatusCode) -> Self {
        self.status_code = status;
        self
    }

    // -- Convenience constructors --

    /// Validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(CloudFormationErrorCode::ValidationError, message)
    }

    /// A required request parameter is absent.
    #[must_use]
    pub fn missing_parameter(name: &str) -> Self {
        Self::validation(format!(
            "1 validation error detected: Value null at '{name}' failed to satisfy \
             constraint: Member must not be null"
        ))
    }

    /// Stack not found by name or id.
    #[must_use]
    pub fn stack_not_found(name: &str) -> Self {
        Self::with_message(
            CloudFormationErrorCode::StackNotFound,
            format!("Stack with id {name} does not exist"),
        )
    }

    /// Resource not found in a stack.
    #[must_use]
    pub fn resource_not_found(resource_id: &str, stack_name: &str) -> Self {
        Self::with_message(
            CloudFormationErrorCode::ResourceNotFound,
            format!("Unable to find details for resource \"{resource_id}\" in stack \"{stack_name}\""),
        )
    }

    /// Change set not found.
    #[must_use]
    pub fn change_set_not_found(change_set: &str, stack_name: Option<&str>) -> Self {
        Self::with_message(
            CloudFormationErrorCode::ChangeSetNotFound,
            format!(
                "Unable to find change set \"{change_set}\" for stack \"{}\"",
                stack_name.unwrap_or_default()
            ),
        )
    }

    /// Internal server error.
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(CloudFormationErrorCode::InternalFailure, message)
    }

    /// Missing `Action` parameter.
    #[must_use]
    pub fn missing_action() -> Self {
        Self::with_message(
            CloudFormationErrorCode::MissingAction,
            "Missing required parameter: Action",
        )
    }

    /// Unknown action.
    #[must_use]
    pub fn unknown_operation(action: &str) -> Self {
        Self::with_message(
            CloudFormationErrorCode::InvalidAction,
            format!("The action {action} is not valid for this web service"),
        )
    }
}

/// Create a `CloudFormationError` from an error code.
///
/// # Examples
///
/// ```
/// use rustack_cloudformation_model::cloudformation_error;
/// use rustack_cloudformation_model::error::CloudFormationErrorCode;
///
/// let err = cloudformation_error!(ValidationError);
/// assert_eq!(err.code, CloudFormationErrorCode::ValidationError);
///
/// let err = cloudformation_error!(ChangeSetNotFound, "no such change set");
/// assert_eq!(err.message, "no such change set");
/// ```
#[macro_export]
macro_rules! cloudformation_error {
    ($code:ident) => {
        $crate::error::CloudFormationError::new($crate::error::CloudFormationErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::CloudFormationError::with_message(
            $crate::error::CloudFormationErrorCode::$code,
            $msg,
        )
    };
}
