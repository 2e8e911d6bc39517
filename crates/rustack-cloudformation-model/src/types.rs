//! Shared CloudFormation types: status enums and the records returned by
//! describe/list operations.

use std::fmt;

use chrono::{DateTime, Utc};

/// Declare a wire-string enum with `as_str`, `from_name`, and `Display`.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Returns the wire-format string representation.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $wire, )+
                }
            }

            /// Parse a wire-format string.
            #[must_use]
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $wire => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Lifecycle status of a stack.
    pub enum StackStatus {
        CreateInProgress => "CREATE_IN_PROGRESS",
        CreateFailed => "CREATE_FAILED",
        CreateComplete => "CREATE_COMPLETE",
        RollbackInProgress => "ROLLBACK_IN_PROGRESS",
        RollbackFailed => "ROLLBACK_FAILED",
        RollbackComplete => "ROLLBACK_COMPLETE",
        DeleteInProgress => "DELETE_IN_PROGRESS",
        DeleteFailed => "DELETE_FAILED",
        DeleteComplete => "DELETE_COMPLETE",
        UpdateInProgress => "UPDATE_IN_PROGRESS",
        UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
        UpdateComplete => "UPDATE_COMPLETE",
        UpdateFailed => "UPDATE_FAILED",
        UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
        UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
        UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
        /// A placeholder stack created for a change set that has not run yet.
        ReviewInProgress => "REVIEW_IN_PROGRESS",
    }
}

wire_enum! {
    /// Provisioning status of a single resource.
    pub enum ResourceStatus {
        CreateInProgress => "CREATE_IN_PROGRESS",
        CreateFailed => "CREATE_FAILED",
        CreateComplete => "CREATE_COMPLETE",
        DeleteInProgress => "DELETE_IN_PROGRESS",
        DeleteFailed => "DELETE_FAILED",
        DeleteComplete => "DELETE_COMPLETE",
        DeleteSkipped => "DELETE_SKIPPED",
        UpdateInProgress => "UPDATE_IN_PROGRESS",
        UpdateFailed => "UPDATE_FAILED",
        UpdateComplete => "UPDATE_COMPLETE",
    }
}

wire_enum! {
    /// Creation status of a change set.
    pub enum ChangeSetStatus {
        CreatePending => "CREATE_PENDING",
        CreateInProgress => "CREATE_IN_PROGRESS",
        CreateComplete => "CREATE_COMPLETE",
        DeletePending => "DELETE_PENDING",
        DeleteInProgress => "DELETE_IN_PROGRESS",
        DeleteComplete => "DELETE_COMPLETE",
        DeleteFailed => "DELETE_FAILED",
        Failed => "FAILED",
    }
}

wire_enum! {
    /// Whether a change set can be, or has been, executed.
    pub enum ExecutionStatus {
        Unavailable => "UNAVAILABLE",
        Available => "AVAILABLE",
        ExecuteInProgress => "EXECUTE_IN_PROGRESS",
        ExecuteComplete => "EXECUTE_COMPLETE",
        ExecuteFailed => "EXECUTE_FAILED",
        Obsolete => "OBSOLETE",
    }
}

wire_enum! {
    /// Whether a change set creates a new stack or updates an existing one.
    pub enum ChangeSetType {
        Create => "CREATE",
        Update => "UPDATE",
        Import => "IMPORT",
    }
}

/// The `ResourceType` reported for stack-scope events.
pub const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

/// A stack input parameter as supplied by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameter {
    /// Parameter name.
    pub parameter_key: String,
    /// Supplied value. `None` when only `UsePreviousValue` was given.
    pub parameter_value: Option<String>,
    /// Reuse the value the stack currently holds.
    pub use_previous_value: bool,
}

impl Parameter {
    /// Build an explicit key/value parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            parameter_key: key.into(),
            parameter_value: Some(value.into()),
            use_previous_value: false,
        }
    }
}

/// A key/value tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// A materialized stack output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    pub output_key: String,
    pub output_value: String,
    pub description: Option<String>,
    pub export_name: Option<String>,
}

/// A named value published by a stack output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Export {
    pub exporting_stack_id: String,
    pub name: String,
    pub value: String,
}

/// One entry of a stack's event history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub stack_id: String,
    pub stack_name: String,
    pub logical_resource_id: String,
    pub physical_resource_id: Option<String>,
    /// Either a [`StackStatus`] or a [`ResourceStatus`] wire string.
    pub resource_status: String,
    pub resource_type: String,
    pub resource_status_reason: Option<String>,
}

/// Runtime state of a provisioned resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackResourceDetail {
    pub stack_id: String,
    pub stack_name: String,
    pub logical_resource_id: String,
    pub physical_resource_id: Option<String>,
    pub resource_type: String,
    pub resource_status: ResourceStatus,
    pub resource_status_reason: Option<String>,
    pub last_updated_timestamp: DateTime<Utc>,
}

/// Full description of a stack as returned by `DescribeStacks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub stack_id: String,
    pub stack_name: String,
    pub change_set_id: Option<String>,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub creation_time: DateTime<Utc>,
    pub last_updated_time: Option<DateTime<Utc>>,
    pub deletion_time: Option<DateTime<Utc>>,
    pub stack_status: StackStatus,
    pub stack_status_reason: Option<String>,
    pub disable_rollback: bool,
    pub notification_arns: Vec<String>,
    pub capabilities: Vec<String>,
    pub outputs: Vec<Output>,
    pub role_arn: Option<String>,
    pub tags: Vec<Tag>,
}

/// Summary row returned by `ListStacks`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackSummary {
    pub stack_id: String,
    pub stack_name: String,
    pub template_description: Option<String>,
    pub creation_time: DateTime<Utc>,
    pub last_updated_time: Option<DateTime<Utc>>,
    pub deletion_time: Option<DateTime<Utc>>,
    pub stack_status: StackStatus,
    pub stack_status_reason: Option<String>,
}

/// Summary row returned by `ListChangeSets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetSummary {
    pub stack_id: String,
    pub stack_name: String,
    pub change_set_id: String,
    pub change_set_name: String,
    pub execution_status: ExecutionStatus,
    pub status: ChangeSetStatus,
    pub creation_time: DateTime<Utc>,
    pub description: Option<String>,
}

/// A parameter declared by a template, as reported by `ValidateTemplate`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateParameter {
    pub parameter_key: String,
    pub default_value: Option<String>,
    pub no_echo: bool,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_round_trip_stack_status_names() {
        for status in [
            StackStatus::CreateInProgress,
            StackStatus::UpdateRollbackComplete,
            StackStatus::ReviewInProgress,
        ] {
            assert_eq!(StackStatus::from_name(status.as_str()), Some(status));
        }
        assert_eq!(StackStatus::from_name("NOT_A_STATUS"), None);
    }

    #[test]
    fn test_should_display_wire_string() {
        assert_eq!(ChangeSetStatus::CreatePending.to_string(), "CREATE_PENDING");
        assert_eq!(ExecutionStatus::Available.to_string(), "AVAILABLE");
        assert_eq!(ResourceStatus::DeleteComplete.to_string(), "DELETE_COMPLETE");
    }
}
