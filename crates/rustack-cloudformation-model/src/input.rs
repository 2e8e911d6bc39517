//! CloudFormation input types.
//!
//! Each struct mirrors the request members of one action. Indexed list
//! members (`Parameters.member.N.*`, `Tags.member.N.*`, ...) arrive already
//! collected into `Vec`s.

use crate::types::{ChangeSetType, Parameter, StackStatus, Tag};

// ---------------------------------------------------------------------------
// Stack lifecycle
// ---------------------------------------------------------------------------

/// Input for the `CreateStack` operation.
#[derive(Debug, Clone, Default)]
pub struct CreateStackInput {
    pub stack_name: String,
    pub template_body: Option<String>,
    pub template_url: Option<String>,
    pub parameters: Vec<Parameter>,
    pub capabilities: Vec<String>,
    pub notification_arns: Vec<String>,
    pub tags: Vec<Tag>,
    pub role_arn: Option<String>,
    pub disable_rollback: bool,
}

/// Input for the `UpdateStack` operation.
#[derive(Debug, Clone, Default)]
pub struct UpdateStackInput {
    pub stack_name: String,
    pub template_body: Option<String>,
    pub template_url: Option<String>,
    /// Keep the stack's current template instead of supplying a new one.
    pub use_previous_template: bool,
    pub parameters: Vec<Parameter>,
    pub capabilities: Vec<String>,
    pub notification_arns: Vec<String>,
    pub tags: Vec<Tag>,
    pub role_arn: Option<String>,
}

/// Input for the `DeleteStack` operation.
#[derive(Debug, Clone, Default)]
pub struct DeleteStackInput {
    pub stack_name: String,
}

/// Input for the `DescribeStacks` operation.
#[derive(Debug, Clone, Default)]
pub struct DescribeStacksInput {
    /// Stack name or id. `None` describes every stack.
    pub stack_name: Option<String>,
}

/// Input for the `ListStacks` operation.
#[derive(Debug, Clone, Default)]
pub struct ListStacksInput {
    /// Only stacks in one of these statuses. Empty means no filter.
    ///
    /// Besides the create, update and delete states, a stack registered by
    /// `CreateChangeSet` and not yet executed reports `REVIEW_IN_PROGRESS`.
    pub stack_status_filter: Vec<StackStatus>,
}

/// Input for the `GetTemplate` operation.
#[derive(Debug, Clone, Default)]
pub struct GetTemplateInput {
    pub stack_name: Option<String>,
    pub change_set_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Resources and events
// ---------------------------------------------------------------------------

/// Input for the `DescribeStackResource` operation.
#[derive(Debug, Clone, Default)]
pub struct DescribeStackResourceInput {
    pub stack_name: String,
    pub logical_resource_id: String,
}

/// Input for the `DescribeStackResources` and `ListStackResources` operations.
#[derive(Debug, Clone, Default)]
pub struct DescribeStackResourcesInput {
    pub stack_name: Option<String>,
    pub logical_resource_id: Option<String>,
    pub physical_resource_id: Option<String>,
}

/// Input for the `DescribeStackEvents` operation.
#[derive(Debug, Clone, Default)]
pub struct DescribeStackEventsInput {
    pub stack_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

/// Input for the `CreateChangeSet` operation.
#[derive(Debug, Clone, Default)]
pub struct CreateChangeSetInput {
    pub stack_name: String,
    pub change_set_name: String,
    pub template_body: Option<String>,
    pub template_url: Option<String>,
    pub use_previous_template: bool,
    pub parameters: Vec<Parameter>,
    pub capabilities: Vec<String>,
    pub notification_arns: Vec<String>,
    pub tags: Vec<Tag>,
    pub role_arn: Option<String>,
    pub description: Option<String>,
    pub change_set_type: Option<ChangeSetType>,
}

/// Input shared by `ExecuteChangeSet`, `DescribeChangeSet`, and `DeleteChangeSet`.
#[derive(Debug, Clone, Default)]
pub struct ChangeSetRefInput {
    /// Change set name or id.
    pub change_set_name: String,
    /// Optional stack name or id narrowing the lookup.
    pub stack_name: Option<String>,
}

/// Input for the `ExecuteChangeSet` operation.
pub type ExecuteChangeSetInput = ChangeSetRefInput;
/// Input for the `DescribeChangeSet` operation.
pub type DescribeChangeSetInput = ChangeSetRefInput;
/// Input for the `DeleteChangeSet` operation.
pub type DeleteChangeSetInput = ChangeSetRefInput;

/// Input for the `ListChangeSets` operation.
#[derive(Debug, Clone, Default)]
pub struct ListChangeSetsInput {
    pub stack_name: String,
}

// ---------------------------------------------------------------------------
// Exports and templates
// ---------------------------------------------------------------------------

/// Input for the `ListExports` operation.
#[derive(Debug, Clone, Default)]
pub struct ListExportsInput {
    /// Accepted for compatibility; all exports fit in one page.
    pub next_token: Option<String>,
}

/// Input for the `ValidateTemplate` operation.
#[derive(Debug, Clone, Default)]
pub struct ValidateTemplateInput {
    pub template_body: Option<String>,
    pub template_url: Option<String>,
}
