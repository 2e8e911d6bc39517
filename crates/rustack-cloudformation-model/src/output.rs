//! CloudFormation output types.

use chrono::{DateTime, Utc};

use crate::types::{
    ChangeSetStatus, ChangeSetSummary, ExecutionStatus, Export, Parameter, StackDescription,
    StackEvent, StackResourceDetail, StackSummary, Tag, TemplateParameter,
};

// ---------------------------------------------------------------------------
// Stack lifecycle
// ---------------------------------------------------------------------------

/// Output for the `CreateStack` operation.
#[derive(Debug, Clone, Default)]
pub struct CreateStackOutput {
    pub stack_id: String,
}

/// Output for the `UpdateStack` operation.
#[derive(Debug, Clone, Default)]
pub struct UpdateStackOutput {
    pub stack_id: String,
}

/// Output for the `DeleteStack` operation.
#[derive(Debug, Clone, Default)]
pub struct DeleteStackOutput {}

/// Output for the `DescribeStacks` operation.
#[derive(Debug, Clone, Default)]
pub struct DescribeStacksOutput {
    pub stacks: Vec<StackDescription>,
}

/// Output for the `ListStacks` operation.
#[derive(Debug, Clone, Default)]
pub struct ListStacksOutput {
    pub stack_summaries: Vec<StackSummary>,
}

/// Output for the `GetTemplate` operation.
#[derive(Debug, Clone, Default)]
pub struct GetTemplateOutput {
    pub template_body: String,
}

// ---------------------------------------------------------------------------
// Resources and events
// ---------------------------------------------------------------------------

/// Output for the `DescribeStackResource` operation.
#[derive(Debug, Clone)]
pub struct DescribeStackResourceOutput {
    pub stack_resource_detail: StackResourceDetail,
}

/// Output for the `DescribeStackResources` operation.
#[derive(Debug, Clone, Default)]
pub struct DescribeStackResourcesOutput {
    pub stack_resources: Vec<StackResourceDetail>,
}

/// Output for the `ListStackResources` operation.
#[derive(Debug, Clone, Default)]
pub struct ListStackResourcesOutput {
    pub stack_resource_summaries: Vec<StackResourceDetail>,
}

impl From<DescribeStackResourcesOutput> for ListStackResourcesOutput {
    fn from(output: DescribeStackResourcesOutput) -> Self {
        Self {
            stack_resource_summaries: output.stack_resources,
        }
    }
}

/// Output for the `DescribeStackEvents` operation.
#[derive(Debug, Clone, Default)]
pub struct DescribeStackEventsOutput {
    pub stack_events: Vec<StackEvent>,
}

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

/// Output for the `CreateChangeSet` operation.
#[derive(Debug, Clone, Default)]
pub struct CreateChangeSetOutput {
    pub id: String,
    pub stack_id: String,
}

/// Output for the `ExecuteChangeSet` operation.
#[derive(Debug, Clone, Default)]
pub struct ExecuteChangeSetOutput {}

/// Output for the `DescribeChangeSet` operation.
#[derive(Debug, Clone)]
pub struct DescribeChangeSetOutput {
    pub change_set_id: String,
    pub change_set_name: String,
    pub stack_id: String,
    pub stack_name: String,
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub creation_time: DateTime<Utc>,
    pub execution_status: ExecutionStatus,
    pub status: ChangeSetStatus,
    pub status_reason: Option<String>,
    pub capabilities: Vec<String>,
    pub notification_arns: Vec<String>,
    pub tags: Vec<Tag>,
}

/// Output for the `DeleteChangeSet` operation.
#[derive(Debug, Clone, Default)]
pub struct DeleteChangeSetOutput {}

/// Output for the `ListChangeSets` operation.
#[derive(Debug, Clone, Default)]
pub struct ListChangeSetsOutput {
    pub summaries: Vec<ChangeSetSummary>,
}

// ---------------------------------------------------------------------------
// Exports and templates
// ---------------------------------------------------------------------------

/// Output for the `ListExports` operation.
#[derive(Debug, Clone, Default)]
pub struct ListExportsOutput {
    pub exports: Vec<Export>,
}

/// Output for the `ValidateTemplate` operation.
#[derive(Debug, Clone, Default)]
pub struct ValidateTemplateOutput {
    pub parameters: Vec<TemplateParameter>,
    pub description: Option<String>,
    pub capabilities: Vec<String>,
}
