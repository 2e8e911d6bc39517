//! Change sets: proposed declarations bound to one target stack.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use rustack_cloudformation_model::output::DescribeChangeSetOutput;
use rustack_cloudformation_model::types::{
    ChangeSetStatus, ChangeSetSummary, ChangeSetType, ExecutionStatus, Parameter, StackStatus,
};
use rustack_core::{AccountId, Arn, AwsRegion};

use crate::state::stack::{Stack, StackMetadata};
use crate::template::Template;

/// Everything needed to construct a [`ChangeSet`] besides its target.
#[derive(Debug, Clone, Default)]
pub struct ChangeSetDefinition {
    /// Client-supplied name.
    pub change_set_name: String,
    /// Reuse this id instead of generating one.
    pub change_set_id: Option<String>,
    /// Free-form description.
    pub description: Option<String>,
    /// Inferred from the target's status when absent.
    pub change_set_type: Option<ChangeSetType>,
    /// Proposed template.
    pub template: Template,
    /// Proposed parameters and stack attributes.
    pub metadata: StackMetadata,
}

/// Status fields that change together, read and written under one lock.
#[derive(Debug, Clone)]
struct Progress {
    status: ChangeSetStatus,
    execution_status: ExecutionStatus,
    status_reason: Option<String>,
}

/// A proposed declaration for a target stack.
#[derive(Debug)]
pub struct ChangeSet {
    change_set_id: String,
    change_set_name: String,
    stack_id: String,
    stack_name: String,
    description: Option<String>,
    change_set_type: ChangeSetType,
    creation_time: DateTime<Utc>,
    template: Template,
    metadata: StackMetadata,
    /// The stack owns its change sets, so the back-reference is weak.
    target: Weak<Stack>,
    progress: RwLock<Progress>,
}

impl ChangeSet {
    /// Create a change set in `CREATE_PENDING` bound to `target`.
    #[must_use]
    pub fn new(
        definition: ChangeSetDefinition,
        target: &Arc<Stack>,
        region: &AwsRegion,
        account: &AccountId,
    ) -> Self {
        let ChangeSetDefinition {
            change_set_name,
            change_set_id,
            description,
            change_set_type,
            mut template,
            metadata,
        } = definition;

        let change_set_id = change_set_id.unwrap_or_else(|| {
            Arn::new(
                "cloudformation",
                region,
                account,
                format!("changeSet/{change_set_name}/{}", uuid::Uuid::new_v4()),
            )
            .to_string()
        });
        let change_set_type = change_set_type.unwrap_or_else(|| {
            if target.status() == StackStatus::ReviewInProgress {
                ChangeSetType::Create
            } else {
                ChangeSetType::Update
            }
        });
        template.normalize_logical_ids();

        Self {
            change_set_id,
            change_set_name,
            stack_id: target.stack_id().to_owned(),
            stack_name: target.stack_name().to_owned(),
            description,
            change_set_type,
            creation_time: Utc::now(),
            template,
            metadata,
            target: Arc::downgrade(target),
            progress: RwLock::new(Progress {
                status: ChangeSetStatus::CreatePending,
                execution_status: ExecutionStatus::Unavailable,
                status_reason: None,
            }),
        }
    }

    /// The change set ARN.
    #[must_use]
    pub fn change_set_id(&self) -> &str {
        &self.change_set_id
    }

    /// The client-supplied name.
    #[must_use]
    pub fn change_set_name(&self) -> &str {
        &self.change_set_name
    }

    /// Id of the target stack.
    #[must_use]
    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    /// Name of the target stack.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// `CREATE` or `UPDATE`.
    #[must_use]
    pub fn change_set_type(&self) -> ChangeSetType {
        self.change_set_type
    }

    /// The proposed template.
    #[must_use]
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// The proposed parameters and stack attributes.
    #[must_use]
    pub fn metadata(&self) -> &StackMetadata {
        &self.metadata
    }

    /// The proposed parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.metadata.parameters
    }

    /// The target stack, unless it has been dropped.
    #[must_use]
    pub fn target(&self) -> Option<Arc<Stack>> {
        self.target.upgrade()
    }

    /// Whether `name_or_id` identifies this change set.
    #[must_use]
    pub fn matches(&self, name_or_id: &str) -> bool {
        self.change_set_id == name_or_id || self.change_set_name == name_or_id
    }

    /// Creation status.
    #[must_use]
    pub fn status(&self) -> ChangeSetStatus {
        self.progress.read().status
    }

    /// Whether the change set can still be executed.
    #[must_use]
    pub fn execution_status(&self) -> ExecutionStatus {
        self.progress.read().execution_status
    }

    /// Move to `status`. A completed change set becomes executable.
    pub fn set_status(&self, status: ChangeSetStatus, reason: Option<String>) {
        let mut progress = self.progress.write();
        progress.status = status;
        progress.status_reason = reason;
        if status == ChangeSetStatus::CreateComplete
            && progress.execution_status == ExecutionStatus::Unavailable
        {
            progress.execution_status = ExecutionStatus::Available;
        }
    }

    /// Record the outcome of an execution attempt.
    pub fn set_execution_status(&self, execution_status: ExecutionStatus) {
        self.progress.write().execution_status = execution_status;
    }

    /// The `DescribeChangeSet` projection.
    #[must_use]
    pub fn describe(&self) -> DescribeChangeSetOutput {
        let progress = self.progress.read().clone();
        DescribeChangeSetOutput {
            change_set_id: self.change_set_id.clone(),
            change_set_name: self.change_set_name.clone(),
            stack_id: self.stack_id.clone(),
            stack_name: self.stack_name.clone(),
            description: self.description.clone(),
            parameters: self.metadata.parameters.clone(),
            creation_time: self.creation_time,
            execution_status: progress.execution_status,
            status: progress.status,
            status_reason: progress.status_reason,
            capabilities: self.metadata.capabilities.clone(),
            notification_arns: self.metadata.notification_arns.clone(),
            tags: self.metadata.tags.clone(),
        }
    }

    /// The `ListChangeSets` projection.
    #[must_use]
    pub fn summary(&self) -> ChangeSetSummary {
        let progress = self.progress.read();
        ChangeSetSummary {
            stack_id: self.stack_id.clone(),
            stack_name: self.stack_name.clone(),
            change_set_id: self.change_set_id.clone(),
            change_set_name: self.change_set_name.clone(),
            execution_status: progress.execution_status,
            status: progress.status,
            creation_time: self.creation_time,
            description: self.description.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(status: StackStatus) -> Arc<Stack> {
        let stack = Arc::new(Stack::new(
            "web",
            Template::default(),
            StackMetadata::default(),
            &AwsRegion::default(),
            &AccountId::default(),
        ));
        stack.set_stack_status(status);
        stack
    }

    fn definition(name: &str) -> ChangeSetDefinition {
        ChangeSetDefinition {
            change_set_name: name.to_owned(),
            ..ChangeSetDefinition::default()
        }
    }

    #[test]
    fn test_should_bind_to_target_and_start_pending() {
        let stack = target(StackStatus::CreateComplete);
        let cs = ChangeSet::new(
            definition("cs1"),
            &stack,
            &AwsRegion::default(),
            &AccountId::default(),
        );
        assert!(cs.change_set_id().contains(":changeSet/cs1/"));
        assert_eq!(cs.stack_id(), stack.stack_id());
        assert_eq!(cs.status(), ChangeSetStatus::CreatePending);
        assert_eq!(cs.execution_status(), ExecutionStatus::Unavailable);
        assert_eq!(cs.change_set_type(), ChangeSetType::Update);
        assert!(Arc::ptr_eq(&cs.target().unwrap(), &stack));
        assert!(cs.matches("cs1"));
        assert!(cs.matches(cs.change_set_id()));
    }

    #[test]
    fn test_should_infer_create_type_for_review_stack() {
        let stack = target(StackStatus::ReviewInProgress);
        let cs = ChangeSet::new(
            definition("cs"),
            &stack,
            &AwsRegion::default(),
            &AccountId::default(),
        );
        assert_eq!(cs.change_set_type(), ChangeSetType::Create);
    }

    #[test]
    fn test_should_keep_supplied_id() {
        let stack = target(StackStatus::CreateComplete);
        let cs = ChangeSet::new(
            ChangeSetDefinition {
                change_set_id: Some("fixed".to_owned()),
                ..definition("cs")
            },
            &stack,
            &AwsRegion::default(),
            &AccountId::default(),
        );
        assert_eq!(cs.change_set_id(), "fixed");
    }

    #[test]
    fn test_should_become_available_when_complete() {
        let stack = target(StackStatus::CreateComplete);
        let cs = ChangeSet::new(
            definition("cs"),
            &stack,
            &AwsRegion::default(),
            &AccountId::default(),
        );
        cs.set_status(ChangeSetStatus::CreateComplete, None);
        assert_eq!(cs.execution_status(), ExecutionStatus::Available);
        cs.set_execution_status(ExecutionStatus::ExecuteComplete);
        let described = cs.describe();
        assert_eq!(described.execution_status, ExecutionStatus::ExecuteComplete);
        assert_eq!(described.status, ChangeSetStatus::CreateComplete);
    }

    #[test]
    fn test_should_report_failure_reason_with_status() {
        let stack = target(StackStatus::CreateComplete);
        let cs = ChangeSet::new(
            definition("cs"),
            &stack,
            &AwsRegion::default(),
            &AccountId::default(),
        );
        cs.set_status(ChangeSetStatus::Failed, Some("bad resource".to_owned()));
        let described = cs.describe();
        assert_eq!(described.status, ChangeSetStatus::Failed);
        assert_eq!(described.status_reason.as_deref(), Some("bad resource"));
        assert_eq!(described.execution_status, ExecutionStatus::Unavailable);

        cs.set_status(ChangeSetStatus::CreateComplete, None);
        assert!(cs.describe().status_reason.is_none());
    }

    #[test]
    fn test_should_lose_target_once_stack_is_dropped() {
        let stack = target(StackStatus::CreateComplete);
        let cs = ChangeSet::new(
            definition("cs"),
            &stack,
            &AwsRegion::default(),
            &AccountId::default(),
        );
        drop(stack);
        assert!(cs.target().is_none());
    }
}
