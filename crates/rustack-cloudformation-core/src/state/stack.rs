//! The stack entity: declared template, parameters, runtime resource
//! states, status, and event history.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::{Value, json};

use rustack_cloudformation_model::error::CloudFormationError;
use rustack_cloudformation_model::types::{
    Output, Parameter, ResourceStatus, STACK_RESOURCE_TYPE, StackDescription, StackEvent,
    StackResourceDetail, StackStatus, StackSummary, Tag,
};
use rustack_core::{AccountId, Arn, AwsRegion};

use crate::engine::{DeploymentEngine, EngineError, ResolvedResources};
use crate::state::change_set::ChangeSet;
use crate::template::{Template, scalar_to_string};

/// Client-supplied stack attributes other than the template.
#[derive(Debug, Clone, Default)]
pub struct StackMetadata {
    /// Explicit parameter values, in request order.
    pub parameters: Vec<Parameter>,
    /// Acknowledged capabilities such as `CAPABILITY_IAM`.
    pub capabilities: Vec<String>,
    /// SNS topics notified of stack events.
    pub notification_arns: Vec<String>,
    /// Stack tags.
    pub tags: Vec<Tag>,
    /// Service role the stack operates under.
    pub role_arn: Option<String>,
    /// Keep resources after a failed create.
    pub disable_rollback: bool,
}

/// Mutable part of a stack. Always accessed through [`Stack`]'s lock.
#[derive(Debug)]
struct StackState {
    template: Template,
    metadata: StackMetadata,
    status: StackStatus,
    status_reason: Option<String>,
    /// Runtime resource states in first-provisioned order.
    resource_states: Vec<StackResourceDetail>,
    /// Newest first.
    events: Vec<StackEvent>,
    change_sets: Vec<Arc<ChangeSet>>,
    last_updated_time: Option<DateTime<Utc>>,
    deletion_time: Option<DateTime<Utc>>,
    change_set_id: Option<String>,
}

/// A declared stack.
#[derive(Debug)]
pub struct Stack {
    stack_id: String,
    stack_name: String,
    creation_time: DateTime<Utc>,
    original_template: Template,
    state: RwLock<StackState>,
}

impl Stack {
    /// Create a stack in `CREATE_IN_PROGRESS` with a freshly generated id.
    #[must_use]
    pub fn new(
        stack_name: impl Into<String>,
        mut template: Template,
        metadata: StackMetadata,
        region: &AwsRegion,
        account: &AccountId,
    ) -> Self {
        let stack_name = stack_name.into();
        let stack_id = Arn::new(
            "cloudformation",
            region,
            account,
            format!("stack/{stack_name}/{}", uuid::Uuid::new_v4()),
        )
        .to_string();
        template.normalize_logical_ids();

        let stack = Self {
            stack_id,
            stack_name,
            creation_time: Utc::now(),
            original_template: template.clone(),
            state: RwLock::new(StackState {
                template,
                metadata,
                status: StackStatus::CreateInProgress,
                status_reason: None,
                resource_states: Vec::new(),
                events: Vec::new(),
                change_sets: Vec::new(),
                last_updated_time: None,
                deletion_time: None,
                change_set_id: None,
            }),
        };
        stack.set_stack_status(StackStatus::CreateInProgress);
        stack
    }

    /// The stack ARN.
    #[must_use]
    pub fn stack_id(&self) -> &str {
        &self.stack_id
    }

    /// The client-supplied name.
    #[must_use]
    pub fn stack_name(&self) -> &str {
        &self.stack_name
    }

    /// When the stack was constructed.
    #[must_use]
    pub fn creation_time(&self) -> DateTime<Utc> {
        self.creation_time
    }

    /// The template as it was when the stack was constructed.
    #[must_use]
    pub fn original_template(&self) -> &Template {
        &self.original_template
    }

    /// The current template.
    #[must_use]
    pub fn template(&self) -> Template {
        self.state.read().template.clone()
    }

    /// Parameters and attributes other than the template.
    #[must_use]
    pub fn metadata(&self) -> StackMetadata {
        self.state.read().metadata.clone()
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> StackStatus {
        self.state.read().status
    }

    /// Why the stack reached its current status, if recorded.
    #[must_use]
    pub fn status_reason(&self) -> Option<String> {
        self.state.read().status_reason.clone()
    }

    /// The id of the last change set executed against this stack.
    #[must_use]
    pub fn change_set_id(&self) -> Option<String> {
        self.state.read().change_set_id.clone()
    }

    /// When the engine finished deleting the stack.
    #[must_use]
    pub fn deletion_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().deletion_time
    }

    // -----------------------------------------------------------------------
    // Status and events
    // -----------------------------------------------------------------------

    /// Set the stack status and record a stack-scope event.
    pub fn set_stack_status(&self, status: StackStatus) {
        self.set_stack_status_with_reason(status, None);
    }

    /// Set the stack status with a reason and record a stack-scope event.
    pub fn set_stack_status_with_reason(&self, status: StackStatus, reason: Option<String>) {
        let mut state = self.state.write();
        state.status = status;
        state.status_reason.clone_from(&reason);
        let event = StackEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            stack_id: self.stack_id.clone(),
            stack_name: self.stack_name.clone(),
            logical_resource_id: self.stack_name.clone(),
            physical_resource_id: Some(self.stack_id.clone()),
            resource_status: status.as_str().to_owned(),
            resource_type: STACK_RESOURCE_TYPE.to_owned(),
            resource_status_reason: reason,
        };
        state.events.insert(0, event);
    }

    /// Create or update the runtime state of a resource and record a
    /// resource-scope event.
    ///
    /// The resource must be addressable through [`Self::resolved_resources`].
    /// A known physical id is kept when `physical_id` is `None`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the logical id is unknown.
    pub fn set_resource_status(
        &self,
        logical_id: &str,
        status: ResourceStatus,
        physical_id: Option<&str>,
    ) -> Result<StackResourceDetail, CloudFormationError> {
        let mut state = self.state.write();
        let resolved = resolve_from(&state, &self.stack_name);
        let Some(declared) = resolved.get(logical_id) else {
            return Err(CloudFormationError::resource_not_found(
                logical_id,
                &self.stack_name,
            ));
        };
        let declared_type = declared
            .get("Type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        // Mirror the physical id onto the declaration so `Ref` can see it.
        if let Some(pid) = physical_id {
            if let Some(obj) = state
                .template
                .resources
                .get_mut(logical_id)
                .and_then(Value::as_object_mut)
            {
                obj.insert("PhysicalResourceId".to_owned(), Value::String(pid.to_owned()));
            }
        }

        let now = Utc::now();
        let position = state
            .resource_states
            .iter()
            .position(|r| r.logical_resource_id == logical_id);
        let detail = match position {
            Some(idx) => {
                let existing = &mut state.resource_states[idx];
                existing.resource_status = status;
                if let Some(pid) = physical_id {
                    existing.physical_resource_id = Some(pid.to_owned());
                }
                existing.last_updated_timestamp = now;
                existing.clone()
            }
            None => {
                let detail = StackResourceDetail {
                    stack_id: self.stack_id.clone(),
                    stack_name: self.stack_name.clone(),
                    logical_resource_id: logical_id.to_owned(),
                    physical_resource_id: physical_id.map(ToOwned::to_owned),
                    resource_type: declared_type,
                    resource_status: status,
                    resource_status_reason: None,
                    last_updated_timestamp: now,
                };
                state.resource_states.push(detail.clone());
                detail
            }
        };

        let event = StackEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            stack_id: self.stack_id.clone(),
            stack_name: self.stack_name.clone(),
            logical_resource_id: logical_id.to_owned(),
            physical_resource_id: detail.physical_resource_id.clone(),
            resource_status: status.as_str().to_owned(),
            resource_type: detail.resource_type.clone(),
            resource_status_reason: None,
        };
        state.events.insert(0, event);
        Ok(detail)
    }

    /// Drop the runtime state of a resource that is no longer declared,
    /// recording its deletion.
    pub fn remove_resource_state(&self, logical_id: &str) -> Option<StackResourceDetail> {
        let mut state = self.state.write();
        let idx = state
            .resource_states
            .iter()
            .position(|r| r.logical_resource_id == logical_id)?;
        let removed = state.resource_states.remove(idx);
        let event = StackEvent {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            stack_id: self.stack_id.clone(),
            stack_name: self.stack_name.clone(),
            logical_resource_id: removed.logical_resource_id.clone(),
            physical_resource_id: removed.physical_resource_id.clone(),
            resource_status: ResourceStatus::DeleteComplete.as_str().to_owned(),
            resource_type: removed.resource_type.clone(),
            resource_status_reason: None,
        };
        state.events.insert(0, event);
        Some(removed)
    }

    /// Runtime states of all provisioned resources.
    #[must_use]
    pub fn resource_states(&self) -> Vec<StackResourceDetail> {
        self.state.read().resource_states.clone()
    }

    /// Runtime state of one resource.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the resource has no runtime state.
    pub fn resource_state(&self, logical_id: &str) -> Result<StackResourceDetail, CloudFormationError> {
        self.state
            .read()
            .resource_states
            .iter()
            .find(|r| r.logical_resource_id == logical_id)
            .cloned()
            .ok_or_else(|| CloudFormationError::resource_not_found(logical_id, &self.stack_name))
    }

    /// Whether one of this stack's resources carries `physical_id`.
    #[must_use]
    pub fn owns_physical_id(&self, physical_id: &str) -> bool {
        self.state
            .read()
            .resource_states
            .iter()
            .any(|r| r.physical_resource_id.as_deref() == Some(physical_id))
    }

    /// Event history, newest first.
    #[must_use]
    pub fn events(&self) -> Vec<StackEvent> {
        self.state.read().events.clone()
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// The merged namespace of resources, parameters, conditions, and
    /// mappings. Rebuilt on every call.
    #[must_use]
    pub fn resolved_resources(&self) -> ResolvedResources {
        resolve_from(&self.state.read(), &self.stack_name)
    }

    /// One entry of [`Self::resolved_resources`].
    ///
    /// # Errors
    ///
    /// Returns a not-found error naming the resource and stack.
    pub fn resource(&self, logical_id: &str) -> Result<Value, CloudFormationError> {
        self.resolved_resources()
            .remove(logical_id)
            .ok_or_else(|| CloudFormationError::resource_not_found(logical_id, &self.stack_name))
    }

    /// Parameter values keyed by name, optionally filled with template
    /// defaults.
    #[must_use]
    pub fn stack_parameters(&self, include_defaults: bool) -> Vec<Parameter> {
        parameters_from(&self.state.read(), include_defaults)
    }

    /// Evaluate the declared outputs, in declaration order.
    ///
    /// # Errors
    ///
    /// Propagates reference resolution failures from the engine.
    pub fn outputs(&self, engine: &dyn DeploymentEngine) -> Result<Vec<Output>, EngineError> {
        let (template, resources) = {
            let state = self.state.read();
            (state.template.clone(), resolve_from(&state, &self.stack_name))
        };
        self.outputs_from(&template, &resources, engine)
    }

    fn outputs_from(
        &self,
        template: &Template,
        resources: &ResolvedResources,
        engine: &dyn DeploymentEngine,
    ) -> Result<Vec<Output>, EngineError> {
        let mut outputs = Vec::with_capacity(template.outputs.len());
        for (key, decl) in &template.outputs {
            let mut value = decl.get("Value").cloned().unwrap_or(Value::Null);
            engine.resolve_references(&self.stack_name, &mut value, resources)?;

            let export_name = match decl.get("Export").and_then(|e| e.get("Name")) {
                Some(name) => {
                    let mut name = name.clone();
                    engine.resolve_references(&self.stack_name, &mut name, resources)?;
                    Some(scalar_to_string(&name))
                }
                None => None,
            };

            outputs.push(Output {
                output_key: key.clone(),
                output_value: scalar_to_string(&value),
                description: decl
                    .get("Description")
                    .and_then(Value::as_str)
                    .map(ToOwned::to_owned),
                export_name,
            });
        }
        Ok(outputs)
    }

    /// A consistent snapshot for `DescribeStacks`.
    ///
    /// Outputs that fail to resolve are logged and omitted so one broken
    /// stack cannot hide the rest of the region.
    #[must_use]
    pub fn describe_details(&self, engine: &dyn DeploymentEngine) -> StackDescription {
        let (mut description, template, resources) = {
            let state = self.state.read();
            let description = StackDescription {
                stack_id: self.stack_id.clone(),
                stack_name: self.stack_name.clone(),
                change_set_id: state.change_set_id.clone(),
                description: state.template.description.clone(),
                parameters: parameters_from(&state, true),
                creation_time: self.creation_time,
                last_updated_time: state.last_updated_time,
                deletion_time: state.deletion_time,
                stack_status: state.status,
                stack_status_reason: state.status_reason.clone(),
                disable_rollback: state.metadata.disable_rollback,
                notification_arns: state.metadata.notification_arns.clone(),
                capabilities: state.metadata.capabilities.clone(),
                outputs: Vec::new(),
                role_arn: state.metadata.role_arn.clone(),
                tags: state.metadata.tags.clone(),
            };
            (
                description,
                state.template.clone(),
                resolve_from(&state, &self.stack_name),
            )
        };
        match self.outputs_from(&template, &resources, engine) {
            Ok(outputs) => description.outputs = outputs,
            Err(e) => {
                tracing::warn!(stack_name = %self.stack_name, error = %e, "describing stack without unresolvable outputs");
            }
        }
        description
    }

    /// The `ListStacks` projection.
    #[must_use]
    pub fn summary(&self) -> StackSummary {
        let state = self.state.read();
        StackSummary {
            stack_id: self.stack_id.clone(),
            stack_name: self.stack_name.clone(),
            template_description: state.template.description.clone(),
            creation_time: self.creation_time,
            last_updated_time: state.last_updated_time,
            deletion_time: state.deletion_time,
            stack_status: state.status,
            stack_status_reason: state.status_reason.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Declaration changes
    // -----------------------------------------------------------------------

    /// Replace the declared template and metadata with a new target state.
    ///
    /// Physical ids already assigned to resources that stay declared are
    /// carried over to the new declarations.
    pub fn apply_declaration(&self, mut template: Template, metadata: StackMetadata) {
        template.normalize_logical_ids();
        let mut state = self.state.write();
        for detail in &state.resource_states {
            let (Some(pid), Some(obj)) = (
                detail.physical_resource_id.as_ref(),
                template
                    .resources
                    .get_mut(&detail.logical_resource_id)
                    .and_then(Value::as_object_mut),
            ) else {
                continue;
            };
            obj.entry("PhysicalResourceId")
                .or_insert_with(|| Value::String(pid.clone()));
        }
        state.template = template;
        state.metadata = metadata;
        state.last_updated_time = Some(Utc::now());
    }

    /// Record that the stack's resources are gone.
    pub fn mark_deleted(&self) {
        self.state.write().deletion_time = Some(Utc::now());
    }

    /// Record the change set most recently executed against this stack.
    pub fn set_change_set_id(&self, change_set_id: impl Into<String>) {
        self.state.write().change_set_id = Some(change_set_id.into());
    }

    // -----------------------------------------------------------------------
    // Change sets
    // -----------------------------------------------------------------------

    /// Change sets targeting this stack, oldest first.
    #[must_use]
    pub fn change_sets(&self) -> Vec<Arc<ChangeSet>> {
        self.state.read().change_sets.clone()
    }

    /// Attach a change set.
    pub fn add_change_set(&self, change_set: Arc<ChangeSet>) {
        self.state.write().change_sets.push(change_set);
    }

    /// Remove every change set called `name`. Returns how many were removed.
    pub fn remove_change_sets_named(&self, name: &str) -> usize {
        let mut state = self.state.write();
        let before = state.change_sets.len();
        state.change_sets.retain(|cs| cs.change_set_name() != name);
        before - state.change_sets.len()
    }
}

fn pseudo_resource(key: &str, value: Value) -> Value {
    json!({
        "Type": "Parameter",
        "LogicalResourceId": key,
        "Properties": { "Value": value },
    })
}

/// Explicit parameters first, then defaults in declaration order.
fn parameters_from(state: &StackState, include_defaults: bool) -> Vec<Parameter> {
    let mut result: Vec<Parameter> = Vec::with_capacity(state.metadata.parameters.len());
    for p in &state.metadata.parameters {
        if p.parameter_value.is_none() {
            continue;
        }
        match result.iter_mut().find(|e| e.parameter_key == p.parameter_key) {
            Some(existing) => existing.parameter_value.clone_from(&p.parameter_value),
            None => result.push(Parameter::new(
                p.parameter_key.clone(),
                p.parameter_value.clone().unwrap_or_default(),
            )),
        }
    }
    if include_defaults {
        for key in state.template.parameters.keys() {
            if result.iter().any(|p| &p.parameter_key == key) {
                continue;
            }
            if let Some(default) = state.template.parameter_default(key) {
                result.push(Parameter::new(key.clone(), default));
            }
        }
    }
    result
}

/// Layered first-writer-wins merge of the stack's namespaces.
fn resolve_from(state: &StackState, stack_name: &str) -> ResolvedResources {
    let mut result = state.template.resources.clone();

    for p in parameters_from(state, false) {
        if !result.contains_key(&p.parameter_key) {
            let value = Value::String(p.parameter_value.unwrap_or_default());
            result.insert(p.parameter_key.clone(), pseudo_resource(&p.parameter_key, value));
        }
    }
    for (name, expr) in state
        .template
        .conditions
        .iter()
        .chain(&state.template.mappings)
    {
        if !result.contains_key(name) {
            result.insert(name.clone(), pseudo_resource(name, expr.clone()));
        }
    }
    for p in parameters_from(state, true) {
        if !result.contains_key(&p.parameter_key) {
            let value = Value::String(p.parameter_value.unwrap_or_default());
            result.insert(p.parameter_key.clone(), pseudo_resource(&p.parameter_key, value));
        }
    }

    tracing::trace!(stack_name, entries = result.len(), "resolved stack namespace");
    result
}
