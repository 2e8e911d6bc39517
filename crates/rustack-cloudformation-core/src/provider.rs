//! CloudFormation provider implementing the stack and change set lifecycle.
//!
//! Every operation resolves the registry of the request's (account, region)
//! pair, performs its lookups there, and hands provisioning work to the
//! [`DeploymentEngine`]. No registry or stack lock is held while the engine
//! runs.

use std::sync::Arc;

use tracing::{debug, info};

use rustack_cloudformation_http::dispatch::RequestContext;
use rustack_cloudformation_model::error::CloudFormationError;
use rustack_cloudformation_model::input::{
    CreateChangeSetInput, CreateStackInput, DeleteChangeSetInput, DeleteStackInput,
    DescribeChangeSetInput, DescribeStackEventsInput, DescribeStackResourceInput,
    DescribeStackResourcesInput, DescribeStacksInput, ExecuteChangeSetInput, GetTemplateInput,
    ListChangeSetsInput, ListExportsInput, ListStacksInput, UpdateStackInput,
    ValidateTemplateInput,
};
use rustack_cloudformation_model::output::{
    CreateChangeSetOutput, CreateStackOutput, DeleteChangeSetOutput, DeleteStackOutput,
    DescribeChangeSetOutput, DescribeStackEventsOutput, DescribeStackResourceOutput,
    DescribeStackResourcesOutput, DescribeStacksOutput, ExecuteChangeSetOutput,
    GetTemplateOutput, ListChangeSetsOutput, ListExportsOutput, ListStackResourcesOutput,
    ListStacksOutput, UpdateStackOutput, ValidateTemplateOutput,
};
use rustack_cloudformation_model::types::{
    ChangeSetStatus, ChangeSetType, ExecutionStatus, Parameter, StackStatus,
};
use rustack_core::AccountRegionStore;

use crate::config::CloudFormationConfig;
use crate::engine::{DeploymentEngine, EngineError, LocalDeploymentEngine};
use crate::error::{engine_error_to_cloudformation, template_error_to_cloudformation};
use crate::state::{
    ChangeSet, ChangeSetDefinition, CloudFormationRegionState, Stack, StackMetadata,
};
use crate::template::Template;

/// Resource type prefix that makes a template require `CAPABILITY_IAM`.
const IAM_RESOURCE_PREFIX: &str = "AWS::IAM::";

/// The CloudFormation provider.
#[derive(Debug)]
pub struct RustackCloudFormation {
    /// Per (account, region) stack registries.
    pub state: Arc<AccountRegionStore<CloudFormationRegionState>>,
    /// Configuration.
    pub config: Arc<CloudFormationConfig>,
    engine: Arc<dyn DeploymentEngine>,
}

impl RustackCloudFormation {
    /// Create a provider backed by the in-process [`LocalDeploymentEngine`].
    #[must_use]
    pub fn new(config: CloudFormationConfig) -> Self {
        let engine = LocalDeploymentEngine::new(config.fail_on_unresolved_refs);
        Self::with_engine(config, Arc::new(engine))
    }

    /// Create a provider that delegates provisioning to `engine`.
    #[must_use]
    pub fn with_engine(config: CloudFormationConfig, engine: Arc<dyn DeploymentEngine>) -> Self {
        Self {
            state: Arc::new(AccountRegionStore::new()),
            config: Arc::new(config),
            engine,
        }
    }

    /// Reset all state (for testing).
    pub fn reset(&self) {
        self.state.reset();
    }

    /// The registry of the request's region, created on first use.
    fn region(&self, ctx: &RequestContext) -> Arc<CloudFormationRegionState> {
        self.state.get_or_create(&ctx.account, &ctx.region)
    }

    fn parse_template(
        &self,
        body: Option<&str>,
        url: Option<&str>,
    ) -> Result<Template, CloudFormationError> {
        match (body, url) {
            (Some(body), _) => self
                .engine
                .parse_template(body)
                .map_err(engine_error_to_cloudformation),
            (None, Some(url)) => Err(CloudFormationError::validation(format!(
                "Unable to fetch template from {url}: TemplateURL is not supported, \
                 supply TemplateBody instead"
            ))),
            (None, None) => Err(CloudFormationError::validation(
                "Either Template URL or Template Body must be specified.",
            )),
        }
    }

    /// Record a failed create or update on `stack` and build the client error.
    fn fail_stack(
        stack: &Stack,
        status: StackStatus,
        verb: &str,
        err: EngineError,
    ) -> CloudFormationError {
        debug!(stack_name = %stack.stack_name(), error = ?err, "failed to {verb} stack");
        stack.set_stack_status_with_reason(status, Some(err.to_string()));
        CloudFormationError::validation(format!(
            "Unable to {verb} stack \"{}\": {err}",
            stack.stack_name()
        ))
        .with_source(err)
    }
}

/// Every stack whose name or id is `name_or_id`. Names are not unique.
fn matching_stacks(
    region: &CloudFormationRegionState,
    name_or_id: &str,
) -> Result<Vec<Arc<Stack>>, CloudFormationError> {
    let stacks = region.stacks_matching(name_or_id);
    if stacks.is_empty() {
        return Err(CloudFormationError::stack_not_found(name_or_id));
    }
    Ok(stacks)
}

/// Replace `UsePreviousValue` parameters with the value `current` holds.
fn resolve_previous_values(
    parameters: Vec<Parameter>,
    current: Option<&Stack>,
) -> Result<Vec<Parameter>, CloudFormationError> {
    let previous = current.map(|s| s.stack_parameters(true)).unwrap_or_default();
    parameters
        .into_iter()
        .map(|p| {
            if !p.use_previous_value {
                return Ok(p);
            }
            previous
                .iter()
                .find(|prev| prev.parameter_key == p.parameter_key)
                .and_then(|prev| prev.parameter_value.clone())
                .map(|value| Parameter::new(p.parameter_key.clone(), value))
                .ok_or_else(|| {
                    CloudFormationError::validation(format!(
                        "Parameter {} has no previous value to reuse",
                        p.parameter_key
                    ))
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Stack lifecycle
// ---------------------------------------------------------------------------

impl RustackCloudFormation {
    /// Handle `CreateStack`.
    pub fn handle_create_stack(
        &self,
        ctx: &RequestContext,
        input: CreateStackInput,
    ) -> Result<CreateStackOutput, CloudFormationError> {
        let template = self.parse_template(
            input.template_body.as_deref(),
            input.template_url.as_deref(),
        )?;
        let metadata = StackMetadata {
            parameters: resolve_previous_values(input.parameters, None)?,
            capabilities: input.capabilities,
            notification_arns: input.notification_arns,
            tags: input.tags,
            role_arn: input.role_arn,
            disable_rollback: input.disable_rollback,
        };

        let stack = Arc::new(Stack::new(
            input.stack_name,
            template,
            metadata,
            &ctx.region,
            &ctx.account,
        ));
        self.region(ctx).insert_stack(Arc::clone(&stack));

        if let Err(e) = self.engine.deploy(&stack) {
            return Err(Self::fail_stack(&stack, StackStatus::CreateFailed, "create", e));
        }

        info!(stack_name = %stack.stack_name(), stack_id = %stack.stack_id(), "stack created");
        Ok(CreateStackOutput {
            stack_id: stack.stack_id().to_owned(),
        })
    }

    /// Handle `UpdateStack`.
    pub fn handle_update_stack(
        &self,
        ctx: &RequestContext,
        input: UpdateStackInput,
    ) -> Result<UpdateStackOutput, CloudFormationError> {
        let old = self
            .region(ctx)
            .find_stack(&input.stack_name)
            .ok_or_else(|| CloudFormationError::stack_not_found(&input.stack_name))?;

        let template = if input.use_previous_template {
            if input.template_body.is_some() || input.template_url.is_some() {
                return Err(CloudFormationError::validation(
                    "You cannot specify both usePreviousTemplate and a template",
                ));
            }
            old.template().declared()
        } else {
            self.parse_template(
                input.template_body.as_deref(),
                input.template_url.as_deref(),
            )?
        };

        let previous = old.metadata();
        let metadata = StackMetadata {
            parameters: resolve_previous_values(input.parameters, Some(old.as_ref()))?,
            capabilities: input.capabilities,
            notification_arns: input.notification_arns,
            // Omitted tags and role leave the stack's current ones in place.
            tags: if input.tags.is_empty() {
                previous.tags
            } else {
                input.tags
            },
            role_arn: input.role_arn.or(previous.role_arn),
            disable_rollback: previous.disable_rollback,
        };

        // The target state is an unregistered stack the engine reads from.
        let new = Stack::new(
            old.stack_name(),
            template,
            metadata,
            &ctx.region,
            &ctx.account,
        );
        if let Err(e) = self.engine.update(&old, &new) {
            return Err(Self::fail_stack(&old, StackStatus::UpdateFailed, "update", e));
        }

        info!(stack_name = %old.stack_name(), stack_id = %old.stack_id(), "stack updated");
        Ok(UpdateStackOutput {
            stack_id: old.stack_id().to_owned(),
        })
    }

    /// Handle `DeleteStack`. Deleting an unknown stack succeeds.
    pub fn handle_delete_stack(
        &self,
        ctx: &RequestContext,
        input: DeleteStackInput,
    ) -> Result<DeleteStackOutput, CloudFormationError> {
        let region = self.region(ctx);
        let Some(stack) = region.find_stack(&input.stack_name) else {
            debug!(stack_name = %input.stack_name, "delete of unknown stack ignored");
            return Ok(DeleteStackOutput {});
        };

        if let Err(e) = self.engine.delete(&stack) {
            debug!(stack_name = %stack.stack_name(), error = %e, "engine failed to delete stack");
            return Err(CloudFormationError::internal_error(format!(
                "Unable to delete stack \"{}\": {e}",
                stack.stack_name()
            ))
            .with_source(e));
        }
        region.remove_stack(stack.stack_id());

        info!(stack_name = %stack.stack_name(), stack_id = %stack.stack_id(), "stack deleted");
        Ok(DeleteStackOutput {})
    }

    /// Handle `DescribeStacks`.
    pub fn handle_describe_stacks(
        &self,
        ctx: &RequestContext,
        input: DescribeStacksInput,
    ) -> Result<DescribeStacksOutput, CloudFormationError> {
        let region = self.region(ctx);
        let stacks = match input.stack_name.as_deref() {
            Some(name) => matching_stacks(&region, name)?,
            None => region.stacks(),
        };

        let stacks = stacks
            .iter()
            .map(|s| s.describe_details(self.engine.as_ref()))
            .collect();
        Ok(DescribeStacksOutput { stacks })
    }

    /// Handle `ListStacks`.
    ///
    /// Placeholder stacks created by `CreateChangeSet` are listed as
    /// `REVIEW_IN_PROGRESS` until their change set is executed.
    pub fn handle_list_stacks(
        &self,
        ctx: &RequestContext,
        input: ListStacksInput,
    ) -> Result<ListStacksOutput, CloudFormationError> {
        let stack_summaries = self
            .region(ctx)
            .stacks()
            .iter()
            .map(|s| s.summary())
            .filter(|s| {
                input.stack_status_filter.is_empty()
                    || input.stack_status_filter.contains(&s.stack_status)
            })
            .collect();
        Ok(ListStacksOutput { stack_summaries })
    }

    /// Handle `GetTemplate`. A change set name selects the proposed template.
    pub fn handle_get_template(
        &self,
        ctx: &RequestContext,
        input: GetTemplateInput,
    ) -> Result<GetTemplateOutput, CloudFormationError> {
        let region = self.region(ctx);
        let template = match (input.change_set_name.as_deref(), input.stack_name.as_deref()) {
            (Some(cs_name), stack_name) => region
                .find_change_set(cs_name, stack_name)
                .ok_or_else(|| CloudFormationError::change_set_not_found(cs_name, stack_name))?
                .template()
                .clone(),
            (None, Some(name)) => region
                .find_stack(name)
                .ok_or_else(|| CloudFormationError::stack_not_found(name))?
                .template(),
            (None, None) => return Err(CloudFormationError::missing_parameter("StackName")),
        };

        let template_body = template.declared().to_json_string().map_err(|e| {
            CloudFormationError::internal_error("Failed to render template").with_source(e)
        })?;
        Ok(GetTemplateOutput { template_body })
    }
}

// ---------------------------------------------------------------------------
// Resources and events
// ---------------------------------------------------------------------------

impl RustackCloudFormation {
    /// Handle `DescribeStackResource`.
    pub fn handle_describe_stack_resource(
        &self,
        ctx: &RequestContext,
        input: DescribeStackResourceInput,
    ) -> Result<DescribeStackResourceOutput, CloudFormationError> {
        let stack = self
            .region(ctx)
            .find_stack(&input.stack_name)
            .ok_or_else(|| CloudFormationError::stack_not_found(&input.stack_name))?;
        let stack_resource_detail = stack.resource_state(&input.logical_resource_id)?;
        Ok(DescribeStackResourceOutput {
            stack_resource_detail,
        })
    }

    /// Handle `DescribeStackResources`.
    pub fn handle_describe_stack_resources(
        &self,
        ctx: &RequestContext,
        input: DescribeStackResourcesInput,
    ) -> Result<DescribeStackResourcesOutput, CloudFormationError> {
        let region = self.region(ctx);
        let stack = match (
            input.stack_name.as_deref(),
            input.physical_resource_id.as_deref(),
        ) {
            (Some(_), Some(_)) => {
                return Err(CloudFormationError::validation(
                    "Cannot specify both StackName and PhysicalResourceId",
                ));
            }
            (Some(name), None) => region
                .find_stack(name)
                .ok_or_else(|| CloudFormationError::stack_not_found(name))?,
            (None, Some(physical_id)) => region
                .find_stack_by_physical_id(physical_id)
                .ok_or_else(|| {
                    CloudFormationError::validation(format!(
                        "Stack for {physical_id} does not exist"
                    ))
                })?,
            (None, None) => {
                return Err(CloudFormationError::validation(
                    "Either StackName or PhysicalResourceId must be specified",
                ));
            }
        };

        let mut stack_resources = stack.resource_states();
        if let Some(logical_id) = input.logical_resource_id.as_deref() {
            stack_resources.retain(|r| r.logical_resource_id == logical_id);
        }
        Ok(DescribeStackResourcesOutput { stack_resources })
    }

    /// Handle `ListStackResources`: the same rows as `DescribeStackResources`.
    pub fn handle_list_stack_resources(
        &self,
        ctx: &RequestContext,
        input: DescribeStackResourcesInput,
    ) -> Result<ListStackResourcesOutput, CloudFormationError> {
        self.handle_describe_stack_resources(ctx, input)
            .map(Into::into)
    }

    /// Handle `DescribeStackEvents`. Without a stack name, every stack's
    /// history is returned, each newest first.
    pub fn handle_describe_stack_events(
        &self,
        ctx: &RequestContext,
        input: DescribeStackEventsInput,
    ) -> Result<DescribeStackEventsOutput, CloudFormationError> {
        let region = self.region(ctx);
        let stack_events = match input.stack_name.as_deref() {
            Some(name) => matching_stacks(&region, name)?
                .iter()
                .flat_map(|s| s.events())
                .collect(),
            None => region.stacks().iter().flat_map(|s| s.events()).collect(),
        };
        Ok(DescribeStackEventsOutput { stack_events })
    }
}

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

impl RustackCloudFormation {
    fn find_change_set(
        &self,
        ctx: &RequestContext,
        change_set_name: &str,
        stack_name: Option<&str>,
    ) -> Result<Arc<ChangeSet>, CloudFormationError> {
        self.region(ctx)
            .find_change_set(change_set_name, stack_name)
            .ok_or_else(|| CloudFormationError::change_set_not_found(change_set_name, stack_name))
    }

    /// Handle `CreateChangeSet`.
    ///
    /// A change set for an unknown stack registers a placeholder stack in
    /// `REVIEW_IN_PROGRESS` carrying the template without its resources.
    pub fn handle_create_change_set(
        &self,
        ctx: &RequestContext,
        input: CreateChangeSetInput,
    ) -> Result<CreateChangeSetOutput, CloudFormationError> {
        let region = self.region(ctx);
        let existing = region.find_stack(&input.stack_name);
        let reviewing = existing
            .as_ref()
            .is_some_and(|s| s.status() == StackStatus::ReviewInProgress);

        match input.change_set_type {
            Some(ChangeSetType::Update) if existing.is_none() => {
                return Err(CloudFormationError::stack_not_found(&input.stack_name));
            }
            Some(ChangeSetType::Create) if existing.is_some() && !reviewing => {
                return Err(CloudFormationError::validation(format!(
                    "Stack [{}] already exists and cannot be created again with the changeSet [{}].",
                    input.stack_name, input.change_set_name
                )));
            }
            Some(ChangeSetType::Import) => {
                return Err(CloudFormationError::validation(
                    "Change sets of type IMPORT are not supported",
                ));
            }
            _ => {}
        }

        let template = if input.use_previous_template {
            match existing.as_ref().filter(|_| !reviewing) {
                Some(stack) => stack.template().declared(),
                None => {
                    return Err(CloudFormationError::validation(
                        "UsePreviousTemplate requires an existing stack",
                    ));
                }
            }
        } else {
            self.parse_template(
                input.template_body.as_deref(),
                input.template_url.as_deref(),
            )?
        };
        let metadata = StackMetadata {
            parameters: resolve_previous_values(input.parameters, existing.as_deref())?,
            capabilities: input.capabilities,
            notification_arns: input.notification_arns,
            tags: input.tags,
            role_arn: input.role_arn,
            disable_rollback: false,
        };

        let stack = match existing {
            Some(stack) => stack,
            None => region.find_or_insert_stack(&input.stack_name, || {
                let placeholder = Arc::new(Stack::new(
                    input.stack_name.clone(),
                    template.without_resources(),
                    metadata.clone(),
                    &ctx.region,
                    &ctx.account,
                ));
                placeholder.set_stack_status(StackStatus::ReviewInProgress);
                placeholder
            }),
        };

        let validation = template.validate_resources();
        let change_set = Arc::new(ChangeSet::new(
            ChangeSetDefinition {
                change_set_name: input.change_set_name,
                change_set_id: None,
                description: input.description,
                change_set_type: input.change_set_type,
                template,
                metadata,
            },
            &stack,
            &ctx.region,
            &ctx.account,
        ));
        match validation {
            Ok(()) => change_set.set_status(ChangeSetStatus::CreateComplete, None),
            Err(e) => {
                let reason = template_error_to_cloudformation(e).message;
                debug!(change_set = %change_set.change_set_name(), %reason, "change set failed validation");
                change_set.set_status(ChangeSetStatus::Failed, Some(reason));
            }
        }
        stack.add_change_set(Arc::clone(&change_set));

        info!(
            change_set = %change_set.change_set_name(),
            stack_name = %stack.stack_name(),
            change_set_type = %change_set.change_set_type(),
            "change set created",
        );
        Ok(CreateChangeSetOutput {
            id: change_set.change_set_id().to_owned(),
            stack_id: stack.stack_id().to_owned(),
        })
    }

    /// Handle `ExecuteChangeSet`.
    pub fn handle_execute_change_set(
        &self,
        ctx: &RequestContext,
        input: ExecuteChangeSetInput,
    ) -> Result<ExecuteChangeSetOutput, CloudFormationError> {
        let change_set =
            self.find_change_set(ctx, &input.change_set_name, input.stack_name.as_deref())?;
        let execution_status = change_set.execution_status();
        if execution_status != ExecutionStatus::Available {
            return Err(CloudFormationError::validation(format!(
                "ChangeSet [{}] cannot be executed in its current execution status of [{execution_status}]",
                change_set.change_set_id()
            )));
        }

        change_set.set_execution_status(ExecutionStatus::ExecuteInProgress);
        if let Err(e) = self.engine.apply_change_set(&change_set) {
            change_set.set_execution_status(ExecutionStatus::ExecuteFailed);
            let Some(stack) = change_set.target() else {
                return Err(engine_error_to_cloudformation(e));
            };
            let (status, verb) = match change_set.change_set_type() {
                ChangeSetType::Create => (StackStatus::CreateFailed, "create"),
                _ => (StackStatus::UpdateFailed, "update"),
            };
            return Err(Self::fail_stack(&stack, status, verb, e));
        }

        change_set.set_execution_status(ExecutionStatus::ExecuteComplete);
        if let Some(stack) = change_set.target() {
            stack.set_change_set_id(change_set.change_set_id());
            // Other pending proposals were computed against the old state.
            for other in stack.change_sets() {
                if other.change_set_id() != change_set.change_set_id()
                    && other.execution_status() == ExecutionStatus::Available
                {
                    other.set_execution_status(ExecutionStatus::Obsolete);
                }
            }
        }

        info!(
            change_set = %change_set.change_set_name(),
            stack_name = %change_set.stack_name(),
            "change set executed",
        );
        Ok(ExecuteChangeSetOutput {})
    }

    /// Handle `DescribeChangeSet`.
    pub fn handle_describe_change_set(
        &self,
        ctx: &RequestContext,
        input: DescribeChangeSetInput,
    ) -> Result<DescribeChangeSetOutput, CloudFormationError> {
        let change_set =
            self.find_change_set(ctx, &input.change_set_name, input.stack_name.as_deref())?;
        Ok(change_set.describe())
    }

    /// Handle `DeleteChangeSet`. Every change set of the owning stack that
    /// shares the name is removed; the stack itself is left untouched.
    pub fn handle_delete_change_set(
        &self,
        ctx: &RequestContext,
        input: DeleteChangeSetInput,
    ) -> Result<DeleteChangeSetOutput, CloudFormationError> {
        let change_set =
            self.find_change_set(ctx, &input.change_set_name, input.stack_name.as_deref())?;
        let removed = change_set
            .target()
            .map_or(0, |stack| stack.remove_change_sets_named(change_set.change_set_name()));

        info!(
            change_set = %change_set.change_set_name(),
            stack_name = %change_set.stack_name(),
            removed,
            "change set deleted",
        );
        Ok(DeleteChangeSetOutput {})
    }

    /// Handle `ListChangeSets`.
    pub fn handle_list_change_sets(
        &self,
        ctx: &RequestContext,
        input: ListChangeSetsInput,
    ) -> Result<ListChangeSetsOutput, CloudFormationError> {
        let stack = self
            .region(ctx)
            .find_stack(&input.stack_name)
            .ok_or_else(|| CloudFormationError::stack_not_found(&input.stack_name))?;
        let summaries = stack.change_sets().iter().map(|cs| cs.summary()).collect();
        Ok(ListChangeSetsOutput { summaries })
    }
}

// ---------------------------------------------------------------------------
// Exports and templates
// ---------------------------------------------------------------------------

impl RustackCloudFormation {
    /// Handle `ListExports`.
    pub fn handle_list_exports(
        &self,
        ctx: &RequestContext,
        _input: ListExportsInput,
    ) -> Result<ListExportsOutput, CloudFormationError> {
        let exports = self.region(ctx).exports(self.engine.as_ref());
        Ok(ListExportsOutput { exports })
    }

    /// Handle `ValidateTemplate`.
    pub fn handle_validate_template(
        &self,
        _ctx: &RequestContext,
        input: ValidateTemplateInput,
    ) -> Result<ValidateTemplateOutput, CloudFormationError> {
        let template = self.parse_template(
            input.template_body.as_deref(),
            input.template_url.as_deref(),
        )?;
        template
            .validate_resources()
            .map_err(template_error_to_cloudformation)?;

        let needs_iam = template.resources.keys().any(|id| {
            template
                .resource_type(id)
                .is_some_and(|t| t.starts_with(IAM_RESOURCE_PREFIX))
        });
        Ok(ValidateTemplateOutput {
            parameters: template.template_parameters(),
            description: template.description.clone(),
            capabilities: if needs_iam {
                vec!["CAPABILITY_IAM".to_owned()]
            } else {
                Vec::new()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use rustack_cloudformation_model::error::CloudFormationErrorCode;
    use rustack_cloudformation_model::types::ResourceStatus;
    use rustack_core::{AccountId, AwsRegion};

    use super::*;
    use crate::engine::ResolvedResources;

    fn ctx() -> RequestContext {
        RequestContext {
            region: AwsRegion::default(),
            account: AccountId::default(),
            request_id: "test-request".to_owned(),
        }
    }

    fn provider() -> RustackCloudFormation {
        RustackCloudFormation::new(CloudFormationConfig::default())
    }

    fn create_stack(provider: &RustackCloudFormation, name: &str, body: &str) -> String {
        provider
            .handle_create_stack(
                &ctx(),
                CreateStackInput {
                    stack_name: name.to_owned(),
                    template_body: Some(body.to_owned()),
                    ..Default::default()
                },
            )
            .unwrap()
            .stack_id
    }

    fn create_change_set(
        provider: &RustackCloudFormation,
        stack: &str,
        name: &str,
        body: &str,
    ) -> CreateChangeSetOutput {
        provider
            .handle_create_change_set(
                &ctx(),
                CreateChangeSetInput {
                    stack_name: stack.to_owned(),
                    change_set_name: name.to_owned(),
                    template_body: Some(body.to_owned()),
                    ..Default::default()
                },
            )
            .unwrap()
    }

    fn change_set_ref(name: &str) -> DescribeChangeSetInput {
        DescribeChangeSetInput {
            change_set_name: name.to_owned(),
            stack_name: None,
        }
    }

    #[test]
    fn test_should_create_and_describe_stack() {
        let provider = provider();
        let stack_id = create_stack(&provider, "web", r#"{"Resources": {"A": {"Type": "X"}}}"#);

        let out = provider
            .handle_describe_stacks(&ctx(), DescribeStacksInput::default())
            .unwrap();
        assert_eq!(out.stacks.len(), 1);
        assert_eq!(out.stacks[0].stack_id, stack_id);
        assert_eq!(out.stacks[0].stack_status, StackStatus::CreateComplete);

        let stack = provider.region(&ctx()).find_stack("web").unwrap();
        assert!(stack.resolved_resources().contains_key("A"));
    }

    #[test]
    fn test_should_generate_new_id_after_delete_and_recreate() {
        let provider = provider();
        let body = r#"{"Resources": {}}"#;
        let first = create_stack(&provider, "web", body);
        provider
            .handle_delete_stack(
                &ctx(),
                DeleteStackInput {
                    stack_name: "web".to_owned(),
                },
            )
            .unwrap();
        let second = create_stack(&provider, "web", body);
        assert_ne!(first, second);
    }

    #[test]
    fn test_should_require_template_body() {
        let provider = provider();
        let err = provider
            .handle_create_stack(
                &ctx(),
                CreateStackInput {
                    stack_name: "web".to_owned(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code, CloudFormationErrorCode::ValidationError);

        let err = provider
            .handle_create_stack(
                &ctx(),
                CreateStackInput {
                    stack_name: "web".to_owned(),
                    template_url: Some("https://example.com/t.json".to_owned()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.message.contains("TemplateURL"));
    }

    #[test]
    fn test_should_mark_stack_failed_when_deploy_fails() {
        let provider = provider();
        let err = provider
            .handle_create_stack(
                &ctx(),
                CreateStackInput {
                    stack_name: "bad".to_owned(),
                    template_body: Some(r#"{"Resources": {"A": {}}}"#.to_owned()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.message.starts_with("Unable to create stack \"bad\""));

        let stack = provider.region(&ctx()).find_stack("bad").unwrap();
        assert_eq!(stack.status(), StackStatus::CreateFailed);
        assert!(stack.status_reason().is_some());
    }

    /// Local engine whose teardown always fails.
    #[derive(Debug, Default)]
    struct UndeletableEngine {
        inner: LocalDeploymentEngine,
    }

    impl DeploymentEngine for UndeletableEngine {
        fn deploy(&self, stack: &Stack) -> Result<(), EngineError> {
            self.inner.deploy(stack)
        }

        fn update(&self, old: &Stack, new: &Stack) -> Result<(), EngineError> {
            self.inner.update(old, new)
        }

        fn delete(&self, _stack: &Stack) -> Result<(), EngineError> {
            Err(EngineError::Provisioning("teardown refused".to_owned()))
        }

        fn apply_change_set(&self, change_set: &ChangeSet) -> Result<(), EngineError> {
            self.inner.apply_change_set(change_set)
        }

        fn resolve_references(
            &self,
            stack_name: &str,
            node: &mut serde_json::Value,
            resources: &ResolvedResources,
        ) -> Result<(), EngineError> {
            self.inner.resolve_references(stack_name, node, resources)
        }
    }

    #[test]
    fn test_should_keep_stack_status_when_delete_fails() {
        let provider = RustackCloudFormation::with_engine(
            CloudFormationConfig::default(),
            Arc::new(UndeletableEngine::default()),
        );
        create_stack(&provider, "web", r#"{"Resources": {"A": {"Type": "X"}}}"#);

        let err = provider
            .handle_delete_stack(
                &ctx(),
                DeleteStackInput {
                    stack_name: "web".to_owned(),
                },
            )
            .unwrap_err();
        assert_eq!(err.code, CloudFormationErrorCode::InternalFailure);
        assert!(err.message.contains("teardown refused"));

        let stack = provider.region(&ctx()).find_stack("web").unwrap();
        assert_eq!(stack.status(), StackStatus::CreateComplete);
        assert!(stack.status_reason().is_none());
    }

    #[test]
    fn test_should_describe_every_stack_sharing_a_name() {
        let provider = provider();
        create_stack(&provider, "dup", r#"{"Resources": {}}"#);
        create_stack(&provider, "dup", r#"{"Resources": {}}"#);
        create_stack(&provider, "other", r#"{"Resources": {}}"#);

        let described = provider
            .handle_describe_stacks(
                &ctx(),
                DescribeStacksInput {
                    stack_name: Some("dup".to_owned()),
                },
            )
            .unwrap();
        assert_eq!(described.stacks.len(), 2);
        assert_ne!(described.stacks[0].stack_id, described.stacks[1].stack_id);

        let events = provider
            .handle_describe_stack_events(
                &ctx(),
                DescribeStackEventsInput {
                    stack_name: Some("dup".to_owned()),
                },
            )
            .unwrap()
            .stack_events;
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.stack_name == "dup"));
    }

    #[test]
    fn test_should_describe_region_despite_unresolvable_outputs() {
        let provider = RustackCloudFormation::new(CloudFormationConfig {
            fail_on_unresolved_refs: true,
            ..CloudFormationConfig::default()
        });
        provider
            .handle_create_stack(
                &ctx(),
                CreateStackInput {
                    stack_name: "bad".to_owned(),
                    template_body: Some(
                        r#"{"Resources": {"A": {}}, "Outputs": {"O": {"Value": {"Ref": "A"}}}}"#
                            .to_owned(),
                    ),
                    ..Default::default()
                },
            )
            .unwrap_err();
        create_stack(
            &provider,
            "good",
            r#"{"Resources": {}, "Outputs": {"O": {"Value": "ok"}}}"#,
        );

        let described = provider
            .handle_describe_stacks(&ctx(), DescribeStacksInput::default())
            .unwrap();
        assert_eq!(described.stacks.len(), 2);
        let bad = described.stacks.iter().find(|s| s.stack_name == "bad").unwrap();
        assert_eq!(bad.stack_status, StackStatus::CreateFailed);
        assert!(bad.outputs.is_empty());
        let good = described.stacks.iter().find(|s| s.stack_name == "good").unwrap();
        assert_eq!(good.outputs[0].output_value, "ok");
    }

    #[test]
    fn test_should_report_missing_stack_on_describe() {
        let provider = provider();
        let err = provider
            .handle_describe_stacks(
                &ctx(),
                DescribeStacksInput {
                    stack_name: Some("ghost".to_owned()),
                },
            )
            .unwrap_err();
        assert_eq!(err.message, "Stack with id ghost does not exist");
        assert!(err.code.is_not_found());
    }

    #[test]
    fn test_should_isolate_regions() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {}}"#);
        let other = RequestContext {
            region: AwsRegion::new("eu-west-1"),
            ..ctx()
        };
        let out = provider
            .handle_describe_stacks(&other, DescribeStacksInput::default())
            .unwrap();
        assert!(out.stacks.is_empty());
    }

    #[test]
    fn test_should_drop_every_stack_on_reset() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {}}"#);
        provider.reset();
        let out = provider
            .handle_describe_stacks(&ctx(), DescribeStacksInput::default())
            .unwrap();
        assert!(out.stacks.is_empty());
    }

    #[test]
    fn test_should_update_stack_with_previous_template_and_values() {
        let provider = provider();
        let body = r#"{"Parameters": {"Env": {"Type": "String"}},
                       "Resources": {"A": {"Type": "X"}},
                       "Outputs": {"Env": {"Value": {"Ref": "Env"}}}}"#;
        provider
            .handle_create_stack(
                &ctx(),
                CreateStackInput {
                    stack_name: "web".to_owned(),
                    template_body: Some(body.to_owned()),
                    parameters: vec![Parameter::new("Env", "prod")],
                    ..Default::default()
                },
            )
            .unwrap();
        let pid = provider
            .handle_describe_stack_resource(
                &ctx(),
                DescribeStackResourceInput {
                    stack_name: "web".to_owned(),
                    logical_resource_id: "A".to_owned(),
                },
            )
            .unwrap()
            .stack_resource_detail
            .physical_resource_id;

        provider
            .handle_update_stack(
                &ctx(),
                UpdateStackInput {
                    stack_name: "web".to_owned(),
                    use_previous_template: true,
                    parameters: vec![Parameter {
                        parameter_key: "Env".to_owned(),
                        parameter_value: None,
                        use_previous_value: true,
                    }],
                    ..Default::default()
                },
            )
            .unwrap();

        let described = provider
            .handle_describe_stacks(
                &ctx(),
                DescribeStacksInput {
                    stack_name: Some("web".to_owned()),
                },
            )
            .unwrap();
        let stack = &described.stacks[0];
        assert_eq!(stack.stack_status, StackStatus::UpdateComplete);
        assert_eq!(stack.outputs[0].output_value, "prod");
        assert!(stack.last_updated_time.is_some());

        let detail = provider
            .region(&ctx())
            .find_stack("web")
            .unwrap()
            .resource_state("A")
            .unwrap();
        assert_eq!(detail.physical_resource_id, pid);
        assert_eq!(detail.resource_status, ResourceStatus::UpdateComplete);
    }

    #[test]
    fn test_should_reject_update_of_missing_stack() {
        let provider = provider();
        let err = provider
            .handle_update_stack(
                &ctx(),
                UpdateStackInput {
                    stack_name: "ghost".to_owned(),
                    template_body: Some(r#"{"Resources": {}}"#.to_owned()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.message, "Stack with id ghost does not exist");
    }

    #[test]
    fn test_should_mark_update_failed() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {}}"#);
        let err = provider
            .handle_update_stack(
                &ctx(),
                UpdateStackInput {
                    stack_name: "web".to_owned(),
                    template_body: Some(r#"{"Resources": {"A": {"Properties": {}}}}"#.to_owned()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.message.starts_with("Unable to update stack \"web\""));
        let stack = provider.region(&ctx()).find_stack("web").unwrap();
        assert_eq!(stack.status(), StackStatus::UpdateFailed);
    }

    #[test]
    fn test_should_reject_previous_value_without_current_value() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {}}"#);
        let err = provider
            .handle_update_stack(
                &ctx(),
                UpdateStackInput {
                    stack_name: "web".to_owned(),
                    use_previous_template: true,
                    parameters: vec![Parameter {
                        parameter_key: "Missing".to_owned(),
                        parameter_value: None,
                        use_previous_value: true,
                    }],
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.code, CloudFormationErrorCode::ValidationError);
    }

    #[test]
    fn test_should_ignore_delete_of_unknown_stack() {
        let provider = provider();
        assert!(provider
            .handle_delete_stack(
                &ctx(),
                DeleteStackInput {
                    stack_name: "ghost".to_owned(),
                },
            )
            .is_ok());
    }

    #[test]
    fn test_should_list_placeholder_stacks_as_under_review() {
        let provider = provider();
        create_stack(&provider, "live", r#"{"Resources": {}}"#);
        create_change_set(&provider, "draft", "cs1", r#"{"Resources": {"A": {"Type": "X"}}}"#);

        let reviewing = provider
            .handle_list_stacks(
                &ctx(),
                ListStacksInput {
                    stack_status_filter: vec![StackStatus::ReviewInProgress],
                },
            )
            .unwrap();
        assert_eq!(reviewing.stack_summaries.len(), 1);
        assert_eq!(reviewing.stack_summaries[0].stack_name, "draft");
    }

    #[test]
    fn test_should_list_stacks_with_status_filter() {
        let provider = provider();
        create_stack(&provider, "good", r#"{"Resources": {}}"#);
        let _ = provider.handle_create_stack(
            &ctx(),
            CreateStackInput {
                stack_name: "bad".to_owned(),
                template_body: Some(r#"{"Resources": {"A": 1}}"#.to_owned()),
                ..Default::default()
            },
        );

        let all = provider
            .handle_list_stacks(&ctx(), ListStacksInput::default())
            .unwrap();
        assert_eq!(all.stack_summaries.len(), 2);

        let failed = provider
            .handle_list_stacks(
                &ctx(),
                ListStacksInput {
                    stack_status_filter: vec![StackStatus::CreateFailed],
                },
            )
            .unwrap();
        assert_eq!(failed.stack_summaries.len(), 1);
        assert_eq!(failed.stack_summaries[0].stack_name, "bad");
    }

    #[test]
    fn test_should_return_declared_template() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {"A": {"Type": "X"}}}"#);
        let out = provider
            .handle_get_template(
                &ctx(),
                GetTemplateInput {
                    stack_name: Some("web".to_owned()),
                    change_set_name: None,
                },
            )
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out.template_body).unwrap();
        assert_eq!(value["Resources"]["A"], serde_json::json!({"Type": "X"}));
    }

    #[test]
    fn test_should_reject_stack_name_with_physical_id() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {}}"#);
        let err = provider
            .handle_describe_stack_resources(
                &ctx(),
                DescribeStackResourcesInput {
                    stack_name: Some("web".to_owned()),
                    logical_resource_id: None,
                    physical_resource_id: Some("p".to_owned()),
                },
            )
            .unwrap_err();
        assert_eq!(err.code, CloudFormationErrorCode::ValidationError);
    }

    #[test]
    fn test_should_find_resources_by_physical_id() {
        let provider = provider();
        create_stack(
            &provider,
            "web",
            r#"{"Resources": {"A": {"Type": "X"}, "B": {"Type": "Y"}}}"#,
        );
        let physical_id = provider
            .region(&ctx())
            .find_stack("web")
            .unwrap()
            .resource_state("B")
            .unwrap()
            .physical_resource_id
            .unwrap();

        let out = provider
            .handle_list_stack_resources(
                &ctx(),
                DescribeStackResourcesInput {
                    stack_name: None,
                    logical_resource_id: Some("B".to_owned()),
                    physical_resource_id: Some(physical_id),
                },
            )
            .unwrap();
        assert_eq!(out.stack_resource_summaries.len(), 1);
        assert_eq!(out.stack_resource_summaries[0].resource_type, "Y");
    }

    #[test]
    fn test_should_report_missing_resource() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {}}"#);
        let err = provider
            .handle_describe_stack_resource(
                &ctx(),
                DescribeStackResourceInput {
                    stack_name: "web".to_owned(),
                    logical_resource_id: "Nope".to_owned(),
                },
            )
            .unwrap_err();
        assert_eq!(err.code, CloudFormationErrorCode::ResourceNotFound);
    }

    #[test]
    fn test_should_describe_events_newest_first() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {"A": {"Type": "X"}}}"#);
        let events = provider
            .handle_describe_stack_events(
                &ctx(),
                DescribeStackEventsInput {
                    stack_name: Some("web".to_owned()),
                },
            )
            .unwrap()
            .stack_events;
        assert_eq!(events[0].resource_status, "CREATE_COMPLETE");
        assert_eq!(events[0].logical_resource_id, "web");
        assert_eq!(events.last().unwrap().resource_status, "CREATE_IN_PROGRESS");

        let err = provider
            .handle_describe_stack_events(
                &ctx(),
                DescribeStackEventsInput {
                    stack_name: Some("ghost".to_owned()),
                },
            )
            .unwrap_err();
        assert!(err.code.is_not_found());
    }

    #[test]
    fn test_should_register_placeholder_for_new_change_set() {
        let provider = provider();
        let out = create_change_set(
            &provider,
            "web",
            "cs1",
            r#"{"Resources": {"A": {"Type": "X"}}}"#,
        );

        let region = provider.region(&ctx());
        let stacks = region.stacks();
        assert_eq!(stacks.len(), 1);
        let stack = &stacks[0];
        assert_eq!(stack.stack_id(), out.stack_id);
        assert_eq!(stack.status(), StackStatus::ReviewInProgress);
        assert!(stack.template().resources.is_empty());
        assert_eq!(stack.change_sets().len(), 1);

        let described = provider
            .handle_describe_change_set(&ctx(), change_set_ref("cs1"))
            .unwrap();
        assert_eq!(described.change_set_id, out.id);
        assert_eq!(described.status, ChangeSetStatus::CreateComplete);
        assert_eq!(described.execution_status, ExecutionStatus::Available);
    }

    #[test]
    fn test_should_execute_change_set_and_keep_resources_after_delete() {
        let provider = provider();
        let out = create_change_set(
            &provider,
            "web",
            "cs1",
            r#"{"Resources": {"A": {"Type": "X"}}}"#,
        );
        provider
            .handle_execute_change_set(&ctx(), change_set_ref("cs1"))
            .unwrap();

        let stack = provider.region(&ctx()).find_stack("web").unwrap();
        assert_eq!(stack.status(), StackStatus::CreateComplete);
        assert_eq!(stack.change_set_id().as_deref(), Some(out.id.as_str()));
        let before = stack.resource_states();
        assert_eq!(before.len(), 1);

        let described = provider
            .handle_describe_change_set(&ctx(), change_set_ref(&out.id))
            .unwrap();
        assert_eq!(described.execution_status, ExecutionStatus::ExecuteComplete);

        provider
            .handle_delete_change_set(&ctx(), change_set_ref("cs1"))
            .unwrap();
        assert!(stack.change_sets().is_empty());
        assert_eq!(stack.resource_states(), before);
    }

    #[test]
    fn test_should_reject_second_execution() {
        let provider = provider();
        create_change_set(&provider, "web", "cs1", r#"{"Resources": {}}"#);
        provider
            .handle_execute_change_set(&ctx(), change_set_ref("cs1"))
            .unwrap();
        let err = provider
            .handle_execute_change_set(&ctx(), change_set_ref("cs1"))
            .unwrap_err();
        assert!(err.message.contains("EXECUTE_COMPLETE"));
    }

    #[test]
    fn test_should_fail_change_set_with_invalid_resource() {
        let provider = provider();
        create_change_set(&provider, "web", "cs1", r#"{"Resources": {"A": {}}}"#);
        let described = provider
            .handle_describe_change_set(&ctx(), change_set_ref("cs1"))
            .unwrap();
        assert_eq!(described.status, ChangeSetStatus::Failed);
        assert_eq!(described.execution_status, ExecutionStatus::Unavailable);
        assert!(described.status_reason.is_some());
    }

    #[test]
    fn test_should_update_existing_stack_through_change_set() {
        let provider = provider();
        create_stack(&provider, "web", r#"{"Resources": {"A": {"Type": "X"}}}"#);
        create_change_set(
            &provider,
            "web",
            "grow",
            r#"{"Resources": {"A": {"Type": "X"}, "B": {"Type": "X"}}}"#,
        );
        create_change_set(&provider, "web", "other", r#"{"Resources": {}}"#);

        let summaries = provider
            .handle_list_change_sets(
                &ctx(),
                ListChangeSetsInput {
                    stack_name: "web".to_owned(),
                },
            )
            .unwrap()
            .summaries;
        assert_eq!(summaries.len(), 2);

        provider
            .handle_execute_change_set(&ctx(), change_set_ref("grow"))
            .unwrap();
        let stack = provider.region(&ctx()).find_stack("web").unwrap();
        assert_eq!(stack.status(), StackStatus::UpdateComplete);
        assert_eq!(stack.resource_states().len(), 2);

        let other = provider
            .handle_describe_change_set(&ctx(), change_set_ref("other"))
            .unwrap();
        assert_eq!(other.execution_status, ExecutionStatus::Obsolete);
    }

    #[test]
    fn test_should_check_change_set_type_against_stack() {
        let provider = provider();
        let err = provider
            .handle_create_change_set(
                &ctx(),
                CreateChangeSetInput {
                    stack_name: "ghost".to_owned(),
                    change_set_name: "cs".to_owned(),
                    template_body: Some(r#"{"Resources": {}}"#.to_owned()),
                    change_set_type: Some(ChangeSetType::Update),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.code.is_not_found());

        create_stack(&provider, "web", r#"{"Resources": {}}"#);
        let err = provider
            .handle_create_change_set(
                &ctx(),
                CreateChangeSetInput {
                    stack_name: "web".to_owned(),
                    change_set_name: "cs".to_owned(),
                    template_body: Some(r#"{"Resources": {}}"#.to_owned()),
                    change_set_type: Some(ChangeSetType::Create),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(err.message.contains("already exists"));
    }

    #[test]
    fn test_should_report_missing_change_set() {
        let provider = provider();
        let err = provider
            .handle_describe_change_set(&ctx(), change_set_ref("ghost"))
            .unwrap_err();
        assert_eq!(err.code, CloudFormationErrorCode::ChangeSetNotFound);
    }

    #[test]
    fn test_should_list_one_export_per_name() {
        let provider = provider();
        let body = r#"{"Resources": {},
                       "Outputs": {"O": {"Value": "v", "Export": {"Name": "Shared"}}}}"#;
        create_stack(&provider, "one", body);
        create_stack(&provider, "two", body);
        let exports = provider
            .handle_list_exports(&ctx(), ListExportsInput::default())
            .unwrap()
            .exports;
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].name, "Shared");
    }

    #[test]
    fn test_should_validate_template() {
        let provider = provider();
        let out = provider
            .handle_validate_template(
                &ctx(),
                ValidateTemplateInput {
                    template_body: Some(
                        r#"{"Description": "demo",
                            "Parameters": {"Env": {"Type": "String", "Default": "dev"}},
                            "Resources": {"Role": {"Type": "AWS::IAM::Role"}}}"#
                            .to_owned(),
                    ),
                    template_url: None,
                },
            )
            .unwrap();
        assert_eq!(out.description.as_deref(), Some("demo"));
        assert_eq!(out.parameters.len(), 1);
        assert_eq!(out.parameters[0].default_value.as_deref(), Some("dev"));
        assert_eq!(out.capabilities, ["CAPABILITY_IAM"]);

        let err = provider
            .handle_validate_template(
                &ctx(),
                ValidateTemplateInput {
                    template_body: Some("{not json".to_owned()),
                    template_url: None,
                },
            )
            .unwrap_err();
        assert_eq!(err.code, CloudFormationErrorCode::ValidationError);
    }
}
