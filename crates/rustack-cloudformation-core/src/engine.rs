//! The deployment engine boundary.
//!
//! Lifecycle operations never provision anything themselves. They hand
//! stacks and change sets to a [`DeploymentEngine`] and record the outcome.
//! [`LocalDeploymentEngine`] is the in-process implementation: it assigns
//! physical ids and walks resources through their status transitions, and
//! it resolves a small subset of intrinsic functions.

use std::fmt;

use serde_json::{Map, Value};

use rustack_cloudformation_model::types::{ResourceStatus, StackStatus};
use rustack_core::short_uid;

use crate::state::{ChangeSet, Stack};
use crate::template::{Template, TemplateError, scalar_to_string};

/// Identifier → resolvable entry, as built by [`Stack::resolved_resources`].
pub type ResolvedResources = Map<String, Value>;

/// Errors reported by a deployment engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Template format error: {0}")]
    InvalidTemplate(#[from] TemplateError),
    #[error("Unresolved reference: {0}")]
    UnresolvableReference(String),
    #[error("Target stack of change set {0} no longer exists")]
    MissingTarget(String),
    #[error("{0}")]
    Provisioning(String),
}

/// Provisioning and template services used by the lifecycle operations.
///
/// Calls are synchronous and may take arbitrarily long. Callers must not
/// hold a stack lock across them.
pub trait DeploymentEngine: Send + Sync + fmt::Debug {
    /// Parse a raw template body.
    fn parse_template(&self, body: &str) -> Result<Template, EngineError> {
        Ok(Template::parse(body)?)
    }

    /// Provision every resource of a freshly registered stack.
    fn deploy(&self, stack: &Stack) -> Result<(), EngineError>;

    /// Move `old` to the declaration held by `new`.
    fn update(&self, old: &Stack, new: &Stack) -> Result<(), EngineError>;

    /// Tear down the resources of a stack.
    fn delete(&self, stack: &Stack) -> Result<(), EngineError>;

    /// Apply a change set to its target stack.
    fn apply_change_set(&self, change_set: &ChangeSet) -> Result<(), EngineError>;

    /// Replace intrinsic references inside `node` with resolved values.
    fn resolve_references(
        &self,
        stack_name: &str,
        node: &mut Value,
        resources: &ResolvedResources,
    ) -> Result<(), EngineError>;
}

/// In-memory engine that records resource states without provisioning.
#[derive(Debug, Clone, Default)]
pub struct LocalDeploymentEngine {
    fail_on_unresolved: bool,
}

impl LocalDeploymentEngine {
    /// Create an engine. With `fail_on_unresolved` an unresolvable
    /// reference is an error; otherwise the intrinsic is left in place.
    #[must_use]
    pub fn new(fail_on_unresolved: bool) -> Self {
        Self { fail_on_unresolved }
    }

    /// Bring the stack's resources in line with `template`.
    ///
    /// Resources no longer declared are deleted, new ones created, and
    /// surviving ones updated with their physical id kept.
    fn reconcile(&self, stack: &Stack, template: &Template) -> Result<(), EngineError> {
        let provisioning = |e: rustack_cloudformation_model::CloudFormationError| {
            EngineError::Provisioning(e.message)
        };

        for state in stack.resource_states() {
            if !template.resources.contains_key(&state.logical_resource_id) {
                stack.remove_resource_state(&state.logical_resource_id);
            }
        }

        // Assign physical ids first so properties may reference any resource.
        let mut pending = Vec::with_capacity(template.resources.len());
        for logical_id in template.resources.keys() {
            let existing = stack
                .resource_state(logical_id)
                .ok()
                .and_then(|s| s.physical_resource_id);
            let (in_progress, complete) = if existing.is_some() {
                (ResourceStatus::UpdateInProgress, ResourceStatus::UpdateComplete)
            } else {
                (ResourceStatus::CreateInProgress, ResourceStatus::CreateComplete)
            };
            let physical_id = existing.unwrap_or_else(|| {
                format!("{}-{logical_id}-{}", stack.stack_name(), short_uid())
            });
            stack
                .set_resource_status(logical_id, in_progress, Some(&physical_id))
                .map_err(provisioning)?;
            pending.push((logical_id.clone(), complete));
        }

        let resources = stack.resolved_resources();
        for (logical_id, complete) in pending {
            if let Some(properties) = template
                .resources
                .get(&logical_id)
                .and_then(|r| r.get("Properties"))
            {
                let mut properties = properties.clone();
                self.resolve_references(stack.stack_name(), &mut properties, &resources)
                    .map_err(|e| {
                        EngineError::Provisioning(format!("Resource {logical_id}: {e}"))
                    })?;
            }
            stack
                .set_resource_status(&logical_id, complete, None)
                .map_err(provisioning)?;
        }
        Ok(())
    }
}

impl DeploymentEngine for LocalDeploymentEngine {
    fn deploy(&self, stack: &Stack) -> Result<(), EngineError> {
        let template = stack.template();
        template.validate_resources()?;
        self.reconcile(stack, &template)?;
        stack.set_stack_status(StackStatus::CreateComplete);
        Ok(())
    }

    fn update(&self, old: &Stack, new: &Stack) -> Result<(), EngineError> {
        let template = new.template();
        template.validate_resources()?;
        old.set_stack_status(StackStatus::UpdateInProgress);
        old.apply_declaration(template.clone(), new.metadata());
        self.reconcile(old, &template)?;
        old.set_stack_status(StackStatus::UpdateComplete);
        Ok(())
    }

    fn delete(&self, stack: &Stack) -> Result<(), EngineError> {
        stack.set_stack_status(StackStatus::DeleteInProgress);
        for state in stack.resource_states().iter().rev() {
            stack
                .set_resource_status(
                    &state.logical_resource_id,
                    ResourceStatus::DeleteComplete,
                    None,
                )
                .map_err(|e| EngineError::Provisioning(e.message))?;
        }
        stack.set_stack_status(StackStatus::DeleteComplete);
        stack.mark_deleted();
        Ok(())
    }

    fn apply_change_set(&self, change_set: &ChangeSet) -> Result<(), EngineError> {
        let stack = change_set
            .target()
            .ok_or_else(|| EngineError::MissingTarget(change_set.change_set_name().to_owned()))?;
        let template = change_set.template().clone();
        template.validate_resources()?;

        let creating = stack.status() == StackStatus::ReviewInProgress;
        let (in_progress, complete) = if creating {
            (StackStatus::CreateInProgress, StackStatus::CreateComplete)
        } else {
            (StackStatus::UpdateInProgress, StackStatus::UpdateComplete)
        };
        stack.set_stack_status(in_progress);
        stack.apply_declaration(template.clone(), change_set.metadata().clone());
        self.reconcile(&stack, &template)?;
        stack.set_stack_status(complete);
        Ok(())
    }

    fn resolve_references(
        &self,
        stack_name: &str,
        node: &mut Value,
        resources: &ResolvedResources,
    ) -> Result<(), EngineError> {
        Resolver {
            stack_name,
            resources,
            strict: self.fail_on_unresolved,
        }
        .resolve(node)
    }
}

// ---------------------------------------------------------------------------
// Intrinsic functions
// ---------------------------------------------------------------------------

const INTRINSICS: [&str; 5] = ["Ref", "Fn::GetAtt", "Fn::Join", "Fn::Sub", "Fn::Select"];

struct Resolver<'a> {
    stack_name: &'a str,
    resources: &'a ResolvedResources,
    strict: bool,
}

fn unresolvable(msg: impl Into<String>) -> EngineError {
    EngineError::UnresolvableReference(msg.into())
}

impl Resolver<'_> {
    fn resolve(&self, node: &mut Value) -> Result<(), EngineError> {
        let intrinsic = match node {
            Value::Object(map) if map.len() == 1 => map
                .iter()
                .next()
                .filter(|(k, _)| INTRINSICS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone())),
            _ => None,
        };

        if let Some((function, mut arg)) = intrinsic {
            self.resolve(&mut arg)?;
            match self.evaluate(&function, &arg) {
                Ok(value) => *node = value,
                Err(e) if self.strict => return Err(e),
                Err(e) => {
                    tracing::debug!(stack_name = %self.stack_name, %function, error = %e, "leaving intrinsic unresolved");
                }
            }
            return Ok(());
        }

        match node {
            Value::Object(map) => {
                for value in map.values_mut() {
                    self.resolve(value)?;
                }
            }
            Value::Array(items) => {
                for value in items {
                    self.resolve(value)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn evaluate(&self, function: &str, arg: &Value) -> Result<Value, EngineError> {
        match function {
            "Ref" => {
                let name = arg
                    .as_str()
                    .ok_or_else(|| unresolvable("Ref expects a logical id"))?;
                self.reference(name)
            }
            "Fn::GetAtt" => {
                let (resource, attribute) = match arg {
                    Value::Array(parts) if parts.len() == 2 => (
                        parts[0].as_str().unwrap_or_default(),
                        parts[1].as_str().unwrap_or_default(),
                    ),
                    Value::String(s) => s
                        .split_once('.')
                        .ok_or_else(|| unresolvable(format!("Fn::GetAtt {s}")))?,
                    _ => return Err(unresolvable("Fn::GetAtt expects [resource, attribute]")),
                };
                self.attribute(resource, attribute)
            }
            "Fn::Join" => {
                let (delimiter, items) = match arg {
                    Value::Array(parts) if parts.len() == 2 => (
                        parts[0].as_str().unwrap_or_default(),
                        parts[1]
                            .as_array()
                            .ok_or_else(|| unresolvable("Fn::Join expects a list"))?,
                    ),
                    _ => return Err(unresolvable("Fn::Join expects [delimiter, list]")),
                };
                let parts = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(_) | Value::Array(_) => {
                            Err(unresolvable("Fn::Join item is not a scalar"))
                        }
                        scalar => Ok(scalar_to_string(scalar)),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::String(parts.join(delimiter)))
            }
            "Fn::Select" => {
                let (index, items) = match arg {
                    Value::Array(parts) if parts.len() == 2 => (&parts[0], &parts[1]),
                    _ => return Err(unresolvable("Fn::Select expects [index, list]")),
                };
                let index = index
                    .as_u64()
                    .or_else(|| index.as_str().and_then(|s| s.parse().ok()))
                    .and_then(|i| usize::try_from(i).ok())
                    .ok_or_else(|| unresolvable("Fn::Select index is not a number"))?;
                items
                    .as_array()
                    .and_then(|list| list.get(index))
                    .cloned()
                    .ok_or_else(|| unresolvable(format!("Fn::Select index {index} out of range")))
            }
            "Fn::Sub" => {
                let (text, vars) = match arg {
                    Value::String(s) => (s.as_str(), None),
                    Value::Array(parts) if parts.len() == 2 => (
                        parts[0].as_str().unwrap_or_default(),
                        parts[1].as_object(),
                    ),
                    _ => return Err(unresolvable("Fn::Sub expects a string")),
                };
                self.substitute(text, vars).map(Value::String)
            }
            other => Err(unresolvable(format!("unsupported function {other}"))),
        }
    }

    fn reference(&self, name: &str) -> Result<Value, EngineError> {
        if name == "AWS::StackName" {
            return Ok(Value::String(self.stack_name.to_owned()));
        }
        let entry = self
            .resources
            .get(name)
            .ok_or_else(|| unresolvable(format!("Unresolved resource dependency {name}")))?;
        if entry.get("Type").and_then(Value::as_str) == Some("Parameter") {
            return Ok(entry
                .pointer("/Properties/Value")
                .cloned()
                .unwrap_or(Value::Null));
        }
        entry
            .get("PhysicalResourceId")
            .filter(|v| v.is_string())
            .cloned()
            .ok_or_else(|| unresolvable(format!("{name} has not been provisioned")))
    }

    fn attribute(&self, resource: &str, attribute: &str) -> Result<Value, EngineError> {
        let entry = self
            .resources
            .get(resource)
            .ok_or_else(|| unresolvable(format!("Unresolved resource dependency {resource}")))?;
        entry
            .get("Properties")
            .and_then(|p| p.get(attribute))
            .or_else(|| entry.get(attribute))
            .cloned()
            .ok_or_else(|| unresolvable(format!("{resource}.{attribute}")))
    }

    fn substitute(&self, text: &str, vars: Option<&Map<String, Value>>) -> Result<String, EngineError> {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find('}')
                .ok_or_else(|| unresolvable(format!("unterminated variable in {text}")))?;
            let name = &after[..end];
            if let Some(literal) = name.strip_prefix('!') {
                out.push_str("${");
                out.push_str(literal);
                out.push('}');
            } else {
                let value = match vars.and_then(|v| v.get(name)) {
                    Some(value) => value.clone(),
                    None => match name.split_once('.') {
                        Some((res, attr)) => self.attribute(res, attr)?,
                        None => self.reference(name)?,
                    },
                };
                if value.is_object() || value.is_array() {
                    return Err(unresolvable(format!("${{{name}}} is not a scalar")));
                }
                out.push_str(&scalar_to_string(&value));
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }
}
