//! CloudFormation service state management.
//!
//! One [`CloudFormationRegionState`] exists per (account, region) pair and
//! owns every stack declared there. Change sets live inside their stack.

pub mod change_set;
pub mod stack;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use rustack_cloudformation_model::types::Export;

pub use change_set::{ChangeSet, ChangeSetDefinition};
pub use stack::{Stack, StackMetadata};

use crate::engine::DeploymentEngine;

/// Stacks of one region, in insertion order.
#[derive(Debug, Default)]
pub struct CloudFormationRegionState {
    stacks: RwLock<Vec<Arc<Stack>>>,
}

impl CloudFormationRegionState {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All stacks, in insertion order.
    #[must_use]
    pub fn stacks(&self) -> Vec<Arc<Stack>> {
        self.stacks.read().clone()
    }

    /// Register a stack.
    pub fn insert_stack(&self, stack: Arc<Stack>) {
        tracing::debug!(stack_name = %stack.stack_name(), stack_id = %stack.stack_id(), "registering stack");
        self.stacks.write().push(stack);
    }

    /// Deregister a stack by id.
    pub fn remove_stack(&self, stack_id: &str) -> Option<Arc<Stack>> {
        let mut stacks = self.stacks.write();
        let idx = stacks.iter().position(|s| s.stack_id() == stack_id)?;
        Some(stacks.remove(idx))
    }

    /// The first stack called `name`.
    #[must_use]
    pub fn find_stack_by_name(&self, name: &str) -> Option<Arc<Stack>> {
        self.stacks
            .read()
            .iter()
            .find(|s| s.stack_name() == name)
            .cloned()
    }

    /// Look a stack up by id, then by name.
    #[must_use]
    pub fn find_stack(&self, name_or_id: &str) -> Option<Arc<Stack>> {
        let stacks = self.stacks.read();
        stacks
            .iter()
            .find(|s| s.stack_id() == name_or_id)
            .or_else(|| stacks.iter().find(|s| s.stack_name() == name_or_id))
            .cloned()
    }

    /// Every stack whose id or name is `name_or_id`, in insertion order.
    #[must_use]
    pub fn stacks_matching(&self, name_or_id: &str) -> Vec<Arc<Stack>> {
        self.stacks
            .read()
            .iter()
            .filter(|s| s.stack_id() == name_or_id || s.stack_name() == name_or_id)
            .cloned()
            .collect()
    }

    /// Look a stack up like [`Self::find_stack`], registering the one built
    /// by `make` when none matches. Lookup and insert share one write guard.
    pub fn find_or_insert_stack(
        &self,
        name_or_id: &str,
        make: impl FnOnce() -> Arc<Stack>,
    ) -> Arc<Stack> {
        let mut stacks = self.stacks.write();
        let found = stacks
            .iter()
            .find(|s| s.stack_id() == name_or_id)
            .or_else(|| stacks.iter().find(|s| s.stack_name() == name_or_id));
        if let Some(stack) = found {
            return Arc::clone(stack);
        }
        let stack = make();
        tracing::debug!(stack_name = %stack.stack_name(), stack_id = %stack.stack_id(), "registering stack");
        stacks.push(Arc::clone(&stack));
        stack
    }

    /// The stack owning the resource with `physical_id`.
    #[must_use]
    pub fn find_stack_by_physical_id(&self, physical_id: &str) -> Option<Arc<Stack>> {
        self.stacks
            .read()
            .iter()
            .find(|s| s.owns_physical_id(physical_id))
            .cloned()
    }

    /// Find a change set by name or id.
    ///
    /// When `stack_name` names an existing stack only that stack is searched;
    /// otherwise every stack is.
    #[must_use]
    pub fn find_change_set(
        &self,
        name_or_id: &str,
        stack_name: Option<&str>,
    ) -> Option<Arc<ChangeSet>> {
        let candidates = match stack_name.and_then(|name| self.find_stack(name)) {
            Some(stack) => vec![stack],
            None => self.stacks(),
        };
        candidates
            .iter()
            .flat_map(|s| s.change_sets())
            .find(|cs| cs.matches(name_or_id))
    }

    /// The export directory: one entry per export name.
    ///
    /// Export names are expected to be unique within a region but this is
    /// not enforced. On a collision the later stack wins and a warning is
    /// logged.
    #[must_use]
    pub fn exports(&self, engine: &dyn DeploymentEngine) -> Vec<Export> {
        let mut exports: Vec<Export> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for stack in self.stacks() {
            let outputs = match stack.outputs(engine) {
                Ok(outputs) => outputs,
                Err(e) => {
                    tracing::warn!(stack_name = %stack.stack_name(), error = %e, "skipping exports of stack with unresolvable outputs");
                    continue;
                }
            };
            for output in outputs {
                let Some(name) = output.export_name else {
                    continue;
                };
                let export = Export {
                    exporting_stack_id: stack.stack_id().to_owned(),
                    name: name.clone(),
                    value: output.output_value,
                };
                match by_name.get(&name) {
                    Some(&idx) => {
                        tracing::warn!(
                            export_name = %name,
                            first_stack = %exports[idx].exporting_stack_id,
                            second_stack = %stack.stack_id(),
                            "found duplicate export name",
                        );
                        exports[idx] = export;
                    }
                    None => {
                        by_name.insert(name, exports.len());
                        exports.push(export);
                    }
                }
            }
        }
        exports
    }
}
