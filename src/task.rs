//! Capabilities the engine expects from the tasks it runs.
//!
//! The engine never knows what a task does. It asks a [`TaskFactory`] to
//! validate node specifications and to turn them into [`Task`] objects, runs
//! them, and reads their outputs back through the [`Task`] trait.
//!
//! [`Registry`] is a ready-made factory which resolves the `task_identifier`
//! of a node to a closure registered in advance.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{LookupError, TaskError};
use crate::node::{NodeAttrs, NodeId};

/// Input values of a task, keyed by input name.
pub type Inputs = BTreeMap<String, Value>;

/// Output values of a task, keyed by output name.
pub type Outputs = BTreeMap<String, Value>;

/// Free-form configuration passed through to every task of a run.
pub type VarInfo = Map<String, Value>;

/// A single instantiated unit of work.
pub trait Task {
    /// Runs the task. With `raise_on_error` a failure is returned to the
    /// caller, without it the task is expected to record the failure itself
    /// and return `Ok`. With `cleanup_references` the task may drop its
    /// inputs once it is done.
    fn execute(&mut self, raise_on_error: bool, cleanup_references: bool) -> Result<(), TaskError>;

    /// Values produced by the last execution.
    fn output_values(&self) -> &Outputs;

    /// Values used to wire the inputs of downstream tasks.
    fn output_variables(&self) -> &Outputs {
        self.output_values()
    }

    /// Whether the last execution failed without raising.
    fn failed(&self) -> bool {
        false
    }
}

/// Resolves node specifications into tasks.
pub trait TaskFactory {
    /// Rejects node specifications which can never be executed.
    fn validate_task_executable(&self, attrs: &NodeAttrs, id: &NodeId) -> Result<(), TaskError>;

    fn required_input_names(
        &self,
        attrs: &NodeAttrs,
        id: &NodeId,
    ) -> Result<BTreeSet<String>, LookupError>;

    /// `inputs` already holds the static inputs of the node overlaid with
    /// the dynamic inputs received from upstream tasks.
    fn instantiate_task(
        &self,
        attrs: &NodeAttrs,
        id: &NodeId,
        varinfo: Option<&VarInfo>,
        inputs: Inputs,
    ) -> Result<Box<dyn Task>, LookupError>;
}

type Callback = dyn Fn(&Inputs) -> anyhow::Result<Outputs> + Send + Sync;

struct Entry {
    required: BTreeSet<String>,
    callback: Arc<Callback>,
}

/// A [`TaskFactory`] backed by closures, keyed by `task_identifier`.
///
/// ```rust
/// use kairo::{Outputs, Registry};
///
/// let mut registry = Registry::new();
/// registry.register("double", &["x"], |inputs| {
///     let x = inputs["x"].as_i64().unwrap_or_default();
///     Ok(Outputs::from([("y".to_string(), (2 * x).into())]))
/// });
/// ```
#[derive(Default)]
pub struct Registry {
    tasks: HashMap<String, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(
        &mut self,
        identifier: impl Into<String>,
        required: &[&str],
        callback: F,
    ) -> &mut Self
    where
        F: Fn(&Inputs) -> anyhow::Result<Outputs> + Send + Sync + 'static,
    {
        let entry = Entry {
            required: required.iter().map(|name| name.to_string()).collect(),
            callback: Arc::new(callback),
        };
        self.tasks.insert(identifier.into(), entry);
        self
    }

    fn entry(&self, attrs: &NodeAttrs, id: &NodeId) -> Result<&Entry, LookupError> {
        let identifier = attrs
            .task_identifier
            .as_ref()
            .ok_or_else(|| LookupError::MissingIdentifier(id.clone()))?;

        self.tasks
            .get(identifier)
            .ok_or_else(|| LookupError::UnknownTask {
                node: id.clone(),
                identifier: identifier.clone(),
            })
    }
}

impl TaskFactory for Registry {
    fn validate_task_executable(&self, attrs: &NodeAttrs, id: &NodeId) -> Result<(), TaskError> {
        self.entry(attrs, id)?;
        Ok(())
    }

    fn required_input_names(
        &self,
        attrs: &NodeAttrs,
        id: &NodeId,
    ) -> Result<BTreeSet<String>, LookupError> {
        Ok(self.entry(attrs, id)?.required.clone())
    }

    fn instantiate_task(
        &self,
        attrs: &NodeAttrs,
        id: &NodeId,
        _: Option<&VarInfo>,
        inputs: Inputs,
    ) -> Result<Box<dyn Task>, LookupError> {
        let entry = self.entry(attrs, id)?;

        Ok(Box::new(RegistryTask {
            node: id.clone(),
            inputs,
            required: entry.required.clone(),
            callback: entry.callback.clone(),
            outputs: Outputs::new(),
            error: None,
        }))
    }
}

/// Task produced by a [`Registry`].
pub struct RegistryTask {
    node: NodeId,
    inputs: Inputs,
    required: BTreeSet<String>,
    callback: Arc<Callback>,
    outputs: Outputs,
    error: Option<TaskError>,
}

impl RegistryTask {
    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    fn run(&self) -> Result<Outputs, TaskError> {
        let missing: Vec<_> = self
            .required
            .iter()
            .filter(|name| !self.inputs.contains_key(*name))
            .collect();

        if !missing.is_empty() {
            anyhow::bail!("Node {} is missing required inputs {:?}", self.node, missing);
        }

        (self.callback)(&self.inputs)
    }
}

impl Task for RegistryTask {
    fn execute(&mut self, raise_on_error: bool, cleanup_references: bool) -> Result<(), TaskError> {
        self.error = None;

        match self.run() {
            Ok(outputs) => self.outputs = outputs,
            Err(err) if raise_on_error => return Err(err),
            Err(err) => {
                tracing::error!("task {} failed: {err:#}", self.node);
                self.outputs.clear();
                self.error = Some(err);
            }
        }

        if cleanup_references {
            self.inputs.clear();
        }

        Ok(())
    }

    fn output_values(&self) -> &Outputs {
        &self.outputs
    }

    fn failed(&self) -> bool {
        self.error.is_some()
    }
}
